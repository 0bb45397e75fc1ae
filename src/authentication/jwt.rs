use chrono::Local;
use chrono::TimeDelta;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::MSG_INVALID_TOKEN;
use crate::error::ApiError;
use crate::schema::{Id, User};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub user_id: Id,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl TokenClaims {
    pub fn new(id: Id, email: String, lifetime_hours: i64) -> Result<Self, ApiError> {
        let now = Local::now();
        let exp = TimeDelta::try_hours(lifetime_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                ApiError::Internal(format!("Token lifetime of {lifetime_hours} hours is out of range"))
            })?;

        Ok(Self {
            user_id: id,
            email,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("Invalid signing key: {e}")))
}

pub fn generate_token(user: &User, secret: &str, lifetime_hours: i64) -> Result<String, ApiError> {
    let key = signing_key(secret)?;
    let claims = TokenClaims::new(user.id, user.email.to_owned(), lifetime_hours)?;

    claims
        .sign_with_key(&key)
        .map_err(|e| ApiError::Internal(format!("Failed to sign token: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<TokenClaims, ApiError> {
    let key = signing_key(secret)?;

    let claims: TokenClaims = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::InvalidToken(MSG_INVALID_TOKEN))?;

    if claims.is_expired() {
        return Err(ApiError::InvalidToken("Invalid token; Token expired"));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            email: "test@example.com".to_string(),
            name: "Test".to_string(),
            password: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }

    #[test]
    fn token_round_trip_keeps_user() {
        let token = generate_token(&sample_user(), "secret", 1).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "test@example.com");
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = generate_token(&sample_user(), "secret", 1).unwrap();

        assert!(matches!(
            verify_token(&token, "another"),
            Err(ApiError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_token(&sample_user(), "secret", -1).unwrap();

        assert!(matches!(
            verify_token(&token, "secret"),
            Err(ApiError::InvalidToken(_))
        ));
    }

    #[test]
    fn out_of_range_lifetime_is_an_error() {
        assert!(matches!(
            generate_token(&sample_user(), "secret", i64::MAX),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_token("not-a-token", "secret").is_err());
    }
}
