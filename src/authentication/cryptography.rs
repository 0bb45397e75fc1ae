use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    constants::{UNUSABLE_PASSWORD_PREFIX, UNUSABLE_PASSWORD_SUFFIX_LENGTH},
    error::ApiError,
};

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?
        .to_string())
}

/// Stored in place of a hash for users created without a password.
pub fn unusable_password() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UNUSABLE_PASSWORD_SUFFIX_LENGTH)
        .map(char::from)
        .collect();

    format!("{UNUSABLE_PASSWORD_PREFIX}{suffix}")
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if password_hash.starts_with(UNUSABLE_PASSWORD_PREFIX) {
        return false;
    }

    let argon2 = Argon2::default();
    match PasswordHash::new(password_hash) {
        Ok(parsed_hash) => argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("testpass123").unwrap();

        assert_ne!(hash, "testpass123");
        assert!(verify_password("testpass123", &hash));
        assert!(!verify_password("wrongpass", &hash));
    }

    #[test]
    fn unusable_password_never_verifies() {
        let marker = unusable_password();

        assert!(marker.starts_with(UNUSABLE_PASSWORD_PREFIX));
        assert!(!verify_password("", &marker));
        assert!(!verify_password(&marker, &marker));
    }
}
