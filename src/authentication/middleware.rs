use std::sync::Arc;

use log::debug;
use warp::{reject::Rejection, Filter};

use super::jwt::verify_token;
use crate::{
    actions::users::get_user_by_id,
    constants::{MSG_INVALID_TOKEN, TOKEN_SCHEMES},
    error::ApiError,
    schema::User,
    state::{with_state, State},
};

/// Extracts the token from an `Authorization: <scheme> <token>` header.
pub fn parse_authorization(header: &str) -> Result<&str, ApiError> {
    let mut parts = header.split_whitespace();

    let scheme = parts.next().ok_or(ApiError::NotAuthenticated)?;
    if !TOKEN_SCHEMES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(scheme))
    {
        return Err(ApiError::NotAuthenticated);
    }

    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(token),
        _ => Err(ApiError::InvalidToken(
            "Invalid token header. Token string should not contain spaces.",
        )),
    }
}

pub async fn authenticate(header: Option<String>, state: &State) -> Result<User, ApiError> {
    let header = header.ok_or(ApiError::NotAuthenticated)?;
    let token = parse_authorization(&header)?;
    let claims = verify_token(token, &state.config.secret_key)?;

    match get_user_by_id(&state.pool, claims.user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => {
            debug!("Token for missing or inactive user {}", claims.user_id);
            Err(ApiError::InvalidToken(MSG_INVALID_TOKEN))
        }
    }
}

/// Resolves the bearer token into the calling user or rejects with 401.
pub fn with_user(
    state: Arc<State>,
) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: Arc<State>| async move {
            authenticate(header, &state)
                .await
                .map_err(Rejection::from)
        })
}
