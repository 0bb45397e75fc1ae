use std::sync::Arc;

use warp::{http::StatusCode, reject::Rejection, Reply};

use crate::{
    actions::users::{
        create_user, is_email_taken, login_user, normalize_email, update_user, UserFields,
    },
    constants::MSG_EMAIL_TAKEN,
    error::{ApiError, FieldErrors},
    schema::{Id, User},
    serializers::{CreateUserPayload, TokenPayload, TokenResponse, UpdateUserPayload, UserResponse},
    state::State,
};

async fn ensure_email_free(
    email: &str,
    exclude: Option<Id>,
    state: &State,
) -> Result<(), ApiError> {
    if is_email_taken(&normalize_email(email), exclude, &state.pool).await? {
        return Err(ApiError::Validation(FieldErrors::single("email", MSG_EMAIL_TAKEN)));
    }
    Ok(())
}

/// `POST /user/create`
pub async fn create_user_view(
    payload: CreateUserPayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let new_user = payload.into_new()?;
    ensure_email_free(&new_user.email, None, &state).await?;

    let fields = UserFields {
        name: new_user.name,
        ..UserFields::default()
    };
    let user = create_user(
        Some(&new_user.email),
        Some(&new_user.password),
        fields,
        &state.pool,
    )
    .await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&UserResponse::from(user)),
        StatusCode::CREATED,
    ))
}

/// `POST /user/token`
pub async fn create_token_view(
    payload: TokenPayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let (email, password) = payload.into_credentials()?;

    let token = login_user(
        &email,
        &password,
        &state.config.secret_key,
        state.config.token_lifetime_hours,
        &state.pool,
    )
    .await?;

    Ok(warp::reply::json(&TokenResponse { token }))
}

/// `GET /user/me`
pub async fn retrieve_me_view(user: User) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&UserResponse::from(user)))
}

/// `PATCH /user/me`
pub async fn update_me_view(
    user: User,
    payload: UpdateUserPayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let changes = payload.into_changes()?;
    if let Some(email) = &changes.email {
        ensure_email_free(email, Some(user.id), &state).await?;
    }

    let user = update_user(user.id, changes, &state.pool).await?;

    Ok(warp::reply::json(&UserResponse::from(user)))
}
