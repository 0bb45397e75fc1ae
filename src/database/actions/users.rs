use crate::{
    authentication::{
        cryptography::{hash_password, unusable_password, verify_password},
        jwt::generate_token,
    },
    constants::{MSG_BAD_CREDENTIALS, MSG_EMAIL_TAKEN, MSG_NO_EMAIL},
    error::{ApiError, FieldErrors},
    schema::{Id, User},
};

use log::info;
use sqlx::{Pool, Postgres};

/// Extra columns accepted by [`create_user`].
#[derive(Debug, Clone)]
pub struct UserFields {
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Default for UserFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Lowercases the domain part of an address, leaving the local part as given.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();

    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn email_taken() -> ApiError {
    ApiError::Validation(FieldErrors::single("email", MSG_EMAIL_TAKEN))
}

fn map_write_error(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => email_taken(),
        _ => e.into(),
    }
}

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// True when another user than `exclude` already owns `email`.
pub async fn is_email_taken(
    email: &str,
    exclude: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let row: Option<(Id,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id IS DISTINCT FROM $2")
            .bind(email)
            .bind(exclude)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Creates a user keyed by `email`. Without a password the stored hash is unusable.
pub async fn create_user(
    email: Option<&str>,
    password: Option<&str>,
    fields: UserFields,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    let email = match email.map(str::trim) {
        Some(email) if !email.is_empty() => normalize_email(email),
        _ => {
            return Err(ApiError::Validation(FieldErrors::single(
                "email",
                MSG_NO_EMAIL,
            )))
        }
    };

    let password = match password {
        Some(password) => hash_password(password)?,
        None => unusable_password(),
    };

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, name, password, is_active, is_staff, is_superuser)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
    ",
    )
    .bind(&email)
    .bind(&fields.name)
    .bind(password)
    .bind(fields.is_active)
    .bind(fields.is_staff)
    .bind(fields.is_superuser)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;

    info!("Created user {}", user.id);

    Ok(user)
}

pub async fn create_superuser(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    let fields = UserFields {
        is_staff: true,
        is_superuser: true,
        ..UserFields::default()
    };

    create_user(Some(email), Some(password), fields, pool).await
}

/// Applies the supplied changes; a new password is hashed, a new email normalized.
pub async fn update_user(
    user_id: Id,
    changes: UserChanges,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    let password = match changes.password {
        Some(password) => Some(hash_password(&password)?),
        None => None,
    };
    let email = changes.email.as_deref().map(normalize_email);

    let user: User = sqlx::query_as(
        "
        UPDATE users SET
        email = COALESCE($1, email),
        name = COALESCE($2, name),
        password = COALESCE($3, password)
        WHERE id = $4
        RETURNING *
    ",
    )
    .bind(email)
    .bind(changes.name)
    .bind(password)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;

    Ok(user)
}

/// Exchanges credentials for a signed token.
pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    lifetime_hours: i64,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let invalid = || ApiError::Validation(FieldErrors::single("non_field_errors", MSG_BAD_CREDENTIALS));

    let user = get_user_by_email(pool, &normalize_email(email))
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active || !verify_password(password, &user.password) {
        return Err(invalid());
    }

    generate_token(&user, secret, lifetime_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_domain_only() {
        assert_eq!(normalize_email("nilo@NILO.coM"), "nilo@nilo.com");
        assert_eq!(normalize_email("Nilo@Example.COM"), "Nilo@example.com");
        assert_eq!(normalize_email("  test@EXAMPLE.com "), "test@example.com");
    }

    #[test]
    fn normalize_keeps_addresses_without_domain() {
        assert_eq!(normalize_email("nilo.com"), "nilo.com");
    }

    #[test]
    fn default_fields_are_active_regular_user() {
        let fields = UserFields::default();

        assert!(fields.is_active);
        assert!(!fields.is_staff);
        assert!(!fields.is_superuser);
    }

    #[tokio::test]
    async fn create_user_without_email_fails_before_querying() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        for email in [None, Some(""), Some("   ")] {
            let result = create_user(email, Some("12345"), UserFields::default(), &pool).await;

            match result {
                Err(ApiError::Validation(errors)) => {
                    assert_eq!(errors.get("email").unwrap(), &vec![MSG_NO_EMAIL.to_string()])
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }
}
