use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use thiserror::Error;
use warp::reject::Reject;

use crate::constants::{MSG_NOT_AUTHENTICATED, MSG_NOT_FOUND};

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::new("RowNotFound".to_string()),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new("Pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::new("Pool closed".to_string()),
            sqlx::Error::WorkerCrashed => Self::new("Worker crashed".to_string()),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new("Unknown error".to_string()),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for QueryError {}

/// Field name -> messages, rendered as the body of a 400 response.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.inner {
            self.inner.entry(field).or_default().extend(messages);
        }
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.inner.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{}", MSG_NOT_AUTHENTICATED)]
    NotAuthenticated,

    #[error("{0}")]
    InvalidToken(&'static str),

    #[error("{}", MSG_NOT_FOUND)]
    NotFound,

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        Self::Query(QueryError::from(value))
    }
}

impl Reject for ApiError {}
