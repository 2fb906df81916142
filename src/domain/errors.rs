use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Operation not allowed: {0}")]
    Forbidden(String),
    #[error("Conflicting state: {0}")]
    Conflict(String),
    #[error("Illegal status transition: {0}")]
    InvalidTransition(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Other(err.into())
    }
}
