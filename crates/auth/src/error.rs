use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or wrong one-time code. Deliberately does not say which.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Required configuration missing: {0}")]
    ConfigurationMissing(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<portal_cache::CacheError> for AuthError {
    fn from(err: portal_cache::CacheError) -> Self {
        AuthError::StorageUnavailable(err.to_string())
    }
}
