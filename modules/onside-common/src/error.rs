use thiserror::Error;

#[derive(Error, Debug)]
pub enum OnsideError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("External service error ({service}): {message}")]
    External { service: String, message: String },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl OnsideError {
    pub fn not_found(what: impl Into<String>) -> Self {
        OnsideError::NotFound(what.into())
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        OnsideError::External {
            service: service.into(),
            message: message.into(),
        }
    }
}

pub type OnsideResult<T> = Result<T, OnsideError>;
