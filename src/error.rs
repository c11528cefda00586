use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl AppError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

/// Local persistence failures. Never recovered inside the engine.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("connection: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Remote source failures for a single topic.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed response body: {0}")]
    Body(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
#[error("{field}: {reason}")]
pub struct MappingError {
    pub field: &'static str,
    pub reason: String,
}

impl From<tokio_rusqlite::Error> for AppError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        AppError::Storage(err.into())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(err.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Fetch(err.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
