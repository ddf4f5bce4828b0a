use axum::extract::multipart::MultipartError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TodoError {
    #[error("Todo {0} not found")]
    NotFound(String),
    #[error("Todo {0} was modified concurrently")]
    Conflict(i64),
    #[error("Todo {0} vanished before it could be deleted")]
    MissingRow(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Blob storage error: {0}")]
    Blob(String),
    #[error("Blob transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid blob endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TodoError {
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound(id.to_string())
    }
}
