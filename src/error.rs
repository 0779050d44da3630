//! Error types for the betting advisor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid trigger spec '{spec}': {reason}")]
    InvalidTrigger { spec: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error ({status}): {body}")]
    Telegram { status: u16, body: String },

    #[error("Job '{job}' timed out after {timeout_secs}s")]
    JobTimeout { job: String, timeout_secs: u64 },

    #[error("Job '{job}' failed: {message}")]
    JobFailed { job: String, message: String },
}

impl AdvisorError {
    /// Whether a delivery failure is worth retrying.
    ///
    /// Network-level errors and rate-limit / server-side HTTP statuses are
    /// transient; client-side statuses (bad token, bad chat id) are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            AdvisorError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            AdvisorError::Telegram { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
