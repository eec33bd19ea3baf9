use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Malformed record for user '{user}': {reason}")]
    MalformedRecord { user: String, reason: String },

    #[error("Invalid concurrency {0}: at least one worker is required")]
    InvalidConcurrency(usize),

    #[error("Line source unavailable: {0}")]
    Source(String),

    #[error("Line sink unavailable: {0}")]
    Sink(String),

    #[error("Skin code {0} could not be resolved")]
    SkinNotFound(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MergeError {
    pub fn malformed(user: impl Into<String>, reason: impl Into<String>) -> Self {
        MergeError::MalformedRecord {
            user: user.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
