use thiserror::Error;

#[derive(Error, Debug)]
pub enum SluiceError {
    #[error("Authentication failed for {identity} after {attempts} attempts: {reason}")]
    Auth {
        identity: String,
        attempts: u32,
        reason: String,
    },

    #[error("Remote lookup timed out after {0:?}")]
    RemoteTimeout(std::time::Duration),

    #[error("Fetch failed for account {account}: {message}")]
    RemoteFetch { account: String, message: String },

    #[error("Malformed credential: {0}")]
    CredentialParse(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl SluiceError {
    /// Whether this failure must abort a whole ingestion call rather than a
    /// single account.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SluiceError::Auth { .. } | SluiceError::InvalidDate(_))
    }
}

pub type Result<T> = std::result::Result<T, SluiceError>;
