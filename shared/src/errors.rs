/// Unified error types for the Clipdrop system.
use thiserror::Error;

/// Top-level error type for the Clipdrop system.
#[derive(Debug, Error)]
pub enum ClipdropError {
    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// User-facing failures of the fetch -> select -> transfer path.
///
/// Every variant renders as a single message suitable for the client's
/// error state. None of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Please enter a valid YouTube URL")]
    InvalidLocator,

    #[error("Playlist URL detected. Please share a link to a specific video from the playlist.")]
    CollectionOnlyLocator,

    #[error("{0}")]
    Resolution(String),

    #[error("No suitable format found")]
    NoSuitableVariant,

    #[error("{0}")]
    Transfer(String),
}

impl FetchError {
    /// Whether the caller sent something unusable (as opposed to an upstream failure).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidLocator
                | FetchError::CollectionOnlyLocator
                | FetchError::NoSuitableVariant
        )
    }

    /// Resolution failure with the default message when the provider gave none.
    pub fn resolution(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            FetchError::Resolution("Failed to fetch video info".to_string())
        } else {
            FetchError::Resolution(message)
        }
    }

    /// Transfer failure with the default message when the provider gave none.
    pub fn transfer(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            FetchError::Transfer("Download failed".to_string())
        } else {
            FetchError::Transfer(message)
        }
    }
}

/// Result type alias for Clipdrop operations.
pub type ClipdropResult<T> = Result<T, ClipdropError>;
