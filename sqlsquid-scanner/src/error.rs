use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Request timed out: {0}")]
    FetchTimeout(String),

    #[error("HTTP request failed: {0}")]
    FetchNetworkError(String),

    #[error("Parse error: {0}")]
    ParseFailure(String),

    #[error("A target URL is required")]
    MissingSeed,

    #[error("Failed to read payload file {path}: {source}")]
    PayloadFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Payload file {0} contains no payloads")]
    EmptyPayloadFile(String),

    #[error("Deep scan tool failed: {0}")]
    DeepScanToolFailure(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScanError::FetchTimeout(err.to_string())
        } else {
            ScanError::FetchNetworkError(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
