use thiserror::Error;

/// Error taxonomy for a scan run.
///
/// Only two of these abort a scan once it has started: `RetrievalExhausted`
/// and `Sink`. Transport failures are retried inside the adapters, unusable
/// blocks are recorded as skipped, and malformed records are dropped.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Required parameter missing or invalid. Raised before the scan starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The rewarded account address could not be decoded under the
    /// configured SS58 prefix. Raised before the scan starts.
    #[error("invalid account address: {0}")]
    InvalidAddress(String),

    /// A single remote call failed. Transient: retried by the retry
    /// policy and never surfaced to the orchestrator directly.
    #[error("transport error: {0}")]
    Transport(String),

    /// The retry policy ran out of attempts. Fatal: the orchestrator
    /// flushes the pending partial batch and aborts.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetrievalExhausted { attempts: u32, last: String },

    /// A raw record did not have the expected shape. Recoverable: the
    /// record is dropped and the scan continues.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The downstream sink failed to persist a batch.
    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        ScanError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
