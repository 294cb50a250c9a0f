//! Error types for Rankify imports
//!
//! Every message is meant to be shown to the person running the import, so
//! each one says what happened and what to do next.

use thiserror::Error;
use uuid::Uuid;

use crate::record::PreviewRow;
use crate::sink::SinkError;

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Reasons an import job can fail
#[derive(Error, Debug)]
pub enum ImportError {
    /// Reading the input failed, even at the smallest read window
    #[error("Could not read the import file: {0}. Check that the file exists and is readable.")]
    Source(#[from] std::io::Error),

    /// The input is not valid delimited text
    #[error("Could not parse the CSV: {0}. Check the file is comma-separated with a header row.")]
    Decode(String),

    /// The upload sink rejected a batch
    #[error(transparent)]
    Upload(#[from] SinkError),

    /// No decode, mapping or upload activity for too long
    #[error("Upload appears stalled (no progress for {idle_secs}s). Please retry; the last finished batch was saved.")]
    Stalled { idle_secs: u64 },

    /// The caller cancelled the job
    #[error("Import cancelled. Batches uploaded before cancellation were saved.")]
    Cancelled,

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or command-line flags.")]
    Config(String),

    /// A Rankify API call outside batch delivery failed
    #[error("Rankify API request failed: {0}. Check the server URL and your connection.")]
    Api(#[from] reqwest::Error),

    /// A pipeline task ended unexpectedly
    #[error("Internal import error: {0}")]
    Internal(String),
}

impl ImportError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable class for logs
    pub fn class(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Decode(_) => "decode",
            Self::Upload(e) => e.class(),
            Self::Stalled { .. } => "stalled",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
            Self::Api(_) => "api",
            Self::Internal(_) => "internal",
        }
    }
}

/// A failed job together with everything it achieved before failing.
///
/// Counters are never rolled back: `uploaded` records that were accepted by
/// the sink stay created.
#[derive(Debug, Error)]
#[error("{error} (processed {processed} rows, uploaded {uploaded} records in {batches} batches)")]
pub struct ImportFailure {
    pub job_id: Uuid,
    #[source]
    pub error: ImportError,
    pub processed: u64,
    pub uploaded: u64,
    pub batches: u64,
    pub preview: Vec<PreviewRow>,
}
