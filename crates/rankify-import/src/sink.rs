//! Upload sink abstraction
//!
//! The accumulator hands each full batch to an [`UploadSink`] and waits for it
//! to resolve before decoding continues. The HTTP implementation lives in
//! [`crate::api::ApiClient`]; [`DryRunSink`] accepts everything locally.

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::Batch;
use crate::record::ImportMode;

/// Why a batch could not be delivered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Credentials missing, expired or lacking the admin role
    #[error("Your session expired or you don't have permission to bulk import. Please sign in as an admin and try again.")]
    Unauthorized { status: u16 },

    /// The request for one batch timed out
    #[error("Network/server timeout while uploading batch {batch}. Earlier batches were saved; you can retry from this batch.")]
    Timeout { batch: u64 },

    /// The remote answered with an error
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },

    /// The request never got an answer
    #[error("Upload failed: {0}")]
    Transport(String),
}

impl SinkError {
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::Timeout { .. } => "timeout",
            Self::Rejected { .. } => "rejected",
            Self::Transport(_) => "transport",
        }
    }

    /// Whether resending the same batch could succeed.
    ///
    /// Only consulted when batch retries are enabled.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Rejected {
                status: Some(status),
                ..
            } => *status == 409 || *status >= 500,
            Self::Rejected { status: None, .. } | Self::Unauthorized { .. } => false,
        }
    }
}

/// Destination for batches of normalized records
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Deliver one batch, returning how many records the remote created.
    ///
    /// `batch.is_final` asks the remote to recompute aggregates after this
    /// batch; interior batches never do.
    async fn deliver(&self, mode: ImportMode, batch: &Batch) -> Result<u64, SinkError>;
}

/// Sink that accepts every batch without network I/O
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSink;

#[async_trait]
impl UploadSink for DryRunSink {
    async fn deliver(&self, mode: ImportMode, batch: &Batch) -> Result<u64, SinkError> {
        tracing::debug!(
            mode = %mode,
            batch = batch.index,
            records = batch.records.len(),
            is_final = batch.is_final,
            "Dry run: batch accepted"
        );
        Ok(batch.records.len() as u64)
    }
}
