//! Rankify Import Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Streams large CSV files of business and provider listings into the
//! Rankify directory without loading them into memory.
//!
//! # Pipeline
//!
//! - **Decoder**: reads the source in byte windows, parses CSV rows and
//!   canonicalizes the header row
//! - **Accumulator**: collapses duplicate columns, maps and normalizes each
//!   row, and uploads fixed-size batches strictly in order
//! - **Upload sink**: the Rankify bulk-create API, or a dry run
//! - **Watchdog**: fails the job when nothing has progressed for too long
//!
//! Batches that were uploaded before a failure stay uploaded; the failure
//! reports how far the job got.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rankify_import::{ApiClient, FileSource, ImportMode, Importer, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(ApiClient::from_env()?);
//!     let category = client.resolve_category("personal-injury").await?;
//!     let importer = Importer::new(PipelineConfig::from_env()?, client);
//!     let summary = importer
//!         .run(Arc::new(FileSource::new("lawyers.csv")), ImportMode::Business, category)
//!         .await?;
//!     println!("{} records created", summary.uploaded);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod console;
pub mod decoder;
pub mod error;
pub mod headers;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod sample;
pub mod sink;

pub use api::ApiClient;
pub use config::{ApiConfig, DecoderConfig, ImportConfig, PipelineConfig, RetryPolicy, WatchdogConfig};
pub use decoder::{FileSource, ImportSource, MemorySource, ReaderSource};
pub use error::{ImportError, ImportFailure, Result};
pub use pipeline::{
    Batch, ImportObserver, ImportStatus, ImportSummary, Importer, JobHandle, ProgressSnapshot,
};
pub use record::{CategoryId, ImportMode, NormalizedRecord, PreviewRow, RawRecord};
pub use sink::{DryRunSink, SinkError, UploadSink};
