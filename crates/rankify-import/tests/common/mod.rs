//! Shared helpers for rankify-import integration tests
//!
//! Provides recording and failing upload sinks, misbehaving sources, and CSV
//! builders so each test can describe its scenario in a few lines.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use bytes::Bytes;
use rankify_import::decoder::BoxedReader;
use rankify_import::{
    Batch, DecoderConfig, ImportMode, ImportSource, MemorySource, NormalizedRecord, PipelineConfig,
    SinkError, UploadSink, WatchdogConfig,
};
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a sink saw for one delivered batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub index: u64,
    pub len: usize,
    pub is_final: bool,
    pub names: Vec<String>,
}

/// Sink that accepts every batch and remembers it
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Delivered>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<Delivered> {
        self.batches.lock().unwrap().clone()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.batches().iter().map(|b| b.len).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.batches().into_iter().flat_map(|b| b.names).collect()
    }

    fn record(&self, batch: &Batch) {
        self.batches.lock().unwrap().push(Delivered {
            index: batch.index,
            len: batch.len(),
            is_final: batch.is_final,
            names: batch
                .records
                .iter()
                .map(|r: &NormalizedRecord| r.identity().to_string())
                .collect(),
        });
    }
}

#[async_trait]
impl UploadSink for RecordingSink {
    async fn deliver(&self, _mode: ImportMode, batch: &Batch) -> Result<u64, SinkError> {
        self.record(batch);
        Ok(batch.len() as u64)
    }
}

/// How a [`ScriptedSink`] treats the batch it is configured to fail on
#[derive(Debug, Clone)]
pub enum Failure {
    /// Return this error on every attempt
    Always(SinkError),
    /// Return this error on the first `n` attempts, then succeed
    Times(usize, SinkError),
    /// Never return
    Hang,
}

/// Sink that misbehaves on one batch index and records the others
pub struct ScriptedSink {
    fail_on: u64,
    failure: Failure,
    attempts: AtomicUsize,
    inner: RecordingSink,
}

impl ScriptedSink {
    pub fn new(fail_on: u64, failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            fail_on,
            failure,
            attempts: AtomicUsize::new(0),
            inner: RecordingSink::default(),
        })
    }

    /// Attempts made against the failing batch
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Delivered> {
        self.inner.batches()
    }
}

#[async_trait]
impl UploadSink for ScriptedSink {
    async fn deliver(&self, mode: ImportMode, batch: &Batch) -> Result<u64, SinkError> {
        if batch.index == self.fail_on {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Failure::Always(e) => return Err(e.clone()),
                Failure::Times(n, e) if attempt < *n => return Err(e.clone()),
                Failure::Times(..) => {}
                Failure::Hang => std::future::pending::<()>().await,
            }
        }
        self.inner.deliver(mode, batch).await
    }
}

/// Source whose reads never complete
pub struct StallingSource;

#[async_trait]
impl ImportSource for StallingSource {
    fn name(&self) -> String {
        "stalling".to_string()
    }

    async fn read_window(&self, _offset: u64, _len: usize) -> io::Result<Bytes> {
        std::future::pending().await
    }

    async fn open(&self) -> io::Result<BoxedReader> {
        std::future::pending().await
    }
}

/// In-memory source that fails positional reads larger than `max_window`
pub struct FlakySource {
    inner: MemorySource,
    max_window: usize,
    requests: Mutex<Vec<usize>>,
}

impl FlakySource {
    pub fn new(data: impl Into<Bytes>, max_window: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemorySource::new("flaky", data),
            max_window,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Window sizes requested, in order
    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImportSource for FlakySource {
    fn name(&self) -> String {
        self.inner.name()
    }

    async fn read_window(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        self.requests.lock().unwrap().push(len);
        if len > self.max_window {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "window too large"));
        }
        self.inner.read_window(offset, len).await
    }

    async fn open(&self) -> io::Result<BoxedReader> {
        self.inner.open().await
    }
}

/// In-memory source that remembers the furthest byte it has served
pub struct TrackingSource {
    inner: MemorySource,
    high_water: AtomicU64,
}

impl TrackingSource {
    pub fn new(data: impl Into<Bytes>) -> Arc<Self> {
        Arc::new(Self {
            inner: MemorySource::new("tracking", data),
            high_water: AtomicU64::new(0),
        })
    }

    /// End offset of the furthest window read so far
    pub fn high_water(&self) -> u64 {
        self.high_water.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImportSource for TrackingSource {
    fn name(&self) -> String {
        self.inner.name()
    }

    async fn read_window(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        let bytes = self.inner.read_window(offset, len).await?;
        self.high_water
            .fetch_max(offset + bytes.len() as u64, Ordering::SeqCst);
        Ok(bytes)
    }

    async fn open(&self) -> io::Result<BoxedReader> {
        self.inner.open().await
    }
}

pub const HEADER: &str = "Name,Street Address,City,State,Zip,Phone,Image URL";

/// One business row; an empty `name` produces a row that will be skipped
pub fn row(name: &str) -> String {
    format!("{},1 Main St,Austin,Texas,78701,(512) 555-0199,", name)
}

/// A CSV with `rows` data rows named `Firm 1..=rows`, blanking the names
/// at the given 1-based positions
pub fn csv_with_rows(rows: usize, nameless: &[usize]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for i in 1..=rows {
        let name = if nameless.contains(&i) {
            String::new()
        } else {
            format!("Firm {}", i)
        };
        out.push_str(&row(&name));
        out.push('\n');
    }
    out
}

pub fn memory_source(data: impl Into<String>) -> Arc<dyn ImportSource> {
    Arc::new(MemorySource::new("test.csv", data.into()))
}

/// Pipeline settings sized for tests: small windows and batches
pub fn test_config(batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        preview_limit: 100,
        progress_every: batch_size,
        decoder: DecoderConfig {
            window_bytes: 512,
            min_window_bytes: 64,
        },
        watchdog: WatchdogConfig {
            stall_timeout_secs: 90,
            interval_secs: 10,
        },
        ..PipelineConfig::default()
    }
}
