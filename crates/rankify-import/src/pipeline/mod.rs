//! Import pipeline
//!
//! One job runs as three tokio tasks:
//!
//! - the **decoder**, which reads the source and sends row chunks over a
//!   channel of capacity one,
//! - the **job task**, which drives the [`BatchAccumulator`] and owns the
//!   [`ProgressReporter`],
//! - the [`StallWatchdog`], which aborts the job when no stage makes progress.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rankify_import::decoder::FileSource;
//! use rankify_import::pipeline::Importer;
//! use rankify_import::{DryRunSink, ImportMode, PipelineConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let importer = Importer::new(PipelineConfig::default(), Arc::new(DryRunSink));
//! let job = importer.start(Arc::new(FileSource::new("lawyers.csv")), ImportMode::Business, 4);
//! let summary = job.wait().await?;
//! println!("created {} records", summary.uploaded);
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod progress;
pub mod types;
pub mod watchdog;

pub use accumulator::BatchAccumulator;
pub use progress::{ImportObserver, ProgressReporter, ProgressSnapshot};
pub use types::{AbortReason, AbortSignal, ActivityClock, Batch, ImportStatus};
pub use watchdog::StallWatchdog;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::decoder::{ChunkedDecoder, DecoderEvent, ImportSource};
use crate::error::{ImportError, ImportFailure};
use crate::record::{CategoryId, ImportMode, PreviewRow, RecordMapper};
use crate::sink::UploadSink;

/// Row chunks buffered between decoder and accumulator
const DECODER_CHANNEL_CAPACITY: usize = 1;

/// Outcome of a successful job
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub job_id: Uuid,
    pub mode: ImportMode,
    pub category_id: CategoryId,
    pub processed: u64,
    pub uploaded: u64,
    pub skipped: u64,
    pub batches: u64,
    pub preview: Vec<PreviewRow>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Starts import jobs against one sink
#[derive(Clone)]
pub struct Importer {
    config: PipelineConfig,
    sink: Arc<dyn UploadSink>,
    observer: Option<Arc<dyn ImportObserver>>,
}

impl Importer {
    pub fn new(config: PipelineConfig, sink: Arc<dyn UploadSink>) -> Self {
        Self {
            config,
            sink,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ImportObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Spawn a job; must be called inside a tokio runtime
    pub fn start(
        &self,
        source: Arc<dyn ImportSource>,
        mode: ImportMode,
        category_id: CategoryId,
    ) -> JobHandle {
        let id = Uuid::new_v4();
        let (status_tx, status_rx) = watch::channel(ImportStatus::Idle);
        let (progress_tx, progress_rx) = watch::channel(ProgressSnapshot::default());
        let abort = AbortSignal::new();

        let reporter = ProgressReporter::new(
            id,
            self.config.preview_limit,
            self.config.progress_every,
            status_tx,
            progress_tx,
            self.observer.clone(),
        );
        let job = Job {
            id,
            config: self.config.clone(),
            sink: self.sink.clone(),
            source,
            mapper: RecordMapper::new(mode, category_id),
            abort: abort.clone(),
            reporter,
        };

        JobHandle {
            id,
            abort,
            status: status_rx,
            progress: progress_rx,
            task: tokio::spawn(job.run()),
        }
    }

    /// Start a job and wait for it
    pub async fn run(
        &self,
        source: Arc<dyn ImportSource>,
        mode: ImportMode,
        category_id: CategoryId,
    ) -> Result<ImportSummary, ImportFailure> {
        self.start(source, mode, category_id).wait().await
    }
}

/// Caller's view of a running job
pub struct JobHandle {
    id: Uuid,
    abort: AbortSignal,
    status: watch::Receiver<ImportStatus>,
    progress: watch::Receiver<ProgressSnapshot>,
    task: JoinHandle<Result<ImportSummary, ImportFailure>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the job to stop at the next row boundary.
    ///
    /// A batch upload already in flight is allowed to finish.
    pub fn cancel(&self) {
        self.abort.cancel();
    }

    /// Cancellation handle that outlives [`JobHandle::wait`]
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub fn status(&self) -> ImportStatus {
        *self.status.borrow()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        *self.progress.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ImportStatus> {
        self.status.clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.clone()
    }

    pub async fn wait(self) -> Result<ImportSummary, ImportFailure> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                let progress = *self.progress.borrow();
                Err(ImportFailure {
                    job_id: self.id,
                    error: ImportError::internal(format!("import task ended unexpectedly: {}", e)),
                    processed: progress.processed,
                    uploaded: progress.uploaded,
                    batches: progress.batches,
                    preview: Vec::new(),
                })
            }
        }
    }
}

struct Job {
    id: Uuid,
    config: PipelineConfig,
    sink: Arc<dyn UploadSink>,
    source: Arc<dyn ImportSource>,
    mapper: RecordMapper,
    abort: AbortSignal,
    reporter: ProgressReporter,
}

impl Job {
    async fn run(self) -> Result<ImportSummary, ImportFailure> {
        let Job {
            id,
            config,
            sink,
            source,
            mapper,
            abort,
            mut reporter,
        } = self;
        let started = Instant::now();
        let started_at = Utc::now();

        if let Err(e) = config.validate() {
            reporter.set_status(ImportStatus::Failed);
            return Err(failure(id, ImportError::config(e.to_string()), reporter));
        }

        tracing::info!(
            job_id = %id,
            source = %source.name(),
            mode = %mapper.mode(),
            category_id = mapper.category_id(),
            batch_size = config.batch_size,
            "Import started"
        );

        let clock = ActivityClock::new();
        reporter.set_status(ImportStatus::Decoding);
        let watchdog = StallWatchdog::new(
            clock.clone(),
            config.watchdog,
            reporter.subscribe_status(),
            abort.clone(),
        )
        .spawn();

        let (tx, rx) = mpsc::channel(DECODER_CHANNEL_CAPACITY);
        let decoder = ChunkedDecoder::new(source, config.decoder, clock.clone());
        let decoder_task = tokio::spawn(decoder.run(tx, abort.token().clone()));

        let mut accumulator = BatchAccumulator::new(
            mapper,
            config.batch_size,
            config.retry,
            sink,
            clock,
            abort.clone(),
            reporter,
        );
        let outcome = drive(&mut accumulator, rx, &abort).await;

        decoder_task.abort();
        let mut reporter = accumulator.into_reporter();
        reporter.finish();

        let result = match outcome {
            Ok(()) => {
                reporter.set_status(ImportStatus::Succeeded);
                let snapshot = reporter.snapshot();
                let elapsed = started.elapsed();
                tracing::info!(
                    job_id = %id,
                    processed = snapshot.processed,
                    uploaded = snapshot.uploaded,
                    skipped = snapshot.skipped,
                    batches = snapshot.batches,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Import succeeded"
                );
                Ok(ImportSummary {
                    job_id: id,
                    mode: mapper.mode(),
                    category_id: mapper.category_id(),
                    processed: snapshot.processed,
                    uploaded: snapshot.uploaded,
                    skipped: snapshot.skipped,
                    batches: snapshot.batches,
                    preview: reporter.into_preview(),
                    started_at,
                    elapsed,
                })
            }
            Err(error) => {
                reporter.set_status(ImportStatus::Failed);
                let snapshot = reporter.snapshot();
                tracing::error!(
                    job_id = %id,
                    class = error.class(),
                    error = %error,
                    processed = snapshot.processed,
                    uploaded = snapshot.uploaded,
                    batches = snapshot.batches,
                    "Import failed"
                );
                Err(failure(id, error, reporter))
            }
        };

        watchdog.abort();
        result
    }
}

fn failure(job_id: Uuid, error: ImportError, reporter: ProgressReporter) -> ImportFailure {
    let snapshot = reporter.snapshot();
    ImportFailure {
        job_id,
        error,
        processed: snapshot.processed,
        uploaded: snapshot.uploaded,
        batches: snapshot.batches,
        preview: reporter.into_preview(),
    }
}

/// Feed decoder events through the accumulator until the job ends
async fn drive(
    accumulator: &mut BatchAccumulator,
    mut rx: mpsc::Receiver<DecoderEvent>,
    abort: &AbortSignal,
) -> Result<(), ImportError> {
    loop {
        let event = tokio::select! {
            biased;
            _ = abort.token().cancelled() => return Err(abort.error()),
            event = rx.recv() => event,
        };

        match event {
            Some(DecoderEvent::Rows(rows)) => {
                for raw in rows {
                    if abort.is_aborted() {
                        return Err(abort.error());
                    }
                    accumulator.accept(raw).await?;
                }
            }
            Some(DecoderEvent::Completed { rows }) => {
                tracing::debug!(rows, pending = accumulator.pending(), "Flushing final batch");
                return accumulator.finish().await;
            }
            Some(DecoderEvent::Failed(e)) => return Err(e),
            None if abort.is_aborted() => return Err(abort.error()),
            None => return Err(ImportError::internal("decoder stopped without completing")),
        }
    }
}
