//! Progress and preview reporting
//!
//! The reporter owns the job's counters, the capped preview sample and the
//! status broadcast. It publishes through `watch` channels and an optional
//! [`ImportObserver`]. Nothing here can fail the job: observer panics are
//! caught and logged.

use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::types::ImportStatus;
use crate::record::PreviewRow;

/// Point-in-time counters for one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Data rows seen, including skipped ones
    pub processed: u64,
    /// Records the sink reported as created
    pub uploaded: u64,
    /// Rows dropped for lacking a name
    pub skipped: u64,
    /// Batches delivered successfully
    pub batches: u64,
}

/// Callbacks for callers that want push-style updates.
///
/// All methods have empty defaults. Implementations run on the job's task
/// and should return quickly.
pub trait ImportObserver: Send + Sync {
    fn on_progress(&self, _progress: &ProgressSnapshot) {}

    fn on_preview(&self, _preview: &[PreviewRow]) {}

    fn on_status_change(&self, _status: ImportStatus) {}
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct ProgressReporter {
    job_id: Uuid,
    snapshot: ProgressSnapshot,
    preview: Vec<PreviewRow>,
    preview_limit: usize,
    progress_every: u64,
    since_progress: u64,
    status_tx: watch::Sender<ImportStatus>,
    progress_tx: watch::Sender<ProgressSnapshot>,
    observer: Option<Arc<dyn ImportObserver>>,
}

impl ProgressReporter {
    pub fn new(
        job_id: Uuid,
        preview_limit: usize,
        progress_every: usize,
        status_tx: watch::Sender<ImportStatus>,
        progress_tx: watch::Sender<ProgressSnapshot>,
        observer: Option<Arc<dyn ImportObserver>>,
    ) -> Self {
        Self {
            job_id,
            snapshot: ProgressSnapshot::default(),
            preview: Vec::with_capacity(preview_limit),
            preview_limit,
            progress_every: progress_every.max(1) as u64,
            since_progress: 0,
            status_tx,
            progress_tx,
            observer,
        }
    }

    pub fn status(&self) -> ImportStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ImportStatus> {
        self.status_tx.subscribe()
    }

    /// Move to `next` if the lifecycle allows it; invalid moves are logged and ignored
    pub fn set_status(&mut self, next: ImportStatus) {
        let current = self.status();
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            tracing::warn!(
                job_id = %self.job_id,
                from = %current,
                to = %next,
                "Ignoring invalid status transition"
            );
            return;
        }

        self.status_tx.send_replace(next);
        tracing::debug!(job_id = %self.job_id, from = %current, to = %next, "Status changed");
        self.notify("on_status_change", |observer| observer.on_status_change(next));
    }

    /// Count one accepted row
    pub fn record_processed(&mut self) {
        self.snapshot.processed += 1;
        self.since_progress += 1;
        if self.since_progress >= self.progress_every {
            self.publish_progress();
        }
    }

    /// Count one row dropped for lacking its identifying field
    pub fn record_skipped(&mut self) {
        self.snapshot.skipped += 1;
        self.record_processed();
    }

    /// Keep `row` if the preview is not full yet
    pub fn sample_preview(&mut self, row: PreviewRow) {
        if self.preview.len() >= self.preview_limit {
            return;
        }
        self.preview.push(row);
        self.notify("on_preview", |observer| observer.on_preview(&self.preview));
    }

    /// Credit a successfully delivered batch
    pub fn record_flush(&mut self, created: u64) {
        self.snapshot.uploaded += created;
        self.snapshot.batches += 1;
        self.publish_progress();
    }

    /// Publish the final counters
    pub fn finish(&mut self) {
        self.publish_progress();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot
    }

    pub fn preview(&self) -> &[PreviewRow] {
        &self.preview
    }

    pub fn into_preview(self) -> Vec<PreviewRow> {
        self.preview
    }

    fn publish_progress(&mut self) {
        self.since_progress = 0;
        let snapshot = self.snapshot;
        self.progress_tx.send_replace(snapshot);
        tracing::debug!(
            job_id = %self.job_id,
            processed = snapshot.processed,
            uploaded = snapshot.uploaded,
            batches = snapshot.batches,
            "Progress"
        );
        self.notify("on_progress", |observer| observer.on_progress(&snapshot));
    }

    fn notify(&self, callback: &'static str, call: impl FnOnce(&dyn ImportObserver)) {
        let Some(observer) = &self.observer else {
            return;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| call(observer.as_ref()))) {
            tracing::warn!(
                job_id = %self.job_id,
                callback,
                panic = %panic_message(&*panic),
                "Import observer panicked"
            );
        }
    }
}
