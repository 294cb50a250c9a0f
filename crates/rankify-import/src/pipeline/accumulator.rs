//! Batch accumulator
//!
//! Receives decoded rows in source order, maps and normalizes them, and
//! flushes full batches to the sink one at a time. While a flush is in
//! flight the accumulator is not reading from the decoder channel, so the
//! decoder blocks on its bounded send.

use std::sync::Arc;

use super::progress::ProgressReporter;
use super::types::{AbortSignal, ActivityClock, Batch, ImportStatus};
use crate::config::RetryPolicy;
use crate::error::ImportError;
use crate::headers::collapse_duplicates;
use crate::record::{NormalizedRecord, RawRecord, RecordMapper};
use crate::sink::UploadSink;

pub struct BatchAccumulator {
    mapper: RecordMapper,
    batch_size: usize,
    retry: RetryPolicy,
    sink: Arc<dyn UploadSink>,
    current: Vec<NormalizedRecord>,
    next_index: u64,
    clock: ActivityClock,
    abort: AbortSignal,
    reporter: ProgressReporter,
}

impl BatchAccumulator {
    pub fn new(
        mapper: RecordMapper,
        batch_size: usize,
        retry: RetryPolicy,
        sink: Arc<dyn UploadSink>,
        clock: ActivityClock,
        abort: AbortSignal,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            mapper,
            batch_size: batch_size.max(1),
            retry,
            sink,
            current: Vec::with_capacity(batch_size.max(1)),
            next_index: 0,
            clock,
            abort,
            reporter,
        }
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    pub fn into_reporter(self) -> ProgressReporter {
        self.reporter
    }

    /// Records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// Take one decoded row; flushes when the batch fills up
    pub async fn accept(&mut self, raw: RawRecord) -> Result<(), ImportError> {
        let mapped = self.mapper.map(&collapse_duplicates(raw));
        self.clock.touch();

        if mapped.identity().is_empty() {
            self.reporter.record_skipped();
            return Ok(());
        }

        self.reporter.sample_preview(mapped.preview_row());
        self.current.push(mapped.normalize());
        self.reporter.record_processed();

        if self.current.len() >= self.batch_size {
            self.flush(false).await?;
        }
        Ok(())
    }

    /// Flush whatever is left as the final batch, even when empty
    pub async fn finish(&mut self) -> Result<(), ImportError> {
        self.flush(true).await
    }

    async fn flush(&mut self, is_final: bool) -> Result<(), ImportError> {
        let batch = Batch::new(self.next_index, std::mem::take(&mut self.current), is_final);
        self.reporter.set_status(ImportStatus::Uploading);
        self.clock.touch();

        let created = self.deliver(&batch).await?;

        self.next_index += 1;
        self.clock.touch();
        self.reporter.record_flush(created);
        if !is_final {
            self.current.reserve(self.batch_size);
            self.reporter.set_status(ImportStatus::Decoding);
        }
        Ok(())
    }

    /// One sink call per attempt. Only a stall interrupts an attempt in flight.
    async fn deliver(&self, batch: &Batch) -> Result<u64, ImportError> {
        let mode = self.mapper.mode();
        let mut attempt = 0u32;

        loop {
            let result = tokio::select! {
                biased;
                _ = self.abort.stall_token().cancelled() => return Err(self.abort.error()),
                result = self.sink.deliver(mode, batch) => result,
            };

            match result {
                Ok(created) => {
                    tracing::info!(
                        batch = batch.index,
                        records = batch.len(),
                        created,
                        is_final = batch.is_final,
                        "Batch uploaded"
                    );
                    return Ok(created);
                }
                Err(e) if attempt < self.retry.max_retries && e.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        batch = batch.index,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "Batch upload failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.abort.stall_token().cancelled() => return Err(self.abort.error()),
                        _ = tokio::time::sleep(self.retry.backoff()) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(
                        batch = batch.index,
                        records = batch.len(),
                        is_final = batch.is_final,
                        class = e.class(),
                        error = %e,
                        "Batch upload failed"
                    );
                    return Err(e.into());
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pipeline::ProgressSnapshot;
    use crate::record::ImportMode;
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::watch;
    use uuid::Uuid;

    #[derive(Default)]
    struct Sink {
        batches: Mutex<Vec<(u64, usize, bool)>>,
        fail_on: Option<u64>,
    }

    #[async_trait]
    impl UploadSink for Sink {
        async fn deliver(&self, _mode: ImportMode, batch: &Batch) -> Result<u64, SinkError> {
            if self.fail_on == Some(batch.index) {
                return Err(SinkError::rejected(Some(400), "name: This field is required."));
            }
            self.batches
                .lock()
                .unwrap()
                .push((batch.index, batch.len(), batch.is_final));
            Ok(batch.len() as u64)
        }
    }

    fn accumulator(sink: Arc<Sink>, batch_size: usize) -> BatchAccumulator {
        let (status_tx, _) = watch::channel(ImportStatus::Decoding);
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        let reporter = ProgressReporter::new(Uuid::nil(), 10, batch_size, status_tx, progress_tx, None);
        BatchAccumulator::new(
            RecordMapper::new(ImportMode::Business, 1),
            batch_size,
            RetryPolicy::none(),
            sink,
            ActivityClock::new(),
            AbortSignal::new(),
            reporter,
        )
    }

    fn named(name: &str) -> RawRecord {
        [("name", name)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_flushes_full_batches_then_final_remainder() {
        let sink = Arc::new(Sink::default());
        let mut acc = accumulator(sink.clone(), 2);
        for name in ["a", "b", "c", "", "d", "e"] {
            acc.accept(named(name)).await.unwrap();
        }
        acc.finish().await.unwrap();

        let batches = sink.batches.lock().unwrap().clone();
        assert_eq!(batches, vec![(0, 2, false), (1, 2, false), (2, 1, true)]);
        let snapshot = acc.reporter().snapshot();
        assert_eq!(snapshot.processed, 6);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.uploaded, 5);
        assert_eq!(acc.reporter().status(), ImportStatus::Uploading);
    }

    #[tokio::test]
    async fn test_empty_final_batch_is_still_delivered() {
        let sink = Arc::new(Sink::default());
        let mut acc = accumulator(sink.clone(), 2);
        acc.accept(named("a")).await.unwrap();
        acc.accept(named("b")).await.unwrap();
        acc.finish().await.unwrap();

        let batches = sink.batches.lock().unwrap().clone();
        assert_eq!(batches, vec![(0, 2, false), (1, 0, true)]);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_earlier_credit() {
        let sink = Arc::new(Sink {
            fail_on: Some(1),
            ..Sink::default()
        });
        let mut acc = accumulator(sink.clone(), 2);
        acc.accept(named("a")).await.unwrap();
        acc.accept(named("b")).await.unwrap();
        acc.accept(named("c")).await.unwrap();
        let err = acc.accept(named("d")).await.unwrap_err();

        assert!(matches!(err, ImportError::Upload(SinkError::Rejected { .. })));
        assert_eq!(acc.reporter().snapshot().uploaded, 2);
        assert_eq!(acc.reporter().snapshot().batches, 1);
    }

    #[tokio::test]
    async fn test_duplicate_columns_collapse_before_mapping() {
        let sink = Arc::new(Sink::default());
        let mut acc = accumulator(sink, 10);
        let raw: RawRecord = [("name", ""), ("name__dup2", "Acme Law")].into_iter().collect();
        acc.accept(raw).await.unwrap();
        assert_eq!(acc.pending(), 1);
        assert_eq!(acc.reporter().preview()[0].name, "Acme Law");
    }
}
