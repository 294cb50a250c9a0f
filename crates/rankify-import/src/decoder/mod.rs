//! Chunked stream decoder
//!
//! Turns an [`ImportSource`] of any size into a sequence of [`RawRecord`]
//! chunks without holding the input in memory. Bytes arrive as windows from
//! [`window::window_stream`], are parsed by `csv-async`, and rows are sent to
//! the accumulator over a bounded channel. When that channel is full the
//! decoder waits, which is how upload backpressure reaches the reader.
//!
//! The first non-blank row is the header row; it is canonicalized once per
//! job. After it, only truly empty lines are skipped. A row of empty cells
//! (`,,,,`) is passed on so it is counted as a nameless row.

pub mod source;
pub mod window;

pub use source::{BoxedReader, FileSource, ImportSource, MemorySource, ReaderSource};
pub use window::{is_transient, window_stream};

use csv_async::{AsyncReaderBuilder, ByteRecord};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::config::DecoderConfig;
use crate::error::ImportError;
use crate::headers::HeaderCanonicalizer;
use crate::pipeline::ActivityClock;
use crate::record::RawRecord;

/// What the decoder tells the accumulator
#[derive(Debug)]
pub enum DecoderEvent {
    /// Rows in source order, roughly one read window's worth
    Rows(Vec<RawRecord>),
    /// End of input; `rows` counts data rows sent (header and empty lines excluded)
    Completed { rows: u64 },
    /// Unrecoverable read or parse failure
    Failed(ImportError),
}

fn is_blank_cell(cell: &[u8]) -> bool {
    cell.iter().all(u8::is_ascii_whitespace)
}

/// Every cell empty; such rows are only skipped before the header
fn is_blank(record: &ByteRecord) -> bool {
    record.iter().all(is_blank_cell)
}

/// A line with no delimiters and nothing but whitespace
fn is_empty_line(record: &ByteRecord) -> bool {
    record.len() <= 1 && is_blank(record)
}

fn csv_error(err: csv_async::Error) -> ImportError {
    let message = err.to_string();
    match err.into_kind() {
        csv_async::ErrorKind::Io(e) => ImportError::Source(e),
        _ => ImportError::decode(message),
    }
}

/// Send unless cancelled; false means the decoder should stop
async fn send(tx: &mpsc::Sender<DecoderEvent>, cancel: &CancellationToken, event: DecoderEvent) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

pub struct ChunkedDecoder {
    source: Arc<dyn ImportSource>,
    config: DecoderConfig,
    clock: ActivityClock,
    canonicalizer: HeaderCanonicalizer,
}

impl ChunkedDecoder {
    pub fn new(source: Arc<dyn ImportSource>, config: DecoderConfig, clock: ActivityClock) -> Self {
        Self {
            source,
            config,
            clock,
            canonicalizer: HeaderCanonicalizer::new(),
        }
    }

    /// Decode the whole source, ending with `Completed` or `Failed`.
    ///
    /// Returns early without a terminal event when `cancel` fires or the
    /// receiver goes away.
    pub async fn run(mut self, tx: mpsc::Sender<DecoderEvent>, cancel: CancellationToken) {
        let source = self.source.name();
        self.canonicalizer.reset();

        match self.decode(&tx, &cancel).await {
            Ok(Some(rows)) => {
                tracing::info!(source = %source, rows, "Decoding complete");
                send(&tx, &cancel, DecoderEvent::Completed { rows }).await;
            }
            Ok(None) => {
                tracing::debug!(source = %source, "Decoder stopped before end of input");
            }
            Err(e) => {
                tracing::error!(source = %source, error = %e, "Decoding failed");
                send(&tx, &cancel, DecoderEvent::Failed(e)).await;
            }
        }
    }

    async fn decode(
        &mut self,
        tx: &mpsc::Sender<DecoderEvent>,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, ImportError> {
        let windows = window_stream(self.source.clone(), self.config, self.clock.clone());
        let reader = StreamReader::new(Box::pin(windows));
        let mut csv = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .create_reader(reader);

        let mut record = ByteRecord::new();
        let mut headers: Option<Vec<String>> = None;
        let mut chunk = Vec::new();
        let mut chunk_bytes = 0usize;
        let mut rows = 0u64;

        loop {
            let more = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                read = csv.read_byte_record(&mut record) => read.map_err(csv_error)?,
            };
            if !more {
                break;
            }
            let skip = if headers.is_some() {
                is_empty_line(&record)
            } else {
                is_blank(&record)
            };
            if skip {
                continue;
            }

            let cells = record.iter().map(|cell| String::from_utf8_lossy(cell).into_owned());
            let Some(header_row) = headers.as_ref() else {
                let canonical = self.canonicalizer.canonicalize_row(cells);
                tracing::debug!(headers = ?canonical, "Canonical header row");
                headers = Some(canonical);
                continue;
            };

            chunk.push(RawRecord::from_row(header_row, cells));
            chunk_bytes += record.as_slice().len();
            rows += 1;
            self.clock.touch();

            if chunk_bytes >= self.config.window_bytes {
                if !send(tx, cancel, DecoderEvent::Rows(std::mem::take(&mut chunk))).await {
                    return Ok(None);
                }
                chunk_bytes = 0;
            }
        }

        if !chunk.is_empty() && !send(tx, cancel, DecoderEvent::Rows(chunk)).await {
            return Ok(None);
        }
        Ok(Some(rows))
    }
}
