//! Byte-window reader
//!
//! Produces the source as a stream of byte windows. Positional reads that
//! fail transiently are retried at half the window size, down to the
//! configured minimum; sources without positional reads are switched to a
//! sequential reader that skips what was already consumed.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use std::io;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use super::source::{BoxedReader, ImportSource};
use crate::config::DecoderConfig;
use crate::pipeline::ActivityClock;

/// Read failures worth retrying with a smaller window
pub fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::InvalidData
            | io::ErrorKind::OutOfMemory
    )
}

enum ReadMode {
    Windowed,
    Sequential(BoxedReader),
    Done,
}

struct WindowReader {
    source: Arc<dyn ImportSource>,
    offset: u64,
    window: usize,
    min_window: usize,
    clock: ActivityClock,
    mode: ReadMode,
}

impl WindowReader {
    async fn next_window(&mut self) -> Option<io::Result<Bytes>> {
        loop {
            let sequential = matches!(self.mode, ReadMode::Sequential(_));
            let outcome = match &mut self.mode {
                ReadMode::Done => return None,
                ReadMode::Windowed => self.source.read_window(self.offset, self.window).await,
                ReadMode::Sequential(reader) => {
                    let mut buf = BytesMut::with_capacity(self.window);
                    reader.read_buf(&mut buf).await.map(|_| buf.freeze())
                }
            };

            match outcome {
                Ok(bytes) if bytes.is_empty() => {
                    self.mode = ReadMode::Done;
                    return None;
                }
                Ok(bytes) => {
                    self.offset += bytes.len() as u64;
                    self.clock.touch();
                    return Some(Ok(bytes));
                }
                Err(e) if !sequential && e.kind() == io::ErrorKind::Unsupported => {
                    tracing::info!(
                        source = %self.source.name(),
                        offset = self.offset,
                        "Positional reads unsupported, switching to sequential reads"
                    );
                    if let Err(e) = self.switch_to_sequential().await {
                        self.mode = ReadMode::Done;
                        return Some(Err(e));
                    }
                }
                Err(e) if !sequential && is_transient(e.kind()) && self.window > self.min_window => {
                    let reduced = (self.window / 2).max(self.min_window);
                    tracing::warn!(
                        source = %self.source.name(),
                        offset = self.offset,
                        error = %e,
                        from = self.window,
                        to = reduced,
                        "Window read failed, retrying with a smaller window"
                    );
                    self.window = reduced;
                }
                Err(e) if sequential && e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::error!(
                        source = %self.source.name(),
                        offset = self.offset,
                        window = self.window,
                        error = %e,
                        "Read failed"
                    );
                    self.mode = ReadMode::Done;
                    return Some(Err(e));
                }
            }
        }
    }

    async fn switch_to_sequential(&mut self) -> io::Result<()> {
        let mut reader = self.source.open().await?;
        if self.offset > 0 {
            let mut consumed = (&mut reader).take(self.offset);
            tokio::io::copy(&mut consumed, &mut tokio::io::sink()).await?;
        }
        self.mode = ReadMode::Sequential(reader);
        Ok(())
    }
}

/// Stream the source as byte windows of at most `config.window_bytes`
pub fn window_stream(
    source: Arc<dyn ImportSource>,
    config: DecoderConfig,
    clock: ActivityClock,
) -> impl Stream<Item = io::Result<Bytes>> + Send {
    let reader = WindowReader {
        source,
        offset: 0,
        window: config.window_bytes,
        min_window: config.min_window_bytes.min(config.window_bytes),
        clock,
        mode: ReadMode::Windowed,
    };

    stream::unfold(reader, |mut reader| async move {
        let item = reader.next_window().await?;
        Some((item, reader))
    })
}
