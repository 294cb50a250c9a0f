//! Shared pipeline state: job status, batches, the activity clock and the
//! abort signal the watchdog and caller use to stop a job.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ImportError;
use crate::record::NormalizedRecord;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Idle,
    Decoding,
    Uploading,
    Succeeded,
    Failed,
}

impl ImportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Decoding or uploading; the states the watchdog guards
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Decoding | Self::Uploading)
    }

    /// Status only moves forward, except Decoding and Uploading may alternate
    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        use ImportStatus::*;
        match (self, next) {
            (Idle, Decoding) | (Idle, Failed) => true,
            (Decoding, Uploading) | (Uploading, Decoding) => true,
            (Decoding, Succeeded) | (Uploading, Succeeded) => true,
            (Decoding, Failed) | (Uploading, Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Decoding => "decoding",
            Self::Uploading => "uploading",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered run of normalized records sent to the sink in one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position in the job's flush order
    pub index: u64,
    pub records: Vec<NormalizedRecord>,
    /// Last batch of the job; asks the remote to recompute aggregates
    pub is_final: bool,
}

impl Batch {
    pub fn new(index: u64, records: Vec<NormalizedRecord>, is_final: bool) -> Self {
        Self {
            index,
            records,
            is_final,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Last time any stage of a job made progress.
///
/// Stored as milliseconds since the clock was created so it can be touched
/// from the decoder task without a lock. Uses tokio's clock so paused-time
/// tests see the same instants as the watchdog.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    origin: Instant,
    last_ms: Arc<AtomicU64>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_ms.load(Ordering::Relaxed))
    }

    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity())
    }
}

/// Why a job was told to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    Stalled { idle_secs: u64 },
}

/// Cancellation shared by the caller, the watchdog and the pipeline tasks.
///
/// Caller cancellation is only observed between rows; a stall additionally
/// fires `stall_token`, which interrupts an in-flight batch upload.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    stall_token: CancellationToken,
    stalled: Arc<AtomicBool>,
    idle_secs: Arc<AtomicU64>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn stall(&self, idle: Duration) {
        self.idle_secs.store(idle.as_secs(), Ordering::Relaxed);
        self.stalled.store(true, Ordering::Release);
        self.stall_token.cancel();
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<AbortReason> {
        if self.is_stalled() {
            Some(AbortReason::Stalled {
                idle_secs: self.idle_secs.load(Ordering::Relaxed),
            })
        } else if self.is_aborted() {
            Some(AbortReason::Cancelled)
        } else {
            None
        }
    }

    /// The job error matching the abort reason
    pub fn error(&self) -> ImportError {
        match self.reason() {
            Some(AbortReason::Stalled { idle_secs }) => ImportError::Stalled { idle_secs },
            _ => ImportError::Cancelled,
        }
    }

    /// Fires on caller cancellation or a stall
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fires only on a stall
    pub fn stall_token(&self) -> &CancellationToken {
        &self.stall_token
    }
}
