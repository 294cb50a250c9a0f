//! Stall watchdog
//!
//! Periodically compares the job's activity clock against the stall timeout
//! while the job is decoding or uploading, and aborts the job when nothing
//! has moved for too long. Exits as soon as the job reaches a terminal status.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::types::{AbortSignal, ActivityClock, ImportStatus};
use crate::config::WatchdogConfig;

pub struct StallWatchdog {
    clock: ActivityClock,
    config: WatchdogConfig,
    status: watch::Receiver<ImportStatus>,
    abort: AbortSignal,
}

impl StallWatchdog {
    pub fn new(
        clock: ActivityClock,
        config: WatchdogConfig,
        status: watch::Receiver<ImportStatus>,
        abort: AbortSignal,
    ) -> Self {
        Self {
            clock,
            config,
            status,
            abort,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let stall_timeout = self.config.stall_timeout();
        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = self.status.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Status channel closed, watchdog exiting");
                        return;
                    }
                }
                _ = self.abort.token().cancelled() => return,
            }

            let status = *self.status.borrow_and_update();
            if status.is_terminal() {
                tracing::debug!(status = %status, "Job finished, watchdog exiting");
                return;
            }
            if !status.is_active() {
                continue;
            }

            let idle = self.clock.idle_for();
            if idle > stall_timeout {
                tracing::warn!(
                    status = %status,
                    idle_secs = idle.as_secs(),
                    stall_timeout_secs = stall_timeout.as_secs(),
                    "No import activity within the stall timeout, aborting job"
                );
                self.abort.stall(idle);
                return;
            }
        }
    }
}
