//! Poll scheduler
//!
//! Drives one engine through `Idle -> Polling -> Evaluating | Failed -> Idle`
//! on a fixed interval. Cycles never overlap: the next tick is only awaited
//! once the previous poll and its evaluation have finished.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerting::{EnginePhase, SharedEngine};
use crate::source::SampleSource;

/// What happened during one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A sample was evaluated; `emitted` notifications were added
    Evaluated {
        /// Notifications added by this cycle
        emitted: usize,
    },
    /// The poll failed; engine state was left as it was
    Failed,
    /// Shutdown was requested before the cycle could finish
    Cancelled,
}

/// Run one poll-and-evaluate cycle.
///
/// The engine lock is not held while the poll is in flight. If `cancel`
/// fires during the poll the result is discarded.
pub async fn run_cycle(
    engine: &SharedEngine,
    source: &dyn SampleSource,
    cancel: &CancellationToken,
) -> CycleOutcome {
    engine.write().set_phase(EnginePhase::Polling);

    let polled = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = source.poll() => Some(result),
    };

    let Some(result) = polled.filter(|_| !cancel.is_cancelled()) else {
        engine.write().set_phase(EnginePhase::Idle);
        debug!("Poll cycle cancelled");
        return CycleOutcome::Cancelled;
    };

    match result {
        Ok(sample) => {
            let emitted = engine.write().process_sample(sample).len();
            CycleOutcome::Evaluated { emitted }
        }
        Err(err) => {
            warn!(source = %source.describe(), error = %err, "Sensor poll failed");
            engine.write().poll_failed(&err);
            CycleOutcome::Failed
        }
    }
}

/// Runs poll cycles on a fixed interval until stopped
pub struct Scheduler {
    engine: SharedEngine,
    source: Arc<dyn SampleSource>,
    period: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Create a scheduler; nothing runs until [`Scheduler::start`]
    pub fn new(engine: SharedEngine, source: Arc<dyn SampleSource>, period: Duration) -> Self {
        Self {
            engine,
            source,
            period,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Whether the polling task is running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Token that stops this scheduler when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the polling task. The first poll happens immediately.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        let engine = self.engine.clone();
        let source = self.source.clone();
        let cancel = self.cancel.clone();
        let period = self.period;

        info!(
            source = %source.describe(),
            interval = ?period,
            "Starting poll scheduler"
        );

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if run_cycle(&engine, source.as_ref(), &cancel).await == CycleOutcome::Cancelled {
                    break;
                }
            }

            info!("Poll scheduler stopped");
        }));
    }

    /// Cancel the timer and wait for any in-flight cycle to wind down
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Poll task ended abnormally");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
