//! Debounced flush scheduling.
//!
//! ```text
//! Idle --push--> Pending --interval elapsed--> Flushing{rearm: false} --done--> Idle
//! Pending --push--> Pending                      (countdown is not restarted)
//! Flushing --push--> Flushing{rearm: true} --done--> Pending (fresh countdown)
//! any --shutdown--> Closed
//! ```
//!
//! The buffer and phase share one `std::sync::Mutex` that is never held
//! across an `.await`, so `push` never suspends. At most one worker task
//! exists; it owns the countdown and the flush that follows it. Shutdown
//! waits for that worker before flushing the remainder itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use snafu::prelude::*;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::{BufferedDeltas, DeltasReceived};

use crate::buffer::{DeltaBuffer, DeltaRecord};
use crate::error::{ClosedSnafu, EngineError};
use crate::flusher::{BatchFlusher, FlushOutcome};

/// Lifecycle of the flush countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing buffered, no countdown running.
    Idle,
    /// Countdown running.
    Pending,
    /// A flush is in progress. `rearm` is set when records arrived meanwhile.
    Flushing { rearm: bool },
    /// Shut down; pushes are rejected.
    Closed,
}

/// Upper bound on reporting a timed-out shutdown to the error sink.
const SHUTDOWN_REPORT_TIMEOUT: Duration = Duration::from_secs(5);

struct State {
    buffer: DeltaBuffer,
    phase: Phase,
    /// Records drained into the flush that is currently running.
    in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    flusher: BatchFlusher,
    interval: Duration,
    cancel: CancellationToken,
    completed: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal_completed(&self) {
        self.completed.send_modify(|count| *count += 1);
    }
}

/// Buffers pushed records and flushes them `interval` after the first push
/// of each burst.
pub struct FlushScheduler {
    shared: Arc<Shared>,
    shutdown_timeout: Duration,
}

impl FlushScheduler {
    pub fn new(flusher: BatchFlusher, interval: Duration, shutdown_timeout: Duration) -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buffer: DeltaBuffer::new(),
                    phase: Phase::Idle,
                    in_flight: 0,
                    worker: None,
                }),
                flusher,
                interval,
                cancel: CancellationToken::new(),
                completed,
            }),
            shutdown_timeout,
        }
    }

    /// Append records and arm the countdown if none is running.
    ///
    /// Must be called from within a tokio runtime. Returns the number of
    /// records accepted.
    pub fn push<I>(&self, records: I) -> Result<usize, EngineError>
    where
        I: IntoIterator<Item = DeltaRecord>,
    {
        let records: Vec<DeltaRecord> = records.into_iter().collect();
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();

        let mut state = self.shared.lock();
        if state.phase == Phase::Closed {
            return ClosedSnafu.fail();
        }

        state.buffer.append(records);
        emit!(DeltasReceived {
            count: count as u64
        });
        emit!(BufferedDeltas {
            count: state.buffer.len()
        });

        match state.phase {
            Phase::Idle => {
                state.phase = Phase::Pending;
                state.worker = Some(tokio::spawn(run_worker(self.shared.clone())));
                debug!(interval_ms = self.shared.interval.as_millis(), "Flush armed");
            }
            Phase::Flushing { rearm: false } => {
                state.phase = Phase::Flushing { rearm: true };
            }
            Phase::Pending | Phase::Flushing { rearm: true } | Phase::Closed => {}
        }

        Ok(count)
    }

    /// Stop accepting records and flush whatever is buffered.
    ///
    /// Waits for an in-flight flush first. The whole operation is bounded by
    /// the shutdown timeout. Calling it again after it completed is a no-op.
    pub async fn shutdown(&self) -> Result<FlushOutcome, EngineError> {
        let worker = {
            let mut state = self.shared.lock();
            if state.phase == Phase::Closed {
                return Ok(FlushOutcome::Empty);
            }
            state.phase = Phase::Closed;
            state.worker.take()
        };
        self.shared.cancel.cancel();

        let shared = self.shared.clone();
        let drain = async move {
            if let Some(worker) = worker
                && let Err(e) = worker.await
            {
                warn!(error = %e, "Flush worker ended abnormally");
            }

            let batch = {
                let mut state = shared.lock();
                let batch = state.buffer.drain_all();
                state.in_flight = batch.len();
                batch
            };
            info!(records = batch.len(), "Flushing delta cache before shutdown");
            emit!(BufferedDeltas { count: 0 });

            let outcome = shared.flusher.flush(batch).await;
            shared.lock().in_flight = 0;
            shared.signal_completed();
            outcome
        };

        match tokio::time::timeout(self.shutdown_timeout, drain).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                let unflushed = {
                    let state = self.shared.lock();
                    state.buffer.len() + state.in_flight
                };
                error!(
                    timeout_secs = self.shutdown_timeout.as_secs_f64(),
                    unflushed, "Shutdown flush timed out"
                );
                let message = format!(
                    "Shutdown flush did not complete within {}s; {unflushed} delta records may not have been persisted",
                    self.shutdown_timeout.as_secs_f64()
                );
                let report = self.shared.flusher.errors().report(&message);
                if tokio::time::timeout(SHUTDOWN_REPORT_TIMEOUT, report).await.is_err() {
                    warn!("Reporting the shutdown timeout to the error sink timed out");
                }
                Err(EngineError::ShutdownTimeout {
                    timeout: self.shutdown_timeout,
                })
            }
        }
    }

    /// Counter incremented after every completed flush cycle.
    pub fn flushes(&self) -> watch::Receiver<u64> {
        self.shared.completed.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Records waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.shared.lock().buffer.len()
    }
}

/// Countdown then flush, repeated while records arrive during flushes.
async fn run_worker(shared: Arc<Shared>) {
    loop {
        if shared
            .cancel
            .run_until_cancelled(tokio::time::sleep(shared.interval))
            .await
            .is_none()
        {
            // Shutdown flushes the remainder
            return;
        }

        let batch = {
            let mut state = shared.lock();
            if state.phase != Phase::Pending {
                return;
            }
            state.phase = Phase::Flushing { rearm: false };
            let batch = state.buffer.drain_all();
            state.in_flight = batch.len();
            batch
        };
        emit!(BufferedDeltas { count: 0 });

        shared.flusher.flush(batch).await;
        shared.signal_completed();

        let rearm = {
            let mut state = shared.lock();
            state.in_flight = 0;
            match state.phase {
                Phase::Flushing { rearm: true } => {
                    state.phase = Phase::Pending;
                    true
                }
                Phase::Flushing { rearm: false } => {
                    state.phase = Phase::Idle;
                    state.worker = None;
                    false
                }
                Phase::Idle | Phase::Pending | Phase::Closed => false,
            }
        };
        if !rearm {
            return;
        }
        debug!("Records arrived during flush, countdown restarted");
    }
}
