//! Deadline-bounded upload saves.
//!
//! Each [`Task`] is saved by a worker on the blocking pool. The worker hands
//! its result back over a one-shot channel, and the caller races that
//! channel against a fixed deadline. Whichever fires first decides what the
//! caller sees.
//!
//! A save that has already started is never interrupted. When the deadline
//! wins, the worker finishes its save in the background and its late result
//! is dropped: a one-shot send never blocks, so the worker always exits once
//! the save returns. Workers check for an abandoned waiter before they begin
//! writing and skip the save in that case.

use crate::blob::BlobStore;
use crate::error::{Error, Result};
use crate::telemetry::metrics;
use crate::telemetry::upload::{record_upload_outcome, start_upload_span};
use opentelemetry::KeyValue;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

/// Default time an upload request waits for its save.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

/// A single save request. Consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct Task {
    /// Correlation id for logs and spans only.
    pub id: Uuid,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Task {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// What the waiting caller observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Saved,
    SaveFailed(String),
    /// Not yet confirmed. The save may still land.
    TimedOut,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Saved => "saved",
            TaskOutcome::SaveFailed(_) => "save_failed",
            TaskOutcome::TimedOut => "timed_out",
        }
    }
}

/// Result of [`BoundedRunner::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub outcome: TaskOutcome,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl Execution {
    /// Collapse into a `Result`, keeping timeout and save failure distinct.
    pub fn into_result(self) -> Result<()> {
        match self.outcome {
            TaskOutcome::Saved => Ok(()),
            TaskOutcome::SaveFailed(reason) => Err(Error::SaveFailed(reason)),
            TaskOutcome::TimedOut => Err(Error::TimedOut),
        }
    }
}

/// Runs saves against a blob store, bounded by a fixed deadline.
#[derive(Clone)]
pub struct BoundedRunner {
    store: Arc<dyn BlobStore>,
    deadline: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl fmt::Debug for BoundedRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedRunner")
            .field("store", &"<BlobStore>")
            .field("deadline", &self.deadline)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl BoundedRunner {
    pub fn new(store: Arc<dyn BlobStore>, deadline: Duration) -> Self {
        Self {
            store,
            deadline,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Workers currently alive, including ones whose caller already gave up.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Save `task` on a background worker and wait at most the deadline.
    pub async fn execute(&self, task: Task) -> Execution {
        let span = start_upload_span(&task.name, &task.id, task.bytes.len());
        async {
            let start = Instant::now();
            let (tx, rx) = oneshot::channel::<Result<()>>();

            let store = Arc::clone(&self.store);
            let guard = InFlightGuard::enter(&self.in_flight);
            let worker_span = Span::current();
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                let _entered = worker_span.enter();

                if tx.is_closed() {
                    warn!("waiter gone before save started, skipping save");
                    return;
                }

                let result = store.save(&task.name, &task.bytes);
                if let Err(ref e) = result {
                    warn!(error = %e, "save failed");
                }
                if tx.send(result).is_err() {
                    info!("save finished after the deadline, result dropped");
                }
            });

            let outcome = tokio::select! {
                reported = rx => match reported {
                    Ok(Ok(())) => TaskOutcome::Saved,
                    Ok(Err(e)) => TaskOutcome::SaveFailed(e.to_string()),
                    Err(_) => {
                        TaskOutcome::SaveFailed("worker exited without reporting".to_string())
                    }
                },
                _ = tokio::time::sleep(self.deadline) => TaskOutcome::TimedOut,
            };

            let elapsed = start.elapsed();
            let timed_out = outcome == TaskOutcome::TimedOut;

            record_upload_outcome(&Span::current(), outcome.as_str(), timed_out);
            let labels = [KeyValue::new("outcome", outcome.as_str())];
            metrics::upload_outcomes().add(1, &labels);
            metrics::upload_duration_ms().record(elapsed.as_secs_f64() * 1000.0, &labels);
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                in_flight = self.in_flight(),
                "upload wait finished"
            );

            Execution {
                outcome,
                timed_out,
                elapsed,
            }
        }
        .instrument(span)
        .await
    }
}

/// Counts a live worker until dropped.
struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        metrics::upload_in_flight().add(1, &[]);
        Self {
            count: Arc::clone(count),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        metrics::upload_in_flight().add(-1, &[]);
    }
}
