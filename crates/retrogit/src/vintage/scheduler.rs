//! Deferred retries of vintage computation.
//!
//! [`TaskScheduler`] is the contract the resolver depends on. The in-process
//! implementation is a pair: [`DeferredQueue`] (cheap to clone, handed to the
//! resolver) and [`DeferredTaskWorker`] (owns the receiving end and runs due
//! tasks on tokio).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::record::VintageKey;

/// Everything needed to recompute one vintage from scratch.
///
/// Serializable so that an out-of-process queue can carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeVintageTask {
    pub user_id: i64,
    pub user_login: String,
    pub repo_id: i64,
    pub owner_login: String,
    pub repo_name: String,
}

impl ComputeVintageTask {
    #[must_use]
    pub fn key(&self) -> VintageKey {
        VintageKey::new(self.user_id, self.repo_id)
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner_login, self.repo_name)
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("task queue is closed")]
    Closed,

    #[error("task rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed. Delivery is at-least-once.
    async fn schedule(&self, task: ComputeVintageTask, delay: Duration)
    -> Result<(), ScheduleError>;
}

/// Executes a due task. Failures are the handler's to log.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: ComputeVintageTask);
}

#[derive(Debug)]
struct Scheduled {
    task: ComputeVintageTask,
    run_at: Instant,
}

/// Sending half of the in-process queue.
#[derive(Clone, Debug)]
pub struct DeferredQueue {
    tx: mpsc::UnboundedSender<Scheduled>,
    outstanding: Arc<AtomicUsize>,
}

impl DeferredQueue {
    /// Tasks scheduled but not yet finished.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Receiving half of the in-process queue.
pub struct DeferredTaskWorker {
    rx: mpsc::UnboundedReceiver<Scheduled>,
    outstanding: Arc<AtomicUsize>,
}

/// Create a connected queue and worker.
#[must_use]
pub fn deferred_queue() -> (DeferredQueue, DeferredTaskWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let outstanding = Arc::new(AtomicUsize::new(0));
    (
        DeferredQueue {
            tx,
            outstanding: Arc::clone(&outstanding),
        },
        DeferredTaskWorker { rx, outstanding },
    )
}

#[async_trait]
impl TaskScheduler for DeferredQueue {
    async fn schedule(
        &self,
        task: ComputeVintageTask,
        delay: Duration,
    ) -> Result<(), ScheduleError> {
        // Count before sending so the worker never observes an idle queue
        // while this task is in the channel.
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let scheduled = Scheduled {
            task,
            run_at: Instant::now() + delay,
        };
        if self.tx.send(scheduled).is_err() {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(ScheduleError::Closed);
        }
        Ok(())
    }
}

impl DeferredTaskWorker {
    /// Process tasks until every sender is dropped and nothing is in flight.
    /// Returns the number of tasks executed.
    pub async fn run<H: TaskHandler>(self, handler: Arc<H>) -> usize {
        self.drive(handler, false).await
    }

    /// Process tasks until none are queued or in flight, including tasks the
    /// handler itself schedules while running.
    pub async fn run_until_idle<H: TaskHandler>(self, handler: Arc<H>) -> usize {
        self.drive(handler, true).await
    }

    async fn drive<H: TaskHandler>(mut self, handler: Arc<H>, stop_when_idle: bool) -> usize {
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut executed = 0usize;

        loop {
            if stop_when_idle && in_flight.is_empty() && self.outstanding.load(Ordering::SeqCst) == 0
            {
                break;
            }

            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(scheduled) => {
                        let handler = Arc::clone(&handler);
                        in_flight.spawn(async move {
                            tokio::time::sleep_until(scheduled.run_at).await;
                            tracing::debug!(repo = %scheduled.task.full_name(), "running deferred vintage task");
                            handler.handle(scheduled.task).await;
                        });
                    }
                    None if in_flight.is_empty() => break,
                    None => {
                        // Senders are gone; finish what is already running.
                        while let Some(joined) = in_flight.join_next().await {
                            executed += self.finish(joined);
                        }
                        break;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    executed += self.finish(joined);
                }
            }
        }

        tracing::debug!(executed, "deferred task worker stopped");
        executed
    }

    fn finish(&self, joined: Result<(), tokio::task::JoinError>) -> usize {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        match joined {
            Ok(()) => 1,
            Err(e) => {
                tracing::error!(error = %e, "deferred vintage task panicked");
                0
            }
        }
    }
}
