//! Waiting for asynchronous backend tasks.
//!
//! Mutating API calls (policy update and delete, for instance) return a
//! [`TaskHandle`] instead of a finished result. [`TaskPoller`] queries the
//! task's status at a fixed interval until the backend reports a terminal
//! state, the time budget runs out, or the caller cancels.
//!
//! # Example
//!
//! ```ignore
//! use backup_provider::poller::{PollConfig, TaskPoller};
//! use tokio_util::sync::CancellationToken;
//!
//! let poller = TaskPoller::new(client);
//! let handle = api.delete_policy("policy-1").await?;
//! let done = poller
//!     .poll(&handle, &PollConfig::default(), &CancellationToken::new())
//!     .await?;
//! tracing::info!(queries = done.queries, "task finished");
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ClientError, PollError, ProviderError};
use crate::types::{TaskHandle, TaskPhase, TaskStatus};

/// Default time budget for one task.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default delay between two status queries.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Reads the status of a backend task.
#[async_trait]
pub trait TaskStatusClient: Send + Sync {
    /// Query the current status of `handle`.
    async fn read_task_status(&self, handle: &TaskHandle) -> Result<TaskStatus, ClientError>;
}

#[async_trait]
impl<T: TaskStatusClient + ?Sized> TaskStatusClient for std::sync::Arc<T> {
    async fn read_task_status(&self, handle: &TaskHandle) -> Result<TaskStatus, ClientError> {
        (**self).read_task_status(handle).await
    }
}

/// Timing parameters for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    timeout: Duration,
    interval: Duration,
}

impl PollConfig {
    /// Create a config; both durations must be non-zero.
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self, ProviderError> {
        if timeout.is_zero() {
            return Err(ProviderError::Configuration(
                "task timeout must be positive".to_string(),
            ));
        }
        if interval.is_zero() {
            return Err(ProviderError::Configuration(
                "task poll interval must be positive".to_string(),
            ));
        }
        Ok(Self { timeout, interval })
    }

    /// Maximum time to wait for a terminal status.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay between two status queries.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// A task that reached a successful terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    /// The polled task.
    pub handle: TaskHandle,
    /// The terminal status reported by the backend.
    pub status: TaskStatus,
    /// Time from the first query until the terminal status arrived.
    pub elapsed: Duration,
    /// Number of status queries issued.
    pub queries: u32,
}

/// The outcome of [`TaskPoller::poll`].
pub type PollOutcome = Result<TaskCompletion, PollError>;

/// Polls task status through a [`TaskStatusClient`].
///
/// The poller holds no state besides its client, so independent tasks can be
/// polled concurrently from clones of the same poller.
#[derive(Debug, Clone)]
pub struct TaskPoller<C> {
    client: C,
}

impl<C: TaskStatusClient> TaskPoller<C> {
    /// Create a poller that queries `client`.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Get a reference to the status client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Wait until `handle` reaches a terminal state.
    ///
    /// The first query is issued immediately. Between non-terminal answers the
    /// poller sleeps `cfg.interval()`, shortened so that no query lands past
    /// `cfg.timeout()`. Elapsed time is measured from just before the first
    /// query. Query errors and backend failures end the poll at once; firing
    /// `cancel` interrupts a pending query or sleep.
    pub async fn poll(
        &self,
        handle: &TaskHandle,
        cfg: &PollConfig,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let started = Instant::now();
        let mut queries = 0u32;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(PollError::Cancelled {
                        handle: handle.clone(),
                        elapsed: started.elapsed(),
                    });
                }
                result = self.client.read_task_status(handle) => result,
            };
            queries += 1;

            let status = result.map_err(|source| PollError::Query {
                handle: handle.clone(),
                source,
            })?;
            let elapsed = started.elapsed();
            debug!(
                task = %handle,
                status = %status.status,
                queries,
                elapsed = ?elapsed,
                "Task status received"
            );

            match status.phase {
                TaskPhase::Succeeded => {
                    return Ok(TaskCompletion {
                        handle: handle.clone(),
                        status,
                        elapsed,
                        queries,
                    });
                }
                TaskPhase::Failed => {
                    return Err(PollError::TaskFailed {
                        handle: handle.clone(),
                        status: status.status,
                        detail: status.detail,
                    });
                }
                TaskPhase::Pending => {}
            }

            if elapsed >= cfg.timeout {
                return Err(PollError::TimedOut {
                    handle: handle.clone(),
                    elapsed,
                    last_status: status.status,
                });
            }

            let pause = cfg.interval.min(cfg.timeout - elapsed);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(PollError::Cancelled {
                        handle: handle.clone(),
                        elapsed: started.elapsed(),
                    });
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}
