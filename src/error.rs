//! Error types for the backup provider.
//!
//! Three layers of errors exist:
//!
//! - [`ClientError`]: raised by the backend API collaborator.
//! - [`PollError`]: the closed set of ways a task poll can end without success.
//! - [`ProviderError`]: what resource and data source operations return.

use std::time::Duration;

use thiserror::Error;

use crate::schema::Diagnostic;
use crate::types::TaskHandle;

/// Errors raised by the backend API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The addressed object does not exist on the backend.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Why a task poll did not end in success.
///
/// Timeout and cancellation are ordinary outcomes here; callers decide how to
/// present them.
#[derive(Debug, Error)]
pub enum PollError {
    /// The backend reported a terminal failure state for the task.
    #[error("task {handle} finished with status '{status}'{}", detail_suffix(.detail))]
    TaskFailed {
        /// The polled task.
        handle: TaskHandle,
        /// Backend status label (e.g. `failed`, `aborted`).
        status: String,
        /// Backend-provided failure detail, if any.
        detail: Option<String>,
    },

    /// The status query itself failed, so the task state is unknown.
    #[error("could not read status of task {handle}: {source}")]
    Query {
        /// The polled task.
        handle: TaskHandle,
        /// The client error.
        #[source]
        source: ClientError,
    },

    /// No terminal status was observed within the configured budget.
    #[error("task {handle} did not finish within {elapsed:?} (last status '{last_status}')")]
    TimedOut {
        /// The polled task.
        handle: TaskHandle,
        /// Time spent polling.
        elapsed: Duration,
        /// Last non-terminal status label observed.
        last_status: String,
    },

    /// The caller cancelled the poll.
    #[error("polling of task {handle} was cancelled after {elapsed:?}")]
    Cancelled {
        /// The polled task.
        handle: TaskHandle,
        /// Time spent polling before cancellation.
        elapsed: Duration,
    },
}

impl PollError {
    /// The task this error refers to.
    pub fn handle(&self) -> &TaskHandle {
        match self {
            Self::TaskFailed { handle, .. }
            | Self::Query { handle, .. }
            | Self::TimedOut { handle, .. }
            | Self::Cancelled { handle, .. } => handle,
        }
    }

    /// Returns true if the backend definitively reported the task as failed.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, Self::TaskFailed { .. })
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(": {}", d),
        _ => String::new(),
    }
}

/// Errors that can occur in provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A backend API call failed.
    #[error("Backend error: {0}")]
    Client(#[from] ClientError),

    /// An asynchronous backend task did not complete successfully.
    #[error("{resource_type} '{name}' (id {id}): {source}")]
    Task {
        /// Resource type the task was issued for.
        resource_type: String,
        /// Configured name of the resource.
        name: String,
        /// Backend identifier of the resource.
        id: String,
        /// Why the poll ended.
        #[source]
        source: PollError,
    },
}

impl ProviderError {
    /// Wrap a poll error with the resource it was issued for.
    pub fn task(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
        source: PollError,
    ) -> Self {
        Self::Task {
            resource_type: resource_type.into(),
            name: name.into(),
            id: id.into(),
            source,
        }
    }

    /// Convert into an error diagnostic for user-facing reporting.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::NotFound(_) => "Resource not found",
            Self::Validation(_) => "Invalid configuration",
            Self::Configuration(_) => "Provider configuration error",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Serialization(_) => "Malformed state",
            Self::Client(_) => "Backend request failed",
            Self::Task { source, .. } => match source {
                PollError::TaskFailed { .. } => "Backend task failed",
                PollError::Query { .. } => "Unable to determine task status",
                PollError::TimedOut { .. } => "Timed out waiting for backend task",
                PollError::Cancelled { .. } => "Operation cancelled",
            },
        };
        Diagnostic::error(summary).with_detail(self.to_string())
    }
}
