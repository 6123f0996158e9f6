//! Convenience types shared by the poller and the provider layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Identifier of an asynchronous backend task.
///
/// Issued by a mutating API call; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskHandle(pub(crate) String);

impl TaskHandle {
    /// Create a handle, rejecting empty identifiers.
    pub fn new(id: impl Into<String>) -> Result<Self, ProviderError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ProviderError::Validation(
                "task identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaskHandle {
    type Error = ProviderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskHandle> for String {
    fn from(handle: TaskHandle) -> Self {
        handle.0
    }
}

/// Whether a task status is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Still queued or running.
    Pending,
    /// Finished successfully.
    Succeeded,
    /// Finished unsuccessfully.
    Failed,
}

impl TaskPhase {
    /// Classify a backend status label.
    ///
    /// `completed` succeeds, `failed` and `aborted` fail, and any other label
    /// (`queued`, `in_progress`, ...) is treated as still running.
    pub fn classify(status: &str) -> Self {
        match status {
            "completed" => Self::Succeeded,
            "failed" | "aborted" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Returns true for `Succeeded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The result of one task status query.
///
/// On the wire only the label and detail travel; `phase` is always derived
/// from the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTaskStatus", into = "RawTaskStatus")]
pub struct TaskStatus {
    /// Terminal classification of `status`.
    pub phase: TaskPhase,
    /// Raw backend status label.
    pub status: String,
    /// Optional backend-provided detail (usually set on failure).
    pub detail: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct RawTaskStatus {
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl From<RawTaskStatus> for TaskStatus {
    fn from(raw: RawTaskStatus) -> Self {
        Self {
            detail: raw.detail,
            ..Self::from_backend(raw.status)
        }
    }
}

impl From<TaskStatus> for RawTaskStatus {
    fn from(status: TaskStatus) -> Self {
        Self {
            status: status.status,
            detail: status.detail,
        }
    }
}

impl TaskStatus {
    /// Build a status from a backend label, classifying it with [`TaskPhase::classify`].
    pub fn from_backend(status: impl Into<String>) -> Self {
        let status = status.into();
        Self {
            phase: TaskPhase::classify(&status),
            status,
            detail: None,
        }
    }

    /// A non-terminal `in_progress` status.
    pub fn in_progress() -> Self {
        Self::from_backend("in_progress")
    }

    /// A successful `completed` status.
    pub fn completed() -> Self {
        Self::from_backend("completed")
    }

    /// A terminal `failed` status with a detail message.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::from_backend("failed").with_detail(detail)
    }

    /// Attach a detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Returns true if the plan contains no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata: the names of everything the provider manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_handle_rejects_empty() {
        assert!(TaskHandle::new("").is_err());
        assert!(TaskHandle::new("   ").is_err());
        assert_eq!(TaskHandle::new("12345").unwrap().as_str(), "12345");
    }

    #[test]
    fn test_task_handle_serde() {
        let handle: TaskHandle = serde_json::from_value(serde_json::json!("t-1")).unwrap();
        assert_eq!(handle.to_string(), "t-1");
        assert!(serde_json::from_value::<TaskHandle>(serde_json::json!("")).is_err());
    }

    #[test]
    fn test_phase_classification() {
        assert_eq!(TaskPhase::classify("completed"), TaskPhase::Succeeded);
        assert_eq!(TaskPhase::classify("failed"), TaskPhase::Failed);
        assert_eq!(TaskPhase::classify("aborted"), TaskPhase::Failed);
        assert_eq!(TaskPhase::classify("queued"), TaskPhase::Pending);
        assert_eq!(TaskPhase::classify("in_progress"), TaskPhase::Pending);
        assert_eq!(TaskPhase::classify("something_new"), TaskPhase::Pending);

        assert!(TaskPhase::Failed.is_terminal());
        assert!(!TaskPhase::Pending.is_terminal());
    }

    #[test]
    fn test_status_decodes_phase_from_label() {
        let status: TaskStatus =
            serde_json::from_value(serde_json::json!({"status": "completed"})).unwrap();
        assert_eq!(status.phase, TaskPhase::Succeeded);
        assert_eq!(status.detail, None);

        // A stray phase field never overrides the label.
        let status: TaskStatus = serde_json::from_value(serde_json::json!({
            "phase": "pending",
            "status": "failed",
            "detail": "volume detached"
        }))
        .unwrap();
        assert_eq!(status.phase, TaskPhase::Failed);
        assert_eq!(status.detail.as_deref(), Some("volume detached"));

        assert!(serde_json::from_value::<TaskStatus>(serde_json::json!({})).is_err());
    }

    #[test]
    fn test_status_encodes_label_only() {
        let value = serde_json::to_value(TaskStatus::in_progress()).unwrap();
        assert_eq!(value, serde_json::json!({"status": "in_progress"}));
    }

    #[test]
    fn test_status_constructors() {
        let failed = TaskStatus::failed("disk full");
        assert_eq!(failed.phase, TaskPhase::Failed);
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.detail.as_deref(), Some("disk full"));

        assert_eq!(TaskStatus::completed().phase, TaskPhase::Succeeded);
        assert_eq!(TaskStatus::in_progress().phase, TaskPhase::Pending);
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(serde_json::json!({"id": "123"}));
        assert!(no_change.is_empty());
        assert!(!no_change.requires_replace);

        let with_changes = PlanResult::with_changes(
            serde_json::json!({"id": "123", "name": "new"}),
            vec![AttributeChange::new(
                "name",
                Some(serde_json::json!("old")),
                Some(serde_json::json!("new")),
            )],
            false,
        );
        assert_eq!(with_changes.changes.len(), 1);
    }
}
