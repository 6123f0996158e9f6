//! Backend API surface used by the provider.
//!
//! The HTTP client itself lives outside this crate. [`BackupApi`] names the
//! calls the resources need, with request/response models mirroring the
//! backend's JSON documents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::poller::TaskStatusClient;
use crate::types::TaskHandle;

/// A duration expressed as a unit and a count (e.g. `days` / `30`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitValue {
    /// Time unit, e.g. `hours`, `days`, `months`.
    pub unit: String,
    /// Number of units.
    pub value: i64,
}

/// A daily time window in the policy's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupWindow {
    /// Window start, `HH:MM`.
    pub start_time: String,
    /// Window end, `HH:MM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// A service level agreement within a policy operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sla {
    /// How long backups are kept.
    pub retention_duration: UnitValue,
    /// How often backups are taken.
    pub rpo_frequency: UnitValue,
}

/// One backup operation of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOperation {
    /// Operation type, e.g. `aws_ebs_volume_backup`.
    #[serde(rename = "type")]
    pub operation_type: String,
    /// `immediate` or `window`.
    pub action_setting: String,
    /// Backup window, required when `action_setting` is `window`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_window_tz: Option<BackupWindow>,
    /// Service level agreements.
    pub slas: Vec<Sla>,
}

/// Request body for creating or updating a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInput {
    /// Policy name.
    pub name: String,
    /// `activated` or `deactivated`.
    pub activation_status: String,
    /// IANA timezone used by backup windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Owning organizational unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit_id: Option<String>,
    /// Backup operations.
    pub operations: Vec<PolicyOperation>,
}

/// A policy as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Backend identifier.
    pub id: String,
    /// Policy name.
    pub name: String,
    /// `activated` or `deactivated`.
    pub activation_status: String,
    /// IANA timezone used by backup windows.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Owning organizational unit.
    pub organizational_unit_id: String,
    /// Whether the policy is locked against modification.
    pub lock_status: String,
    /// Backup operations.
    pub operations: Vec<PolicyOperation>,
}

/// A DynamoDB table known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamoDbTable {
    /// Backend identifier.
    pub id: String,
    /// Table name.
    pub name: String,
    /// AWS-assigned table identifier.
    pub table_native_id: String,
    /// AWS account the table lives in.
    pub account_native_id: String,
    /// AWS region the table lives in.
    pub aws_region: String,
}

/// Backend operations needed by the provider's resources and data sources.
///
/// Mutations that the backend performs asynchronously return a
/// [`TaskHandle`] to be polled through the inherited [`TaskStatusClient`].
#[async_trait]
pub trait BackupApi: TaskStatusClient {
    /// Create a policy. The backend applies creation synchronously.
    async fn create_policy(&self, input: &PolicyInput) -> Result<Policy, ClientError>;

    /// Read a policy by id.
    async fn read_policy(&self, id: &str) -> Result<Policy, ClientError>;

    /// Replace a policy; completion is reported through the returned task.
    async fn update_policy(&self, id: &str, input: &PolicyInput)
        -> Result<TaskHandle, ClientError>;

    /// Delete a policy; completion is reported through the returned task.
    async fn delete_policy(&self, id: &str) -> Result<TaskHandle, ClientError>;

    /// List DynamoDB tables matching a JSON filter string.
    async fn list_dynamodb_tables(&self, filter: &str) -> Result<Vec<DynamoDbTable>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_wire_format() {
        let policy: Policy = serde_json::from_value(json!({
            "id": "p-1",
            "name": "gold",
            "activation_status": "activated",
            "organizational_unit_id": "ou-1",
            "lock_status": "unlocked",
            "operations": [{
                "type": "aws_ebs_volume_backup",
                "action_setting": "window",
                "backup_window_tz": {"start_time": "05:00", "end_time": "07:00"},
                "slas": [{
                    "retention_duration": {"unit": "days", "value": 30},
                    "rpo_frequency": {"unit": "days", "value": 1}
                }]
            }]
        }))
        .unwrap();

        assert_eq!(policy.timezone, None);
        assert_eq!(policy.operations[0].operation_type, "aws_ebs_volume_backup");
        assert_eq!(policy.operations[0].slas[0].retention_duration.value, 30);
    }

    #[test]
    fn test_policy_input_omits_unset_fields() {
        let input = PolicyInput {
            name: "gold".to_string(),
            activation_status: "activated".to_string(),
            timezone: None,
            organizational_unit_id: None,
            operations: vec![],
        };
        let value = serde_json::to_value(&input).unwrap();
        assert!(value.get("timezone").is_none());
        assert!(value.get("organizational_unit_id").is_none());
    }
}
