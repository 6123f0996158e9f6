//! The `backup_policy` resource.
//!
//! Creation is synchronous on the backend. Updates and deletes return a task
//! that must finish before the change counts as applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{diff_attributes, required_str, ResourceContext};
use crate::client::{BackupApi, Policy, PolicyInput, PolicyOperation};
use crate::error::{ClientError, ProviderError};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::types::{ImportedResource, PlanResult};
use crate::validation::{into_result, validate};

/// Resource type name.
pub const RESOURCE_TYPE: &str = "backup_policy";

const DEFAULT_ACTIVATION_STATUS: &str = "activated";

/// Terraform-side state of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyState {
    /// Backend identifier; unknown until created.
    #[serde(default)]
    pub id: Option<String>,
    /// Policy name.
    pub name: String,
    /// `activated` or `deactivated`.
    #[serde(default)]
    pub activation_status: Option<String>,
    /// IANA timezone for backup windows.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Owning organizational unit.
    #[serde(default)]
    pub organizational_unit_id: Option<String>,
    /// Lock status reported by the backend.
    #[serde(default)]
    pub lock_status: Option<String>,
    /// Backup operations.
    pub operations: Vec<PolicyOperation>,
}

impl PolicyState {
    /// Build the backend request, filling unset fields from provider defaults.
    pub fn to_input(&self, default_ou: Option<&str>) -> PolicyInput {
        PolicyInput {
            name: self.name.clone(),
            activation_status: self
                .activation_status
                .clone()
                .unwrap_or_else(|| DEFAULT_ACTIVATION_STATUS.to_string()),
            timezone: self.timezone.clone(),
            organizational_unit_id: self
                .organizational_unit_id
                .clone()
                .or_else(|| default_ou.map(str::to_string)),
            operations: self.operations.clone(),
        }
    }
}

impl From<Policy> for PolicyState {
    fn from(policy: Policy) -> Self {
        Self {
            id: Some(policy.id),
            name: policy.name,
            activation_status: Some(policy.activation_status),
            timezone: policy.timezone,
            organizational_unit_id: Some(policy.organizational_unit_id),
            lock_status: Some(policy.lock_status),
            operations: policy.operations,
        }
    }
}

/// Schema of the `backup_policy` resource.
pub fn schema() -> Schema {
    let unit_value = || {
        NestedBlock::single(
            Block::new()
                .with_attribute("unit", Attribute::required_string())
                .with_attribute("value", Attribute::required_int64()),
        )
        .with_min_items(1)
    };

    let sla = Block::new()
        .with_block("retention_duration", unit_value())
        .with_block("rpo_frequency", unit_value());

    let operation = Block::new()
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_description("Kind of backup, e.g. aws_ebs_volume_backup"),
        )
        .with_attribute(
            "action_setting",
            Attribute::required_string().with_one_of(["immediate", "window"]),
        )
        .with_block(
            "backup_window_tz",
            NestedBlock::single(
                Block::new()
                    .with_attribute("start_time", Attribute::required_string())
                    .with_attribute("end_time", Attribute::optional_string()),
            ),
        )
        .with_block("slas", NestedBlock::list(sla).with_min_items(1));

    Schema::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute(
            "activation_status",
            Attribute::optional_string()
                .with_one_of(["activated", "deactivated"])
                .with_default(Value::from(DEFAULT_ACTIVATION_STATUS)),
        )
        .with_attribute("timezone", Attribute::optional_string())
        .with_attribute("organizational_unit_id", Attribute::optional_string().computed())
        .with_attribute("lock_status", Attribute::computed_string())
        .with_block("operations", NestedBlock::list(operation).with_min_items(1))
}

/// Validate a configuration, including checks the schema can't express.
pub fn diagnose(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validate(&schema(), config);
    if !diagnostics.is_empty() {
        return diagnostics;
    }
    let Some(operations) = config.get("operations").and_then(Value::as_array) else {
        return diagnostics;
    };
    for (i, op) in operations.iter().enumerate() {
        let windowed = op.get("action_setting").and_then(Value::as_str) == Some("window");
        let has_window = op.get("backup_window_tz").is_some_and(|w| !w.is_null());
        if windowed && !has_window {
            diagnostics.push(
                Diagnostic::error("Missing backup window")
                    .with_detail("action_setting 'window' requires a backup_window_tz block")
                    .with_attribute(format!("operations.{}.backup_window_tz", i)),
            );
        }
    }
    diagnostics
}

fn parse(value: &Value) -> Result<PolicyState, ProviderError> {
    into_result(diagnose(value))?;
    Ok(serde_json::from_value(value.clone())?)
}

fn to_state(policy: Policy) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(PolicyState::from(policy))?)
}

fn not_found(id: &str, err: ClientError) -> ProviderError {
    match err {
        ClientError::NotFound(_) => ProviderError::NotFound(format!("{} {}", RESOURCE_TYPE, id)),
        other => other.into(),
    }
}

/// Plan a create, update or delete.
pub fn plan(prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
    if proposed.is_null() {
        let prior = prior.cloned().unwrap_or(Value::Null);
        return Ok(PlanResult::with_changes(
            Value::Null,
            diff_attributes(&prior, &Value::Null),
            false,
        ));
    }

    let mut planned: PolicyState = serde_json::from_value(proposed.clone())?;
    if planned.activation_status.is_none() {
        planned.activation_status = Some(DEFAULT_ACTIVATION_STATUS.to_string());
    }
    if let Some(prior) = prior {
        let prior: PolicyState = serde_json::from_value(prior.clone())?;
        planned.id = prior.id;
        planned.lock_status = prior.lock_status;
        if planned.organizational_unit_id.is_none() {
            planned.organizational_unit_id = prior.organizational_unit_id;
        }
    }

    let planned = serde_json::to_value(planned)?;
    let changes = diff_attributes(prior.unwrap_or(&Value::Null), &planned);
    Ok(PlanResult::with_changes(planned, changes, false))
}

/// Create a policy and return its state.
pub async fn create<A: BackupApi>(
    ctx: &ResourceContext<A>,
    planned: &Value,
) -> Result<Value, ProviderError> {
    let state = parse(planned)?;
    let input = state.to_input(ctx.config().organizational_unit_id.as_deref());
    let policy = ctx.api().create_policy(&input).await?;
    info!(id = %policy.id, name = %policy.name, "Policy created");
    to_state(policy)
}

/// Refresh a policy's state from the backend.
pub async fn read<A: BackupApi>(
    ctx: &ResourceContext<A>,
    current: &Value,
) -> Result<Value, ProviderError> {
    let id = required_str(current, "id")?;
    let policy = ctx.api().read_policy(id).await.map_err(|e| not_found(id, e))?;
    to_state(policy)
}

/// Replace a policy, wait for the backend task, and return the refreshed state.
pub async fn update<A: BackupApi>(
    ctx: &ResourceContext<A>,
    prior: &Value,
    planned: &Value,
) -> Result<Value, ProviderError> {
    let id = required_str(prior, "id")?;
    let state = parse(planned)?;
    let input = state.to_input(ctx.config().organizational_unit_id.as_deref());

    let handle = ctx
        .api()
        .update_policy(id, &input)
        .await
        .map_err(|e| not_found(id, e))?;
    ctx.wait_for_task(&handle, RESOURCE_TYPE, &state.name, id).await?;

    let policy = ctx.api().read_policy(id).await.map_err(|e| not_found(id, e))?;
    info!(id, name = %policy.name, "Policy updated");
    to_state(policy)
}

/// Delete a policy and wait for the backend task.
///
/// A policy that is already gone counts as deleted.
pub async fn delete<A: BackupApi>(
    ctx: &ResourceContext<A>,
    current: &Value,
) -> Result<(), ProviderError> {
    let id = required_str(current, "id")?;
    let name = current.get("name").and_then(Value::as_str).unwrap_or_default();

    let handle = match ctx.api().delete_policy(id).await {
        Ok(handle) => handle,
        Err(ClientError::NotFound(_)) => {
            warn!(id, "Policy already deleted");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    ctx.wait_for_task(&handle, RESOURCE_TYPE, name, id).await?;
    info!(id, "Policy deleted");
    Ok(())
}

/// Import an existing policy by id.
pub async fn import<A: BackupApi>(
    ctx: &ResourceContext<A>,
    id: &str,
) -> Result<Vec<ImportedResource>, ProviderError> {
    let policy = ctx.api().read_policy(id).await.map_err(|e| not_found(id, e))?;
    Ok(vec![ImportedResource::new(RESOURCE_TYPE, to_state(policy)?)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        json!({
            "name": "gold",
            "timezone": "UTC",
            "operations": [{
                "type": "aws_ebs_volume_backup",
                "action_setting": "window",
                "backup_window_tz": {"start_time": "05:00", "end_time": "07:00"},
                "slas": [{
                    "retention_duration": {"unit": "days", "value": 30},
                    "rpo_frequency": {"unit": "days", "value": 1}
                }]
            }]
        })
    }

    #[test]
    fn test_valid_config() {
        assert!(diagnose(&config()).is_empty());
    }

    #[test]
    fn test_window_requires_backup_window() {
        let mut cfg = config();
        cfg["operations"][0]["backup_window_tz"] = Value::Null;
        let diagnostics = diagnose(&cfg);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("operations.0.backup_window_tz")
        );
    }

    #[test]
    fn test_to_input_applies_defaults() {
        let state: PolicyState = serde_json::from_value(config()).unwrap();
        let input = state.to_input(Some("ou-default"));
        assert_eq!(input.activation_status, "activated");
        assert_eq!(input.organizational_unit_id.as_deref(), Some("ou-default"));

        let mut explicit = state.clone();
        explicit.organizational_unit_id = Some("ou-1".to_string());
        assert_eq!(
            explicit.to_input(Some("ou-default")).organizational_unit_id.as_deref(),
            Some("ou-1")
        );
    }

    #[test]
    fn test_plan_create() {
        let plan = plan(None, &config()).unwrap();
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["activation_status"], "activated");
        assert!(plan.planned_state["id"].is_null());
        assert!(plan.changes.iter().any(|c| c.path == "name"));
        assert!(!plan.changes.iter().any(|c| c.path == "id"));
    }

    #[test]
    fn test_plan_applies_published_default() {
        let published = schema().block.attributes["activation_status"]
            .default
            .clone()
            .unwrap();
        let plan = plan(None, &config()).unwrap();
        assert_eq!(plan.planned_state["activation_status"], published);

        let state: PolicyState = serde_json::from_value(config()).unwrap();
        assert_eq!(Value::from(state.to_input(None).activation_status), published);
    }

    #[test]
    fn test_plan_update_carries_computed_attributes() {
        let mut prior = config();
        prior["id"] = json!("p-1");
        prior["lock_status"] = json!("unlocked");
        prior["organizational_unit_id"] = json!("ou-1");
        prior["activation_status"] = json!("activated");

        let mut proposed = config();
        proposed["name"] = json!("platinum");

        let plan = plan(Some(&prior), &proposed).unwrap();
        assert_eq!(plan.planned_state["id"], "p-1");
        assert_eq!(plan.planned_state["organizational_unit_id"], "ou-1");
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name"]);
    }

    #[test]
    fn test_plan_delete() {
        let mut prior = config();
        prior["id"] = json!("p-1");
        let plan = plan(Some(&prior), &Value::Null).unwrap();
        assert!(plan.planned_state.is_null());
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }
}
