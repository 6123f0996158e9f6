//! Resource and data source implementations.
//!
//! Every implementation follows the same shape: validate the incoming JSON
//! against its schema, marshal it into a backend request, call
//! [`BackupApi`], and unmarshal the response back into state.

pub mod dynamodb_tables;
pub mod policy;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::BackupApi;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::poller::{PollConfig, TaskCompletion, TaskPoller};
use crate::types::{AttributeChange, TaskHandle};

/// Everything a resource operation needs, injected at construction.
pub struct ResourceContext<A> {
    api: Arc<A>,
    poller: TaskPoller<Arc<A>>,
    poll_config: PollConfig,
    config: ProviderConfig,
    cancel: CancellationToken,
}

impl<A: BackupApi> ResourceContext<A> {
    /// Build a context around a shared API client.
    pub fn new(api: Arc<A>, config: ProviderConfig) -> Result<Self, ProviderError> {
        let poll_config = config.poll_config()?;
        Ok(Self {
            poller: TaskPoller::new(Arc::clone(&api)),
            api,
            poll_config,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// The backend API client.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Poll timing used for every task.
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll_config
    }

    /// Token that aborts in-flight task waits when cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for a task issued on behalf of a resource.
    ///
    /// Poll errors are wrapped with the resource type, name and id.
    pub async fn wait_for_task(
        &self,
        handle: &TaskHandle,
        resource_type: &str,
        name: &str,
        id: &str,
    ) -> Result<TaskCompletion, ProviderError> {
        let done = self
            .poller
            .poll(handle, &self.poll_config, &self.cancel)
            .await
            .map_err(|e| ProviderError::task(resource_type, name, id, e))?;
        info!(
            resource_type,
            id,
            task = %handle,
            queries = done.queries,
            elapsed = ?done.elapsed,
            "Backend task completed"
        );
        Ok(done)
    }
}

/// Compare two top-level state objects attribute by attribute.
///
/// Attributes missing on one side are treated as null. Changes are returned
/// in attribute-name order.
pub fn diff_attributes(prior: &Value, planned: &Value) -> Vec<AttributeChange> {
    let empty = serde_json::Map::new();
    let before = prior.as_object().unwrap_or(&empty);
    let after = planned.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let old = before.get(key).filter(|v| !v.is_null());
            let new = after.get(key).filter(|v| !v.is_null());
            (old != new).then(|| AttributeChange::new(key.clone(), old.cloned(), new.cloned()))
        })
        .collect()
}

/// Extract a required non-empty string attribute from state.
pub(crate) fn required_str<'a>(state: &'a Value, key: &str) -> Result<&'a str, ProviderError> {
    state
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::Validation(format!("state has no '{}' attribute", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_attributes() {
        let changes = diff_attributes(
            &json!({"id": "p-1", "name": "gold", "timezone": null}),
            &json!({"id": "p-1", "name": "silver", "timezone": "UTC"}),
        );
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "timezone"]);
        assert_eq!(changes[1].before, None);
        assert_eq!(changes[1].after, Some(json!("UTC")));
    }

    #[test]
    fn test_diff_against_null() {
        let changes = diff_attributes(&json!({"name": "gold"}), &Value::Null);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].after, None);
    }

    #[test]
    fn test_required_str() {
        let state = json!({"id": "p-1", "empty": ""});
        assert_eq!(required_str(&state, "id").unwrap(), "p-1");
        assert!(required_str(&state, "empty").is_err());
        assert!(required_str(&state, "missing").is_err());
    }
}
