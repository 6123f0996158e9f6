//! Provider configuration.
//!
//! The provider configuration block is deserialized into [`ProviderConfig`].
//! Credentials and endpoint selection belong to the API client and are not
//! handled here.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ProviderError;
use crate::poller::{PollConfig, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Settings from the provider configuration block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Overrides the default task timeout, in seconds.
    #[serde(default)]
    pub task_timeout_seconds: Option<u64>,
    /// Overrides the default delay between task status queries, in seconds.
    #[serde(default)]
    pub task_poll_interval_seconds: Option<u64>,
    /// Organizational unit applied to policies that don't set one.
    #[serde(default)]
    pub organizational_unit_id: Option<String>,
}

impl ProviderConfig {
    /// Parse and check a provider configuration value.
    ///
    /// `null` is accepted and yields the defaults.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        config.poll_config()?;
        Ok(config)
    }

    /// Poll timing derived from this configuration.
    pub fn poll_config(&self) -> Result<PollConfig, ProviderError> {
        let timeout = self
            .task_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let interval = self
            .task_poll_interval_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INTERVAL);
        PollConfig::new(timeout, interval)
    }

    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        let optional_int = || Attribute::new(AttributeType::Int64, AttributeFlags::optional());
        Schema::new()
            .with_attribute(
                "task_timeout_seconds",
                optional_int()
                    .with_description("Maximum time to wait for an asynchronous backend task")
                    .with_default(serde_json::json!(DEFAULT_TIMEOUT.as_secs())),
            )
            .with_attribute(
                "task_poll_interval_seconds",
                optional_int()
                    .with_description("Delay between two task status queries")
                    .with_default(serde_json::json!(DEFAULT_INTERVAL.as_secs())),
            )
            .with_attribute(
                "organizational_unit_id",
                Attribute::optional_string()
                    .with_description("Organizational unit for policies that don't set one"),
            )
    }

    /// Check a configuration value, reporting problems as diagnostics.
    pub fn diagnose(value: &serde_json::Value) -> Vec<Diagnostic> {
        let mut diagnostics = crate::validation::validate(&Self::schema(), value);
        if !diagnostics.is_empty() {
            return diagnostics;
        }
        if let Err(e) = Self::from_value(value) {
            diagnostics.push(
                Diagnostic::error("Invalid provider configuration").with_detail(e.to_string()),
            );
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(&json!({})).unwrap();
        assert_eq!(config.poll_config().unwrap(), PollConfig::default());

        let config = ProviderConfig::from_value(&serde_json::Value::Null).unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ProviderConfig::from_value(&json!({
            "task_timeout_seconds": 120,
            "task_poll_interval_seconds": 2,
            "organizational_unit_id": "ou-7"
        }))
        .unwrap();

        let poll = config.poll_config().unwrap();
        assert_eq!(poll.timeout(), Duration::from_secs(120));
        assert_eq!(poll.interval(), Duration::from_secs(2));
        assert_eq!(config.organizational_unit_id.as_deref(), Some("ou-7"));
    }

    #[test]
    fn test_published_defaults_match_poll_defaults() {
        let schema = ProviderConfig::schema();
        let poll = ProviderConfig::default().poll_config().unwrap();
        assert_eq!(
            schema.block.attributes["task_timeout_seconds"].default,
            Some(json!(poll.timeout().as_secs()))
        );
        assert_eq!(
            schema.block.attributes["task_poll_interval_seconds"].default,
            Some(json!(poll.interval().as_secs()))
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err =
            ProviderConfig::from_value(&json!({"task_poll_interval_seconds": 0})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(ProviderConfig::from_value(&json!({"api_tokn": "x"})).is_err());
    }

    #[test]
    fn test_diagnose() {
        assert!(ProviderConfig::diagnose(&json!({"task_timeout_seconds": 30})).is_empty());

        let diagnostics = ProviderConfig::diagnose(&json!({"task_timeout_seconds": "soon"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("task_timeout_seconds")
        );

        let diagnostics = ProviderConfig::diagnose(&json!({"task_timeout_seconds": 0}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid provider configuration");
    }
}
