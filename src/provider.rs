//! The provider service.
//!
//! [`ProviderService`] is the surface a plugin host drives: schema lookup,
//! validation, planning, CRUD and data source reads, all exchanging state as
//! `serde_json::Value`. [`BackupProvider`] implements it on top of a
//! [`BackupApi`] client.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::client::BackupApi;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::resources::{dynamodb_tables, policy, ResourceContext};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Trait that provider implementations must implement.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return the names of all resources and data sources.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate a provider configuration block.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider, aborting in-flight waits.
    async fn stop(&self) -> Result<(), ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Plan changes for a resource. A null `proposed_state` plans a delete.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError>;

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError>;
}

/// Provider for the backup-management API.
pub struct BackupProvider<A> {
    ctx: ResourceContext<A>,
}

impl<A: BackupApi + 'static> BackupProvider<A> {
    /// Create a provider around an API client.
    pub fn new(api: A, config: ProviderConfig) -> Result<Self, ProviderError> {
        Self::with_shared_api(Arc::new(api), config)
    }

    /// Create a provider around a client shared with other owners.
    pub fn with_shared_api(api: Arc<A>, config: ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            ctx: ResourceContext::new(api, config)?,
        })
    }

    /// Create a provider from a raw configuration block.
    pub fn from_config_value(api: A, config: &Value) -> Result<Self, ProviderError> {
        Self::new(api, ProviderConfig::from_value(config)?)
    }

    /// The shared resource context.
    pub fn context(&self) -> &ResourceContext<A> {
        &self.ctx
    }
}

fn unknown_resource(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(resource_type.to_string())
}

fn log_result<T>(operation: &str, resource_type: &str, result: &Result<T, ProviderError>) {
    match result {
        Ok(_) => info!(resource_type, "{} completed successfully", operation),
        Err(e) => error!(resource_type, error = %e, "{} failed", operation),
    }
}

#[async_trait::async_trait]
impl<A: BackupApi + 'static> ProviderService for BackupProvider<A> {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(ProviderConfig::schema())
            .with_resource(policy::RESOURCE_TYPE, policy::schema())
            .with_data_source(dynamodb_tables::DATA_SOURCE_TYPE, dynamodb_tables::schema())
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(ProviderConfig::diagnose(&config))
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stopping provider, cancelling pending task waits");
        self.ctx.cancellation().cancel();
        Ok(())
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        match resource_type {
            policy::RESOURCE_TYPE => Ok(policy::diagnose(&config)),
            _ => Err(unknown_resource(resource_type)),
        }
    }

    #[instrument(skip(self, prior_state, proposed_state), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        debug!(has_prior = prior_state.is_some(), "Plan called");
        match resource_type {
            policy::RESOURCE_TYPE => policy::plan(prior_state.as_ref(), &proposed_state),
            _ => Err(unknown_resource(resource_type)),
        }
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let result = match resource_type {
            policy::RESOURCE_TYPE => policy::create(&self.ctx, &planned_state).await,
            _ => Err(unknown_resource(resource_type)),
        };
        log_result("Create", resource_type, &result);
        result
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        match resource_type {
            policy::RESOURCE_TYPE => policy::read(&self.ctx, &current_state).await,
            _ => Err(unknown_resource(resource_type)),
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let result = match resource_type {
            policy::RESOURCE_TYPE => policy::update(&self.ctx, &prior_state, &planned_state).await,
            _ => Err(unknown_resource(resource_type)),
        };
        log_result("Update", resource_type, &result);
        result
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let result = match resource_type {
            policy::RESOURCE_TYPE => policy::delete(&self.ctx, &current_state).await,
            _ => Err(unknown_resource(resource_type)),
        };
        log_result("Delete", resource_type, &result);
        result
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        match resource_type {
            policy::RESOURCE_TYPE => policy::import(&self.ctx, id).await,
            _ => Err(unknown_resource(resource_type)),
        }
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        match data_source_type {
            dynamodb_tables::DATA_SOURCE_TYPE => {
                Ok(crate::validation::validate(&dynamodb_tables::schema(), &config))
            }
            _ => Err(unknown_resource(data_source_type)),
        }
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let result = match data_source_type {
            dynamodb_tables::DATA_SOURCE_TYPE => dynamodb_tables::read(&self.ctx, &config).await,
            _ => Err(unknown_resource(data_source_type)),
        };
        log_result("ReadDataSource", data_source_type, &result);
        result
    }
}
