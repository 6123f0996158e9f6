//! Backup Provider
//!
//! A Terraform-style provider for a backup-management service. Resources are
//! managed through a [`BackupApi`]; mutations that the backend runs
//! asynchronously return a task handle, and the provider blocks on it with
//! [`TaskPoller`] before reporting the operation as done.
//!
//! # Overview
//!
//! - **TaskPoller**: waits for a backend task with a time budget, a fixed
//!   query interval and cooperative cancellation
//! - **Schema types**: describe the provider, resource and data source schemas
//! - **ProviderService trait**: the operations a plugin host drives
//! - **BackupProvider**: the `backup_policy` resource and the
//!   `backup_dynamodb_tables` data source
//! - **Error types**: client, poll and provider errors
//! - **Logging**: `tracing` output on stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use backup_provider::{BackupProvider, ProviderConfig, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     backup_provider::init_logging();
//!
//!     let config = ProviderConfig::from_value(&json!({
//!         "task_timeout_seconds": 900,
//!         "task_poll_interval_seconds": 10
//!     }))?;
//!     let provider = BackupProvider::new(MyBackupApi::connect().await?, config)?;
//!
//!     let prior = provider
//!         .read("backup_policy", json!({"id": "policy-1"}))
//!         .await?;
//!     provider.delete("backup_policy", prior).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Task Polling
//!
//! Update and delete calls return a task handle. The provider polls it with
//! the provider-wide budget from [`ProviderConfig`] (one hour and five
//! seconds by default):
//!
//! - `completed` finishes the operation
//! - `failed` or `aborted` fails it at once, without retrying
//! - any other status is polled again until the budget runs out
//!
//! [`ProviderService::stop`] cancels every wait in flight.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::BackupApi;
pub use config::ProviderConfig;
pub use error::{ClientError, PollError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use poller::{PollConfig, PollOutcome, TaskCompletion, TaskPoller, TaskStatusClient};
pub use provider::{BackupProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, TaskHandle, TaskPhase,
    TaskStatus,
};
pub use validation::validate;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
