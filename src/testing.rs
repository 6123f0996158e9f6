//! Testing utilities for the provider and the task poller.
//!
//! - [`ProviderTester`] drives a [`ProviderService`] without a plugin host.
//! - [`ScriptedTaskClient`] answers task status queries from a fixed script.
//! - [`FakeBackupApi`] is an in-memory backend with scriptable tasks.
//!
//! # Example
//!
//! ```ignore
//! use backup_provider::testing::{FakeBackupApi, ProviderTester};
//! use backup_provider::{BackupProvider, ProviderConfig};
//! use serde_json::json;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_create_policy() {
//!     let provider =
//!         BackupProvider::new(FakeBackupApi::new(), ProviderConfig::default()).unwrap();
//!     let tester = ProviderTester::new(provider);
//!
//!     let state = tester.lifecycle_create("backup_policy", json!({
//!         "name": "gold",
//!         "operations": [/* ... */]
//!     })).await.unwrap();
//!
//!     assert_eq!(state["name"], "gold");
//! }
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::client::{BackupApi, DynamoDbTable, Policy, PolicyInput};
use crate::error::{ClientError, ProviderError};
use crate::poller::TaskStatusClient;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, TaskHandle, TaskStatus};

/// A test harness for provider implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: plan → create → read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Run a full update lifecycle: plan → update → read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Run a full delete lifecycle: plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

// =========================================================================
// Task Status Doubles
// =========================================================================

enum Script {
    Sequence(VecDeque<Result<TaskStatus, ClientError>>),
    Repeat(TaskStatus),
}

/// A [`TaskStatusClient`] that replays a fixed list of answers.
///
/// Records the (tokio) time of every query relative to its creation, so tests
/// running with a paused clock can check the exact query schedule.
pub struct ScriptedTaskClient {
    script: Mutex<Script>,
    latency: Duration,
    created: Instant,
    offsets: Mutex<Vec<Duration>>,
}

impl ScriptedTaskClient {
    /// Answer queries with `answers` in order; further queries fail.
    pub fn new(answers: Vec<Result<TaskStatus, ClientError>>) -> Self {
        Self::with_script(Script::Sequence(answers.into()))
    }

    /// Answer every query with `status`.
    pub fn repeating(status: TaskStatus) -> Self {
        Self::with_script(Script::Repeat(status))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            latency: Duration::ZERO,
            created: Instant::now(),
            offsets: Mutex::new(Vec::new()),
        }
    }

    /// Make every query take `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of queries received.
    pub fn queries(&self) -> usize {
        self.offsets.lock().unwrap().len()
    }

    /// Start time of every query, relative to creation.
    pub fn query_offsets(&self) -> Vec<Duration> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskStatusClient for ScriptedTaskClient {
    async fn read_task_status(&self, _handle: &TaskHandle) -> Result<TaskStatus, ClientError> {
        self.offsets.lock().unwrap().push(self.created.elapsed());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut script = self.script.lock().unwrap();
        match &mut *script {
            Script::Sequence(answers) => answers
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("script exhausted".to_string()))),
            Script::Repeat(status) => Ok(status.clone()),
        }
    }
}

// =========================================================================
// In-memory Backend
// =========================================================================

#[derive(Default)]
struct FakeState {
    policies: BTreeMap<String, Policy>,
    tables: Vec<DynamoDbTable>,
    tasks: HashMap<String, VecDeque<TaskStatus>>,
    next_script: Option<Vec<TaskStatus>>,
    last_filter: Option<String>,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn start_task(&mut self) -> TaskHandle {
        let id = self.next_id("task");
        let script = self
            .next_script
            .take()
            .unwrap_or_else(|| vec![TaskStatus::completed()]);
        self.tasks.insert(id.clone(), script.into());
        TaskHandle(id)
    }
}

/// An in-memory [`BackupApi`].
///
/// Mutations take effect immediately; the tasks they return replay the
/// script set with [`FakeBackupApi::script_next_task`], or complete on the
/// first query by default. A task keeps reporting its last scripted status.
#[derive(Default)]
pub struct FakeBackupApi {
    state: Mutex<FakeState>,
    task_queries: AtomicU32,
}

impl FakeBackupApi {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status sequence of the next task the backend starts.
    pub fn script_next_task(&self, statuses: Vec<TaskStatus>) {
        self.state.lock().unwrap().next_script = Some(statuses);
    }

    /// Register a DynamoDB table.
    pub fn add_table(&self, table: DynamoDbTable) {
        self.state.lock().unwrap().tables.push(table);
    }

    /// Number of stored policies.
    pub fn policy_count(&self) -> usize {
        self.state.lock().unwrap().policies.len()
    }

    /// Total number of task status queries received.
    pub fn task_queries(&self) -> u32 {
        self.task_queries.load(Ordering::SeqCst)
    }

    /// Filter string of the most recent table listing.
    pub fn last_filter(&self) -> Option<String> {
        self.state.lock().unwrap().last_filter.clone()
    }
}

fn apply_input(policy: &mut Policy, input: &PolicyInput) {
    policy.name = input.name.clone();
    policy.activation_status = input.activation_status.clone();
    policy.timezone = input.timezone.clone();
    if let Some(ou) = &input.organizational_unit_id {
        policy.organizational_unit_id = ou.clone();
    }
    policy.operations = input.operations.clone();
}

fn table_matches(table: &DynamoDbTable, filter: &serde_json::Map<String, Value>) -> bool {
    filter.iter().all(|(field, condition)| {
        let actual = match field.as_str() {
            "account_native_id" => &table.account_native_id,
            "aws_region" => &table.aws_region,
            "table_native_id" => &table.table_native_id,
            "name" => &table.name,
            _ => return false,
        };
        if let Some(expected) = condition.get("$eq").and_then(Value::as_str) {
            return actual == expected;
        }
        if let Some(part) = condition.get("$contains").and_then(Value::as_str) {
            return actual.contains(part);
        }
        false
    })
}

#[async_trait]
impl TaskStatusClient for FakeBackupApi {
    async fn read_task_status(&self, handle: &TaskHandle) -> Result<TaskStatus, ClientError> {
        self.task_queries.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let script = state
            .tasks
            .get_mut(handle.as_str())
            .ok_or_else(|| ClientError::NotFound(format!("task {}", handle)))?;
        let status = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        status.ok_or_else(|| ClientError::Transport(format!("task {} has no status", handle)))
    }
}

#[async_trait]
impl BackupApi for FakeBackupApi {
    async fn create_policy(&self, input: &PolicyInput) -> Result<Policy, ClientError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("policy");
        let mut policy = Policy {
            id: id.clone(),
            name: String::new(),
            activation_status: String::new(),
            timezone: None,
            organizational_unit_id: "ou-global".to_string(),
            lock_status: "unlocked".to_string(),
            operations: Vec::new(),
        };
        apply_input(&mut policy, input);
        state.policies.insert(id, policy.clone());
        Ok(policy)
    }

    async fn read_policy(&self, id: &str) -> Result<Policy, ClientError> {
        self.state
            .lock()
            .unwrap()
            .policies
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("policy {}", id)))
    }

    async fn update_policy(
        &self,
        id: &str,
        input: &PolicyInput,
    ) -> Result<TaskHandle, ClientError> {
        let mut state = self.state.lock().unwrap();
        let policy = state
            .policies
            .get_mut(id)
            .ok_or_else(|| ClientError::NotFound(format!("policy {}", id)))?;
        apply_input(policy, input);
        Ok(state.start_task())
    }

    async fn delete_policy(&self, id: &str) -> Result<TaskHandle, ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .policies
            .remove(id)
            .ok_or_else(|| ClientError::NotFound(format!("policy {}", id)))?;
        Ok(state.start_task())
    }

    async fn list_dynamodb_tables(&self, filter: &str) -> Result<Vec<DynamoDbTable>, ClientError> {
        let parsed: serde_json::Map<String, Value> = serde_json::from_str(filter)?;
        let mut state = self.state.lock().unwrap();
        state.last_filter = Some(filter.to_string());
        Ok(state
            .tables
            .iter()
            .filter(|t| table_matches(t, &parsed))
            .cloned()
            .collect())
    }
}
