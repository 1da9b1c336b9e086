//! Testing utilities for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way an orchestrator
//! would, and [`MemoryCredentialStore`] stands in for a Jenkins server.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use jenkins_credential_provider::provider::JenkinsProvider;
//! use jenkins_credential_provider::testing::{MemoryCredentialStore, ProviderTester};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryCredentialStore::new());
//! let tester = ProviderTester::new(JenkinsProvider::with_store(store.clone()));
//!
//! let state = tester
//!     .lifecycle_create("jenkins_credential_string", json!({"name": "foo", "secret": "bar"}))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(state["id"], "/foo");
//! assert!(store.get("", "_", "foo").is_some());
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ClientError, CredentialStore, StringCredentials};
use crate::error::ProviderError;
use crate::folder::normalize;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

/// Drives a [`ProviderService`] through the calls an orchestrator makes.
///
/// Validation and configuration helpers turn error diagnostics into
/// [`TestError::Diagnostics`]; warnings are ignored.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.configure(config).await?)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        check_diagnostics(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        check_diagnostics(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Plan with no prior state; the configuration doubles as proposed state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan a change from `prior_state` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read a resource; `None` means it is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Read a resource that must exist.
    pub async fn read_existing(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let id = current_state
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.read(resource_type, current_state)
            .await?
            .ok_or(ProviderError::NotFound(id))
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import by identifier.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create, then read back.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read_existing(resource_type, created).await
    }

    /// Plan, update, then read back.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .provider
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read_existing(resource_type, updated).await
    }

    /// Plan a destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, then delete; returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a [`ProviderTester`] call.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics were returned.
    Diagnostics(Vec<Diagnostic>),
    /// The provider returned an error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
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

/// Assert that a plan creates without replacing anything.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "expected changes for create, got none");
    assert!(!plan.requires_replace, "expected create, not replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, got {:?}",
        changed_paths(plan)
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "expected replacement, plan updates in place");
}

/// Assert that a plan changes the attribute at `path`.
///
/// # Panics
///
/// Panics if no change targets `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change to '{}', changed: {:?}",
        path,
        changed_paths(plan)
    );
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert that an error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "expected an error containing '{}', got {:?}",
        substring,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

// =========================================================================
// In-memory credential store
// =========================================================================

type CredentialKey = (String, String, String);

#[derive(Default)]
struct MemoryState {
    folders: HashSet<String>,
    credentials: HashMap<CredentialKey, StringCredentials>,
    failures: HashMap<String, u16>,
    calls: HashMap<String, usize>,
}

/// A [`CredentialStore`] held in memory.
///
/// Behaves like a Jenkins server with the credentials plugin: unknown folders
/// and credentials answer 404, adding an existing credential answers 409, and
/// an update without a secret keeps the stored one. Folders are keyed by
/// their canonical path; the root namespace always exists.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<MemoryState>,
}

impl MemoryCredentialStore {
    /// Create an empty store with only the root namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a folder. Any spelling accepted by [`normalize`] works.
    pub fn with_folder(self, folder: &str) -> Self {
        self.lock().folders.insert(normalize(folder));
        self
    }

    /// Seed a credential directly, bypassing folder checks.
    pub fn insert(&self, folder: &str, domain: &str, credentials: StringCredentials) {
        let key = key(&normalize(folder), domain, &credentials.id);
        self.lock().credentials.insert(key, credentials);
    }

    /// Look up a stored credential, including its secret.
    pub fn get(&self, folder: &str, domain: &str, name: &str) -> Option<StringCredentials> {
        self.lock()
            .credentials
            .get(&key(&normalize(folder), domain, name))
            .cloned()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.lock().credentials.len()
    }

    /// Whether no credential is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next call to `operation` fail with the given HTTP status.
    ///
    /// `operation` is a [`CredentialStore`] method name such as `"add"`.
    pub fn fail_next(&self, operation: &str, status: u16) {
        self.lock().failures.insert(operation.to_string(), status);
    }

    /// Number of times `operation` has been called.
    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call and consume an injected failure, if any.
    fn enter(&self, operation: &str, url: &str) -> Result<MutexGuard<'_, MemoryState>, ClientError> {
        let mut state = self.lock();
        *state.calls.entry(operation.to_string()).or_default() += 1;
        match state.failures.remove(operation) {
            Some(status) => Err(status_error(url, status)),
            None => Ok(state),
        }
    }
}

fn key(folder: &str, domain: &str, name: &str) -> CredentialKey {
    (folder.to_string(), domain.to_string(), name.to_string())
}

fn memory_url(folder: &str, domain: &str, name: &str) -> String {
    format!("memory://{}/domain/{}/credential/{}", folder, domain, name)
}

fn status_error(url: &str, status: u16) -> ClientError {
    ClientError::Status {
        url: url.to_string(),
        status,
    }
}

fn folder_exists(state: &MemoryState, folder: &str) -> bool {
    folder.is_empty() || state.folders.contains(folder)
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn check_folder(&self, folder: &str) -> Result<(), ClientError> {
        let url = format!("memory://{}", folder);
        let state = self.enter("check_folder", &url)?;
        if folder_exists(&state, folder) {
            Ok(())
        } else {
            Err(status_error(&url, 404))
        }
    }

    async fn add(
        &self,
        folder: &str,
        domain: &str,
        credentials: &StringCredentials,
    ) -> Result<(), ClientError> {
        let url = memory_url(folder, domain, &credentials.id);
        let mut state = self.enter("add", &url)?;
        if !folder_exists(&state, folder) {
            return Err(status_error(&url, 404));
        }

        let key = key(folder, domain, &credentials.id);
        if state.credentials.contains_key(&key) {
            return Err(status_error(&url, 409));
        }
        state.credentials.insert(key, credentials.clone());
        Ok(())
    }

    async fn get_single(
        &self,
        folder: &str,
        domain: &str,
        name: &str,
    ) -> Result<StringCredentials, ClientError> {
        let url = memory_url(folder, domain, name);
        let state = self.enter("get_single", &url)?;
        state
            .credentials
            .get(&key(folder, domain, name))
            .map(|stored| StringCredentials {
                // Jenkins never hands back the plain secret
                secret: None,
                ..stored.clone()
            })
            .ok_or_else(|| status_error(&url, 404))
    }

    async fn update(
        &self,
        folder: &str,
        domain: &str,
        name: &str,
        credentials: &StringCredentials,
    ) -> Result<(), ClientError> {
        let url = memory_url(folder, domain, name);
        let mut state = self.enter("update", &url)?;
        let stored = state
            .credentials
            .get_mut(&key(folder, domain, name))
            .ok_or_else(|| status_error(&url, 404))?;

        let secret = credentials
            .secret
            .clone()
            .or_else(|| stored.secret.take());
        *stored = StringCredentials {
            secret,
            ..credentials.clone()
        };
        Ok(())
    }

    async fn delete(&self, folder: &str, domain: &str, name: &str) -> Result<(), ClientError> {
        let url = memory_url(folder, domain, name);
        let mut state = self.enter("delete", &url)?;
        state
            .credentials
            .remove(&key(folder, domain, name))
            .map(|_| ())
            .ok_or_else(|| status_error(&url, 404))
    }
}
