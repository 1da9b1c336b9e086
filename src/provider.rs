//! The provider surface driven by the orchestrator.
//!
//! [`ProviderService`] is the set of operations an infrastructure-as-code
//! orchestrator invokes on a provider: schema discovery, configuration,
//! validation, planning, CRUD, import and data source reads. State and
//! configuration cross this boundary as JSON documents.
//!
//! [`JenkinsProvider`] implements it for the `jenkins_credential_string`
//! resource and data source, delegating to the [`crate::reconciler`].

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::{CredentialStore, JenkinsClient};
use crate::config::JenkinsConfig;
use crate::credential::{data_source_schema, resource_schema, CredentialString, CREDENTIAL_STRING};
use crate::error::ProviderError;
use crate::import::ImportId;
use crate::reconciler::{self, RemoteCredential};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation::validate;

/// Operations the orchestrator invokes on a provider.
///
/// Only [`ProviderService::metadata`] has a default, derived from the schema.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return the resource and data source type names, sorted.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value)
        -> Result<Vec<Diagnostic>, ProviderError>;

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release the configured client.
    async fn stop(&self) -> Result<(), ProviderError>;

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Plan changes for a resource. A `Null` proposed state plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    ///
    /// Returns `None` when the resource no longer exists remotely.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Adopt an existing remote object, returning partial state to be read.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError>;

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

/// Provider managing Jenkins secret string credentials.
///
/// The credential store handle is installed by [`ProviderService::configure`],
/// or up front with [`JenkinsProvider::with_store`].
pub struct JenkinsProvider {
    store: RwLock<Option<Arc<dyn CredentialStore>>>,
}

impl Default for JenkinsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl JenkinsProvider {
    /// Create an unconfigured provider.
    pub fn new() -> Self {
        Self {
            store: RwLock::new(None),
        }
    }

    /// Create a provider that uses the given credential store.
    pub fn with_store(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store: RwLock::new(Some(store)),
        }
    }

    async fn store(&self) -> Result<Arc<dyn CredentialStore>, ProviderError> {
        self.store.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    /// Read the credential back and fold the remote attributes into `credential`.
    async fn refresh(
        &self,
        mut credential: CredentialString,
    ) -> Result<Option<CredentialString>, ProviderError> {
        let store = self.store().await?;
        let remote = reconciler::read(
            store.as_ref(),
            &credential.folder,
            &credential.domain,
            &credential.name,
        )
        .await?;

        Ok(remote.map(|RemoteCredential { scope, description }| {
            credential.id = credential.credential_id();
            credential.scope = scope;
            credential.description = description;
            credential
        }))
    }
}

fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "server_url",
            Attribute::optional_string()
                .with_description("The URL of the Jenkins server. Defaults to JENKINS_URL."),
        )
        .with_attribute(
            "username",
            Attribute::optional_string()
                .with_description("Username for authentication. Defaults to JENKINS_USERNAME."),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .with_description(
                    "Password or API token for authentication. Defaults to JENKINS_PASSWORD.",
                )
                .sensitive(),
        )
        .with_attribute(
            "timeout_seconds",
            Attribute::optional_int64()
                .with_description("Timeout for each request to the Jenkins server.")
                .with_default(json!(crate::config::DEFAULT_TIMEOUT_SECONDS)),
        )
}

fn ensure_known(resource_type: &str) -> Result<(), ProviderError> {
    if resource_type == CREDENTIAL_STRING {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }
}

fn plan_create(mut desired: CredentialString) -> PlanResult {
    desired.id = desired.credential_id();

    let mut changes = vec![
        AttributeChange::added("id", json!(desired.id)),
        AttributeChange::added("name", json!(desired.name)),
        AttributeChange::added("domain", json!(desired.domain)),
        AttributeChange::added("folder", json!(desired.folder)),
        AttributeChange::added("scope", json!(desired.scope)),
        AttributeChange::added("description", json!(desired.description)),
    ];
    if !desired.secret.is_empty() {
        changes.push(AttributeChange::added("secret", json!(desired.secret)).masked());
    }

    PlanResult::with_changes(desired.to_state(), changes, false)
}

fn plan_update(prior: CredentialString, mut desired: CredentialString) -> PlanResult {
    let mut changes = Vec::new();
    let mut compare = |path: &str, before: &str, after: &str| {
        if before != after {
            changes.push(AttributeChange::modified(path, json!(before), json!(after)));
        }
    };

    compare("name", &prior.name, &desired.name);
    compare("domain", &prior.domain, &desired.domain);
    if prior.canonical_folder() != desired.canonical_folder() {
        compare("folder", &prior.folder, &desired.folder);
    }
    compare("scope", &prior.scope, &desired.scope);
    compare("description", &prior.description, &desired.description);

    // An empty secret is unmanaged and never counts as a change
    if !desired.secret.is_empty() && desired.secret != prior.secret {
        changes.push(
            AttributeChange::modified("secret", json!(prior.secret), json!(desired.secret))
                .masked(),
        );
    }

    let requires_replace = !prior.same_address(&desired);
    desired.id = if requires_replace || prior.id.is_empty() {
        desired.credential_id()
    } else {
        prior.id.clone()
    };
    if requires_replace {
        changes.push(AttributeChange::modified(
            "id",
            json!(prior.id),
            json!(desired.id),
        ));
    }

    PlanResult::with_changes(desired.to_state(), changes, requires_replace)
}

#[async_trait::async_trait]
impl ProviderService for JenkinsProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(CREDENTIAL_STRING, resource_schema())
            .with_data_source(CREDENTIAL_STRING, data_source_schema())
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_config_schema(), &config);
        if !diagnostics.is_empty() {
            return Ok(diagnostics);
        }

        match JenkinsConfig::from_value(config) {
            Ok(config) if config.server_url.scheme() == "http" && config.password.is_some() => {
                diagnostics.push(
                    Diagnostic::warning("Password is sent over plain HTTP")
                        .with_detail(format!(
                            "{} does not use TLS; basic authentication exposes the password",
                            config.server_url
                        ))
                        .with_attribute("server_url"),
                );
            },
            Ok(_) => {},
            Err(e) => diagnostics.push(e.to_diagnostic()),
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = JenkinsConfig::from_value(config)?;
        let client = JenkinsClient::new(&config)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        info!(server_url = %config.server_url, "Configured Jenkins client");
        *self.store.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stopping provider");
        *self.store.write().await = None;
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        ensure_known(resource_type)?;
        Ok(validate(&resource_schema(), &config))
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        ensure_known(resource_type)?;

        if proposed_state.is_null() {
            let changes = prior_state
                .as_ref()
                .and_then(|prior| prior.get("id"))
                .filter(|id| !id.is_null())
                .map(|id| vec![AttributeChange::removed("id", id.clone())])
                .unwrap_or_default();
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let desired = CredentialString::from_config(proposed_state)?;
        let plan = match prior_state.filter(|prior| !prior.is_null()) {
            None => plan_create(desired),
            Some(prior) => plan_update(CredentialString::from_state(prior)?, desired),
        };

        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Planned string credentials"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        ensure_known(resource_type)?;
        let mut created = CredentialString::from_config(planned_state)?;
        let store = self.store().await?;

        created.id = reconciler::create(store.as_ref(), &created).await?;

        // The credential exists from here on: a failed read-back still records it
        match self.refresh(created.clone()).await {
            Ok(Some(refreshed)) => Ok(refreshed.to_state()),
            Ok(None) => {
                warn!(id = %created.id, "Created string credentials are not visible yet");
                Ok(created.to_state())
            },
            Err(e) => {
                warn!(id = %created.id, error = %e, "Could not read back created string credentials");
                Ok(created.to_state())
            },
        }
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        ensure_known(resource_type)?;
        let current = CredentialString::from_state(current_state)?;
        let id = current.credential_id();

        match self.refresh(current).await? {
            Some(credential) => Ok(Some(credential.to_state())),
            None => {
                warn!(id = %id, "String credentials not found, removing from state");
                Ok(None)
            },
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        ensure_known(resource_type)?;
        let prior = CredentialString::from_state(prior_state)?;
        let desired = CredentialString::from_config(planned_state)?;

        if !prior.same_address(&desired) {
            return Err(ProviderError::InvalidRequest(format!(
                "changing name, domain or folder of {} requires replacement",
                prior.credential_id()
            )));
        }

        let store = self.store().await?;
        reconciler::update(store.as_ref(), &desired).await?;

        let id = desired.credential_id();
        self.refresh(desired)
            .await?
            .map(|c| c.to_state())
            .ok_or(ProviderError::NotFound(id))
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        ensure_known(resource_type)?;
        let current = CredentialString::from_state(current_state)?;
        let store = self.store().await?;

        reconciler::delete(
            store.as_ref(),
            &current.folder,
            &current.domain,
            &current.name,
        )
        .await
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        ensure_known(resource_type)?;
        let import = ImportId::parse(id)?;

        let mut credential = CredentialString::new(&import.name)
            .with_domain(&import.domain)
            .with_folder(&import.folder);
        credential.id = import.credential_id();
        credential.validate()?;

        info!(id = %credential.id, "Imported string credentials");
        Ok(vec![ImportedResource::new(
            CREDENTIAL_STRING,
            credential.to_state(),
        )])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        ensure_known(data_source_type)?;
        Ok(validate(&data_source_schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        ensure_known(data_source_type)?;
        let wanted = CredentialString::from_config(config)?;
        let id = wanted.credential_id();

        let credential = self
            .refresh(wanted)
            .await?
            .ok_or(ProviderError::NotFound(id))?;

        Ok(json!({
            "id": credential.id,
            "name": credential.name,
            "domain": credential.domain,
            "folder": credential.folder,
            "scope": credential.scope,
            "description": credential.description,
        }))
    }
}
