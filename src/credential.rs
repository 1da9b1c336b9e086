//! The `jenkins_credential_string` resource model.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::folder::normalize;
use crate::id::credential_id;
use crate::schema::{Attribute, Schema};

/// Type name of the resource and of the data source.
pub const CREDENTIAL_STRING: &str = "jenkins_credential_string";

/// The global credential domain.
pub const DEFAULT_DOMAIN: &str = "_";

/// Scope given to credentials that do not configure one.
pub const DEFAULT_SCOPE: &str = "GLOBAL";

/// Description given to credentials that do not configure one.
pub const DEFAULT_DESCRIPTION: &str = "Managed by Terraform";

/// Scopes Jenkins accepts for secret text credentials.
pub const SUPPORTED_SCOPES: [&str; 2] = ["SYSTEM", "GLOBAL"];

/// Desired or recorded state of a secret string credential.
///
/// An empty `secret` means the secret is not managed: it is never read back
/// and never overwritten.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialString {
    /// Canonical identifier, empty until the credential is created.
    #[serde(default)]
    pub id: String,
    /// Credential name, the remote primary key within its domain.
    pub name: String,
    /// Credential domain.
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Folder holding the credential; empty for the root namespace.
    #[serde(default)]
    pub folder: String,
    /// Jenkins scope.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Free-form description.
    #[serde(default = "default_description")]
    pub description: String,
    /// Secret text.
    #[serde(default)]
    pub secret: String,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

impl CredentialString {
    /// Create a credential with every optional attribute at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            domain: default_domain(),
            folder: String::new(),
            scope: default_scope(),
            description: default_description(),
            secret: String::new(),
        }
    }

    /// Set the folder.
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    /// Set the domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Decode a recorded state document.
    ///
    /// `null` attributes are treated as absent so that defaults apply. Values
    /// are not checked: state mirrors whatever Jenkins last reported, which
    /// may be a scope this provider cannot set.
    pub fn from_state(state: Value) -> Result<Self, ProviderError> {
        serde_json::from_value(strip_nulls(state)).map_err(|e| {
            ProviderError::InvalidRequest(format!("invalid {} state: {}", CREDENTIAL_STRING, e))
        })
    }

    /// Decode a user configuration or planned state and validate it.
    pub fn from_config(config: Value) -> Result<Self, ProviderError> {
        let credential = Self::from_state(config)?;
        credential.validate()?;
        Ok(credential)
    }

    /// Encode the credential as a state document.
    pub fn to_state(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "domain": self.domain,
            "folder": self.folder,
            "scope": self.scope,
            "description": self.description,
            "secret": self.secret,
        })
    }

    /// Check the attribute values the schema cannot express.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.name.is_empty() {
            return Err(ProviderError::Validation("name must not be empty".to_string()));
        }
        if self.name.contains('/') {
            return Err(ProviderError::Validation(format!(
                "name '{}' must not contain '/'",
                self.name
            )));
        }
        if self.domain.is_empty() || self.domain.contains('/') {
            return Err(ProviderError::Validation(format!(
                "invalid domain '{}'",
                self.domain
            )));
        }
        validate_scope(&self.scope)
    }

    /// The folder in canonical form.
    pub fn canonical_folder(&self) -> String {
        normalize(&self.folder)
    }

    /// The canonical identifier this credential is stored under.
    pub fn credential_id(&self) -> String {
        credential_id(&self.folder, &self.name)
    }

    /// Whether `self` and `other` address the same remote object.
    pub fn same_address(&self, other: &Self) -> bool {
        self.name == other.name
            && self.domain == other.domain
            && self.canonical_folder() == other.canonical_folder()
    }
}

impl fmt::Debug for CredentialString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialString")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("folder", &self.folder)
            .field("scope", &self.scope)
            .field("description", &self.description)
            .field("secret", &if self.secret.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Reject scopes Jenkins does not support.
pub fn validate_scope(scope: &str) -> Result<(), ProviderError> {
    if SUPPORTED_SCOPES.contains(&scope) {
        Ok(())
    } else {
        Err(ProviderError::Validation(format!(
            "Invalid scope: {}. Supported scopes are: {}",
            scope,
            SUPPORTED_SCOPES.join(", ")
        )))
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}

/// Schema of the `jenkins_credential_string` resource.
pub fn resource_schema() -> Schema {
    Schema::v0()
        .with_description("Manages a secret text credential in a Jenkins credential store.")
        .with_attribute(
            "id",
            Attribute::computed_string()
                .with_description("Canonical identifier: the canonical folder followed by the name."),
        )
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_description("The identifier assigned to the credentials.")
                .with_force_new(),
        )
        .with_attribute(
            "domain",
            Attribute::optional_string()
                .with_description("The domain namespace that the credentials will be added to.")
                .with_default(json!(DEFAULT_DOMAIN))
                // Jenkins offers no move between domains
                .with_force_new(),
        )
        .with_attribute(
            "folder",
            Attribute::optional_string()
                .with_description("The folder namespace that the credentials will be added to.")
                .with_force_new(),
        )
        .with_attribute(
            "scope",
            Attribute::optional_string()
                .with_description("The Jenkins scope assigned to the credentials.")
                .with_default(json!(DEFAULT_SCOPE))
                .with_allowed_values(SUPPORTED_SCOPES),
        )
        .with_attribute(
            "description",
            Attribute::optional_string()
                .with_description("The credentials descriptive text.")
                .with_default(json!(DEFAULT_DESCRIPTION)),
        )
        .with_attribute(
            "secret",
            Attribute::optional_string()
                .with_description(
                    "The credentials secret text string. If left empty will be unmanaged.",
                )
                .sensitive(),
        )
}

/// Schema of the `jenkins_credential_string` data source.
pub fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Reads a secret text credential from a Jenkins credential store.")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The identifier assigned to the credentials."),
        )
        .with_attribute(
            "domain",
            Attribute::optional_string()
                .with_description("The domain namespace that the credentials will be added to.")
                .with_default(json!(DEFAULT_DOMAIN)),
        )
        .with_attribute(
            "folder",
            Attribute::optional_string()
                .with_description("The folder namespace that the credentials will be added to."),
        )
        .with_attribute(
            "scope",
            Attribute::computed_string()
                .with_description("The Jenkins scope assigned to the credentials."),
        )
        .with_attribute(
            "description",
            Attribute::computed_string().with_description("The credentials descriptive text."),
        )
}
