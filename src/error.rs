//! Error types for the Jenkins credential provider.

use thiserror::Error;

use crate::client::ClientError;
use crate::schema::Diagnostic;

/// Errors that can occur while serving a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Invalid request from the orchestrator.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A call to the Jenkins credential store failed.
    #[error("could not {operation} string credentials {id}: {source}")]
    Remote {
        /// The attempted operation (`create`, `read`, `update`, `delete`).
        operation: &'static str,
        /// Canonical identifier of the credential.
        id: String,
        /// The underlying client failure.
        #[source]
        source: ClientError,
    },
}

impl ProviderError {
    /// Wrap a client failure with the operation and credential it concerned.
    pub fn remote(operation: &'static str, id: impl Into<String>, source: ClientError) -> Self {
        Self::Remote {
            operation,
            id: id.into(),
            source,
        }
    }

    /// Render the error as an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string())
    }
}
