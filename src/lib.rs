//! Jenkins Credential Provider
//!
//! An infrastructure-as-code provider that manages Jenkins "secret text"
//! credentials: create, read, update, delete and import of the
//! `jenkins_credential_string` resource, and lookup through the data source
//! of the same name.
//!
//! # Overview
//!
//! - **Folder namespaces**: [`folder::normalize`] maps `a/b` and
//!   `/job/a/job/b` to one canonical path
//! - **Identifiers**: [`id::credential_id`] and [`import::ImportId`]
//! - **Reconciler**: [`reconciler`] runs CRUD against a [`client::CredentialStore`]
//! - **Jenkins client**: [`client::JenkinsClient`] over the credentials REST API
//! - **Provider surface**: [`ProviderService`] implemented by [`JenkinsProvider`]
//! - **Schema and validation**: attribute schemas reported to the orchestrator
//! - **Logging**: structured `tracing` output on stderr
//!
//! # Quick Start
//!
//! ```no_run
//! use jenkins_credential_provider::{init_logging, JenkinsProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = JenkinsProvider::new();
//!     provider
//!         .configure(json!({
//!             "server_url": "https://ci.example.com",
//!             "username": "admin",
//!             "password": "api-token",
//!         }))
//!         .await?;
//!
//!     let plan = provider
//!         .plan(
//!             "jenkins_credential_string",
//!             None,
//!             json!({"name": "deploy-token", "folder": "teamA", "secret": "s3cr3t"}),
//!             serde_json::Value::Null,
//!         )
//!         .await?;
//!     let state = provider
//!         .create("jenkins_credential_string", plan.planned_state)
//!         .await?;
//!
//!     assert_eq!(state["id"], "/job/teamA/deploy-token");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod folder;
pub mod id;
pub mod import;
pub mod logging;
pub mod provider;
pub mod reconciler;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{ClientError, CredentialStore, JenkinsClient, StringCredentials};
pub use config::JenkinsConfig;
pub use credential::{CredentialString, CREDENTIAL_STRING};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{JenkinsProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::validate;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
