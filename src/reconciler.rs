//! Create/read/update/delete of secret string credentials.
//!
//! Each operation issues its remote calls once; retrying is left to the
//! orchestrator. The secret is write-only: it is sent on create, sent on
//! update only when non-empty, and never read back.

use tracing::{debug, info, instrument};

use crate::client::{CredentialStore, StringCredentials};
use crate::credential::CredentialString;
use crate::error::ProviderError;
use crate::folder::{ensure_folder_exists, normalize};
use crate::id::credential_id;

/// The attributes of a credential that can be read back from Jenkins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredential {
    /// Jenkins scope.
    pub scope: String,
    /// Free-form description.
    pub description: String,
}

/// Create the credential and return its canonical identifier.
///
/// Fails with a validation error before touching the store if the folder
/// does not exist.
#[instrument(skip(store, desired), fields(name = %desired.name, folder = %desired.folder))]
pub async fn create(
    store: &dyn CredentialStore,
    desired: &CredentialString,
) -> Result<String, ProviderError> {
    let folder = normalize(&desired.folder);
    ensure_folder_exists(store, &folder).await?;

    let record = StringCredentials {
        id: desired.name.clone(),
        scope: desired.scope.clone(),
        description: desired.description.clone(),
        secret: Some(desired.secret.clone()),
    };

    let id = credential_id(&folder, &desired.name);
    store
        .add(&folder, &desired.domain, &record)
        .await
        .map_err(|e| ProviderError::remote("create", &id, e))?;

    info!(id = %id, "Created string credentials");
    Ok(id)
}

/// Read the credential back.
///
/// Returns `Ok(None)` when Jenkins reports it does not exist.
#[instrument(skip(store))]
pub async fn read(
    store: &dyn CredentialStore,
    folder: &str,
    domain: &str,
    name: &str,
) -> Result<Option<RemoteCredential>, ProviderError> {
    let folder = normalize(folder);

    match store.get_single(&folder, domain, name).await {
        Ok(record) => Ok(Some(RemoteCredential {
            scope: record.scope,
            description: record.description,
        })),
        Err(e) if e.is_not_found() => {
            debug!("String credentials no longer exist");
            Ok(None)
        },
        Err(e) => Err(ProviderError::remote(
            "read",
            credential_id(&folder, name),
            e,
        )),
    }
}

/// Push the full desired attribute set to an existing credential.
///
/// An empty secret is left out of the request so the stored one is kept.
#[instrument(skip(store, desired), fields(name = %desired.name, folder = %desired.folder))]
pub async fn update(
    store: &dyn CredentialStore,
    desired: &CredentialString,
) -> Result<(), ProviderError> {
    let folder = normalize(&desired.folder);

    let record = StringCredentials {
        id: desired.name.clone(),
        scope: desired.scope.clone(),
        description: desired.description.clone(),
        secret: Some(desired.secret.clone()).filter(|s| !s.is_empty()),
    };

    let id = credential_id(&folder, &desired.name);
    store
        .update(&folder, &desired.domain, &desired.name, &record)
        .await
        .map_err(|e| ProviderError::remote("update", &id, e))?;

    info!(id = %id, secret_updated = record.secret.is_some(), "Updated string credentials");
    Ok(())
}

/// Delete the credential. A credential that is already gone is an error.
#[instrument(skip(store))]
pub async fn delete(
    store: &dyn CredentialStore,
    folder: &str,
    domain: &str,
    name: &str,
) -> Result<(), ProviderError> {
    let folder = normalize(folder);
    let id = credential_id(&folder, name);

    store
        .delete(&folder, domain, name)
        .await
        .map_err(|e| ProviderError::remote("delete", &id, e))?;

    info!(id = %id, "Deleted string credentials");
    Ok(())
}
