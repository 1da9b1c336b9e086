//! Folder namespace resolution.
//!
//! Jenkins addresses nested folders as `/job/<a>/job/<b>`. Users may write
//! either the plain form (`a/b`) or the canonical one, and both resolve to the
//! same canonical path.

use tracing::debug;

use crate::client::CredentialStore;
use crate::error::ProviderError;

/// Path token preceding every folder name in a canonical folder path.
pub const JOB_SEGMENT: &str = "job";

/// Normalize a folder path into its canonical `/job/<name>` form.
///
/// Empty segments are dropped, so leading, trailing and doubled separators
/// are ignored. A path that is already canonical is returned unchanged; an
/// empty path is the root namespace and maps to the empty string.
///
/// Because separators are ignored, any path that alternates `job` with a name
/// is read as canonical: `job/x` is `/job/x`, the folder `x`, and not a folder
/// `job` containing a folder `x`. A single folder named `job` still works
/// (`job` maps to `/job/job`), but `x` nested inside it must be written
/// canonically as `/job/job/job/x`.
///
/// ```
/// use jenkins_credential_provider::folder::normalize;
///
/// assert_eq!(normalize(""), "");
/// assert_eq!(normalize("a/b"), "/job/a/job/b");
/// assert_eq!(normalize("/job/a/job/b"), "/job/a/job/b");
/// assert_eq!(normalize("job/x"), "/job/x");
/// ```
pub fn normalize(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();

    let names: Vec<&str> = if is_canonical(&segments) {
        segments.iter().skip(1).step_by(2).copied().collect()
    } else {
        segments
    };

    names
        .iter()
        .map(|name| format!("/{}/{}", JOB_SEGMENT, name))
        .collect()
}

fn is_canonical(segments: &[&str]) -> bool {
    !segments.is_empty()
        && segments.len() % 2 == 0
        && segments.iter().step_by(2).all(|s| *s == JOB_SEGMENT)
}

/// Verify that a canonical folder exists before anything is created in it.
///
/// The root namespace always exists and is not checked remotely.
pub async fn ensure_folder_exists(
    store: &dyn CredentialStore,
    folder: &str,
) -> Result<(), ProviderError> {
    if folder.is_empty() {
        return Ok(());
    }

    debug!(folder = %folder, "Checking folder exists");
    store.check_folder(folder).await.map_err(|e| {
        ProviderError::Validation(format!("invalid folder name '{}' specified: {}", folder, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryCredentialStore;

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize("//"), "");
    }

    #[test]
    fn test_normalize_nested() {
        assert_eq!(normalize("teamA"), "/job/teamA");
        assert_eq!(normalize("a/b"), "/job/a/job/b");
        assert_eq!(normalize("/a/b/"), "/job/a/job/b");
        assert_eq!(normalize("a//b"), "/job/a/job/b");
    }

    #[test]
    fn test_normalize_canonical_input() {
        assert_eq!(normalize("/job/a"), "/job/a");
        assert_eq!(normalize("job/a/job/b"), "/job/a/job/b");
    }

    #[test]
    fn test_normalize_unrooted_job_prefix_is_canonical() {
        assert_eq!(normalize("job/x"), "/job/x");
        assert_eq!(normalize("job/x"), normalize("/job/x"));
        assert_eq!(normalize("/job/job/job/x"), "/job/job/job/x");
    }

    #[test]
    fn test_normalize_folder_named_job() {
        assert_eq!(normalize("job"), "/job/job");
        assert_eq!(normalize("/job/job"), "/job/job");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "",
            "/",
            "a",
            "a/b/c",
            "/job/a",
            "job/a/b",
            "job",
            "job/job/job",
            "x/job/y",
            "/a//b/",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "normalize not idempotent for {:?}", raw);
        }
    }

    #[tokio::test]
    async fn test_root_folder_needs_no_remote_check() {
        let store = MemoryCredentialStore::new();
        store.fail_next("check_folder", 500);

        assert!(ensure_folder_exists(&store, "").await.is_ok());
    }

    #[tokio::test]
    async fn test_existing_folder() {
        let store = MemoryCredentialStore::new().with_folder("/job/teamA");
        assert!(ensure_folder_exists(&store, "/job/teamA").await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_folder_is_validation_error() {
        let store = MemoryCredentialStore::new();
        let err = ensure_folder_exists(&store, "/job/missing")
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err
            .to_string()
            .contains("invalid folder name '/job/missing' specified"));
    }
}
