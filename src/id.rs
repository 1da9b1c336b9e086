//! Canonical credential identifiers.

use crate::folder::normalize;

/// Build the canonical identifier of a credential: `<canonical folder>/<name>`.
///
/// The folder is normalized first, so plain and canonical folder paths give
/// the same identifier.
///
/// ```
/// use jenkins_credential_provider::id::credential_id;
///
/// assert_eq!(credential_id("", "foo"), "/foo");
/// assert_eq!(credential_id("teamA", "foo"), "/job/teamA/foo");
/// ```
pub fn credential_id(folder: &str, name: &str) -> String {
    format!("{}/{}", normalize(folder), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_identifier() {
        assert_eq!(credential_id("", "foo"), "/foo");
        assert_eq!(credential_id("/", "foo"), "/foo");
    }

    #[test]
    fn test_nested_identifier() {
        assert_eq!(
            credential_id("tf-acc/subfolder", "test-username"),
            "/job/tf-acc/job/subfolder/test-username"
        );
    }

    #[test]
    fn test_plain_and_canonical_folders_agree() {
        assert_eq!(
            credential_id("teamA/teamB", "cred"),
            credential_id("/job/teamA/job/teamB", "cred")
        );
    }
}
