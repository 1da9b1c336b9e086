//! Convenience types for provider operations.

use serde::{Deserialize, Serialize};

/// Placeholder shown instead of sensitive values in plan output.
pub const SENSITIVE_PLACEHOLDER: &str = "(sensitive value)";

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }

    /// Replace both sides of the change with [`SENSITIVE_PLACEHOLDER`].
    pub fn masked(self) -> Self {
        let mask = |v: Option<serde_json::Value>| {
            v.map(|_| serde_json::Value::String(SENSITIVE_PLACEHOLDER.to_string()))
        };
        Self {
            path: self.path,
            before: mask(self.before),
            after: mask(self.after),
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("deploy-token"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("deploy-token")));

        let removed = AttributeChange::removed("id", json!("/deploy-token"));
        assert_eq!(removed.before, Some(json!("/deploy-token")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("scope", json!("GLOBAL"), json!("SYSTEM"));
        assert_eq!(modified.before, Some(json!("GLOBAL")));
        assert_eq!(modified.after, Some(json!("SYSTEM")));
    }

    #[test]
    fn test_masked_change() {
        let change = AttributeChange::modified("secret", json!("old"), json!("new")).masked();
        assert_eq!(change.path, "secret");
        assert_eq!(change.before, Some(json!(SENSITIVE_PLACEHOLDER)));
        assert_eq!(change.after, Some(json!(SENSITIVE_PLACEHOLDER)));

        let added = AttributeChange::added("secret", json!("new")).masked();
        assert!(added.before.is_none());
    }

    #[test]
    fn test_plan_result() {
        let with_changes = PlanResult::with_changes(
            json!({"id": "/foo", "description": "new"}),
            vec![AttributeChange::modified(
                "description",
                json!("old"),
                json!("new"),
            )],
            false,
        );
        assert_eq!(with_changes.changes.len(), 1);
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("jenkins_credential_string", json!({"id": "/foo"}));
        assert_eq!(imported.resource_type, "jenkins_credential_string");
        assert_eq!(imported.state["id"], "/foo");
    }
}
