//! Convenience types over the raw protobuf messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How one attribute moves between prior and planned state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute that changed.
    pub path: String,
    /// The value before the change (None if the attribute is being added).
    pub before: Option<Value>,
    /// The value after the change (None if the attribute is being removed).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Change record for `path`.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// `path` appears with `after`.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// `path` disappears.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// `path` goes from `before` to `after`.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

fn decode_optional(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

fn encode_optional(value: Option<Value>) -> Vec<u8> {
    value
        .map(|v| serde_json::to_vec(&v).unwrap_or_default())
        .unwrap_or_default()
}

impl From<crate::proto::AttributeChange> for AttributeChange {
    fn from(proto: crate::proto::AttributeChange) -> Self {
        Self {
            before: decode_optional(&proto.before),
            after: decode_optional(&proto.after),
            path: proto.path,
        }
    }
}

impl From<AttributeChange> for crate::proto::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_optional(change.before),
            after: encode_optional(change.after),
        }
    }
}

/// Outcome of planning one resource.
///
/// Every change this provider plans is applied in place, so there is no
/// replacement flag here; the wire response always reports `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation (null for a destroy).
    pub planned_state: Value,
    /// Per-attribute differences.
    pub changes: Vec<AttributeChange>,
}

impl PlanResult {
    /// Plan that keeps `planned_state` as is.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
        }
    }

    /// Plan that moves to `planned_state` via `changes`.
    pub fn with_changes(planned_state: Value, changes: Vec<AttributeChange>) -> Self {
        Self {
            planned_state,
            changes,
        }
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Imported object of `resource_type` with its refreshed `state`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Type names and capabilities advertised to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider plans destroy operations.
    pub plan_destroy: bool,
}

/// Handshake protocol version understood by the host.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix printed on stdout.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("example.com"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("example.com")));

        let removed = AttributeChange::removed("note", json!("old"));
        assert_eq!(removed.before, Some(json!("old")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("project_id", json!(1), json!(2));
        assert_eq!(modified.before, Some(json!(1)));
        assert_eq!(modified.after, Some(json!(2)));
    }

    #[test]
    fn test_attribute_change_proto_conversion() {
        let change = AttributeChange::modified("note", json!("old"), json!("new"));

        let proto: crate::proto::AttributeChange = change.clone().into();
        assert_eq!(proto.path, "note");
        assert_eq!(proto.before, br#""old""#.to_vec());

        let back: AttributeChange = proto.into();
        assert_eq!(back, change);

        let added: crate::proto::AttributeChange =
            AttributeChange::added("id", json!(7)).into();
        assert!(added.before.is_empty());
    }

    #[test]
    fn test_plan_result() {
        let unchanged = PlanResult::no_change(json!({"id": 5}));
        assert!(!unchanged.has_changes());

        let changed = PlanResult::with_changes(
            json!({"id": 5, "note": "new"}),
            vec![AttributeChange::modified("note", json!("old"), json!("new"))],
        );
        assert!(changed.has_changes());
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("ghostwriter_oplog", json!({"id": 12}));
        assert_eq!(imported.resource_type, "ghostwriter_oplog");
        assert_eq!(imported.state["id"], 12);
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(HANDSHAKE_PREFIX, "HEMMER_PROVIDER");
    }
}
