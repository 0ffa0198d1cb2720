// Remote classification store object shapes
// Typed views of the JSON objects the remote store returns and accepts

//! # Remote Object Models
//!
//! The remote classification store speaks loosely-typed JSON. These structs are
//! the typed view of the objects this service reads and writes:
//!
//! - [`RemoteWorkflow`]: ordered list of [`SequenceEntry`] values, one per Rule
//! - [`CollectionSequence`]: backs a Rule; ordered list of [`CollectionEntry`] values
//! - [`Collection`]: backs an Action; holds its root condition and Policy id
//! - [`Policy`]: the Action's settings and type
//! - [`PolicyType`]: backs an ActionType
//!
//! Every object carries its type-specific fields under `additional`, which is
//! why each struct has a matching `*Additional` struct.
//!
//! ## Rust Learning Notes:
//!
//! ### `#[serde(default)]`
//! The remote store omits empty lists and optional properties. `#[serde(default)]`
//! fills them with `Default::default()` instead of failing deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read a remote id that may arrive as a JSON number or a numeric string
pub(crate) fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// How a Collection Sequence update treats the entries it is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateBehaviour {
    /// Entries sent are appended to the existing entries
    Add,
    /// Entries sent replace the existing entries
    Replace,
}

/// Link between a Workflow and one of its Rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub collection_sequence_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_workflow_id: Option<i64>,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAdditional {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sequence_entries: Vec<SequenceEntry>,
}

/// Remote Workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteWorkflow {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub additional: WorkflowAdditional,
}

/// Link between a Collection Sequence and one of its Collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    #[serde(default)]
    pub collection_ids: Vec<i64>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub stop_on_match: bool,
}

impl CollectionEntry {
    /// Entry for a single collection
    pub fn for_collection(collection_id: i64, order: Option<i64>) -> Self {
        Self {
            collection_ids: vec![collection_id],
            order,
            stop_on_match: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSequenceAdditional {
    #[serde(default)]
    pub evaluation_enabled: bool,
    #[serde(default)]
    pub collection_sequence_entries: Vec<CollectionEntry>,
    /// Only populated when requested with children; holds the Rule root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition_fragments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_count: Option<i64>,
}

/// Remote Collection Sequence, the backing object of a Rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSequence {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// A sequence without `additional` cannot be mapped to a Rule
    #[serde(default)]
    pub additional: Option<CollectionSequenceAdditional>,
}

impl CollectionSequence {
    /// Collection entries, empty when `additional` is absent
    pub fn entries(&self) -> &[CollectionEntry] {
        self.additional
            .as_ref()
            .map(|additional| additional.collection_sequence_entries.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionAdditional {
    #[serde(default)]
    pub policy_ids: Vec<i64>,
    /// Root condition; a full tree when requested with the condition, otherwise absent or an id
    #[serde(default)]
    pub condition: Option<Value>,
}

/// Remote Collection, half of the backing pair of an Action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub additional: CollectionAdditional,
}

impl Collection {
    /// The single Policy id this Collection should carry
    pub fn policy_id(&self) -> Option<i64> {
        self.additional.policy_ids.first().copied()
    }

    /// Id of the root condition, whether the condition arrived as a tree or a bare id
    pub fn condition_id(&self) -> Option<i64> {
        match self.additional.condition.as_ref()? {
            Value::Object(condition) => condition.get("id").and_then(value_as_id),
            other => value_as_id(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyAdditional {
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub policy_type_id: i64,
    #[serde(default)]
    pub priority: i64,
}

/// Remote Policy, the other half of the backing pair of an Action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub additional: PolicyAdditional,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTypeAdditional {
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub definition: Value,
    #[serde(default)]
    pub conflict_resolution_mode: Option<String>,
}

/// Remote Policy Type, the backing object of an ActionType
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyType {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub additional: PolicyTypeAdditional,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        assert_eq!(value_as_id(&json!(42)), Some(42));
        assert_eq!(value_as_id(&json!("42")), Some(42));
        assert_eq!(value_as_id(&json!("x")), None);
        assert_eq!(value_as_id(&json!(null)), None);
    }

    #[test]
    fn test_sparse_remote_objects_deserialize() {
        let workflow: RemoteWorkflow = serde_json::from_value(json!({"id": 3, "name": "wf"})).unwrap();
        assert!(workflow.additional.sequence_entries.is_empty());

        let sequence: CollectionSequence =
            serde_json::from_value(json!({"id": 9, "name": "rule"})).unwrap();
        assert!(sequence.additional.is_none());
        assert!(sequence.entries().is_empty());

        let collection: Collection = serde_json::from_value(json!({
            "id": 5,
            "name": "action",
            "additional": {"policy_ids": [12]}
        }))
        .unwrap();
        assert_eq!(collection.policy_id(), Some(12));
        assert_eq!(collection.condition_id(), None);

        let with_tree: Collection = serde_json::from_value(json!({
            "id": 6,
            "additional": {"condition": {"id": 40, "additional": {"type": "boolean"}}}
        }))
        .unwrap();
        assert_eq!(with_tree.condition_id(), Some(40));
    }

    #[test]
    fn test_update_behaviour_wire_names() {
        assert_eq!(serde_json::to_value(UpdateBehaviour::Add).unwrap(), json!("ADD"));
        assert_eq!(serde_json::to_value(UpdateBehaviour::Replace).unwrap(), json!("REPLACE"));
    }
}
