// Condition tree engine
// Typed representation of nested condition nodes and the recursive operations over them

//! # Condition Tree Module
//!
//! Conditions form predicate trees. A `boolean` node combines children with an
//! operator, a `not` node negates exactly one child, and the leaf variants compare
//! a document field against a value. A `fragment` node is a **non-owning pointer**
//! to another condition by id; it is never followed as a tree edge.
//!
//! Three kinds of node are internal linkage and never handed to callers:
//!
//! - the Rule root (notes `RULE_ID:<rule id>`), owner of every Rule Condition
//! - the Action root (notes `ACTION_ROOT`), owner of every Action Condition
//! - the Rule fragment (notes `ACTION_RULE_FRAGMENT`), the first child of an Action
//!   root, pointing at the owning Rule's root
//!
//! ## Wire Shape
//!
//! Both the remote store and processing callers use the same JSON layout, with
//! the variant fields nested under `additional`:
//!
//! ```json
//! {"id": 7, "name": "is pdf", "additional": {"type": "string", "field": "CONTENT_TYPE",
//!  "operator": "is", "value": "application/pdf", "order": 100, "parent_condition_id": 3}}
//! ```
//!
//! ## Rust Learning Notes:
//!
//! ### `try_from` / `into` for Serde
//! `#[serde(try_from = "Value", into = "Value")]` lets us keep a closed, typed
//! enum in memory while still parsing a loosely-typed JSON document at the
//! boundary. Anything outside the known variant set is rejected during parsing
//! instead of leaking dynamic shapes inward.
//!
//! ### Box for Recursion
//! `Not` holds `Box<Condition>` because an enum cannot contain itself by value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::remote::value_as_id;
use crate::{ProcessingError, Result};

/// Notes value carried by every Action root condition
pub const ACTION_ROOT: &str = "ACTION_ROOT";

/// Notes prefix of every Rule root condition
pub const RULE_ID_PREFIX: &str = "RULE_ID:";

/// Notes value carried by the Rule fragment inside an Action root
pub const ACTION_RULE_FRAGMENT: &str = "ACTION_RULE_FRAGMENT";

/// Keys of `additional` shared by every variant
const COMMON_KEYS: [&str; 4] = ["type", "order", "notes", "parent_condition_id"];

/// Internal linkage nodes, identified by their notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionMarker {
    /// Root of a Rule's condition tree
    RuleRoot(i64),
    /// Root of an Action's condition tree
    ActionRoot,
    /// Fragment inside an Action root pointing at the Rule root
    RuleFragment,
}

impl ConditionMarker {
    /// The notes value stored on the remote condition
    pub fn notes(&self) -> String {
        match self {
            ConditionMarker::RuleRoot(rule_id) => format!("{}{}", RULE_ID_PREFIX, rule_id),
            ConditionMarker::ActionRoot => ACTION_ROOT.to_string(),
            ConditionMarker::RuleFragment => ACTION_RULE_FRAGMENT.to_string(),
        }
    }

    /// Recognise a marker from a notes value
    pub fn from_notes(notes: &str) -> Option<Self> {
        match notes {
            ACTION_ROOT => Some(ConditionMarker::ActionRoot),
            ACTION_RULE_FRAGMENT => Some(ConditionMarker::RuleFragment),
            other => other
                .strip_prefix(RULE_ID_PREFIX)
                .and_then(|id| id.parse().ok())
                .map(ConditionMarker::RuleRoot),
        }
    }
}

/// Which value space a comparison condition works in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonType {
    Date,
    Number,
    String,
}

impl ComparisonType {
    fn as_str(&self) -> &'static str {
        match self {
            ComparisonType::Date => "date",
            ComparisonType::Number => "number",
            ComparisonType::String => "string",
        }
    }
}

/// A single node of a condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Condition {
    /// Assigned by the remote store, absent until created
    pub id: Option<i64>,
    pub name: Option<String>,
    /// Position among siblings
    pub order: Option<i64>,
    /// Free text; also carries the internal marker tags
    pub notes: Option<String>,
    /// Must be set on every create/update or the remote store treats the node as a fragment
    pub parent_condition_id: Option<i64>,
    pub kind: ConditionKind,
}

/// The closed set of condition variants
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
    /// Combine children with `and` / `or`
    Boolean {
        operator: String,
        children: Vec<Condition>,
    },
    /// Negate a single condition
    Not { condition: Box<Condition> },
    /// Field matches a regular expression
    Regex { field: String, value: String },
    /// Field compared against a date, number or string value
    Comparison {
        comparison: ComparisonType,
        field: String,
        operator: String,
        value: Value,
    },
    /// Field is present
    Exists { field: String },
    /// Non-owning pointer to another condition's id
    Fragment { pointer: i64 },
    /// Opaque lexicon payload
    Lexicon(Map<String, Value>),
    /// Opaque text payload
    Text(Map<String, Value>),
}

impl ConditionKind {
    /// The discriminator stored under `additional.type`
    pub fn type_name(&self) -> &'static str {
        match self {
            ConditionKind::Boolean { .. } => "boolean",
            ConditionKind::Not { .. } => "not",
            ConditionKind::Regex { .. } => "regex",
            ConditionKind::Comparison { comparison, .. } => comparison.as_str(),
            ConditionKind::Exists { .. } => "exists",
            ConditionKind::Fragment { .. } => "fragment",
            ConditionKind::Lexicon(_) => "lexicon",
            ConditionKind::Text(_) => "text",
        }
    }
}

impl Condition {
    /// Create an unsaved condition of the given kind
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            id: None,
            name: None,
            order: None,
            notes: None,
            parent_condition_id: None,
            kind,
        }
    }

    /// Boolean condition over the given children
    pub fn boolean(operator: &str, children: Vec<Condition>) -> Self {
        Self::new(ConditionKind::Boolean {
            operator: operator.to_string(),
            children,
        })
    }

    /// Negation of a single condition
    pub fn not(condition: Condition) -> Self {
        Self::new(ConditionKind::Not {
            condition: Box::new(condition),
        })
    }

    /// Field exists check
    pub fn exists(field: &str) -> Self {
        Self::new(ConditionKind::Exists {
            field: field.to_string(),
        })
    }

    /// Regular expression check
    pub fn regex(field: &str, pattern: &str) -> Self {
        Self::new(ConditionKind::Regex {
            field: field.to_string(),
            value: pattern.to_string(),
        })
    }

    /// String comparison
    pub fn string(field: &str, operator: &str, value: &str) -> Self {
        Self::new(ConditionKind::Comparison {
            comparison: ComparisonType::String,
            field: field.to_string(),
            operator: operator.to_string(),
            value: Value::String(value.to_string()),
        })
    }

    /// Numeric comparison
    pub fn number(field: &str, operator: &str, value: i64) -> Self {
        Self::new(ConditionKind::Comparison {
            comparison: ComparisonType::Number,
            field: field.to_string(),
            operator: operator.to_string(),
            value: Value::from(value),
        })
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Empty `boolean`/`and` root carrying a marker as its name and notes
    pub fn build_root_condition(marker: &ConditionMarker) -> Self {
        let tag = marker.notes();
        Self::boolean("and", Vec::new())
            .with_name(&tag)
            .with_notes(&tag)
    }

    /// Rule fragment pointing at the Rule root condition with `pointer_id`
    pub fn build_fragment(pointer_id: i64) -> Self {
        Self::new(ConditionKind::Fragment { pointer: pointer_id })
            .with_name(ACTION_RULE_FRAGMENT)
            .with_notes(ACTION_RULE_FRAGMENT)
    }

    /// The internal marker this node carries, if any
    pub fn marker(&self) -> Option<ConditionMarker> {
        self.notes.as_deref().and_then(ConditionMarker::from_notes)
    }

    /// Children of a `boolean` root; any other variant is corrupt state for a root
    pub fn root_children(&self) -> Result<&[Condition]> {
        match &self.kind {
            ConditionKind::Boolean { children, .. } => Ok(children),
            other => Err(ProcessingError::InvalidStructure(format!(
                "root condition {:?} is of type '{}', expected 'boolean'",
                self.id,
                other.type_name()
            ))),
        }
    }

    /// Depth-first search for the first visible node with `id`
    ///
    /// Descends through `boolean` children and the negated child of `not`.
    /// Marker nodes are never returned, and the Rule fragment is not descended
    /// into. Absence is not an error; the caller decides.
    pub fn find_by_id(&self, id: i64) -> Option<&Condition> {
        if self.id == Some(id) && self.marker().is_none() {
            return Some(self);
        }
        match &self.kind {
            ConditionKind::Boolean { children, .. } => children
                .iter()
                .filter(|child| child.marker() != Some(ConditionMarker::RuleFragment))
                .find_map(|child| child.find_by_id(id)),
            ConditionKind::Not { condition } => condition.find_by_id(id),
            _ => None,
        }
    }

    /// Direct children of this root, minus any child tagged with `exclude`
    pub fn extract_visible_children(&self, exclude: Option<&ConditionMarker>) -> Vec<Condition> {
        match &self.kind {
            ConditionKind::Boolean { children, .. } => children
                .iter()
                .filter(|child| match exclude {
                    Some(marker) => child.marker().as_ref() != Some(marker),
                    None => true,
                })
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Parse a condition from its JSON shape
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            ProcessingError::InvalidStructure("condition is not a JSON object".to_string())
        })?;
        let id = object.get("id").and_then(value_as_id);
        let additional = object
            .get("additional")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ProcessingError::InvalidStructure(format!(
                    "condition {:?} has no 'additional' property",
                    id
                ))
            })?;

        let type_name = additional
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProcessingError::InvalidStructure(format!(
                    "condition {:?} has no 'additional.type' property",
                    id
                ))
            })?;

        let kind = match type_name {
            "boolean" => ConditionKind::Boolean {
                operator: optional_str(additional, "operator").unwrap_or_else(|| "and".to_string()),
                children: parse_children(id, additional.get("children"))?,
            },
            "not" => {
                let negated = additional
                    .get("condition")
                    .filter(|negated| !negated.is_null())
                    .ok_or_else(|| {
                        ProcessingError::InvalidStructure(format!(
                            "not condition {:?} has no 'condition' property",
                            id
                        ))
                    })?;
                ConditionKind::Not {
                    condition: Box::new(Condition::from_value(negated)?),
                }
            }
            "regex" => ConditionKind::Regex {
                field: required_str(id, additional, "field")?,
                value: required_str(id, additional, "value")?,
            },
            "date" | "number" | "string" => ConditionKind::Comparison {
                comparison: match type_name {
                    "date" => ComparisonType::Date,
                    "number" => ComparisonType::Number,
                    _ => ComparisonType::String,
                },
                field: required_str(id, additional, "field")?,
                operator: required_str(id, additional, "operator")?,
                value: additional.get("value").cloned().unwrap_or(Value::Null),
            },
            "exists" => ConditionKind::Exists {
                field: required_str(id, additional, "field")?,
            },
            "fragment" => ConditionKind::Fragment {
                pointer: additional.get("value").and_then(value_as_id).ok_or_else(|| {
                    ProcessingError::InvalidStructure(format!(
                        "fragment condition {:?} has no pointer 'value'",
                        id
                    ))
                })?,
            },
            "lexicon" => ConditionKind::Lexicon(passthrough(additional)),
            "text" => ConditionKind::Text(passthrough(additional)),
            other => return Err(ProcessingError::UnrecognizedVariant(other.to_string())),
        };

        Ok(Self {
            id,
            name: object.get("name").and_then(Value::as_str).map(str::to_string),
            order: additional.get("order").and_then(Value::as_i64),
            notes: optional_str(additional, "notes")
                .or_else(|| object.get("notes").and_then(Value::as_str).map(str::to_string)),
            parent_condition_id: additional.get("parent_condition_id").and_then(value_as_id),
            kind,
        })
    }

    /// Render the JSON shape, without the `type: "condition"` tag (see [`tag_types`])
    pub fn to_value(&self) -> Value {
        let mut additional = Map::new();
        additional.insert("type".to_string(), Value::from(self.kind.type_name()));
        if let Some(order) = self.order {
            additional.insert("order".to_string(), Value::from(order));
        }
        if let Some(notes) = &self.notes {
            additional.insert("notes".to_string(), Value::from(notes.clone()));
        }
        if let Some(parent) = self.parent_condition_id {
            additional.insert("parent_condition_id".to_string(), Value::from(parent));
        }

        match &self.kind {
            ConditionKind::Boolean { operator, children } => {
                additional.insert("operator".to_string(), Value::from(operator.clone()));
                additional.insert(
                    "children".to_string(),
                    Value::Array(children.iter().map(Condition::to_value).collect()),
                );
            }
            ConditionKind::Not { condition } => {
                additional.insert("condition".to_string(), condition.to_value());
            }
            ConditionKind::Regex { field, value } => {
                additional.insert("field".to_string(), Value::from(field.clone()));
                additional.insert("value".to_string(), Value::from(value.clone()));
            }
            ConditionKind::Comparison {
                field,
                operator,
                value,
                ..
            } => {
                additional.insert("field".to_string(), Value::from(field.clone()));
                additional.insert("operator".to_string(), Value::from(operator.clone()));
                additional.insert("value".to_string(), value.clone());
            }
            ConditionKind::Exists { field } => {
                additional.insert("field".to_string(), Value::from(field.clone()));
            }
            ConditionKind::Fragment { pointer } => {
                additional.insert("value".to_string(), Value::from(*pointer));
            }
            ConditionKind::Lexicon(extra) | ConditionKind::Text(extra) => {
                for (key, value) in extra {
                    additional.insert(key.clone(), value.clone());
                }
            }
        }

        let mut object = Map::new();
        if let Some(id) = self.id {
            object.insert("id".to_string(), Value::from(id));
        }
        if let Some(name) = &self.name {
            object.insert("name".to_string(), Value::from(name.clone()));
        }
        object.insert("additional".to_string(), Value::Object(additional));
        Value::Object(object)
    }
}

impl TryFrom<Value> for Condition {
    type Error = ProcessingError;

    fn try_from(value: Value) -> Result<Self> {
        Condition::from_value(&value)
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        condition.to_value()
    }
}

/// Ensure every node of a condition payload carries `type: "condition"`
///
/// Walks `boolean` children and the negated child of `not`. Fails when a node
/// lacks `additional`, a `boolean` lacks `children` or a `not` lacks `condition`.
/// Applying it twice gives the same payload as applying it once.
pub fn tag_types(node: &mut Value) -> Result<()> {
    let object = node
        .as_object_mut()
        .ok_or_else(|| ProcessingError::InvalidStructure("Invalid Condition encountered.".to_string()))?;

    object
        .entry("type")
        .or_insert_with(|| Value::from("condition"));

    let additional = object
        .get_mut("additional")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            ProcessingError::InvalidStructure(
                "Condition and any children it has must have 'additional' property defined."
                    .to_string(),
            )
        })?;

    let kind = additional
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);
    match kind.as_deref() {
        Some("boolean") => {
            let children = additional
                .get_mut("children")
                .and_then(Value::as_array_mut)
                .ok_or_else(|| {
                    ProcessingError::InvalidStructure(
                        "boolean condition must have 'additional.children' defined.".to_string(),
                    )
                })?;
            for child in children.iter_mut() {
                tag_types(child)?;
            }
        }
        Some("not") => {
            let negated = additional
                .get_mut("condition")
                .filter(|negated| !negated.is_null())
                .ok_or_else(|| {
                    ProcessingError::InvalidStructure(
                        "not condition must have 'additional.condition' defined.".to_string(),
                    )
                })?;
            tag_types(negated)?;
        }
        _ => {}
    }
    Ok(())
}

fn parse_children(parent: Option<i64>, children: Option<&Value>) -> Result<Vec<Condition>> {
    let Some(Value::Array(children)) = children else {
        return Ok(Vec::new());
    };
    let mut parsed = Vec::with_capacity(children.len());
    for child in children {
        let malformed = child
            .get("additional")
            .map(|additional| !additional.is_object())
            .unwrap_or(true);
        if malformed {
            warn!(parent = ?parent, "Child condition is not valid. It will be ignored.");
            continue;
        }
        parsed.push(Condition::from_value(child)?);
    }
    Ok(parsed)
}

fn optional_str(additional: &Map<String, Value>, key: &str) -> Option<String> {
    additional.get(key).and_then(Value::as_str).map(str::to_string)
}

fn required_str(id: Option<i64>, additional: &Map<String, Value>, key: &str) -> Result<String> {
    optional_str(additional, key).ok_or_else(|| {
        ProcessingError::InvalidStructure(format!(
            "condition {:?} has no 'additional.{}' property",
            id, key
        ))
    })
}

fn passthrough(additional: &Map<String, Value>) -> Map<String, Value> {
    additional
        .iter()
        .filter(|(key, _)| !COMMON_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
