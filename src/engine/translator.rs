// Domain model translator
// Pure mapping between remote objects and processing-domain shapes

//! # Domain Model Translator
//!
//! Stateless, side-effect-free mapping functions:
//!
//! | Direction         | Function                                              |
//! |-------------------|-------------------------------------------------------|
//! | remote -> domain  | `workflow_from_remote`, `rule_from_sequence`, `action_from_remote`, `action_type_from_policy_type`, `condition_from_remote` |
//! | domain -> remote  | `workflow_payload`, `sequence_create_payload`, `sequence_update_payload`, `policy_payload`, `collection_payload`, `policy_type_payload`, `condition_payload` |
//!
//! One Action is composed from three remote reads (Collection, Policy, Policy
//! Type) and split back into two writes (Policy and Collection); Policy Types
//! are never written from the Action side.
//!
//! Condition payloads always carry an explicit `parent_condition_id`. The
//! remote store silently turns a condition without one into a fragment, so the
//! payload builders refuse to produce one.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::models::condition::tag_types;
use crate::models::{
    Action, ActionType, Collection, CollectionEntry, CollectionSequence, Condition, Policy,
    PolicyType, RemoteWorkflow, Rule, SequenceEntry, UpdateBehaviour, Workflow,
};
use crate::{ProcessingError, Result};

// ---- workflows ----

pub fn workflow_from_remote(remote: &RemoteWorkflow) -> Workflow {
    Workflow {
        id: Some(remote.id),
        name: remote.name.clone(),
        description: remote.description.clone(),
        notes: remote.additional.notes.clone(),
    }
}

/// Create/update payload; `entries` are the sequence entries to persist
pub fn workflow_payload(workflow: &Workflow, entries: &[SequenceEntry]) -> Value {
    let mut payload = json!({
        "name": workflow.name,
        "description": workflow.description,
        "additional": {
            "notes": workflow.notes,
            "sequence_entries": entries,
        }
    });
    if let Some(id) = workflow.id {
        payload["id"] = Value::from(id);
    }
    payload
}

/// Update payload for a remote Workflow whose entries were changed in place
pub fn remote_workflow_payload(workflow: &RemoteWorkflow) -> Value {
    workflow_payload(
        &workflow_from_remote(workflow),
        &workflow.additional.sequence_entries,
    )
}

/// Rule id -> priority for every entry on the Workflow
///
/// An entry without an order counts as priority 0.
pub fn rule_priorities_from_workflow(workflow: &RemoteWorkflow) -> HashMap<i64, i64> {
    workflow
        .additional
        .sequence_entries
        .iter()
        .map(|entry| (entry.collection_sequence_id, entry.order.unwrap_or_default()))
        .collect()
}

// ---- rules ----

pub fn rule_from_sequence(sequence: &CollectionSequence, priority: Option<i64>) -> Result<Rule> {
    let additional = sequence.additional.as_ref().ok_or_else(|| {
        ProcessingError::InvalidStructure(format!(
            "Collection Sequence {} has no 'additional' property",
            sequence.id
        ))
    })?;
    Ok(Rule {
        id: Some(sequence.id),
        name: sequence.name.clone(),
        description: sequence.description.clone(),
        enabled: additional.evaluation_enabled,
        priority,
    })
}

pub fn sequence_create_payload(rule: &Rule) -> Value {
    json!({
        "name": rule.name,
        "description": rule.description,
        "additional": {
            "evaluation_enabled": rule.enabled,
        }
    })
}

/// Update payload carrying the Rule's own fields and, optionally, collection entries
///
/// With [`UpdateBehaviour::Add`] the entries sent are appended to the existing
/// ones; with [`UpdateBehaviour::Replace`] they replace them. Without entries
/// the existing ones are left alone.
pub fn sequence_update_payload(
    sequence_id: i64,
    rule: &Rule,
    entries: Option<&[CollectionEntry]>,
    behaviour: UpdateBehaviour,
) -> Value {
    let mut payload = json!({
        "id": sequence_id,
        "name": rule.name,
        "description": rule.description,
        "update_behaviour": behaviour,
        "additional": {
            "evaluation_enabled": rule.enabled,
        }
    });
    if let Some(entries) = entries {
        payload["additional"]["collection_sequence_entries"] = json!(entries);
    }
    payload
}

// ---- actions ----

/// Compose an Action from its Collection, Policy and (when known) Policy Type
pub fn action_from_remote(
    collection: &Collection,
    policy: &Policy,
    policy_type: Option<&PolicyType>,
    order: Option<i64>,
) -> Action {
    Action {
        id: Some(collection.id),
        name: collection.name.clone(),
        description: collection.description.clone(),
        order,
        settings: policy.additional.details.clone(),
        type_id: policy.additional.policy_type_id,
        type_internal_name: policy_type.and_then(|policy_type| policy_type.additional.short_name.clone()),
    }
}

/// Create/update payload for the Action's Policy
pub fn policy_payload(action: &Action, policy_id: Option<i64>) -> Value {
    let mut payload = json!({
        "name": action.name,
        "description": "",
        "additional": {
            "details": action.settings,
            "policy_type_id": action.type_id,
            "priority": 0,
        }
    });
    if let Some(id) = policy_id {
        payload["id"] = Value::from(id);
    }
    payload
}

/// Create/update payload for the Action's Collection
///
/// A `None` condition is left out, which keeps the stored root condition on update.
pub fn collection_payload(
    action: &Action,
    collection_id: Option<i64>,
    condition: Option<Value>,
    policy_ids: &[i64],
) -> Value {
    let mut payload = json!({
        "name": action.name,
        "description": action.description,
        "additional": {
            "policy_ids": policy_ids,
        }
    });
    if let Some(condition) = condition {
        payload["additional"]["condition"] = condition;
    }
    if let Some(id) = collection_id {
        payload["id"] = Value::from(id);
    }
    payload
}

/// Update payload that only changes which Policies a Collection references
pub fn collection_policies_payload(collection: &Collection, policy_ids: &[i64]) -> Value {
    json!({
        "id": collection.id,
        "name": collection.name,
        "description": collection.description,
        "additional": {
            "policy_ids": policy_ids,
        }
    })
}

// ---- action types ----

pub fn action_type_from_policy_type(policy_type: &PolicyType) -> ActionType {
    ActionType {
        id: Some(policy_type.id),
        name: policy_type.name.clone(),
        description: policy_type.description.clone(),
        internal_name: policy_type.additional.short_name.clone().unwrap_or_default(),
        definition: policy_type.additional.definition.clone(),
    }
}

pub fn policy_type_payload(action_type: &ActionType) -> Value {
    let mut payload = json!({
        "name": action_type.name,
        "description": action_type.description,
        "additional": {
            "definition": action_type.definition,
            "short_name": action_type.internal_name,
        }
    });
    if let Some(id) = action_type.id {
        payload["id"] = Value::from(id);
    }
    payload
}

// ---- conditions ----

/// Map a remote condition into the closed variant set
pub fn condition_from_remote(remote: &Value) -> Result<Condition> {
    Condition::from_value(remote)
}

/// Tagged payload for creating or updating `condition` under `parent_condition_id`
pub fn condition_payload(condition: &Condition, parent_condition_id: i64) -> Result<Value> {
    let mut condition = condition.clone();
    condition.parent_condition_id = Some(parent_condition_id);
    condition_update_payload(&condition)
}

/// Tagged payload for a condition that must already carry its parent
pub fn condition_update_payload(condition: &Condition) -> Result<Value> {
    if condition.parent_condition_id.is_none() {
        return Err(ProcessingError::InvalidStructure(format!(
            "condition {:?} has no parent_condition_id; refusing to send it",
            condition.id
        )));
    }
    let mut payload = condition.to_value();
    tag_types(&mut payload)?;
    Ok(payload)
}

/// Tagged payload for a root condition, which has no parent
pub fn root_condition_payload(root: &Condition) -> Result<Value> {
    let mut payload = root.to_value();
    if let Some(notes) = &root.notes {
        payload["notes"] = Value::from(notes.clone());
    }
    tag_types(&mut payload)?;
    Ok(payload)
}
