// In-memory classification store
// A process-local implementation of the remote client contract for tests and offline use

//! # In-Memory Classification Store
//!
//! [`InMemoryClassificationStore`] behaves like the remote classification
//! service closely enough for the engine's sagas to run against it:
//!
//! - ids are assigned on create from one counter shared by all kinds
//! - conditions are stored flat with a parent -> children index; a condition
//!   created with `parent_condition_id` is attached under that parent, and
//!   nested children in a payload are created as their own records
//! - collections hold their root condition by id and render the tree when
//!   asked with `include_condition` / `include_children`
//! - collection sequences rendered with `include_children` carry their Rule
//!   root in `condition_fragments`
//! - collection sequence updates honour `update_behaviour` (`ADD` appends entries)
//! - deleting a missing object answers HTTP 200 with an embedded error
//! - looking up several ids where one is missing fails with status 400
//!
//! Every call is recorded so tests can assert which remote operations a saga
//! issued. [`InMemoryClassificationStore::fail_next`] injects a one-shot
//! status-500 failure; [`InMemoryClassificationStore::fail_next_delete_embedded`]
//! makes one delete answer HTTP 200 with an embedded error.
//!
//! ## Rust Learning Notes:
//!
//! ### Interior Mutability
//! The client trait takes `&self`, so all state lives behind a `Mutex`. A
//! poisoned lock is reported as a remote failure rather than a panic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde_json::{json, Map, Value};
use tracing::debug;

use super::client::{ClassificationClient, IdSelector, ItemKind, ItemPage, ItemRequest, PostOp};
use crate::models::condition::RULE_ID_PREFIX;
use crate::models::remote::value_as_id;
use crate::{ProcessingError, Result};

/// Operation recorded by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Retrieve,
    Create,
    Update,
    Delete,
}

impl From<PostOp> for StoreOp {
    fn from(op: PostOp) -> Self {
        match op {
            PostOp::Create => StoreOp::Create,
            PostOp::Update => StoreOp::Update,
            PostOp::Delete => StoreOp::Delete,
        }
    }
}

/// One call made against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: ItemKind,
    pub op: StoreOp,
}

#[derive(Default)]
struct StoreState {
    next_id: i64,
    objects: HashMap<(String, ItemKind), BTreeMap<i64, Value>>,
    /// condition id -> child condition ids (a `not` has its negated condition as sole child)
    children: HashMap<i64, Vec<i64>>,
    calls: Vec<RecordedCall>,
    failures: Vec<RecordedCall>,
    /// kinds whose next delete answers 200 with an embedded error
    embedded_delete_failures: Vec<ItemKind>,
}

/// In-process stand-in for the remote classification service
#[derive(Default)]
pub struct InMemoryClassificationStore {
    state: Mutex<StoreState>,
}

impl InMemoryClassificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| ProcessingError::RemoteFailure {
            status: 500,
            message: "in-memory store lock poisoned".to_string(),
        })
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().map(|state| state.calls.clone()).unwrap_or_default()
    }

    /// Number of recorded calls of `op` against `kind`
    pub fn count(&self, kind: ItemKind, op: StoreOp) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.kind == kind && call.op == op)
            .count()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.lock() {
            state.calls.clear();
        }
    }

    /// Make the next `op` against `kind` fail with status 500
    pub fn fail_next(&self, kind: ItemKind, op: StoreOp) {
        if let Ok(mut state) = self.lock() {
            state.failures.push(RecordedCall { kind, op });
        }
    }

    /// Make the next delete of `kind` answer HTTP 200 with an embedded error, deleting nothing
    pub fn fail_next_delete_embedded(&self, kind: ItemKind) {
        if let Ok(mut state) = self.lock() {
            state.embedded_delete_failures.push(kind);
        }
    }

    /// Stored object rendered with full detail
    pub fn object(&self, project_id: &str, kind: ItemKind, id: i64) -> Option<Value> {
        let state = self.lock().ok()?;
        let everything = json!({"include_children": true, "include_condition": true});
        state.render(project_id, kind, id, &everything)
    }

    /// Number of stored objects of `kind`
    pub fn len(&self, project_id: &str, kind: ItemKind) -> usize {
        self.lock()
            .ok()
            .and_then(|state| {
                state
                    .objects
                    .get(&(project_id.to_string(), kind))
                    .map(BTreeMap::len)
            })
            .unwrap_or(0)
    }

    fn begin(&self, kind: ItemKind, op: StoreOp) -> Result<MutexGuard<'_, StoreState>> {
        let mut state = self.lock()?;
        state.calls.push(RecordedCall { kind, op });
        if let Some(index) = state
            .failures
            .iter()
            .position(|failure| failure.kind == kind && failure.op == op)
        {
            state.failures.remove(index);
            return Err(ProcessingError::RemoteFailure {
                status: 500,
                message: format!("injected failure on {:?} {}", op, kind.type_name()),
            });
        }
        Ok(state)
    }
}

fn bad_request(message: String) -> ProcessingError {
    ProcessingError::RemoteFailure {
        status: 400,
        message,
    }
}

fn delete_result(error: Option<String>) -> Value {
    json!({"result": [{"error_message": error}]})
}

fn flag(options: &Value, name: &str) -> bool {
    options.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn into_object(value: Value, kind: ItemKind) -> Result<Map<String, Value>> {
    match value {
        Value::Object(mut map) => {
            map.remove("project_id");
            map.remove("update_behaviour");
            map.insert("type".to_string(), Value::from(kind.type_name()));
            Ok(map)
        }
        _ => Err(bad_request(format!("{} payload must be an object", kind.type_name()))),
    }
}

fn take_additional(record: &mut Map<String, Value>) -> Map<String, Value> {
    match record.remove("additional") {
        Some(Value::Object(additional)) => additional,
        _ => Map::new(),
    }
}

impl StoreState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn table(&mut self, project_id: &str, kind: ItemKind) -> &mut BTreeMap<i64, Value> {
        self.objects
            .entry((project_id.to_string(), kind))
            .or_default()
    }

    fn lookup(&self, project_id: &str, kind: ItemKind, id: i64) -> Option<&Value> {
        self.objects
            .get(&(project_id.to_string(), kind))
            .and_then(|table| table.get(&id))
    }

    fn ids(&self, project_id: &str, kind: ItemKind) -> Vec<i64> {
        self.objects
            .get(&(project_id.to_string(), kind))
            .map(|table| table.keys().copied().collect())
            .unwrap_or_default()
    }

    // ---- conditions ----

    fn store_condition(
        &mut self,
        project_id: &str,
        node: &Value,
        parent: Option<i64>,
        fixed_id: Option<i64>,
    ) -> Result<i64> {
        let mut record = into_object(node.clone(), ItemKind::Condition)?;
        let mut additional = match record.remove("additional") {
            Some(Value::Object(additional)) => additional,
            _ => return Err(bad_request("condition has no 'additional' property".to_string())),
        };
        let id = match fixed_id {
            Some(id) => id,
            None => self.allocate_id(),
        };
        if let Some(notes) = record.remove("notes") {
            additional.entry("notes").or_insert(notes);
        }
        let children = additional.remove("children");
        let negated = additional.remove("condition");
        if let Some(parent) = parent {
            additional.insert("parent_condition_id".to_string(), Value::from(parent));
        }
        record.insert("id".to_string(), Value::from(id));
        record.insert("additional".to_string(), Value::Object(additional));
        self.table(project_id, ItemKind::Condition)
            .insert(id, Value::Object(record));

        let mut child_ids = Vec::new();
        if let Some(Value::Array(children)) = children {
            for child in &children {
                child_ids.push(self.store_condition(project_id, child, Some(id), None)?);
            }
        }
        if let Some(negated) = negated.filter(Value::is_object) {
            child_ids.push(self.store_condition(project_id, &negated, Some(id), None)?);
        }
        self.children.insert(id, child_ids);
        Ok(id)
    }

    /// Store a top-level condition and attach it under its `parent_condition_id`
    fn create_condition(&mut self, project_id: &str, node: &Value) -> Result<i64> {
        let id = self.store_condition(project_id, node, None, None)?;
        self.attach_to_parent(project_id, id);
        Ok(id)
    }

    fn attach_to_parent(&mut self, project_id: &str, id: i64) {
        let parent = self
            .lookup(project_id, ItemKind::Condition, id)
            .and_then(|record| record.pointer("/additional/parent_condition_id"))
            .and_then(value_as_id);
        if let Some(parent) = parent {
            if self.lookup(project_id, ItemKind::Condition, parent).is_some() {
                self.children.entry(parent).or_default().push(id);
            }
        }
    }

    fn detach(&mut self, id: i64) {
        for siblings in self.children.values_mut() {
            siblings.retain(|child| *child != id);
        }
    }

    fn remove_condition(&mut self, project_id: &str, id: i64) -> bool {
        if self
            .table(project_id, ItemKind::Condition)
            .remove(&id)
            .is_none()
        {
            return false;
        }
        for child in self.children.remove(&id).unwrap_or_default() {
            self.remove_condition(project_id, child);
        }
        self.detach(id);
        true
    }

    fn update_condition(&mut self, project_id: &str, payload: &Value) -> Result<i64> {
        let id = payload
            .get("id")
            .and_then(value_as_id)
            .ok_or_else(|| bad_request("condition update requires an id".to_string()))?;
        if self.lookup(project_id, ItemKind::Condition, id).is_none() {
            return Err(bad_request(format!("Could not find condition with id {}", id)));
        }
        for child in self.children.remove(&id).unwrap_or_default() {
            self.remove_condition(project_id, child);
        }
        self.detach(id);
        self.store_condition(project_id, payload, None, Some(id))?;
        self.attach_to_parent(project_id, id);
        Ok(id)
    }

    fn render_condition(&self, project_id: &str, id: i64, include_children: bool) -> Option<Value> {
        let mut record = self.lookup(project_id, ItemKind::Condition, id)?.clone();
        let child_ids = self.children.get(&id).cloned().unwrap_or_default();
        let kind = record
            .pointer("/additional/type")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(additional) = record.get_mut("additional").and_then(Value::as_object_mut) {
            match kind.as_deref() {
                Some("boolean") if include_children => {
                    let children = child_ids
                        .iter()
                        .filter_map(|child| self.render_condition(project_id, *child, true))
                        .collect();
                    additional.insert("children".to_string(), Value::Array(children));
                }
                Some("not") => {
                    if let Some(negated) = child_ids
                        .first()
                        .and_then(|child| self.render_condition(project_id, *child, true))
                    {
                        additional.insert("condition".to_string(), negated);
                    }
                }
                _ => {}
            }
        }
        Some(record)
    }

    // ---- rendering and lookup ----

    fn render(&self, project_id: &str, kind: ItemKind, id: i64, options: &Value) -> Option<Value> {
        if kind == ItemKind::Condition {
            return self.render_condition(project_id, id, flag(options, "include_children"));
        }
        let mut record = self.lookup(project_id, kind, id)?.clone();
        match kind {
            ItemKind::Collection => {
                let condition_id = record
                    .pointer("/additional/condition")
                    .and_then(value_as_id);
                if let Some(additional) = record.get_mut("additional").and_then(Value::as_object_mut) {
                    additional.remove("condition");
                    if let Some(condition_id) = condition_id {
                        if flag(options, "include_condition") || flag(options, "include_children") {
                            if let Some(condition) = self.render_condition(
                                project_id,
                                condition_id,
                                flag(options, "include_children"),
                            ) {
                                additional.insert("condition".to_string(), condition);
                            }
                        } else {
                            additional.insert("condition".to_string(), Value::from(condition_id));
                        }
                    }
                }
            }
            ItemKind::CollectionSequence if flag(options, "include_children") => {
                let notes = format!("{}{}", RULE_ID_PREFIX, id);
                let fragments: Vec<Value> = self
                    .ids(project_id, ItemKind::Condition)
                    .into_iter()
                    .filter(|condition_id| {
                        self.lookup(project_id, ItemKind::Condition, *condition_id)
                            .and_then(|record| record.pointer("/additional/notes"))
                            .and_then(Value::as_str)
                            == Some(notes.as_str())
                    })
                    .filter_map(|condition_id| self.render_condition(project_id, condition_id, true))
                    .collect();
                if let Some(additional) = record.get_mut("additional").and_then(Value::as_object_mut) {
                    additional.insert("condition_fragments".to_string(), Value::Array(fragments));
                }
            }
            _ => {}
        }
        Some(record)
    }

    fn retrieve(&self, kind: ItemKind, request: &ItemRequest) -> Result<ItemPage> {
        let project_id = request.project_id.as_str();
        let options = request.additional.clone().unwrap_or(Value::Null);

        let items: Vec<Value> = match &request.id {
            Some(IdSelector::One(id)) => self
                .render(project_id, kind, *id, &options)
                .into_iter()
                .collect(),
            Some(IdSelector::Many(ids)) => {
                let found: Vec<Value> = ids
                    .iter()
                    .filter_map(|id| self.render(project_id, kind, *id, &options))
                    .collect();
                if found.len() != ids.len() {
                    return Err(bad_request("Could not return items for all ids".to_string()));
                }
                found
            }
            None => {
                let notes_filter = options.pointer("/filter/notes").and_then(Value::as_str);
                let matching: Vec<Value> = self
                    .ids(project_id, kind)
                    .into_iter()
                    .filter_map(|id| self.render(project_id, kind, id, &options))
                    .filter(|item| match notes_filter {
                        Some(notes) => {
                            item.pointer("/additional/notes").and_then(Value::as_str) == Some(notes)
                        }
                        None => true,
                    })
                    .collect();
                let total_hits = matching.len() as u64;
                let start = request.start.unwrap_or(1).max(1) as usize;
                let take = request.max_page_results.map(|max| max as usize).unwrap_or(usize::MAX);
                return Ok(ItemPage {
                    total_hits,
                    items: matching.into_iter().skip(start - 1).take(take).collect(),
                });
            }
        };
        Ok(ItemPage {
            total_hits: items.len() as u64,
            items,
        })
    }

    // ---- mutations ----

    fn create(&mut self, project_id: &str, kind: ItemKind, payload: Value) -> Result<i64> {
        if kind == ItemKind::Condition {
            return self.create_condition(project_id, &payload);
        }
        let mut record = into_object(payload, kind)?;
        let mut additional = take_additional(&mut record);
        let id = self.allocate_id();

        match kind {
            ItemKind::Collection => {
                if let Some(condition) = additional.remove("condition").filter(Value::is_object) {
                    let condition_id = self.create_condition(project_id, &condition)?;
                    additional.insert("condition".to_string(), Value::from(condition_id));
                }
                if !additional.get("policy_ids").map(Value::is_array).unwrap_or(false) {
                    additional.insert("policy_ids".to_string(), json!([]));
                }
            }
            ItemKind::CollectionSequence => {
                additional
                    .entry("collection_sequence_entries")
                    .or_insert_with(|| json!([]));
            }
            ItemKind::Workflow => {
                additional
                    .entry("sequence_entries")
                    .or_insert_with(|| json!([]));
            }
            _ => {}
        }

        record.insert("id".to_string(), Value::from(id));
        record.insert("additional".to_string(), Value::Object(additional));
        self.table(project_id, kind).insert(id, Value::Object(record));
        Ok(id)
    }

    fn update(&mut self, project_id: &str, kind: ItemKind, payload: Value) -> Result<i64> {
        if kind == ItemKind::Condition {
            return self.update_condition(project_id, &payload);
        }
        let append = payload.get("update_behaviour").and_then(Value::as_str) == Some("ADD");
        let mut changes = into_object(payload, kind)?;
        let id = changes
            .get("id")
            .and_then(value_as_id)
            .ok_or_else(|| bad_request(format!("{} update requires an id", kind.type_name())))?;
        let mut existing = match self.lookup(project_id, kind, id) {
            Some(Value::Object(existing)) => existing.clone(),
            _ => {
                return Err(bad_request(format!(
                    "Could not find {} with id {}",
                    kind.type_name(),
                    id
                )))
            }
        };
        let mut additional = take_additional(&mut changes);
        let mut merged = take_additional(&mut existing);

        if kind == ItemKind::Collection {
            if let Some(condition) = additional.remove("condition").filter(Value::is_object) {
                if let Some(old) = merged.get("condition").and_then(value_as_id) {
                    self.remove_condition(project_id, old);
                }
                let condition_id = self.create_condition(project_id, &condition)?;
                merged.insert("condition".to_string(), Value::from(condition_id));
            }
        }
        if kind == ItemKind::CollectionSequence && append {
            if let Some(Value::Array(mut added)) = additional.remove("collection_sequence_entries") {
                if let Some(Value::Array(entries)) = merged.get_mut("collection_sequence_entries") {
                    entries.append(&mut added);
                } else {
                    merged.insert("collection_sequence_entries".to_string(), Value::Array(added));
                }
            }
        }

        for (key, value) in additional {
            if !value.is_null() {
                merged.insert(key, value);
            }
        }
        for (key, value) in changes {
            if !value.is_null() {
                existing.insert(key, value);
            }
        }
        existing.insert("additional".to_string(), Value::Object(merged));
        self.table(project_id, kind).insert(id, Value::Object(existing));
        Ok(id)
    }

    fn delete(&mut self, project_id: &str, kind: ItemKind, payload: &Value) -> Value {
        let Some(id) = payload.get("id").and_then(value_as_id) else {
            return delete_result(Some(format!("{} delete requires an id", kind.type_name())));
        };
        let removed = if kind == ItemKind::Condition {
            self.remove_condition(project_id, id)
        } else {
            self.table(project_id, kind).remove(&id).is_some()
        };
        if removed {
            delete_result(None)
        } else {
            delete_result(Some(format!(
                "Could not find {} with id {}",
                kind.type_name(),
                id
            )))
        }
    }
}

#[async_trait::async_trait]
impl ClassificationClient for InMemoryClassificationStore {
    async fn get_items(&self, kind: ItemKind, request: ItemRequest) -> Result<ItemPage> {
        let state = self.begin(kind, StoreOp::Retrieve)?;
        debug!(kind = kind.type_name(), "in-memory retrieve");
        state.retrieve(kind, &request)
    }

    async fn post_item(
        &self,
        kind: ItemKind,
        op: PostOp,
        project_id: &str,
        payload: Value,
    ) -> Result<Value> {
        let mut state = self.begin(kind, op.into())?;
        debug!(kind = kind.type_name(), op = op.as_str(), "in-memory post");
        let everything = json!({"include_children": true, "include_condition": true});
        match op {
            PostOp::Create => {
                let id = state.create(project_id, kind, payload)?;
                state
                    .render(project_id, kind, id, &everything)
                    .ok_or_else(|| bad_request(format!("created {} vanished", kind.type_name())))
            }
            PostOp::Update => {
                let id = state.update(project_id, kind, payload)?;
                state
                    .render(project_id, kind, id, &everything)
                    .ok_or_else(|| bad_request(format!("updated {} vanished", kind.type_name())))
            }
            PostOp::Delete => {
                let injected = state
                    .embedded_delete_failures
                    .iter()
                    .position(|failure| *failure == kind);
                if let Some(index) = injected {
                    state.embedded_delete_failures.remove(index);
                    return Ok(delete_result(Some(format!(
                        "injected delete error on {}",
                        kind.type_name()
                    ))));
                }
                Ok(state.delete(project_id, kind, &payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::client::check_delete_response;

    #[tokio::test]
    async fn test_condition_tree_is_assembled_from_parent_links() {
        let store = InMemoryClassificationStore::new();
        let root = store
            .post_item(
                ItemKind::Condition,
                PostOp::Create,
                "p",
                json!({"name": "root", "notes": "RULE_ID:9", "additional": {"type": "boolean", "operator": "and", "children": []}}),
            )
            .await
            .unwrap();
        let root_id = root["id"].as_i64().unwrap();

        store
            .post_item(
                ItemKind::Condition,
                PostOp::Create,
                "p",
                json!({"name": "child", "additional": {"type": "exists", "field": "A", "parent_condition_id": root_id}}),
            )
            .await
            .unwrap();

        let with_children = store
            .get_item(
                ItemKind::Condition,
                ItemRequest::new("p").with_id(root_id).with_additional(json!({"include_children": true})),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_children["additional"]["children"].as_array().unwrap().len(), 1);
        assert_eq!(with_children["additional"]["notes"], json!("RULE_ID:9"));

        let by_notes = store
            .get_item(
                ItemKind::Condition,
                ItemRequest::new("p").with_additional(json!({"filter": {"notes": "RULE_ID:9"}})),
            )
            .await
            .unwrap();
        assert_eq!(by_notes.and_then(|c| c["id"].as_i64()), Some(root_id));
    }

    #[tokio::test]
    async fn test_missing_delete_answers_with_embedded_error() {
        let store = InMemoryClassificationStore::new();
        let response = store
            .post_item(ItemKind::Policy, PostOp::Delete, "p", json!({"id": 404}))
            .await
            .unwrap();
        assert!(check_delete_response(&response).is_err());
    }

    #[tokio::test]
    async fn test_add_behaviour_appends_entries() {
        let store = InMemoryClassificationStore::new();
        let created = store
            .post_item(
                ItemKind::CollectionSequence,
                PostOp::Create,
                "p",
                json!({"name": "rule", "additional": {"evaluation_enabled": true,
                    "collection_sequence_entries": [{"collection_ids": [1], "order": 0}]}}),
            )
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();
        let updated = store
            .post_item(
                ItemKind::CollectionSequence,
                PostOp::Update,
                "p",
                json!({"id": id, "name": "rule", "update_behaviour": "ADD",
                    "additional": {"collection_sequence_entries": [{"collection_ids": [2], "order": 1}]}}),
            )
            .await
            .unwrap();
        assert_eq!(
            updated["additional"]["collection_sequence_entries"].as_array().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot_and_recorded() {
        let store = InMemoryClassificationStore::new();
        store.fail_next(ItemKind::Workflow, StoreOp::Create);
        let payload = json!({"name": "wf"});
        assert!(store
            .post_item(ItemKind::Workflow, PostOp::Create, "p", payload.clone())
            .await
            .is_err());
        assert!(store
            .post_item(ItemKind::Workflow, PostOp::Create, "p", payload)
            .await
            .is_ok());
        assert_eq!(store.count(ItemKind::Workflow, StoreOp::Create), 2);
        assert_eq!(store.len("p", ItemKind::Workflow), 1);
    }

    #[tokio::test]
    async fn test_embedded_delete_failure_keeps_the_object() {
        let store = InMemoryClassificationStore::new();
        let created = store
            .post_item(ItemKind::Policy, PostOp::Create, "p", json!({"name": "pol"}))
            .await
            .unwrap();
        store.fail_next_delete_embedded(ItemKind::Policy);

        let delete = json!({"id": created["id"]});
        let answer = store
            .post_item(ItemKind::Policy, PostOp::Delete, "p", delete.clone())
            .await
            .unwrap();
        assert!(answer["result"][0]["error_message"].is_string());
        assert_eq!(store.len("p", ItemKind::Policy), 1);

        let answer = store
            .post_item(ItemKind::Policy, PostOp::Delete, "p", delete)
            .await
            .unwrap();
        assert!(answer["result"][0]["error_message"].is_null());
        assert_eq!(store.len("p", ItemKind::Policy), 0);
    }
}
