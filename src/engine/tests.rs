// Scenario tests for the processing engine
// Every saga runs against the in-memory store; assertions cover results and the remote call log

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::client::{ClassificationClient, ItemKind, ItemPage, ItemRequest, PostOp};
use super::memory::{InMemoryClassificationStore, StoreOp};
use super::translator::collection_policies_payload;
use super::ProcessingEngine;
use crate::models::{
    Action, ActionType, Condition, ConditionKind, ConditionMarker, PageRequest, Rule, Workflow,
};
use crate::{ProcessingError, Result};

const PROJECT: &str = "project-1";

struct Fixture {
    memory: Arc<InMemoryClassificationStore>,
    engine: ProcessingEngine,
    workflow_id: i64,
    action_type_id: i64,
}

async fn fixture() -> Fixture {
    let memory = Arc::new(InMemoryClassificationStore::new());
    fixture_with(memory.clone(), memory).await
}

async fn fixture_with(
    memory: Arc<InMemoryClassificationStore>,
    client: Arc<dyn ClassificationClient>,
) -> Fixture {
    let engine = ProcessingEngine::new(client);
    let workflow = engine
        .create_workflow(PROJECT, Workflow::new("Ingestion"))
        .await
        .unwrap();
    let action_type = engine
        .create_action_type(
            PROJECT,
            ActionType {
                id: None,
                name: "Field mapping".to_string(),
                description: None,
                internal_name: "FieldMappingPolicyType".to_string(),
                definition: json!({"type": "object"}),
            },
        )
        .await
        .unwrap();
    Fixture {
        memory,
        engine,
        workflow_id: workflow.id.unwrap(),
        action_type_id: action_type.id.unwrap(),
    }
}

impl Fixture {
    async fn rule(&self, name: &str, priority: Option<i64>) -> i64 {
        let mut rule = Rule::new(name);
        rule.priority = priority;
        self.engine
            .create_rule(PROJECT, self.workflow_id, rule)
            .await
            .unwrap()
            .id
            .unwrap()
    }

    async fn action(&self, rule_id: i64, name: &str, order: Option<i64>) -> Action {
        let mut action = Action::new(name, self.action_type_id, json!({"field": name}));
        action.order = order;
        self.engine
            .create_action(PROJECT, self.workflow_id, rule_id, action)
            .await
            .unwrap()
    }

    async fn rule_root_id(&self, rule_id: i64) -> i64 {
        self.engine
            .store()
            .find_condition_by_notes(PROJECT, &ConditionMarker::RuleRoot(rule_id).notes())
            .await
            .unwrap()
            .and_then(|root| root.id)
            .unwrap()
    }

    async fn action_orders(&self, rule_id: i64) -> HashMap<i64, Option<i64>> {
        self.engine
            .store()
            .get_sequence(PROJECT, rule_id, false)
            .await
            .unwrap()
            .entries()
            .iter()
            .map(|entry| (entry.collection_ids[0], entry.order))
            .collect()
    }

    async fn strip_policy(&self, action_id: i64) {
        let collection = self
            .engine
            .store()
            .get_collection(PROJECT, action_id, false)
            .await
            .unwrap();
        self.engine
            .store()
            .update_collection(PROJECT, collection_policies_payload(&collection, &[]))
            .await
            .unwrap();
    }
}

// ---- rules and workflows ----

#[tokio::test]
async fn test_rule_priorities_shift_on_insert() {
    let f = fixture().await;
    let first = f.rule("first", None).await;
    let second = f.rule("second", None).await;
    let third = f.rule("third", Some(1)).await;

    let page = f
        .engine
        .get_rules(PROJECT, f.workflow_id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_hits, 3);
    let ordered: Vec<(Option<i64>, Option<i64>)> =
        page.items.iter().map(|rule| (rule.id, rule.priority)).collect();
    assert_eq!(
        ordered,
        vec![(Some(first), Some(0)), (Some(third), Some(1)), (Some(second), Some(2))]
    );
}

#[tokio::test]
async fn test_update_rule_moves_only_its_own_entry() {
    let f = fixture().await;
    let first = f.rule("first", None).await;
    let second = f.rule("second", None).await;

    let mut changes = Rule::new("renamed").with_priority(5);
    changes.enabled = false;
    let updated = f
        .engine
        .update_rule(PROJECT, f.workflow_id, first, changes)
        .await
        .unwrap();
    assert_eq!(updated.name, "renamed");
    assert!(!updated.enabled);
    assert_eq!(updated.priority, Some(5));

    let untouched = f.engine.get_rule(PROJECT, f.workflow_id, second).await.unwrap();
    assert_eq!(untouched.priority, Some(1));
}

#[tokio::test]
async fn test_rule_on_another_workflow_is_not_found() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let other = f
        .engine
        .create_workflow(PROJECT, Workflow::new("Other"))
        .await
        .unwrap();

    let result = f.engine.get_rule(PROJECT, other.id.unwrap(), rule_id).await;
    assert!(matches!(result, Err(ProcessingError::NotFound(_))));
}

#[tokio::test]
async fn test_workflow_delete_refuses_while_rules_exist() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;

    match f.engine.delete_workflow(PROJECT, f.workflow_id).await {
        Err(ProcessingError::InvalidInput(message)) => {
            assert_eq!(message, "Unable to Delete. There are Rules on the Workflow.")
        }
        other => panic!("expected InvalidInput, got {:?}", other),
    }
    assert_eq!(f.memory.count(ItemKind::Workflow, StoreOp::Delete), 0);

    f.engine.delete_rule(PROJECT, f.workflow_id, rule_id).await.unwrap();
    f.engine.delete_workflow(PROJECT, f.workflow_id).await.unwrap();
    assert!(f.engine.get_workflow(PROJECT, f.workflow_id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_workflow_update_keeps_rules() {
    let f = fixture().await;
    f.rule("r", None).await;
    let mut changes = Workflow::new("Renamed");
    changes.notes = Some("nightly".to_string());
    let updated = f
        .engine
        .update_workflow(PROJECT, f.workflow_id, changes)
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("nightly"));

    let rules = f
        .engine
        .get_rules(PROJECT, f.workflow_id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(rules.total_hits, 1);
}

#[tokio::test]
async fn test_delete_rule_cascades_to_actions_and_conditions() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    f.action(rule_id, "a", None).await;
    f.action(rule_id, "b", None).await;
    f.engine
        .create_rule_condition(PROJECT, f.workflow_id, rule_id, Condition::exists("TITLE"))
        .await
        .unwrap();

    f.engine.delete_rule(PROJECT, f.workflow_id, rule_id).await.unwrap();

    for kind in [
        ItemKind::CollectionSequence,
        ItemKind::Collection,
        ItemKind::Policy,
        ItemKind::Condition,
    ] {
        assert_eq!(f.memory.len(PROJECT, kind), 0, "{:?} left behind", kind);
    }
    assert_eq!(f.memory.len(PROJECT, ItemKind::PolicyType), 1);
    let rules = f
        .engine
        .get_rules(PROJECT, f.workflow_id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(rules.total_hits, 0);
}

// ---- actions ----

#[tokio::test]
async fn test_create_action_at_order_shifts_later_entries() {
    let f = fixture().await;
    let rule_id = f.rule("R1", None).await;
    let at_0 = f.action(rule_id, "zero", Some(0)).await;
    let at_1 = f.action(rule_id, "one", Some(1)).await;
    let at_3 = f.action(rule_id, "three", Some(3)).await;

    let created = f.action(rule_id, "two", Some(2)).await;
    assert_eq!(created.order, Some(2));
    assert_eq!(created.type_internal_name.as_deref(), Some("FieldMappingPolicyType"));

    let orders = f.action_orders(rule_id).await;
    assert_eq!(orders[&at_0.id.unwrap()], Some(0));
    assert_eq!(orders[&at_1.id.unwrap()], Some(1));
    assert_eq!(orders[&created.id.unwrap()], Some(2));
    assert_eq!(orders[&at_3.id.unwrap()], Some(4));

    let collection = f
        .memory
        .object(PROJECT, ItemKind::Collection, created.id.unwrap())
        .unwrap();
    let root = Condition::from_value(&collection["additional"]["condition"]).unwrap();
    assert_eq!(root.marker(), Some(ConditionMarker::ActionRoot));
    let children = root.root_children().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(
        children[0].kind,
        ConditionKind::Fragment {
            pointer: f.rule_root_id(rule_id).await
        }
    );
}

#[tokio::test]
async fn test_append_uses_add_without_resending_entries() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    f.action(rule_id, "a", None).await;
    let second = f.action(rule_id, "b", None).await;
    assert_eq!(second.order, Some(1));
    assert_eq!(f.action_orders(rule_id).await.len(), 2);
}

#[tokio::test]
async fn test_get_actions_lists_in_order_with_cached_lookups() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let late = f.action(rule_id, "late", Some(5)).await;
    let early = f.action(rule_id, "early", Some(1)).await;
    f.memory.clear_calls();

    let page = f
        .engine
        .get_actions(PROJECT, f.workflow_id, rule_id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_hits, 2);
    assert_eq!(page.items[0].id, early.id);
    assert_eq!(page.items[1].id, late.id);
    assert_eq!(page.items[1].settings, json!({"field": "late"}));

    let single = f
        .engine
        .get_action(PROJECT, f.workflow_id, rule_id, early.id.unwrap())
        .await
        .unwrap();
    assert_eq!(single, page.items[0]);

    assert_eq!(f.memory.count(ItemKind::Policy, StoreOp::Retrieve), 0);
    assert_eq!(f.memory.count(ItemKind::PolicyType, StoreOp::Retrieve), 0);
}

#[tokio::test]
async fn test_get_actions_rejects_collection_without_policy() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action = f.action(rule_id, "a", None).await;
    f.strip_policy(action.id.unwrap()).await;

    let result = f
        .engine
        .get_actions(PROJECT, f.workflow_id, rule_id, PageRequest::default())
        .await;
    assert!(matches!(result, Err(ProcessingError::InvalidStructure(_))));
}

#[tokio::test]
async fn test_update_action_recreates_missing_policy() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action = f.action(rule_id, "a", None).await;
    let action_id = action.id.unwrap();
    f.strip_policy(action_id).await;
    f.memory.clear_calls();

    let mut changes = Action::new("renamed", f.action_type_id, json!({"field": "NEW"}));
    changes.order = Some(7);
    let updated = f
        .engine
        .update_action(PROJECT, f.workflow_id, rule_id, action_id, changes)
        .await
        .unwrap();

    assert_eq!(f.memory.count(ItemKind::Policy, StoreOp::Create), 1);
    assert_eq!(f.memory.count(ItemKind::Policy, StoreOp::Update), 0);
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.order, Some(7));
    assert_eq!(f.action_orders(rule_id).await[&action_id], Some(7));

    let reread = f
        .engine
        .get_action(PROJECT, f.workflow_id, rule_id, action_id)
        .await
        .unwrap();
    assert_eq!(reread.settings, json!({"field": "NEW"}));
}

#[tokio::test]
async fn test_delete_action_removes_every_backing_object() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action = f.action(rule_id, "a", None).await;

    f.engine
        .delete_action(PROJECT, f.workflow_id, rule_id, action.id.unwrap())
        .await
        .unwrap();

    assert_eq!(f.memory.len(PROJECT, ItemKind::Collection), 0);
    assert_eq!(f.memory.len(PROJECT, ItemKind::Policy), 0);
    // only the Rule root is left
    assert_eq!(f.memory.len(PROJECT, ItemKind::Condition), 1);
    assert!(f.action_orders(rule_id).await.is_empty());
}

#[tokio::test]
async fn test_delete_action_without_policy_skips_policy_delete() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action = f.action(rule_id, "a", None).await;
    f.strip_policy(action.id.unwrap()).await;
    f.memory.clear_calls();

    f.engine
        .delete_action(PROJECT, f.workflow_id, rule_id, action.id.unwrap())
        .await
        .unwrap();

    assert_eq!(f.memory.count(ItemKind::Policy, StoreOp::Delete), 0);
    assert_eq!(f.memory.count(ItemKind::Collection, StoreOp::Update), 0);
    assert_eq!(f.memory.count(ItemKind::Collection, StoreOp::Delete), 1);
}

// ---- degraded state ----

#[tokio::test]
async fn test_failure_after_policy_create_is_degraded() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    f.memory.fail_next(ItemKind::Collection, StoreOp::Create);

    let result = f
        .engine
        .create_action(
            PROJECT,
            f.workflow_id,
            rule_id,
            Action::new("a", f.action_type_id, json!({})),
        )
        .await;
    match result {
        Err(ProcessingError::DegradedState { saga, completed, source }) => {
            assert_eq!(saga, "CreateAction");
            assert_eq!(completed, vec!["create policy".to_string()]);
            assert!(matches!(*source, ProcessingError::RemoteFailure { status: 500, .. }));
        }
        other => panic!("expected DegradedState, got {:?}", other),
    }
    // the orphaned Policy is left for the operator
    assert_eq!(f.memory.len(PROJECT, ItemKind::Policy), 1);
}

#[tokio::test]
async fn test_validation_failure_is_not_degraded() {
    let f = fixture().await;
    f.memory.clear_calls();
    let result = f
        .engine
        .create_action(PROJECT, f.workflow_id, 999, Action::new("a", f.action_type_id, json!({})))
        .await;
    assert!(matches!(result, Err(ProcessingError::NotFound(_))));
    assert!(f
        .memory
        .calls()
        .iter()
        .all(|call| call.op == StoreOp::Retrieve));
}

#[tokio::test]
async fn test_delete_action_can_be_retried_after_collection_delete_fails() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action_id = f.action(rule_id, "a", None).await.id.unwrap();
    let policy_id = f
        .memory
        .object(PROJECT, ItemKind::Collection, action_id)
        .unwrap()["additional"]["policy_ids"][0]
        .as_i64()
        .unwrap();
    f.memory.fail_next(ItemKind::Collection, StoreOp::Delete);

    let error = f
        .engine
        .delete_action(PROJECT, f.workflow_id, rule_id, action_id)
        .await
        .unwrap_err();
    match error {
        ProcessingError::DegradedState { completed, .. } => assert_eq!(
            completed,
            vec![
                "remove action from rule".to_string(),
                format!("clear policy {} from collection", policy_id)
            ]
        ),
        other => panic!("expected DegradedState, got {:?}", other),
    }
    assert_eq!(f.memory.count(ItemKind::Policy, StoreOp::Delete), 0);

    // the entry is already gone; the retry carries on with the Collection
    f.engine
        .delete_action(PROJECT, f.workflow_id, rule_id, action_id)
        .await
        .unwrap();
    assert_eq!(f.memory.len(PROJECT, ItemKind::Collection), 0);
    assert_eq!(f.memory.len(PROJECT, ItemKind::Condition), 1);

    // the only leftover is the Policy named by the failed attempt
    assert_eq!(f.memory.len(PROJECT, ItemKind::Policy), 1);
    f.engine.store().delete_policy(PROJECT, policy_id).await.unwrap();
    assert_eq!(f.memory.len(PROJECT, ItemKind::Policy), 0);
}

#[tokio::test]
async fn test_delete_answered_with_embedded_error_stops_delete_action() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action_id = f.action(rule_id, "a", None).await.id.unwrap();
    f.memory.fail_next_delete_embedded(ItemKind::Collection);
    f.memory.clear_calls();

    let error = f
        .engine
        .delete_action(PROJECT, f.workflow_id, rule_id, action_id)
        .await
        .unwrap_err();
    match error {
        ProcessingError::DegradedState { saga, source, .. } => {
            assert_eq!(saga, "DeleteAction");
            assert!(matches!(*source, ProcessingError::RemoteFailure { status: 200, .. }));
        }
        other => panic!("expected DegradedState, got {:?}", other),
    }
    assert_eq!(f.memory.count(ItemKind::Collection, StoreOp::Delete), 1);
    assert_eq!(f.memory.count(ItemKind::Condition, StoreOp::Delete), 0);
    assert_eq!(f.memory.count(ItemKind::Policy, StoreOp::Delete), 0);
    assert_eq!(f.memory.len(PROJECT, ItemKind::Collection), 1);
}

#[tokio::test]
async fn test_delete_action_reads_each_object_once() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action_id = f.action(rule_id, "a", None).await.id.unwrap();
    f.memory.clear_calls();

    f.engine
        .delete_action(PROJECT, f.workflow_id, rule_id, action_id)
        .await
        .unwrap();
    assert_eq!(f.memory.count(ItemKind::Workflow, StoreOp::Retrieve), 1);
    assert_eq!(f.memory.count(ItemKind::CollectionSequence, StoreOp::Retrieve), 1);
    assert_eq!(f.memory.count(ItemKind::Collection, StoreOp::Retrieve), 1);
}

#[tokio::test]
async fn test_delete_rule_validates_once() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    f.action(rule_id, "a", None).await;
    f.action(rule_id, "b", None).await;
    f.memory.clear_calls();

    f.engine.delete_rule(PROJECT, f.workflow_id, rule_id).await.unwrap();
    assert_eq!(f.memory.count(ItemKind::Workflow, StoreOp::Retrieve), 1);
    assert_eq!(f.memory.count(ItemKind::CollectionSequence, StoreOp::Retrieve), 1);
    assert_eq!(f.memory.count(ItemKind::Collection, StoreOp::Retrieve), 2);
    // the Rule root comes with the detailed sequence
    assert_eq!(f.memory.count(ItemKind::Condition, StoreOp::Retrieve), 0);
    assert_eq!(f.memory.count(ItemKind::CollectionSequence, StoreOp::Update), 2);
}

// ---- conditions ----

#[tokio::test]
async fn test_rule_conditions_round_trip() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let title = f
        .engine
        .create_rule_condition(PROJECT, f.workflow_id, rule_id, Condition::exists("TITLE"))
        .await
        .unwrap();
    f.engine
        .create_rule_condition(
            PROJECT,
            f.workflow_id,
            rule_id,
            Condition::not(Condition::regex("NAME", "^tmp")),
        )
        .await
        .unwrap();
    let title_id = title.id.unwrap();
    assert_eq!(title.parent_condition_id, Some(f.rule_root_id(rule_id).await));

    let second_page = f
        .engine
        .get_rule_conditions(PROJECT, f.workflow_id, rule_id, PageRequest::new(2, 1))
        .await
        .unwrap();
    assert_eq!(second_page.total_hits, 2);
    assert_eq!(second_page.items.len(), 1);
    assert_eq!(second_page.items[0].kind.type_name(), "not");

    let updated = f
        .engine
        .update_rule_condition(
            PROJECT,
            f.workflow_id,
            rule_id,
            title_id,
            Condition::string("TITLE", "is", "report"),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, Some(title_id));
    assert_eq!(updated.parent_condition_id, title.parent_condition_id);

    f.engine
        .delete_rule_condition(PROJECT, f.workflow_id, rule_id, title_id)
        .await
        .unwrap();
    let remaining = f
        .engine
        .get_rule_conditions(PROJECT, f.workflow_id, rule_id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(remaining.total_hits, 1);
}

#[tokio::test]
async fn test_rule_root_is_never_returned_as_a_condition() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let root_id = f.rule_root_id(rule_id).await;

    let result = f
        .engine
        .get_rule_condition(PROJECT, f.workflow_id, rule_id, root_id)
        .await;
    assert!(matches!(result, Err(ProcessingError::NotFound(_))));
}

#[tokio::test]
async fn test_action_conditions_hide_rule_fragment() {
    let f = fixture().await;
    let rule_id = f.rule("r", None).await;
    let action_id = f.action(rule_id, "a", None).await.id.unwrap();

    let created = f
        .engine
        .create_action_condition(
            PROJECT,
            f.workflow_id,
            rule_id,
            action_id,
            Condition::number("PAGES", "gt", 10),
        )
        .await
        .unwrap();

    let page = f
        .engine
        .get_action_conditions(PROJECT, f.workflow_id, rule_id, action_id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_hits, 1);
    assert_eq!(page.items[0].id, created.id);

    let collection = f.memory.object(PROJECT, ItemKind::Collection, action_id).unwrap();
    let fragment_id = collection["additional"]["condition"]["additional"]["children"][0]["id"]
        .as_i64()
        .unwrap();
    let result = f
        .engine
        .get_action_condition(PROJECT, f.workflow_id, rule_id, action_id, fragment_id)
        .await;
    assert!(matches!(result, Err(ProcessingError::NotFound(_))));

    f.engine
        .delete_action_condition(PROJECT, f.workflow_id, rule_id, action_id, created.id.unwrap())
        .await
        .unwrap();
    let page = f
        .engine
        .get_action_conditions(PROJECT, f.workflow_id, rule_id, action_id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_hits, 0);
}

/// Client that loses `parent_condition_id` on every condition it reads
struct ParentlessConditions {
    inner: Arc<InMemoryClassificationStore>,
}

fn strip_parents(node: &mut Value) {
    if let Some(additional) = node.get_mut("additional").and_then(Value::as_object_mut) {
        additional.remove("parent_condition_id");
        if let Some(Value::Array(children)) = additional.get_mut("children") {
            children.iter_mut().for_each(strip_parents);
        }
    }
}

#[async_trait::async_trait]
impl ClassificationClient for ParentlessConditions {
    async fn get_items(&self, kind: ItemKind, request: ItemRequest) -> Result<ItemPage> {
        let mut page = self.inner.get_items(kind, request).await?;
        if kind == ItemKind::Condition {
            page.items.iter_mut().for_each(strip_parents);
        }
        Ok(page)
    }

    async fn post_item(
        &self,
        kind: ItemKind,
        op: PostOp,
        project_id: &str,
        payload: Value,
    ) -> Result<Value> {
        self.inner.post_item(kind, op, project_id, payload).await
    }
}

#[tokio::test]
async fn test_condition_update_without_parent_never_reaches_remote() {
    let memory = Arc::new(InMemoryClassificationStore::new());
    let client = Arc::new(ParentlessConditions {
        inner: memory.clone(),
    });
    let f = fixture_with(memory, client).await;
    let rule_id = f.rule("r", None).await;
    let created = f
        .engine
        .create_rule_condition(PROJECT, f.workflow_id, rule_id, Condition::exists("TITLE"))
        .await
        .unwrap();
    f.memory.clear_calls();

    let result = f
        .engine
        .update_rule_condition(
            PROJECT,
            f.workflow_id,
            rule_id,
            created.id.unwrap(),
            Condition::exists("AUTHOR"),
        )
        .await;
    assert!(matches!(result, Err(ProcessingError::InvalidStructure(_))));
    assert_eq!(f.memory.count(ItemKind::Condition, StoreOp::Update), 0);
}

// ---- action types and paging ----

#[tokio::test]
async fn test_action_type_crud() {
    let f = fixture().await;
    let fetched = f.engine.get_action_type(PROJECT, f.action_type_id).await.unwrap();
    assert_eq!(fetched.internal_name, "FieldMappingPolicyType");

    let mut changes = fetched.clone();
    changes.name = "Renamed".to_string();
    let updated = f
        .engine
        .update_action_type(PROJECT, f.action_type_id, changes)
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");

    f.engine.delete_action_type(PROJECT, f.action_type_id).await.unwrap();
    let missing = f.engine.get_action_type(PROJECT, f.action_type_id).await;
    assert!(missing.unwrap_err().is_not_found());
    assert!(f
        .engine
        .delete_action_type(PROJECT, f.action_type_id)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_workflow_listing_pages() {
    let f = fixture().await;
    for name in ["b", "c", "d"] {
        f.engine
            .create_workflow(PROJECT, Workflow::new(name))
            .await
            .unwrap();
    }
    let page = f
        .engine
        .get_workflows(PROJECT, PageRequest::new(2, 3))
        .await
        .unwrap();
    assert_eq!(page.total_hits, 4);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "d");

    let types = f
        .engine
        .get_action_types(PROJECT, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(types.total_hits, 1);
}
