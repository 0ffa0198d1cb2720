// Action operations
// An Action is a remote Collection + Policy pair plus its entry on the Rule's Collection Sequence

//! # Action Operations
//!
//! ## CreateAction
//! ```text
//! validate workflow + rule -> find Rule root condition
//!   -> create Policy
//!   -> create Collection (Action root: [fragment -> Rule root], policy_ids: [Policy])
//!   -> attach Collection entry to the Rule's Collection Sequence
//!   -> resolve the Policy Type's internal name
//! ```
//! Inserting at an explicit order shifts existing entries at or above it. When
//! nothing shifts, only the new entry is sent with `ADD`; otherwise the full
//! re-ordered list is sent with `REPLACE`.
//!
//! ## DeleteAction
//! ```text
//! validate workflow + rule -> remove entry (if still present)
//!   -> read Collection with its root -> clear its Policy reference
//!   -> delete Collection -> delete Action root condition -> delete Policy
//! ```
//! A Collection that already has no Policy (a previous delete stopped part
//! way) skips both Policy steps. A Collection without a root condition skips
//! the condition delete. Embedded delete errors are never ignored.

use std::collections::HashMap;

use tracing::{info, warn};

use super::saga::SagaProgress;
use super::validation::RuleContext;
use super::translator::{
    action_from_remote, collection_payload, collection_policies_payload, policy_payload,
    root_condition_payload, sequence_update_payload,
};
use super::ProcessingEngine;
use crate::models::sequence::{insert, remove_collection, update_order};
use crate::models::{
    Action, CollectionEntry, Condition, ConditionKind, ConditionMarker, OrderedEntry, Page,
    PageRequest, Rule, UpdateBehaviour,
};
use crate::{ProcessingError, Result};

/// Action root whose only child is the fragment pointing at the Rule root
fn action_root(rule_root_id: i64) -> Condition {
    let mut root = Condition::build_root_condition(&ConditionMarker::ActionRoot);
    if let ConditionKind::Boolean { children, .. } = &mut root.kind {
        children.push(Condition::build_fragment(rule_root_id));
    }
    root
}

/// The single Collection an entry references
fn entry_collection(entry: &CollectionEntry, rule_id: i64) -> Result<i64> {
    match entry.collection_ids.as_slice() {
        [collection_id] => Ok(*collection_id),
        ids => Err(ProcessingError::InvalidStructure(format!(
            "Collection entry on Rule {} references {} collections; an Action needs exactly one",
            rule_id,
            ids.len()
        ))),
    }
}

impl ProcessingEngine {
    /// CreateAction saga
    ///
    /// A failure after the Policy is created leaves orphaned remote objects and
    /// is reported as `DegradedState`; nothing is rolled back.
    pub async fn create_action(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action: Action,
    ) -> Result<Action> {
        let context = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, true)
            .await?;
        let rule = context.rule()?;
        let rule_root_id = self
            .rule_root_condition(project_id, &context)
            .await?
            .id
            .ok_or_else(|| {
                ProcessingError::InvalidStructure(format!("root condition of Rule {} has no id", rule_id))
            })?;
        let root_payload = root_condition_payload(&action_root(rule_root_id))?;

        let mut progress = SagaProgress::start("CreateAction");
        let policy = progress
            .step(
                "create policy",
                self.store
                    .create_policy(project_id, policy_payload(&action, None)),
            )
            .await?;

        let collection = progress
            .step(
                "create collection",
                self.store.create_collection(
                    project_id,
                    collection_payload(&action, None, Some(root_payload), &[policy.id]),
                ),
            )
            .await?;

        let mut entries = context.sequence.entries().to_vec();
        let shifts = action.order.map_or(false, |order| {
            entries
                .iter()
                .any(|entry| entry.order().map_or(false, |existing| existing >= order))
        });
        let entry = insert(&mut entries, collection.id, action.order);
        let (sent, behaviour) = if shifts {
            (entries, UpdateBehaviour::Replace)
        } else {
            (vec![entry.clone()], UpdateBehaviour::Add)
        };
        progress
            .step(
                "attach action to rule",
                self.store.update_sequence(
                    project_id,
                    sequence_update_payload(rule_id, &rule, Some(sent.as_slice()), behaviour),
                ),
            )
            .await?;

        let policy_type = progress.check(
            self.store
                .get_policy_type(project_id, policy.additional.policy_type_id)
                .await,
        )?;
        progress.finish();

        info!(rule_id, action_id = collection.id, order = ?entry.order, "created action");
        Ok(action_from_remote(
            &collection,
            &policy,
            Some(&policy_type),
            entry.order,
        ))
    }

    pub async fn get_action(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
    ) -> Result<Action> {
        let context = self
            .validate_workflow_rule_action(project_id, workflow_id, rule_id, action_id, false)
            .await?;
        let policy_id = context.collection.policy_id().ok_or_else(|| {
            ProcessingError::InvalidStructure(format!("Action {} has no Policy", action_id))
        })?;
        let policy = self.store.get_policy(project_id, policy_id).await?;
        let policy_type = self
            .store
            .get_policy_type(project_id, policy.additional.policy_type_id)
            .await?;
        Ok(action_from_remote(
            &context.collection,
            &policy,
            Some(&policy_type),
            context.entry.order,
        ))
    }

    /// Actions of a Rule in order, paged over the Rule's collection entries
    pub async fn get_actions(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        page: PageRequest,
    ) -> Result<Page<Action>> {
        let page = self.page(page);
        let context = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?;
        let mut entries = context.sequence.entries().to_vec();
        if entries.is_empty() {
            return Ok(Page::empty());
        }
        entries.sort_by_key(|entry| entry.order());

        let selected = page.slice(&entries);
        let collection_ids = selected
            .iter()
            .map(|entry| entry_collection(entry, rule_id))
            .collect::<Result<Vec<i64>>>()?;
        let collections = self
            .store
            .get_collections(project_id, collection_ids.clone())
            .await?;
        let collections: HashMap<i64, _> = collections
            .into_iter()
            .map(|collection| (collection.id, collection))
            .collect();

        let mut policy_ids = Vec::with_capacity(collection_ids.len());
        for collection_id in &collection_ids {
            let policy_id = collections
                .get(collection_id)
                .and_then(|collection| collection.policy_id())
                .ok_or_else(|| {
                    ProcessingError::InvalidStructure(format!(
                        "Collection {} on Rule {} has no Policy",
                        collection_id, rule_id
                    ))
                })?;
            policy_ids.push(policy_id);
        }
        let policies = self.store.get_policies(project_id, &policy_ids).await?;
        let type_ids: Vec<i64> = policies
            .iter()
            .map(|policy| policy.additional.policy_type_id)
            .collect();
        let policy_types = self.store.get_policy_types(project_id, &type_ids).await?;

        let mut items = Vec::with_capacity(selected.len());
        for (((entry, collection_id), policy), policy_type) in selected
            .iter()
            .zip(&collection_ids)
            .zip(&policies)
            .zip(&policy_types)
        {
            let collection = collections.get(collection_id).ok_or_else(|| {
                ProcessingError::NotFound(format!("Could not find collection with id {}", collection_id))
            })?;
            items.push(action_from_remote(
                collection,
                policy,
                Some(policy_type),
                entry.order,
            ));
        }
        Ok(Page {
            items,
            total_hits: entries.len() as u64,
        })
    }

    /// UpdateAction saga
    ///
    /// Re-orders the entry when the order changed, updates the Policy (or
    /// re-creates it when a previous failure left the Collection without one),
    /// then updates the Collection.
    pub async fn update_action(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        action: Action,
    ) -> Result<Action> {
        let context = self
            .validate_workflow_rule_action(project_id, workflow_id, rule_id, action_id, false)
            .await?;
        let rule = context.rule.rule()?;

        let mut progress = SagaProgress::start("UpdateAction");
        let mut order = context.entry.order;
        if let Some(requested) = action.order.filter(|requested| Some(*requested) != order) {
            let mut entries = context.rule.sequence.entries().to_vec();
            update_order(&mut entries, action_id, requested);
            progress
                .step(
                    "re-order action",
                    self.store.update_sequence(
                        project_id,
                        sequence_update_payload(rule_id, &rule, Some(entries.as_slice()), UpdateBehaviour::Replace),
                    ),
                )
                .await?;
            order = Some(requested);
        }

        let policy = match context.collection.policy_id() {
            Some(policy_id) => {
                progress
                    .step(
                        "update policy",
                        self.store
                            .update_policy(project_id, policy_payload(&action, Some(policy_id))),
                    )
                    .await?
            }
            None => {
                warn!(action_id, "action has no policy; creating a new one");
                progress
                    .step(
                        "re-create missing policy",
                        self.store
                            .create_policy(project_id, policy_payload(&action, None)),
                    )
                    .await?
            }
        };

        let collection = progress
            .step(
                "update collection",
                self.store.update_collection(
                    project_id,
                    collection_payload(&action, Some(action_id), None, &[policy.id]),
                ),
            )
            .await?;

        let policy_type = progress.check(
            self.store
                .get_policy_type(project_id, policy.additional.policy_type_id)
                .await,
        )?;
        progress.finish();

        info!(rule_id, action_id, "updated action");
        Ok(action_from_remote(&collection, &policy, Some(&policy_type), order))
    }

    /// DeleteAction saga
    ///
    /// Only the Workflow and Rule are validated, so a DeleteAction stopped part
    /// way can be retried: an entry that is already gone is skipped.
    pub async fn delete_action(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
    ) -> Result<()> {
        let context = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?;
        let rule = context.rule()?;
        let mut entries = context.sequence.entries().to_vec();
        self.delete_action_in(project_id, rule_id, &rule, &mut entries, action_id)
            .await
    }

    /// DeleteAction against a Rule already validated by the caller
    ///
    /// `entries` is the Rule's current entry list; it is kept in step with
    /// the remote copy so several Actions can be deleted in a row.
    pub(crate) async fn delete_action_in(
        &self,
        project_id: &str,
        rule_id: i64,
        rule: &Rule,
        entries: &mut Vec<CollectionEntry>,
        action_id: i64,
    ) -> Result<()> {
        let mut progress = SagaProgress::start("DeleteAction");
        let mut remaining = entries.clone();
        if remove_collection(&mut remaining, action_id) {
            progress
                .step(
                    "remove action from rule",
                    self.store.update_sequence(
                        project_id,
                        sequence_update_payload(rule_id, rule, Some(remaining.as_slice()), UpdateBehaviour::Replace),
                    ),
                )
                .await?;
            *entries = remaining;
        } else {
            warn!(rule_id, action_id, "action is not on the rule; continuing with its objects");
        }

        let collection = progress.check(
            self.store
                .get_collection(project_id, action_id, true)
                .await,
        )?;
        let policy_id = collection.policy_id();
        let condition_id = collection.condition_id();

        if let Some(policy_id) = policy_id {
            // once cleared, only this step name records the Policy id
            progress
                .step(
                    &format!("clear policy {} from collection", policy_id),
                    self.store
                        .update_collection(project_id, collection_policies_payload(&collection, &[])),
                )
                .await?;
        } else {
            warn!(action_id, "collection has no policy; skipping policy removal");
        }

        progress
            .step(
                "delete collection",
                self.store.delete_collection(project_id, action_id),
            )
            .await?;

        match condition_id {
            Some(condition_id) => {
                progress
                    .step(
                        "delete action root condition",
                        self.store.delete_condition(project_id, condition_id),
                    )
                    .await?;
            }
            None => warn!(action_id, "collection has no root condition; skipping its delete"),
        }

        if let Some(policy_id) = policy_id {
            progress
                .step("delete policy", self.store.delete_policy(project_id, policy_id))
                .await?;
        }
        progress.finish();

        info!(rule_id, action_id, "deleted action");
        Ok(())
    }

    /// Delete every Action on a Rule, one DeleteAction saga at a time
    ///
    /// Returns the number of Actions deleted.
    pub async fn delete_all_actions(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
    ) -> Result<usize> {
        let context = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?;
        self.delete_actions_in(project_id, &context).await
    }

    pub(crate) async fn delete_actions_in(&self, project_id: &str, context: &RuleContext) -> Result<usize> {
        let rule_id = context.rule_id();
        let rule = context.rule()?;
        let mut entries = context.sequence.entries().to_vec();
        let action_ids: Vec<i64> = entries
            .iter()
            .flat_map(|entry| entry.collection_ids.iter().copied())
            .collect();

        let mut progress = SagaProgress::start("DeleteAllActions");
        for action_id in &action_ids {
            progress
                .step(
                    &format!("delete action {}", action_id),
                    self.delete_action_in(project_id, rule_id, &rule, &mut entries, *action_id),
                )
                .await?;
        }
        progress.finish();
        Ok(action_ids.len())
    }
}
