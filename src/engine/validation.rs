// Validation gateway
// Composite existence checks from Workflow down to Condition

//! # Validation Gateway
//!
//! Every Rule, Action and Condition operation starts by proving its parents
//! exist and belong together. The checks build on each other:
//!
//! ```text
//! validate_workflow_and_rule       -> RuleContext
//! validate_workflow_rule_action    -> ActionContext   (RuleContext + entry + Collection)
//! validate_condition_on_rule       -> ConditionContext<RuleContext>
//! validate_condition_on_action     -> ConditionContext<ActionContext>
//! ```
//!
//! Each context carries the remote objects already fetched so a saga never
//! fetches the same object twice in one flow. Validation never mutates.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::translator::{rule_from_sequence, rule_priorities_from_workflow};
use super::ProcessingEngine;
use crate::models::{
    Collection, CollectionEntry, CollectionSequence, Condition, ConditionMarker, RemoteWorkflow,
    Rule,
};
use crate::{ProcessingError, Result};

/// A Workflow and one of its Rules, both known to exist and be linked
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub workflow: RemoteWorkflow,
    pub priorities: HashMap<i64, i64>,
    pub sequence: CollectionSequence,
}

impl RuleContext {
    pub fn rule_id(&self) -> i64 {
        self.sequence.id
    }

    pub fn priority(&self) -> Option<i64> {
        self.priorities.get(&self.sequence.id).copied()
    }

    pub fn rule(&self) -> Result<Rule> {
        rule_from_sequence(&self.sequence, self.priority())
    }

    /// The Rule root carried on a sequence fetched with details, if present
    pub fn embedded_root(&self) -> Option<Condition> {
        let notes = ConditionMarker::RuleRoot(self.sequence.id).notes();
        self.sequence
            .additional
            .as_ref()?
            .condition_fragments
            .iter()
            .filter_map(|fragment| match Condition::from_value(fragment) {
                Ok(condition) => Some(condition),
                Err(e) => {
                    warn!(rule_id = self.sequence.id, error = %e, "skipping unreadable condition fragment");
                    None
                }
            })
            .find(|condition| condition.notes.as_deref() == Some(notes.as_str()))
    }
}

/// An Action within a validated Rule
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub rule: RuleContext,
    pub entry: CollectionEntry,
    pub collection: Collection,
}

impl ActionContext {
    pub fn action_id(&self) -> i64 {
        self.collection.id
    }

    /// The Action root condition, when the Collection was fetched with it
    pub fn root_condition(&self) -> Result<Option<Condition>> {
        match &self.collection.additional.condition {
            Some(value) if value.is_object() => Condition::from_value(value).map(Some),
            _ => Ok(None),
        }
    }
}

/// A visible condition located under a validated parent
#[derive(Debug, Clone)]
pub struct ConditionContext<P> {
    pub parent: P,
    pub root: Condition,
    pub condition: Condition,
}

impl ProcessingEngine {
    /// Workflow and Rule exist and the Rule is attached to the Workflow
    ///
    /// The Workflow and the Collection Sequence are fetched concurrently.
    pub async fn validate_workflow_and_rule(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        with_details: bool,
    ) -> Result<RuleContext> {
        debug!(workflow_id, rule_id, "validating workflow and rule");
        let (workflow, sequence) = futures::try_join!(
            self.store.get_workflow(project_id, workflow_id),
            self.store.get_sequence(project_id, rule_id, with_details),
        )?;
        let priorities = rule_priorities_from_workflow(&workflow);
        if !priorities.contains_key(&rule_id) {
            return Err(ProcessingError::NotFound(format!(
                "Processing Rule ID: {} not found on Workflow with ID: {}",
                rule_id, workflow_id
            )));
        }
        Ok(RuleContext {
            workflow,
            priorities,
            sequence,
        })
    }

    /// Extends [`Self::validate_workflow_and_rule`] with the Action's entry and Collection
    pub async fn validate_workflow_rule_action(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        with_condition: bool,
    ) -> Result<ActionContext> {
        let rule = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?;
        let entries = rule.sequence.entries();
        if entries.is_empty() {
            return Err(ProcessingError::NotFound(format!(
                "There are no Actions on Rule with ID: {}",
                rule_id
            )));
        }
        let entry = entries
            .iter()
            .find(|entry| entry.collection_ids.first() == Some(&action_id))
            .cloned()
            .ok_or_else(|| {
                ProcessingError::NotFound(format!(
                    "No matching Action with ID: {} found on Rule ID: {}",
                    action_id, rule_id
                ))
            })?;
        let collection = self
            .store
            .get_collection(project_id, action_id, with_condition)
            .await?;
        Ok(ActionContext {
            rule,
            entry,
            collection,
        })
    }

    /// The Rule root condition with its full subtree
    ///
    /// Taken from the detailed sequence when it carries it, otherwise looked up
    /// by notes and re-read with children.
    pub(crate) async fn rule_root_condition(
        &self,
        project_id: &str,
        rule: &RuleContext,
    ) -> Result<Condition> {
        if let Some(root) = rule.embedded_root() {
            return Ok(root);
        }
        let notes = ConditionMarker::RuleRoot(rule.rule_id()).notes();
        let found = self
            .store
            .find_condition_by_notes(project_id, &notes)
            .await?
            .ok_or_else(|| {
                ProcessingError::NotFound(format!(
                    "No root condition found for Rule with ID: {}",
                    rule.rule_id()
                ))
            })?;
        let root_id = found.id.ok_or_else(|| {
            ProcessingError::InvalidStructure(format!(
                "root condition of Rule {} has no id",
                rule.rule_id()
            ))
        })?;
        self.store.get_condition(project_id, root_id).await
    }

    /// Extends [`Self::validate_workflow_and_rule`] with a visible condition under the Rule root
    pub async fn validate_condition_on_rule(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        condition_id: i64,
    ) -> Result<ConditionContext<RuleContext>> {
        let rule = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?;
        let root = self.rule_root_condition(project_id, &rule).await?;
        let condition = root.find_by_id(condition_id).cloned().ok_or_else(|| {
            ProcessingError::NotFound(format!(
                "Unable to find matching Condition with ID: {}",
                condition_id
            ))
        })?;
        Ok(ConditionContext {
            parent: rule,
            root,
            condition,
        })
    }

    /// Extends [`Self::validate_workflow_rule_action`] with a visible condition under the Action root
    pub async fn validate_condition_on_action(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        condition_id: i64,
    ) -> Result<ConditionContext<ActionContext>> {
        let action = self
            .validate_workflow_rule_action(project_id, workflow_id, rule_id, action_id, true)
            .await?;
        let root = action.root_condition()?.ok_or_else(|| {
            ProcessingError::InvalidStructure(format!(
                "The Collection for Action ID: {} has no root condition",
                action_id
            ))
        })?;
        let condition = root.find_by_id(condition_id).cloned().ok_or_else(|| {
            ProcessingError::NotFound(format!(
                "Unable to find matching Condition with ID: {} on Action with ID: {}",
                condition_id, action_id
            ))
        })?;
        Ok(ConditionContext {
            parent: action,
            root,
            condition,
        })
    }
}
