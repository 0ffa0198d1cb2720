// Rule operations
// A Rule is a remote Collection Sequence plus its entry on a Workflow and its root condition

//! # Rule Operations
//!
//! | Operation     | Remote steps                                                         |
//! |---------------|----------------------------------------------------------------------|
//! | `create_rule` | create sequence -> insert workflow entry -> update workflow -> create root condition |
//! | `update_rule` | update sequence -> (re-order workflow entry -> update workflow)      |
//! | `delete_rule` | delete every Action -> remove workflow entry -> update workflow -> delete root condition -> delete sequence |
//!
//! A Rule's priority is the order of its entry on the Workflow. Inserting at
//! an explicit priority shifts every entry at or above it; updating the
//! priority moves only this Rule's entry.

use futures::future::try_join_all;
use tracing::{info, warn};

use super::saga::SagaProgress;
use super::translator::{
    remote_workflow_payload, root_condition_payload, rule_from_sequence, sequence_create_payload,
    sequence_update_payload,
};
use super::ProcessingEngine;
use crate::models::{
    Condition, ConditionMarker, OrderedEntry, Page, PageRequest, Rule, SequenceEntry,
    UpdateBehaviour,
};
use crate::Result;

impl ProcessingEngine {
    /// CreateRule saga
    ///
    /// When the final step fails the Rule exists and is attached, but cannot
    /// carry Rule Conditions until its root condition is created.
    pub async fn create_rule(&self, project_id: &str, workflow_id: i64, rule: Rule) -> Result<Rule> {
        let mut workflow = self.store.get_workflow(project_id, workflow_id).await?;

        let mut progress = SagaProgress::start("CreateRule");
        let sequence = progress
            .step(
                "create collection sequence",
                self.store
                    .create_sequence(project_id, sequence_create_payload(&rule)),
            )
            .await?;

        let entry = workflow.insert_rule(sequence.id, rule.priority);
        progress
            .step(
                "add rule to workflow",
                self.store
                    .update_workflow(project_id, remote_workflow_payload(&workflow)),
            )
            .await?;

        let root = Condition::build_root_condition(&ConditionMarker::RuleRoot(sequence.id));
        let root_payload = progress.check(root_condition_payload(&root))?;
        progress
            .step(
                "create rule root condition",
                self.store.create_condition(project_id, root_payload),
            )
            .await?;
        progress.finish();

        info!(workflow_id, rule_id = sequence.id, priority = ?entry.order, "created rule");
        rule_from_sequence(&sequence, entry.order)
    }

    pub async fn get_rule(&self, project_id: &str, workflow_id: i64, rule_id: i64) -> Result<Rule> {
        self.validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?
            .rule()
    }

    /// Rules of a Workflow in priority order, paged over the Workflow's entries
    pub async fn get_rules(
        &self,
        project_id: &str,
        workflow_id: i64,
        page: PageRequest,
    ) -> Result<Page<Rule>> {
        let page = self.page(page);
        let workflow = self.store.get_workflow(project_id, workflow_id).await?;
        let mut entries: Vec<SequenceEntry> = workflow.additional.sequence_entries.clone();
        if entries.is_empty() {
            return Ok(Page::empty());
        }
        entries.sort_by_key(|entry| entry.order());

        let selected = page.slice(&entries);
        let sequences = try_join_all(
            selected
                .iter()
                .map(|entry| self.store.get_sequence(project_id, entry.collection_sequence_id, false)),
        )
        .await?;
        let items = sequences
            .iter()
            .zip(selected.iter())
            .map(|(sequence, entry)| rule_from_sequence(sequence, entry.order))
            .collect::<Result<Vec<Rule>>>()?;
        Ok(Page {
            items,
            total_hits: entries.len() as u64,
        })
    }

    /// Update name, description and enabled flag, then the priority if it changed
    pub async fn update_rule(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        rule: Rule,
    ) -> Result<Rule> {
        let mut context = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?;

        let mut progress = SagaProgress::start("UpdateRule");
        let updated = progress
            .step(
                "update collection sequence",
                self.store.update_sequence(
                    project_id,
                    sequence_update_payload(
                        rule_id,
                        &rule,
                        Some(context.sequence.entries()),
                        UpdateBehaviour::Replace,
                    ),
                ),
            )
            .await?;

        let mut priority = context.priority();
        if let Some(requested) = rule.priority.filter(|requested| Some(*requested) != priority) {
            context.workflow.update_rule_order(rule_id, requested);
            progress
                .step(
                    "re-order rule on workflow",
                    self.store
                        .update_workflow(project_id, remote_workflow_payload(&context.workflow)),
                )
                .await?;
            priority = Some(requested);
        }
        progress.finish();

        info!(workflow_id, rule_id, "updated rule");
        rule_from_sequence(&updated, priority)
    }

    /// DeleteRule saga; cascades into every Action on the Rule
    ///
    /// Everything is driven from one detailed validation: the Workflow, the
    /// Rule's entries and its root condition are read once.
    pub async fn delete_rule(&self, project_id: &str, workflow_id: i64, rule_id: i64) -> Result<()> {
        let context = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, true)
            .await?;

        let mut progress = SagaProgress::start("DeleteRule");
        progress
            .step("delete actions", self.delete_actions_in(project_id, &context))
            .await?;

        let mut workflow = context.workflow.clone();
        if workflow.remove_rule(rule_id).is_some() {
            progress
                .step(
                    "remove rule from workflow",
                    self.store
                        .update_workflow(project_id, remote_workflow_payload(&workflow)),
                )
                .await?;
        }

        let root = match context.embedded_root() {
            Some(root) => Some(root),
            None => {
                let notes = ConditionMarker::RuleRoot(rule_id).notes();
                progress.check(self.store.find_condition_by_notes(project_id, &notes).await)?
            }
        };
        match root.and_then(|root| root.id) {
            Some(root_id) => {
                progress
                    .step(
                        "delete rule root condition",
                        self.store.delete_condition(project_id, root_id),
                    )
                    .await?;
            }
            None => warn!(rule_id, "rule has no root condition; skipping its delete"),
        }

        progress
            .step(
                "delete collection sequence",
                self.store.delete_sequence(project_id, rule_id),
            )
            .await?;
        progress.finish();

        info!(workflow_id, rule_id, "deleted rule");
        Ok(())
    }
}
