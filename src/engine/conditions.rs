// Rule and Action condition operations
// Visible conditions live under a Rule root or an Action root that callers never see

//! # Condition Operations
//!
//! Rule Conditions are the children of the Rule root (notes `RULE_ID:<id>`).
//! Action Conditions are the children of the Action root (notes `ACTION_ROOT`),
//! minus the Rule fragment that links the Action to its Rule.
//!
//! Every create and update sends an explicit `parent_condition_id`:
//!
//! - create: the id of the owning root
//! - update: the parent of the node being replaced, as found in the tree
//!
//! A payload without one is refused before any remote call is made.

use tracing::info;

use super::translator::{condition_payload, condition_update_payload};
use super::ProcessingEngine;
use crate::models::{Condition, ConditionMarker, Page, PageRequest};
use crate::{ProcessingError, Result};

fn root_id(root: &Condition, owner: &str) -> Result<i64> {
    root.id.ok_or_else(|| {
        ProcessingError::InvalidStructure(format!("root condition of {} has no id", owner))
    })
}

/// `replacement` re-targeted at `existing`, keeping its place in the tree
fn replacing(existing: &Condition, replacement: Condition) -> Condition {
    Condition {
        id: existing.id,
        parent_condition_id: existing.parent_condition_id,
        ..replacement
    }
}

impl ProcessingEngine {
    // ---- rule conditions ----

    pub async fn create_rule_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        condition: Condition,
    ) -> Result<Condition> {
        let rule = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, true)
            .await?;
        let root = self.rule_root_condition(project_id, &rule).await?;
        let parent_id = root_id(&root, &format!("Rule {}", rule_id))?;

        let payload = condition_payload(&Condition { id: None, ..condition }, parent_id)?;
        let created = self.store.create_condition(project_id, payload).await?;
        info!(rule_id, condition_id = ?created.id, "created rule condition");
        Ok(created)
    }

    pub async fn get_rule_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        condition_id: i64,
    ) -> Result<Condition> {
        Ok(self
            .validate_condition_on_rule(project_id, workflow_id, rule_id, condition_id)
            .await?
            .condition)
    }

    /// Direct children of the Rule root, paged in memory
    pub async fn get_rule_conditions(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        page: PageRequest,
    ) -> Result<Page<Condition>> {
        let page = self.page(page);
        let rule = self
            .validate_workflow_and_rule(project_id, workflow_id, rule_id, false)
            .await?;
        let root = self.rule_root_condition(project_id, &rule).await?;
        root.root_children()?;
        Ok(Page::from_slice(&root.extract_visible_children(None), &page))
    }

    pub async fn update_rule_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        condition_id: i64,
        condition: Condition,
    ) -> Result<Condition> {
        let context = self
            .validate_condition_on_rule(project_id, workflow_id, rule_id, condition_id)
            .await?;
        let payload = condition_update_payload(&replacing(&context.condition, condition))?;
        let updated = self.store.update_condition(project_id, payload).await?;
        info!(rule_id, condition_id, "updated rule condition");
        Ok(updated)
    }

    pub async fn delete_rule_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        condition_id: i64,
    ) -> Result<()> {
        self.validate_condition_on_rule(project_id, workflow_id, rule_id, condition_id)
            .await?;
        self.store.delete_condition(project_id, condition_id).await?;
        info!(rule_id, condition_id, "deleted rule condition");
        Ok(())
    }

    // ---- action conditions ----

    pub async fn create_action_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        condition: Condition,
    ) -> Result<Condition> {
        let action = self
            .validate_workflow_rule_action(project_id, workflow_id, rule_id, action_id, true)
            .await?;
        let root = action.root_condition()?.ok_or_else(|| {
            ProcessingError::InvalidStructure(format!(
                "Unable to Create Condition. Action {} is in invalid state: it has no root condition",
                action_id
            ))
        })?;
        let parent_id = root_id(&root, &format!("Action {}", action_id))?;

        let payload = condition_payload(&Condition { id: None, ..condition }, parent_id)?;
        let created = self.store.create_condition(project_id, payload).await?;
        info!(action_id, condition_id = ?created.id, "created action condition");
        Ok(created)
    }

    pub async fn get_action_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        condition_id: i64,
    ) -> Result<Condition> {
        Ok(self
            .validate_condition_on_action(project_id, workflow_id, rule_id, action_id, condition_id)
            .await?
            .condition)
    }

    /// Direct children of the Action root except the Rule fragment, paged in memory
    pub async fn get_action_conditions(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        page: PageRequest,
    ) -> Result<Page<Condition>> {
        let page = self.page(page);
        let action = self
            .validate_workflow_rule_action(project_id, workflow_id, rule_id, action_id, true)
            .await?;
        let root = action.root_condition()?.ok_or_else(|| {
            ProcessingError::InvalidStructure(format!(
                "The Collection for Action ID: {} has no root condition",
                action_id
            ))
        })?;
        root.root_children()?;
        let visible = root.extract_visible_children(Some(&ConditionMarker::RuleFragment));
        Ok(Page::from_slice(&visible, &page))
    }

    pub async fn update_action_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        condition_id: i64,
        condition: Condition,
    ) -> Result<Condition> {
        let context = self
            .validate_condition_on_action(project_id, workflow_id, rule_id, action_id, condition_id)
            .await?;
        let payload = condition_update_payload(&replacing(&context.condition, condition))?;
        let updated = self.store.update_condition(project_id, payload).await?;
        info!(action_id, condition_id, "updated action condition");
        Ok(updated)
    }

    pub async fn delete_action_condition(
        &self,
        project_id: &str,
        workflow_id: i64,
        rule_id: i64,
        action_id: i64,
        condition_id: i64,
    ) -> Result<()> {
        self.validate_condition_on_action(project_id, workflow_id, rule_id, action_id, condition_id)
            .await?;
        self.store.delete_condition(project_id, condition_id).await?;
        info!(action_id, condition_id, "deleted action condition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacing_keeps_identity_and_parent() {
        let existing = Condition::exists("TITLE").with_id(8);
        let existing = Condition {
            parent_condition_id: Some(3),
            ..existing
        };
        let replacement = Condition::string("TITLE", "is", "report").with_id(99);
        let merged = replacing(&existing, replacement);
        assert_eq!(merged.id, Some(8));
        assert_eq!(merged.parent_condition_id, Some(3));
        assert_eq!(merged.kind.type_name(), "string");
    }
}
