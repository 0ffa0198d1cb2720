// Workflow operations
// Workflows map one-to-one onto remote Workflows

use tracing::info;

use super::translator::{workflow_from_remote, workflow_payload};
use super::ProcessingEngine;
use crate::models::{Page, PageRequest, Workflow};
use crate::{ProcessingError, Result};

impl ProcessingEngine {
    pub async fn create_workflow(&self, project_id: &str, workflow: Workflow) -> Result<Workflow> {
        let workflow = Workflow { id: None, ..workflow };
        let created = self
            .store
            .create_workflow(project_id, workflow_payload(&workflow, &[]))
            .await?;
        info!(workflow_id = created.id, "created workflow");
        Ok(workflow_from_remote(&created))
    }

    pub async fn get_workflow(&self, project_id: &str, workflow_id: i64) -> Result<Workflow> {
        let remote = self.store.get_workflow(project_id, workflow_id).await?;
        Ok(workflow_from_remote(&remote))
    }

    pub async fn get_workflows(&self, project_id: &str, page: PageRequest) -> Result<Page<Workflow>> {
        let page = self.page(page);
        let remote = self.store.list_workflows(project_id, &page).await?;
        Ok(Page {
            items: remote.items.iter().map(workflow_from_remote).collect(),
            total_hits: remote.total_hits,
        })
    }

    /// Replace name, description and notes; the Workflow's Rules are kept
    pub async fn update_workflow(
        &self,
        project_id: &str,
        workflow_id: i64,
        workflow: Workflow,
    ) -> Result<Workflow> {
        let existing = self.store.get_workflow(project_id, workflow_id).await?;
        let workflow = Workflow {
            id: Some(workflow_id),
            ..workflow
        };
        let updated = self
            .store
            .update_workflow(
                project_id,
                workflow_payload(&workflow, &existing.additional.sequence_entries),
            )
            .await?;
        info!(workflow_id, "updated workflow");
        Ok(workflow_from_remote(&updated))
    }

    /// Delete a Workflow that has no Rules
    ///
    /// Unlike Rule deletion this does not cascade: Rules must be removed first.
    pub async fn delete_workflow(&self, project_id: &str, workflow_id: i64) -> Result<()> {
        let existing = self.store.get_workflow(project_id, workflow_id).await?;
        if !existing.additional.sequence_entries.is_empty() {
            return Err(ProcessingError::InvalidInput(
                "Unable to Delete. There are Rules on the Workflow.".to_string(),
            ));
        }
        self.store.delete_workflow(project_id, workflow_id).await?;
        info!(workflow_id, "deleted workflow");
        Ok(())
    }
}
