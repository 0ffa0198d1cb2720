// ActionType operations
// ActionTypes map one-to-one onto remote Policy Types

use tracing::info;

use super::translator::{action_type_from_policy_type, policy_type_payload};
use super::ProcessingEngine;
use crate::models::{ActionType, Page, PageRequest};
use crate::Result;

impl ProcessingEngine {
    pub async fn create_action_type(&self, project_id: &str, action_type: ActionType) -> Result<ActionType> {
        let action_type = ActionType { id: None, ..action_type };
        let created = self
            .store
            .create_policy_type(project_id, policy_type_payload(&action_type))
            .await?;
        info!(action_type_id = created.id, "created action type");
        Ok(action_type_from_policy_type(&created))
    }

    pub async fn get_action_type(&self, project_id: &str, action_type_id: i64) -> Result<ActionType> {
        let policy_type = self.store.get_policy_type(project_id, action_type_id).await?;
        Ok(action_type_from_policy_type(&policy_type))
    }

    pub async fn get_action_types(&self, project_id: &str, page: PageRequest) -> Result<Page<ActionType>> {
        let page = self.page(page);
        let remote = self.store.list_policy_types(project_id, &page).await?;
        Ok(Page {
            items: remote.items.iter().map(action_type_from_policy_type).collect(),
            total_hits: remote.total_hits,
        })
    }

    pub async fn update_action_type(
        &self,
        project_id: &str,
        action_type_id: i64,
        action_type: ActionType,
    ) -> Result<ActionType> {
        self.store.get_policy_type(project_id, action_type_id).await?;
        let action_type = ActionType {
            id: Some(action_type_id),
            ..action_type
        };
        let updated = self
            .store
            .update_policy_type(project_id, policy_type_payload(&action_type))
            .await?;
        info!(action_type_id, "updated action type");
        Ok(action_type_from_policy_type(&updated))
    }

    pub async fn delete_action_type(&self, project_id: &str, action_type_id: i64) -> Result<()> {
        self.store.get_policy_type(project_id, action_type_id).await?;
        self.store.delete_policy_type(project_id, action_type_id).await?;
        info!(action_type_id, "deleted action type");
        Ok(())
    }
}
