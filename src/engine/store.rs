// Typed gateway over the remote classification client
// Decodes remote objects, applies lookup caches and checks delete responses

//! # Remote Store
//!
//! [`RemoteStore`] is the only part of the engine that calls the
//! [`ClassificationClient`] directly. It turns raw JSON into the typed shapes of
//! `models::remote` and owns the cross-cutting rules of the remote service:
//!
//! - a lookup that finds nothing is `NotFound`
//! - a 400 answer to a single-item lookup of a Collection Sequence, Collection
//!   or Policy Type means the id is unknown, so it is also `NotFound`
//! - every delete response is inspected with [`check_delete_response`]
//! - Policies and Policy Types go through read-through caches
//!
//! ## Rust Learning Notes:
//!
//! ### Trait Objects in Arcs
//! The client and both caches are `Arc<dyn Trait>` so tests can hand in the
//! in-memory store and a `NoCache`, while production code uses HTTP and
//! `TtlCache`, with no generic parameters leaking into `ProcessingEngine`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::cache::{CachePort, TtlCache};
use super::client::{check_delete_response, ClassificationClient, ItemKind, ItemRequest, PostOp};
use crate::models::{
    Collection, CollectionSequence, Condition, Page, PageRequest, Policy, PolicyType,
    RemoteWorkflow,
};
use crate::{ProcessingError, Result};

/// Default lifetime of cached Policies and Policy Types
pub const DEFAULT_CACHE_SECONDS: i64 = 600;

const MISSING_IDS_MESSAGE: &str = "Could not return items for all ids";

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn not_found(kind: ItemKind, id: i64) -> ProcessingError {
    ProcessingError::NotFound(format!("Could not find {} with id {}", kind.type_name(), id))
}

/// Reclassify the remote service's ways of saying "no such id"
fn lookup_failure(kind: ItemKind, id: i64, error: ProcessingError) -> ProcessingError {
    match error {
        ProcessingError::RemoteFailure { status: 400, .. }
            if matches!(
                kind,
                ItemKind::CollectionSequence | ItemKind::Collection | ItemKind::PolicyType
            ) =>
        {
            not_found(kind, id)
        }
        ProcessingError::RemoteFailure { ref message, .. } if message.contains(MISSING_IDS_MESSAGE) => {
            ProcessingError::NotFound(format!("{}: {}", kind.type_name(), message))
        }
        other => other,
    }
}

/// Typed access to remote objects
#[derive(Clone)]
pub struct RemoteStore {
    client: Arc<dyn ClassificationClient>,
    policies: Arc<dyn CachePort<Policy>>,
    policy_types: Arc<dyn CachePort<PolicyType>>,
}

impl RemoteStore {
    /// Store with time-expiring caches of the default lifetime
    pub fn new(client: Arc<dyn ClassificationClient>) -> Self {
        Self::with_cache_seconds(client, DEFAULT_CACHE_SECONDS)
    }

    pub fn with_cache_seconds(client: Arc<dyn ClassificationClient>, seconds: i64) -> Self {
        Self::with_caches(
            client,
            Arc::new(TtlCache::with_seconds(seconds)),
            Arc::new(TtlCache::with_seconds(seconds)),
        )
    }

    pub fn with_caches(
        client: Arc<dyn ClassificationClient>,
        policies: Arc<dyn CachePort<Policy>>,
        policy_types: Arc<dyn CachePort<PolicyType>>,
    ) -> Self {
        Self {
            client,
            policies,
            policy_types,
        }
    }

    // ---- generic plumbing ----

    async fn fetch<T: DeserializeOwned>(
        &self,
        kind: ItemKind,
        id: i64,
        request: ItemRequest,
    ) -> Result<T> {
        debug!(kind = kind.type_name(), id, "fetching remote item");
        let item = self
            .client
            .get_item(kind, request.with_id(id))
            .await
            .map_err(|e| lookup_failure(kind, id, e))?;
        match item {
            Some(value) => decode(value),
            None => Err(not_found(kind, id)),
        }
    }

    async fn fetch_many<T: DeserializeOwned>(
        &self,
        kind: ItemKind,
        project_id: &str,
        ids: Vec<i64>,
    ) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(kind = kind.type_name(), count = ids.len(), "fetching remote items by id");
        let page = self
            .client
            .get_items(kind, ItemRequest::new(project_id).with_ids(ids))
            .await
            .map_err(|e| match e {
                ProcessingError::RemoteFailure { ref message, .. }
                    if message.contains(MISSING_IDS_MESSAGE) =>
                {
                    ProcessingError::NotFound(format!("{}: {}", kind.type_name(), message))
                }
                other => other,
            })?;
        page.items.into_iter().map(decode).collect()
    }

    async fn list<T: DeserializeOwned>(
        &self,
        kind: ItemKind,
        project_id: &str,
        page: &PageRequest,
    ) -> Result<Page<T>> {
        debug!(kind = kind.type_name(), start = page.start(), size = page.size(), "listing remote items");
        let result = self
            .client
            .get_items(kind, ItemRequest::new(project_id).with_page(page))
            .await?;
        Ok(Page {
            items: result
                .items
                .into_iter()
                .map(decode)
                .collect::<Result<Vec<T>>>()?,
            total_hits: result.total_hits,
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        kind: ItemKind,
        op: PostOp,
        project_id: &str,
        payload: Value,
    ) -> Result<T> {
        debug!(kind = kind.type_name(), op = op.as_str(), "posting remote item");
        let response = self.client.post_item(kind, op, project_id, payload).await?;
        decode(response)
    }

    async fn delete(&self, kind: ItemKind, project_id: &str, id: i64) -> Result<()> {
        debug!(kind = kind.type_name(), id, "deleting remote item");
        let response = self
            .client
            .post_item(kind, PostOp::Delete, project_id, json!({ "id": id }))
            .await?;
        check_delete_response(&response)
    }

    // ---- workflows ----

    pub async fn get_workflow(&self, project_id: &str, id: i64) -> Result<RemoteWorkflow> {
        self.fetch(ItemKind::Workflow, id, ItemRequest::new(project_id))
            .await
    }

    pub async fn list_workflows(
        &self,
        project_id: &str,
        page: &PageRequest,
    ) -> Result<Page<RemoteWorkflow>> {
        self.list(ItemKind::Workflow, project_id, page).await
    }

    pub async fn create_workflow(&self, project_id: &str, payload: Value) -> Result<RemoteWorkflow> {
        self.post(ItemKind::Workflow, PostOp::Create, project_id, payload)
            .await
    }

    pub async fn update_workflow(&self, project_id: &str, payload: Value) -> Result<RemoteWorkflow> {
        self.post(ItemKind::Workflow, PostOp::Update, project_id, payload)
            .await
    }

    pub async fn delete_workflow(&self, project_id: &str, id: i64) -> Result<()> {
        self.delete(ItemKind::Workflow, project_id, id).await
    }

    // ---- collection sequences ----

    /// A Collection Sequence; `with_details` includes its entries' conditions and Rule root
    pub async fn get_sequence(
        &self,
        project_id: &str,
        id: i64,
        with_details: bool,
    ) -> Result<CollectionSequence> {
        let mut request = ItemRequest::new(project_id);
        if with_details {
            request = request.with_additional(json!({ "include_children": true }));
        }
        self.fetch(ItemKind::CollectionSequence, id, request).await
    }

    pub async fn create_sequence(
        &self,
        project_id: &str,
        payload: Value,
    ) -> Result<CollectionSequence> {
        self.post(ItemKind::CollectionSequence, PostOp::Create, project_id, payload)
            .await
    }

    pub async fn update_sequence(
        &self,
        project_id: &str,
        payload: Value,
    ) -> Result<CollectionSequence> {
        self.post(ItemKind::CollectionSequence, PostOp::Update, project_id, payload)
            .await
    }

    pub async fn delete_sequence(&self, project_id: &str, id: i64) -> Result<()> {
        self.delete(ItemKind::CollectionSequence, project_id, id)
            .await
    }

    // ---- collections ----

    /// A Collection; `with_condition` includes its full root condition tree
    pub async fn get_collection(
        &self,
        project_id: &str,
        id: i64,
        with_condition: bool,
    ) -> Result<Collection> {
        let mut request = ItemRequest::new(project_id);
        if with_condition {
            request = request
                .with_additional(json!({ "include_condition": true, "include_children": true }));
        }
        self.fetch(ItemKind::Collection, id, request).await
    }

    pub async fn get_collections(&self, project_id: &str, ids: Vec<i64>) -> Result<Vec<Collection>> {
        self.fetch_many(ItemKind::Collection, project_id, ids).await
    }

    pub async fn create_collection(&self, project_id: &str, payload: Value) -> Result<Collection> {
        self.post(ItemKind::Collection, PostOp::Create, project_id, payload)
            .await
    }

    pub async fn update_collection(&self, project_id: &str, payload: Value) -> Result<Collection> {
        self.post(ItemKind::Collection, PostOp::Update, project_id, payload)
            .await
    }

    pub async fn delete_collection(&self, project_id: &str, id: i64) -> Result<()> {
        self.delete(ItemKind::Collection, project_id, id).await
    }

    // ---- conditions ----

    /// A condition with its full subtree
    pub async fn get_condition(&self, project_id: &str, id: i64) -> Result<Condition> {
        let value: Value = self
            .fetch(
                ItemKind::Condition,
                id,
                ItemRequest::new(project_id).with_additional(json!({ "include_children": true })),
            )
            .await?;
        Condition::from_value(&value)
    }

    /// First condition whose notes equal `notes`, with its full subtree
    pub async fn find_condition_by_notes(
        &self,
        project_id: &str,
        notes: &str,
    ) -> Result<Option<Condition>> {
        debug!(notes, "looking up condition by notes");
        let request = ItemRequest::new(project_id).with_additional(json!({
            "include_children": true,
            "filter": { "notes": notes },
        }));
        match self.client.get_item(ItemKind::Condition, request).await? {
            Some(value) => Condition::from_value(&value).map(Some),
            None => Ok(None),
        }
    }

    pub async fn create_condition(&self, project_id: &str, payload: Value) -> Result<Condition> {
        let value: Value = self
            .post(ItemKind::Condition, PostOp::Create, project_id, payload)
            .await?;
        Condition::from_value(&value)
    }

    pub async fn update_condition(&self, project_id: &str, payload: Value) -> Result<Condition> {
        let value: Value = self
            .post(ItemKind::Condition, PostOp::Update, project_id, payload)
            .await?;
        Condition::from_value(&value)
    }

    pub async fn delete_condition(&self, project_id: &str, id: i64) -> Result<()> {
        self.delete(ItemKind::Condition, project_id, id).await
    }

    // ---- policies ----

    pub async fn get_policy(&self, project_id: &str, id: i64) -> Result<Policy> {
        if let Some(policy) = self.policies.get(project_id, id) {
            debug!(id, "policy cache hit");
            return Ok(policy);
        }
        let policy: Policy = self
            .fetch(ItemKind::Policy, id, ItemRequest::new(project_id))
            .await?;
        self.policies.set(project_id, id, policy.clone());
        Ok(policy)
    }

    /// Policies in the order of `ids`; cached ones are not fetched again
    pub async fn get_policies(&self, project_id: &str, ids: &[i64]) -> Result<Vec<Policy>> {
        let mut found: HashMap<i64, Policy> = HashMap::new();
        let mut missing = Vec::new();
        for id in ids {
            if found.contains_key(id) || missing.contains(id) {
                continue;
            }
            match self.policies.get(project_id, *id) {
                Some(policy) => {
                    found.insert(*id, policy);
                }
                None => missing.push(*id),
            }
        }
        let fetched: Vec<Policy> = self
            .fetch_many(ItemKind::Policy, project_id, missing)
            .await?;
        for policy in fetched {
            self.policies.set(project_id, policy.id, policy.clone());
            found.insert(policy.id, policy);
        }
        ids.iter()
            .map(|id| {
                found
                    .get(id)
                    .cloned()
                    .ok_or_else(|| not_found(ItemKind::Policy, *id))
            })
            .collect()
    }

    pub async fn create_policy(&self, project_id: &str, payload: Value) -> Result<Policy> {
        let policy: Policy = self
            .post(ItemKind::Policy, PostOp::Create, project_id, payload)
            .await?;
        self.policies.set(project_id, policy.id, policy.clone());
        Ok(policy)
    }

    pub async fn update_policy(&self, project_id: &str, payload: Value) -> Result<Policy> {
        let policy: Policy = self
            .post(ItemKind::Policy, PostOp::Update, project_id, payload)
            .await?;
        self.policies.set(project_id, policy.id, policy.clone());
        Ok(policy)
    }

    pub async fn delete_policy(&self, project_id: &str, id: i64) -> Result<()> {
        self.policies.invalidate(project_id, id);
        self.delete(ItemKind::Policy, project_id, id).await
    }

    // ---- policy types ----

    pub async fn get_policy_type(&self, project_id: &str, id: i64) -> Result<PolicyType> {
        if let Some(policy_type) = self.policy_types.get(project_id, id) {
            debug!(id, "policy type cache hit");
            return Ok(policy_type);
        }
        let policy_type: PolicyType = self
            .fetch(ItemKind::PolicyType, id, ItemRequest::new(project_id))
            .await?;
        self.policy_types.set(project_id, id, policy_type.clone());
        Ok(policy_type)
    }

    /// Policy Types in the order of `ids`; cached ones are not fetched again
    pub async fn get_policy_types(&self, project_id: &str, ids: &[i64]) -> Result<Vec<PolicyType>> {
        let mut found: HashMap<i64, PolicyType> = HashMap::new();
        let mut missing = Vec::new();
        for id in ids {
            if found.contains_key(id) || missing.contains(id) {
                continue;
            }
            match self.policy_types.get(project_id, *id) {
                Some(policy_type) => {
                    found.insert(*id, policy_type);
                }
                None => missing.push(*id),
            }
        }
        let fetched: Vec<PolicyType> = self
            .fetch_many(ItemKind::PolicyType, project_id, missing)
            .await?;
        for policy_type in fetched {
            self.policy_types
                .set(project_id, policy_type.id, policy_type.clone());
            found.insert(policy_type.id, policy_type);
        }
        ids.iter()
            .map(|id| {
                found
                    .get(id)
                    .cloned()
                    .ok_or_else(|| not_found(ItemKind::PolicyType, *id))
            })
            .collect()
    }

    pub async fn list_policy_types(
        &self,
        project_id: &str,
        page: &PageRequest,
    ) -> Result<Page<PolicyType>> {
        self.list(ItemKind::PolicyType, project_id, page).await
    }

    pub async fn create_policy_type(&self, project_id: &str, payload: Value) -> Result<PolicyType> {
        let policy_type: PolicyType = self
            .post(ItemKind::PolicyType, PostOp::Create, project_id, payload)
            .await?;
        self.policy_types
            .set(project_id, policy_type.id, policy_type.clone());
        Ok(policy_type)
    }

    pub async fn update_policy_type(&self, project_id: &str, payload: Value) -> Result<PolicyType> {
        let policy_type: PolicyType = self
            .post(ItemKind::PolicyType, PostOp::Update, project_id, payload)
            .await?;
        self.policy_types
            .set(project_id, policy_type.id, policy_type.clone());
        Ok(policy_type)
    }

    pub async fn delete_policy_type(&self, project_id: &str, id: i64) -> Result<()> {
        self.policy_types.invalidate(project_id, id);
        self.delete(ItemKind::PolicyType, project_id, id).await
    }
}
