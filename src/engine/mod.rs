// Processing Engine
// Remote client, caches, translation, validation and the per-entity sagas

//! # Processing Engine Module
//!
//! The engine is the layer between the pure domain models and the remote
//! classification store. Data flows top-down on write and bottom-up on read:
//!
//! ```text
//! write: saga -> sequencing / translator -> RemoteStore -> ClassificationClient
//! read:  ClassificationClient -> RemoteStore -> translator / condition tree -> caller
//! ```
//!
//! ## Engine Components
//!
//! ### Remote Client (`client`, `memory`)
//! - `ClassificationClient` is the collaborator contract (get item, get items, post item)
//! - `HttpClassificationClient` talks to the real service
//! - `InMemoryClassificationStore` stands in for it in tests and offline runs
//!
//! ### Remote Store (`store`, `cache`)
//! - Typed gateway over the client
//! - Read-through Policy / PolicyType caches behind an injectable `CachePort`
//!
//! ### Translator (`translator`)
//! - Pure mapping between remote objects and processing shapes
//!
//! ### Validation (`validation`)
//! - Workflow -> Rule -> Action -> Condition existence checks returning contexts
//!
//! ### Sagas (`saga`, `workflows`, `rules`, `actions`, `conditions`, `action_types`)
//! - `create / get / get_many / update / delete` per entity, as `impl ProcessingEngine` blocks
//! - Multi-step operations record their progress and fail with `DegradedState`
//!
//! ## Rust Learning Notes:
//!
//! ### Splitting `impl` Blocks Across Files
//! A type can have any number of `impl` blocks, in any module of the same
//! crate. Each entity file adds its own operations to `ProcessingEngine`, which
//! keeps every file focused on one entity.

/// Remote classification client contract and HTTP implementation
pub mod client;

/// In-process implementation of the client contract
pub mod memory;

/// Cache port with TTL and no-op implementations
pub mod cache;

/// Typed gateway over the client, owner of the caches
pub mod store;

/// Pure remote <-> processing mapping
pub mod translator;

/// Existence checks and the contexts they return
pub mod validation;

/// Saga step recording and `DegradedState` classification
pub mod saga;

pub mod workflows;
pub mod rules;
pub mod actions;
pub mod conditions;
pub mod action_types;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::config::ProcessingConfig;
use crate::models::processing::DEFAULT_PAGE_SIZE;
use crate::models::PageRequest;
use crate::Result;

pub use cache::{CachePort, NoCache, TtlCache};
pub use client::{ClassificationClient, HttpClassificationClient, ItemKind, PostOp};
pub use memory::InMemoryClassificationStore;
pub use saga::SagaProgress;
pub use store::RemoteStore;
pub use validation::{ActionContext, ConditionContext, RuleContext};

/// Entry point for every processing-domain operation
///
/// Cheap to clone; clones share the client and the caches.
#[derive(Clone)]
pub struct ProcessingEngine {
    pub(crate) store: RemoteStore,
    default_page_size: u32,
}

impl ProcessingEngine {
    /// Engine over `client` with default-lifetime caches
    pub fn new(client: Arc<dyn ClassificationClient>) -> Self {
        Self::with_store(RemoteStore::new(client))
    }

    pub fn with_store(store: RemoteStore) -> Self {
        Self {
            store,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Engine talking HTTP to the policy API described by `config`
    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        let client = HttpClassificationClient::new(&config.policy_api.base_url())?;
        Ok(Self::with_store(RemoteStore::with_cache_seconds(
            Arc::new(client),
            config.cache.duration_seconds,
        ))
        .with_default_page_size(config.paging.default_page_size))
    }

    pub fn with_default_page_size(mut self, size: u32) -> Self {
        if size > 0 {
            self.default_page_size = size;
        }
        self
    }

    pub fn store(&self) -> &RemoteStore {
        &self.store
    }

    /// Fill in the configured page size when the caller gave none
    pub(crate) fn page(&self, request: PageRequest) -> PageRequest {
        PageRequest {
            page: request.page,
            size: Some(request.size.filter(|size| *size > 0).unwrap_or(self.default_page_size)),
        }
    }
}
