// Processing-domain models
// The simplified shapes callers of this service work with

//! # Processing Domain Models
//!
//! These are the shapes exposed to callers. Each one is backed by one or more
//! remote objects (see [`super::remote`]); the mapping lives in
//! `engine::translator`.
//!
//! Ids are `Option<i64>` because they are assigned by the remote store: a value
//! built by a caller for a create has no id yet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Ordered container of Rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Workflow {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            description: None,
            notes: None,
        }
    }
}

/// Evaluation unit with a priority, backed by a Collection Sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    /// The order of this Rule's entry on its Workflow
    #[serde(default)]
    pub priority: Option<i64>,
}

impl Rule {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            description: None,
            enabled: true,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Effect attached to a Rule, backed by a Collection + Policy pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Position within the Rule's entry list
    #[serde(default)]
    pub order: Option<i64>,
    /// Opaque key/value payload handed to the ActionType
    #[serde(default)]
    pub settings: Value,
    pub type_id: i64,
    /// Denormalized from the ActionType
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_internal_name: Option<String>,
}

impl Action {
    pub fn new(name: &str, type_id: i64, settings: Value) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            description: None,
            order: None,
            settings,
            type_id,
            type_internal_name: None,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// Kind of Action, backed by a Policy Type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub internal_name: String,
    /// JSON schema of the settings an Action of this type accepts
    #[serde(default)]
    pub definition: Value,
}

/// Page number and size as requested by a caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
        }
    }

    /// Page size, falling back to the default for absent or zero sizes
    pub fn size(&self) -> u32 {
        match self.size {
            Some(size) if size > 0 => size,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    /// 1-based index of the first item on this page, saturating at `u32::MAX`
    pub fn start(&self) -> u32 {
        match self.page {
            Some(page) if page > 1 => (page - 1).saturating_mul(self.size()).saturating_add(1),
            _ => 1,
        }
    }

    /// Cut this page out of an in-memory list
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let first = (self.start() - 1) as usize;
        items
            .iter()
            .skip(first)
            .take(self.size() as usize)
            .cloned()
            .collect()
    }
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_hits: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_hits: 0,
        }
    }

    /// Page over an in-memory list; `total_hits` counts the whole list
    pub fn from_slice(items: &[T], request: &PageRequest) -> Self
    where
        T: Clone,
    {
        Self {
            items: request.slice(items),
            total_hits: items.len() as u64,
        }
    }
}
