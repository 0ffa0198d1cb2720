// Remote classification client
// The collaborator contract for reading and writing remote objects, plus its HTTP implementation

//! # Classification Client
//!
//! The engine never talks HTTP directly. It goes through [`ClassificationClient`],
//! a small contract with three operations:
//!
//! - `get_item`: fetch a single object (or nothing)
//! - `get_items`: fetch a page of objects with the total hit count
//! - `post_item`: create, update or delete an object
//!
//! [`HttpClassificationClient`] implements it against the real remote service;
//! `engine::memory::InMemoryClassificationStore` implements it in-process.
//!
//! ## Delete Responses
//!
//! The remote store may answer a delete with HTTP 200 and a body such as
//! `{"result": [{"error_message": "Could not find item"}]}`. Every delete
//! response must go through [`check_delete_response`] before it is treated as
//! a success.
//!
//! ## Rust Learning Notes:
//!
//! ### Default Methods on Async Traits
//! `get_item` has a default body written in terms of `get_items`, so an
//! implementation only has to provide the paged lookup.

use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::models::PageRequest;
use crate::{ProcessingError, Result};

/// The kinds of remote object this service works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Workflow,
    CollectionSequence,
    Collection,
    Condition,
    Policy,
    PolicyType,
}

impl ItemKind {
    /// Value of the `type` parameter sent with every request
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Workflow => "workflow",
            ItemKind::CollectionSequence => "collection_sequence",
            ItemKind::Collection => "collection",
            ItemKind::Condition => "condition",
            ItemKind::Policy => "policy",
            ItemKind::PolicyType => "policy_type",
        }
    }

    /// API area the kind lives under
    pub fn area(&self) -> &'static str {
        match self {
            ItemKind::Workflow => "workflow",
            ItemKind::CollectionSequence | ItemKind::Collection | ItemKind::Condition => {
                "classification"
            }
            ItemKind::Policy | ItemKind::PolicyType => "policy",
        }
    }
}

/// Mutating operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostOp {
    Create,
    Update,
    Delete,
}

impl PostOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostOp::Create => "create",
            PostOp::Update => "update",
            PostOp::Delete => "delete",
        }
    }
}

/// Which object(s) a lookup addresses
#[derive(Debug, Clone, PartialEq)]
pub enum IdSelector {
    One(i64),
    Many(Vec<i64>),
}

/// Parameters of a lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemRequest {
    pub project_id: String,
    pub id: Option<IdSelector>,
    /// Type-specific options such as `include_children` or a notes filter
    pub additional: Option<Value>,
    /// 1-based index of the first result
    pub start: Option<u32>,
    pub max_page_results: Option<u32>,
}

impl ItemRequest {
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(IdSelector::One(id));
        self
    }

    pub fn with_ids(mut self, ids: Vec<i64>) -> Self {
        self.id = Some(IdSelector::Many(ids));
        self
    }

    pub fn with_additional(mut self, additional: Value) -> Self {
        self.additional = Some(additional);
        self
    }

    pub fn with_page(mut self, page: &PageRequest) -> Self {
        self.start = Some(page.start());
        self.max_page_results = Some(page.size());
        self
    }

    /// Query string pairs; object values are JSON encoded and id lists repeat the key
    pub fn query_pairs(&self, kind: ItemKind) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("project_id".to_string(), self.project_id.clone()),
            ("type".to_string(), kind.type_name().to_string()),
        ];
        match &self.id {
            Some(IdSelector::One(id)) => pairs.push(("id".to_string(), id.to_string())),
            Some(IdSelector::Many(ids)) => {
                pairs.extend(ids.iter().map(|id| ("id".to_string(), id.to_string())))
            }
            None => {}
        }
        if let Some(additional) = &self.additional {
            pairs.push(("additional".to_string(), additional.to_string()));
        }
        if let Some(start) = self.start {
            pairs.push(("start".to_string(), start.to_string()));
        }
        if let Some(max) = self.max_page_results {
            pairs.push(("max_page_results".to_string(), max.to_string()));
        }
        pairs
    }
}

/// A page of raw remote objects
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemPage {
    #[serde(rename = "totalhits", default)]
    pub total_hits: u64,
    #[serde(rename = "results", default)]
    pub items: Vec<Value>,
}

/// Contract of the remote classification service
#[async_trait::async_trait]
pub trait ClassificationClient: Send + Sync {
    /// First object matching the request, if any
    async fn get_item(&self, kind: ItemKind, request: ItemRequest) -> Result<Option<Value>> {
        let page = self.get_items(kind, request).await?;
        Ok(page.items.into_iter().next())
    }

    /// All objects matching the request, paged when the request says so
    async fn get_items(&self, kind: ItemKind, request: ItemRequest) -> Result<ItemPage>;

    /// Create, update or delete; `payload` excludes `project_id` and `type`, which the client adds
    async fn post_item(
        &self,
        kind: ItemKind,
        op: PostOp,
        project_id: &str,
        payload: Value,
    ) -> Result<Value>;
}

/// Turn an error embedded in an HTTP 200 delete response into a failure
pub fn check_delete_response(response: &Value) -> Result<()> {
    let embedded = response
        .get("result")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(|first| first.get("error_message"))
        .filter(|message| !message.is_null());

    match embedded {
        Some(message) => Err(ProcessingError::RemoteFailure {
            status: StatusCode::OK.as_u16(),
            message: message
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| message.to_string()),
        }),
        None => Ok(()),
    }
}

/// Add `project_id` and `type` to a request body
pub(crate) fn envelope(kind: ItemKind, project_id: &str, payload: Value) -> Value {
    let mut body = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    body.insert("project_id".to_string(), Value::from(project_id));
    body.insert("type".to_string(), Value::from(kind.type_name()));
    Value::Object(body)
}

/// HTTP implementation of [`ClassificationClient`]
#[derive(Debug, Clone)]
pub struct HttpClassificationClient {
    base_url: Url,
    http: HttpClient,
}

impl HttpClassificationClient {
    /// Client rooted at `base_url`, e.g. `http://localhost:8080/corepolicy/`
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ProcessingError::Config(format!("Invalid policy API URL: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = HttpClient::builder()
            .user_agent(concat!("processing-service/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, kind: ItemKind, action: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}/{}", kind.area(), action))
            .map_err(|e| ProcessingError::Config(format!("Invalid policy API path: {}", e)))
    }

    async fn read_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;
        let parsed: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };
        if status.is_success() {
            return Ok(parsed);
        }
        let message = ["message", "reason"]
            .iter()
            .find_map(|key| parsed.get(key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| parsed.to_string());
        Err(ProcessingError::RemoteFailure {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl ClassificationClient for HttpClassificationClient {
    async fn get_items(&self, kind: ItemKind, request: ItemRequest) -> Result<ItemPage> {
        let url = self.endpoint(kind, "retrieve")?;
        debug!(kind = kind.type_name(), %url, "GET remote items");
        let response = self
            .http
            .get(url)
            .query(&request.query_pairs(kind))
            .send()
            .await?;
        let body = Self::read_response(response).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn post_item(
        &self,
        kind: ItemKind,
        op: PostOp,
        project_id: &str,
        payload: Value,
    ) -> Result<Value> {
        let url = self.endpoint(kind, op.as_str())?;
        debug!(kind = kind.type_name(), op = op.as_str(), %url, "POST remote item");
        let response = self
            .http
            .post(url)
            .json(&envelope(kind, project_id, payload))
            .send()
            .await?;
        Self::read_response(response).await
    }
}
