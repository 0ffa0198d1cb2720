// Processing Service - Rust Edition
// Rule-processing domain (Workflows, Rules, Actions, Conditions) over a remote classification store

//! # Processing Service Library
//!
//! This is the library root for the processing service. It exposes a simplified
//! rule-processing domain on top of a remote classification service whose own
//! object model is richer and shaped differently.
//!
//! | Processing domain | Remote classification store          |
//! |-------------------|--------------------------------------|
//! | Workflow          | Workflow                             |
//! | Rule              | Collection Sequence                  |
//! | Action            | Collection + Policy                  |
//! | ActionType        | Policy Type                          |
//! | Condition         | Condition                            |
//!
//! ## Core Components
//!
//! ### Domain Models (`models`)
//! Pure data and pure algorithms. Nothing in here performs I/O.
//! - [`Condition`]: typed condition tree with search and tagging operations
//! - [`Workflow`], [`Rule`], [`Action`], [`ActionType`]: processing-domain shapes
//! - [`OrderedEntry`]: order arithmetic over sequence entries
//!
//! ### Engine (`engine`)
//! Everything that talks to the remote store.
//! - [`ClassificationClient`]: the remote collaborator contract
//! - [`RemoteStore`]: typed gateway with Policy / PolicyType caches
//! - [`ProcessingEngine`]: per-entity operations and the multi-step sagas
//!
//! **Usage Example:**
//! ```rust,no_run
//! use std::sync::Arc;
//! use processing_service::{InMemoryClassificationStore, ProcessingEngine, Workflow};
//!
//! # async fn demo() -> processing_service::Result<()> {
//! let engine = ProcessingEngine::new(Arc::new(InMemoryClassificationStore::new()));
//! let workflow = engine
//!     .create_workflow("project-1", Workflow::new("Ingestion"))
//!     .await?;
//! println!("created workflow {:?}", workflow.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Rust Learning Notes:
//!
//! ### Re-exports
//! `pub use` statements create shortcuts so users don't need to know the internal
//! module structure. Instead of `use processing_service::models::condition::Condition`,
//! users can write `use processing_service::Condition`.

// Core domain models (no I/O)
pub mod models;

// Remote store client, caches, translator, validation and sagas
pub mod engine;

// Layered configuration (file + environment)
pub mod config;

// Re-export core domain types for easy access
pub use models::{
    condition::{tag_types, Condition, ConditionKind, ConditionMarker},
    processing::{Action, ActionType, Page, PageRequest, Rule, Workflow},
    remote::{
        Collection, CollectionEntry, CollectionSequence, Policy, PolicyType, RemoteWorkflow,
        SequenceEntry, UpdateBehaviour,
    },
    sequence::OrderedEntry,
};

// Re-export engine types for convenience
pub use engine::{
    cache::{CachePort, NoCache, TtlCache},
    client::{ClassificationClient, HttpClassificationClient, ItemKind, ItemPage, ItemRequest, PostOp},
    memory::InMemoryClassificationStore,
    store::RemoteStore,
    ProcessingEngine,
};

pub use config::ProcessingConfig;

use thiserror::Error;

/// Error kinds raised by the processing service
///
/// ## Rust Learning Notes:
///
/// ### Boxed Recursive Errors
/// `DegradedState` wraps the error that interrupted a saga. The inner error is
/// boxed because an enum cannot contain itself by value.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// An entity, condition or workflow-rule association is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// A remote object is missing a property it must have (corrupt state, not user error)
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// A condition carried a type this service does not understand
    #[error("Unrecognized condition type: {0}")]
    UnrecognizedVariant(String),

    /// The remote store answered with an error, possibly inside an HTTP 200 body
    #[error("Remote failure (status {status}): {message}")]
    RemoteFailure { status: u16, message: String },

    /// A multi-step saga stopped part way through
    ///
    /// `completed` lists the mutating steps that did take effect, in order,
    /// so the remaining steps can be retried.
    #[error("{saga} stopped after [{}]: {source}", .completed.join(", "))]
    DegradedState {
        saga: String,
        completed: Vec<String>,
        source: Box<ProcessingError>,
    },

    /// Caller supplied input that was rejected locally
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport failure before any HTTP status was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProcessingError {
    /// True for `NotFound`, including one that interrupted a saga
    pub fn is_not_found(&self) -> bool {
        match self {
            ProcessingError::NotFound(_) => true,
            ProcessingError::DegradedState { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<::config::ConfigError> for ProcessingError {
    fn from(err: ::config::ConfigError) -> Self {
        ProcessingError::Config(err.to_string())
    }
}

/// Type alias for Results that use the service error type
pub type Result<T> = std::result::Result<T, ProcessingError>;
