// Core domain models for the processing service
// Pure data structures and algorithms, no I/O

//! # Domain Models Module
//!
//! - `condition`: the condition tree engine
//! - `remote`: typed views of the remote classification store's objects
//! - `processing`: the simplified shapes exposed to callers
//! - `sequence`: order arithmetic over sequence entries
//!
//! Nothing in this module persists anything; the engine layer does that.

pub mod condition;
pub mod processing;
pub mod remote;
pub mod sequence;

pub use condition::{Condition, ConditionKind, ConditionMarker};
pub use processing::{Action, ActionType, Page, PageRequest, Rule, Workflow};
pub use remote::{
    Collection, CollectionEntry, CollectionSequence, Policy, PolicyType, RemoteWorkflow,
    SequenceEntry, UpdateBehaviour,
};
pub use sequence::OrderedEntry;
