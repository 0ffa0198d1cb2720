// Saga step recording
// Tracks which mutating steps of a multi-object operation have completed

//! # Saga Progress
//!
//! The remote store has no multi-object transaction, so a saga that fails half
//! way cannot be rolled back. [`SagaProgress`] records each mutating step as it
//! completes. When a later step fails the error becomes
//! [`ProcessingError::DegradedState`], naming the saga and the steps that did
//! complete so an operator can retry the rest.
//!
//! A failure before any step completed (validation, or the first mutation
//! itself) is passed through unchanged: nothing was changed remotely.

use std::future::Future;

use tracing::{error, info};

use crate::{ProcessingError, Result};

#[derive(Debug, Clone)]
pub struct SagaProgress {
    saga: &'static str,
    completed: Vec<String>,
}

impl SagaProgress {
    pub fn start(saga: &'static str) -> Self {
        info!(saga, "saga started");
        Self {
            saga,
            completed: Vec::new(),
        }
    }

    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    /// Record a mutating step as done
    pub fn done(&mut self, step: impl Into<String>) {
        let step = step.into();
        info!(saga = self.saga, step = %step, "saga step completed");
        self.completed.push(step);
    }

    /// Await one mutating step, recording it on success
    pub async fn step<T, F>(&mut self, step: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match operation.await {
            Ok(value) => {
                self.done(step);
                Ok(value)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Check a non-mutating result inside the saga
    pub fn check<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.fail(e))
    }

    /// Classify a failure against the steps completed so far
    ///
    /// A `DegradedState` from a nested saga is flattened into this one, with
    /// its steps prefixed by the nested saga's name.
    pub fn fail(&self, source: ProcessingError) -> ProcessingError {
        let (mut completed, source) = match source {
            ProcessingError::DegradedState {
                saga,
                completed: nested,
                source,
            } => {
                let mut steps = self.completed.clone();
                steps.extend(nested.into_iter().map(|step| format!("{}: {}", saga, step)));
                (steps, source)
            }
            other if self.completed.is_empty() => return other,
            other => (self.completed.clone(), Box::new(other)),
        };
        completed.dedup();
        error!(
            saga = self.saga,
            completed = ?completed,
            error = %source,
            "saga stopped part way; remote objects are in a degraded state"
        );
        ProcessingError::DegradedState {
            saga: self.saga.to_string(),
            completed,
            source,
        }
    }

    pub fn finish(self) {
        info!(saga = self.saga, steps = self.completed.len(), "saga finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_error() -> ProcessingError {
        ProcessingError::RemoteFailure {
            status: 500,
            message: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failure_before_any_step_passes_through() {
        let mut progress = SagaProgress::start("CreateRule");
        let result: Result<()> = progress.step("create sequence", async { Err(remote_error()) }).await;
        assert!(matches!(result, Err(ProcessingError::RemoteFailure { .. })));
    }

    #[tokio::test]
    async fn test_failure_after_a_step_is_degraded() {
        let mut progress = SagaProgress::start("CreateRule");
        progress.step("create sequence", async { Ok(()) }).await.unwrap();
        let result: Result<()> = progress.step("update workflow", async { Err(remote_error()) }).await;
        match result {
            Err(ProcessingError::DegradedState { saga, completed, source }) => {
                assert_eq!(saga, "CreateRule");
                assert_eq!(completed, vec!["create sequence".to_string()]);
                assert!(matches!(*source, ProcessingError::RemoteFailure { status: 500, .. }));
            }
            other => panic!("expected DegradedState, got {:?}", other),
        }
    }

    #[test]
    fn test_check_after_steps_is_degraded() {
        let mut progress = SagaProgress::start("CreateAction");
        tokio_test::block_on(progress.step("create policy", async { Ok(7) })).unwrap();
        assert_eq!(progress.completed(), ["create policy".to_string()]);

        let checked: Result<()> = progress.check(Err(ProcessingError::NotFound("type".to_string())));
        assert!(matches!(checked, Err(ProcessingError::DegradedState { .. })));
    }

    #[test]
    fn test_nested_degraded_state_is_flattened() {
        let mut progress = SagaProgress::start("DeleteRule");
        progress.done("delete action 4");
        let nested = ProcessingError::DegradedState {
            saga: "DeleteAction".to_string(),
            completed: vec!["remove entry".to_string()],
            source: Box::new(remote_error()),
        };
        match progress.fail(nested) {
            ProcessingError::DegradedState { saga, completed, .. } => {
                assert_eq!(saga, "DeleteRule");
                assert_eq!(
                    completed,
                    vec!["delete action 4".to_string(), "DeleteAction: remove entry".to_string()]
                );
            }
            other => panic!("expected DegradedState, got {:?}", other),
        }
    }
}
