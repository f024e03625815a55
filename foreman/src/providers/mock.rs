//! Scripted model for tests and offline runs.
//!
//! [`MockModel`] replays a queue of canned outcomes and records every
//! request it receives, so callers can assert on call counts and on the
//! exact message lists sent to the model.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;

use super::{Model, ModelRequest, ModelResponse};
use crate::error::LlmError;

type Outcome = Result<ModelResponse, LlmError>;

/// A model that answers from a script.
#[derive(Debug, Default)]
pub struct MockModel {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Option<Outcome>,
    requests: Mutex<Vec<(Instant, ModelRequest)>>,
}

impl MockModel {
    /// Create a model with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model that replays the given outcomes in order.
    #[must_use]
    pub fn scripted(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Create a model that returns the same outcome forever.
    #[must_use]
    pub fn repeating(outcome: Outcome) -> Self {
        Self {
            fallback: Some(outcome),
            ..Self::default()
        }
    }

    /// Queue one more outcome.
    pub fn push(&self, outcome: Outcome) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// All requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Instants at which each call arrived.
    #[must_use]
    pub fn call_instants(&self) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate(&self, request: &ModelRequest) -> Outcome {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Instant::now(), request.clone()));

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(outcome) => outcome,
            None => self
                .fallback
                .clone()
                .unwrap_or_else(|| Err(LlmError::internal("mock script exhausted"))),
        }
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}
