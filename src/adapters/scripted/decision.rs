//! Scripted decision resolver.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use super::lock;
use crate::ports::{DecisionFuture, DecisionRequest, DecisionResolver, PortError};

#[derive(Default)]
struct DecisionState {
    answers: BTreeMap<String, Value>,
    delay: Option<Duration>,
    requests: Vec<DecisionRequest>,
}

/// Returns preset decisions per step id, optionally after a delay.
#[derive(Clone, Default)]
pub struct ScriptedDecisions {
    state: Arc<Mutex<DecisionState>>,
}

impl ScriptedDecisions {
    /// Creates a resolver with no decisions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the decision for a step.
    #[must_use]
    pub fn answer(self, step_id: &str, value: Value) -> Self {
        lock(&self.state).answers.insert(step_id.to_string(), value);
        self
    }

    /// Waits this long before answering.
    #[must_use]
    pub fn delayed(self, delay: Duration) -> Self {
        lock(&self.state).delay = Some(delay);
        self
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<DecisionRequest> {
        lock(&self.state).requests.clone()
    }
}

impl DecisionResolver for ScriptedDecisions {
    fn decide(&self, request: &DecisionRequest) -> DecisionFuture<'_> {
        let (answer, delay) = {
            let mut state = lock(&self.state);
            state.requests.push(request.clone());
            (state.answers.get(&request.step_id).cloned(), state.delay)
        };
        let step = request.step_id.clone();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            answer.ok_or_else(|| -> PortError { format!("no decision for `{step}`").into() })
        })
    }
}
