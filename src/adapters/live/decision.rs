//! Live decision resolver fed from `--decisions`.

use serde_json::{Map, Value};

use crate::ports::{DecisionFuture, DecisionRequest, DecisionResolver, PortError};

/// Answers decisions from a JSON object keyed by step id.
pub struct PresetDecisions {
    decisions: Map<String, Value>,
}

impl PresetDecisions {
    /// Creates a resolver over the given step id → decision map.
    #[must_use]
    pub fn new(decisions: Map<String, Value>) -> Self {
        Self { decisions }
    }
}

impl DecisionResolver for PresetDecisions {
    fn decide(&self, request: &DecisionRequest) -> DecisionFuture<'_> {
        let found = self.decisions.get(&request.step_id).cloned();
        let step = request.step_id.clone();
        Box::pin(async move {
            found.ok_or_else(|| -> PortError {
                format!("no decision supplied for step `{step}` (pass --decisions)").into()
            })
        })
    }
}
