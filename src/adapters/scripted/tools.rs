//! Scripted external tools.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::ports::{ExternalTools, PortError, ToolCall, ToolFuture, ToolResult};

#[derive(Default)]
struct ToolState {
    results: BTreeMap<String, ToolResult>,
    calls: Vec<ToolCall>,
}

/// Returns a preset result per tool name; unknown tools are errors.
#[derive(Clone, Default)]
pub struct ScriptedTools {
    state: Arc<Mutex<ToolState>>,
}

impl ScriptedTools {
    /// Creates a registry with no tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool's result.
    #[must_use]
    pub fn with_tool(self, name: &str, result: ToolResult) -> Self {
        lock(&self.state).results.insert(name.to_string(), result);
        self
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ToolCall> {
        lock(&self.state).calls.clone()
    }
}

impl ExternalTools for ScriptedTools {
    fn invoke(&self, call: &ToolCall) -> ToolFuture<'_> {
        let result = {
            let mut state = lock(&self.state);
            state.calls.push(call.clone());
            state.results.get(&call.tool).cloned()
        };
        let tool = call.tool.clone();
        Box::pin(async move {
            result.ok_or_else(|| -> PortError { format!("unknown tool `{tool}`").into() })
        })
    }
}
