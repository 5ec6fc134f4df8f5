//! Scripted environment.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::ports::Environment;

#[derive(Default)]
struct EnvState {
    vars: BTreeMap<String, String>,
    executables: BTreeSet<String>,
    lookups: Vec<String>,
}

/// Environment with declared variables and executables.
#[derive(Clone, Default)]
pub struct ScriptedEnvironment {
    state: Arc<Mutex<EnvState>>,
}

impl ScriptedEnvironment {
    /// Creates an empty environment: no variables, nothing on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable.
    #[must_use]
    pub fn with_var(self, name: &str, value: &str) -> Self {
        lock(&self.state).vars.insert(name.to_string(), value.to_string());
        self
    }

    /// Makes an executable discoverable.
    #[must_use]
    pub fn with_executable(self, name: &str) -> Self {
        lock(&self.state).executables.insert(name.to_string());
        self
    }

    /// Executable names looked up so far, in order.
    #[must_use]
    pub fn lookups(&self) -> Vec<String> {
        lock(&self.state).lookups.clone()
    }
}

impl Environment for ScriptedEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        lock(&self.state).vars.get(name).cloned()
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let mut state = lock(&self.state);
        state.lookups.push(name.to_string());
        state.executables.contains(name).then(|| PathBuf::from("/usr/bin").join(name))
    }
}
