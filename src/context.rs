//! Service context bundling all port trait objects.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::adapters::live::{
    AutoApprove, ConfiguredTools, LiveClock, LiveEnvironment, LiveFileSystem, LiveIdGenerator,
    LiveShellExecutor, PresetDecisions, TerminalApproval,
};
use crate::adapters::scripted::{
    FixedClock, MemFileSystem, ScriptedApproval, ScriptedDecisions, ScriptedEnvironment,
    ScriptedShell, ScriptedTools, SequentialIds,
};
use crate::config::ToolConfig;
use crate::ports::{
    ApprovalChannel, Clock, DecisionResolver, Environment, ExternalTools, FileSystem, IdGenerator,
    ShellExecutor,
};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. The context is
/// `Sync`, so concurrent runs can share one by reference.
pub struct ServiceContext {
    /// Wall clock for record timestamps.
    pub clock: Box<dyn Clock>,
    /// Filesystem for checks, the registry and the record store.
    pub fs: Box<dyn FileSystem>,
    /// Process executor for shell, scripted and rollback commands.
    pub shell: Box<dyn ShellExecutor>,
    /// Environment variables and `PATH` lookup.
    pub env: Box<dyn Environment>,
    /// Human approval channel.
    pub approval: Box<dyn ApprovalChannel>,
    /// Decision resolver for agent-decision steps.
    pub decisions: Box<dyn DecisionResolver>,
    /// External tool dispatcher.
    pub tools: Box<dyn ExternalTools>,
    /// Run id generator.
    pub id_gen: Box<dyn IdGenerator>,
}

/// Choices that shape the live context.
#[derive(Debug, Clone, Default)]
pub struct LiveOptions {
    /// Approve every request without prompting (`--yes`).
    pub auto_approve: bool,
    /// Preset decisions by step id (`--decisions`).
    pub decisions: Map<String, Value>,
    /// Tools declared in `skillrun.yaml`.
    pub tools: BTreeMap<String, ToolConfig>,
}

impl ServiceContext {
    /// Creates a live context with real adapters for every port.
    #[must_use]
    pub fn live(options: LiveOptions) -> Self {
        let approval: Box<dyn ApprovalChannel> =
            if options.auto_approve { Box::new(AutoApprove) } else { Box::new(TerminalApproval) };
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            shell: Box::new(LiveShellExecutor),
            env: Box::new(LiveEnvironment),
            approval,
            decisions: Box::new(PresetDecisions::new(options.decisions)),
            tools: Box::new(ConfiguredTools::new(options.tools)),
            id_gen: Box::new(LiveIdGenerator),
        }
    }

    /// Creates a deterministic context from fresh scripted adapters.
    ///
    /// Tests replace individual fields with adapters they keep a handle to.
    #[must_use]
    pub fn scripted() -> Self {
        Self {
            clock: Box::new(FixedClock::default()),
            fs: Box::new(MemFileSystem::new()),
            shell: Box::new(ScriptedShell::new()),
            env: Box::new(ScriptedEnvironment::new()),
            approval: Box::new(ScriptedApproval::new()),
            decisions: Box::new(ScriptedDecisions::new()),
            tools: Box::new(ScriptedTools::new()),
            id_gen: Box::new(SequentialIds::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn scripted_context_is_deterministic() {
        let ctx = ServiceContext::scripted();
        assert_eq!(ctx.id_gen.generate_id(), "run-0001");
        assert_eq!(ctx.id_gen.generate_id(), "run-0002");
        assert_eq!(ctx.clock.now().to_rfc3339(), "2024-06-15T10:30:00+00:00");
        assert!(!ctx.fs.exists(Path::new("/anything")));
    }

    #[test]
    fn replaced_fields_stay_observable() {
        let fs = MemFileSystem::new();
        let ctx = ServiceContext { fs: Box::new(fs.clone()), ..ServiceContext::scripted() };
        ctx.fs.create_new(Path::new("/x"), "y").unwrap();
        assert_eq!(fs.contents(Path::new("/x")).as_deref(), Some("y"));
    }

    #[test]
    fn context_is_shareable_across_tasks() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<ServiceContext>();
    }
}
