//! Scripted adapters for deterministic runs.
//!
//! Every adapter is cheap to clone and shares its state behind an
//! `Arc<Mutex<_>>`, so a test can keep a handle, move a clone into a
//! `ServiceContext`, then inspect the calls the engine made.

pub mod approval;
pub mod clock;
pub mod decision;
pub mod environment;
pub mod filesystem;
pub mod id_gen;
pub mod shell;
pub mod tools;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use approval::ScriptedApproval;
pub use clock::FixedClock;
pub use decision::ScriptedDecisions;
pub use environment::ScriptedEnvironment;
pub use filesystem::MemFileSystem;
pub use id_gen::SequentialIds;
pub use shell::{Reply, ScriptedShell};
pub use tools::ScriptedTools;

/// Locks shared adapter state, recovering it if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
