//! Live adapters for real external interactions.

pub mod approval;
pub mod clock;
pub mod decision;
pub mod environment;
pub mod filesystem;
pub mod id_gen;
pub mod shell;
pub mod tools;

pub use approval::{AutoApprove, TerminalApproval};
pub use clock::LiveClock;
pub use decision::PresetDecisions;
pub use environment::LiveEnvironment;
pub use filesystem::LiveFileSystem;
pub use id_gen::LiveIdGenerator;
pub use shell::LiveShellExecutor;
pub use tools::ConfiguredTools;
