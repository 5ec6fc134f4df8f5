//! Adapter implementations of the port traits.
//!
//! `live` talks to the real system; `scripted` is deterministic and
//! inspectable, for tests and embedding.

pub mod live;
pub mod scripted;
