//! Predictable run ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ports::IdGenerator;

/// Yields `run-0001`, `run-0002`, ...
#[derive(Clone, Default)]
pub struct SequentialIds {
    counter: Arc<AtomicU64>,
}

impl IdGenerator for SequentialIds {
    fn generate_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("run-{n:04}")
    }
}
