//! Live run-id generator.

use uuid::Uuid;

use crate::ports::IdGenerator;

/// Produces random v4 UUIDs for run ids.
#[derive(Default)]
pub struct LiveIdGenerator;

impl IdGenerator for LiveIdGenerator {
    fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
