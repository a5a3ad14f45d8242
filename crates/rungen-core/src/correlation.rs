//! Message and correlation identifiers.
//!
//! One correlation id is issued per selected run and shared by every message
//! derived from it; every message gets its own message id.

use uuid::Uuid;

/// Source of message and correlation identifiers.
pub trait IdSource {
    /// A fresh correlation id for one selected run.
    fn new_correlation(&mut self) -> String;

    /// A fresh id for one message.
    fn new_message_id(&mut self) -> String;
}

/// Random UUIDv4 identifiers. Unique within a process with overwhelming probability.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn new_correlation(&mut self) -> String {
        Uuid::new_v4().to_string()
    }

    fn new_message_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic identifiers (`corr-0001`, `msg-0001`, ...) for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
    correlations: u64,
    messages: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for SequentialIds {
    fn new_correlation(&mut self) -> String {
        self.correlations += 1;
        format!("corr-{:04}", self.correlations)
    }

    fn new_message_id(&mut self) -> String {
        self.messages += 1;
        format!("msg-{:04}", self.messages)
    }
}
