//! Scripted approval channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::ports::{Approval, ApprovalChannel, ApprovalFuture, ApprovalRequest, PortError};

#[derive(Default)]
struct ApprovalState {
    answers: VecDeque<Approval>,
    requests: Vec<ApprovalRequest>,
}

/// Answers approval requests from a queue; approves once the queue is empty.
#[derive(Clone, Default)]
pub struct ScriptedApproval {
    state: Arc<Mutex<ApprovalState>>,
}

impl ScriptedApproval {
    /// Creates a channel that approves everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next answer.
    #[must_use]
    pub fn then(self, answer: Approval) -> Self {
        lock(&self.state).answers.push_back(answer);
        self
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApprovalRequest> {
        lock(&self.state).requests.clone()
    }
}

impl ApprovalChannel for ScriptedApproval {
    fn request(&self, request: &ApprovalRequest) -> ApprovalFuture<'_> {
        let answer = {
            let mut state = lock(&self.state);
            state.requests.push(request.clone());
            state.answers.pop_front().unwrap_or(Approval::Approve)
        };
        Box::pin(async move { Ok::<_, PortError>(answer) })
    }
}
