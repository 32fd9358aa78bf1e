//! The runtime's message queue.
//!
//! Every saga in the process shares one FIFO mailbox. Messages from
//! different sagas interleave freely; there is no per-item exclusion.

use tokio::sync::{Mutex, mpsc};

use crate::context::Dispatch;
use crate::error::{Result, SagaError};
use crate::state::SagaState;

/// How a continuation left its saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Another call was dispatched; the saga now waits in this state.
    Chained(SagaState),
    /// The saga reached a terminal state. `succeeded` reports whether the
    /// call this continuation inspected succeeded.
    Finished {
        terminal: SagaState,
        succeeded: bool,
    },
}

impl StepOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, StepOutcome::Finished { .. })
    }
}

/// Unbounded FIFO of pending dispatches with a single consumer.
#[derive(Debug)]
pub struct Mailbox {
    sender: mpsc::UnboundedSender<Dispatch>,
    receiver: Mutex<mpsc::UnboundedReceiver<Dispatch>>,
}

impl Mailbox {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn post(&self, dispatch: Dispatch) -> Result<()> {
        self.sender
            .send(dispatch)
            .map_err(|_| SagaError::MailboxClosed)
    }

    /// Takes the next message if one is queued.
    pub async fn try_next(&self) -> Option<Dispatch> {
        self.receiver.lock().await.try_recv().ok()
    }

    /// Waits for the next message.
    pub async fn next(&self) -> Option<Dispatch> {
        self.receiver.lock().await.recv().await
    }

    /// Number of queued messages, or 0 while a consumer holds the receiver.
    pub fn pending(&self) -> usize {
        self.receiver
            .try_lock()
            .map(|receiver| receiver.len())
            .unwrap_or(0)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
