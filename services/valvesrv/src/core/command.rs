//! Command channel: caller-side FIFO of pending writes.
//!
//! Producers are operator actions, so the queue is unbounded and pushing
//! never blocks. The scheduler is the only consumer and drains with a
//! bounded burst per pass so a command flood cannot starve polling.

use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

/// One pending register write
#[derive(Debug, Clone)]
pub struct CommandEntry {
    /// Target device (bus address)
    pub device_id: u8,
    /// Register to write
    pub register: u16,
    /// Value to transmit
    pub value: u16,
    /// When the caller issued the command, for latency accounting
    pub issued_at: Option<Instant>,
}

impl CommandEntry {
    pub fn new(device_id: u8, register: u16, value: u16) -> Self {
        Self {
            device_id,
            register,
            value,
            issued_at: Some(Instant::now()),
        }
    }
}

/// Consumer end, held by the scheduler
pub type CommandReceiver = mpsc::UnboundedReceiver<CommandEntry>;

/// Producer end of the command FIFO. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<CommandEntry>,
}

impl CommandQueue {
    /// Create the queue and its consumer end.
    pub fn channel() -> (Self, CommandReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a command. Never blocks the producer.
    pub fn push(&self, entry: CommandEntry) {
        if self.tx.send(entry).is_err() {
            // Only possible when the receiver is gone, i.e. during teardown
            warn!("Command dropped: channel closed");
        }
    }
}
