//! The poll scheduler: the one task that talks on the bus.
//!
//! Each pass drains the command backlog (bounded burst) or, when nothing is
//! pending, advances the round-robin status poll. Retry budgets are bounded
//! per operation so one sick device cannot hold the loop beyond its own
//! budget. The cancellation token is observed between passes and around
//! exchanges, never inside one: an in-flight transaction finishes or times
//! out before the task exits and closes the port.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use valvelink_model::{DETAIL_REG_COUNT, POLL_START_REG, STATUS_REG_COUNT};

use super::command::{CommandEntry, CommandReceiver};
use super::state::{SchedulerPhase, StateRepository};
use super::transport::{BusTransport, PurgeBuffers};
use crate::config::SchedulerSection;
use crate::core::modbus::{BusOperation, ExchangeReply};

/// The scheduler loop state.
///
/// Owns the bus transport for the lifetime of one connection; that exclusive
/// ownership is what serializes exchanges on the half-duplex line.
pub struct PollScheduler {
    repo: Arc<StateRepository>,
    bus: BusTransport,
    commands: Arc<AsyncMutex<CommandReceiver>>,
    cfg: SchedulerSection,
    read_timeout: Duration,
    cancel: CancellationToken,
    cursor: usize,
    last_poll: HashMap<u8, Instant>,
}

impl PollScheduler {
    pub fn new(
        repo: Arc<StateRepository>,
        bus: BusTransport,
        commands: Arc<AsyncMutex<CommandReceiver>>,
        cfg: SchedulerSection,
        read_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repo,
            bus,
            commands,
            cfg,
            read_timeout,
            cancel,
            cursor: 0,
            last_poll: HashMap::new(),
        }
    }

    /// Run until cancelled, then close the port.
    pub async fn run(mut self) {
        info!("Poll scheduler started");
        let commands = Arc::clone(&self.commands);
        // Held for the whole run; released when the task ends so the next
        // connection's scheduler can take over the same queue.
        let mut rx = commands.lock().await;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let drained = self.drain_commands(&mut rx).await;
            if drained == 0 {
                self.repo.set_phase(SchedulerPhase::Polling);
                self.poll_next().await;
            }

            // Pace bus utilization; wake early on shutdown
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cfg.poll_interval()) => {}
            }
        }

        if let Err(e) = self.bus.close().await {
            warn!("Error closing bus transport: {e}");
        }
        self.repo.set_phase(SchedulerPhase::Stopped);
        info!("Poll scheduler stopped");
    }

    /// Pop and execute pending commands up to the per-pass burst budget.
    /// Returns how many were executed.
    async fn drain_commands(&mut self, rx: &mut CommandReceiver) -> usize {
        let mut drained = 0;
        while drained < self.cfg.command_burst {
            match rx.try_recv() {
                Ok(entry) => {
                    if drained == 0 {
                        self.repo.set_phase(SchedulerPhase::Draining);
                    }
                    self.execute_command(entry).await;
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        drained
    }

    /// Execute one write command with the write retry policy.
    async fn execute_command(&mut self, entry: CommandEntry) {
        let id = entry.device_id;
        if !self.repo.contains_device(id) {
            warn!(id, "Dropping command for unregistered device");
            return;
        }

        let op = BusOperation::WriteRegister {
            register: entry.register,
            value: entry.value,
        };

        for attempt in 1..=self.cfg.write_attempts {
            if attempt > 1 {
                // A failed write can leave half a reply on the line; flush it
                // and give the slave a moment before re-issuing
                if let Err(e) = self.bus.purge(PurgeBuffers::Input).await {
                    warn!(id, "Purge before write retry failed: {e}");
                }
                tokio::time::sleep(self.cfg.settle_delay()).await;
            }

            let started = Instant::now();
            // Writes get the widened timeout; the normal one applies elsewhere
            match self.bus.exchange(id, &op, self.cfg.write_timeout()).await {
                Ok(ExchangeReply::WriteEcho { .. }) => {
                    let response_ms = started.elapsed().as_millis() as u64;
                    let cmd_latency = entry
                        .issued_at
                        .map(|issued| issued.elapsed().as_millis() as u64);
                    self.repo.record_command_success(
                        id,
                        entry.register,
                        entry.value,
                        response_ms,
                        cmd_latency,
                    );
                    debug!(
                        id,
                        register = entry.register,
                        value = entry.value,
                        attempt,
                        response_ms,
                        "Command confirmed"
                    );
                    return;
                }
                Ok(reply) => {
                    warn!(id, attempt, ?reply, "Unexpected reply to write");
                }
                Err(e) => {
                    debug!(id, attempt, "Write attempt failed: {e}");
                }
            }
        }

        warn!(
            id,
            register = entry.register,
            attempts = self.cfg.write_attempts,
            "Command exhausted its retry budget"
        );
        self.repo.record_command_failure(id);
    }

    /// Advance the round-robin cursor and poll one device.
    async fn poll_next(&mut self) {
        let ids = self.repo.ordered_ids();
        if ids.is_empty() {
            return;
        }
        if self.cursor >= ids.len() {
            self.cursor = 0;
            self.last_poll.retain(|id, _| ids.contains(id));
        }
        let id = ids[self.cursor];
        self.cursor += 1;

        let loop_elapsed = self
            .last_poll
            .insert(id, Instant::now())
            .map(|prev| prev.elapsed().as_millis() as u64);
        self.repo.begin_poll_cycle(id, loop_elapsed);

        let count = if self.repo.detail_focus() == Some(id) {
            DETAIL_REG_COUNT
        } else {
            STATUS_REG_COUNT
        };
        let op = BusOperation::ReadRegisters {
            start: POLL_START_REG,
            count,
        };

        for attempt in 1..=self.cfg.read_attempts {
            if attempt > 1 {
                if let Err(e) = self.bus.purge(PurgeBuffers::Output).await {
                    warn!(id, "Purge before read retry failed: {e}");
                }
            }

            let started = Instant::now();
            match self.bus.exchange(id, &op, self.read_timeout).await {
                Ok(ExchangeReply::Registers(values)) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    self.repo
                        .record_poll_success(id, POLL_START_REG, &values, latency_ms);
                    debug!(id, count, attempt, latency_ms, "Poll complete");
                    return;
                }
                Ok(reply) => {
                    warn!(id, attempt, ?reply, "Unexpected reply to poll read");
                }
                Err(e) => {
                    debug!(id, attempt, "Poll attempt failed: {e}");
                }
            }
        }

        self.repo
            .record_poll_failure(id, self.cfg.offline_threshold);
        debug!(id, "Poll cycle exhausted");
    }
}
