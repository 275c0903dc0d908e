//! Per-device state and the lock-guarded repository.
//!
//! The repository is the single shared-state object of the service: registry,
//! device states, scheduler phase, and the detail-focus hint all live behind
//! one lock. The scheduler mutates through `record_*` methods that each take
//! the lock once, so readers only ever observe fully-updated records.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

use valvelink_model::{DeviceDescriptor, DeviceStatus, REG_COMMAND, REG_STATUS};

use super::metrics::RollingHistory;
use super::registry::DeviceRegistry;
use crate::error::Result;

/// Loop-time samples above this are treated as noise (suspended host,
/// clock hiccup) and discarded rather than polluting the average.
pub const MAX_PLAUSIBLE_LOOP_MS: u64 = 20_000;

/// Scheduler lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerPhase {
    /// No open connection
    Idle,
    /// Normal round-robin polling
    Polling,
    /// Command backlog being drained
    Draining,
    /// Stopped after a disconnect
    Stopped,
}

impl SchedulerPhase {
    /// Whether the scheduler loop is running
    pub fn is_active(&self) -> bool {
        matches!(self, SchedulerPhase::Polling | SchedulerPhase::Draining)
    }
}

/// Live state of one device, mutated only by the scheduler
#[derive(Debug, Clone)]
pub struct DeviceState {
    /// Last known register values
    pub cache: BTreeMap<u16, u16>,
    /// Liveness from consecutive transaction results
    pub online: bool,
    /// Failed cycles since the last success
    pub consecutive_errors: u32,
    /// Monotonic instant of the last successful exchange
    pub last_success: Option<Instant>,
    /// Wall-clock stamp of the last successful exchange
    pub last_update: Option<DateTime<Local>>,
    /// Duration of the last successful poll exchange
    pub latency_ms: u64,
    /// Enqueue-to-confirmation latency of the last command
    pub cmd_latency_ms: u64,
    /// Duration of the last successful command exchange
    pub slave_resp_ms: u64,
    /// Rolling command response times
    pub slave_resp_history: RollingHistory,
    /// Rolling inter-poll intervals
    pub loop_time_history: RollingHistory,
    /// Successful poll cycles
    pub success_count: u64,
    /// Attempted poll cycles
    pub total_count: u64,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            cache: BTreeMap::new(),
            online: true,
            consecutive_errors: 0,
            last_success: None,
            last_update: None,
            latency_ms: 0,
            cmd_latency_ms: 0,
            slave_resp_ms: 0,
            slave_resp_history: RollingHistory::new(),
            loop_time_history: RollingHistory::new(),
            success_count: 0,
            total_count: 0,
        }
    }
}

/// Consistent copy of one device's state, for display and inspection.
///
/// `stale` is derived at read time and never stored: data is stale when the
/// scheduler is running and nothing succeeded within the staleness window.
/// It is independent of `online`, which tracks consecutive failures.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub id: u8,
    pub name: String,
    pub cache: BTreeMap<u16, u16>,
    pub status: DeviceStatus,
    pub online: bool,
    pub stale: bool,
    pub consecutive_errors: u32,
    pub last_update: Option<DateTime<Local>>,
    pub latency_ms: u64,
    pub cmd_latency_ms: u64,
    pub slave_resp_ms: u64,
    pub avg_slave_resp_ms: f64,
    pub avg_loop_time_ms: f64,
    pub success_count: u64,
    pub total_count: u64,
}

#[derive(Debug)]
struct RepoInner {
    registry: DeviceRegistry,
    states: HashMap<u8, DeviceState>,
    phase: SchedulerPhase,
    detail_focus: Option<u8>,
}

/// The lock-guarded repository shared between scheduler and callers.
#[derive(Debug)]
pub struct StateRepository {
    inner: RwLock<RepoInner>,
    staleness_window: Duration,
}

impl StateRepository {
    pub fn new(staleness_window: Duration) -> Self {
        Self {
            inner: RwLock::new(RepoInner {
                registry: DeviceRegistry::new(),
                states: HashMap::new(),
                phase: SchedulerPhase::Idle,
                detail_focus: None,
            }),
            staleness_window,
        }
    }

    // ------------------------------------------------------------------
    // Registry operations
    // ------------------------------------------------------------------

    /// Add a device with a fresh state record.
    pub fn add_device(&self, descriptor: DeviceDescriptor) -> Result<()> {
        let mut inner = self.inner.write();
        let id = descriptor.id;
        inner.registry.add(descriptor)?;
        inner.states.insert(id, DeviceState::new());
        Ok(())
    }

    /// Remove a device and its state. Returns whether anything was removed.
    pub fn remove_device(&self, id: u8) -> bool {
        let mut inner = self.inner.write();
        let removed = inner.registry.remove(id);
        if removed {
            inner.states.remove(&id);
            if inner.detail_focus == Some(id) {
                inner.detail_focus = None;
            }
        }
        removed
    }

    /// Rename a device; state is untouched.
    pub fn rename_device(&self, id: u8, name: impl Into<String>) -> Result<()> {
        self.inner.write().registry.rename(id, name)
    }

    pub fn contains_device(&self, id: u8) -> bool {
        self.inner.read().registry.contains(id)
    }

    /// Descriptors in polling order
    pub fn descriptors(&self) -> Vec<DeviceDescriptor> {
        self.inner.read().registry.iter().cloned().collect()
    }

    /// Bus addresses in polling order
    pub fn ordered_ids(&self) -> Vec<u8> {
        self.inner.read().registry.ids()
    }

    pub fn device_count(&self) -> usize {
        self.inner.read().registry.len()
    }

    // ------------------------------------------------------------------
    // Phase and hints
    // ------------------------------------------------------------------

    pub fn phase(&self) -> SchedulerPhase {
        self.inner.read().phase
    }

    pub fn set_phase(&self, phase: SchedulerPhase) {
        self.inner.write().phase = phase;
    }

    /// Reset liveness for a fresh connection and enter the polling phase.
    pub fn mark_connected(&self) {
        let mut inner = self.inner.write();
        inner.phase = SchedulerPhase::Polling;
        for state in inner.states.values_mut() {
            state.online = true;
            state.consecutive_errors = 0;
        }
    }

    /// Hint the scheduler to use the wide read for one device.
    pub fn set_detail_focus(&self, id: Option<u8>) {
        self.inner.write().detail_focus = id;
    }

    pub fn detail_focus(&self) -> Option<u8> {
        self.inner.read().detail_focus
    }

    // ------------------------------------------------------------------
    // Scheduler-side mutation
    // ------------------------------------------------------------------

    /// Record a confirmed command write.
    ///
    /// The command register itself is never cached: it is write-only and
    /// momentary, and its accepted effect shows up in the status register on
    /// the next poll.
    pub fn record_command_success(
        &self,
        id: u8,
        register: u16,
        value: u16,
        response_ms: u64,
        cmd_latency_ms: Option<u64>,
    ) {
        let mut inner = self.inner.write();
        if let Some(state) = inner.states.get_mut(&id) {
            if register != REG_COMMAND {
                state.cache.insert(register, value);
            }
            state.online = true;
            state.consecutive_errors = 0;
            state.slave_resp_ms = response_ms;
            state.slave_resp_history.push(response_ms);
            if let Some(latency) = cmd_latency_ms {
                state.cmd_latency_ms = latency;
            }
        }
    }

    /// Record an exhausted command write: the error counter moves, liveness
    /// does not. Command failures alone never force a device offline.
    pub fn record_command_failure(&self, id: u8) {
        let mut inner = self.inner.write();
        if let Some(state) = inner.states.get_mut(&id) {
            state.consecutive_errors += 1;
        }
    }

    /// Open a poll cycle: bump the attempt counter and record the inter-poll
    /// interval, discarding implausible samples.
    pub fn begin_poll_cycle(&self, id: u8, loop_elapsed_ms: Option<u64>) {
        let mut inner = self.inner.write();
        if let Some(state) = inner.states.get_mut(&id) {
            state.total_count += 1;
            if let Some(elapsed) = loop_elapsed_ms {
                if elapsed <= MAX_PLAUSIBLE_LOOP_MS {
                    state.loop_time_history.push(elapsed);
                } else {
                    debug!(id, elapsed, "Discarding implausible loop-time sample");
                }
            }
        }
    }

    /// Record a successful poll read.
    pub fn record_poll_success(&self, id: u8, start_reg: u16, values: &[u16], latency_ms: u64) {
        let mut inner = self.inner.write();
        if let Some(state) = inner.states.get_mut(&id) {
            for (i, value) in values.iter().enumerate() {
                state.cache.insert(start_reg + i as u16, *value);
            }
            state.online = true;
            state.consecutive_errors = 0;
            state.last_success = Some(Instant::now());
            state.last_update = Some(Local::now());
            state.latency_ms = latency_ms;
            state.success_count += 1;
        }
    }

    /// Record an exhausted poll cycle; liveness flips once the counter
    /// reaches the configured threshold.
    pub fn record_poll_failure(&self, id: u8, offline_threshold: u32) {
        let mut inner = self.inner.write();
        if let Some(state) = inner.states.get_mut(&id) {
            state.consecutive_errors += 1;
            if state.consecutive_errors >= offline_threshold {
                state.online = false;
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Consistent copy of one device's state, or `None` when unregistered.
    pub fn snapshot(&self, id: u8) -> Option<DeviceSnapshot> {
        let inner = self.inner.read();
        let descriptor = inner.registry.get(id)?;
        let state = inner.states.get(&id)?;
        Some(self.build_snapshot(descriptor, state, inner.phase))
    }

    /// Snapshots of every device in polling order.
    pub fn snapshot_all(&self) -> Vec<DeviceSnapshot> {
        let inner = self.inner.read();
        inner
            .registry
            .iter()
            .filter_map(|d| {
                inner
                    .states
                    .get(&d.id)
                    .map(|s| self.build_snapshot(d, s, inner.phase))
            })
            .collect()
    }

    fn build_snapshot(
        &self,
        descriptor: &DeviceDescriptor,
        state: &DeviceState,
        phase: SchedulerPhase,
    ) -> DeviceSnapshot {
        // Stale is recomputed on every read, never persisted
        let stale = phase.is_active()
            && state
                .last_success
                .map_or(true, |t| t.elapsed() > self.staleness_window);

        DeviceSnapshot {
            id: descriptor.id,
            name: descriptor.name.clone(),
            cache: state.cache.clone(),
            status: state
                .cache
                .get(&REG_STATUS)
                .map_or(DeviceStatus::Idle, |v| DeviceStatus::from_register(*v)),
            online: state.online,
            stale,
            consecutive_errors: state.consecutive_errors,
            last_update: state.last_update,
            latency_ms: state.latency_ms,
            cmd_latency_ms: state.cmd_latency_ms,
            slave_resp_ms: state.slave_resp_ms,
            avg_slave_resp_ms: state.slave_resp_history.mean(),
            avg_loop_time_ms: state.loop_time_history.mean(),
            success_count: state.success_count,
            total_count: state.total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> StateRepository {
        StateRepository::new(Duration::from_secs(15))
    }

    fn add(repo: &StateRepository, id: u8) {
        repo.add_device(DeviceDescriptor::new(id, format!("dev-{id}")).unwrap())
            .unwrap();
    }

    #[test]
    fn test_state_exists_iff_descriptor_exists() {
        let repo = repo();
        add(&repo, 1);
        assert!(repo.snapshot(1).is_some());

        repo.remove_device(1);
        assert!(repo.snapshot(1).is_none());
        assert!(!repo.contains_device(1));
    }

    #[test]
    fn test_command_register_never_cached() {
        let repo = repo();
        add(&repo, 1);

        repo.record_command_success(1, REG_COMMAND, 1, 12, None);
        let snap = repo.snapshot(1).unwrap();
        assert!(!snap.cache.contains_key(&REG_COMMAND));
        assert_eq!(snap.slave_resp_ms, 12);

        // Tunable register writes are cached exactly
        repo.record_command_success(1, 4, 750, 9, Some(30));
        let snap = repo.snapshot(1).unwrap();
        assert_eq!(snap.cache.get(&4), Some(&750));
        assert_eq!(snap.cmd_latency_ms, 30);
    }

    #[test]
    fn test_command_failure_never_flips_online() {
        let repo = repo();
        add(&repo, 1);

        for _ in 0..5 {
            repo.record_command_failure(1);
        }
        let snap = repo.snapshot(1).unwrap();
        assert_eq!(snap.consecutive_errors, 5);
        assert!(snap.online);
    }

    #[test]
    fn test_poll_failure_threshold_and_recovery() {
        let repo = repo();
        add(&repo, 5);

        repo.record_poll_failure(5, 2);
        assert!(repo.snapshot(5).unwrap().online);

        repo.record_poll_failure(5, 2);
        let snap = repo.snapshot(5).unwrap();
        assert!(!snap.online);
        assert_eq!(snap.consecutive_errors, 2);

        repo.record_poll_success(5, 1, &[1, 0, 0], 7);
        let snap = repo.snapshot(5).unwrap();
        assert!(snap.online);
        assert_eq!(snap.consecutive_errors, 0);
        assert_eq!(snap.status, DeviceStatus::Open);
    }

    #[test]
    fn test_staleness_is_derived_and_phase_gated() {
        let repo = StateRepository::new(Duration::from_millis(0));
        add(&repo, 1);

        // Idle scheduler: never stale, regardless of data age
        assert!(!repo.snapshot(1).unwrap().stale);

        repo.set_phase(SchedulerPhase::Polling);
        // Running with no success yet: stale
        assert!(repo.snapshot(1).unwrap().stale);

        // A zero window makes any past success stale again immediately;
        // with a wide window the same state reads fresh
        let repo = StateRepository::new(Duration::from_secs(3600));
        add(&repo, 1);
        repo.set_phase(SchedulerPhase::Polling);
        repo.record_poll_success(1, 1, &[0, 0, 0], 3);
        assert!(!repo.snapshot(1).unwrap().stale);
    }

    #[test]
    fn test_implausible_loop_samples_discarded() {
        let repo = repo();
        add(&repo, 1);

        repo.begin_poll_cycle(1, Some(120));
        repo.begin_poll_cycle(1, Some(MAX_PLAUSIBLE_LOOP_MS + 1));
        repo.begin_poll_cycle(1, None);

        let snap = repo.snapshot(1).unwrap();
        assert_eq!(snap.total_count, 3);
        assert_eq!(snap.avg_loop_time_ms, 120.0);
    }

    #[test]
    fn test_mark_connected_resets_liveness() {
        let repo = repo();
        add(&repo, 1);
        add(&repo, 2);
        repo.record_poll_failure(1, 1);
        assert!(!repo.snapshot(1).unwrap().online);

        repo.mark_connected();
        assert_eq!(repo.phase(), SchedulerPhase::Polling);
        let snap = repo.snapshot(1).unwrap();
        assert!(snap.online);
        assert_eq!(snap.consecutive_errors, 0);
    }

    #[test]
    fn test_detail_focus_cleared_on_removal() {
        let repo = repo();
        add(&repo, 3);
        repo.set_detail_focus(Some(3));
        assert_eq!(repo.detail_focus(), Some(3));

        repo.remove_device(3);
        assert_eq!(repo.detail_focus(), None);
    }
}
