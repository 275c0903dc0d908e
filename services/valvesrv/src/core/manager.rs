//! Caller-facing bus manager.
//!
//! Owns the repository, the command queue, the persistence hook, and the
//! scheduler lifecycle. Callers never touch the bus; everything they do here
//! is either a queue push or a lock-guarded repository access.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use valvelink_model::DeviceDescriptor;

use super::command::{CommandEntry, CommandQueue, CommandReceiver};
use super::scheduler::PollScheduler;
use super::state::{DeviceSnapshot, SchedulerPhase, StateRepository};
use super::transport::{BusTransport, RawTransport, SerialConfig, SerialTransport};
use crate::config::AppConfig;
use crate::error::{Result, ValveSrvError};
use crate::persist::DeviceStore;

struct SchedulerRuntime {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Facade over the communication core.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct BusManager {
    config: AppConfig,
    repo: Arc<StateRepository>,
    queue: CommandQueue,
    // The receiver survives across connects; each scheduler run locks it
    // for its lifetime and releases it on shutdown.
    commands: Arc<AsyncMutex<CommandReceiver>>,
    store: Option<Box<dyn DeviceStore>>,
    runtime: Mutex<Option<SchedulerRuntime>>,
}

impl BusManager {
    /// Create a manager without persistence.
    pub fn new(config: AppConfig) -> Self {
        let (queue, rx) = CommandQueue::channel();
        let repo = Arc::new(StateRepository::new(config.scheduler.stale_after()));
        Self {
            config,
            repo,
            queue,
            commands: Arc::new(AsyncMutex::new(rx)),
            store: None,
            runtime: Mutex::new(None),
        }
    }

    /// Create a manager seeded from a device store; registry changes are
    /// written back to it.
    pub fn with_store(config: AppConfig, store: Box<dyn DeviceStore>) -> Result<Self> {
        let mut manager = Self::new(config);
        let seed = store.load()?;
        for descriptor in seed {
            // Seeding is not a registry change, so no save-back here
            manager.repo.add_device(descriptor)?;
        }
        manager.store = Some(store);
        Ok(manager)
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Open the serial port and start the scheduler.
    ///
    /// The only operation whose bus-level failure reaches the caller.
    pub async fn connect(&self, port: &str, baud_rate: u32) -> Result<()> {
        let serial_config = SerialConfig {
            port: port.to_string(),
            baud_rate,
            ..self.config.serial.clone()
        };
        let transport = SerialTransport::new(serial_config)
            .map_err(|e| ValveSrvError::connection(e.to_string()))?;
        self.connect_with_transport(Box::new(transport)).await
    }

    /// Start the scheduler over an arbitrary transport (tests, alternative
    /// links).
    pub async fn connect_with_transport(&self, mut raw: Box<dyn RawTransport>) -> Result<()> {
        if self.is_connected() {
            return Err(ValveSrvError::state("Already connected"));
        }

        raw.open()
            .await
            .map_err(|e| ValveSrvError::connection(e.to_string()))?;

        self.repo.mark_connected();

        let cancel = CancellationToken::new();
        let scheduler = PollScheduler::new(
            Arc::clone(&self.repo),
            BusTransport::new(raw),
            Arc::clone(&self.commands),
            self.config.scheduler.clone(),
            self.config.serial.read_timeout(),
            cancel.clone(),
        );
        let task = tokio::spawn(scheduler.run());

        *self.runtime.lock() = Some(SchedulerRuntime { cancel, task });
        info!("Bus manager connected");
        Ok(())
    }

    /// Stop the scheduler and close the port. Idempotent.
    ///
    /// Cooperative: the stop signal is observed between passes, so an
    /// in-flight exchange completes or times out before the port closes.
    pub async fn disconnect(&self) {
        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            runtime.cancel.cancel();
            if let Err(e) = runtime.task.await {
                warn!("Scheduler task ended abnormally: {e}");
            }
            info!("Bus manager disconnected");
        }
    }

    /// Whether the scheduler loop is currently running
    pub fn is_connected(&self) -> bool {
        self.repo.phase().is_active()
    }

    /// Current scheduler phase
    pub fn phase(&self) -> SchedulerPhase {
        self.repo.phase()
    }

    // ------------------------------------------------------------------
    // Registry operations (save-on-change)
    // ------------------------------------------------------------------

    /// Register a device. Fails on a duplicate address.
    pub fn add_device(&self, id: u8, name: &str) -> Result<()> {
        let descriptor = DeviceDescriptor::new(id, name)?;
        self.repo.add_device(descriptor)?;
        self.persist()
    }

    /// Remove a device and its state. No-op when absent.
    pub fn remove_device(&self, id: u8) -> Result<()> {
        if self.repo.remove_device(id) {
            self.persist()?;
        }
        Ok(())
    }

    /// Rename a device; its state and metrics are untouched.
    pub fn rename_device(&self, id: u8, name: &str) -> Result<()> {
        self.repo.rename_device(id, name)?;
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(&self.repo.descriptors())?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commands and snapshots
    // ------------------------------------------------------------------

    /// Queue a register write for the scheduler. Never blocks.
    ///
    /// Value ranges are the caller's contract
    /// ([`valvelink_model::validate_param_value`]); the scheduler transmits
    /// what it is given.
    pub fn enqueue_command(&self, id: u8, register: u16, value: u16) -> Result<()> {
        if !self.repo.contains_device(id) {
            return Err(ValveSrvError::device_not_found(id));
        }
        self.queue.push(CommandEntry::new(id, register, value));
        Ok(())
    }

    /// Consistent copy of one device's state.
    pub fn snapshot(&self, id: u8) -> Option<DeviceSnapshot> {
        self.repo.snapshot(id)
    }

    /// Snapshots of all devices in polling order.
    pub fn snapshot_all(&self) -> Vec<DeviceSnapshot> {
        self.repo.snapshot_all()
    }

    /// Hint the scheduler to read the full register window for one device.
    pub fn set_detail_focus(&self, id: Option<u8>) {
        self.repo.set_detail_focus(id);
    }

    /// Number of registered devices
    pub fn device_count(&self) -> usize {
        self.repo.device_count()
    }
}

impl std::fmt::Debug for BusManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusManager")
            .field("devices", &self.repo.device_count())
            .field("phase", &self.repo.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::JsonDeviceStore;

    #[test]
    fn test_registry_operations_and_duplicate_id() {
        let manager = BusManager::new(AppConfig::default());
        manager.add_device(1, "Valve A").unwrap();
        manager.add_device(2, "Valve B").unwrap();

        let err = manager.add_device(1, "Imposter").unwrap_err();
        assert!(matches!(err, ValveSrvError::DeviceError(_)));
        assert_eq!(manager.device_count(), 2);

        manager.rename_device(2, "Valve B2").unwrap();
        assert_eq!(manager.snapshot(2).unwrap().name, "Valve B2");

        manager.remove_device(1).unwrap();
        assert!(manager.snapshot(1).is_none());
        // Removing again is a no-op
        manager.remove_device(1).unwrap();
    }

    #[test]
    fn test_enqueue_requires_registered_device() {
        let manager = BusManager::new(AppConfig::default());
        assert!(manager.enqueue_command(1, 0, 1).is_err());

        manager.add_device(1, "Valve").unwrap();
        assert!(manager.enqueue_command(1, 0, 1).is_ok());
    }

    #[test]
    fn test_save_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        let store = JsonDeviceStore::new(&path);

        let manager =
            BusManager::with_store(AppConfig::default(), Box::new(store)).unwrap();
        manager.add_device(4, "Bypass").unwrap();
        manager.add_device(7, "Main").unwrap();
        manager.rename_device(4, "Bypass 2").unwrap();
        manager.remove_device(7).unwrap();

        let reread = JsonDeviceStore::new(&path).load().unwrap();
        assert_eq!(reread.len(), 1);
        assert_eq!(reread[0].id, 4);
        assert_eq!(reread[0].name, "Bypass 2");
    }

    #[test]
    fn test_seed_list_loaded_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        let seed = vec![DeviceDescriptor::new(3, "Seeded").unwrap()];
        JsonDeviceStore::new(&path).save(&seed).unwrap();

        let manager =
            BusManager::with_store(AppConfig::default(), Box::new(JsonDeviceStore::new(&path)))
                .unwrap();
        assert_eq!(manager.device_count(), 1);
        assert_eq!(manager.snapshot(3).unwrap().name, "Seeded");
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let manager = BusManager::new(AppConfig::default());
        assert!(!manager.is_connected());
        manager.disconnect().await;
        assert!(!manager.is_connected());
    }
}
