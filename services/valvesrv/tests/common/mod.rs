//! Shared harness for scheduler integration tests.
//!
//! Everything runs against the mock bus so retry, ordering, and liveness
//! semantics are exercised through the real frame codec.

use std::time::Duration;

use valvesrv::core::transport::{MockBusHandle, MockBusTransport};
use valvesrv::{AppConfig, BusManager};

/// Config with timings shrunk for tests: one failed read attempt costs
/// 30 ms, a failed write attempt 40 ms, passes are paced 20 ms apart.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.serial.read_timeout_ms = 30;
    config.scheduler.poll_interval_ms = 20;
    config.scheduler.settle_delay_ms = 5;
    config.scheduler.write_timeout_ms = 40;
    config
}

/// Manager with registered devices plus a not-yet-connected mock bus, for
/// tests that need to enqueue or mutate before the scheduler starts.
pub fn build(
    config: AppConfig,
    devices: &[u8],
) -> (BusManager, MockBusTransport, MockBusHandle) {
    let manager = BusManager::new(config);
    let (transport, handle) = MockBusTransport::new();
    for &id in devices {
        manager.add_device(id, &format!("dev-{id}")).unwrap();
        handle.add_slave(id);
    }
    (manager, transport, handle)
}

/// Build with [`test_config`] and connect immediately.
pub async fn setup(devices: &[u8]) -> (BusManager, MockBusHandle) {
    let (manager, transport, handle) = build(test_config(), devices);
    manager
        .connect_with_transport(Box::new(transport))
        .await
        .unwrap();
    (manager, handle)
}

/// Poll `predicate` until it holds, panicking after `timeout`.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("Condition not reached within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Default patience for conditions driven by the paced scheduler loop
pub const PATIENCE: Duration = Duration::from_secs(5);
