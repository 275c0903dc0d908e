//! Valve Communication Service (`valvesrv`)
//!
//! An async communication service for a fleet of valve actuators sharing one
//! half-duplex Modbus RTU bus. The service owns exclusive access to the bus
//! and arbitrates operator write commands against periodic status polling.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   enqueue    ┌─────────────────┐   exchange   ┌──────────┐
//! │   Callers    │─────────────►│  Poll Scheduler  │─────────────►│  Serial  │
//! │ (UI, tools)  │   commands   │ (drain ⇄ poll)   │  one at a    │   bus    │
//! └──────┬───────┘              └────────┬────────┘     time      └──────────┘
//!        │          snapshots            │ record
//!        └──────────────◄────────────────┴─► State Repository
//! ```
//!
//! One background task runs the scheduler and is the only code path that
//! touches the bus. Within a pass it first drains pending commands (bounded
//! burst of five so a command flood cannot starve polling), otherwise it
//! advances a round-robin status poll over the registered devices. Failures
//! are retried within a bounded budget and degrade only the affected
//! device's liveness; the loop itself never stops for a sick slave.
//!
//! # Quick start
//!
//! ```no_run
//! use valvesrv::{AppConfig, BusManager};
//! use valvelink_model::{CMD_OPEN, REG_COMMAND};
//!
//! #[tokio::main]
//! async fn main() -> valvesrv::Result<()> {
//!     let manager = BusManager::new(AppConfig::default());
//!     manager.add_device(1, "Intake valve")?;
//!
//!     manager.connect("/dev/ttyUSB0", 9600).await?;
//!     manager.enqueue_command(1, REG_COMMAND, CMD_OPEN)?;
//!
//!     if let Some(snapshot) = manager.snapshot(1) {
//!         println!("{}: online={} status={:?}", snapshot.name, snapshot.online, snapshot.status);
//!     }
//!
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Error handling
//!
//! Only connect-time failures propagate to callers as [`ValveSrvError`].
//! Per-exchange failures (timeout, framing, CRC) are consumed by the retry
//! policy; after exhaustion they surface as `online = false` on the device
//! snapshot, never as an error. Staleness is a second, independent derived
//! indicator: data older than the staleness window while polling is active.

pub mod config;
pub mod core;
pub mod error;
pub mod persist;
pub mod utils;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use crate::core::manager::BusManager;
pub use crate::core::state::{DeviceSnapshot, SchedulerPhase};
pub use crate::error::{Result, ValveSrvError};
pub use crate::persist::{DeviceStore, JsonDeviceStore};
