//! Core communication functionality.
//!
//! Dependency order, leaves first: [`registry`] and [`command`] feed the
//! shared [`state`] repository, [`modbus`] and [`transport`] carry bytes,
//! [`scheduler`] ties them together, and [`manager`] is the caller surface.

pub mod command;
pub mod manager;
pub mod metrics;
pub mod modbus;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod transport;

pub use self::command::{CommandEntry, CommandQueue};
pub use self::manager::BusManager;
pub use self::state::{DeviceSnapshot, SchedulerPhase, StateRepository};
