//! Fixed per-device register map.
//!
//! Every actuator exposes ten holding registers. Register 0 is a write-only
//! command register; 1-3 are read-only status words; 4-9 are read/write
//! tunable parameters.

use serde::{Deserialize, Serialize};

/// Command register (write-only)
pub const REG_COMMAND: u16 = 0;
/// Status register (read-only)
pub const REG_STATUS: u16 = 1;
/// Error bitfield register (read-only)
pub const REG_ERRORS: u16 = 2;
/// Warning bitfield register (read-only)
pub const REG_WARNINGS: u16 = 3;
/// Opening speed (read/write)
pub const REG_OPEN_SPEED: u16 = 4;
/// Closing speed (read/write)
pub const REG_CLOSE_SPEED: u16 = 5;
/// Travel duration in seconds (read/write)
pub const REG_DURATION: u16 = 6;
/// Opening torque (read/write)
pub const REG_OPEN_TORQUE: u16 = 7;
/// Closing torque (read/write)
pub const REG_CLOSE_TORQUE: u16 = 8;
/// Spare sample value (read/write)
pub const REG_SAMPLE_VALUE: u16 = 9;

/// Total registers per device
pub const REGS_PER_DEVICE: u16 = 10;

/// Command register value: open the actuator
pub const CMD_OPEN: u16 = 1;
/// Command register value: close the actuator
pub const CMD_CLOSE: u16 = 2;

/// Polling always starts past the write-only command register
pub const POLL_START_REG: u16 = REG_STATUS;
/// Registers covered by a normal status poll (status/errors/warnings)
pub const STATUS_REG_COUNT: u16 = 3;
/// Registers covered by a detail-focus poll (status words plus tunables)
pub const DETAIL_REG_COUNT: u16 = 9;

/// Actuator state reported in the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// Not moving, no position reached
    Idle,
    /// Fully open
    Open,
    /// Fully closed
    Closed,
    /// Value outside the documented set
    Unknown(u16),
}

impl DeviceStatus {
    /// Decode the raw status register value.
    pub fn from_register(value: u16) -> Self {
        match value {
            0 => DeviceStatus::Idle,
            1 => DeviceStatus::Open,
            2 => DeviceStatus::Closed,
            other => DeviceStatus::Unknown(other),
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Idle => "Idle",
            DeviceStatus::Open => "Open",
            DeviceStatus::Closed => "Closed",
            DeviceStatus::Unknown(_) => "Unknown",
        }
    }
}

/// Access class of a register in the device map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// Write-only command register
    Command,
    /// Read-only status word
    ReadOnly,
    /// Read/write tunable parameter
    Tunable,
}

/// Classify a register address, or `None` when outside the device map.
pub fn register_kind(register: u16) -> Option<RegisterKind> {
    match register {
        REG_COMMAND => Some(RegisterKind::Command),
        REG_STATUS..=REG_WARNINGS => Some(RegisterKind::ReadOnly),
        REG_OPEN_SPEED..=REG_SAMPLE_VALUE => Some(RegisterKind::Tunable),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_decoding() {
        assert_eq!(DeviceStatus::from_register(0), DeviceStatus::Idle);
        assert_eq!(DeviceStatus::from_register(1), DeviceStatus::Open);
        assert_eq!(DeviceStatus::from_register(2), DeviceStatus::Closed);
        assert_eq!(DeviceStatus::from_register(7), DeviceStatus::Unknown(7));
        assert_eq!(DeviceStatus::Open.label(), "Open");
    }

    #[test]
    fn test_register_classification() {
        assert_eq!(register_kind(REG_COMMAND), Some(RegisterKind::Command));
        assert_eq!(register_kind(REG_STATUS), Some(RegisterKind::ReadOnly));
        assert_eq!(register_kind(REG_WARNINGS), Some(RegisterKind::ReadOnly));
        assert_eq!(register_kind(REG_OPEN_SPEED), Some(RegisterKind::Tunable));
        assert_eq!(register_kind(REG_SAMPLE_VALUE), Some(RegisterKind::Tunable));
        assert_eq!(register_kind(10), None);
    }
}
