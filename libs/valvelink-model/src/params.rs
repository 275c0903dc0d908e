//! Tunable parameter specifications.
//!
//! Registers 4-9 are read/write parameters, each with a declared numeric
//! range. Range enforcement happens at the caller before a write command is
//! enqueued; the scheduler transmits values as-is.

use crate::error::{ModelError, Result};
use crate::registers::{
    register_kind, RegisterKind, REG_CLOSE_SPEED, REG_CLOSE_TORQUE, REG_DURATION, REG_OPEN_SPEED,
    REG_OPEN_TORQUE, REG_SAMPLE_VALUE,
};

/// Specification of one tunable parameter register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Register address
    pub register: u16,
    /// Display label
    pub label: &'static str,
    /// Smallest accepted value
    pub min: u16,
    /// Largest accepted value
    pub max: u16,
    /// Display unit, empty when dimensionless
    pub unit: &'static str,
}

/// All tunable parameters, in register order
pub const TUNABLE_PARAMS: [ParamSpec; 6] = [
    ParamSpec {
        register: REG_OPEN_SPEED,
        label: "Open speed",
        min: 0,
        max: 1000,
        unit: "",
    },
    ParamSpec {
        register: REG_CLOSE_SPEED,
        label: "Close speed",
        min: 0,
        max: 1000,
        unit: "",
    },
    ParamSpec {
        register: REG_DURATION,
        label: "Duration",
        min: 0,
        max: 3600,
        unit: "s",
    },
    ParamSpec {
        register: REG_OPEN_TORQUE,
        label: "Open torque",
        min: 0,
        max: 1000,
        unit: "",
    },
    ParamSpec {
        register: REG_CLOSE_TORQUE,
        label: "Close torque",
        min: 0,
        max: 1000,
        unit: "",
    },
    ParamSpec {
        register: REG_SAMPLE_VALUE,
        label: "Sample value",
        min: 0,
        max: 1000,
        unit: "",
    },
];

/// Look up the spec for a tunable register.
pub fn param_spec(register: u16) -> Option<&'static ParamSpec> {
    TUNABLE_PARAMS.iter().find(|p| p.register == register)
}

/// Validate a value against a tunable register's declared range.
///
/// Returns `NotWritable` for read-only registers and `UnknownRegister` for
/// addresses outside the device map. The command register is writable but
/// carries no range spec; use [`crate::registers::CMD_OPEN`] / `CMD_CLOSE`.
pub fn validate_param_value(register: u16, value: u16) -> Result<()> {
    match register_kind(register) {
        None => Err(ModelError::UnknownRegister(register)),
        Some(RegisterKind::ReadOnly) => Err(ModelError::NotWritable(register)),
        Some(RegisterKind::Command) => Ok(()),
        Some(RegisterKind::Tunable) => {
            let spec = param_spec(register).ok_or(ModelError::UnknownRegister(register))?;
            if value < spec.min || value > spec.max {
                return Err(ModelError::OutOfRange {
                    register,
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            }
            Ok(())
        }
    }
}
