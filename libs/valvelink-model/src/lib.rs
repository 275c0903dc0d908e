//! Valvelink Model Library
//!
//! Domain definitions for the valvelink field bus: the fixed register map of
//! the actuator devices, status/error/warning decoding, tunable parameter
//! specifications, and device descriptors. This library provides pure
//! business logic without service dependencies.
//!
//! # Modules
//!
//! - `device`: device descriptors and bus address validation
//! - `registers`: the fixed per-device register map and status decoding
//! - `flags`: error and warning bitfield decoding
//! - `params`: tunable parameter specs and range validation
//!
//! # Example
//!
//! ```
//! use valvelink_model::{param_spec, validate_param_value, REG_OPEN_SPEED};
//!
//! let spec = param_spec(REG_OPEN_SPEED).unwrap();
//! assert_eq!(spec.max, 1000);
//! assert!(validate_param_value(REG_OPEN_SPEED, 500).is_ok());
//! assert!(validate_param_value(REG_OPEN_SPEED, 1001).is_err());
//! ```

pub mod device;
pub mod error;
pub mod flags;
pub mod params;
pub mod registers;

// Re-exports for convenience
pub use device::DeviceDescriptor;
pub use error::{ModelError, Result};
pub use flags::{active_errors, active_warnings};
pub use params::{param_spec, validate_param_value, ParamSpec, TUNABLE_PARAMS};
pub use registers::{
    register_kind, DeviceStatus, RegisterKind, CMD_CLOSE, CMD_OPEN, DETAIL_REG_COUNT,
    POLL_START_REG, REGS_PER_DEVICE, REG_CLOSE_SPEED, REG_CLOSE_TORQUE, REG_COMMAND, REG_DURATION,
    REG_ERRORS, REG_OPEN_SPEED, REG_OPEN_TORQUE, REG_SAMPLE_VALUE, REG_STATUS, REG_WARNINGS,
    STATUS_REG_COUNT,
};
