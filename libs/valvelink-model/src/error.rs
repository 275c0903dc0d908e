//! Error types for the model library.

use thiserror::Error;

/// Model validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Bus address outside the valid slave range
    #[error("Invalid bus address {0}: must be 1-247")]
    InvalidAddress(u16),

    /// Register is not part of the device map
    #[error("Unknown register {0}")]
    UnknownRegister(u16),

    /// Register exists but cannot be written
    #[error("Register {0} is read-only")]
    NotWritable(u16),

    /// Value outside the declared parameter range
    #[error("Value {value} for register {register} out of range {min}..={max}")]
    OutOfRange {
        register: u16,
        value: u16,
        min: u16,
        max: u16,
    },

    /// Device name failed validation
    #[error("Invalid device name: {0}")]
    InvalidName(String),
}

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
