//! Error handling for the valve communication service
//!
//! Service-level errors that reach callers. Exchange-level failures live in
//! [`crate::core::transport::TransportError`] and never leave the scheduler;
//! they surface only as liveness state on the affected device.

use thiserror::Error;

/// Valve Service Error Type
#[derive(Error, Debug, Clone)]
pub enum ValveSrvError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection establishment errors (fatal to a connect attempt)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Device registry errors (duplicate id, unknown device, bad descriptor)
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Input/Output operation errors (persistence, log files)
    #[error("IO error: {0}")]
    IoError(String),

    /// State and lifecycle errors
    #[error("State error: {0}")]
    StateError(String),
}

/// Result type alias for the valve service
pub type Result<T> = std::result::Result<T, ValveSrvError>;

impl ValveSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        ValveSrvError::ConfigError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        ValveSrvError::ConnectionError(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        ValveSrvError::DeviceError(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        ValveSrvError::IoError(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        ValveSrvError::StateError(msg.into())
    }

    // Convenience constructors for specific cases
    pub fn duplicate_id(id: u8) -> Self {
        ValveSrvError::DeviceError(format!("Device already exists: {}", id))
    }

    pub fn device_not_found(id: u8) -> Self {
        ValveSrvError::DeviceError(format!("Device not found: {}", id))
    }

    pub fn not_connected() -> Self {
        ValveSrvError::ConnectionError("Not connected".to_string())
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<std::io::Error> for ValveSrvError {
    fn from(err: std::io::Error) -> Self {
        ValveSrvError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ValveSrvError {
    fn from(err: serde_json::Error) -> Self {
        ValveSrvError::IoError(format!("JSON: {err}"))
    }
}

impl From<valvelink_model::ModelError> for ValveSrvError {
    fn from(err: valvelink_model::ModelError) -> Self {
        ValveSrvError::DeviceError(err.to_string())
    }
}

impl From<figment::Error> for ValveSrvError {
    fn from(err: figment::Error) -> Self {
        ValveSrvError::ConfigError(err.to_string())
    }
}
