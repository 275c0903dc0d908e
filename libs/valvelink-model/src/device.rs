//! Device descriptors.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Lowest valid slave address on the bus
pub const MIN_BUS_ADDRESS: u8 = 1;
/// Highest valid slave address on the bus
pub const MAX_BUS_ADDRESS: u8 = 247;

/// A device registered on the shared bus.
///
/// The `id` doubles as the slave address for the wire protocol and must be
/// unique within a registry. Iteration order of descriptors defines the
/// round-robin polling order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Slave address (1-247), unique per bus
    pub id: u8,
    /// Operator-facing display name
    pub name: String,
}

impl DeviceDescriptor {
    /// Create a descriptor, validating the bus address.
    pub fn new(id: u8, name: impl Into<String>) -> Result<Self> {
        if !(MIN_BUS_ADDRESS..=MAX_BUS_ADDRESS).contains(&id) {
            return Err(ModelError::InvalidAddress(id as u16));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::InvalidName("name cannot be empty".to_string()));
        }
        Ok(Self { id, name })
    }
}
