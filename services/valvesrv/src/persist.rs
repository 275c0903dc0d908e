//! Device list persistence collaborator.
//!
//! The core only needs a seed list at startup and a save-on-change hook;
//! the JSON file implementation mirrors the operator panel's `devices.json`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use valvelink_model::DeviceDescriptor;

use crate::error::Result;

/// Storage seam for the registered device list.
pub trait DeviceStore: Send + Sync + fmt::Debug {
    /// Load the seed list. An absent backing store yields an empty list.
    fn load(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Persist the full list. Called on every registry change.
    fn save(&self, devices: &[DeviceDescriptor]) -> Result<()>;
}

/// JSON-file device store
#[derive(Debug)]
pub struct JsonDeviceStore {
    path: PathBuf,
}

impl JsonDeviceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DeviceStore for JsonDeviceStore {
    fn load(&self) -> Result<Vec<DeviceDescriptor>> {
        if !self.path.exists() {
            debug!("Device file {:?} not found, starting empty", self.path);
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let devices: Vec<DeviceDescriptor> = serde_json::from_str(&raw)?;
        Ok(devices)
    }

    fn save(&self, devices: &[DeviceDescriptor]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(devices)?;
        fs::write(&self.path, raw)?;
        debug!("Saved {} devices to {:?}", devices.len(), self.path);
        Ok(())
    }
}
