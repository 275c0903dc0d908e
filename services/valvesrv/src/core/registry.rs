//! Ordered device registry.
//!
//! Insertion order is load-bearing: it defines the round-robin polling order.

use valvelink_model::DeviceDescriptor;

use crate::error::{Result, ValveSrvError};

/// Ordered set of device descriptors keyed by bus address.
///
/// Plain data structure; concurrency is handled by the repository that owns
/// it ([`crate::core::state::StateRepository`]).
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Fails when the address is already registered.
    pub fn add(&mut self, descriptor: DeviceDescriptor) -> Result<()> {
        if self.devices.iter().any(|d| d.id == descriptor.id) {
            return Err(ValveSrvError::duplicate_id(descriptor.id));
        }
        self.devices.push(descriptor);
        Ok(())
    }

    /// Remove a descriptor. Returns whether anything was removed.
    pub fn remove(&mut self, id: u8) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.id != id);
        self.devices.len() != before
    }

    /// Rename a device; the rest of its state is untouched.
    pub fn rename(&mut self, id: u8, name: impl Into<String>) -> Result<()> {
        match self.devices.iter_mut().find(|d| d.id == id) {
            Some(device) => {
                device.name = name.into();
                Ok(())
            }
            None => Err(ValveSrvError::device_not_found(id)),
        }
    }

    pub fn contains(&self, id: u8) -> bool {
        self.devices.iter().any(|d| d.id == id)
    }

    pub fn get(&self, id: u8) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Descriptors in insertion (= polling) order
    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.iter()
    }

    /// Bus addresses in insertion (= polling) order
    pub fn ids(&self) -> Vec<u8> {
        self.devices.iter().map(|d| d.id).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: u8, name: &str) -> DeviceDescriptor {
        DeviceDescriptor::new(id, name).unwrap()
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut registry = DeviceRegistry::new();
        registry.add(descriptor(1, "A")).unwrap();

        let err = registry.add(descriptor(1, "B")).unwrap_err();
        assert!(matches!(err, ValveSrvError::DeviceError(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut registry = DeviceRegistry::new();
        registry.add(descriptor(1, "A")).unwrap();

        assert!(registry.remove(1));
        assert!(!registry.remove(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rename_only_changes_name() {
        let mut registry = DeviceRegistry::new();
        registry.add(descriptor(2, "Old")).unwrap();
        registry.rename(2, "New").unwrap();

        assert_eq!(registry.get(2).unwrap().name, "New");
        assert!(registry.rename(9, "Ghost").is_err());
    }

    #[test]
    fn test_iteration_keeps_insertion_order() {
        let mut registry = DeviceRegistry::new();
        for id in [5, 1, 9, 3] {
            registry.add(descriptor(id, "dev")).unwrap();
        }
        assert_eq!(registry.ids(), vec![5, 1, 9, 3]);

        // Removal keeps relative order of the rest
        registry.remove(1);
        assert_eq!(registry.ids(), vec![5, 9, 3]);
    }
}
