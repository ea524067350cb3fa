use crate::models::Device;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Result of merging a device into the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First record for this UDN
    Inserted,
    /// The stored record was replaced
    Updated,
    /// The stored record already had a control endpoint and the new one did not
    Unchanged,
}

/// In-memory set of discovered devices keyed by UDN
///
/// Records keep their first-seen order. Merges are monotonic: once a device
/// has a control endpoint, a later record without one never replaces it.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device, or refresh the stored record with the same UDN
    pub fn merge(&self, device: Device) -> MergeOutcome {
        let mut devices = self.write();

        match devices.iter().position(|d| d.unique_id == device.unique_id) {
            Some(idx) => {
                if device.control_endpoint.is_some() || devices[idx].control_endpoint.is_none() {
                    debug!("Updating device: {} ({})", device.friendly_name, device.unique_id);
                    devices[idx] = device;
                    MergeOutcome::Updated
                } else {
                    debug!(
                        "Keeping stored record for {}, new record has no control endpoint",
                        device.unique_id
                    );
                    MergeOutcome::Unchanged
                }
            }
            None => {
                match &device.control_endpoint {
                    Some(endpoint) => info!(
                        "New device: {} (control endpoint {})",
                        device.friendly_name, endpoint
                    ),
                    None => warn!(
                        "New device: {} (no AVTransport control endpoint)",
                        device.friendly_name
                    ),
                }
                devices.push(device);
                MergeOutcome::Inserted
            }
        }
    }

    /// Remove every device (done before a fresh scan)
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Snapshot of all devices in discovery order
    pub fn devices(&self) -> Vec<Device> {
        self.read().clone()
    }

    /// Devices that have a control endpoint
    pub fn castable(&self) -> Vec<Device> {
        self.read().iter().filter(|d| d.is_castable()).cloned().collect()
    }

    pub fn get(&self, unique_id: &str) -> Option<Device> {
        self.read().iter().find(|d| d.unique_id == unique_id).cloned()
    }

    /// First device whose UDN or friendly name matches `query`
    pub fn find(&self, query: &str) -> Option<Device> {
        self.read().iter().find(|d| d.matches(query)).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the Vec half-written,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Device>> {
        self.devices.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Device>> {
        self.devices.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry shared between discovery tasks and the front end
pub type SharedDeviceRegistry = Arc<DeviceRegistry>;
