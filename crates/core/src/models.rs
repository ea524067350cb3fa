use serde::{Deserialize, Serialize};

pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";
pub const UNKNOWN_MODEL_NAME: &str = "Unknown Model";
pub const UNKNOWN_MANUFACTURER: &str = "Unknown";
pub const UNKNOWN_UDN: &str = "unknown-udn";
pub const UNKNOWN_DEVICE_TYPE: &str = "unknown";

/// A UPnP media renderer discovered on the network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// URL of the device description document
    pub location: String,
    /// UDN, the stable device identity
    pub unique_id: String,
    pub friendly_name: String,
    pub model_name: String,
    pub manufacturer: String,
    /// Device type URN (e.g. "urn:schemas-upnp-org:device:MediaRenderer:1")
    pub device_type: String,
    /// Absolute AVTransport control URL, if the description exposed one
    #[serde(default)]
    pub control_endpoint: Option<String>,
}

impl Device {
    /// Create a device with placeholder identity fields
    pub fn new(location: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            unique_id: unique_id.into(),
            friendly_name: UNKNOWN_DEVICE_NAME.to_string(),
            model_name: UNKNOWN_MODEL_NAME.to_string(),
            manufacturer: UNKNOWN_MANUFACTURER.to_string(),
            device_type: UNKNOWN_DEVICE_TYPE.to_string(),
            control_endpoint: None,
        }
    }

    pub fn with_control_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.control_endpoint = Some(endpoint.into());
        self
    }

    /// Whether an AVTransport endpoint was resolved for this device
    pub fn is_castable(&self) -> bool {
        self.control_endpoint.is_some()
    }

    /// Case-insensitive match on the UDN or a fragment of the friendly name
    pub fn matches(&self, query: &str) -> bool {
        if self.unique_id == query {
            return true;
        }
        let query = query.trim().to_lowercase();
        !query.is_empty() && self.friendly_name.to_lowercase().contains(&query)
    }
}
