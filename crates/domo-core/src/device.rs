//! Device (lamp) records.

use serde::{Deserialize, Serialize};

/// A stored device and its on/off status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Store-assigned identifier.
    pub id: i64,
    /// `true` when the device is switched on.
    pub status: bool,
    /// Display name.
    pub name: String,
}

/// Payload for creating a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    /// Initial status.
    pub status: bool,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Payload for updating a device. Absent fields keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    /// New status.
    pub status: bool,
    /// New name, if renaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
