//! Domain payloads returned inside the response envelope.

use std::collections::HashMap;

use serde::Deserialize;

/// Device categories the service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum DeviceType {
    /// Wifi bridge relaying sensor readings to the cloud.
    Bridge,
    /// The strap-on water-flow sensor itself.
    Sensor,
    /// Anything the service adds later.
    Other(i64),
}

impl From<i64> for DeviceType {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Bridge,
            2 => Self::Sensor,
            other => Self::Other(other),
        }
    }
}

impl DeviceType {
    pub fn is_sensor(self) -> bool {
        self == Self::Sensor
    }
}

/// One device record as returned by `/<uid>/devices`.
///
/// The device endpoints return any device type; callers that only want the
/// flow sensor must check [`device_type`](Self::device_type) themselves.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    #[serde(default)]
    pub bridge_id: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub connected: Option<bool>,
    /// Reported as a coarse label ("low", "medium", "high"), not a number.
    #[serde(default)]
    pub battery_level: Option<String>,
    /// Service-local timestamp string; format is not documented, so it is
    /// passed through untouched.
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

/// Installation location metadata attached to a device.
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
}

/// Result of a water-use query: buckets keyed by the request id that asked
/// for them.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageQueryResult(pub HashMap<String, Vec<UsageSample>>);

/// One time/value pair from a usage query bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageSample {
    #[serde(default)]
    pub datetime: Option<String>,
    pub value: f64,
}
