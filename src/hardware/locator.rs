//! Sensor device discovery.
//!
//! Enumerates the host's serial ports and picks the first one whose
//! human-readable description contains one of the configured hints
//! (`"arduino"`, `"usb serial device"` by default). Matching is
//! case-insensitive. Discovery runs once at startup; there is no re-scan.

use serialport::{SerialPortInfo, SerialPortType};
use tracing::debug;

use crate::error::IngestResult;

/// A serial port as seen by the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// OS device path (e.g. `/dev/ttyACM0`, `COM3`)
    pub port_name: String,
    /// Human-readable description used for matching
    pub description: String,
}

impl DeviceCandidate {
    /// Create a candidate from a path and description.
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
        }
    }

    /// True if the description contains any of `hints` (already lower-cased).
    pub fn matches(&self, hints: &[String]) -> bool {
        let description = self.description.to_lowercase();
        hints.iter().any(|hint| description.contains(hint.as_str()))
    }
}

impl From<&SerialPortInfo> for DeviceCandidate {
    fn from(info: &SerialPortInfo) -> Self {
        Self::new(info.port_name.clone(), describe(info))
    }
}

/// Build a description string from port metadata.
///
/// USB ports report product and manufacturer (e.g. `"Arduino Uno (Arduino LLC)"`);
/// other port types fall back to the type name.
pub fn describe(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let parts: Vec<&str> = [usb.product.as_deref(), usb.manufacturer.as_deref()]
                .into_iter()
                .flatten()
                .filter(|s| !s.trim().is_empty())
                .collect();
            match parts.as_slice() {
                [] => format!("USB Serial Device {:04x}:{:04x}", usb.vid, usb.pid),
                [only] => (*only).to_string(),
                [product, manufacturer, ..] => format!("{} ({})", product, manufacturer),
            }
        }
        SerialPortType::PciPort => "PCI Port".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth Port".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

/// Enumerate serial ports visible to the host.
pub fn enumerate() -> IngestResult<Vec<DeviceCandidate>> {
    let ports = serialport::available_ports()?;
    Ok(ports.iter().map(DeviceCandidate::from).collect())
}

/// Pick the first candidate matching any hint, in enumeration order.
pub fn select_device<'a>(
    candidates: &'a [DeviceCandidate],
    hints: &[String],
) -> Option<&'a DeviceCandidate> {
    candidates.iter().find(|candidate| {
        let matched = candidate.matches(hints);
        debug!(
            port = %candidate.port_name,
            description = %candidate.description,
            matched,
            "Inspected serial port"
        );
        matched
    })
}

/// Enumerate ports and return the first match, or `None`.
pub fn locate(hints: &[String]) -> IngestResult<Option<DeviceCandidate>> {
    locate_with(enumerate, hints)
}

/// [`locate`] over an arbitrary port listing.
pub fn locate_with<F>(list: F, hints: &[String]) -> IngestResult<Option<DeviceCandidate>>
where
    F: FnOnce() -> IngestResult<Vec<DeviceCandidate>>,
{
    let candidates = list()?;
    Ok(select_device(&candidates, hints).cloned())
}
