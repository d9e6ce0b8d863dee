//! Sensor hardware access
//!
//! - `locator`: finds the sensor among the host's serial ports
//! - `session`: line-oriented serial session with bounded reads and reopen
//! - `mock`: scripted line source for tests without a device

pub mod locator;
pub mod mock;
pub mod session;

pub use locator::{locate, locate_with, select_device, DeviceCandidate};
pub use session::{LineRead, LineSource, SerialSession, SerialSettings};
