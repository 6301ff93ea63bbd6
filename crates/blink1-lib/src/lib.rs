//! blink1: control blink(1) USB notification lights.
//!
//! Devices are found and opened through a [`registry::DeviceRegistry`],
//! driven through [`blink1::Blink1`], and spoken to over a
//! [`device::Transport`] (USB HID in production, a mock in tests).

pub mod blink1;
pub mod config;
pub mod device;
pub mod error;
pub mod led;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod report;

pub use error::Blink1Error;
