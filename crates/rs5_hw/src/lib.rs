//! Software model of the RS5 plugin hardware.
//!
//! Stands in for the Verilator co-simulation when the RTL is not available.
//! A [`SimulatedSoc`] owns a sparse system RAM and a set of plugin devices
//! decoded at fixed bases, and implements [`rs5_core::port::RegisterPort`] so
//! the driver runs against it unchanged. The model is cycle-approximate: every
//! bus read advances all devices by one tick, which makes poll counts
//! deterministic and timeouts reproducible.

/// Sparse word-addressed system memory.
pub mod ram;

/// Plugin device models and the handshake they share.
///
/// Each device decodes its own register block and implements the
/// start/busy/done discipline of the real plugin. Devices can be frozen in
/// the busy state to exercise the driver's timeout path.
pub mod device;

/// The bulk image conversion device.
pub mod image;

/// Bus, device attachment and the simulation clock.
pub mod soc;

pub use device::{PluginDevice, ScalarUnit};
pub use image::ImageUnit;
pub use soc::{PlatformLayout, SimulatedSoc};

use thiserror::Error;

/// Errors raised while assembling a simulated platform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A device block would share addresses with one already attached.
    #[error("device at {base:#010x} overlaps the device at {other:#010x}")]
    Overlap {
        /// Base of the rejected device
        base: usize,
        /// Base of the device already attached
        other: usize,
    },

    /// A device base is not word aligned or its block leaves the address space.
    #[error("invalid device base {base:#010x}")]
    InvalidBase {
        /// Rejected base address
        base: usize,
    },

    /// No device is decoded at the given base.
    #[error("no device attached at {base:#010x}")]
    NoDevice {
        /// Base address that was looked up
        base: usize,
    },
}
