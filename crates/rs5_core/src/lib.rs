//! Register-level driver for the RS5 plugin accelerators.
//!
//! Every plugin is a small memory-mapped register block driven by the same
//! protocol: write the operands, write the start bit, poll the control/status
//! register within a bounded budget, then read the result. This crate holds
//! that protocol and the register maps of the three plugin families. It is
//! `no_std` so the same code runs on the RISC-V core and on the host against
//! the software model.

#![cfg_attr(not(test), no_std)]

/// Register addressing and the word-granular bus abstraction.
///
/// [`port::RegisterPort`] is the only place raw addresses are dereferenced.
/// The memory-mapped implementation performs volatile accesses in program
/// order; other implementations forward to a simulator or a co-simulation
/// bridge.
pub mod port;

/// Bit layout of the shared control/status register.
pub mod codec;

/// Per-family register layouts and the completion discipline of each
/// plugin instance.
pub mod map;

/// Operand shapes a session can execute and the outcome type.
pub mod request;

/// The bounded start/poll/read protocol.
///
/// Owns a port and a register map, and turns one request into one outcome.
/// Polling never exceeds the configured budget, so a plugin that never
/// finishes yields `Timeout` rather than a hang.
pub mod session;

/// Adder, Fibonacci and per-pixel grayscale plugins.
pub mod arith;

/// Bulk RGB to grayscale conversion over memory regions.
///
/// Besides the plugin driver this module defines the pixel arithmetic the
/// hardware implements, so callers can check converted buffers in software.
pub mod image;

#[cfg(test)]
mod testing;

use map::PluginFamily;

/// Failure modes of a plugin operation.
///
/// None of them is fatal. Each is returned to the caller, which decides
/// whether to retry with a fresh start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The plugin did not report completion within the poll budget.
    ///
    /// `polls` is the number of status reads issued, which always equals the
    /// budget. The plugin is left as the hardware left it.
    ///
    /// For busy-clear plugins this means `busy` stayed set. A done-bit plugin
    /// also times out when it reads idle with `done` clear for the whole
    /// budget, which happens when the start command never latched. The two
    /// cases look the same to the driver; a following [`status`] read tells
    /// them apart.
    ///
    /// [`status`]: session::OperationSession::status
    Timeout { polls: u32 },

    /// A region was empty or inconsistent, or configuration was attempted
    /// while the plugin was busy. Nothing was written.
    InvalidConfiguration(&'static str),

    /// The request or register does not exist for this plugin family.
    Unsupported {
        what: &'static str,
        family: PluginFamily,
    },
}

impl core::fmt::Display for DriverError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DriverError::Timeout { polls } => {
                write!(f, "plugin did not complete within {polls} polls")
            }
            DriverError::InvalidConfiguration(reason) => {
                write!(f, "invalid configuration: {reason}")
            }
            DriverError::Unsupported { what, family } => {
                write!(f, "{what} is not supported by the {family} plugin")
            }
        }
    }
}

impl core::error::Error for DriverError {}
