//! Common definitions and constants shared across the RS5 plugin system.
//!
//! This crate provides the default memory-mapped addresses of the plugin
//! accelerators and simulation peripherals, the register offsets of each
//! plugin family, and the bit layout of the shared control/status register.
//! Everything here is a default: drivers receive their addresses through an
//! explicit register map built at construction time.

#![no_std]

// Memory-mapped address space defaults for the RS5 co-simulation platform.
//
// These addresses match the testbench memory map used by the plugin test
// programs. Host tools load them into their configuration when no override
// is supplied.
pub mod mmio {
    /// Base address of the plugin register block.
    ///
    /// An RTL build wires one plugin here. Platforms carrying several plugins
    /// place them at `PLUGIN_BASE + n * PLUGIN_STRIDE`.
    pub const PLUGIN_BASE: usize = 0x1000_0000;

    /// Distance between consecutive plugin blocks on a multi-plugin bus.
    pub const PLUGIN_STRIDE: usize = 0x100;

    /// Writing any value here ends the simulation.
    pub const SIM_END_ADDR: usize = 0x8000_0000;

    /// Start of the debug output region inspected in the simulation log.
    ///
    /// The harness writes observed results and pass/fail words here. The
    /// driver never touches it.
    pub const DEBUG_OUTPUT_BASE: usize = 0x8000_1000;

    /// Default base of the packed RGB input buffer for region operations.
    pub const IMAGE_INPUT_BASE: usize = 0x8000_2000;

    /// Default base of the packed grayscale output buffer.
    pub const IMAGE_OUTPUT_BASE: usize = 0x8000_3000;

    /// Width in bytes of every plugin register and every packed pixel.
    pub const WORD_BYTES: usize = 4;
}

/// Register offsets for each plugin family, relative to the plugin base.
pub mod regs {
    /// Two-operand layout shared by the adder, Fibonacci and pixel plugins.
    pub mod scalar {
        /// First operand (write).
        pub const OPERAND_A: usize = 0x00;
        /// Second operand (write).
        pub const OPERAND_B: usize = 0x04;
        /// Result (read). Valid once the operation completes.
        pub const RESULT: usize = 0x08;
        /// Control/status (read/write).
        pub const CONTROL: usize = 0x0C;
        /// Bytes decoded by one scalar plugin instance.
        pub const SPAN: usize = 0x10;
    }

    /// Region layout of the image conversion plugin.
    pub mod region {
        /// First byte of the packed RGB input range.
        pub const IN_START: usize = 0x00;
        /// One past the last byte of the input range.
        pub const IN_END: usize = 0x04;
        /// First byte of the packed grayscale output range.
        pub const OUT_START: usize = 0x08;
        /// One past the last byte of the output range.
        pub const OUT_END: usize = 0x0C;
        /// Image width in pixels.
        pub const WIDTH: usize = 0x10;
        /// Image height in pixels.
        pub const HEIGHT: usize = 0x14;
        /// Control/status (read/write).
        pub const CONTROL: usize = 0x18;
        /// Elements produced so far by the running operation (read).
        pub const PROGRESS: usize = 0x1C;
        /// Bytes decoded by one image plugin instance.
        pub const SPAN: usize = 0x20;
    }

    /// Control/status register bit definitions.
    ///
    /// Bit 0 is write-side "start" and read-side "busy". Bit 1 is the
    /// read-only "done" flag. All other bits are reserved.
    pub mod status {
        /// Operation in progress (read).
        pub const BUSY: u32 = 1 << 0;
        /// Result valid and stable (read).
        pub const DONE: u32 = 1 << 1;
    }

    /// Control register command values.
    pub mod control {
        /// Requests the start of a new operation.
        pub const START: u32 = 1 << 0;
    }
}

/// Fixed additive constant applied by the adder plugin: `a + b + ADD_BIAS`.
///
/// This is a property of the RTL, not a driver parameter.
pub const ADD_BIAS: u32 = 5;

/// Default number of status polls before an operation is reported as timed out.
///
/// Covers the fixed-latency plugins and image regions of up to about a
/// thousand pixels. The Fibonacci plugin needs `n + 1` ticks for `fib(n)`
/// and larger regions need one poll per pixel, so hosts raise the budget for
/// those operations.
pub const DEFAULT_POLL_BUDGET: u32 = 1000;
