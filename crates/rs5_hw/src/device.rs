use crate::ram::Ram;
use rs5_common::ADD_BIAS;
use rs5_common::regs::scalar;
use rs5_core::arith::ScalarKernel;
use rs5_core::codec::{ControlStatus, ControlStatusCodec};
use rs5_core::map::PluginFamily;

/// A memory-mapped plugin as seen from the bus.
///
/// Offsets are relative to the device base and always word aligned.
pub trait PluginDevice: Send {
    fn family(&self) -> PluginFamily;

    /// Register read. Reading has no side effect on the device.
    fn read(&mut self, offset: usize) -> u32;

    /// Register write.
    fn write(&mut self, offset: usize, value: u32);

    /// Advances the device by one clock tick.
    fn tick(&mut self, ram: &mut Ram);

    /// Freezes the device: once stuck, a started operation never finishes.
    fn set_stuck(&mut self, stuck: bool);

    /// Register writes the device dropped because it was busy.
    fn ignored_writes(&self) -> u64 {
        0
    }
}

/// RTL pixel datapath: sum the three colour bytes, drop two bits, replicate.
pub(crate) fn gray_word(pixel: u32) -> u32 {
    let [r, g, b, _] = pixel.to_be_bytes();
    let gray = ((r as u32 + g as u32 + b as u32) >> 2) as u8;
    u32::from_be_bytes([gray, gray, gray, 0])
}

/// Start/busy/done state shared by every plugin model.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Handshake {
    pub busy: bool,
    pub done: bool,
    pub stuck: bool,
}

impl Handshake {
    pub fn status_word(&self) -> u32 {
        ControlStatusCodec::encode_status(ControlStatus {
            busy: self.busy,
            done: self.done,
        })
    }

    /// Enters busy. `done` stays low until [`finish`](Self::finish).
    pub fn begin(&mut self) {
        self.busy = true;
        self.done = false;
    }

    pub fn finish(&mut self) {
        self.busy = false;
        self.done = true;
    }

    /// True if the clock should advance this device's operation.
    pub fn running(&self) -> bool {
        self.busy && !self.stuck
    }
}

/// Two-operand plugin: adder, Fibonacci generator or per-pixel converter.
///
/// The adder and the pixel converter take `latency` ticks. The Fibonacci
/// generator iterates once per tick and needs `n + 1` ticks for `fib(n)`.
#[derive(Debug)]
pub struct ScalarUnit {
    kernel: ScalarKernel,
    latency: u32,
    a: u32,
    b: u32,
    result: u32,
    remaining: u32,
    fib: (u32, u32),
    hs: Handshake,
    ignored: u64,
}

impl ScalarUnit {
    /// Idle unit running `kernel`.
    ///
    /// # Arguments
    ///
    /// * `kernel` - Operation computed on start
    /// * `latency` - Ticks the adder and pixel kernels stay busy; `0` completes on start.
    ///   The Fibonacci kernel ignores it and takes `n + 1` ticks for `fib(n)`
    pub fn new(kernel: ScalarKernel, latency: u32) -> Self {
        Self {
            kernel,
            latency,
            a: 0,
            b: 0,
            result: 0,
            remaining: 0,
            fib: (0, 1),
            hs: Handshake::default(),
            ignored: 0,
        }
    }

    /// Adder with the fixed hardware bias.
    pub fn adder(latency: u32) -> Self {
        Self::new(ScalarKernel::Adder, latency)
    }

    /// Iterative Fibonacci generator.
    pub fn fibonacci() -> Self {
        Self::new(ScalarKernel::Fibonacci, 0)
    }

    /// Single-pixel grayscale processor.
    pub fn pixel(latency: u32) -> Self {
        Self::new(ScalarKernel::Grayscale, latency)
    }

    fn start(&mut self) {
        self.hs.begin();
        match self.kernel {
            ScalarKernel::Fibonacci => {
                self.fib = (0, 1);
                self.remaining = self.a;
            }
            ScalarKernel::Adder | ScalarKernel::Grayscale => {
                self.remaining = self.latency;
                if self.latency == 0 {
                    self.complete();
                }
            }
        }
        tracing::debug!(kernel = ?self.kernel, a = self.a, b = self.b, "scalar unit started");
    }

    fn complete(&mut self) {
        self.result = match self.kernel {
            ScalarKernel::Adder => self.a.wrapping_add(self.b).wrapping_add(ADD_BIAS),
            ScalarKernel::Fibonacci => self.fib.0,
            ScalarKernel::Grayscale => gray_word(self.a),
        };
        self.hs.finish();
    }
}

impl PluginDevice for ScalarUnit {
    fn family(&self) -> PluginFamily {
        self.kernel.family()
    }

    fn read(&mut self, offset: usize) -> u32 {
        match offset {
            scalar::OPERAND_A => self.a,
            scalar::OPERAND_B => self.b,
            scalar::RESULT => self.result,
            scalar::CONTROL => self.hs.status_word(),
            _ => 0,
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        if self.hs.busy {
            self.ignored += 1;
            return;
        }
        match offset {
            scalar::OPERAND_A => self.a = value,
            scalar::OPERAND_B => self.b = value,
            scalar::CONTROL if ControlStatusCodec::decode(value).busy => self.start(),
            _ => {}
        }
    }

    fn tick(&mut self, _ram: &mut Ram) {
        if !self.hs.running() {
            return;
        }
        match self.kernel {
            ScalarKernel::Fibonacci => {
                if self.remaining == 0 {
                    self.complete();
                } else {
                    let (prev, cur) = self.fib;
                    self.fib = (cur, prev.wrapping_add(cur));
                    self.remaining -= 1;
                }
            }
            ScalarKernel::Adder | ScalarKernel::Grayscale => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.complete();
                }
            }
        }
    }

    fn set_stuck(&mut self, stuck: bool) {
        self.hs.stuck = stuck;
    }

    fn ignored_writes(&self) -> u64 {
        self.ignored
    }
}
