//! Single-shot scalar plugins: biased adder, Fibonacci and per-pixel grayscale.

use crate::DriverError;
use crate::image::convert_pixel;
use crate::map::{PluginFamily, RegisterMap};
use crate::port::RegisterPort;
use crate::request::{OperationOutcome, OperationRequest};
use crate::session::{OperationSession, PollBudget};
use rs5_common::ADD_BIAS;

/// The function a scalar plugin instance computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKernel {
    /// `a + b + 5`, wrapping.
    Adder,
    /// `fib(n)`, 0-indexed, wrapping.
    Fibonacci,
    /// RGB word to gray word, one pixel per operation.
    Grayscale,
}

impl ScalarKernel {
    pub const fn family(self) -> PluginFamily {
        match self {
            ScalarKernel::Adder | ScalarKernel::Grayscale => PluginFamily::Arithmetic,
            ScalarKernel::Fibonacci => PluginFamily::Sequence,
        }
    }

    const fn operation(self) -> &'static str {
        match self {
            ScalarKernel::Adder => "add",
            ScalarKernel::Fibonacci => "fibonacci",
            ScalarKernel::Grayscale => "grayscale",
        }
    }
}

/// What the adder is expected to return for `a` and `b`.
pub const fn expected_add(a: u32, b: u32) -> u32 {
    a.wrapping_add(b).wrapping_add(ADD_BIAS)
}

/// Iterative `fib(n)` modulo 2^32, with `fib(0) = 0` and `fib(1) = 1`.
pub const fn fibonacci_reference(n: u32) -> u32 {
    let (mut prev, mut cur) = (0u32, 1u32);
    let mut i = 0;
    while i < n {
        let next = prev.wrapping_add(cur);
        prev = cur;
        cur = next;
        i += 1;
    }
    prev
}

/// Driver for one scalar plugin instance.
///
/// # Arguments
///
/// * `port` - Bus the plugin is reachable through.
/// * `map` - Register block of the instance; its family must match `kernel`.
/// * `kernel` - Function the instance implements. Calls for any other kernel
///   fail with `Unsupported` without touching the port.
pub struct ArithmeticPlugin<P: RegisterPort> {
    session: OperationSession<P>,
    kernel: ScalarKernel,
}

impl<P: RegisterPort> ArithmeticPlugin<P> {
    pub fn new(port: P, map: RegisterMap, kernel: ScalarKernel) -> Result<Self, DriverError> {
        if kernel.family() != map.family() {
            return Err(DriverError::Unsupported {
                what: kernel.operation(),
                family: map.family(),
            });
        }
        Ok(Self {
            session: OperationSession::new(port, map),
            kernel,
        })
    }

    /// Adder at `map`.
    pub fn adder(port: P, map: RegisterMap) -> Result<Self, DriverError> {
        Self::new(port, map, ScalarKernel::Adder)
    }

    /// Fibonacci generator at `map`.
    pub fn fibonacci_unit(port: P, map: RegisterMap) -> Result<Self, DriverError> {
        Self::new(port, map, ScalarKernel::Fibonacci)
    }

    /// Per-pixel grayscale processor at `map`.
    pub fn pixel_unit(port: P, map: RegisterMap) -> Result<Self, DriverError> {
        Self::new(port, map, ScalarKernel::Grayscale)
    }

    /// Sets the poll budget of every following operation.
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.session.set_budget(budget);
        self
    }

    /// Kernel this instance was built for.
    pub fn kernel(&self) -> ScalarKernel {
        self.kernel
    }

    /// Underlying session, for status reads or a manual `wait` after a timeout.
    pub fn session_mut(&mut self) -> &mut OperationSession<P> {
        &mut self.session
    }

    /// Releases the port, ending this driver.
    pub fn into_port(self) -> P {
        self.session.into_port()
    }

    /// Hardware `a + b + 5`. The bias belongs to the plugin and is returned
    /// as-is.
    pub fn add(&mut self, a: u32, b: u32) -> OperationOutcome {
        self.run(ScalarKernel::Adder, OperationRequest::ScalarPair { a, b })
    }

    /// [`add`](Self::add) on two's-complement operands.
    pub fn add_signed(&mut self, a: i32, b: i32) -> Result<i32, DriverError> {
        self.add(a as u32, b as u32).map(|sum| sum as i32)
    }

    /// Hardware `fib(n)`.
    pub fn fibonacci(&mut self, n: u32) -> OperationOutcome {
        self.run(ScalarKernel::Fibonacci, OperationRequest::Index(n))
    }

    /// Converts one RGB word; operand B is the plugin's unused parameter and
    /// is written as zero.
    pub fn grayscale(&mut self, pixel: u32) -> OperationOutcome {
        self.run(
            ScalarKernel::Grayscale,
            OperationRequest::ScalarPair { a: pixel, b: 0 },
        )
    }

    /// Software model of this instance's kernel.
    pub fn reference(&self, a: u32, b: u32) -> u32 {
        match self.kernel {
            ScalarKernel::Adder => expected_add(a, b),
            ScalarKernel::Fibonacci => fibonacci_reference(a),
            ScalarKernel::Grayscale => convert_pixel(a),
        }
    }

    fn run(&mut self, wanted: ScalarKernel, request: OperationRequest) -> OperationOutcome {
        if wanted != self.kernel {
            return Err(DriverError::Unsupported {
                what: wanted.operation(),
                family: self.session.map().family(),
            });
        }
        self.session.execute(&request)
    }
}
