//! Bounded start/poll/read protocol shared by every plugin family.
//!
//! An [`OperationSession`] owns one plugin's register map and a port to reach
//! it. Executing a request writes the operands, issues the start command, then
//! polls the control/status register at most `budget` times. The loop never
//! spins unbounded and never sleeps: the budget is the only notion of time.

use crate::DriverError;
use crate::codec::{ControlStatus, ControlStatusCodec};
use crate::image::ImageRegion;
use crate::map::{CompletionSignal, PluginFamily, Register, RegisterMap};
use crate::port::RegisterPort;
use crate::request::{OperationOutcome, OperationRequest};
use rs5_common::DEFAULT_POLL_BUDGET;

/// Maximum number of status reads before an operation is declared timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollBudget(u32);

impl PollBudget {
    /// A budget of zero polls times out immediately after start.
    pub const fn new(polls: u32) -> Self {
        Self(polls)
    }

    /// Maximum number of status reads.
    pub const fn polls(self) -> u32 {
        self.0
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        Self(DEFAULT_POLL_BUDGET)
    }
}

/// Receives progress samples of a running region operation.
pub trait ProgressObserver {
    /// Called with the progress register value on every poll that finds the
    /// plugin still running, and once more with the final value.
    fn on_progress(&mut self, elements: u32);
}

impl<F: FnMut(u32)> ProgressObserver for F {
    fn on_progress(&mut self, elements: u32) {
        self(elements)
    }
}

/// Observer that discards every sample.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _elements: u32) {}
}

/// Executes requests against one plugin instance.
///
/// The session is the exclusive owner of its register map. Only one operation
/// is ever in flight, because every method takes `&mut self`.
pub struct OperationSession<P: RegisterPort> {
    port: P,
    map: RegisterMap,
    budget: PollBudget,
}

impl<P: RegisterPort> OperationSession<P> {
    /// Creates a session that drives the plugin described by `map` through `port`.
    ///
    /// # Arguments
    ///
    /// * `port` - Bus the plugin registers are reached through, owned or borrowed
    /// * `map` - Register layout of the instance; fixed for the life of the session
    ///
    /// # Returns
    ///
    /// A session with the default budget of [`DEFAULT_POLL_BUDGET`] polls.
    ///
    /// [`DEFAULT_POLL_BUDGET`]: rs5_common::DEFAULT_POLL_BUDGET
    pub fn new(port: P, map: RegisterMap) -> Self {
        Self {
            port,
            map,
            budget: PollBudget::default(),
        }
    }

    /// Builder form of [`set_budget`](Self::set_budget).
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Replaces the poll budget used by subsequent operations.
    pub fn set_budget(&mut self, budget: PollBudget) {
        self.budget = budget;
    }

    /// Budget applied to the next operation.
    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Register map this session was built for.
    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    /// Gives the port back, ending the session.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Reads and decodes the control/status register.
    pub fn status(&mut self) -> Result<ControlStatus, DriverError> {
        let control = self.map.address(Register::Control)?;
        Ok(ControlStatusCodec::decode(self.port.read(control)))
    }

    /// Reads the progress register of a region plugin.
    pub fn progress(&mut self) -> Result<u32, DriverError> {
        let addr = self.map.address(Register::Progress)?;
        Ok(self.port.read(addr))
    }

    /// Runs `request` to completion or timeout without observing progress.
    pub fn execute(&mut self, request: &OperationRequest) -> OperationOutcome {
        self.execute_observed(request, &mut NoProgress)
    }

    /// Runs `request`: write operands, start, poll, read the result.
    ///
    /// Shape mismatches and configuration errors are reported before the
    /// first register access. A timeout leaves the plugin as the hardware
    /// left it. The next start is the only way to re-arm it.
    pub fn execute_observed(
        &mut self,
        request: &OperationRequest,
        observer: &mut dyn ProgressObserver,
    ) -> OperationOutcome {
        if request.family() != self.map.family() {
            return Err(DriverError::Unsupported {
                what: request.shape(),
                family: self.map.family(),
            });
        }
        self.write_operands(request)?;
        self.start()?;
        self.wait(observer)
    }

    /// Writes the six region registers, refusing to do so while busy.
    ///
    /// The plugin latches its configuration only while idle, so the status is
    /// checked first and nothing is written if an operation is in flight.
    pub fn configure_region(&mut self, region: &ImageRegion) -> Result<(), DriverError> {
        if self.map.family() != PluginFamily::Region {
            return Err(DriverError::Unsupported {
                what: "region",
                family: self.map.family(),
            });
        }
        if !self.status()?.is_idle() {
            tracing::warn!(base = self.map.base(), "refusing region configuration while busy");
            return Err(DriverError::InvalidConfiguration(
                "region registers written while the plugin is busy",
            ));
        }
        let fields = [
            (Register::InStart, region.in_start()),
            (Register::InEnd, region.in_end()),
            (Register::OutStart, region.out_start()),
            (Register::OutEnd, region.out_end()),
            (Register::Width, region.width()),
            (Register::Height, region.height()),
        ];
        // All six addresses resolve before the first store.
        let mut resolved = [(self.map.address(Register::InStart)?, 0u32); 6];
        for (slot, (reg, value)) in resolved.iter_mut().zip(fields) {
            *slot = (self.map.address(reg)?, value);
        }
        for (addr, value) in resolved {
            self.port.write(addr, value);
        }
        Ok(())
    }

    /// Issues the start command.
    pub fn start(&mut self) -> Result<(), DriverError> {
        let control = self.map.address(Register::Control)?;
        tracing::debug!(family = %self.map.family(), base = self.map.base(), "start");
        self.port.write(control, ControlStatusCodec::encode_start());
        Ok(())
    }

    /// Polls until the plugin completes or the budget runs out.
    ///
    /// On timeout exactly `budget` status reads have been issued.
    pub fn wait(&mut self, observer: &mut dyn ProgressObserver) -> OperationOutcome {
        let control = self.map.address(Register::Control)?;
        let progress = match self.map.family() {
            PluginFamily::Region => Some(self.map.address(Register::Progress)?),
            PluginFamily::Arithmetic | PluginFamily::Sequence => None,
        };

        for poll in 1..=self.budget.polls() {
            let status = ControlStatusCodec::decode(self.port.read(control));
            if self.is_complete(status) {
                let value = self.read_result()?;
                if progress.is_some() {
                    observer.on_progress(value);
                }
                tracing::debug!(polls = poll, value, "operation complete");
                return Ok(value);
            }
            if let Some(addr) = progress {
                let elements = self.port.read(addr);
                tracing::trace!(poll, elements, "progress");
                observer.on_progress(elements);
            }
        }

        tracing::warn!(
            family = %self.map.family(),
            base = self.map.base(),
            polls = self.budget.polls(),
            "operation timed out"
        );
        Err(DriverError::Timeout {
            polls: self.budget.polls(),
        })
    }

    fn is_complete(&self, status: ControlStatus) -> bool {
        match self.map.completion() {
            CompletionSignal::BusyClear => !status.busy,
            CompletionSignal::DoneBit => status.done && !status.busy,
        }
    }

    fn write_operands(&mut self, request: &OperationRequest) -> Result<(), DriverError> {
        match *request {
            OperationRequest::ScalarPair { a, b } => self.write_scalars(a, b),
            OperationRequest::Index(n) => self.write_scalars(n, 0),
            OperationRequest::Region(ref region) => self.configure_region(region),
        }
    }

    fn write_scalars(&mut self, a: u32, b: u32) -> Result<(), DriverError> {
        let op_a = self.map.address(Register::OperandA)?;
        let op_b = self.map.address(Register::OperandB)?;
        self.port.write(op_a, a);
        self.port.write(op_b, b);
        Ok(())
    }

    fn read_result(&mut self) -> OperationOutcome {
        let reg = match self.map.family() {
            PluginFamily::Region => Register::Progress,
            PluginFamily::Arithmetic | PluginFamily::Sequence => Register::Result,
        };
        let addr = self.map.address(reg)?;
        Ok(self.port.read(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPort;

    const BASE: usize = 0x1000_0000;
    const CTRL: usize = BASE + 0x0C;
    const RESULT: usize = BASE + 0x08;

    #[test]
    fn scalar_protocol_writes_operands_then_start_then_reads_result() {
        let port = ScriptedPort::new()
            .script(CTRL, &[0b01, 0b01, 0b00])
            .script(RESULT, &[42]);
        let mut session = OperationSession::new(port, RegisterMap::arithmetic(BASE).unwrap());

        let value = session.execute(&OperationRequest::ScalarPair { a: 10, b: 27 });
        assert_eq!(value, Ok(42));

        let port = session.into_port();
        assert_eq!(port.writes, [(BASE, 10), (BASE + 4, 27), (CTRL, 1)]);
        assert_eq!(port.reads_of(CTRL), 3);
        assert_eq!(port.reads_of(RESULT), 1);
    }

    #[test]
    fn index_request_clears_the_second_operand() {
        let port = ScriptedPort::new().script(RESULT, &[55]);
        let mut session = OperationSession::new(port, RegisterMap::sequence(BASE).unwrap());

        assert_eq!(session.execute(&OperationRequest::Index(10)), Ok(55));
        assert_eq!(session.into_port().writes[..2], [(BASE, 10), (BASE + 4, 0)]);
    }

    #[test]
    fn stuck_busy_times_out_after_exactly_the_budget() {
        let port = ScriptedPort::new().script(CTRL, &[0b01]);
        let mut session = OperationSession::new(port, RegisterMap::arithmetic(BASE).unwrap())
            .with_budget(PollBudget::new(37));

        assert_eq!(
            session.execute(&OperationRequest::ScalarPair { a: 1, b: 2 }),
            Err(DriverError::Timeout { polls: 37 })
        );
        let port = session.into_port();
        assert_eq!(port.reads_of(CTRL), 37);
        assert_eq!(port.reads_of(RESULT), 0, "no result may be read after a timeout");
    }

    #[test]
    fn zero_budget_times_out_without_polling() {
        let port = ScriptedPort::new();
        let mut session = OperationSession::new(port, RegisterMap::arithmetic(BASE).unwrap())
            .with_budget(PollBudget::new(0));
        assert!(matches!(
            session.execute(&OperationRequest::ScalarPair { a: 0, b: 0 }),
            Err(DriverError::Timeout { polls: 0 })
        ));
        assert_eq!(session.into_port().reads_of(CTRL), 0);
    }

    #[test]
    fn done_bit_plugins_wait_for_done_not_just_busy_clear() {
        let ctrl = BASE + 0x18;
        let progress = BASE + 0x1C;
        // Idle check, then: not yet latched, busy, busy, done.
        let port = ScriptedPort::new()
            .script(ctrl, &[0b00, 0b00, 0b01, 0b01, 0b10])
            .script(progress, &[0, 1, 3, 4]);
        let mut session = OperationSession::new(port, RegisterMap::region(BASE).unwrap());
        let region = ImageRegion::contiguous(0x8000_2000, 0x8000_3000, 2, 2).unwrap();

        let mut samples = Vec::new();
        let outcome = session.execute_observed(&OperationRequest::Region(region), &mut |p| {
            samples.push(p)
        });

        assert_eq!(outcome, Ok(4));
        assert_eq!(samples, [0, 1, 3, 4]);
    }

    #[test]
    fn done_bit_plugin_that_never_latches_start_times_out() {
        let ctrl = BASE + 0x18;
        let progress = BASE + 0x1C;
        let port = ScriptedPort::new().script(ctrl, &[0b00]);
        let mut session = OperationSession::new(port, RegisterMap::region(BASE).unwrap())
            .with_budget(PollBudget::new(20));
        let region = ImageRegion::contiguous(0x8000_2000, 0x8000_3000, 1, 1).unwrap();

        assert_eq!(
            session.execute(&OperationRequest::Region(region)),
            Err(DriverError::Timeout { polls: 20 })
        );
        assert!(!session.status().unwrap().busy);
        let port = session.into_port();
        // Idle check, twenty polls, then the status read above.
        assert_eq!(port.reads_of(ctrl), 22);
        assert_eq!(port.reads_of(progress), 20);
    }

    #[test]
    fn busy_clear_discipline_can_be_selected_for_region_plugins() {
        let ctrl = BASE + 0x18;
        let port = ScriptedPort::new()
            .script(ctrl, &[0b00, 0b01, 0b00])
            .script(BASE + 0x1C, &[1]);
        let map = RegisterMap::region(BASE)
            .unwrap()
            .with_completion(CompletionSignal::BusyClear);
        let mut session = OperationSession::new(port, map);
        let region = ImageRegion::contiguous(0x100, 0x200, 1, 1).unwrap();
        assert_eq!(session.execute(&OperationRequest::Region(region)), Ok(1));
    }

    #[test]
    fn region_configuration_while_busy_is_rejected_without_writes() {
        let ctrl = BASE + 0x18;
        let port = ScriptedPort::new().script(ctrl, &[0b01]);
        let mut session = OperationSession::new(port, RegisterMap::region(BASE).unwrap());
        let region = ImageRegion::contiguous(0x100, 0x200, 2, 2).unwrap();

        assert!(matches!(
            session.execute(&OperationRequest::Region(region)),
            Err(DriverError::InvalidConfiguration(_))
        ));
        assert!(session.into_port().writes.is_empty());
    }

    #[test]
    fn region_fields_are_written_in_register_order_before_start() {
        let ctrl = BASE + 0x18;
        let port = ScriptedPort::new().script(ctrl, &[0b00, 0b10]);
        let mut session = OperationSession::new(port, RegisterMap::region(BASE).unwrap());
        let region = ImageRegion::contiguous(0x8000_2000, 0x8000_3000, 2, 2).unwrap();
        session.execute(&OperationRequest::Region(region)).unwrap();

        let port = session.into_port();
        assert_eq!(
            port.writes,
            [
                (BASE, 0x8000_2000),
                (BASE + 0x04, 0x8000_2010),
                (BASE + 0x08, 0x8000_3000),
                (BASE + 0x0C, 0x8000_3010),
                (BASE + 0x10, 2),
                (BASE + 0x14, 2),
                (ctrl, 1),
            ]
        );
    }

    #[test]
    fn mismatched_shape_is_unsupported_and_touches_nothing() {
        let mut session =
            OperationSession::new(ScriptedPort::new(), RegisterMap::arithmetic(BASE).unwrap());
        assert_eq!(
            session.execute(&OperationRequest::Index(3)),
            Err(DriverError::Unsupported {
                what: "index",
                family: PluginFamily::Arithmetic
            })
        );
        assert!(!session.into_port().touched());
    }
}
