//! Register maps of the plugin families.
//!
//! A [`RegisterMap`] is the construction-time description of one plugin
//! instance: which family it belongs to, where its register block lives, and
//! how it signals completion. Sessions resolve named [`Register`]s through the
//! map and never see raw offsets.

use crate::DriverError;
use crate::port::RegAddr;
use rs5_common::regs::{region, scalar};

/// Closed set of plugin register layouts sharing one session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginFamily {
    /// Two scalar operands in, one scalar result out (adder, pixel processor).
    Arithmetic,
    /// One index operand in, one sequence element out (Fibonacci).
    Sequence,
    /// Address ranges plus dimensions in, bulk memory output (image converter).
    Region,
}

impl PluginFamily {
    /// Bytes decoded by one instance of this family.
    pub const fn span(self) -> usize {
        match self {
            PluginFamily::Arithmetic | PluginFamily::Sequence => scalar::SPAN,
            PluginFamily::Region => region::SPAN,
        }
    }

    /// How plugins of this family report completion unless configured
    /// otherwise.
    pub const fn default_completion(self) -> CompletionSignal {
        match self {
            PluginFamily::Arithmetic | PluginFamily::Sequence => CompletionSignal::BusyClear,
            PluginFamily::Region => CompletionSignal::DoneBit,
        }
    }
}

impl core::fmt::Display for PluginFamily {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            PluginFamily::Arithmetic => "arithmetic",
            PluginFamily::Sequence => "sequence",
            PluginFamily::Region => "region",
        })
    }
}

/// Completion discipline of a plugin's status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionSignal {
    /// Only the busy bit is meaningful: the operation is complete once it
    /// clears.
    BusyClear,
    /// The plugin raises a separate done bit: the operation is complete once
    /// done is set and busy is clear.
    DoneBit,
}

/// Named plugin registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    OperandA,
    OperandB,
    Result,
    Control,
    InStart,
    InEnd,
    OutStart,
    OutEnd,
    Width,
    Height,
    Progress,
}

/// Register block of one plugin instance.
///
/// Immutable once built. Owned by the session that drives the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    family: PluginFamily,
    base: usize,
    completion: CompletionSignal,
}

impl RegisterMap {
    /// Map for a plugin of `family` decoded at `base`.
    ///
    /// Fails with `InvalidConfiguration` if `base` is not word aligned or the
    /// block would run past the end of the address space.
    pub fn new(family: PluginFamily, base: usize) -> Result<Self, DriverError> {
        if base % 4 != 0 {
            return Err(DriverError::InvalidConfiguration("plugin base is not word aligned"));
        }
        if base.checked_add(family.span()).is_none() {
            return Err(DriverError::InvalidConfiguration(
                "plugin block overflows the address space",
            ));
        }
        Ok(Self {
            family,
            base,
            completion: family.default_completion(),
        })
    }

    /// Adder or pixel-processor layout at `base`.
    pub fn arithmetic(base: usize) -> Result<Self, DriverError> {
        Self::new(PluginFamily::Arithmetic, base)
    }

    /// Fibonacci layout at `base`.
    pub fn sequence(base: usize) -> Result<Self, DriverError> {
        Self::new(PluginFamily::Sequence, base)
    }

    /// Image converter layout at `base`.
    pub fn region(base: usize) -> Result<Self, DriverError> {
        Self::new(PluginFamily::Region, base)
    }

    /// Overrides the family's default completion discipline.
    pub const fn with_completion(mut self, completion: CompletionSignal) -> Self {
        self.completion = completion;
        self
    }

    /// Family whose register layout this map follows.
    pub const fn family(&self) -> PluginFamily {
        self.family
    }

    /// Address of the first register of the block.
    pub const fn base(&self) -> usize {
        self.base
    }

    /// How the session decides that an operation on this instance finished.
    pub const fn completion(&self) -> CompletionSignal {
        self.completion
    }

    /// Byte range `[base, base + span)` decoded by this instance.
    pub const fn span(&self) -> core::ops::Range<usize> {
        self.base..self.base + self.family.span()
    }

    /// True if the two instances decode at least one common byte.
    pub const fn overlaps(&self, other: &RegisterMap) -> bool {
        let a = self.span();
        let b = other.span();
        a.start < b.end && b.start < a.end
    }

    /// Offset of `reg` within this family's block, if the family has it.
    pub const fn offset(&self, reg: Register) -> Option<usize> {
        match self.family {
            PluginFamily::Arithmetic | PluginFamily::Sequence => match reg {
                Register::OperandA => Some(scalar::OPERAND_A),
                Register::OperandB => Some(scalar::OPERAND_B),
                Register::Result => Some(scalar::RESULT),
                Register::Control => Some(scalar::CONTROL),
                _ => None,
            },
            PluginFamily::Region => match reg {
                Register::InStart => Some(region::IN_START),
                Register::InEnd => Some(region::IN_END),
                Register::OutStart => Some(region::OUT_START),
                Register::OutEnd => Some(region::OUT_END),
                Register::Width => Some(region::WIDTH),
                Register::Height => Some(region::HEIGHT),
                Register::Control => Some(region::CONTROL),
                Register::Progress => Some(region::PROGRESS),
                _ => None,
            },
        }
    }

    /// Absolute address of `reg`.
    ///
    /// Fails with `Unsupported` when the family has no such register.
    pub fn address(&self, reg: Register) -> Result<RegAddr, DriverError> {
        self.offset(reg)
            .and_then(|offset| RegAddr::at(self.base, offset))
            .ok_or(DriverError::Unsupported {
                what: "register",
                family: self.family,
            })
    }
}
