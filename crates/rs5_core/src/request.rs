//! Operand shapes accepted by an operation session.

use crate::DriverError;
use crate::image::ImageRegion;
use crate::map::PluginFamily;

/// One accelerator invocation. Exactly one operand shape is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationRequest {
    /// Two scalar operands for an arithmetic plugin.
    ScalarPair { a: u32, b: u32 },
    /// Element index for a sequence plugin.
    Index(u32),
    /// Address ranges and dimensions for a region plugin.
    Region(ImageRegion),
}

impl OperationRequest {
    /// The plugin family able to execute this shape.
    pub const fn family(&self) -> PluginFamily {
        match self {
            OperationRequest::ScalarPair { .. } => PluginFamily::Arithmetic,
            OperationRequest::Index(_) => PluginFamily::Sequence,
            OperationRequest::Region(_) => PluginFamily::Region,
        }
    }

    /// Name of the operand shape, as reported in `Unsupported` errors.
    pub const fn shape(&self) -> &'static str {
        match self {
            OperationRequest::ScalarPair { .. } => "scalar_pair",
            OperationRequest::Index(_) => "index",
            OperationRequest::Region(_) => "region",
        }
    }
}

/// Result value read back from the plugin, or the reason there is none.
///
/// A timeout surfaces as `Err(DriverError::Timeout { .. })`.
pub type OperationOutcome = Result<u32, DriverError>;
