//! Control/status register bit layout.

use rs5_common::regs::{control, status};

/// Decoded view of a plugin's control/status register.
///
/// `done` implies `!busy` on well-behaved hardware. A start command reads back
/// as `busy` until the plugin finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlStatus {
    /// Operation in progress.
    pub busy: bool,
    /// Result valid and stable.
    pub done: bool,
}

impl ControlStatus {
    /// Neither busy nor done: the state after reset or after a busy-clear
    /// plugin finished.
    pub const IDLE: Self = Self {
        busy: false,
        done: false,
    };

    /// True when a new configuration may be written.
    #[inline(always)]
    pub const fn is_idle(self) -> bool {
        !self.busy
    }
}

/// Builds and interprets control/status words.
///
/// Pure and stateless. The polling loop in the session asks this type what the
/// bits mean, so the layout is described in one place.
pub struct ControlStatusCodec;

impl ControlStatusCodec {
    /// Command word that starts an operation (bit 0 set).
    #[inline(always)]
    pub const fn encode_start() -> u32 {
        control::START
    }

    /// Extracts `busy` (bit 0) and `done` (bit 1). Reserved bits are ignored.
    #[inline(always)]
    pub const fn decode(raw: u32) -> ControlStatus {
        ControlStatus {
            busy: raw & status::BUSY != 0,
            done: raw & status::DONE != 0,
        }
    }

    /// Inverse of [`decode`](Self::decode), used by hardware models.
    #[inline(always)]
    pub const fn encode_status(st: ControlStatus) -> u32 {
        (if st.busy { status::BUSY } else { 0 }) | (if st.done { status::DONE } else { 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_sets_only_bit_zero() {
        assert_eq!(ControlStatusCodec::encode_start(), 0b01);
    }

    #[test]
    fn decode_reads_busy_and_done_and_ignores_reserved_bits() {
        assert_eq!(ControlStatusCodec::decode(0), ControlStatus::IDLE);
        assert_eq!(
            ControlStatusCodec::decode(0b01),
            ControlStatus { busy: true, done: false }
        );
        assert_eq!(
            ControlStatusCodec::decode(0b10),
            ControlStatus { busy: false, done: true }
        );
        assert_eq!(
            ControlStatusCodec::decode(0xFFFF_FFF8),
            ControlStatus::IDLE,
            "reserved bits must not leak into the flags"
        );
        assert_eq!(
            ControlStatusCodec::decode(0xFFFF_FFFE),
            ControlStatus { busy: false, done: true }
        );
    }

    #[test]
    fn encode_status_is_the_inverse_of_decode_on_defined_bits() {
        for raw in 0..4u32 {
            let st = ControlStatusCodec::decode(raw);
            assert_eq!(ControlStatusCodec::encode_status(st), raw);
        }
    }
}
