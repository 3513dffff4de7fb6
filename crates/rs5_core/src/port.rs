//! Register access primitive for plugin accelerators.
//!
//! Every load and store the driver issues goes through a [`RegisterPort`].
//! The port is the only place where an absolute address is formed from a base
//! and an offset, and the MMIO implementation is the only place in the driver
//! that dereferences a raw pointer. Everything above this module works with
//! named registers.

use core::sync::atomic::{Ordering, fence};

/// Absolute byte address of a single 32-bit plugin register.
///
/// Built only by [`RegAddr::at`], which is the driver's single site of
/// address arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegAddr(usize);

impl RegAddr {
    /// Returns the address of the register at `offset` bytes past `base`.
    ///
    /// Returns `None` if the sum leaves the address space or the result is not
    /// 32-bit aligned.
    pub const fn at(base: usize, offset: usize) -> Option<Self> {
        match base.checked_add(offset) {
            Some(addr) if addr % 4 == 0 => Some(Self(addr)),
            _ => None,
        }
    }

    /// Raw byte address.
    pub const fn get(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for RegAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Ordered, uncached access to 32-bit plugin registers.
///
/// Both operations are observation points of hardware state: implementations
/// must not cache, merge, reorder or elide them. No error is reported here.
/// A register map built against the wrong platform is a configuration mistake
/// and is caught when the map is built.
pub trait RegisterPort {
    /// Loads the current value of the register at `addr`.
    fn read(&mut self, addr: RegAddr) -> u32;

    /// Stores `value` into the register at `addr`.
    fn write(&mut self, addr: RegAddr, value: u32);
}

impl<P: RegisterPort + ?Sized> RegisterPort for &mut P {
    #[inline(always)]
    fn read(&mut self, addr: RegAddr) -> u32 {
        (**self).read(addr)
    }

    #[inline(always)]
    fn write(&mut self, addr: RegAddr, value: u32) {
        (**self).write(addr, value)
    }
}

/// Port backed by real memory-mapped I/O on the target.
///
/// Each access is a volatile load or store. Stores are preceded by a release
/// fence so that buffer contents written by the CPU are visible to the plugin
/// before a configuration or start write reaches it. Loads are followed by an
/// acquire fence so that data the plugin produced is not read early.
#[derive(Debug)]
pub struct MmioPort {
    _private: (),
}

impl MmioPort {
    /// Creates a port that dereferences register addresses directly.
    ///
    /// # Safety
    ///
    /// Every [`RegAddr`] passed to this port must refer to a mapped, 32-bit
    /// aligned device register or RAM word for the whole life of the port. The
    /// caller must also ensure that no other port drives the same plugin
    /// registers concurrently.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterPort for MmioPort {
    #[inline(always)]
    fn read(&mut self, addr: RegAddr) -> u32 {
        // SAFETY: the constructor contract guarantees `addr` is a mapped,
        // aligned word.
        let value = unsafe { (addr.get() as *const u32).read_volatile() };
        fence(Ordering::Acquire);
        value
    }

    #[inline(always)]
    fn write(&mut self, addr: RegAddr, value: u32) {
        fence(Ordering::Release);
        // SAFETY: see `read`.
        unsafe { (addr.get() as *mut u32).write_volatile(value) }
    }
}
