use crate::SimError;
use crate::device::{PluginDevice, ScalarUnit};
use crate::image::ImageUnit;
use crate::ram::Ram;
use rs5_common::mmio::{PLUGIN_BASE, PLUGIN_STRIDE, SIM_END_ADDR};
use rs5_core::port::{RegAddr, RegisterPort};
use std::ops::Range;

/// Where the reference platform decodes each plugin, and how fast they run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformLayout {
    pub adder_base: usize,
    pub fibonacci_base: usize,
    pub pixel_base: usize,
    pub image_base: usize,
    /// Ticks the adder and the pixel processor take per operation.
    pub scalar_latency: u32,
    /// Pixels the image plugin converts per tick.
    pub pixels_per_tick: u32,
}

impl Default for PlatformLayout {
    fn default() -> Self {
        Self {
            adder_base: PLUGIN_BASE,
            fibonacci_base: PLUGIN_BASE + PLUGIN_STRIDE,
            pixel_base: PLUGIN_BASE + 2 * PLUGIN_STRIDE,
            image_base: PLUGIN_BASE + 3 * PLUGIN_STRIDE,
            scalar_latency: 4,
            pixels_per_tick: 1,
        }
    }
}

struct Slot {
    window: Range<usize>,
    device: Box<dyn PluginDevice>,
    writes: u64,
}

/// A RISC-V SoC reduced to what the driver can observe: RAM plus plugins.
///
/// Every [`RegisterPort::read`] advances all attached devices by one tick
/// before sampling, so a status poll is also the unit of simulated time.
/// Writes do not advance the clock.
#[derive(Default)]
pub struct SimulatedSoc {
    ram: Ram,
    slots: Vec<Slot>,
    ticks: u64,
    bus_reads: u64,
    bus_writes: u64,
    halted: Option<u32>,
}

impl SimulatedSoc {
    /// Empty SoC: RAM only.
    pub fn new() -> Self {
        Self::default()
    }

    /// SoC carrying the adder, Fibonacci, pixel and image plugins.
    pub fn platform(layout: &PlatformLayout) -> Result<Self, SimError> {
        let mut soc = Self::new();
        soc.attach(layout.adder_base, ScalarUnit::adder(layout.scalar_latency))?;
        soc.attach(layout.fibonacci_base, ScalarUnit::fibonacci())?;
        soc.attach(layout.pixel_base, ScalarUnit::pixel(layout.scalar_latency))?;
        soc.attach(layout.image_base, ImageUnit::new(layout.pixels_per_tick))?;
        Ok(soc)
    }

    /// Decodes `device` at `base`.
    ///
    /// # Errors
    ///
    /// `InvalidBase` for a misaligned base or a block past the end of the
    /// address space, `Overlap` if the block shares a byte with another
    /// device.
    pub fn attach(
        &mut self,
        base: usize,
        device: impl PluginDevice + 'static,
    ) -> Result<(), SimError> {
        let span = device.family().span();
        let end = base.checked_add(span).ok_or(SimError::InvalidBase { base })?;
        if base % 4 != 0 {
            return Err(SimError::InvalidBase { base });
        }
        if let Some(other) = self
            .slots
            .iter()
            .find(|s| base < s.window.end && s.window.start < end)
        {
            return Err(SimError::Overlap {
                base,
                other: other.window.start,
            });
        }
        tracing::debug!(base, family = %device.family(), "attached plugin");
        self.slots.push(Slot {
            window: base..end,
            device: Box::new(device),
            writes: 0,
        });
        Ok(())
    }

    /// Freezes or releases the device at `base` in its busy state.
    pub fn set_stuck_busy(&mut self, base: usize, stuck: bool) -> Result<(), SimError> {
        let slot = self.slot_at(base)?;
        slot.device.set_stuck(stuck);
        Ok(())
    }

    /// Bus writes that landed in the register block at `base`.
    pub fn device_writes(&mut self, base: usize) -> Result<u64, SimError> {
        Ok(self.slot_at(base)?.writes)
    }

    /// Writes the device at `base` dropped because it was busy.
    pub fn ignored_writes(&mut self, base: usize) -> Result<u64, SimError> {
        Ok(self.slot_at(base)?.device.ignored_writes())
    }

    fn slot_at(&mut self, base: usize) -> Result<&mut Slot, SimError> {
        self.slots
            .iter_mut()
            .find(|s| s.window.start == base)
            .ok_or(SimError::NoDevice { base })
    }

    /// Index of the slot decoding `addr` and the offset within it.
    fn decode(&self, addr: usize) -> Option<(usize, usize)> {
        self.slots
            .iter()
            .position(|s| s.window.contains(&addr))
            .map(|i| (i, addr - self.slots[i].window.start))
    }

    /// Advances every device by one tick.
    pub fn tick(&mut self) {
        self.ticks += 1;
        for slot in &mut self.slots {
            slot.device.tick(&mut self.ram);
        }
    }

    /// Copies `words` into RAM at `addr` without going through the bus.
    pub fn load_words(&mut self, addr: usize, words: &[u32]) {
        self.ram.load(addr, words);
    }

    /// Reads `count` words of RAM at `addr` without going through the bus.
    pub fn dump_words(&self, addr: usize, count: usize) -> Vec<u32> {
        self.ram.dump(addr, count)
    }

    /// Backing memory, for inspection.
    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    /// Clock ticks elapsed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Register and memory reads issued through the port.
    pub fn bus_reads(&self) -> u64 {
        self.bus_reads
    }

    /// Register and memory writes issued through the port.
    pub fn bus_writes(&self) -> u64 {
        self.bus_writes
    }

    /// Value written to the end-of-simulation address, if any.
    pub fn halted(&self) -> Option<u32> {
        self.halted
    }
}

impl RegisterPort for SimulatedSoc {
    fn read(&mut self, addr: RegAddr) -> u32 {
        self.bus_reads += 1;
        self.tick();
        let addr = addr.get();
        match self.decode(addr) {
            Some((i, offset)) => self.slots[i].device.read(offset),
            None => self.ram.read(addr),
        }
    }

    fn write(&mut self, addr: RegAddr, value: u32) {
        self.bus_writes += 1;
        let addr = addr.get();
        if addr == SIM_END_ADDR {
            tracing::info!(value, ticks = self.ticks, "simulation end requested");
            self.halted = Some(value);
            return;
        }
        match self.decode(addr) {
            Some((i, offset)) => {
                let slot = &mut self.slots[i];
                slot.writes += 1;
                slot.device.write(offset, value);
            }
            None => self.ram.write(addr, value),
        }
    }
}
