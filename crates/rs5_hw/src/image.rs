use crate::device::{Handshake, PluginDevice, gray_word};
use crate::ram::Ram;
use rs5_common::mmio::WORD_BYTES;
use rs5_common::regs::region;
use rs5_core::codec::ControlStatusCodec;
use rs5_core::map::PluginFamily;

/// Bulk RGB to grayscale converter reading and writing system RAM.
///
/// Configuration registers latch only while idle. A start resets progress to
/// zero and clears `done`; the device then converts `pixels_per_tick` pixels
/// per clock tick in address order and raises `done` after the last one.
#[derive(Debug)]
pub struct ImageUnit {
    in_start: u32,
    in_end: u32,
    out_start: u32,
    out_end: u32,
    width: u32,
    height: u32,
    progress: u32,
    total: u32,
    pixels_per_tick: u32,
    hs: Handshake,
    ignored: u64,
}

impl ImageUnit {
    /// Idle converter producing up to `pixels_per_tick` pixels per tick.
    pub fn new(pixels_per_tick: u32) -> Self {
        Self {
            in_start: 0,
            in_end: 0,
            out_start: 0,
            out_end: 0,
            width: 0,
            height: 0,
            progress: 0,
            total: 0,
            pixels_per_tick: pixels_per_tick.max(1),
            hs: Handshake::default(),
            ignored: 0,
        }
    }

    /// Pixels the latched configuration describes, bounded by both ranges.
    fn latched_total(&self) -> u32 {
        let words = |start: u32, end: u32| end.saturating_sub(start) / WORD_BYTES as u32;
        self.width
            .checked_mul(self.height)
            .unwrap_or(0)
            .min(words(self.in_start, self.in_end))
            .min(words(self.out_start, self.out_end))
    }

    fn start(&mut self) {
        self.progress = 0;
        self.total = self.latched_total();
        self.hs.begin();
        tracing::debug!(
            in_start = self.in_start,
            out_start = self.out_start,
            pixels = self.total,
            "image unit started"
        );
        if self.total == 0 {
            self.hs.finish();
        }
    }
}

impl PluginDevice for ImageUnit {
    fn family(&self) -> PluginFamily {
        PluginFamily::Region
    }

    fn read(&mut self, offset: usize) -> u32 {
        match offset {
            region::IN_START => self.in_start,
            region::IN_END => self.in_end,
            region::OUT_START => self.out_start,
            region::OUT_END => self.out_end,
            region::WIDTH => self.width,
            region::HEIGHT => self.height,
            region::CONTROL => self.hs.status_word(),
            region::PROGRESS => self.progress,
            _ => 0,
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        if self.hs.busy {
            self.ignored += 1;
            tracing::trace!(offset, value, "write dropped while busy");
            return;
        }
        match offset {
            region::IN_START => self.in_start = value,
            region::IN_END => self.in_end = value,
            region::OUT_START => self.out_start = value,
            region::OUT_END => self.out_end = value,
            region::WIDTH => self.width = value,
            region::HEIGHT => self.height = value,
            region::CONTROL if ControlStatusCodec::decode(value).busy => self.start(),
            _ => {}
        }
    }

    fn tick(&mut self, ram: &mut Ram) {
        if !self.hs.running() {
            return;
        }
        let step = WORD_BYTES as u32;
        for _ in 0..self.pixels_per_tick {
            if self.progress == self.total {
                break;
            }
            let offset = self.progress * step;
            let pixel = ram.read(self.in_start.wrapping_add(offset) as usize);
            ram.write(self.out_start.wrapping_add(offset) as usize, gray_word(pixel));
            self.progress += 1;
        }
        if self.progress == self.total {
            self.hs.finish();
        }
    }

    fn set_stuck(&mut self, stuck: bool) {
        self.hs.stuck = stuck;
    }

    fn ignored_writes(&self) -> u64 {
        self.ignored
    }
}
