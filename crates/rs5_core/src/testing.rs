//! Scripted register port for driver unit tests.

use crate::port::{RegAddr, RegisterPort};
use std::collections::{HashMap, VecDeque};

/// Port whose reads replay per-address scripts and whose writes are logged.
///
/// A script yields its values in order and then keeps returning the last one.
/// Unscripted addresses read as zero.
#[derive(Default)]
pub(crate) struct ScriptedPort {
    scripts: HashMap<usize, VecDeque<u32>>,
    pub writes: Vec<(usize, u32)>,
    pub reads: Vec<usize>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, addr: usize, values: &[u32]) -> Self {
        self.scripts.insert(addr, values.iter().copied().collect());
        self
    }

    pub fn reads_of(&self, addr: usize) -> usize {
        self.reads.iter().filter(|&&a| a == addr).count()
    }

    pub fn touched(&self) -> bool {
        !self.reads.is_empty() || !self.writes.is_empty()
    }
}

impl RegisterPort for ScriptedPort {
    fn read(&mut self, addr: RegAddr) -> u32 {
        self.reads.push(addr.get());
        match self.scripts.get_mut(&addr.get()) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(0),
            Some(script) => script.front().copied().unwrap_or(0),
            None => 0,
        }
    }

    fn write(&mut self, addr: RegAddr, value: u32) {
        self.writes.push((addr.get(), value));
    }
}
