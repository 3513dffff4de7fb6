//! TCP bridge to the Verilator co-simulation of the RS5 SoC.
//!
//! The simulation side listens on a socket and serves three commands, each a
//! one-byte opcode followed by little-endian 32-bit fields. Every command is
//! answered with one 32-bit word. Reads and writes go straight to the
//! simulated bus, so the driver sees the RTL plugins exactly as firmware
//! running on the core would.

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use rs5_core::arith::{ArithmeticPlugin, expected_add};
use rs5_core::port::{RegAddr, RegisterPort};
use std::io::{self, Read, Write};
use std::net::TcpStream;

/// Advances the simulation: `0x01 cycles:u32 -> ack:u32`.
const CMD_STEP: u8 = 0x01;

/// Bus write: `0x02 addr:u32 data:u32 -> ack:u32`.
const CMD_WRITE: u8 = 0x02;

/// Bus read: `0x03 addr:u32 -> data:u32`.
const CMD_READ: u8 = 0x03;

/// TCP connection to the co-simulation acting as a register port.
///
/// [`RegisterPort`] has no error channel, so the first transport failure is
/// latched: the failing access reads as zero, every later access is skipped,
/// and [`check`](Self::check) reports the error once the operation returns.
pub struct HardwareBridge {
    stream: TcpStream,
    cycles_per_read: u32,
    fault: Option<io::Error>,
}

impl HardwareBridge {
    /// Connects to the simulation server at `addr` ("host:port").
    ///
    /// # Arguments
    ///
    /// * `addr` - Server address, e.g. "127.0.0.1:8000"
    /// * `cycles_per_read` - Clock cycles stepped before each register read,
    ///   so status polls observe progress. Zero leaves stepping to the server.
    pub fn connect(addr: &str, cycles_per_read: u32) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .with_context(|| format!("Failed to connect to co-simulation at {addr}"))?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream, cycles_per_read))
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream, cycles_per_read: u32) -> Self {
        Self {
            stream,
            cycles_per_read,
            fault: None,
        }
    }

    /// Advances the simulation by `cycles` clock cycles.
    pub fn step(&mut self, cycles: u32) -> io::Result<()> {
        self.stream.write_all(&[CMD_STEP])?;
        self.stream.write_all(&cycles.to_le_bytes())?;
        self.recv_word().map(|_| ())
    }

    /// Writes a bus word and waits for the acknowledgement.
    pub fn write_word(&mut self, addr: u32, data: u32) -> io::Result<()> {
        self.stream.write_all(&[CMD_WRITE])?;
        self.stream.write_all(&addr.to_le_bytes())?;
        self.stream.write_all(&data.to_le_bytes())?;
        self.recv_word().map(|_| ())
    }

    /// Reads a bus word.
    pub fn read_word(&mut self, addr: u32) -> io::Result<u32> {
        self.stream.write_all(&[CMD_READ])?;
        self.stream.write_all(&addr.to_le_bytes())?;
        self.recv_word()
    }

    fn recv_word(&mut self) -> io::Result<u32> {
        let mut word = [0u8; 4];
        self.stream.read_exact(&mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Returns and clears the latched transport fault.
    pub fn check(&mut self) -> Result<()> {
        match self.fault.take() {
            Some(err) => Err(anyhow!(err).context("co-simulation bridge failed")),
            None => Ok(()),
        }
    }

    fn latch<T: Default>(&mut self, result: io::Result<T>) -> T {
        result.unwrap_or_else(|err| {
            tracing::error!(%err, "bridge transport fault");
            self.fault = Some(err);
            T::default()
        })
    }

    fn bus_addr(addr: RegAddr) -> io::Result<u32> {
        u32::try_from(addr.get()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{addr} is outside the 32-bit bus"),
            )
        })
    }
}

impl RegisterPort for HardwareBridge {
    fn read(&mut self, addr: RegAddr) -> u32 {
        if self.fault.is_some() {
            return 0;
        }
        let result = Self::bus_addr(addr).and_then(|bus| {
            if self.cycles_per_read > 0 {
                self.step(self.cycles_per_read)?;
            }
            self.read_word(bus)
        });
        self.latch(result)
    }

    fn write(&mut self, addr: RegAddr, value: u32) {
        if self.fault.is_some() {
            return;
        }
        let result = Self::bus_addr(addr).and_then(|bus| self.write_word(bus, value));
        self.latch(result)
    }
}

/// Runs one adder operation against the co-simulation and checks the result.
pub fn run_bridge_check(config: &Config, a: u32, b: u32, cycles_per_read: u32) -> Result<()> {
    println!("Connecting to RS5 co-simulation at {}...", config.bridge);
    let mut bridge = HardwareBridge::connect(&config.bridge, cycles_per_read)?;

    let outcome = ArithmeticPlugin::adder(&mut bridge, config.adder_map()?)?
        .with_budget(config.budget)
        .add(a, b);
    bridge.check()?;
    let sum = outcome?;

    let expected = expected_add(a, b);
    println!("add({a:#010x}, {b:#010x}) = {sum:#010x} (expected {expected:#010x})");
    if sum != expected {
        anyhow::bail!("adder returned {sum:#010x}, expected {expected:#010x}");
    }
    Ok(())
}
