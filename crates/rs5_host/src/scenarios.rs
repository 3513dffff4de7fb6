//! Self-checking plugin scenarios, the host-side counterpart of the test
//! programs the RS5 core runs in co-simulation.
//!
//! Each scenario builds a fresh simulated platform, drives one plugin
//! through the driver and compares what came back with the expected values.

use crate::config::Config;
use anyhow::{Context, Result, bail, ensure};
use rs5_common::mmio::{DEBUG_OUTPUT_BASE, SIM_END_ADDR, WORD_BYTES};
use rs5_core::DriverError;
use rs5_core::arith::{ArithmeticPlugin, expected_add, fibonacci_reference};
use rs5_core::image::{ImageConversionPlugin, ImageRegion, ProgressMonitor};
use rs5_core::port::{RegAddr, RegisterPort};
use rs5_core::session::PollBudget;
use rs5_hw::SimulatedSoc;

type Scenario = fn(&Config) -> Result<()>;

const SCENARIOS: &[(&str, Scenario)] = &[
    ("adder", adder),
    ("adder wraparound", adder_wraparound),
    ("fibonacci", fibonacci),
    ("pixel processor", pixel_processor),
    ("image 2x2", image_two_by_two),
    ("image 1x1", image_single_pixel),
    ("timeout on stuck busy", stuck_busy_timeout),
    ("configuration while busy", configuration_while_busy),
    ("empty region", empty_region),
];

/// Runs every scenario whose name contains `filter` and prints a verdict per
/// scenario. Fails if any scenario failed.
pub fn run_scenarios(config: &Config, filter: Option<&str>) -> Result<()> {
    let selected: Vec<_> = SCENARIOS
        .iter()
        .filter(|(name, _)| filter.is_none_or(|f| name.contains(f)))
        .collect();
    if selected.is_empty() {
        bail!("no scenario matches {:?}", filter.unwrap_or_default());
    }

    let mut failed = 0;
    for (name, scenario) in &selected {
        match scenario(config) {
            Ok(()) => println!("PASS  {name}"),
            Err(err) => {
                failed += 1;
                println!("FAIL  {name}: {err:#}");
            }
        }
    }
    println!("{}/{} scenarios passed", selected.len() - failed, selected.len());
    ensure!(failed == 0, "{failed} scenario(s) failed");
    Ok(())
}

fn platform(config: &Config) -> Result<SimulatedSoc> {
    Ok(SimulatedSoc::platform(&config.layout)?)
}

/// Does what the on-target test programs do once a plugin has answered:
/// stores the observed words in the debug output region and writes a pass
/// word to the end-of-simulation address.
fn record(soc: &mut SimulatedSoc, observed: &[u32]) -> Result<()> {
    for (i, &word) in observed.iter().enumerate() {
        let addr = RegAddr::at(DEBUG_OUTPUT_BASE, i * WORD_BYTES)
            .context("debug output leaves the address space")?;
        soc.write(addr, word);
    }
    let end = RegAddr::at(SIM_END_ADDR, 0).context("misaligned end-of-simulation address")?;
    soc.write(end, 1);

    ensure!(soc.halted() == Some(1), "simulation did not halt");
    ensure!(
        soc.dump_words(DEBUG_OUTPUT_BASE, observed.len()) == observed,
        "debug output region does not hold the observed words"
    );
    Ok(())
}

fn check_eq(what: &str, got: u32, expected: u32) -> Result<()> {
    ensure!(
        got == expected,
        "{what}: got {got:#010x}, expected {expected:#010x}"
    );
    Ok(())
}

fn adder(config: &Config) -> Result<()> {
    let mut soc = platform(config)?;
    let mut plugin = ArithmeticPlugin::adder(&mut soc, config.adder_map()?)?;
    let sums = [plugin.add(2, 3)?, plugin.add(100, 23)?];
    check_eq("add(2, 3)", sums[0], 10)?;
    check_eq("add(100, 23)", sums[1], expected_add(100, 23))?;
    record(&mut soc, &sums)
}

fn adder_wraparound(config: &Config) -> Result<()> {
    let mut soc = platform(config)?;
    let mut plugin = ArithmeticPlugin::adder(&mut soc, config.adder_map()?)?;
    check_eq(
        "add(0xFFFFFFFB, 0xFFFFFFFD)",
        plugin.add(0xFFFF_FFFB, 0xFFFF_FFFD)?,
        0xFFFF_FFFD,
    )
}

fn fibonacci(config: &Config) -> Result<()> {
    let mut soc = platform(config)?;
    let mut plugin = ArithmeticPlugin::fibonacci_unit(&mut soc, config.fibonacci_map()?)?;
    let values = (0..=15)
        .map(|n| plugin.fibonacci(n))
        .collect::<Result<Vec<_>, _>>()?;
    for (n, &value) in (0u32..).zip(&values) {
        check_eq(&format!("fib({n})"), value, fibonacci_reference(n))?;
    }
    check_eq("fib(10)", values[10], 55)?;
    check_eq("fib(15)", values[15], 610)?;
    record(&mut soc, &values)
}

fn pixel_processor(config: &Config) -> Result<()> {
    let mut soc = platform(config)?;
    let mut plugin = ArithmeticPlugin::pixel_unit(&mut soc, config.pixel_map()?)?;
    let mut observed = Vec::new();
    for (pixel, gray) in [
        (0xFF00_0000, 0x3F3F_3F00),
        (0xFFFF_FF00, 0xBFBF_BF00),
        (0x0000_0000, 0x0000_0000),
        (0x8080_80FF, 0x6060_6000),
    ] {
        let got = plugin.grayscale(pixel)?;
        check_eq(&format!("gray({pixel:#010x})"), got, gray)?;
        observed.push(got);
    }
    record(&mut soc, &observed)
}

fn run_image(config: &Config, input: &[u32], width: u32, height: u32) -> Result<Vec<u32>> {
    let mut soc = platform(config)?;
    let in_start = u32::try_from(config.input_base)?;
    let out_start = u32::try_from(config.output_base)?;
    let region = ImageRegion::contiguous(in_start, out_start, width, height)?;
    soc.load_words(config.input_base, input);

    let mut monitor = ProgressMonitor::for_region(&region);
    let report = ImageConversionPlugin::new(&mut soc, config.image_map()?)?
        .with_budget(config.budget)
        .convert_observed(region, &mut monitor)?;
    check_eq("final progress", report.progress, width * height)?;
    ensure!(monitor.holds(), "progress contract violated: {monitor:?}");
    let output = soc.dump_words(config.output_base, input.len());
    record(&mut soc, &output)?;
    Ok(output)
}

fn image_two_by_two(config: &Config) -> Result<()> {
    let out = run_image(
        config,
        &[0xFF00_0000, 0x00FF_0000, 0x0000_FF00, 0x8080_8000],
        2,
        2,
    )?;
    let expected = [0x3F3F_3F00, 0x3F3F_3F00, 0x3F3F_3F00, 0x6060_6000];
    for (i, (&got, &want)) in out.iter().zip(&expected).enumerate() {
        check_eq(&format!("pixel {i}"), got, want)?;
    }
    Ok(())
}

fn image_single_pixel(config: &Config) -> Result<()> {
    let out = run_image(config, &[0xAABB_CC00], 1, 1)?;
    check_eq("pixel 0", out[0], 0x8C8C_8C00)?;
    check_eq("gray level", out[0] >> 24, 140)
}

fn stuck_busy_timeout(config: &Config) -> Result<()> {
    let budget = PollBudget::new(config.budget.polls().min(64));
    let mut soc = platform(config)?;
    soc.set_stuck_busy(config.layout.adder_base, true)?;
    let outcome = ArithmeticPlugin::adder(&mut soc, config.adder_map()?)?
        .with_budget(budget)
        .add(1, 1);
    ensure!(
        outcome == Err(DriverError::Timeout { polls: budget.polls() }),
        "expected a timeout after {} polls, got {outcome:?}",
        budget.polls()
    );
    ensure!(
        soc.bus_reads() == u64::from(budget.polls()),
        "issued {} status reads for a budget of {}",
        soc.bus_reads(),
        budget.polls()
    );
    Ok(())
}

fn configuration_while_busy(config: &Config) -> Result<()> {
    let mut soc = platform(config)?;
    let base = config.layout.image_base;
    soc.set_stuck_busy(base, true)?;
    let region = ImageRegion::contiguous(
        u32::try_from(config.input_base)?,
        u32::try_from(config.output_base)?,
        2,
        2,
    )?;
    {
        let mut plugin = ImageConversionPlugin::new(&mut soc, config.image_map()?)?;
        plugin.configure(&region)?;
        plugin.start()?;
    }
    let before = soc.device_writes(base)?;
    let second = ImageConversionPlugin::new(&mut soc, config.image_map()?)?.configure(&region);
    ensure!(
        matches!(second, Err(DriverError::InvalidConfiguration(_))),
        "configuration while busy returned {second:?}"
    );
    let after = soc.device_writes(base)?;
    ensure!(before == after, "{} register writes reached the busy plugin", after - before);
    Ok(())
}

fn empty_region(config: &Config) -> Result<()> {
    let mut soc = platform(config)?;
    let result = ImageConversionPlugin::new(&mut soc, config.image_map()?)?.convert_buffers(
        u32::try_from(config.input_base)?,
        u32::try_from(config.output_base)?,
        0,
        0,
    );
    ensure!(
        matches!(result, Err(DriverError::InvalidConfiguration(_))),
        "empty region returned {result:?}"
    );
    ensure!(
        soc.bus_reads() + soc.bus_writes() == 0,
        "empty region reached the bus"
    );
    Ok(())
}
