//! One-shot scalar plugin commands against the software model.

use crate::config::Config;
use anyhow::Result;
use rs5_core::arith::ArithmeticPlugin;
use rs5_core::port::RegisterPort;
use rs5_core::session::PollBudget;
use rs5_hw::SimulatedSoc;

/// Status polls the Fibonacci model needs for `fib(n)`: one tick per
/// iteration plus the final one that raises `done`.
pub fn fibonacci_budget(config: &Config, n: u32) -> PollBudget {
    config.budget_at_least(n.saturating_add(2), "fib")
}

/// Runs `add(a, b)` on the adder plugin and prints the raw and signed result.
pub fn run_add(config: &Config, a: u32, b: u32) -> Result<u32> {
    let mut soc = SimulatedSoc::platform(&config.layout)?;
    let mut plugin =
        ArithmeticPlugin::adder(&mut soc, config.adder_map()?)?.with_budget(config.budget);
    let sum = plugin.add(a, b)?;
    check(&plugin, sum, a, b);
    println!(
        "add({a}, {b}) = {sum} ({sum:#010x}, signed {}) in {} ticks",
        sum as i32,
        soc.ticks()
    );
    Ok(sum)
}

/// Runs `fib(n)` on the Fibonacci plugin.
///
/// The budget grows with `n`, since the model spends one tick per iteration.
pub fn run_fib(config: &Config, n: u32) -> Result<u32> {
    let mut soc = SimulatedSoc::platform(&config.layout)?;
    let mut plugin = ArithmeticPlugin::fibonacci_unit(&mut soc, config.fibonacci_map()?)?
        .with_budget(fibonacci_budget(config, n));
    let value = plugin.fibonacci(n)?;
    check(&plugin, value, n, 0);
    println!("fib({n}) = {value} in {} ticks", soc.ticks());
    Ok(value)
}

/// Converts one packed RGB word on the per-pixel processor.
pub fn run_gray(config: &Config, pixel: u32) -> Result<u32> {
    let mut soc = SimulatedSoc::platform(&config.layout)?;
    let mut plugin =
        ArithmeticPlugin::pixel_unit(&mut soc, config.pixel_map()?)?.with_budget(config.budget);
    let gray = plugin.grayscale(pixel)?;
    check(&plugin, gray, pixel, 0);
    println!("gray({pixel:#010x}) = {gray:#010x} (level {})", gray >> 24);
    Ok(gray)
}

fn check<P: RegisterPort>(plugin: &ArithmeticPlugin<P>, got: u32, a: u32, b: u32) {
    let expected = plugin.reference(a, b);
    if got != expected {
        tracing::warn!(
            kernel = ?plugin.kernel(),
            got,
            expected,
            "plugin result differs from the software model"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rs5_core::arith::{expected_add, fibonacci_reference};

    #[test]
    fn long_fibonacci_runs_fit_the_raised_budget() {
        let config = Config::default();
        assert_eq!(fibonacci_budget(&config, 10), config.budget);
        assert_eq!(fibonacci_budget(&config, 1500).polls(), 1502);
        assert_eq!(run_fib(&config, 1500).unwrap(), fibonacci_reference(1500));
    }

    #[test]
    fn scalar_commands_return_the_plugin_results() {
        let config = Config::default();
        assert_eq!(run_add(&config, 2, 3).unwrap(), expected_add(2, 3));
        assert_eq!(run_fib(&config, 15).unwrap(), 610);
        assert_eq!(run_gray(&config, 0xAABB_CC00).unwrap(), 0x8C8C_8C00);
    }

    #[test]
    fn explicit_small_budget_still_times_out_on_stuck_hardware() {
        let config = Config::resolve(Default::default(), Some(5)).unwrap();
        let mut soc = SimulatedSoc::platform(&config.layout).unwrap();
        soc.set_stuck_busy(config.layout.adder_base, true).unwrap();
        let outcome = ArithmeticPlugin::adder(&mut soc, config.adder_map().unwrap())
            .unwrap()
            .with_budget(config.budget)
            .add(1, 1);
        assert!(outcome.is_err());
        assert_eq!(soc.bus_reads(), 5);
    }
}
