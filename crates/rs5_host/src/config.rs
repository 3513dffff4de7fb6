//! Host configuration: platform addresses, timing and poll budget.
//!
//! Values come from three layers, later ones winning: the `rs5_common`
//! defaults, an optional `rs5.toml`, and command-line flags.

use anyhow::{Context, Result, bail, ensure};
use rs5_common::DEFAULT_POLL_BUDGET;
use rs5_common::mmio::{IMAGE_INPUT_BASE, IMAGE_OUTPUT_BASE, WORD_BYTES};
use rs5_core::map::RegisterMap;
use rs5_core::session::PollBudget;
use rs5_hw::PlatformLayout;
use serde::Deserialize;
use std::path::Path;

/// Configuration file looked up in the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG_FILE: &str = "rs5.toml";

const DEFAULT_BRIDGE_ADDR: &str = "127.0.0.1:8000";

/// `rs5.toml` as written by the user. Every key is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OptionalConfig {
    pub poll_budget: Option<u32>,
    pub bridge: Option<String>,
    pub plugins: OptionalPlugins,
    pub image: OptionalBuffers,
    pub timing: OptionalTiming,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OptionalPlugins {
    pub adder: Option<usize>,
    pub fibonacci: Option<usize>,
    pub pixel: Option<usize>,
    pub image: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OptionalBuffers {
    pub input_base: Option<usize>,
    pub output_base: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OptionalTiming {
    pub scalar_latency: Option<u32>,
    pub pixels_per_tick: Option<u32>,
}

impl OptionalConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    /// Reads `path`, or `rs5.toml` if it exists when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// Fully resolved host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub layout: PlatformLayout,
    pub input_base: usize,
    pub output_base: usize,
    pub budget: PollBudget,
    pub bridge: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: PlatformLayout::default(),
            input_base: IMAGE_INPUT_BASE,
            output_base: IMAGE_OUTPUT_BASE,
            budget: PollBudget::new(DEFAULT_POLL_BUDGET),
            bridge: DEFAULT_BRIDGE_ADDR.to_string(),
        }
    }
}

impl Config {
    /// Applies file values over the defaults, then `budget` from the command
    /// line, and validates the result.
    pub fn resolve(file: OptionalConfig, budget: Option<u32>) -> Result<Self> {
        let defaults = Self::default();
        let layout = PlatformLayout {
            adder_base: file.plugins.adder.unwrap_or(defaults.layout.adder_base),
            fibonacci_base: file
                .plugins
                .fibonacci
                .unwrap_or(defaults.layout.fibonacci_base),
            pixel_base: file.plugins.pixel.unwrap_or(defaults.layout.pixel_base),
            image_base: file.plugins.image.unwrap_or(defaults.layout.image_base),
            scalar_latency: file
                .timing
                .scalar_latency
                .unwrap_or(defaults.layout.scalar_latency),
            pixels_per_tick: file
                .timing
                .pixels_per_tick
                .unwrap_or(defaults.layout.pixels_per_tick),
        };
        let config = Self {
            layout,
            input_base: file.image.input_base.unwrap_or(defaults.input_base),
            output_base: file.image.output_base.unwrap_or(defaults.output_base),
            budget: budget
                .or(file.poll_budget)
                .map(PollBudget::new)
                .unwrap_or(defaults.budget),
            bridge: file.bridge.unwrap_or(defaults.bridge),
        };
        config.validate()?;
        Ok(config)
    }

    /// The configured budget, raised to `floor` polls for an operation the
    /// simulated plugin cannot finish in fewer.
    ///
    /// # Arguments
    ///
    /// * `floor` - Status polls the operation needs on the software model
    /// * `operation` - Name logged when the floor replaces the configured budget
    pub fn budget_at_least(&self, floor: u32, operation: &str) -> PollBudget {
        let floor = PollBudget::new(floor);
        if floor > self.budget {
            tracing::info!(
                operation,
                configured = self.budget.polls(),
                raised = floor.polls(),
                "poll budget too small for the simulated plugin, raising it"
            );
        }
        self.budget.max(floor)
    }

    pub fn adder_map(&self) -> Result<RegisterMap> {
        Ok(RegisterMap::arithmetic(self.layout.adder_base)?)
    }

    pub fn fibonacci_map(&self) -> Result<RegisterMap> {
        Ok(RegisterMap::sequence(self.layout.fibonacci_base)?)
    }

    pub fn pixel_map(&self) -> Result<RegisterMap> {
        Ok(RegisterMap::arithmetic(self.layout.pixel_base)?)
    }

    pub fn image_map(&self) -> Result<RegisterMap> {
        Ok(RegisterMap::region(self.layout.image_base)?)
    }

    /// Every plugin map is constructible and no two of them overlap. Buffer
    /// bases are word aligned, the budget allows at least one poll and the
    /// image plugin converts at least one pixel per tick.
    pub fn validate(&self) -> Result<()> {
        let maps = [
            ("adder", self.adder_map()?),
            ("fibonacci", self.fibonacci_map()?),
            ("pixel", self.pixel_map()?),
            ("image", self.image_map()?),
        ];
        for (i, (name, map)) in maps.iter().enumerate() {
            for (other_name, other) in &maps[i + 1..] {
                if map.overlaps(other) {
                    bail!(
                        "{name} plugin at {:#010x} overlaps {other_name} plugin at {:#010x}",
                        map.base(),
                        other.base()
                    );
                }
            }
        }
        for (name, base) in [("input", self.input_base), ("output", self.output_base)] {
            ensure!(
                base % WORD_BYTES == 0,
                "image {name} buffer {base:#010x} is not word aligned"
            );
            ensure!(
                u32::try_from(base).is_ok(),
                "image {name} buffer {base:#010x} is outside the 32-bit bus"
            );
        }
        ensure!(self.budget.polls() > 0, "poll budget must be at least 1");
        ensure!(
            self.layout.pixels_per_tick > 0,
            "timing.pixels_per_tick must be at least 1"
        );
        Ok(())
    }
}
