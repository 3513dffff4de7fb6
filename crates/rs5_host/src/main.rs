mod bridge;
mod config;
mod convert;
mod generator;
mod scalar;
mod scenarios;
mod stats;
mod throughput;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, OptionalConfig};
use convert::Dumps;
use generator::Pattern;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rs5", about = "Drive RS5 plugin accelerators through their registers")]
struct Cli {
    /// Configuration file (defaults to ./rs5.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Maximum status polls per operation.
    #[arg(long, global = true)]
    budget: Option<u32>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add two words on the adder plugin.
    Add {
        #[arg(value_parser = parse_word, allow_negative_numbers = true)]
        a: u32,
        #[arg(value_parser = parse_word, allow_negative_numbers = true)]
        b: u32,
    },
    /// Compute fib(n) on the Fibonacci plugin.
    Fib { n: u32 },
    /// Convert one packed RGB word on the pixel processor.
    Gray {
        #[arg(value_parser = parse_word)]
        pixel: u32,
    },
    /// Convert a PPM image to grayscale PGM on the image plugin.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Also write the input words as a `.hex` memory image.
        #[arg(long)]
        input_hex: Option<PathBuf>,
        /// Also write the output words as a raw `.bin` file.
        #[arg(long)]
        output_bin: Option<PathBuf>,
    },
    /// Generate a test image.
    Gen {
        path: String,
        #[arg(long, default_value_t = 64)]
        width: u32,
        #[arg(long, default_value_t = 64)]
        height: u32,
        #[arg(long, value_enum, default_value_t = Pattern::Noise)]
        pattern: Pattern,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Pack a raw binary into a `.hex` memory image.
    Pack { bin: PathBuf, hex: PathBuf },
    /// Run the self-checking plugin scenarios.
    Scenarios {
        /// Only run scenarios whose name contains this text.
        filter: Option<String>,
    },
    /// Convert images on independent simulated SoCs in parallel.
    Parallel {
        #[arg(long, default_value_t = 8)]
        instances: usize,
        #[arg(long, default_value_t = 32)]
        width: u32,
        #[arg(long, default_value_t = 32)]
        height: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Run one adder operation against the RTL co-simulation.
    Bridge {
        #[arg(long, value_parser = parse_word, default_value = "2")]
        a: u32,
        #[arg(long, value_parser = parse_word, default_value = "3")]
        b: u32,
        /// Clock cycles advanced before every register read.
        #[arg(long, default_value_t = 10)]
        cycles_per_read: u32,
    },
}

/// Accepts `0x`-prefixed hex, unsigned decimal, or negative decimal that is
/// reinterpreted as two's complement.
fn parse_word(text: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(&hex.replace('_', ""), 16).map_err(|e| e.to_string())
    } else if text.starts_with('-') {
        text.parse::<i32>().map(|v| v as u32).map_err(|e| e.to_string())
    } else {
        text.parse::<u32>().map_err(|e| e.to_string())
    };
    parsed.map_err(|e| format!("invalid word {text:?}: {e}"))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = OptionalConfig::load(cli.config.as_deref())?;
    let config = Config::resolve(file, cli.budget).context("Invalid configuration")?;
    tracing::debug!(?config, "configuration resolved");

    match cli.command {
        Commands::Add { a, b } => {
            scalar::run_add(&config, a, b)?;
        }
        Commands::Fib { n } => {
            scalar::run_fib(&config, n)?;
        }
        Commands::Gray { pixel } => {
            scalar::run_gray(&config, pixel)?;
        }
        Commands::Convert {
            input,
            output,
            input_hex,
            output_bin,
        } => {
            let dumps = Dumps {
                input_hex,
                output_bin,
            };
            convert::run_convert(&config, &input, &output, &dumps)?;
        }
        Commands::Gen {
            path,
            width,
            height,
            pattern,
            seed,
        } => generator::generate_ppm(&path, width, height, pattern, seed)?,
        Commands::Pack { bin, hex } => convert::run_pack(&bin, &hex)?,
        Commands::Scenarios { filter } => scenarios::run_scenarios(&config, filter.as_deref())?,
        Commands::Parallel {
            instances,
            width,
            height,
            seed,
        } => throughput::run_parallel(&config, instances, width, height, seed)?,
        Commands::Bridge {
            a,
            b,
            cycles_per_read,
        } => bridge::run_bridge_check(&config, a, b, cycles_per_read)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn words_parse_in_every_notation() {
        assert_eq!(parse_word("0xFFFF_FFFB"), Ok(0xFFFF_FFFB));
        assert_eq!(parse_word("42"), Ok(42));
        assert_eq!(parse_word("-5"), Ok(0xFFFF_FFFB));
        assert!(parse_word("0xZZ").is_err());
        assert!(parse_word("4294967296").is_err());
    }

    #[test]
    fn negative_operands_reach_the_add_command() {
        let cli = Cli::try_parse_from(["rs5", "add", "-5", "-3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Add {
                a: 0xFFFF_FFFB,
                b: 0xFFFF_FFFD
            }
        ));
    }
}
