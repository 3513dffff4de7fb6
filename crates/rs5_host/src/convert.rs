//! Whole-image conversion through the simulated image plugin.
//!
//! Loads a PPM into the simulated RAM at the configured input buffer, runs the
//! plugin over the region, verifies every output word against the software
//! reduction, and saves the result as PGM. The raw input and output words can
//! also be written as `.bin` or `.hex` memory images for the RTL testbench.

use crate::config::Config;
use crate::stats::TickStats;
use anyhow::{Context, Result, ensure};
use rs5_core::image::{ImageConversionPlugin, ImageRegion, ProgressMonitor, convert_pixel};
use rs5_core::session::PollBudget;
use rs5_hw::SimulatedSoc;
use rs5_io::{GrayImage, RgbImage, loader};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Optional memory-image side outputs of a conversion.
#[derive(Debug, Default)]
pub struct Dumps {
    pub input_hex: Option<PathBuf>,
    pub output_bin: Option<PathBuf>,
}

/// Places the input at `config.input_base` and the output at
/// `config.output_base`, or directly after the input if the configured output
/// buffer is too close to hold a disjoint copy.
pub fn plan_region(config: &Config, width: u32, height: u32) -> Result<ImageRegion> {
    let in_start = u32::try_from(config.input_base)?;
    let out_start = u32::try_from(config.output_base)?;
    match ImageRegion::contiguous(in_start, out_start, width, height) {
        Ok(region) => Ok(region),
        Err(_) => {
            let relocated = width
                .checked_mul(height)
                .and_then(|n| n.checked_mul(4))
                .and_then(|bytes| in_start.checked_add(bytes))
                .context("image does not fit the address space")?;
            tracing::warn!(
                configured = out_start,
                relocated,
                "output buffer overlaps the input, placing it after the input"
            );
            Ok(ImageRegion::contiguous(in_start, relocated, width, height)?)
        }
    }
}

/// The configured budget, raised to one poll per pixel for large regions.
pub fn region_budget(config: &Config, region: &ImageRegion) -> PollBudget {
    config.budget_at_least(region.element_count().saturating_add(16), "convert")
}

/// Runs the plugin over `image` and returns the converted words.
pub fn convert_on_soc(config: &Config, image: &RgbImage) -> Result<(Vec<u32>, TickStats)> {
    let region = plan_region(config, image.width(), image.height())?;
    let mut soc = SimulatedSoc::platform(&config.layout)?;
    soc.load_words(region.in_start() as usize, image.packed());

    let mut monitor = ProgressMonitor::for_region(&region);
    let report = ImageConversionPlugin::new(&mut soc, config.image_map()?)?
        .with_budget(region_budget(config, &region))
        .convert_observed(region, &mut monitor)?;

    ensure!(
        report.is_complete(),
        "plugin reported {} of {} pixels",
        report.progress,
        region.element_count()
    );
    ensure!(
        monitor.holds(),
        "progress went backwards {} times or past the pixel count {} times",
        monitor.regressions(),
        monitor.out_of_bounds()
    );
    tracing::debug!(samples = monitor.samples(), ticks = soc.ticks(), "conversion finished");

    let output = soc.dump_words(region.out_start() as usize, image.packed().len());
    let mismatch = image
        .packed()
        .iter()
        .zip(&output)
        .position(|(&px, &out)| convert_pixel(px) != out);
    if let Some(i) = mismatch {
        anyhow::bail!(
            "pixel {i}: plugin wrote {:#010x}, expected {:#010x}",
            output[i],
            convert_pixel(image.packed()[i])
        );
    }

    let mut stats = TickStats::new(64);
    stats.update(soc.ticks());
    Ok((output, stats))
}

/// The `convert` command.
pub fn run_convert(config: &Config, input: &Path, output: &Path, dumps: &Dumps) -> Result<()> {
    let image = loader::load_ppm(input)?;
    println!(
        "Converting {} ({}x{}, {} pixels)...",
        input.display(),
        image.width(),
        image.height(),
        image.packed().len()
    );
    if let Some(path) = &dumps.input_hex {
        loader::save_hex(path, image.packed())?;
        println!("Input memory image: {}", path.display());
    }

    let start = Instant::now();
    let (words, stats) = convert_on_soc(config, &image)?;
    let elapsed = start.elapsed();

    let gray = GrayImage::from_packed(image.width(), image.height(), &words)?;
    loader::save_pgm(output, &gray)?;
    if let Some(path) = &dumps.output_bin {
        loader::save_bin(path, &words)?;
        println!("Output words: {}", path.display());
    }

    println!("Wrote {} in {:?}", output.display(), elapsed);
    println!("Simulated ticks: {}", stats.max);
    Ok(())
}

/// The `pack` command: raw bytes to a `.hex` memory image.
pub fn run_pack(bin: &Path, hex: &Path) -> Result<()> {
    let words = loader::pack_bin_to_hex(bin, hex)?;
    println!("Packed {} into {} words at {}", bin.display(), words, hex.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_images_use_the_configured_buffers() {
        let region = plan_region(&Config::default(), 2, 2).unwrap();
        assert_eq!(region.in_start(), 0x8000_2000);
        assert_eq!(region.out_start(), 0x8000_3000);
    }

    #[test]
    fn large_images_move_the_output_after_the_input() {
        let region = plan_region(&Config::default(), 64, 64).unwrap();
        assert_eq!(region.out_start(), 0x8000_2000 + 64 * 64 * 4);
    }

    #[test]
    fn region_budget_keeps_a_sufficient_configured_budget() {
        let config = Config::default();
        let small = plan_region(&config, 2, 2).unwrap();
        assert_eq!(region_budget(&config, &small), config.budget);

        let large = plan_region(&config, 64, 64).unwrap();
        assert_eq!(region_budget(&config, &large).polls(), 64 * 64 + 16);
    }

    #[test]
    fn conversion_matches_the_software_model() {
        let image = RgbImage::from_packed(
            2,
            2,
            vec![0xFF00_0000, 0x00FF_0000, 0x0000_FF00, 0x8080_8000],
        )
        .unwrap();
        let (words, stats) = convert_on_soc(&Config::default(), &image).unwrap();
        assert_eq!(words, vec![0x3F3F_3F00, 0x3F3F_3F00, 0x3F3F_3F00, 0x6060_6000]);
        assert_eq!(stats.count, 1);
    }
}
