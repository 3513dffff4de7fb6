//! Test image generator for the image conversion plugin.
//!
//! Produces deterministic RGB images from a seed, so a failing conversion can
//! be reproduced exactly. Images are written as binary PPM and can be fed to
//! the `convert` command or packed for the testbench.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rs5_core::image::pack_rgb;
use rs5_io::{RgbImage, loader};

/// Content of a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// Independent uniformly random pixels.
    Noise,
    /// Red ramps along x, green along y, blue is random.
    Gradient,
    /// The primaries, gray and white repeated, the values the hardware tests use.
    Primaries,
}

/// Builds a `width` x `height` image.
///
/// # Arguments
///
/// * `width`, `height` - Dimensions in pixels, both non-zero
/// * `pattern` - Content to generate
/// * `seed` - Seed for the random parts of the pattern
pub fn generate_image(width: u32, height: u32, pattern: Pattern, seed: u64) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        bail!("image dimensions must be non-zero, got {width}x{height}");
    }
    let count = width
        .checked_mul(height)
        .with_context(|| format!("{width}x{height} pixels exceed the 32-bit pixel count"))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = |v: u32, max: u32| {
        (u64::from(v) * 255 / u64::from(max.saturating_sub(1).max(1))) as u8
    };

    let mut pixels = Vec::with_capacity(count as usize);
    for y in 0..height {
        for x in 0..width {
            let pixel = match pattern {
                Pattern::Noise => rng.r#gen::<u32>() & !0xFF,
                Pattern::Gradient => pack_rgb(scale(x, width), scale(y, height), rng.r#gen()),
                Pattern::Primaries => {
                    const CYCLE: [u32; 5] =
                        [0xFF00_0000, 0x00FF_0000, 0x0000_FF00, 0x8080_8000, 0xFFFF_FF00];
                    CYCLE[((y * width + x) % CYCLE.len() as u32) as usize]
                }
            };
            pixels.push(pixel);
        }
    }
    RgbImage::from_packed(width, height, pixels)
}

/// Generates an image and writes it to `path` as PPM.
pub fn generate_ppm(path: &str, width: u32, height: u32, pattern: Pattern, seed: u64) -> Result<()> {
    println!("Generating {width}x{height} {pattern:?} image (seed={seed})...");
    let image = generate_image(width, height, pattern, seed)?;
    loader::save_ppm(path, &image)?;
    println!("Wrote {path}");
    Ok(())
}
