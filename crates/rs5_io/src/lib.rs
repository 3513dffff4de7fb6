//! Image and memory-image file formats used around the RS5 image plugin.
//!
//! Host tools move pixel data between ordinary image files and the packed
//! word layout the plugin reads from RAM. Input images are binary PPM (P6),
//! converted images are written as binary PGM (P5). Raw RAM contents travel
//! as little-endian `.bin` files or as `$readmemh`-style `.hex` files that
//! the Verilator testbench preloads.

use anyhow::{Result, bail, ensure};
use rs5_core::image::{pack_rgb, rgb_components, unpack_gray};

/// File loading and saving with path context on every error.
///
/// Handles the `.bin`, `.hex`, PPM and PGM formats and the conversion between
/// raw bytes and packed words.
pub mod loader;

/// `nom` parsers for the PPM header and the `.hex` memory image.
pub mod parser;

/// RGB image stored as packed `0xRRGGBB00` words in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl RgbImage {
    /// Wraps packed pixel words. The low byte of each word is cleared.
    pub fn from_packed(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self> {
        let expected = pixel_count(width, height)?;
        ensure!(
            pixels.len() == expected,
            "{width}x{height} image needs {expected} pixels, got {}",
            pixels.len()
        );
        let pixels = pixels.into_iter().map(|p| p & !0xFF).collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Packs interleaved `R G B` bytes.
    pub fn from_rgb_bytes(width: u32, height: u32, rgb: &[u8]) -> Result<Self> {
        let expected = pixel_count(width, height)?;
        ensure!(
            rgb.len() == expected * 3,
            "{width}x{height} image needs {} RGB bytes, got {}",
            expected * 3,
            rgb.len()
        );
        let pixels = rgb
            .chunks_exact(3)
            .map(|c| pack_rgb(c[0], c[1], c[2]))
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixels as `0xRRGGBB00` words, row-major.
    pub fn packed(&self) -> &[u32] {
        &self.pixels
    }

    /// Interleaved `R G B` bytes, as stored in a PPM raster.
    pub fn rgb_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&p| {
                let (r, g, b) = rgb_components(p);
                [r, g, b]
            })
            .collect()
    }
}

/// Grayscale image, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: u32,
    height: u32,
    levels: Vec<u8>,
}

impl GrayImage {
    /// Takes the gray byte of each packed output word.
    pub fn from_packed(width: u32, height: u32, words: &[u32]) -> Result<Self> {
        let expected = pixel_count(width, height)?;
        ensure!(
            words.len() == expected,
            "{width}x{height} image needs {expected} output words, got {}",
            words.len()
        );
        Ok(Self {
            width,
            height,
            levels: words.iter().map(|&w| unpack_gray(w)).collect(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// One gray level per pixel, row-major.
    pub fn levels(&self) -> &[u8] {
        &self.levels
    }
}

fn pixel_count(width: u32, height: u32) -> Result<usize> {
    match width.checked_mul(height) {
        Some(0) => bail!("image has no pixels"),
        Some(n) => Ok(n as usize),
        None => bail!("image dimensions {width}x{height} overflow"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_bytes_pack_into_words() {
        let img = RgbImage::from_rgb_bytes(2, 1, &[0xAA, 0xBB, 0xCC, 1, 2, 3]).unwrap();
        assert_eq!(img.packed(), &[0xAABB_CC00, 0x0102_0300]);
        assert_eq!(img.rgb_bytes(), vec![0xAA, 0xBB, 0xCC, 1, 2, 3]);
    }

    #[test]
    fn shapes_are_checked() {
        assert!(RgbImage::from_rgb_bytes(2, 2, &[0; 11]).is_err());
        assert!(RgbImage::from_packed(0, 5, vec![]).is_err());
        assert!(GrayImage::from_packed(1, 2, &[0]).is_err());
    }

    #[test]
    fn gray_image_keeps_the_top_byte() {
        let img = GrayImage::from_packed(2, 1, &[0x8C8C_8C00, 0x3F3F_3F00]).unwrap();
        assert_eq!(img.levels(), &[0x8C, 0x3F]);
    }
}
