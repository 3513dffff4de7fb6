use crate::parser::{parse_hex, parse_ppm};
use crate::{GrayImage, RgbImage};
use anyhow::{Context, Result, ensure};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Loads a binary PPM (P6) image.
pub fn load_ppm<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (header, raster) =
        parse_ppm(&bytes).with_context(|| format!("Failed to parse {}", path.display()))?;
    RgbImage::from_rgb_bytes(header.width, header.height, raster)
}

/// Writes `image` as a binary PPM (P6).
pub fn save_ppm<P: AsRef<Path>>(path: P, image: &RgbImage) -> Result<()> {
    let mut bytes = format!("P6\n{} {}\n255\n", image.width(), image.height()).into_bytes();
    bytes.extend(image.rgb_bytes());
    write(path.as_ref(), &bytes)
}

/// Writes `image` as a binary PGM (P5).
pub fn save_pgm<P: AsRef<Path>>(path: P, image: &GrayImage) -> Result<()> {
    let mut bytes = format!("P5\n{} {}\n255\n", image.width(), image.height()).into_bytes();
    bytes.extend_from_slice(image.levels());
    write(path.as_ref(), &bytes)
}

/// Loads a `.bin` file of little-endian words.
pub fn load_bin<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    ensure!(
        bytes.len() % 4 == 0,
        "{} is {} bytes, not a whole number of words",
        path.display(),
        bytes.len()
    );
    Ok(words_from_le_bytes(&bytes))
}

/// Writes `words` as a `.bin` file of little-endian words.
pub fn save_bin<P: AsRef<Path>>(path: P, words: &[u32]) -> Result<()> {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    write(path.as_ref(), &bytes)
}

/// Loads a `.hex` memory image.
pub fn load_hex<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_hex(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Writes `words` one per line as eight uppercase hex digits.
pub fn save_hex<P: AsRef<Path>>(path: P, words: &[u32]) -> Result<()> {
    write(path.as_ref(), format_hex(words).as_bytes())
}

/// Renders the `.hex` text for `words`.
pub fn format_hex(words: &[u32]) -> String {
    let mut out = String::with_capacity(words.len() * 9);
    for w in words {
        let _ = writeln!(out, "{w:08X}");
    }
    out
}

/// Groups bytes into little-endian words, zero-padding a trailing partial word.
pub fn words_from_le_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
        .collect()
}

/// Converts an arbitrary binary file into a `.hex` memory image.
pub fn pack_bin_to_hex<P: AsRef<Path>, Q: AsRef<Path>>(bin: P, hex: Q) -> Result<usize> {
    let bin = bin.as_ref();
    let bytes = fs::read(bin).with_context(|| format!("Failed to read {}", bin.display()))?;
    let words = words_from_le_bytes(&bytes);
    save_hex(hex, &words)?;
    Ok(words.len())
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
