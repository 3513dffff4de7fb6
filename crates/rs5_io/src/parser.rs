//! Parsers for the text and binary headers the host reads.

use anyhow::{Result, anyhow, ensure};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while_m_n},
    character::complete::{char as the_char, digit1, multispace1},
    combinator::{all_consuming, map_res, value},
    multi::many0,
    sequence::{pair, preceded, tuple},
};

/// Dimensions of a binary PPM raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpmHeader {
    pub width: u32,
    pub height: u32,
    pub maxval: u32,
}

/// Whitespace and `#` comments between header fields.
fn separator(s: &[u8]) -> IResult<&[u8], ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(the_char('#'), take_till(|c: u8| c == b'\n'))),
        ))),
    )(s)
}

fn decimal(s: &[u8]) -> IResult<&[u8], u32> {
    map_res(map_res(digit1, std::str::from_utf8), str::parse::<u32>)(s)
}

/// Parses `P6 <width> <height> <maxval>` and the single whitespace byte that
/// separates the header from the raster.
pub fn ppm_header(s: &[u8]) -> IResult<&[u8], PpmHeader> {
    let (rest, (_, width, height, maxval)) = tuple((
        tag("P6"),
        preceded(separator, decimal),
        preceded(separator, decimal),
        preceded(separator, decimal),
    ))(s)?;
    let (rest, _) = take_while_m_n(1, 1, |c: u8| c.is_ascii_whitespace())(rest)?;
    Ok((
        rest,
        PpmHeader {
            width,
            height,
            maxval,
        },
    ))
}

/// Splits a PPM file into its header and exactly `width * height * 3` raster
/// bytes. Only 8-bit rasters are accepted.
pub fn parse_ppm(bytes: &[u8]) -> Result<(PpmHeader, &[u8])> {
    let (raster, header) =
        ppm_header(bytes).map_err(|e| anyhow!("malformed PPM header: {e:?}"))?;
    ensure!(
        header.maxval == 255,
        "unsupported PPM maxval {} (only 255)",
        header.maxval
    );
    let needed = header.width as usize * header.height as usize * 3;
    ensure!(
        raster.len() >= needed,
        "PPM raster truncated: {} of {needed} bytes",
        raster.len()
    );
    Ok((header, &raster[..needed]))
}

fn hex_word(s: &str) -> IResult<&str, u32> {
    map_res(take_while_m_n(1, 8, |c: char| c.is_ascii_hexdigit()), |digits| {
        u32::from_str_radix(digits, 16)
    })(s)
}

/// Parses a `.hex` memory image: one word per line, blank lines and `//`
/// comments skipped, either letter case.
pub fn parse_hex(text: &str) -> Result<Vec<u32>> {
    let mut words = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split("//").next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let (_, word) = all_consuming(hex_word)(line)
            .map_err(|_| anyhow!("line {}: invalid hex word {line:?}", lineno + 1))?;
        words.push(word);
    }
    Ok(words)
}
