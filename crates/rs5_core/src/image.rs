//! RGB to grayscale image conversion plugin.
//!
//! The plugin reads `width * height` packed RGB words from an input range and
//! writes the same number of packed gray words to an output range. Both ranges
//! live in system RAM; the driver only tells the plugin where they are and
//! watches its progress counter.
//!
//! Pixel words are `0xRRGGBBxx` on input and `0xGGGGGG00` on output. The low
//! byte is padding in both directions.

use crate::DriverError;
use crate::codec::ControlStatus;
use crate::map::{PluginFamily, RegisterMap};
use crate::port::RegisterPort;
use crate::request::{OperationOutcome, OperationRequest};
use crate::session::{NoProgress, OperationSession, PollBudget, ProgressObserver};
use rs5_common::mmio::WORD_BYTES;

/// Packs 8-bit components into an input pixel word with a zero pad byte.
#[inline(always)]
pub const fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 24 | (g as u32) << 16 | (b as u32) << 8
}

/// Splits an input pixel word into `(r, g, b)`, discarding the pad byte.
#[inline(always)]
pub const fn rgb_components(pixel: u32) -> (u8, u8, u8) {
    ((pixel >> 24) as u8, (pixel >> 16) as u8, (pixel >> 8) as u8)
}

/// Gray level the plugin computes for an input pixel: `floor((R + G + B) / 4)`.
///
/// The divisor is 4, not 3, and the division truncates. The largest result is
/// 191 for white.
#[inline(always)]
pub const fn gray_level(pixel: u32) -> u8 {
    let (r, g, b) = rgb_components(pixel);
    ((r as u32 + g as u32 + b as u32) / 4) as u8
}

/// Replicates `gray` into the top three bytes; the low byte is zero.
#[inline(always)]
pub const fn pack_gray(gray: u8) -> u32 {
    let g = gray as u32;
    g << 24 | g << 16 | g << 8
}

/// Gray byte of an output pixel word.
#[inline(always)]
pub const fn unpack_gray(pixel: u32) -> u8 {
    (pixel >> 24) as u8
}

/// Output word the plugin produces for one input word.
#[inline(always)]
pub const fn convert_pixel(pixel: u32) -> u32 {
    pack_gray(gray_level(pixel))
}

/// Input and output address ranges plus dimensions of one region operation.
///
/// Always valid once built: both ranges hold exactly `width * height` words,
/// are word aligned, fit the 32-bit address space and do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    in_start: u32,
    in_end: u32,
    out_start: u32,
    out_end: u32,
    width: u32,
    height: u32,
}

impl ImageRegion {
    /// Builds a region from all six register values, checking the size
    /// invariant `in_end - in_start == out_end - out_start == width * height * 4`.
    pub fn new(
        in_start: u32,
        in_end: u32,
        out_start: u32,
        out_end: u32,
        width: u32,
        height: u32,
    ) -> Result<Self, DriverError> {
        let bytes = Self::byte_len_for(width, height)?;
        if in_start % WORD_BYTES as u32 != 0 || out_start % WORD_BYTES as u32 != 0 {
            return Err(DriverError::InvalidConfiguration("region is not word aligned"));
        }
        if in_end.checked_sub(in_start) != Some(bytes) || out_end.checked_sub(out_start) != Some(bytes)
        {
            return Err(DriverError::InvalidConfiguration(
                "range length does not match width * height * 4",
            ));
        }
        if in_start < out_end && out_start < in_end {
            return Err(DriverError::InvalidConfiguration("input and output ranges overlap"));
        }
        Ok(Self {
            in_start,
            in_end,
            out_start,
            out_end,
            width,
            height,
        })
    }

    /// Builds a region whose end addresses follow from the dimensions.
    pub fn contiguous(
        in_start: u32,
        out_start: u32,
        width: u32,
        height: u32,
    ) -> Result<Self, DriverError> {
        let bytes = Self::byte_len_for(width, height)?;
        let overflow = DriverError::InvalidConfiguration("region overflows the address space");
        let in_end = in_start.checked_add(bytes).ok_or(overflow)?;
        let out_end = out_start.checked_add(bytes).ok_or(overflow)?;
        Self::new(in_start, in_end, out_start, out_end, width, height)
    }

    fn byte_len_for(width: u32, height: u32) -> Result<u32, DriverError> {
        let elements = width
            .checked_mul(height)
            .ok_or(DriverError::InvalidConfiguration("image dimensions overflow"))?;
        if elements == 0 {
            return Err(DriverError::InvalidConfiguration("image has no pixels"));
        }
        elements
            .checked_mul(WORD_BYTES as u32)
            .ok_or(DriverError::InvalidConfiguration("image dimensions overflow"))
    }

    /// First byte of the packed RGB input.
    pub const fn in_start(&self) -> u32 {
        self.in_start
    }

    /// One past the last input byte.
    pub const fn in_end(&self) -> u32 {
        self.in_end
    }

    /// First byte of the packed grayscale output.
    pub const fn out_start(&self) -> u32 {
        self.out_start
    }

    /// One past the last output byte.
    pub const fn out_end(&self) -> u32 {
        self.out_end
    }

    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels, which is also the final value of the progress register.
    pub const fn element_count(&self) -> u32 {
        self.width * self.height
    }

    /// Byte length of each of the two ranges.
    pub const fn byte_len(&self) -> u32 {
        self.in_end - self.in_start
    }
}

/// Allocation-free check of the progress contract over one operation.
///
/// Counts samples and remembers the last and largest values seen. It also
/// counts every sample that went backwards or exceeded the element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressMonitor {
    bound: u32,
    samples: u32,
    last: u32,
    max: u32,
    regressions: u32,
    out_of_bounds: u32,
}

impl ProgressMonitor {
    /// Creates an empty monitor.
    ///
    /// # Arguments
    ///
    /// * `bound` - Largest legal progress value, the element count of the region
    pub const fn new(bound: u32) -> Self {
        Self {
            bound,
            samples: 0,
            last: 0,
            max: 0,
            regressions: 0,
            out_of_bounds: 0,
        }
    }

    /// Monitor for an operation over `region`.
    pub const fn for_region(region: &ImageRegion) -> Self {
        Self::new(region.element_count())
    }

    /// Number of progress values observed.
    pub const fn samples(&self) -> u32 {
        self.samples
    }

    /// Most recent progress value.
    pub const fn last(&self) -> u32 {
        self.last
    }

    /// Largest progress value seen.
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Samples smaller than the one before them.
    pub const fn regressions(&self) -> u32 {
        self.regressions
    }

    /// Samples above the bound.
    pub const fn out_of_bounds(&self) -> u32 {
        self.out_of_bounds
    }

    /// True if every sample stayed within `0..=bound` and never decreased.
    pub const fn holds(&self) -> bool {
        self.regressions == 0 && self.out_of_bounds == 0
    }
}

impl ProgressObserver for ProgressMonitor {
    fn on_progress(&mut self, elements: u32) {
        if self.samples > 0 && elements < self.last {
            self.regressions += 1;
        }
        if elements > self.bound {
            self.out_of_bounds += 1;
        }
        self.samples += 1;
        self.last = elements;
        self.max = self.max.max(elements);
    }
}

/// Outcome of a completed region operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionReport {
    pub region: ImageRegion,
    /// Progress register value read once the plugin reported completion.
    pub progress: u32,
}

impl ConversionReport {
    /// True if the plugin reported every element as produced.
    pub const fn is_complete(&self) -> bool {
        self.progress == self.region.element_count()
    }
}

/// Driver for the bulk RGB to grayscale plugin.
pub struct ImageConversionPlugin<P: RegisterPort> {
    session: OperationSession<P>,
}

impl<P: RegisterPort> ImageConversionPlugin<P> {
    /// Wraps `port` for the image plugin described by `map`.
    ///
    /// Fails with `Unsupported` unless `map` is a region-family map.
    pub fn new(port: P, map: RegisterMap) -> Result<Self, DriverError> {
        if map.family() != PluginFamily::Region {
            return Err(DriverError::Unsupported {
                what: "image conversion",
                family: map.family(),
            });
        }
        Ok(Self {
            session: OperationSession::new(port, map),
        })
    }

    /// Sets the poll budget of every following conversion.
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.session.set_budget(budget);
        self
    }

    /// Underlying session.
    pub fn session_mut(&mut self) -> &mut OperationSession<P> {
        &mut self.session
    }

    /// Releases the port, ending this driver.
    pub fn into_port(self) -> P {
        self.session.into_port()
    }

    /// Current busy/done flags.
    pub fn status(&mut self) -> Result<ControlStatus, DriverError> {
        self.session.status()
    }

    /// Pixels produced so far by the running or last conversion.
    pub fn progress(&mut self) -> Result<u32, DriverError> {
        self.session.progress()
    }

    /// Programs the six range and dimension registers.
    ///
    /// Rejected with `InvalidConfiguration`, and nothing written, if the
    /// plugin is still busy.
    pub fn configure(&mut self, region: &ImageRegion) -> Result<(), DriverError> {
        self.session.configure_region(region)
    }

    /// Starts processing the last configured region. Resets progress to zero.
    pub fn start(&mut self) -> Result<(), DriverError> {
        self.session.start()
    }

    /// Polls a started operation and returns its final progress.
    ///
    /// A caller that abandons an operation after a timeout must reconfigure
    /// before the next start.
    pub fn wait(&mut self, observer: &mut dyn ProgressObserver) -> OperationOutcome {
        self.session.wait(observer)
    }

    /// Configures, starts and waits for one region.
    pub fn convert(&mut self, region: ImageRegion) -> Result<ConversionReport, DriverError> {
        self.convert_observed(region, &mut NoProgress)
    }

    /// Like [`convert`](Self::convert), passing every progress sample to `observer`.
    ///
    /// # Returns
    ///
    /// The region together with the final progress count, which equals
    /// `region.element_count()` on a plugin that honours its contract.
    pub fn convert_observed(
        &mut self,
        region: ImageRegion,
        observer: &mut dyn ProgressObserver,
    ) -> Result<ConversionReport, DriverError> {
        let progress = self
            .session
            .execute_observed(&OperationRequest::Region(region), observer)?;
        Ok(ConversionReport { region, progress })
    }

    /// Converts `width * height` pixels between two buffers, deriving the end
    /// addresses. An empty image is rejected before any register access.
    pub fn convert_buffers(
        &mut self,
        in_start: u32,
        out_start: u32,
        width: u32,
        height: u32,
    ) -> Result<ConversionReport, DriverError> {
        let region = ImageRegion::contiguous(in_start, out_start, width, height)?;
        self.convert(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPort;
    use proptest::prelude::*;

    const BASE: usize = 0x1000_0000;
    const CTRL: usize = BASE + 0x18;
    const PROGRESS: usize = BASE + 0x1C;

    #[test]
    fn conversion_matches_the_documented_pixels() {
        assert_eq!(convert_pixel(0xFF00_0000), 0x3F3F_3F00);
        assert_eq!(convert_pixel(0x00FF_0000), 0x3F3F_3F00);
        assert_eq!(convert_pixel(0x0000_FF00), 0x3F3F_3F00);
        assert_eq!(convert_pixel(0xFFFF_FF00), 0xBFBF_BF00);
        assert_eq!(convert_pixel(0x0000_0000), 0x0000_0000);
        assert_eq!(convert_pixel(0x8080_80FF), 0x6060_6000);
        assert_eq!(convert_pixel(0xAABB_CC00), 0x8C8C_8C00);
    }

    #[test]
    fn pack_and_split_agree() {
        assert_eq!(pack_rgb(0x12, 0x34, 0x56), 0x1234_5600);
        assert_eq!(rgb_components(0x1234_56FF), (0x12, 0x34, 0x56));
    }

    #[test]
    fn region_rejects_empty_and_inconsistent_shapes() {
        let err = |r: Result<ImageRegion, DriverError>| {
            matches!(r, Err(DriverError::InvalidConfiguration(_)))
        };
        assert!(err(ImageRegion::contiguous(0x100, 0x200, 0, 4)));
        assert!(err(ImageRegion::contiguous(0x100, 0x200, 4, 0)));
        assert!(err(ImageRegion::new(0x100, 0x110, 0x200, 0x20C, 2, 2)));
        assert!(err(ImageRegion::new(0x110, 0x100, 0x200, 0x210, 2, 2)));
        assert!(err(ImageRegion::contiguous(0x102, 0x200, 1, 1)));
        assert!(err(ImageRegion::contiguous(0x100, 0x108, 2, 2)));
        assert!(err(ImageRegion::contiguous(0xFFFF_FFF0, 0x200, 2, 4)));
        assert!(err(ImageRegion::contiguous(0x100, 0x200, u32::MAX, 2)));
    }

    #[test]
    fn single_pixel_region_is_valid() {
        let region = ImageRegion::contiguous(0x8000_2064, 0x8000_3064, 1, 1).unwrap();
        assert_eq!(region.element_count(), 1);
        assert_eq!(region.in_end(), 0x8000_2068);
        assert_eq!(region.byte_len(), 4);
    }

    #[test]
    fn empty_image_never_reaches_the_hardware() {
        let mut plugin =
            ImageConversionPlugin::new(ScriptedPort::new(), RegisterMap::region(BASE).unwrap())
                .unwrap();
        assert!(matches!(
            plugin.convert_buffers(0x8000_2000, 0x8000_3000, 0, 0),
            Err(DriverError::InvalidConfiguration(_))
        ));
        assert!(!plugin.into_port().touched());
    }

    #[test]
    fn plugin_requires_a_region_map() {
        assert!(matches!(
            ImageConversionPlugin::new(ScriptedPort::new(), RegisterMap::arithmetic(BASE).unwrap()),
            Err(DriverError::Unsupported { .. })
        ));
    }

    #[test]
    fn monitor_tracks_the_progress_contract() {
        let port = ScriptedPort::new()
            .script(CTRL, &[0, 1, 1, 1, 2])
            .script(PROGRESS, &[0, 2, 3, 4]);
        let mut plugin =
            ImageConversionPlugin::new(port, RegisterMap::region(BASE).unwrap()).unwrap();
        let region = ImageRegion::contiguous(0x8000_2000, 0x8000_3000, 2, 2).unwrap();

        let mut monitor = ProgressMonitor::for_region(&region);
        let report = plugin.convert_observed(region, &mut monitor).unwrap();

        assert!(report.is_complete());
        assert!(monitor.holds());
        assert_eq!(monitor.samples(), 4);
        assert_eq!(monitor.last(), 4);
    }

    #[test]
    fn monitor_flags_regressions_and_overruns() {
        let mut monitor = ProgressMonitor::new(4);
        for p in [0, 3, 2, 5] {
            monitor.on_progress(p);
        }
        assert_eq!(monitor.regressions(), 1);
        assert_eq!(monitor.out_of_bounds(), 1);
        assert_eq!(monitor.max(), 5);
        assert!(!monitor.holds());
    }

    proptest! {
        #[test]
        fn gray_repacking_is_idempotent(pixel in any::<u32>()) {
            let out = convert_pixel(pixel);
            prop_assert_eq!(pack_gray(unpack_gray(out)), out);
            prop_assert_eq!(out & 0xFF, 0);
        }

        #[test]
        fn low_byte_of_input_is_ignored(rgb in any::<u32>(), pad in any::<u8>()) {
            let base = rgb & !0xFF;
            prop_assert_eq!(convert_pixel(base), convert_pixel(base | pad as u32));
        }

        #[test]
        fn gray_level_is_truncated_quarter_sum(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let expected = (r as u32 + g as u32 + b as u32) / 4;
            prop_assert_eq!(gray_level(pack_rgb(r, g, b)) as u32, expected);
        }
    }
}
