//! Synthetic images: the connection test pattern and a moving-spot source.

use std::f64::consts::{LN_2, TAU};
use std::num::NonZeroU16;

use pixpipe_frame::{BitDepth, Image};

use crate::source::ImageSource;

/// Edge length of the test pattern pushed to every new receiver.
pub const TEST_PATTERN_SIZE: u16 = 1024;

/// Full width at half maximum of the test pattern spot, in pixels.
pub const TEST_PATTERN_FWHM: f64 = 300.0;

/// Angle the moving spot advances per frame.
const ORBIT_STEP: f64 = TAU / 64.0;

/// Square image with a centred 2D Gaussian spot peaking at the sample maximum.
pub fn gaussian(size: NonZeroU16, fwhm: f64, bit_depth: BitDepth) -> Image {
    let center = f64::from(size.get() / 2);
    gaussian_spot(size, size, (center, center), fwhm, bit_depth)
}

/// The handshake test pattern at `size`, with the spot scaled proportionally.
pub fn test_pattern(size: NonZeroU16) -> Image {
    let fwhm = TEST_PATTERN_FWHM * f64::from(size.get()) / f64::from(TEST_PATTERN_SIZE);
    gaussian(size, fwhm, BitDepth::Sixteen)
}

fn gaussian_spot(
    height: NonZeroU16,
    width: NonZeroU16,
    (row0, col0): (f64, f64),
    fwhm: f64,
    bit_depth: BitDepth,
) -> Image {
    let peak = f64::from(bit_depth.max_value());
    let fwhm = fwhm.max(1.0);
    let scale = -4.0 * LN_2 / (fwhm * fwhm);

    Image::from_fn(height, width, bit_depth, |row, col| {
        let dy = f64::from(row) - row0;
        let dx = f64::from(col) - col0;
        (peak * (scale * (dx * dx + dy * dy)).exp()) as u16
    })
}

/// Stand-in camera: a Gaussian spot orbiting the image centre.
#[derive(Debug, Clone)]
pub struct GaussianSource {
    height: NonZeroU16,
    width: NonZeroU16,
    bit_depth: BitDepth,
    fwhm: f64,
    frame: u64,
}

impl GaussianSource {
    pub fn new(height: NonZeroU16, width: NonZeroU16, bit_depth: BitDepth) -> Self {
        let short_side = height.get().min(width.get());
        Self {
            height,
            width,
            bit_depth,
            fwhm: f64::from(short_side) * 0.3,
            frame: 0,
        }
    }

    /// Override the spot size.
    pub fn with_fwhm(mut self, fwhm: f64) -> Self {
        self.fwhm = fwhm;
        self
    }

    /// Frames produced so far.
    pub fn frames_emitted(&self) -> u64 {
        self.frame
    }

    fn center(&self) -> (f64, f64) {
        let (height, width) = (f64::from(self.height.get()), f64::from(self.width.get()));
        let radius = height.min(width) / 4.0;
        let angle = self.frame as f64 * ORBIT_STEP;
        (height / 2.0 + radius * angle.sin(), width / 2.0 + radius * angle.cos())
    }
}

impl ImageSource for GaussianSource {
    fn next_frame(&mut self) -> Image {
        let image = gaussian_spot(
            self.height,
            self.width,
            self.center(),
            self.fwhm,
            self.bit_depth,
        );
        self.frame += 1;
        image
    }
}
