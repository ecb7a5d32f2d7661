use std::fmt;
use std::num::NonZeroU16;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Sample width of a grayscale image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    /// One byte per sample.
    Eight,
    /// Two bytes per sample, little-endian.
    Sixteen,
}

impl BitDepth {
    /// Parse the on-wire bit depth field.
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            other => Err(FrameError::InvalidBitDepth(other)),
        }
    }

    /// Bits per sample (8 or 16).
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Bytes per sample (1 or 2).
    pub fn bytes_per_sample(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }

    /// Largest representable sample value.
    pub fn max_value(self) -> u16 {
        match self {
            BitDepth::Eight => u8::MAX as u16,
            BitDepth::Sixteen => u16::MAX,
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = FrameError;

    fn try_from(bits: u16) -> Result<Self> {
        Self::from_bits(bits)
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// A single-channel grayscale image, row-major.
///
/// The sample buffer always holds exactly `height * width * bytes_per_sample`
/// bytes; every constructor checks this. Sixteen-bit samples are stored
/// little-endian, which is also their order on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    height: u16,
    width: u16,
    bit_depth: BitDepth,
    data: Bytes,
}

impl Image {
    /// Build an image from raw sample bytes.
    pub fn new(height: u16, width: u16, bit_depth: BitDepth, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if height == 0 || width == 0 {
            return Err(FrameError::EmptyImage { height, width });
        }
        let expected = Self::expected_len(height, width, bit_depth);
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                declared: data.len(),
                expected,
                height,
                width,
                bit_depth: bit_depth.bits(),
            });
        }
        Ok(Self {
            height,
            width,
            bit_depth,
            data,
        })
    }

    /// Build an 8-bit image.
    pub fn from_u8(height: u16, width: u16, samples: impl Into<Bytes>) -> Result<Self> {
        Self::new(height, width, BitDepth::Eight, samples)
    }

    /// Build a 16-bit image from native samples.
    pub fn from_u16(height: u16, width: u16, samples: &[u16]) -> Result<Self> {
        let mut data = BytesMut::with_capacity(samples.len() * 2);
        for &sample in samples {
            data.put_u16_le(sample);
        }
        Self::new(height, width, BitDepth::Sixteen, data.freeze())
    }

    /// Build an image with every sample set to `value`.
    ///
    /// For 8-bit images the value is clamped to 255.
    pub fn filled(height: u16, width: u16, bit_depth: BitDepth, value: u16) -> Result<Self> {
        let count = height as usize * width as usize;
        let mut data = BytesMut::with_capacity(count * bit_depth.bytes_per_sample());
        match bit_depth {
            BitDepth::Eight => data.put_bytes(value.min(u8::MAX as u16) as u8, count),
            BitDepth::Sixteen => {
                for _ in 0..count {
                    data.put_u16_le(value);
                }
            }
        }
        Self::new(height, width, bit_depth, data.freeze())
    }

    /// Build an image by evaluating `f(row, col)` for every sample.
    ///
    /// Values above the bit depth's maximum are clamped. Non-zero dimensions
    /// make this constructor infallible.
    pub fn from_fn(
        height: NonZeroU16,
        width: NonZeroU16,
        bit_depth: BitDepth,
        mut f: impl FnMut(u16, u16) -> u16,
    ) -> Self {
        let (height, width) = (height.get(), width.get());
        let max = bit_depth.max_value();
        let mut data = BytesMut::with_capacity(Self::expected_len(height, width, bit_depth));
        for row in 0..height {
            for col in 0..width {
                let value = f(row, col).min(max);
                match bit_depth {
                    BitDepth::Eight => data.put_u8(value as u8),
                    BitDepth::Sixteen => data.put_u16_le(value),
                }
            }
        }
        Self {
            height,
            width,
            bit_depth,
            data: data.freeze(),
        }
    }

    /// Payload size for the given geometry.
    pub fn expected_len(height: u16, width: u16, bit_depth: BitDepth) -> usize {
        height as usize * width as usize * bit_depth.bytes_per_sample()
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Number of samples (`height * width`).
    pub fn pixel_count(&self) -> usize {
        self.height as usize * self.width as usize
    }

    /// Raw sample bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the image and return its sample bytes.
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Sample at `(row, col)`, widened to `u16`.
    pub fn sample(&self, row: u16, col: u16) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let index = row as usize * self.width as usize + col as usize;
        Some(self.sample_at(index))
    }

    /// Raw bytes of one row.
    pub fn row(&self, row: u16) -> Option<&[u8]> {
        if row >= self.height {
            return None;
        }
        let stride = self.width as usize * self.bit_depth.bytes_per_sample();
        let start = row as usize * stride;
        Some(&self.data[start..start + stride])
    }

    /// Iterate over all samples in row-major order, widened to `u16`.
    pub fn samples(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.pixel_count()).map(move |index| self.sample_at(index))
    }

    /// Copy all samples into a `Vec<u16>`.
    pub fn samples_u16(&self) -> Vec<u16> {
        self.samples().collect()
    }

    fn sample_at(&self, index: usize) -> u16 {
        match self.bit_depth {
            BitDepth::Eight => self.data[index] as u16,
            BitDepth::Sixteen => {
                let offset = index * 2;
                u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
            }
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("height", &self.height)
            .field("width", &self.width)
            .field("bit_depth", &self.bit_depth)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        let err = Image::new(2, 2, BitDepth::Sixteen, vec![0u8; 7]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                declared: 7,
                expected: 8,
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_dimension() {
        let err = Image::from_u8(0, 4, Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, FrameError::EmptyImage { height: 0, width: 4 }));
    }

    #[test]
    fn bit_depth_parsing() {
        assert_eq!(BitDepth::from_bits(8).unwrap(), BitDepth::Eight);
        assert_eq!(BitDepth::try_from(16).unwrap(), BitDepth::Sixteen);
        assert!(matches!(
            BitDepth::from_bits(12),
            Err(FrameError::InvalidBitDepth(12))
        ));
    }

    #[test]
    fn sixteen_bit_samples_are_little_endian() {
        let image = Image::from_u16(1, 2, &[1000, 0x0102]).unwrap();
        assert_eq!(image.data().as_ref(), &[0xE8, 0x03, 0x02, 0x01]);
        assert_eq!(image.sample(0, 0), Some(1000));
        assert_eq!(image.sample(0, 1), Some(0x0102));
    }

    #[test]
    fn sample_and_row_indexing() {
        let image = Image::from_u8(2, 3, vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(image.sample(1, 2), Some(6));
        assert_eq!(image.sample(2, 0), None);
        assert_eq!(image.row(1), Some(&[4u8, 5, 6][..]));
        assert_eq!(image.samples_u16(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn filled_clamps_eight_bit() {
        let image = Image::filled(2, 2, BitDepth::Eight, 1000).unwrap();
        assert!(image.samples().all(|s| s == 255));

        let image = Image::filled(3, 5, BitDepth::Sixteen, 1000).unwrap();
        assert_eq!(image.data().len(), 30);
        assert!(image.samples().all(|s| s == 1000));
    }

    #[test]
    fn from_fn_fills_row_major_and_clamps() {
        let three = NonZeroU16::new(3).unwrap();
        let two = NonZeroU16::new(2).unwrap();
        let image = Image::from_fn(two, three, BitDepth::Eight, |row, col| row * 300 + col);
        assert_eq!(image.samples_u16(), vec![0, 1, 2, 255, 255, 255]);

        let image = Image::from_fn(two, three, BitDepth::Sixteen, |row, col| row * 10 + col);
        assert_eq!(image.sample(1, 2), Some(12));
        assert_eq!(image.data().len(), 12);
    }

    #[test]
    fn debug_omits_pixel_data() {
        let image = Image::filled(4, 4, BitDepth::Sixteen, 7).unwrap();
        let text = format!("{image:?}");
        assert!(text.contains("bytes: 32"));
    }
}
