//! Filter stages of the Sobel edge pipeline.
//!
//! ## Data Model
//!
//! | Type | Shape | Element | Description |
//! |------|-------|---------|-------------|
//! | Pixel buffer | flat, `W * H * C` | u8 | Interleaved input, C >= 3 |
//! | [`ScalarField`] | (H, W) | f32 | Luminance, gradients, magnitude |
//! | [`QuantizedField`] | (H, W) | u8 | Final 8-bit edge image |
//!
//! Fields are produced fresh by every stage and handed downstream by value;
//! no stage mutates its input.
//!
//! ## Stages
//!
//! - **luminance** - interleaved pixels to a [0, 1] luminance field
//! - **border** - out-of-range neighbour synthesis for windowed filters
//! - **convolution** - bordered 3x3 convolution, direct and two-pass
//! - **sobel** - gradient pair, normalization, magnitude
//! - **quantize** - floating point field to 8-bit

pub mod border;
pub mod convolution;
pub mod luminance;
pub mod quantize;
pub mod sobel;

use ndarray::Array2;

use crate::error::{Error, Result};

/// Single-channel floating point field, shape `(height, width)`.
pub type ScalarField = Array2<f32>;

/// Single-channel 8-bit field, shape `(height, width)`.
pub type QuantizedField = Array2<u8>;

/// Geometry of a row-major sample buffer.
///
/// `pitch` is the distance, in samples, between the starts of adjacent rows
/// and may exceed `width` when the buffer is a sub-rectangle of a larger
/// backing allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
    pub pitch: usize,
}

impl Dimensions {
    /// Tightly packed rows (`pitch == width`).
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pitch: width,
        }
    }

    pub fn with_pitch(width: usize, height: usize, pitch: usize) -> Self {
        Self {
            width,
            height,
            pitch,
        }
    }

    /// Dimensions of a field, as a packed buffer.
    pub fn of(field: &ScalarField) -> Self {
        let (height, width) = field.dim();
        Self::new(width, height)
    }

    /// Smallest buffer that holds every addressed sample:
    /// `(height - 1) * pitch + width`.
    pub fn required_len(&self) -> Option<usize> {
        if self.height == 0 {
            return Some(0);
        }
        (self.height - 1)
            .checked_mul(self.pitch)
            .and_then(|n| n.checked_add(self.width))
    }

    /// Check that the geometry is usable over a buffer of `len` samples.
    pub fn validate(&self, len: usize) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid(format!(
                "empty field: {}x{}",
                self.width, self.height
            )));
        }
        if self.pitch < self.width {
            return Err(Error::invalid(format!(
                "pitch {} is smaller than width {}",
                self.pitch, self.width
            )));
        }
        let required = self
            .required_len()
            .ok_or_else(|| Error::invalid("field size overflows usize"))?;
        if len < required {
            return Err(Error::invalid(format!(
                "buffer holds {len} samples, {required} required for {}x{} (pitch {})",
                self.width, self.height, self.pitch
            )));
        }
        Ok(())
    }
}

/// Fail unless both fields have the same shape.
pub(crate) fn ensure_same_shape(a: &ScalarField, b: &ScalarField) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(Error::invalid(format!(
            "field shapes differ: {:?} vs {:?}",
            a.dim(),
            b.dim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_len_uses_pitch() {
        assert_eq!(Dimensions::new(4, 3).required_len(), Some(12));
        // Last row needs only `width` samples.
        assert_eq!(Dimensions::with_pitch(4, 3, 10).required_len(), Some(24));
        assert_eq!(Dimensions::with_pitch(usize::MAX, 3, usize::MAX).required_len(), None);
    }

    #[test]
    fn test_validate() {
        assert!(Dimensions::new(4, 3).validate(12).is_ok());
        assert!(Dimensions::new(4, 3).validate(11).is_err());
        assert!(Dimensions::new(0, 3).validate(0).is_err());
        assert!(Dimensions::with_pitch(4, 3, 2).validate(100).is_err());
        assert!(Dimensions::with_pitch(4, 3, 10).validate(24).is_ok());
    }

    #[test]
    fn test_of_field() {
        let field = ScalarField::zeros((3, 5));
        assert_eq!(Dimensions::of(&field), Dimensions::with_pitch(5, 3, 5));
    }
}
