//! Luminance reduction.
//!
//! Maps interleaved 8-bit pixels to a single-channel [0, 1] field using the
//! ITU-R BT.709 luminosity coefficients. Channels past the third (alpha,
//! padding) are ignored.

use log::trace;

use super::ScalarField;
use crate::error::{Error, Result};
use crate::execution::{fill_rows, ExecutionStrategy};

/// ITU-R BT.709 luminosity coefficients
pub const LUMA_R: f32 = 0.2126;
pub const LUMA_G: f32 = 0.7152;
pub const LUMA_B: f32 = 0.0722;

/// Luminance of one 8-bit RGB sample, in [0, 1].
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

/// Reduce an interleaved pixel buffer to a luminance field.
///
/// # Arguments
/// * `pixels` - Row-major samples, `num_channels` per pixel
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `num_channels` - Samples per pixel, at least 3 (R, G, B first)
///
/// # Returns
/// Field of shape (height, width) with values 0.0-1.0
///
/// # Errors
/// `InvalidArgument` when `num_channels < 3`, when `pixels` is shorter than
/// `width * height * num_channels`, and also for a zero width or height:
/// an empty image has no field to feed the later stages.
pub fn reduce_to_luminance(
    pixels: &[u8],
    width: usize,
    height: usize,
    num_channels: usize,
) -> Result<ScalarField> {
    reduce_to_luminance_with(pixels, width, height, num_channels, ExecutionStrategy::Sequential)
}

/// [`reduce_to_luminance`] with an explicit execution strategy.
pub fn reduce_to_luminance_with(
    pixels: &[u8],
    width: usize,
    height: usize,
    num_channels: usize,
    strategy: ExecutionStrategy,
) -> Result<ScalarField> {
    if num_channels < 3 {
        return Err(Error::invalid(format!(
            "luminance needs at least 3 channels, got {num_channels}"
        )));
    }
    if width == 0 || height == 0 {
        return Err(Error::invalid(format!("empty image: {width}x{height}")));
    }
    let required = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(num_channels))
        .ok_or_else(|| Error::invalid("image size overflows usize"))?;
    if pixels.len() < required {
        return Err(Error::invalid(format!(
            "pixel buffer holds {} bytes, {required} required for {width}x{height}x{num_channels}",
            pixels.len()
        )));
    }

    trace!("luminance {width}x{height}, {num_channels} channels");
    let row_len = width * num_channels;
    Ok(fill_rows(strategy, width, height, |y, mut row| {
        let src = &pixels[y * row_len..(y + 1) * row_len];
        for (out, px) in row.iter_mut().zip(src.chunks_exact(num_channels)) {
            *out = luminance(px[0], px[1], px[2]);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(width: usize, height: usize, px: &[u8]) -> Vec<u8> {
        px.iter().copied().cycle().take(width * height * px.len()).collect()
    }

    #[test]
    fn test_uniform_color_is_constant() {
        let (r, g, b) = (200u8, 100u8, 50u8);
        let expected = 0.2126 * (r as f32 / 255.0) + 0.7152 * (g as f32 / 255.0) + 0.0722 * (b as f32 / 255.0);

        let field = reduce_to_luminance(&uniform(4, 3, &[r, g, b]), 4, 3, 3).unwrap();

        assert_eq!(field.dim(), (3, 4));
        for &v in field.iter() {
            assert!((v - expected).abs() < 1e-6, "got {v}, expected {expected}");
        }
    }

    #[test]
    fn test_primaries() {
        assert!((luminance(255, 0, 0) - LUMA_R).abs() < 1e-6);
        assert!((luminance(0, 255, 0) - LUMA_G).abs() < 1e-6);
        assert!((luminance(0, 0, 255) - LUMA_B).abs() < 1e-6);
        // 0.2126 + 0.7152 + 0.0722 = 1.0
        assert!((luminance(255, 255, 255) - 1.0).abs() < 1e-6);
        assert_eq!(luminance(0, 0, 0), 0.0);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let rgb = uniform(2, 2, &[10, 20, 30]);
        let rgba = uniform(2, 2, &[10, 20, 30, 77]);
        let from_rgb = reduce_to_luminance(&rgb, 2, 2, 3).unwrap();
        let from_rgba = reduce_to_luminance(&rgba, 2, 2, 4).unwrap();
        assert_eq!(from_rgb, from_rgba);
    }

    #[test]
    fn test_row_major_layout() {
        // 2x2 RGB: white, black / black, red
        let pixels = [255, 255, 255, 0, 0, 0, 0, 0, 0, 255, 0, 0];
        let field = reduce_to_luminance(&pixels, 2, 2, 3).unwrap();
        assert!((field[[0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(field[[0, 1]], 0.0);
        assert_eq!(field[[1, 0]], 0.0);
        assert!((field[[1, 1]] - LUMA_R).abs() < 1e-6);
    }

    #[test]
    fn test_too_few_channels() {
        let err = reduce_to_luminance(&[0; 8], 2, 2, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_short_buffer() {
        let err = reduce_to_luminance(&[0; 11], 2, 2, 3).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(reduce_to_luminance(&[], 1, 1, 3).is_err());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        for (width, height) in [(0, 3), (3, 0), (0, 0)] {
            let err = reduce_to_luminance(&[0; 27], width, height, 3).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{width}x{height}");
        }
    }

    #[test]
    fn test_longer_buffer_is_accepted() {
        let field = reduce_to_luminance(&[255; 20], 2, 2, 3).unwrap();
        assert_eq!(field.dim(), (2, 2));
    }

    #[test]
    fn test_strategies_match() {
        let pixels: Vec<u8> = (0..(9 * 7 * 4)).map(|i| (i * 37 % 256) as u8).collect();
        let seq = reduce_to_luminance_with(&pixels, 9, 7, 4, ExecutionStrategy::Sequential).unwrap();
        let par = reduce_to_luminance_with(&pixels, 9, 7, 4, ExecutionStrategy::Parallel).unwrap();
        assert_eq!(seq, par);
    }
}
