//! Sobel gradients, normalization and magnitude.
//!
//! The gradient pair is two independent convolutions of the luminance
//! field, Gx with [`SOBEL_X`] and Gy with [`SOBEL_Y`]. Both kernels are
//! separable and can run as two 1D passes.
//!
//! Before combination both gradients are divided by their common extremum
//! so the magnitude lands in [0, sqrt(2)], which the quantizer saturates.

use log::debug;
use serde::{Deserialize, Serialize};

use super::border::BorderPolicy;
use super::convolution::{convolve_3x3_with, convolve_separable_with, Kernel3x3, SeparableKernel};
use super::{ensure_same_shape, Dimensions, ScalarField};
use crate::error::{Error, Result};
use crate::execution::{map_field, max_by_key, zip_fields, ExecutionStrategy};

/// Horizontal derivative: `[1, 0, -1; 2, 0, -2; 1, 0, -1]`.
pub const SOBEL_X: Kernel3x3 = Kernel3x3::new([1.0, 0.0, -1.0, 2.0, 0.0, -2.0, 1.0, 0.0, -1.0]);

/// Vertical derivative: `[1, 2, 1; 0, 0, 0; -1, -2, -1]`.
pub const SOBEL_Y: Kernel3x3 = Kernel3x3::new([1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0]);

/// [`SOBEL_X`] as vertical smoothing times horizontal difference.
pub const SOBEL_X_SEPARABLE: SeparableKernel = SeparableKernel::new([1.0, 2.0, 1.0], [1.0, 0.0, -1.0]);

/// [`SOBEL_Y`] as vertical difference times horizontal smoothing.
pub const SOBEL_Y_SEPARABLE: SeparableKernel = SeparableKernel::new([1.0, 0.0, -1.0], [1.0, 2.0, 1.0]);

/// Largest gradient extremum treated as rounding residue of a flat field.
///
/// Accumulating 9 taps of L1 norm 8 over luminance in [0, 1] leaves at most
/// about `8 * 8 * f32::EPSILON` (7.6e-6) where the exact result is zero. The
/// weakest real edge between two 8-bit levels is `0.0722 / 255` (2.8e-4), so
/// extrema at or below this bound mean a flat input.
pub const FLAT_GRADIENT_TOLERANCE: f32 = 64.0 * f32::EPSILON;

/// How the gradient pair is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientOptions {
    pub border: BorderPolicy,
    /// Two 1D passes instead of the direct 3x3 kernel.
    pub separable: bool,
}

impl Default for GradientOptions {
    fn default() -> Self {
        Self {
            border: BorderPolicy::Clamp,
            separable: false,
        }
    }
}

/// Which extremum the normalizer divides by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremumMode {
    /// Largest absolute gradient value.
    #[default]
    Absolute,
    /// Largest signed gradient value. Strongly negative gradients are not
    /// recognised as the extremum, so dark-to-bright edges can vanish.
    ///
    /// A negative maximum (every gradient below zero) is treated like a flat
    /// field and normalizes to zero instead of flipping the sign of both
    /// fields.
    Signed,
}

// ============================================================================
// Gradients
// ============================================================================

/// Orientation of a Sobel derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gradient {
    /// Gx, responds to vertical edges.
    X,
    /// Gy, responds to horizontal edges.
    Y,
}

impl Gradient {
    pub fn kernel(self) -> Kernel3x3 {
        match self {
            Self::X => SOBEL_X,
            Self::Y => SOBEL_Y,
        }
    }

    pub fn separable(self) -> SeparableKernel {
        match self {
            Self::X => SOBEL_X_SEPARABLE,
            Self::Y => SOBEL_Y_SEPARABLE,
        }
    }
}

/// Compute one Sobel derivative of a luminance field.
pub fn compute_gradient_with(
    luminance: &ScalarField,
    gradient: Gradient,
    options: &GradientOptions,
    strategy: ExecutionStrategy,
) -> Result<ScalarField> {
    let dims = Dimensions::of(luminance);
    let packed = luminance.as_standard_layout();
    let data = packed
        .as_slice()
        .ok_or_else(|| Error::invalid("luminance field is not contiguous"))?;

    if options.separable {
        convolve_separable_with(data, &gradient.separable(), dims, options.border, strategy)
    } else {
        convolve_3x3_with(data, &gradient.kernel(), dims, options.border, strategy)
    }
}

/// Compute the Sobel gradient pair `(Gx, Gy)` with Clamp border.
pub fn compute_sobel_gradients(luminance: &ScalarField) -> Result<(ScalarField, ScalarField)> {
    compute_sobel_gradients_with(luminance, &GradientOptions::default(), ExecutionStrategy::Sequential)
}

/// [`compute_sobel_gradients`] with explicit options and strategy.
///
/// Under the parallel strategy Gx and Gy are computed concurrently.
pub fn compute_sobel_gradients_with(
    luminance: &ScalarField,
    options: &GradientOptions,
    strategy: ExecutionStrategy,
) -> Result<(ScalarField, ScalarField)> {
    let (gx, gy) = strategy.join(
        || compute_gradient_with(luminance, Gradient::X, options, strategy),
        || compute_gradient_with(luminance, Gradient::Y, options, strategy),
    );
    Ok((gx?, gy?))
}

// ============================================================================
// Normalization
// ============================================================================

/// Common extremum of a gradient pair.
pub fn find_max_magnitude(gx: &ScalarField, gy: &ScalarField, mode: ExtremumMode) -> Result<f32> {
    find_max_magnitude_with(gx, gy, mode, ExecutionStrategy::Sequential)
}

/// [`find_max_magnitude`] with an explicit execution strategy.
pub fn find_max_magnitude_with(
    gx: &ScalarField,
    gy: &ScalarField,
    mode: ExtremumMode,
    strategy: ExecutionStrategy,
) -> Result<f32> {
    ensure_same_shape(gx, gy)?;
    let key: fn(f32) -> f32 = match mode {
        ExtremumMode::Absolute => f32::abs,
        ExtremumMode::Signed => |v: f32| v,
    };
    let max = match (
        max_by_key(strategy, gx.view(), key),
        max_by_key(strategy, gy.view(), key),
    ) {
        (Some(a), Some(b)) => a.max(b),
        _ => 0.0,
    };
    Ok(max)
}

/// Divide every sample of `field` by `divisor`.
pub fn scale_field(field: &ScalarField, divisor: f32) -> ScalarField {
    scale_field_with(field, divisor, ExecutionStrategy::Sequential)
}

/// [`scale_field`] with an explicit execution strategy.
pub fn scale_field_with(field: &ScalarField, divisor: f32, strategy: ExecutionStrategy) -> ScalarField {
    map_field(strategy, field.view(), |v| v / divisor)
}

/// Normalize a gradient pair by its largest absolute value.
///
/// The raw gradients are left untouched. A flat input (extremum within
/// [`FLAT_GRADIENT_TOLERANCE`] of zero) yields two all-zero fields.
pub fn normalize_gradient_pair(gx: &ScalarField, gy: &ScalarField) -> Result<(ScalarField, ScalarField)> {
    normalize_gradient_pair_with(gx, gy, ExtremumMode::Absolute, ExecutionStrategy::Sequential)
}

/// [`normalize_gradient_pair`] with explicit extremum mode and strategy.
///
/// The extremum reduction completes before either field is scaled. When
/// the extremum is not finite or not above [`FLAT_GRADIENT_TOLERANCE`] both
/// outputs are zero.
pub fn normalize_gradient_pair_with(
    gx: &ScalarField,
    gy: &ScalarField,
    mode: ExtremumMode,
    strategy: ExecutionStrategy,
) -> Result<(ScalarField, ScalarField)> {
    let max = find_max_magnitude_with(gx, gy, mode, strategy)?;

    if !(max.is_finite() && max > FLAT_GRADIENT_TOLERANCE) {
        debug!("gradient extremum {max} ({mode:?}) is degenerate, normalizing to zero");
        return Ok((ScalarField::zeros(gx.raw_dim()), ScalarField::zeros(gy.raw_dim())));
    }

    let (nx, ny) = strategy.join(
        || scale_field_with(gx, max, strategy),
        || scale_field_with(gy, max, strategy),
    );
    Ok((nx, ny))
}

// ============================================================================
// Magnitude
// ============================================================================

/// Per-sample Euclidean magnitude `sqrt(gx^2 + gy^2)`.
pub fn combine_magnitude(gx: &ScalarField, gy: &ScalarField) -> Result<ScalarField> {
    combine_magnitude_with(gx, gy, ExecutionStrategy::Sequential)
}

/// [`combine_magnitude`] with an explicit execution strategy.
pub fn combine_magnitude_with(gx: &ScalarField, gy: &ScalarField, strategy: ExecutionStrategy) -> Result<ScalarField> {
    ensure_same_shape(gx, gy)?;
    Ok(zip_fields(strategy, gx.view(), gy.view(), |x, y| (x * x + y * y).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    /// 4x4 field, left two columns 0.0, right two columns 1.0.
    fn vertical_edge() -> ScalarField {
        Array2::from_shape_fn((4, 4), |(_, x)| if x < 2 { 0.0 } else { 1.0 })
    }

    #[test]
    fn test_separable_factors_match_kernels() {
        for gradient in [Gradient::X, Gradient::Y] {
            assert_eq!(gradient.separable().to_kernel(), gradient.kernel());
        }
    }

    #[test]
    fn test_flat_field_has_no_gradient() {
        let flat = ScalarField::from_elem((4, 4), 0.5);
        let (gx, gy) = compute_sobel_gradients(&flat).unwrap();
        assert!(gx.iter().all(|&v| v == 0.0));
        assert!(gy.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vertical_edge_gradients() {
        let (gx, gy) = compute_sobel_gradients(&vertical_edge()).unwrap();

        // Kx takes left minus right, so a dark-to-bright step is negative.
        for y in 0..4 {
            assert_eq!(gx[[y, 0]], 0.0);
            assert_eq!(gx[[y, 1]], -4.0);
            assert_eq!(gx[[y, 2]], -4.0);
            assert_eq!(gx[[y, 3]], 0.0);
        }
        assert!(gy.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn test_horizontal_edge_gradients() {
        let field = vertical_edge().reversed_axes().to_owned();
        let (gx, gy) = compute_sobel_gradients(&field).unwrap();
        assert!(gx.iter().all(|&v| v.abs() < 1e-6));
        assert_eq!(gy[[1, 0]], -4.0);
        assert_eq!(gy[[2, 3]], -4.0);
        assert_eq!(gy[[0, 0]], 0.0);
    }

    #[test]
    fn test_separable_gradients_match_direct() {
        let field = Array2::from_shape_fn((9, 11), |(y, x)| ((x * 31 + y * 17) % 13) as f32 / 13.0);
        let direct = compute_sobel_gradients(&field).unwrap();
        let options = GradientOptions {
            separable: true,
            ..GradientOptions::default()
        };
        let split = compute_sobel_gradients_with(&field, &options, ExecutionStrategy::Sequential).unwrap();

        for (a, b) in [(&direct.0, &split.0), (&direct.1, &split.1)] {
            for (&x, &y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() <= 1e-4 * x.abs().max(1.0), "{x} vs {y}");
            }
        }
    }

    #[test]
    fn test_gradients_strategies_match() {
        let field = Array2::from_shape_fn((16, 21), |(y, x)| ((x * x + 3 * y) % 17) as f32 / 17.0);
        let seq = compute_sobel_gradients_with(&field, &GradientOptions::default(), ExecutionStrategy::Sequential).unwrap();
        let par = compute_sobel_gradients_with(&field, &GradientOptions::default(), ExecutionStrategy::Parallel).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_gradients_on_degenerate_shapes() {
        for shape in [(1, 1), (1, 5), (5, 1)] {
            let field = ScalarField::from_elem(shape, 0.3);
            let (gx, gy) = compute_sobel_gradients(&field).unwrap();
            assert_eq!(gx.dim(), shape);
            assert_eq!(gy.dim(), shape);
        }
        assert!(compute_sobel_gradients(&ScalarField::zeros((0, 3))).is_err());
    }

    #[test]
    fn test_normalize_divides_by_absolute_extremum() {
        let gx = array![[-4.0f32, 2.0], [0.0, 1.0]];
        let gy = array![[1.0f32, -1.0], [3.0, 0.0]];
        let (nx, ny) = normalize_gradient_pair(&gx, &gy).unwrap();
        assert_eq!(nx, array![[-1.0f32, 0.5], [0.0, 0.25]]);
        assert_eq!(ny, array![[0.25f32, -0.25], [0.75, 0.0]]);
        // Inputs are untouched.
        assert_eq!(gx[[0, 0]], -4.0);
    }

    #[test]
    fn test_normalize_flat_falls_back_to_zero() {
        let zero = ScalarField::zeros((3, 3));
        let (nx, ny) = normalize_gradient_pair(&zero, &zero).unwrap();
        assert!(nx.iter().chain(ny.iter()).all(|&v| v == 0.0));
    }

    #[test]
    fn test_flat_gray_levels_quantize_to_zero() {
        use crate::filters::luminance::luminance;
        use crate::filters::quantize::quantize;

        let separable = GradientOptions {
            separable: true,
            ..GradientOptions::default()
        };
        for level in [1u8, 37, 128, 200, 254, 255] {
            let value = luminance(level, level, level);
            let flat = ScalarField::from_elem((4, 5), value);
            for options in [GradientOptions::default(), separable] {
                for strategy in [ExecutionStrategy::Sequential, ExecutionStrategy::Parallel] {
                    let (gx, gy) = compute_sobel_gradients_with(&flat, &options, strategy).unwrap();
                    let (nx, ny) = normalize_gradient_pair_with(&gx, &gy, ExtremumMode::Absolute, strategy).unwrap();
                    let edges = quantize(&combine_magnitude(&nx, &ny).unwrap());
                    assert!(edges.iter().all(|&v| v == 0), "level {level}: {edges:?}");
                }
            }
        }

        let flat = ScalarField::from_elem((4, 4), 128.0 / 255.0);
        let (gx, gy) = compute_sobel_gradients(&flat).unwrap();
        let (nx, ny) = normalize_gradient_pair(&gx, &gy).unwrap();
        let edges = quantize(&combine_magnitude(&nx, &ny).unwrap());
        assert!(edges.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_extremum_tolerance_boundary() {
        let residue = ScalarField::from_elem((2, 2), FLAT_GRADIENT_TOLERANCE);
        let zero = ScalarField::zeros((2, 2));
        let (nx, _) = normalize_gradient_pair(&residue, &zero).unwrap();
        assert!(nx.iter().all(|&v| v == 0.0));

        // The weakest edge between adjacent 8-bit levels is well above it.
        let weak = ScalarField::from_elem((2, 2), 0.0722 / 255.0);
        let (nx, _) = normalize_gradient_pair(&weak, &zero).unwrap();
        assert!(nx.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_signed_negative_maximum_is_zero() {
        let gx = array![[-4.0f32, -1.0]];
        let gy = array![[-0.5f32, -2.0]];
        assert_eq!(find_max_magnitude(&gx, &gy, ExtremumMode::Signed).unwrap(), -0.5);
        let (nx, ny) = normalize_gradient_pair_with(&gx, &gy, ExtremumMode::Signed, ExecutionStrategy::Sequential).unwrap();
        assert!(nx.iter().chain(ny.iter()).all(|&v| v == 0.0));
    }

    #[test]
    fn test_normalize_shape_mismatch() {
        let a = ScalarField::zeros((2, 3));
        let b = ScalarField::zeros((3, 2));
        assert!(matches!(normalize_gradient_pair(&a, &b), Err(Error::InvalidArgument(_))));
        assert!(matches!(combine_magnitude(&a, &b), Err(Error::InvalidArgument(_))));
    }

    // Signed vs absolute extremum on negative gradients.

    #[test]
    fn test_signed_extremum_misses_negative_gradients() {
        let gx = array![[-4.0f32, 1.0]];
        let gy = array![[0.0f32, 0.5]];
        assert_eq!(find_max_magnitude(&gx, &gy, ExtremumMode::Absolute).unwrap(), 4.0);
        assert_eq!(find_max_magnitude(&gx, &gy, ExtremumMode::Signed).unwrap(), 1.0);

        let (nx, _) = normalize_gradient_pair_with(&gx, &gy, ExtremumMode::Signed, ExecutionStrategy::Sequential).unwrap();
        // Out of the [-1, 1] range.
        assert_eq!(nx[[0, 0]], -4.0);
    }

    #[test]
    fn test_signed_extremum_on_all_negative_gradient_is_zero() {
        let (gx, gy) = compute_sobel_gradients(&vertical_edge()).unwrap();
        let (nx, ny) = normalize_gradient_pair_with(&gx, &gy, ExtremumMode::Signed, ExecutionStrategy::Sequential).unwrap();
        assert!(nx.iter().chain(ny.iter()).all(|&v| v == 0.0));

        let (nx, _) = normalize_gradient_pair_with(&gx, &gy, ExtremumMode::Absolute, ExecutionStrategy::Sequential).unwrap();
        assert_eq!(nx[[0, 1]], -1.0);
    }

    #[test]
    fn test_normalize_strategies_match() {
        let gx = Array2::from_shape_fn((13, 7), |(y, x)| (x as f32 - 3.0) * (y as f32 + 1.0));
        let gy = Array2::from_shape_fn((13, 7), |(y, x)| (y as f32 - 6.0) * 0.5 + x as f32);
        let seq = normalize_gradient_pair_with(&gx, &gy, ExtremumMode::Absolute, ExecutionStrategy::Sequential).unwrap();
        let par = normalize_gradient_pair_with(&gx, &gy, ExtremumMode::Absolute, ExecutionStrategy::Parallel).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_magnitude() {
        let gx = array![[3.0f32, 0.0], [-1.0, 1.0]];
        let gy = array![[4.0f32, 0.0], [0.0, 1.0]];
        let mag = combine_magnitude(&gx, &gy).unwrap();
        assert_eq!(mag[[0, 0]], 5.0);
        assert_eq!(mag[[0, 1]], 0.0);
        assert_eq!(mag[[1, 0]], 1.0);
        assert!((mag[[1, 1]] - std::f32::consts::SQRT_2).abs() < 1e-6);

        let par = combine_magnitude_with(&gx, &gy, ExecutionStrategy::Parallel).unwrap();
        assert_eq!(mag, par);
    }

    #[test]
    fn test_scale_field() {
        let field = array![[2.0f32, -6.0]];
        assert_eq!(scale_field(&field, 2.0), array![[1.0f32, -3.0]]);
    }
}
