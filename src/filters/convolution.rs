//! Bordered 3x3 convolution.
//!
//! Coefficients are applied in row-major neighbourhood order: for each output
//! sample the accumulation runs `dy = -1..=1` in the outer loop and
//! `dx = -1..=1` in the inner loop, multiplying `K[(dy + 1) * 3 + (dx + 1)]`
//! with the input at `(x + dx, y + dy)`. The kernel is not flipped.
//!
//! Out-of-range neighbours are resolved per axis by the [`BorderPolicy`];
//! under Clamp every neighbour is a real sample, never an implicit zero.
//!
//! Separable kernels can also run as two 1D passes: the row taps
//! horizontally into a scratch field, then the column taps vertically.

use log::trace;

use super::border::{BorderMap, BorderPolicy};
use super::{Dimensions, ScalarField};
use crate::error::{Error, Result};
use crate::execution::{fill_rows, ExecutionStrategy};

/// 3x3 filter coefficients, row-major (`dy` outer, `dx` inner).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel3x3([f32; 9]);

impl Kernel3x3 {
    pub const fn new(coefficients: [f32; 9]) -> Self {
        Self(coefficients)
    }

    /// Passes the centre sample through unchanged.
    pub const fn identity() -> Self {
        Self([0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0])
    }

    /// Outer product: `K[r][c] = column[r] * row[c]`.
    pub fn outer(column: [f32; 3], row: [f32; 3]) -> Self {
        let mut k = [0.0f32; 9];
        for r in 0..3 {
            for c in 0..3 {
                k[r * 3 + c] = column[r] * row[c];
            }
        }
        Self(k)
    }

    pub fn coefficients(&self) -> &[f32; 9] {
        &self.0
    }

    /// Coefficient for the neighbour at offset `(dx, dy)`, both in -1..=1.
    #[inline]
    pub fn at(&self, dx: isize, dy: isize) -> f32 {
        self.0[((dy + 1) * 3 + (dx + 1)) as usize]
    }

    fn check_finite(&self) -> Result<()> {
        if self.0.iter().all(|c| c.is_finite()) {
            Ok(())
        } else {
            Err(Error::invalid("kernel has non-finite coefficients"))
        }
    }
}

/// A 3x3 kernel factored into vertical (`column`) and horizontal (`row`) taps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparableKernel {
    pub column: [f32; 3],
    pub row: [f32; 3],
}

impl SeparableKernel {
    pub const fn new(column: [f32; 3], row: [f32; 3]) -> Self {
        Self { column, row }
    }

    /// The equivalent full 3x3 kernel.
    pub fn to_kernel(&self) -> Kernel3x3 {
        Kernel3x3::outer(self.column, self.row)
    }
}

/// Apply a 3x3 kernel to a row-major buffer.
///
/// # Arguments
/// * `input` - Samples addressed as `input[y * pitch + x]`
/// * `kernel` - Coefficients, see [`Kernel3x3`]
/// * `dims` - Width, height and pitch of `input`
/// * `border` - How out-of-range neighbours are synthesized
///
/// # Returns
/// Packed field of shape (height, width)
pub fn convolve_3x3(
    input: &[f32],
    kernel: &Kernel3x3,
    dims: Dimensions,
    border: BorderPolicy,
) -> Result<ScalarField> {
    convolve_3x3_with(input, kernel, dims, border, ExecutionStrategy::Sequential)
}

/// [`convolve_3x3`] with an explicit execution strategy.
pub fn convolve_3x3_with(
    input: &[f32],
    kernel: &Kernel3x3,
    dims: Dimensions,
    border: BorderPolicy,
    strategy: ExecutionStrategy,
) -> Result<ScalarField> {
    dims.validate(input.len())?;
    kernel.check_finite()?;
    let map = BorderMap::new(border)?;
    let Dimensions {
        width,
        height,
        pitch,
    } = dims;

    trace!("convolve_3x3 {width}x{height} pitch {pitch}, border {}", border.name());
    Ok(fill_rows(strategy, width, height, |y, mut row| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for dy in -1isize..=1 {
                let sy = map.map(y as isize + dy, height);
                for dx in -1isize..=1 {
                    let sample = match (sy, map.map(x as isize + dx, width)) {
                        (Some(sy), Some(sx)) => input[sy * pitch + sx],
                        _ => map.fill(),
                    };
                    acc += kernel.at(dx, dy) * sample;
                }
            }
            *out = acc;
        }
    }))
}

/// Apply a 3x3 kernel to a packed field.
pub fn convolve_field(field: &ScalarField, kernel: &Kernel3x3, border: BorderPolicy) -> Result<ScalarField> {
    convolve_field_with(field, kernel, border, ExecutionStrategy::Sequential)
}

/// [`convolve_field`] with an explicit execution strategy.
pub fn convolve_field_with(
    field: &ScalarField,
    kernel: &Kernel3x3,
    border: BorderPolicy,
    strategy: ExecutionStrategy,
) -> Result<ScalarField> {
    let dims = Dimensions::of(field);
    let packed = field.as_standard_layout();
    let data = packed
        .as_slice()
        .ok_or_else(|| Error::invalid("field is not contiguous"))?;
    convolve_3x3_with(data, kernel, dims, border, strategy)
}

/// Apply a separable kernel as a horizontal then a vertical 1D pass.
///
/// Matches [`convolve_3x3`] with `kernel.to_kernel()` up to float rounding.
pub fn convolve_separable(
    input: &[f32],
    kernel: &SeparableKernel,
    dims: Dimensions,
    border: BorderPolicy,
) -> Result<ScalarField> {
    convolve_separable_with(input, kernel, dims, border, ExecutionStrategy::Sequential)
}

/// [`convolve_separable`] with an explicit execution strategy.
pub fn convolve_separable_with(
    input: &[f32],
    kernel: &SeparableKernel,
    dims: Dimensions,
    border: BorderPolicy,
    strategy: ExecutionStrategy,
) -> Result<ScalarField> {
    dims.validate(input.len())?;
    kernel.to_kernel().check_finite()?;
    let map = BorderMap::new(border)?;
    let Dimensions {
        width,
        height,
        pitch,
    } = dims;

    trace!("convolve_separable {width}x{height} pitch {pitch}, border {}", border.name());

    // Horizontal pass
    let scratch = fill_rows(strategy, width, height, |y, mut row| {
        let src = &input[y * pitch..y * pitch + width];
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for dx in -1isize..=1 {
                let sample = match map.map(x as isize + dx, width) {
                    Some(sx) => src[sx],
                    None => map.fill(),
                };
                acc += kernel.row[(dx + 1) as usize] * sample;
            }
            *out = acc;
        }
    });

    // A row outside the image is all fill, so its horizontal response is
    // fill times the sum of the row taps.
    let row_fill = map.fill() * kernel.row.iter().sum::<f32>();

    // Vertical pass
    Ok(fill_rows(strategy, width, height, |y, mut row| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for dy in -1isize..=1 {
                let sample = match map.map(y as isize + dy, height) {
                    Some(sy) => scratch[[sy, x]],
                    None => row_fill,
                };
                acc += kernel.column[(dy + 1) as usize] * sample;
            }
            *out = acc;
        }
    }))
}
