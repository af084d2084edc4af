//! Floating point to 8-bit quantization.

use super::{QuantizedField, ScalarField};
use crate::execution::{map_field, ExecutionStrategy};

/// Map one sample to a byte: `v * 255`, truncated.
///
/// Negative and NaN inputs give 0. Inputs above 1.0 (a combined magnitude
/// reaches sqrt(2)) saturate at 255.
#[inline]
pub fn quantize_sample(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v * 255.0).clamp(0.0, 255.0) as u8
}

/// Quantize a field to 8-bit.
pub fn quantize(field: &ScalarField) -> QuantizedField {
    quantize_with(field, ExecutionStrategy::Sequential)
}

/// [`quantize`] with an explicit execution strategy.
pub fn quantize_with(field: &ScalarField, strategy: ExecutionStrategy) -> QuantizedField {
    map_field(strategy, field.view(), quantize_sample)
}
