//! WebAssembly exports for the edge pipeline.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. Images are
//! passed as flat interleaved byte arrays; errors surface as thrown strings.

use wasm_bindgen::prelude::*;

use crate::error::Error;
use crate::filters::QuantizedField;
use crate::pipeline::{luminance_preview, sobel_edge_detect};

fn to_js_error(err: Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn into_bytes(field: QuantizedField) -> Vec<u8> {
    field.into_raw_vec_and_offset().0
}

// ============================================================================
// Edge Detection
// ============================================================================

/// Sobel edge strength of an interleaved u8 image.
///
/// # Arguments
/// * `data` - Flat array of bytes (length = width * height * channels)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `channels` - Samples per pixel, at least 3 (RGB or RGBA)
///
/// # Returns
/// Flat array of width * height edge bytes, row-major
#[wasm_bindgen]
pub fn sobel_edges_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<Vec<u8>, JsValue> {
    sobel_edge_detect(data, width, height, channels)
        .map(into_bytes)
        .map_err(to_js_error)
}

// ============================================================================
// Luminance
// ============================================================================

/// 8-bit BT.709 luminance of an interleaved u8 image.
#[wasm_bindgen]
pub fn luminance_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<Vec<u8>, JsValue> {
    luminance_preview(data, width, height, channels)
        .map(into_bytes)
        .map_err(to_js_error)
}
