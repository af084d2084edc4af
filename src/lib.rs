//! Edgemap
//!
//! Sobel edge strength maps for 8-bit raster images, with Python bindings
//! via PyO3 and WASM bindings for JavaScript.
//!
//! ## Pipeline
//! ```text
//! pixels (u8, W*H*C) -> luminance -> (Gx, Gy) -> normalized (Gx, Gy)
//!                    -> magnitude -> edges (u8, H x W)
//! ```
//!
//! Every stage is a plain function over [`ndarray`] fields and also has a
//! `_with` form taking an [`ExecutionStrategy`]. [`SobelPipeline`] wires the
//! stages together as work units on an [`execution::graph::WorkQueue`], so
//! one pipeline definition runs either sequentially on the calling thread or
//! spread across the rayon pool.
//!
//! ## Input Format
//! Interleaved, row-major, 8 bits per sample, at least 3 channels. The first
//! three channels are R, G, B; any further channels (alpha) are ignored.
//!
//! ## Features
//! - `extended-borders` (default): Wrap, Reflect, Mirror and Constant border
//!   policies. Without it only Clamp is available.
//! - `python`: PyO3 extension module `edgemap`.
//! - `wasm`: wasm-bindgen exports.

pub mod config;
pub mod error;
pub mod execution;
pub mod filters;
pub mod pipeline;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use execution::ExecutionStrategy;
pub use filters::border::BorderPolicy;
pub use filters::convolution::convolve_3x3;
pub use filters::luminance::reduce_to_luminance;
pub use filters::quantize::quantize;
pub use filters::sobel::{combine_magnitude, compute_sobel_gradients, normalize_gradient_pair, ExtremumMode};
pub use filters::{QuantizedField, ScalarField};
pub use pipeline::{luminance_preview, sobel_edge_detect, EdgeMaps, SobelPipeline};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::exceptions::{PyNotImplementedError, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    use crate::error::Error;
    use crate::filters::sobel::compute_sobel_gradients;
    use crate::pipeline::{luminance_preview, sobel_edge_detect};

    fn to_py_err(err: Error) -> PyErr {
        match err {
            Error::InvalidArgument(_) => PyValueError::new_err(err.to_string()),
            Error::NotImplemented(_) => PyNotImplementedError::new_err(err.to_string()),
            Error::Execution(_) => PyRuntimeError::new_err(err.to_string()),
        }
    }

    fn run_on_image<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        stage: fn(&[u8], usize, usize, usize) -> crate::Result<crate::QuantizedField>,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let input = image.as_array();
        let (height, width, channels) = input.dim();
        let packed = input.as_standard_layout();
        let pixels = packed
            .as_slice()
            .ok_or_else(|| PyValueError::new_err("image is not contiguous"))?;
        let result = stage(pixels, width, height, channels).map_err(to_py_err)?;
        Ok(result.into_pyarray(py))
    }

    // ========================================================================
    // Edge Detection
    // ========================================================================

    /// Sobel edge strength of an (height, width, channels) u8 image.
    ///
    /// Returns a (height, width) u8 array.
    #[pyfunction]
    pub fn sobel_edges<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        run_on_image(py, image, sobel_edge_detect)
    }

    /// Raw Sobel gradients (gx, gy) of a (height, width) f32 luminance array.
    #[pyfunction]
    pub fn sobel_gradients<'py>(
        py: Python<'py>,
        gray: PyReadonlyArray2<'py, f32>,
    ) -> PyResult<(Bound<'py, PyArray2<f32>>, Bound<'py, PyArray2<f32>>)> {
        let input = gray.as_array().to_owned();
        let (gx, gy) = compute_sobel_gradients(&input).map_err(to_py_err)?;
        Ok((gx.into_pyarray(py), gy.into_pyarray(py)))
    }

    /// 8-bit BT.709 luminance of an (height, width, channels) u8 image.
    #[pyfunction]
    pub fn luminance<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        run_on_image(py, image, luminance_preview)
    }

    // ========================================================================
    // Module Registration
    // ========================================================================

    #[pymodule]
    pub fn edgemap(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(sobel_edges, m)?)?;
        m.add_function(wrap_pyfunction!(sobel_gradients, m)?)?;
        m.add_function(wrap_pyfunction!(luminance, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::edgemap;
