//! The Sobel edge pipeline.
//!
//! The pipeline is defined once as a set of work units on a
//! [`WorkQueue`]; the configured [`ExecutionStrategy`] decides whether the
//! queue runs them one after another or overlaps independent units (the two
//! gradient convolutions) on the rayon pool.

use log::debug;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::execution::graph::{Field, FieldId, WorkQueue, WorkUnit};
use crate::filters::luminance::{reduce_to_luminance, reduce_to_luminance_with};
use crate::filters::quantize::{quantize, quantize_with};
use crate::filters::sobel::{combine_magnitude_with, compute_gradient_with, normalize_gradient_pair_with, Gradient};
use crate::filters::{QuantizedField, ScalarField};

/// Every intermediate field of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMaps {
    pub luminance: ScalarField,
    /// Raw horizontal gradient, before normalization.
    pub gx: ScalarField,
    /// Raw vertical gradient, before normalization.
    pub gy: ScalarField,
    /// Magnitude of the normalized gradient pair.
    pub magnitude: ScalarField,
    /// Quantized magnitude.
    pub edges: QuantizedField,
}

/// Handles of the fields written by the pipeline's work units.
struct Outputs {
    luminance: FieldId,
    gx: FieldId,
    gy: FieldId,
    magnitude: FieldId,
    edges: FieldId,
}

#[derive(Debug, Clone, Default)]
pub struct SobelPipeline {
    config: PipelineConfig,
}

impl SobelPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compute the 8-bit edge strength image of an interleaved pixel buffer.
    ///
    /// # Arguments
    /// * `pixels` - Row-major samples, `num_channels` per pixel (R, G, B first)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    /// * `num_channels` - Samples per pixel, at least 3
    ///
    /// # Returns
    /// Field of shape (height, width), 0 for flat regions up to 255 at the
    /// strongest edges
    pub fn detect(&self, pixels: &[u8], width: usize, height: usize, num_channels: usize) -> Result<QuantizedField> {
        Ok(self.run(pixels, width, height, num_channels)?.edges)
    }

    /// Run the pipeline and keep every intermediate field.
    pub fn run(&self, pixels: &[u8], width: usize, height: usize, num_channels: usize) -> Result<EdgeMaps> {
        debug!(
            "sobel pipeline {width}x{height}x{num_channels}, {:?}, border {}, {:?} extremum{}",
            self.config.strategy,
            self.config.border.name(),
            self.config.extremum,
            if self.config.separable { ", separable" } else { "" }
        );

        let mut queue = WorkQueue::new(self.config.strategy);
        let input = queue.upload(Field::Pixels(pixels.to_vec()));
        let outputs = self.submit(&mut queue, input, width, height, num_channels)?;
        queue.wait()?;

        Ok(EdgeMaps {
            luminance: queue.take(outputs.luminance)?.into_scalar()?,
            gx: queue.take(outputs.gx)?.into_scalar()?,
            gy: queue.take(outputs.gy)?.into_scalar()?,
            magnitude: queue.take(outputs.magnitude)?.into_scalar()?,
            edges: queue.take(outputs.edges)?.into_quantized()?,
        })
    }

    /// Declare the pipeline stages on `queue`, reading pixels from `input`.
    fn submit(
        &self,
        queue: &mut WorkQueue,
        input: FieldId,
        width: usize,
        height: usize,
        num_channels: usize,
    ) -> Result<Outputs> {
        let strategy = self.config.strategy;
        let options = self.config.gradient_options();
        let extremum = self.config.extremum;

        let luminance = queue.allocate();
        queue.submit(WorkUnit::new("luminance", &[input], &[luminance], move |inputs| {
            let field = reduce_to_luminance_with(inputs[0].as_pixels()?, width, height, num_channels, strategy)?;
            Ok(vec![Field::Scalar(field)])
        }))?;

        let gx = queue.allocate();
        let gy = queue.allocate();
        for (name, gradient, output) in [("sobel_x", Gradient::X, gx), ("sobel_y", Gradient::Y, gy)] {
            queue.submit(WorkUnit::new(name, &[luminance], &[output], move |inputs| {
                let field = compute_gradient_with(inputs[0].as_scalar()?, gradient, &options, strategy)?;
                Ok(vec![Field::Scalar(field)])
            }))?;
        }

        let nx = queue.allocate();
        let ny = queue.allocate();
        queue.submit(WorkUnit::new("normalize", &[gx, gy], &[nx, ny], move |inputs| {
            let (nx, ny) =
                normalize_gradient_pair_with(inputs[0].as_scalar()?, inputs[1].as_scalar()?, extremum, strategy)?;
            Ok(vec![Field::Scalar(nx), Field::Scalar(ny)])
        }))?;

        let magnitude = queue.allocate();
        queue.submit(WorkUnit::new("magnitude", &[nx, ny], &[magnitude], move |inputs| {
            let field = combine_magnitude_with(inputs[0].as_scalar()?, inputs[1].as_scalar()?, strategy)?;
            Ok(vec![Field::Scalar(field)])
        }))?;

        let edges = queue.allocate();
        queue.submit(WorkUnit::new("quantize", &[magnitude], &[edges], move |inputs| {
            Ok(vec![Field::Quantized(quantize_with(inputs[0].as_scalar()?, strategy))])
        }))?;

        Ok(Outputs {
            luminance,
            gx,
            gy,
            magnitude,
            edges,
        })
    }
}

/// Edge strength image with the default configuration.
pub fn sobel_edge_detect(pixels: &[u8], width: usize, height: usize, num_channels: usize) -> Result<QuantizedField> {
    SobelPipeline::default().detect(pixels, width, height, num_channels)
}

/// 8-bit luminance of an interleaved pixel buffer, without edge detection.
pub fn luminance_preview(pixels: &[u8], width: usize, height: usize, num_channels: usize) -> Result<QuantizedField> {
    Ok(quantize(&reduce_to_luminance(pixels, width, height, num_channels)?))
}
