//! Execution strategies for the pipeline stages.
//!
//! Every stage is written once against the helpers in this module. The
//! [`ExecutionStrategy`] decides whether the per-row work runs on the
//! calling thread or is spread across the rayon pool. Each output sample is
//! computed by the same expression either way, and reductions only use
//! `max`, so both strategies produce bit-identical fields.
//!
//! The [`graph`] submodule adds the work-unit form: stages declared with
//! read and write sets, scheduled by their inferred dependencies.

pub mod graph;

use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How the stages of a pipeline are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Ordinary loops on the calling thread, in pipeline order.
    #[default]
    Sequential,
    /// Rows within a stage run on the rayon pool, independent stages overlap.
    Parallel,
}

impl ExecutionStrategy {
    /// Run two independent closures, concurrently when parallel.
    pub fn join<A, B, RA, RB>(self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match self {
            Self::Sequential => (a(), b()),
            Self::Parallel => rayon::join(a, b),
        }
    }
}

/// Allocate a `(height, width)` field and fill it row by row.
///
/// `fill` receives the row index and the row to write.
pub(crate) fn fill_rows<T, F>(strategy: ExecutionStrategy, width: usize, height: usize, fill: F) -> Array2<T>
where
    T: Clone + Default + Send + Sync,
    F: Fn(usize, ArrayViewMut1<'_, T>) + Send + Sync,
{
    let mut out = Array2::<T>::default((height, width));
    let rows = out.axis_iter_mut(Axis(0));
    match strategy {
        ExecutionStrategy::Sequential => rows.enumerate().for_each(|(y, row)| fill(y, row)),
        ExecutionStrategy::Parallel => rows
            .into_par_iter()
            .enumerate()
            .for_each(|(y, row)| fill(y, row)),
    }
    out
}

/// Elementwise map of one field into a new field.
pub(crate) fn map_field<T, F>(strategy: ExecutionStrategy, field: ArrayView2<'_, f32>, f: F) -> Array2<T>
where
    T: Clone + Default + Send + Sync,
    F: Fn(f32) -> T + Send + Sync,
{
    let mut out = Array2::<T>::default(field.raw_dim());
    let zip = Zip::from(&mut out).and(&field);
    match strategy {
        ExecutionStrategy::Sequential => zip.for_each(|o, &v| *o = f(v)),
        ExecutionStrategy::Parallel => zip.par_for_each(|o, &v| *o = f(v)),
    }
    out
}

/// Elementwise combination of two same-shape fields.
///
/// Callers check the shapes; a mismatch panics inside `Zip`.
pub(crate) fn zip_fields<F>(
    strategy: ExecutionStrategy,
    a: ArrayView2<'_, f32>,
    b: ArrayView2<'_, f32>,
    f: F,
) -> Array2<f32>
where
    F: Fn(f32, f32) -> f32 + Send + Sync,
{
    let mut out = Array2::<f32>::zeros(a.raw_dim());
    let zip = Zip::from(&mut out).and(&a).and(&b);
    match strategy {
        ExecutionStrategy::Sequential => zip.for_each(|o, &x, &y| *o = f(x, y)),
        ExecutionStrategy::Parallel => zip.par_for_each(|o, &x, &y| *o = f(x, y)),
    }
    out
}

/// Maximum of `key(v)` over the field, or `None` when it is empty.
pub(crate) fn max_by_key<F>(strategy: ExecutionStrategy, field: ArrayView2<'_, f32>, key: F) -> Option<f32>
where
    F: Fn(f32) -> f32 + Send + Sync,
{
    if field.is_empty() {
        return None;
    }

    let max = match strategy {
        ExecutionStrategy::Sequential => field
            .iter()
            .map(|&v| key(v))
            .fold(f32::NEG_INFINITY, f32::max),
        ExecutionStrategy::Parallel => field
            .into_par_iter()
            .map(|&v| key(v))
            .reduce(|| f32::NEG_INFINITY, f32::max),
    };
    Some(max)
}
