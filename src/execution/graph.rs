//! Work-unit queue with dependency inference.
//!
//! This is the accelerator-style form of the pipeline: each stage is a
//! [`WorkUnit`] declaring which fields it reads and which it writes. A
//! written field is always freshly produced (discard-write), and every field
//! has exactly one producer, either the host via [`WorkQueue::upload`] or a
//! single unit. Nothing runs on submit. [`WorkQueue::wait`] is the barrier:
//! it derives the dependency graph from the declared read/write sets, runs
//! units level by level and publishes a level's outputs only once every unit
//! in it has finished, so no unit can observe a partial write.
//!
//! ```text
//!   pixels ──▶ luminance ──┬──▶ sobel_x ──┐
//!                          └──▶ sobel_y ──┴──▶ normalize ──▶ magnitude ──▶ quantize
//! ```

use std::fmt;

use log::{debug, trace};
use rayon::prelude::*;

use super::ExecutionStrategy;
use crate::error::{Error, Result};
use crate::filters::{QuantizedField, ScalarField};

/// Handle to a field owned by a [`WorkQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(usize);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Data carried between work units.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Interleaved 8-bit pixel samples.
    Pixels(Vec<u8>),
    /// Single-channel floating point field.
    Scalar(ScalarField),
    /// Single-channel 8-bit output field.
    Quantized(QuantizedField),
}

impl Field {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pixels(_) => "pixels",
            Self::Scalar(_) => "scalar",
            Self::Quantized(_) => "quantized",
        }
    }

    pub fn as_pixels(&self) -> Result<&[u8]> {
        match self {
            Self::Pixels(data) => Ok(data),
            other => Err(kind_mismatch("pixels", other)),
        }
    }

    pub fn as_scalar(&self) -> Result<&ScalarField> {
        match self {
            Self::Scalar(field) => Ok(field),
            other => Err(kind_mismatch("scalar", other)),
        }
    }

    pub fn as_quantized(&self) -> Result<&QuantizedField> {
        match self {
            Self::Quantized(field) => Ok(field),
            other => Err(kind_mismatch("quantized", other)),
        }
    }

    pub fn into_scalar(self) -> Result<ScalarField> {
        match self {
            Self::Scalar(field) => Ok(field),
            other => Err(kind_mismatch("scalar", &other)),
        }
    }

    pub fn into_quantized(self) -> Result<QuantizedField> {
        match self {
            Self::Quantized(field) => Ok(field),
            other => Err(kind_mismatch("quantized", &other)),
        }
    }
}

fn kind_mismatch(expected: &str, actual: &Field) -> Error {
    Error::invalid(format!("expected a {expected} field, got {}", actual.kind()))
}

type Kernel = Box<dyn Fn(&[&Field]) -> Result<Vec<Field>> + Send + Sync>;

/// A unit of work with declared inputs (read-only) and outputs (discard-write).
///
/// The kernel receives the read fields in declaration order and must return
/// exactly one field per declared write, in declaration order.
pub struct WorkUnit {
    name: String,
    reads: Vec<FieldId>,
    writes: Vec<FieldId>,
    kernel: Kernel,
}

impl WorkUnit {
    pub fn new<F>(name: impl Into<String>, reads: &[FieldId], writes: &[FieldId], kernel: F) -> Self
    where
        F: Fn(&[&Field]) -> Result<Vec<Field>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            reads: reads.to_vec(),
            writes: writes.to_vec(),
            kernel: Box::new(kernel),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("name", &self.name)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Slot {
    /// Allocated with no producer yet.
    Empty,
    /// Will be written by the pending unit at this index.
    Pending(usize),
    Ready(Field),
    /// Moved out to the host.
    Taken,
}

/// Queue of work units over a set of shared fields.
#[derive(Debug)]
pub struct WorkQueue {
    strategy: ExecutionStrategy,
    slots: Vec<Slot>,
    pending: Vec<WorkUnit>,
}

impl WorkQueue {
    pub fn new(strategy: ExecutionStrategy) -> Self {
        Self {
            strategy,
            slots: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Number of submitted units not yet run.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Register a host-initialized field.
    pub fn upload(&mut self, field: Field) -> FieldId {
        self.slots.push(Slot::Ready(field));
        FieldId(self.slots.len() - 1)
    }

    /// Reserve an uninitialized field for a unit to write.
    pub fn allocate(&mut self) -> FieldId {
        self.slots.push(Slot::Empty);
        FieldId(self.slots.len() - 1)
    }

    /// Queue a unit. Nothing runs until [`WorkQueue::wait`].
    pub fn submit(&mut self, unit: WorkUnit) -> Result<()> {
        for &id in &unit.reads {
            match self.slot(id)? {
                Slot::Pending(_) | Slot::Ready(_) => {}
                Slot::Empty | Slot::Taken => {
                    return Err(Error::invalid(format!(
                        "unit '{}' reads field {id} which has no producer",
                        unit.name
                    )));
                }
            }
        }

        for (n, &id) in unit.writes.iter().enumerate() {
            if !matches!(self.slot(id)?, Slot::Empty) || unit.writes[..n].contains(&id) {
                return Err(Error::invalid(format!(
                    "unit '{}' writes field {id} which already has a producer",
                    unit.name
                )));
            }
        }

        let index = self.pending.len();
        for &id in &unit.writes {
            self.slots[id.0] = Slot::Pending(index);
        }

        trace!(
            "submitted unit '{}' (reads {:?}, writes {:?})",
            unit.name,
            unit.reads,
            unit.writes
        );
        self.pending.push(unit);
        Ok(())
    }

    /// Run every pending unit and block until all outputs are published.
    ///
    /// On failure the remaining units are dropped and their outputs are
    /// left unproduced.
    pub fn wait(&mut self) -> Result<()> {
        let units = std::mem::take(&mut self.pending);
        if units.is_empty() {
            return Ok(());
        }

        let levels = self.levels(&units);
        let depth = levels.iter().copied().max().unwrap_or(0) + 1;
        let mut batches: Vec<Vec<WorkUnit>> = (0..depth).map(|_| Vec::new()).collect();
        for (unit, level) in units.into_iter().zip(levels) {
            batches[level].push(unit);
        }

        debug!(
            "running {} work units in {} levels ({:?})",
            batches.iter().map(Vec::len).sum::<usize>(),
            depth,
            self.strategy
        );

        for (level, batch) in batches.into_iter().enumerate() {
            trace!(
                "level {level}: {:?}",
                batch.iter().map(WorkUnit::name).collect::<Vec<_>>()
            );
            let outputs = match self.run_level(&batch) {
                Ok(outputs) => outputs,
                Err(err) => {
                    debug!("work queue aborted at level {level}: {err}");
                    self.abandon_pending();
                    return Err(err);
                }
            };
            for (unit, produced) in batch.iter().zip(outputs) {
                for (&id, field) in unit.writes.iter().zip(produced) {
                    self.slots[id.0] = Slot::Ready(field);
                }
            }
        }
        Ok(())
    }

    /// Borrow a produced field. Fails while work is pending.
    pub fn get(&self, id: FieldId) -> Result<&Field> {
        self.ensure_idle()?;
        match self.slot(id)? {
            Slot::Ready(field) => Ok(field),
            _ => Err(Error::invalid(format!("field {id} has not been produced"))),
        }
    }

    /// Move a produced field out to the host. Fails while work is pending.
    pub fn take(&mut self, id: FieldId) -> Result<Field> {
        self.ensure_idle()?;
        self.slot(id)?;
        match std::mem::replace(&mut self.slots[id.0], Slot::Taken) {
            Slot::Ready(field) => Ok(field),
            other => {
                self.slots[id.0] = other;
                Err(Error::invalid(format!("field {id} has not been produced")))
            }
        }
    }

    fn slot(&self, id: FieldId) -> Result<&Slot> {
        self.slots
            .get(id.0)
            .ok_or_else(|| Error::invalid(format!("unknown field {id}")))
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "{} work units pending, call wait() first",
                self.pending.len()
            )))
        }
    }

    /// Topological level of each unit: one past its deepest producer.
    ///
    /// Producers are always submitted before their readers, so a single
    /// forward pass is enough.
    fn levels(&self, units: &[WorkUnit]) -> Vec<usize> {
        let mut levels = Vec::with_capacity(units.len());
        for unit in units {
            let level = unit
                .reads
                .iter()
                .map(|id| match self.slots[id.0] {
                    Slot::Pending(producer) => levels[producer] + 1,
                    _ => 0,
                })
                .max()
                .unwrap_or(0);
            levels.push(level);
        }
        levels
    }

    fn run_level(&self, batch: &[WorkUnit]) -> Result<Vec<Vec<Field>>> {
        match self.strategy {
            ExecutionStrategy::Sequential => batch.iter().map(|unit| self.run_unit(unit)).collect(),
            ExecutionStrategy::Parallel => batch.par_iter().map(|unit| self.run_unit(unit)).collect(),
        }
    }

    fn run_unit(&self, unit: &WorkUnit) -> Result<Vec<Field>> {
        let inputs = unit
            .reads
            .iter()
            .map(|id| match &self.slots[id.0] {
                Slot::Ready(field) => Ok(field),
                _ => Err(Error::Execution(format!(
                    "unit '{}' scheduled before field {id} was produced",
                    unit.name
                ))),
            })
            .collect::<Result<Vec<&Field>>>()?;

        let outputs = (unit.kernel)(&inputs)?;
        if outputs.len() != unit.writes.len() {
            return Err(Error::Execution(format!(
                "unit '{}' declared {} outputs but produced {}",
                unit.name,
                unit.writes.len(),
                outputs.len()
            )));
        }
        Ok(outputs)
    }

    fn abandon_pending(&mut self) {
        for slot in &mut self.slots {
            if matches!(slot, Slot::Pending(_)) {
                *slot = Slot::Empty;
            }
        }
    }
}
