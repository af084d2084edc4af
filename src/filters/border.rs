//! Border policies for windowed filters.
//!
//! A border policy decides which sample stands in for a neighbour that falls
//! outside the image. With `abcdefgh` as one row:
//!
//! | Policy | Left | Right |
//! |--------|------|-------|
//! | Clamp | `aaa` | `hhh` |
//! | Wrap | `fgh` | `abc` |
//! | Reflect | `dcb` | `gfe` |
//! | Mirror | `cba` | `hgf` |
//! | Constant(v) | `vvv` | `vvv` |
//!
//! Each policy is backed by a remapping rule looked up from its tag. Clamp
//! is always available. The others are compiled in with the
//! `extended-borders` feature; without it they report `NotImplemented`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How out-of-range neighbour samples are synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderPolicy {
    /// Replicate the edge sample.
    #[default]
    Clamp,
    /// Toroidal wrap-around.
    Wrap,
    /// Mirror without repeating the edge sample.
    Reflect,
    /// Mirror repeating the edge sample.
    Mirror,
    /// Read a fixed fill value.
    Constant(f32),
}

impl BorderPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clamp => "clamp",
            Self::Wrap => "wrap",
            Self::Reflect => "reflect",
            Self::Mirror => "mirror",
            Self::Constant(_) => "constant",
        }
    }

    /// Whether this build has a rule for the policy.
    pub fn is_supported(&self) -> bool {
        rule_for(self).is_some()
    }
}

type RemapFn = fn(isize, usize) -> usize;

#[derive(Debug, Clone, Copy)]
enum Rule {
    Remap(RemapFn),
    Fill(f32),
}

#[allow(unreachable_patterns)]
fn rule_for(policy: &BorderPolicy) -> Option<Rule> {
    match *policy {
        BorderPolicy::Clamp => Some(Rule::Remap(clamp_index)),
        #[cfg(feature = "extended-borders")]
        BorderPolicy::Wrap => Some(Rule::Remap(wrap_index)),
        #[cfg(feature = "extended-borders")]
        BorderPolicy::Reflect => Some(Rule::Remap(reflect_index)),
        #[cfg(feature = "extended-borders")]
        BorderPolicy::Mirror => Some(Rule::Remap(mirror_index)),
        #[cfg(feature = "extended-borders")]
        BorderPolicy::Constant(value) => Some(Rule::Fill(value)),
        _ => None,
    }
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

#[cfg(feature = "extended-borders")]
fn wrap_index(i: isize, len: usize) -> usize {
    i.rem_euclid(len as isize) as usize
}

#[cfg(feature = "extended-borders")]
fn reflect_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * len - 2;
    let r = i.rem_euclid(period as isize) as usize;
    if r < len {
        r
    } else {
        period - r
    }
}

#[cfg(feature = "extended-borders")]
fn mirror_index(i: isize, len: usize) -> usize {
    let period = 2 * len;
    let r = i.rem_euclid(period as isize) as usize;
    if r < len {
        r
    } else {
        period - 1 - r
    }
}

/// Resolved border rule, ready for per-sample lookups.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BorderMap {
    rule: Rule,
}

impl BorderMap {
    pub(crate) fn new(policy: BorderPolicy) -> Result<Self> {
        rule_for(&policy)
            .map(|rule| Self { rule })
            .ok_or_else(|| {
                Error::NotImplemented(format!(
                    "border policy '{}' is not available in this build",
                    policy.name()
                ))
            })
    }

    /// Source index for coordinate `i` on an axis of `len` samples, or
    /// `None` when the fill value should be read instead. `len` must be > 0.
    #[inline]
    pub(crate) fn map(&self, i: isize, len: usize) -> Option<usize> {
        if i >= 0 && (i as usize) < len {
            return Some(i as usize);
        }
        match self.rule {
            Rule::Remap(remap) => Some(remap(i, len)),
            Rule::Fill(_) => None,
        }
    }

    #[inline]
    pub(crate) fn fill(&self) -> f32 {
        match self.rule {
            Rule::Fill(value) => value,
            Rule::Remap(_) => 0.0,
        }
    }
}

/// Map coordinate `i` onto an axis of `len` samples.
///
/// Returns `Ok(None)` when the policy reads its fill value instead of a
/// sample, and `InvalidArgument` for an empty axis.
pub fn map_index(i: isize, len: usize, policy: BorderPolicy) -> Result<Option<usize>> {
    if len == 0 {
        return Err(Error::invalid("cannot map an index onto an empty axis"));
    }
    Ok(BorderMap::new(policy)?.map(i, len))
}
