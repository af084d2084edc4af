//! Error type shared by every pipeline stage.

/// Failure kinds reported by the pipeline stages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Missing or short buffers, dimension mismatches, bad configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A declared feature that this build does not provide.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A work unit misbehaved or the work queue could not complete.
    #[error("execution failed: {0}")]
    Execution(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
