use thiserror::Error;

pub type PassResult<T> = Result<T, PassError>;

/// Failure of a data-parallel pass as seen by the supervising thread.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PassError {
    /// Cooperative abort; not a failure.
    #[error("pass cancelled")]
    Cancelled,

    /// A unit of work panicked; remaining units were abandoned.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
}

impl PassError {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PassError::Cancelled)
    }
}

impl From<crate::Cancelled> for PassError {
    fn from(_: crate::Cancelled) -> Self {
        PassError::Cancelled
    }
}
