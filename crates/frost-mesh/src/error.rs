//! Error types for meshing.

use frost_particles::ParticleError;
use frost_runtime::PassError;
use thiserror::Error;

/// Result type for meshing operations.
pub type MeshResult<T> = Result<T, MeshError>;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error(transparent)]
    Particles(#[from] ParticleError),

    #[error(transparent)]
    Pass(#[from] PassError),

    /// A meshing parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A requested mesh channel is missing or has the wrong layout.
    #[error("mesh channel `{0}` missing or malformed")]
    Channel(String),
}

impl MeshError {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MeshError::Pass(p) if p.is_cancelled())
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        MeshError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
