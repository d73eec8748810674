//! Top-level error for configuration loading and mesh builds.

use frost_mesh::MeshError;
use frost_particles::ParticleError;
use frost_runtime::{Cancelled, PassError};
use thiserror::Error;

pub type FrostResult<T> = Result<T, FrostError>;

#[derive(Debug, Error)]
pub enum FrostError {
    /// A parameter is out of range or names an unknown option.
    #[error("invalid parameter `{parameter}`: {reason}")]
    Config { parameter: String, reason: String },

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Mesh(MeshError),

    /// The build was aborted through the progress logger or cancel token.
    #[error("mesh build cancelled")]
    Cancelled,
}

impl FrostError {
    pub fn config(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        FrostError::Config {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// A user abort rather than a failure.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FrostError::Cancelled)
    }
}

impl From<MeshError> for FrostError {
    fn from(e: MeshError) -> Self {
        if e.is_cancelled() {
            return FrostError::Cancelled;
        }
        match e {
            MeshError::InvalidParameter { name, reason } => FrostError::config(name, reason),
            other => FrostError::Mesh(other),
        }
    }
}

impl From<ParticleError> for FrostError {
    fn from(e: ParticleError) -> Self {
        FrostError::Mesh(MeshError::Particles(e))
    }
}

impl From<PassError> for FrostError {
    fn from(e: PassError) -> Self {
        MeshError::Pass(e).into()
    }
}

impl From<Cancelled> for FrostError {
    fn from(_: Cancelled) -> Self {
        FrostError::Cancelled
    }
}
