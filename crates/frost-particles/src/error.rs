//! Error types for particle streams and indexing.

use thiserror::Error;

use crate::channels::DataType;

/// Result type for particle operations.
pub type ParticleResult<T> = Result<T, ParticleError>;

/// Errors raised while reading or indexing particles.
#[derive(Debug, Error)]
pub enum ParticleError {
    /// A channel the caller needs is not present.
    #[error("particle stream is missing required channel `{0}`")]
    MissingChannel(String),

    /// A channel exists with an incompatible arity.
    #[error("channel `{name}` has arity {actual}, expected {expected}")]
    ChannelArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A channel exists with an incompatible element type.
    #[error("channel `{name}` has type {actual}, expected {expected}")]
    ChannelType {
        name: String,
        expected: &'static str,
        actual: DataType,
    },

    /// The same channel name was declared twice with different layouts.
    #[error("channel `{0}` declared twice with different layouts")]
    ChannelConflict(String),

    /// Column storage does not match the declared particle count.
    #[error("column `{name}` holds {actual} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Spatial index voxel length must be positive and finite.
    #[error("invalid particle voxel length {0}")]
    InvalidVoxelLength(f32),
}
