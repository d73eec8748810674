//! Particle channels, buffers, source streams and the spatial particle index.
#![forbid(unsafe_code)]

pub mod array;
pub mod channels;
pub mod error;
pub mod grid;
pub mod istream;
pub mod transforms;

pub use array::ParticleArray;
pub use channels::{ChannelData, ChannelDesc, ChannelMap, DataType, names};
pub use error::{ParticleError, ParticleResult};
pub use grid::{GridEntry, ParticleGrid};
pub use istream::{BoxCullingIstream, ParticleIstream, VecParticleIstream};
