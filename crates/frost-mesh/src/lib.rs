//! Implicit-surface and direct meshing of particle sets (engine-only).
#![forbid(unsafe_code)]

pub mod anisotropy;
pub mod constants;
pub mod error;
pub mod extract;
pub mod kernels;
pub mod post;
pub mod primitives;
pub mod tables;
pub mod trimesh;

pub use error::{MeshError, MeshResult};
pub use extract::{ExtractMode, ExtractSettings, ExtractStats, extract_surface, select_mode};
pub use kernels::{ImplicitField, KernelParticles};
pub use trimesh::{MeshChannel, TriMesh, is_degenerate_face};
