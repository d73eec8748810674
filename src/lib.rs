//! Frost: meshes particle sets into triangle surfaces.
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod session;

pub use cache::{CacheKey, ParticleCache, ParticleCacheStats};
pub use config::{
    MaterialMode, MeshingConfig, MeshingMethod, MeshingParams, Quality, ResolutionMode,
    load_params_from_path, parse_params,
};
pub use error::{FrostError, FrostResult};
pub use session::{BuildReport, MeshBuildSession};

pub use frost_geom as geom;
pub use frost_mesh as mesh;
pub use frost_particles as particles;
pub use frost_runtime as runtime;
