//! Shared tuning constants for frost-mesh.

/// Cell count above which extraction switches to chunked, parallel sparse mode.
pub const SPARSE_MESHING_VOXEL_COUNT_THRESHOLD: u64 = 500_000;

/// Cells per axis in one sparse extraction chunk.
pub const SPARSE_CHUNK_CELLS: i32 = 32;

/// Particles per unit of work in per-particle passes.
pub(crate) const PARTICLE_CHUNK: usize = 1024;

/// Vertices per unit of work in channel propagation.
pub(crate) const VERTEX_CHUNK: usize = 4096;

/// Normalization of the `(1 - d²)³` kernel over the unit ball: 315 / (64 π).
pub(crate) const POLY6_SIGMA: f32 = 315.0 / (64.0 * core::f32::consts::PI);

/// Smallest Zhu-Bridson blend radius scale. At or below 1 the kernel support
/// ends inside the particle and a lone particle's sphere is clipped.
pub const MIN_BLEND_RADIUS_SCALE: f32 = 1.1;

/// Ceiling of the union-of-spheres search radius scale.
pub(crate) const UNION_SCALE_MAX: f32 = 2.0;

/// Anisotropic neighbour cull heuristic terms: `max(ANISO_CULL_KR / kr, 1 / ANISO_CULL_FLOOR)`.
pub(crate) const ANISO_CULL_KR: f32 = 1.33;
pub(crate) const ANISO_CULL_FLOOR: f32 = 0.15;

/// Position smoothing below this weight is skipped.
pub(crate) const SMOOTHING_MIN_WEIGHT: f32 = 0.01;
