//! Scalar fields over particle sets. Negative inside, positive outside,
//! surface at zero.

mod anisotropic;
mod metaballs;
mod union_of_spheres;
mod zhu_bridson;

pub use anisotropic::{AnisotropicField, anisotropic_query_radius};
pub use metaballs::MetaballField;
pub use union_of_spheres::{UnionOfSpheresField, union_effect_radius_scale};
pub use zhu_bridson::{ZhuBridsonField, ZhuBridsonParams};

use frost_geom::{Aabb, Vec3};
use frost_particles::ParticleGrid;

use crate::error::{MeshError, MeshResult};

/// A field the surface extractor can sample.
pub trait ImplicitField: Sync {
    fn eval(&self, p: Vec3) -> f32;

    /// Distance beyond the particle bounds past which the field is never negative.
    fn support_radius(&self) -> f32;

    /// Value returned where no particle is in range.
    fn outside_value(&self) -> f32;

    /// Particles the field is built from.
    fn particles(&self) -> &KernelParticles;

    /// Calls `f(particle, weight)` for each particle contributing at `p`.
    fn for_each_weight(&self, p: Vec3, f: &mut dyn FnMut(u32, f32));
}

/// Positions and radii indexed for neighbour queries.
#[derive(Clone, Debug)]
pub struct KernelParticles {
    pub positions: Vec<Vec3>,
    pub radii: Vec<f32>,
    pub grid: ParticleGrid,
    pub max_radius: f32,
    pub min_radius: f32,
}

impl KernelParticles {
    /// Indexes particles with voxels of side `voxel_length`.
    pub fn new(positions: Vec<Vec3>, radii: Vec<f32>, voxel_length: f32) -> MeshResult<Self> {
        if positions.len() != radii.len() {
            return Err(MeshError::invalid(
                "radii",
                format!("{} radii for {} positions", radii.len(), positions.len()),
            ));
        }
        let grid = ParticleGrid::from_positions(voxel_length, &positions)?;
        let (min_radius, max_radius) = radius_range(&radii);
        Ok(Self {
            positions,
            radii,
            grid,
            max_radius,
            min_radius,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        self.grid.compute_bounds()
    }

    /// Nearest particle within `radius` of `p`.
    pub fn nearest(&self, p: Vec3, radius: f32) -> Option<u32> {
        let mut best: Option<(u32, f32)> = None;
        self.grid.for_each_in_sphere(p, radius, |e, d2| {
            if best.is_none_or(|(_, b)| d2 < b) {
                best = Some((e.index, d2));
            }
        });
        best.map(|(i, _)| i)
    }
}

/// `(min, max)` over the radii; `(0, 0)` when empty.
pub fn radius_range(radii: &[f32]) -> (f32, f32) {
    if radii.is_empty() {
        return (0.0, 0.0);
    }
    radii
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &r| {
            (lo.min(r), hi.max(r))
        })
}

/// `(1 - t²)³` on `[0, 1)`, zero beyond.
#[inline]
pub fn poly6(t: f32) -> f32 {
    if t >= 1.0 {
        return 0.0;
    }
    let s = 1.0 - t * t;
    s * s * s
}

/// Same as [`poly6`] but from a squared argument.
#[inline]
pub fn poly6_sq(t2: f32) -> f32 {
    if t2 >= 1.0 {
        return 0.0;
    }
    let s = 1.0 - t2;
    s * s * s
}
