use frost_geom::Vec3;

use super::{ImplicitField, KernelParticles};
use crate::constants::UNION_SCALE_MAX;
use crate::error::MeshResult;

/// Search-radius scale, tightened toward 1 as the meshing voxel shrinks
/// relative to the smallest particle.
pub fn union_effect_radius_scale(voxel_length: f32, min_radius: f32) -> f32 {
    if min_radius > 0.0 {
        UNION_SCALE_MAX.min(1.0 + 2.0 * voxel_length / min_radius)
    } else {
        UNION_SCALE_MAX
    }
}

/// Signed distance to the nearest sphere surface.
pub struct UnionOfSpheresField {
    particles: KernelParticles,
    search_radius: f32,
}

impl UnionOfSpheresField {
    pub fn new(positions: Vec<Vec3>, radii: Vec<f32>, meshing_voxel_length: f32) -> MeshResult<Self> {
        let (min_r, max_r) = super::radius_range(&radii);
        let scale = union_effect_radius_scale(meshing_voxel_length, min_r);
        let field = Self::with_search_radius(positions, radii, scale * max_r)?;
        log::debug!(
            "union_of_spheres scale={:.3} search_radius={:.4} min_r={:.4} max_r={:.4}",
            scale,
            field.search_radius,
            min_r,
            max_r
        );
        Ok(field)
    }

    /// Builds with an explicit search radius (must be at least the max radius).
    pub fn with_search_radius(positions: Vec<Vec3>, radii: Vec<f32>, search_radius: f32) -> MeshResult<Self> {
        let particles = KernelParticles::new(positions, radii, search_radius)?;
        Ok(Self {
            particles,
            search_radius,
        })
    }

    #[inline]
    pub fn search_radius(&self) -> f32 {
        self.search_radius
    }
}

impl ImplicitField for UnionOfSpheresField {
    fn eval(&self, p: Vec3) -> f32 {
        let mut best = f32::INFINITY;
        let radii = &self.particles.radii;
        self.particles
            .grid
            .for_each_in_sphere(p, self.search_radius, |e, d2| {
                let d = d2.sqrt() - radii[e.index as usize];
                if d < best {
                    best = d;
                }
            });
        if best.is_finite() {
            best
        } else {
            self.search_radius
        }
    }

    fn support_radius(&self) -> f32 {
        self.particles.max_radius
    }

    fn outside_value(&self) -> f32 {
        self.search_radius
    }

    fn particles(&self) -> &KernelParticles {
        &self.particles
    }

    fn for_each_weight(&self, p: Vec3, f: &mut dyn FnMut(u32, f32)) {
        let mut best: Option<(u32, f32)> = None;
        let radii = &self.particles.radii;
        self.particles
            .grid
            .for_each_in_sphere(p, self.search_radius, |e, d2| {
                let d = d2.sqrt() - radii[e.index as usize];
                if best.is_none_or(|(_, b)| d < b) {
                    best = Some((e.index, d));
                }
            });
        if let Some((i, _)) = best {
            f(i, 1.0);
        }
    }
}
