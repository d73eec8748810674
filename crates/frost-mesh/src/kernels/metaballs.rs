use frost_geom::Vec3;

use super::{ImplicitField, KernelParticles, poly6_sq};
use crate::error::{MeshError, MeshResult};

/// `threshold - Σ k(d / (scale * r))` with `k(t) = (1 - t²)³`.
pub struct MetaballField {
    particles: KernelParticles,
    radius_scale: f32,
    threshold: f32,
    search_radius: f32,
}

impl MetaballField {
    pub fn new(
        positions: Vec<Vec3>,
        radii: Vec<f32>,
        radius_scale: f32,
        threshold: f32,
    ) -> MeshResult<Self> {
        if !radius_scale.is_finite() || radius_scale <= 0.0 {
            return Err(MeshError::invalid("metaball_radius_scale", "must be > 0"));
        }
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(MeshError::invalid("metaball_isosurface_level", "must be > 0"));
        }
        let (_, max_r) = super::radius_range(&radii);
        let search_radius = radius_scale * max_r;
        let particles = KernelParticles::new(positions, radii, search_radius)?;
        Ok(Self {
            particles,
            radius_scale,
            threshold,
            search_radius,
        })
    }

    #[inline]
    fn weight(&self, i: u32, d2: f32) -> f32 {
        let h = self.radius_scale * self.particles.radii[i as usize];
        poly6_sq(d2 / (h * h))
    }
}

impl ImplicitField for MetaballField {
    fn eval(&self, p: Vec3) -> f32 {
        let mut density = 0.0f32;
        self.particles
            .grid
            .for_each_in_sphere(p, self.search_radius, |e, d2| {
                density += self.weight(e.index, d2);
            });
        self.threshold - density
    }

    fn support_radius(&self) -> f32 {
        self.search_radius
    }

    fn outside_value(&self) -> f32 {
        self.threshold
    }

    fn particles(&self) -> &KernelParticles {
        &self.particles
    }

    fn for_each_weight(&self, p: Vec3, f: &mut dyn FnMut(u32, f32)) {
        self.particles
            .grid
            .for_each_in_sphere(p, self.search_radius, |e, d2| {
                let w = self.weight(e.index, d2);
                if w > 0.0 {
                    f(e.index, w);
                }
            });
    }
}
