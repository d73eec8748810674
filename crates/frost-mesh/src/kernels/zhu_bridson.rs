use frost_geom::Vec3;

use super::{ImplicitField, KernelParticles, poly6_sq};
use crate::constants::MIN_BLEND_RADIUS_SCALE;
use crate::error::{MeshError, MeshResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZhuBridsonParams {
    /// Kernel support as a multiple of each particle's radius; at least
    /// [`MIN_BLEND_RADIUS_SCALE`].
    pub blend_radius_scale: f32,
    pub low_density_trimming: bool,
    pub trimming_threshold: f32,
    pub trimming_strength: f32,
}

/// Distance to the kernel-weighted mean particle, minus the weighted mean radius.
pub struct ZhuBridsonField {
    particles: KernelParticles,
    params: ZhuBridsonParams,
    search_radius: f32,
    /// Effective trimming threshold; zero unless trimming is enabled.
    trim_threshold: f32,
}

struct Blend {
    weight_sum: f32,
    mean: Vec3,
    radius: f32,
}

impl ZhuBridsonField {
    pub fn new(positions: Vec<Vec3>, radii: Vec<f32>, params: ZhuBridsonParams) -> MeshResult<Self> {
        if !params.blend_radius_scale.is_finite() || params.blend_radius_scale < MIN_BLEND_RADIUS_SCALE {
            return Err(MeshError::invalid(
                "zhu_bridson_blend_radius_scale",
                format!("{} must be >= {MIN_BLEND_RADIUS_SCALE}", params.blend_radius_scale),
            ));
        }
        let (_, max_r) = super::radius_range(&radii);
        let search_radius = params.blend_radius_scale * max_r;
        let particles = KernelParticles::new(positions, radii, search_radius)?;
        let trim_threshold = if params.low_density_trimming {
            params.trimming_threshold.max(0.0)
        } else {
            0.0
        };
        Ok(Self {
            particles,
            params,
            search_radius,
            trim_threshold,
        })
    }

    #[inline]
    fn weight(&self, i: u32, d2: f32) -> f32 {
        let h = self.params.blend_radius_scale * self.particles.radii[i as usize];
        poly6_sq(d2 / (h * h))
    }

    fn blend(&self, p: Vec3) -> Option<Blend> {
        let mut weight_sum = 0.0f32;
        let mut mean = Vec3::ZERO;
        let mut radius = 0.0f32;
        self.particles
            .grid
            .for_each_in_sphere(p, self.search_radius, |e, d2| {
                let w = self.weight(e.index, d2);
                if w > 0.0 {
                    weight_sum += w;
                    mean += e.position * w;
                    radius += self.particles.radii[e.index as usize] * w;
                }
            });
        (weight_sum > 0.0).then(|| Blend {
            weight_sum,
            mean: mean / weight_sum,
            radius: radius / weight_sum,
        })
    }
}

impl ImplicitField for ZhuBridsonField {
    fn eval(&self, p: Vec3) -> f32 {
        let Some(b) = self.blend(p) else {
            return self.search_radius;
        };
        let mut f = p.distance(b.mean) - b.radius;
        if b.weight_sum < self.trim_threshold {
            f += self.params.trimming_strength * (self.trim_threshold - b.weight_sum) * b.radius;
        }
        f
    }

    fn support_radius(&self) -> f32 {
        self.search_radius
    }

    fn outside_value(&self) -> f32 {
        self.search_radius
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
