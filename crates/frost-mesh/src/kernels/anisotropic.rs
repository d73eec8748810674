use frost_geom::Vec3;

use super::{ImplicitField, KernelParticles};
use crate::anisotropy::{Anisotropy, AnisotropyParams, AnisotropyRecord, kernel};
use crate::constants::{ANISO_CULL_FLOOR, ANISO_CULL_KR};
use crate::error::{MeshError, MeshResult};

/// `iso - Σ V_j W_j(p - x̄_j)` over ellipsoidal kernels.
pub struct AnisotropicField {
    particles: KernelParticles,
    records: Vec<AnisotropyRecord>,
    iso_level: f32,
    query_radius: f32,
}

/// Neighbour query radius: the smaller of the radius-based bound and the
/// largest ellipsoid extent actually present.
pub fn anisotropic_query_radius(params: &AnisotropyParams, max_radius: f32, max_extent: f32) -> f32 {
    let heuristic = (ANISO_CULL_KR / params.max_anisotropy).max(1.0 / ANISO_CULL_FLOOR)
        * params.compact_support_scale
        * max_radius;
    heuristic.min(max_extent)
}

impl AnisotropicField {
    pub fn new(
        anisotropy: Anisotropy,
        radii: Vec<f32>,
        params: &AnisotropyParams,
        iso_level: f32,
    ) -> MeshResult<Self> {
        if !iso_level.is_finite() || iso_level <= 0.0 {
            return Err(MeshError::invalid("anisotropic_isosurface_level", "must be > 0"));
        }
        if anisotropy.records.len() != radii.len() {
            return Err(MeshError::invalid(
                "radii",
                format!("{} radii for {} kernels", radii.len(), anisotropy.records.len()),
            ));
        }
        let (_, max_r) = super::radius_range(&radii);
        let query_radius = anisotropic_query_radius(params, max_r, anisotropy.max_extent());
        let particles = KernelParticles::new(anisotropy.positions, radii, query_radius)?;
        log::debug!(
            "anisotropic field particles={} query_radius={:.4} iso={}",
            particles.len(),
            query_radius,
            iso_level
        );
        Ok(Self {
            particles,
            records: anisotropy.records,
            iso_level,
            query_radius,
        })
    }

    #[inline]
    fn weight(&self, i: u32, p: Vec3, center: Vec3) -> f32 {
        let r = &self.records[i as usize];
        r.volume * kernel(&r.g, r.det, p - center)
    }
}

impl ImplicitField for AnisotropicField {
    fn eval(&self, p: Vec3) -> f32 {
        let mut density = 0.0f32;
        self.particles
            .grid
            .for_each_in_sphere(p, self.query_radius, |e, _| {
                density += self.weight(e.index, p, e.position);
            });
        self.iso_level - density
    }

    fn support_radius(&self) -> f32 {
        self.query_radius
    }

    fn outside_value(&self) -> f32 {
        self.iso_level
    }

    fn particles(&self) -> &KernelParticles {
        &self.particles
    }

    fn for_each_weight(&self, p: Vec3, f: &mut dyn FnMut(u32, f32)) {
        self.particles
            .grid
            .for_each_in_sphere(p, self.query_radius, |e, _| {
                let w = self.weight(e.index, p, e.position);
                if w > 0.0 {
                    f(e.index, w);
                }
            });
    }
}
