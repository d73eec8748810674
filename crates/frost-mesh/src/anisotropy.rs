//! Per-particle ellipsoidal kernel estimation from local neighbour covariance.
//!
//! Three passes, each over an index built before the pass starts:
//! covariance and stretch tensors, optional Laplacian position smoothing,
//! then per-particle volume from the anisotropic kernel sum.

use std::time::Instant;

use frost_geom::{Sym3, Vec3};
use frost_particles::ParticleGrid;
use frost_runtime::{BuildProgress, WorkerPool};

use crate::constants::{PARTICLE_CHUNK, POLY6_SIGMA, SMOOTHING_MIN_WEIGHT};
use crate::error::{MeshError, MeshResult};
use crate::kernels::poly6_sq;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnisotropyParams {
    /// Kernel support as a multiple of particle radius.
    pub compact_support_scale: f32,
    /// Covariance window as a multiple of the compact support.
    pub window_scale: f32,
    /// Largest allowed ratio between principal stretches (`kr`).
    pub max_anisotropy: f32,
    /// Fewer neighbours than this (`ne`) gives an isotropic kernel.
    pub min_neighbor_count: usize,
    pub position_smoothing: bool,
    pub smoothing_window_scale: f32,
    /// Blend `λ` toward the neighbourhood centroid.
    pub smoothing_weight: f32,
}

impl AnisotropyParams {
    pub fn validate(&self) -> MeshResult<()> {
        let positive = |name: &'static str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(MeshError::invalid(name, format!("{v} must be > 0")))
            }
        };
        positive("anisotropic_radius_scale", self.compact_support_scale)?;
        positive("anisotropic_window_scale", self.window_scale)?;
        positive("anisotropic_smoothing_window_scale", self.smoothing_window_scale)?;
        if !self.max_anisotropy.is_finite() || self.max_anisotropy < 1.0 {
            return Err(MeshError::invalid(
                "anisotropic_max_anisotropy",
                format!("{} must be >= 1", self.max_anisotropy),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_weight) {
            return Err(MeshError::invalid(
                "anisotropic_smoothing_weight",
                format!("{} must be within [0, 1]", self.smoothing_weight),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn smoothing_active(&self) -> bool {
        self.position_smoothing && self.smoothing_weight > SMOOTHING_MIN_WEIGHT
    }
}

/// Ellipsoidal kernel of one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnisotropyRecord {
    /// Maps an offset to kernel space; the kernel is nonzero where `|g x| < 1`.
    pub g: Sym3,
    pub det: f32,
    /// Longest semi-axis of the kernel ellipsoid.
    pub extent: f32,
    /// Estimated particle volume `1 / ρ`.
    pub volume: f32,
}

#[derive(Clone, Debug, Default)]
pub struct Anisotropy {
    /// Positions after optional smoothing.
    pub positions: Vec<Vec3>,
    pub records: Vec<AnisotropyRecord>,
}

impl Anisotropy {
    pub fn max_extent(&self) -> f32 {
        self.records.iter().map(|r| r.extent).fold(0.0, f32::max)
    }
}

/// Isotropic kernel of support `h`.
#[inline]
fn isotropic(h: f32) -> (Sym3, f32, f32) {
    let inv = 1.0 / h;
    (Sym3::scaled_identity(inv), inv * inv * inv, h)
}

/// Stretch tensor for one particle from its weighted neighbourhood.
fn stretch_tensor(
    i: usize,
    positions: &[Vec3],
    radii: &[f32],
    grid: &ParticleGrid,
    params: &AnisotropyParams,
) -> (Sym3, f32, f32) {
    let h = params.compact_support_scale * radii[i];
    let window = h * params.window_scale;
    let center = positions[i];

    let mut count = 0usize;
    let mut weight_sum = 0.0f32;
    let mut mean = Vec3::ZERO;
    grid.for_each_in_sphere(center, window, |e, d2| {
        let t = d2.sqrt() / window;
        let w = 1.0 - t * t * t;
        count += 1;
        weight_sum += w;
        mean += e.position * w;
    });
    if count < params.min_neighbor_count || weight_sum <= 0.0 {
        return isotropic(h);
    }
    mean = mean / weight_sum;

    let mut cov = Sym3::ZERO;
    grid.for_each_in_sphere(center, window, |e, d2| {
        let t = d2.sqrt() / window;
        cov.add_outer(e.position - mean, 1.0 - t * t * t);
    });
    let eig = cov.scale(1.0 / weight_sum).eigen();
    let s1 = eig.values[0];
    if !s1.is_finite() || s1 <= 1e-12 * window * window {
        return isotropic(h);
    }
    let floor = s1 / params.max_anisotropy;
    let clamped = eig.values.map(|s| s.max(floor));
    let norm = (clamped[0] * clamped[1] * clamped[2]).cbrt();
    let stretch = clamped.map(|s| s / norm);
    let inv = stretch.map(|s| 1.0 / (h * s));
    let g = Sym3::from_eigen(inv, &eig.vectors);
    let det = inv[0] * inv[1] * inv[2];
    (g, det, h * stretch[0])
}

/// Weighted neighbourhood centroid inside `window`.
fn smoothed_position(i: usize, positions: &[Vec3], window: f32, grid: &ParticleGrid, weight: f32) -> Vec3 {
    let center = positions[i];
    let mut weight_sum = 0.0f32;
    let mut mean = Vec3::ZERO;
    grid.for_each_in_sphere(center, window, |e, d2| {
        let t = d2.sqrt() / window;
        let w = 1.0 - t * t * t;
        weight_sum += w;
        mean += e.position * w;
    });
    if weight_sum <= 0.0 {
        return center;
    }
    center * (1.0 - weight) + (mean / weight_sum) * weight
}

/// Kernel value of particle `i` at offset `x` from its center (without the volume factor).
#[inline]
pub(crate) fn kernel(g: &Sym3, det: f32, x: Vec3) -> f32 {
    let gx = g.mul_vec(x);
    POLY6_SIGMA * det * poly6_sq(gx.length_squared())
}

/// Runs all three passes on `pool`, reporting into `range` of `progress`.
pub fn estimate(
    positions: &[Vec3],
    radii: &[f32],
    params: &AnisotropyParams,
    pool: &WorkerPool,
    progress: &BuildProgress<'_>,
    range: (f32, f32),
) -> MeshResult<Anisotropy> {
    params.validate()?;
    if positions.is_empty() {
        return Ok(Anisotropy::default());
    }
    let t0 = Instant::now();
    let max_r = radii.iter().copied().fold(0.0, f32::max);
    let span = range.1 - range.0;
    let phase = |a: f32, b: f32| (range.0 + span * a, range.0 + span * b);

    let window_grid = ParticleGrid::from_positions(
        params.compact_support_scale * params.window_scale * max_r,
        positions,
    )?;
    let tensors = pool.run_chunked(
        "anisotropy",
        progress,
        phase(0.0, 0.45),
        positions.len(),
        PARTICLE_CHUNK,
        |r| {
            r.map(|i| stretch_tensor(i, positions, radii, &window_grid, params))
                .collect()
        },
    )?;
    drop(window_grid);

    let smoothed: Vec<Vec3> = if params.smoothing_active() {
        let reach = params.compact_support_scale * params.smoothing_window_scale;
        let grid = ParticleGrid::from_positions(reach * max_r, positions)?;
        pool.run_chunked(
            "position_smoothing",
            progress,
            phase(0.45, 0.7),
            positions.len(),
            PARTICLE_CHUNK,
            |r| {
                r.map(|i| {
                    smoothed_position(i, positions, reach * radii[i], &grid, params.smoothing_weight)
                })
                .collect()
            },
        )?
    } else {
        positions.to_vec()
    };

    let max_extent = tensors.iter().map(|t| t.2).fold(0.0, f32::max);
    let density_grid = ParticleGrid::from_positions(max_extent, &smoothed)?;
    let volumes = pool.run_chunked(
        "anisotropic_volume",
        progress,
        phase(0.7, 1.0),
        smoothed.len(),
        PARTICLE_CHUNK,
        |r| {
            r.map(|j| {
                let xj = smoothed[j];
                let mut rho = 0.0f32;
                density_grid.for_each_in_sphere(xj, max_extent, |e, _| {
                    let (g, det, _) = &tensors[e.index as usize];
                    rho += kernel(g, *det, xj - e.position);
                });
                if rho > 0.0 { 1.0 / rho } else { 0.0 }
            })
            .collect()
        },
    )?;

    let records = tensors
        .into_iter()
        .zip(volumes)
        .map(|((g, det, extent), volume)| AnisotropyRecord {
            g,
            det,
            extent,
            volume,
        })
        .collect();
    log::info!(
        target: "perf",
        "ms={} anisotropy particles={} smoothing={} max_extent={:.4}",
        t0.elapsed().as_millis(),
        positions.len(),
        params.smoothing_active(),
        max_extent
    );
    Ok(Anisotropy {
        positions: smoothed,
        records,
    })
}
