//! Per-particle adjustments applied between the source stream and the spatial index.

use frost_geom::Vec3;

use crate::array::ParticleArray;
use crate::channels::{ChannelDesc, DataType, names};
use crate::error::{ParticleError, ParticleResult};

#[inline]
fn rot(x: u32, k: u32) -> u32 {
    x.rotate_left(k)
}

/// Bob Jenkins' lookup3 `hashword`.
pub fn hashword(key: &[u32], initval: u32) -> u32 {
    let init = 0xdeadbeefu32
        .wrapping_add((key.len() as u32) << 2)
        .wrapping_add(initval);
    let (mut a, mut b, mut c) = (init, init, init);
    let mut k = key;
    while k.len() > 3 {
        a = a.wrapping_add(k[0]);
        b = b.wrapping_add(k[1]);
        c = c.wrapping_add(k[2]);
        // mix
        a = a.wrapping_sub(c);
        a ^= rot(c, 4);
        c = c.wrapping_add(b);
        b = b.wrapping_sub(a);
        b ^= rot(a, 6);
        a = a.wrapping_add(c);
        c = c.wrapping_sub(b);
        c ^= rot(b, 8);
        b = b.wrapping_add(a);
        a = a.wrapping_sub(c);
        a ^= rot(c, 16);
        c = c.wrapping_add(b);
        b = b.wrapping_sub(a);
        b ^= rot(a, 19);
        a = a.wrapping_add(c);
        c = c.wrapping_sub(b);
        c ^= rot(b, 4);
        b = b.wrapping_add(a);
        k = &k[3..];
    }
    match k.len() {
        3 => {
            c = c.wrapping_add(k[2]);
            b = b.wrapping_add(k[1]);
            a = a.wrapping_add(k[0]);
        }
        2 => {
            b = b.wrapping_add(k[1]);
            a = a.wrapping_add(k[0]);
        }
        1 => a = a.wrapping_add(k[0]),
        _ => return c,
    }
    // final
    c ^= b;
    c = c.wrapping_sub(rot(b, 14));
    a ^= c;
    a = a.wrapping_sub(rot(c, 11));
    b ^= a;
    b = b.wrapping_sub(rot(a, 25));
    c ^= b;
    c = c.wrapping_sub(rot(b, 16));
    a ^= c;
    a = a.wrapping_sub(rot(c, 4));
    b ^= a;
    b = b.wrapping_sub(rot(a, 14));
    c ^= b;
    c = c.wrapping_sub(rot(b, 24));
    c
}

/// Shrinks `radius` by up to `variation` (a fraction) using a hash of `id`.
#[inline]
pub fn id_randomized_radius(id: i32, radius: f32, variation: f32, seed: u32) -> f32 {
    let hashed = hashword(&[id as u32], seed);
    let unit = hashed as f32 / u32::MAX as f32;
    radius * (1.0 - unit * variation)
}

/// Adds an `ID` channel numbering particles from `start` when none exists.
/// Returns whether a channel was synthesized.
pub fn ensure_ids(particles: &mut ParticleArray, start: i64) -> ParticleResult<bool> {
    if particles.channel_map().has(names::ID) {
        return Ok(false);
    }
    particles.add_channel(ChannelDesc::new(names::ID, DataType::Int64, 1))?;
    if let Some(col) = particles.column_mut(names::ID) {
        for k in 0..col.value_count() {
            col.set_f64(k, (start + k as i64) as f64);
        }
    }
    Ok(true)
}

/// Overwrites (or creates) `Radius` with a constant.
pub fn set_constant_radius(particles: &mut ParticleArray, radius: f32) -> ParticleResult<()> {
    particles.add_channel(ChannelDesc::new(names::RADIUS, DataType::Float32, 1))?;
    let col = particles.f32_column_mut(names::RADIUS, 1)?;
    col.iter_mut().for_each(|r| *r = radius);
    Ok(())
}

/// Applies [`id_randomized_radius`] per particle. Requires `ID` and `Radius`.
pub fn randomize_radius(
    particles: &mut ParticleArray,
    variation: f32,
    seed: u32,
) -> ParticleResult<()> {
    let ids: Vec<i32> = {
        let col = particles
            .column(names::ID)
            .ok_or_else(|| ParticleError::MissingChannel(names::ID.to_string()))?;
        (0..particles.len()).map(|i| col.get_i64(i) as i32).collect()
    };
    let radii = particles.f32_column_mut(names::RADIUS, 1)?;
    for (r, id) in radii.iter_mut().zip(ids) {
        *r = id_randomized_radius(id, *r, variation, seed);
    }
    Ok(())
}

/// What drives a radius animation curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadiusAnimationMode {
    /// Curve sampled once at the build time.
    AbsoluteTime,
    /// Curve sampled at each particle's `Age`.
    Age,
    /// Curve sampled at `100 * Age / LifeSpan`.
    LifePercent,
}

/// Piecewise-linear scale curve; keys sorted by `x`, clamped at both ends.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleCurve {
    pub keys: Vec<(f32, f32)>,
}

impl ScaleCurve {
    pub fn sample(&self, x: f32) -> f32 {
        let Some(&(x0, y0)) = self.keys.first() else {
            return 1.0;
        };
        if x <= x0 {
            return y0;
        }
        for w in self.keys.windows(2) {
            let ((xa, ya), (xb, yb)) = (w[0], w[1]);
            if x <= xb {
                let span = xb - xa;
                if span <= 0.0 {
                    return yb;
                }
                return ya + (yb - ya) * (x - xa) / span;
            }
        }
        self.keys.last().map(|k| k.1).unwrap_or(1.0)
    }
}

/// Multiplies `Radius` by the curve value for each particle.
pub fn animate_radius(
    particles: &mut ParticleArray,
    mode: RadiusAnimationMode,
    curve: &ScaleCurve,
    time: f32,
) -> ParticleResult<()> {
    let factors: Vec<f32> = match mode {
        RadiusAnimationMode::AbsoluteTime => vec![curve.sample(time); particles.len()],
        RadiusAnimationMode::Age => {
            let age = particles.f32_column(names::AGE, 1)?;
            age.iter().map(|&a| curve.sample(a)).collect()
        }
        RadiusAnimationMode::LifePercent => {
            let age = particles.f32_column(names::AGE, 1)?;
            let life = particles.f32_column(names::LIFE_SPAN, 1)?;
            age.iter()
                .zip(life)
                .map(|(&a, &l)| {
                    let pct = if l > 0.0 { 100.0 * a / l } else { 100.0 };
                    curve.sample(pct)
                })
                .collect()
        }
    };
    let radii = particles.f32_column_mut(names::RADIUS, 1)?;
    for (r, f) in radii.iter_mut().zip(factors) {
        *r *= f;
    }
    Ok(())
}

/// `Position += Velocity * dt`. Missing `Velocity` leaves positions untouched.
pub fn offset_by_velocity(particles: &mut ParticleArray, dt: f32) -> ParticleResult<()> {
    if dt == 0.0 || !particles.channel_map().has(names::VELOCITY) {
        return Ok(());
    }
    let vel = particles.f32_column(names::VELOCITY, 3)?.to_vec();
    let pos = particles.f32_column_mut(names::POSITION, 3)?;
    for (p, v) in pos.iter_mut().zip(vel) {
        *p += v * dt;
    }
    Ok(())
}

/// How a partial (viewport) load picks particles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// First `fraction * n` particles.
    Head,
    /// Evenly spaced particles in stream order.
    Stride,
    /// Evenly spaced by particle `ID`, stable across frames.
    Id,
}

#[inline]
fn stride_keeps(k: i64, fraction: f64) -> bool {
    ((k + 1) as f64 * fraction).floor() > (k as f64 * fraction).floor()
}

/// Drops particles so roughly `fraction` of them remain. Returns the removed count.
pub fn apply_load_fraction(
    particles: &mut ParticleArray,
    mode: LoadMode,
    fraction: f64,
) -> ParticleResult<usize> {
    if fraction >= 1.0 {
        return Ok(0);
    }
    let fraction = fraction.max(0.0);
    let n = particles.len();
    let keep: Vec<bool> = match mode {
        LoadMode::Head => {
            let limit = (n as f64 * fraction).round() as usize;
            (0..n).map(|i| i < limit).collect()
        }
        LoadMode::Stride => (0..n).map(|i| stride_keeps(i as i64, fraction)).collect(),
        LoadMode::Id => {
            let col = particles
                .column(names::ID)
                .ok_or_else(|| ParticleError::MissingChannel(names::ID.to_string()))?;
            (0..n)
                .map(|i| stride_keeps(col.get_i64(i), fraction))
                .collect()
        }
    };
    Ok(particles.retain(|i| keep[i]))
}

/// Removes particles with a non-finite position or a non-positive/non-finite radius.
/// Returns the removed count.
pub fn discard_invalid(particles: &mut ParticleArray) -> ParticleResult<usize> {
    let keep: Vec<bool> = {
        let pos = particles.f32_column(names::POSITION, 3)?;
        let radii = particles.radii()?;
        pos.chunks_exact(3)
            .zip(radii)
            .map(|(p, &r)| Vec3::new(p[0], p[1], p[2]).is_finite() && r.is_finite() && r > 0.0)
            .collect()
    };
    Ok(particles.retain(|i| keep[i]))
}
