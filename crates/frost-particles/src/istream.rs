//! Pull-based particle source streams.

use frost_geom::{Aabb, Vec3};

use crate::array::{DefaultValues, ParticleArray};
use crate::channels::{ChannelMap, names};
use crate::error::{ParticleError, ParticleResult};

/// Particles pulled per refill by adapters that filter an inner stream.
const FILTER_BATCH: usize = 4096;

/// A lazy sequence of particles with a negotiable channel layout.
///
/// Callers pick the layout with [`ParticleIstream::set_channel_map`] before
/// pulling. Requested channels the source does not have natively are filled
/// from the source's default particle.
pub trait ParticleIstream: Send {
    /// Channels the source actually carries.
    fn native_channel_map(&self) -> &ChannelMap;

    /// Layout particles are delivered in.
    fn channel_map(&self) -> &ChannelMap;

    fn set_channel_map(&mut self, map: ChannelMap) -> ParticleResult<()>;

    /// Total particle count when known up front.
    fn particle_count_hint(&self) -> Option<usize> {
        None
    }

    /// Appends up to `*count` particles to `out` and stores how many were read
    /// back into `count`. Returns `false` once the stream is exhausted.
    fn get_particles(&mut self, out: &mut ParticleArray, count: &mut usize)
    -> ParticleResult<bool>;

    /// Appends one particle; `false` at end of stream.
    fn get_particle(&mut self, out: &mut ParticleArray) -> ParticleResult<bool> {
        let mut n = 1;
        self.get_particles(out, &mut n)?;
        Ok(n == 1)
    }
}

impl<S: ParticleIstream + ?Sized> ParticleIstream for Box<S> {
    fn native_channel_map(&self) -> &ChannelMap {
        (**self).native_channel_map()
    }
    fn channel_map(&self) -> &ChannelMap {
        (**self).channel_map()
    }
    fn set_channel_map(&mut self, map: ChannelMap) -> ParticleResult<()> {
        (**self).set_channel_map(map)
    }
    fn particle_count_hint(&self) -> Option<usize> {
        (**self).particle_count_hint()
    }
    fn get_particles(
        &mut self,
        out: &mut ParticleArray,
        count: &mut usize,
    ) -> ParticleResult<bool> {
        (**self).get_particles(out, count)
    }
}

impl<S: ParticleIstream + ?Sized> ParticleIstream for &mut S {
    fn native_channel_map(&self) -> &ChannelMap {
        (**self).native_channel_map()
    }
    fn channel_map(&self) -> &ChannelMap {
        (**self).channel_map()
    }
    fn set_channel_map(&mut self, map: ChannelMap) -> ParticleResult<()> {
        (**self).set_channel_map(map)
    }
    fn particle_count_hint(&self) -> Option<usize> {
        (**self).particle_count_hint()
    }
    fn get_particles(
        &mut self,
        out: &mut ParticleArray,
        count: &mut usize,
    ) -> ParticleResult<bool> {
        (**self).get_particles(out, count)
    }
}

fn check_arities(native: &ChannelMap, requested: &ChannelMap) -> ParticleResult<()> {
    for desc in requested.iter() {
        if let Some(n) = native.get(&desc.name) {
            if n.arity != desc.arity {
                return Err(ParticleError::ChannelArity {
                    name: desc.name.clone(),
                    expected: n.arity,
                    actual: desc.arity,
                });
            }
        }
    }
    Ok(())
}

/// In-memory particle source.
pub struct VecParticleIstream {
    particles: ParticleArray,
    requested: ChannelMap,
    defaults: DefaultValues,
    cursor: usize,
}

impl VecParticleIstream {
    pub fn new(particles: ParticleArray) -> Self {
        let requested = particles.channel_map().clone();
        Self {
            particles,
            requested,
            defaults: DefaultValues::new(),
            cursor: 0,
        }
    }

    /// Sets the default-particle value for `name` (used when it is requested but absent).
    pub fn with_default(mut self, name: &str, values: Vec<f64>) -> Self {
        self.defaults.insert(name.to_string(), values);
        self
    }
}

impl ParticleIstream for VecParticleIstream {
    fn native_channel_map(&self) -> &ChannelMap {
        self.particles.channel_map()
    }

    fn channel_map(&self) -> &ChannelMap {
        &self.requested
    }

    fn set_channel_map(&mut self, map: ChannelMap) -> ParticleResult<()> {
        check_arities(self.particles.channel_map(), &map)?;
        self.requested = map;
        Ok(())
    }

    fn particle_count_hint(&self) -> Option<usize> {
        Some(self.particles.len())
    }

    fn get_particles(
        &mut self,
        out: &mut ParticleArray,
        count: &mut usize,
    ) -> ParticleResult<bool> {
        let available = self.particles.len() - self.cursor;
        let n = (*count).min(available);
        for i in self.cursor..self.cursor + n {
            out.push_from(&self.particles, i, &self.defaults);
        }
        self.cursor += n;
        *count = n;
        Ok(self.cursor < self.particles.len())
    }
}

/// Passes through only particles whose position lies inside `bounds`.
///
/// Particles with a non-finite position are passed through as well; they are
/// invalid rather than outside, and the validity filter counts them.
pub struct BoxCullingIstream<S> {
    inner: S,
    bounds: Aabb,
    pending: ParticleArray,
    pending_cursor: usize,
    inner_done: bool,
}

impl<S: ParticleIstream> BoxCullingIstream<S> {
    /// Fails if the inner stream cannot provide `Position`.
    pub fn new(inner: S, bounds: Aabb) -> ParticleResult<Self> {
        inner.native_channel_map().require_float(names::POSITION, 3)?;
        let pending = ParticleArray::new(inner.channel_map().clone());
        Ok(Self {
            inner,
            bounds,
            pending,
            pending_cursor: 0,
            inner_done: false,
        })
    }

    fn refill(&mut self) -> ParticleResult<()> {
        self.pending.clear();
        self.pending_cursor = 0;
        let mut n = FILTER_BATCH;
        self.inner_done = !self.inner.get_particles(&mut self.pending, &mut n)?;
        Ok(())
    }
}

impl<S: ParticleIstream> ParticleIstream for BoxCullingIstream<S> {
    fn native_channel_map(&self) -> &ChannelMap {
        self.inner.native_channel_map()
    }

    fn channel_map(&self) -> &ChannelMap {
        self.inner.channel_map()
    }

    fn set_channel_map(&mut self, map: ChannelMap) -> ParticleResult<()> {
        map.require_float(names::POSITION, 3)?;
        self.inner.set_channel_map(map.clone())?;
        self.pending = ParticleArray::new(map);
        self.pending_cursor = 0;
        Ok(())
    }

    fn get_particles(
        &mut self,
        out: &mut ParticleArray,
        count: &mut usize,
    ) -> ParticleResult<bool> {
        let want = *count;
        let mut got = 0;
        let empty = DefaultValues::new();
        loop {
            if self.pending_cursor < self.pending.len() {
                let pos = self.pending.f32_column(names::POSITION, 3)?;
                while self.pending_cursor < self.pending.len() && got < want {
                    let i = self.pending_cursor;
                    let p = Vec3::new(pos[3 * i], pos[3 * i + 1], pos[3 * i + 2]);
                    if !p.is_finite() || self.bounds.contains(p) {
                        out.push_from(&self.pending, i, &empty);
                        got += 1;
                    }
                    self.pending_cursor += 1;
                }
            }
            if got == want {
                *count = got;
                return Ok(true);
            }
            if self.inner_done {
                *count = got;
                return Ok(false);
            }
            self.refill()?;
        }
    }
}
