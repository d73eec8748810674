//! Uniform voxel hash of particle positions for radius-bounded neighbour queries.

use frost_geom::{Aabb, Vec3};
use hashbrown::HashMap;

use crate::error::{ParticleError, ParticleResult};

/// One indexed particle: its index in the caller's arrays and its position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridEntry {
    pub index: u32,
    pub position: Vec3,
}

/// Particles bucketed into cubic voxels of side `voxel_length`.
#[derive(Clone, Debug)]
pub struct ParticleGrid {
    voxel_length: f32,
    inv_voxel_length: f32,
    buckets: HashMap<[i32; 3], Vec<GridEntry>>,
    bounds: Aabb,
    len: usize,
}

impl ParticleGrid {
    pub fn new(voxel_length: f32) -> ParticleResult<Self> {
        if !voxel_length.is_finite() || voxel_length <= 0.0 {
            return Err(ParticleError::InvalidVoxelLength(voxel_length));
        }
        Ok(Self {
            voxel_length,
            inv_voxel_length: 1.0 / voxel_length,
            buckets: HashMap::new(),
            bounds: Aabb::empty(),
            len: 0,
        })
    }

    /// Indexes `positions[i]` under index `i`.
    pub fn from_positions(voxel_length: f32, positions: &[Vec3]) -> ParticleResult<Self> {
        let mut grid = Self::new(voxel_length)?;
        for (i, &p) in positions.iter().enumerate() {
            grid.insert(i as u32, p);
        }
        Ok(grid)
    }

    #[inline]
    pub fn voxel_length(&self) -> f32 {
        self.voxel_length
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn cell_of(&self, p: Vec3) -> [i32; 3] {
        let q = p * self.inv_voxel_length;
        [q.x.floor() as i32, q.y.floor() as i32, q.z.floor() as i32]
    }

    pub fn insert(&mut self, index: u32, position: Vec3) {
        let key = self.cell_of(position);
        self.buckets
            .entry(key)
            .or_default()
            .push(GridEntry { index, position });
        self.bounds.include_point(position);
        self.len += 1;
    }

    /// Tight bounds of all inserted positions; empty when nothing was inserted.
    #[inline]
    pub fn compute_bounds(&self) -> Aabb {
        self.bounds
    }

    fn cell_range(&self, lo: Vec3, hi: Vec3) -> ([i32; 3], [i32; 3]) {
        (self.cell_of(lo), self.cell_of(hi))
    }

    /// Entries within `radius` of `center` (inclusive), visiting only overlapped voxels.
    pub fn query_sphere(&self, center: Vec3, radius: f32) -> SphereQuery<'_> {
        let r = radius.max(0.0);
        let (lo, hi) = self.cell_range(center - Vec3::splat(r), center + Vec3::splat(r));
        SphereQuery {
            grid: self,
            center,
            radius_sq: r * r,
            lo,
            hi,
            cell: lo,
            bucket: &[],
            done: self.is_empty() || !center.is_finite() || !r.is_finite(),
        }
    }

    /// Callback form of [`ParticleGrid::query_sphere`]; passes the squared distance too.
    #[inline]
    pub fn for_each_in_sphere<F: FnMut(&GridEntry, f32)>(&self, center: Vec3, radius: f32, mut f: F) {
        let r = radius.max(0.0);
        if self.is_empty() || !center.is_finite() || !r.is_finite() {
            return;
        }
        let r2 = r * r;
        let (lo, hi) = self.cell_range(center - Vec3::splat(r), center + Vec3::splat(r));
        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    let Some(bucket) = self.buckets.get(&[x, y, z]) else {
                        continue;
                    };
                    for e in bucket {
                        let d2 = e.position.distance_squared(center);
                        if d2 <= r2 {
                            f(e, d2);
                        }
                    }
                }
            }
        }
    }

    /// Whether any indexed position lies within `margin` of `bounds`.
    pub fn any_near_box(&self, bounds: &Aabb, margin: f32) -> bool {
        if self.is_empty() || bounds.is_empty() {
            return false;
        }
        let grown = bounds.expanded(margin);
        let (lo, hi) = self.cell_range(grown.min, grown.max);
        let span = (0..3)
            .map(|a| (i64::from(hi[a]) - i64::from(lo[a]) + 1) as u64)
            .fold(1u64, u64::saturating_mul);
        let m2 = margin * margin;
        let hit = |e: &GridEntry| bounds.distance_squared_to(e.position) <= m2;
        if span > self.buckets.len() as u64 {
            return self.buckets.iter().any(|(k, b)| {
                (0..3).all(|a| k[a] >= lo[a] && k[a] <= hi[a]) && b.iter().any(hit)
            });
        }
        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    if let Some(b) = self.buckets.get(&[x, y, z]) {
                        if b.iter().any(hit) {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

/// Iterator returned by [`ParticleGrid::query_sphere`].
pub struct SphereQuery<'a> {
    grid: &'a ParticleGrid,
    center: Vec3,
    radius_sq: f32,
    lo: [i32; 3],
    hi: [i32; 3],
    cell: [i32; 3],
    bucket: &'a [GridEntry],
    done: bool,
}

impl SphereQuery<'_> {
    fn advance_cell(&mut self) {
        self.cell[0] += 1;
        if self.cell[0] > self.hi[0] {
            self.cell[0] = self.lo[0];
            self.cell[1] += 1;
            if self.cell[1] > self.hi[1] {
                self.cell[1] = self.lo[1];
                self.cell[2] += 1;
                if self.cell[2] > self.hi[2] {
                    self.done = true;
                }
            }
        }
    }
}

impl<'a> Iterator for SphereQuery<'a> {
    type Item = &'a GridEntry;

    fn next(&mut self) -> Option<&'a GridEntry> {
        loop {
            while let Some((first, rest)) = self.bucket.split_first() {
                self.bucket = rest;
                if first.position.distance_squared(self.center) <= self.radius_sq {
                    return Some(first);
                }
            }
            if self.done {
                return None;
            }
            let grid = self.grid;
            self.bucket = grid
                .buckets
                .get(&self.cell)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            self.advance_cell();
        }
    }
}
