use crate::{Aabb, Vec3};

/// Maps world space onto an integer voxel lattice of cubic cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelCoordSystem {
    pub origin: Vec3,
    pub voxel_length: f32,
}

/// Half-open range of voxel indices `[min, max)` per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoxelRange {
    pub min: [i32; 3],
    pub max: [i32; 3],
}

impl VoxelRange {
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        [0, 1, 2].map(|a| (self.max[a] - self.min[a]).max(0) as usize)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|a| self.max[a] <= self.min[a])
    }

    #[inline]
    pub fn count(&self) -> u64 {
        let d = self.dims();
        d[0] as u64 * d[1] as u64 * d[2] as u64
    }

    pub fn intersection(&self, other: &VoxelRange) -> VoxelRange {
        VoxelRange {
            min: [0, 1, 2].map(|a| self.min[a].max(other.min[a])),
            max: [0, 1, 2].map(|a| self.max[a].min(other.max[a])),
        }
    }

    #[inline]
    pub fn expanded(&self, n: i32) -> VoxelRange {
        VoxelRange {
            min: self.min.map(|v| v - n),
            max: self.max.map(|v| v + n),
        }
    }
}

impl VoxelCoordSystem {
    #[inline]
    pub const fn new(origin: Vec3, voxel_length: f32) -> Self {
        Self {
            origin,
            voxel_length,
        }
    }

    /// Voxel containing `p`.
    #[inline]
    pub fn voxel_coord(&self, p: Vec3) -> [i32; 3] {
        let q = (p - self.origin) / self.voxel_length;
        [q.x.floor() as i32, q.y.floor() as i32, q.z.floor() as i32]
    }

    #[inline]
    pub fn voxel_corner(&self, ijk: [i32; 3]) -> Vec3 {
        self.origin
            + Vec3::new(ijk[0] as f32, ijk[1] as f32, ijk[2] as f32) * self.voxel_length
    }

    #[inline]
    pub fn voxel_center(&self, ijk: [i32; 3]) -> Vec3 {
        self.origin
            + Vec3::new(
                ijk[0] as f32 + 0.5,
                ijk[1] as f32 + 0.5,
                ijk[2] as f32 + 0.5,
            ) * self.voxel_length
    }

    /// Voxels whose centers lie inside `bounds`.
    pub fn sample_range(&self, bounds: &Aabb) -> VoxelRange {
        if bounds.is_empty() {
            return VoxelRange::default();
        }
        let lo = (bounds.min - self.origin) / self.voxel_length;
        let hi = (bounds.max - self.origin) / self.voxel_length;
        VoxelRange {
            min: [lo.x, lo.y, lo.z].map(|v| (v - 0.5).ceil() as i32),
            max: [hi.x, hi.y, hi.z].map(|v| (v - 0.5).floor() as i32 + 1),
        }
    }

    /// Grows `bounds` outward to the nearest voxel boundaries.
    pub fn snap_outward(&self, bounds: &Aabb) -> Aabb {
        if bounds.is_empty() {
            return *bounds;
        }
        let lo = (bounds.min - self.origin) / self.voxel_length;
        let hi = (bounds.max - self.origin) / self.voxel_length;
        let min = Vec3::new(lo.x.floor(), lo.y.floor(), lo.z.floor());
        let max = Vec3::new(hi.x.ceil(), hi.y.ceil(), hi.z.ceil());
        Aabb::new(
            self.origin + min * self.voxel_length,
            self.origin + max * self.voxel_length,
        )
    }
}
