use crate::Vec3;

/// Row-major 3x3 matrix, used for rotations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3 {
    pub rows: [[f32; 3]; 3],
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3 {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn from_columns(c0: Vec3, c1: Vec3, c2: Vec3) -> Mat3 {
        Mat3 {
            rows: [[c0.x, c1.x, c2.x], [c0.y, c1.y, c2.y], [c0.z, c1.z, c2.z]],
        }
    }

    #[inline]
    pub fn column(&self, k: usize) -> Vec3 {
        Vec3::new(self.rows[0][k], self.rows[1][k], self.rows[2][k])
    }

    #[inline]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        let r = &self.rows;
        Vec3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }

    pub fn mul(&self, rhs: &Mat3) -> Mat3 {
        let mut rows = [[0.0f32; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.rows[i][k] * rhs.rows[k][j]).sum();
            }
        }
        Mat3 { rows }
    }

    pub fn transpose(&self) -> Mat3 {
        Mat3::from_columns(
            Vec3::from_array(self.rows[0]),
            Vec3::from_array(self.rows[1]),
            Vec3::from_array(self.rows[2]),
        )
    }

    /// Rotation from a quaternion `[x, y, z, w]`; normalizes first.
    pub fn from_quat(q: [f32; 4]) -> Mat3 {
        let n = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
        if !n.is_finite() || n <= 0.0 {
            return Mat3::IDENTITY;
        }
        let [x, y, z, w] = q.map(|c| c / n);
        Mat3 {
            rows: [
                [
                    1.0 - 2.0 * (y * y + z * z),
                    2.0 * (x * y - z * w),
                    2.0 * (x * z + y * w),
                ],
                [
                    2.0 * (x * y + z * w),
                    1.0 - 2.0 * (x * x + z * z),
                    2.0 * (y * z - x * w),
                ],
                [
                    2.0 * (x * z - y * w),
                    2.0 * (y * z + x * w),
                    1.0 - 2.0 * (x * x + y * y),
                ],
            ],
        }
    }

    /// `Rz * Ry * Rx` from angles in radians.
    pub fn from_euler_xyz(rx: f32, ry: f32, rz: f32) -> Mat3 {
        let (sx, cx) = rx.sin_cos();
        let (sy, cy) = ry.sin_cos();
        let (sz, cz) = rz.sin_cos();
        let mx = Mat3 {
            rows: [[1.0, 0.0, 0.0], [0.0, cx, -sx], [0.0, sx, cx]],
        };
        let my = Mat3 {
            rows: [[cy, 0.0, sy], [0.0, 1.0, 0.0], [-sy, 0.0, cy]],
        };
        let mz = Mat3 {
            rows: [[cz, -sz, 0.0], [sz, cz, 0.0], [0.0, 0.0, 1.0]],
        };
        mz.mul(&my).mul(&mx)
    }

    /// Rotation taking +Z onto `dir`. Zero or non-finite `dir` yields identity.
    pub fn align_z(dir: Vec3) -> Mat3 {
        let len = dir.length();
        if !len.is_finite() || len <= 0.0 {
            return Mat3::IDENTITY;
        }
        let z = dir / len;
        let helper = if z.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
        let x = helper.cross(z).normalized();
        let y = z.cross(x);
        Mat3::from_columns(x, y, z)
    }
}
