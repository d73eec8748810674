use crate::{Mat3, Vec3};

/// Symmetric 3x3 matrix stored as `[xx, xy, xz, yy, yz, zz]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sym3(pub [f32; 6]);

/// Eigenvalues sorted descending with matching unit eigenvectors (columns).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Eigen3 {
    pub values: [f32; 3],
    pub vectors: Mat3,
}

const JACOBI_MAX_SWEEPS: usize = 32;

impl Sym3 {
    pub const ZERO: Sym3 = Sym3([0.0; 6]);
    pub const IDENTITY: Sym3 = Sym3([1.0, 0.0, 0.0, 1.0, 0.0, 1.0]);

    #[inline]
    pub fn scaled_identity(s: f32) -> Sym3 {
        Sym3([s, 0.0, 0.0, s, 0.0, s])
    }

    /// `self += w * v vᵀ`
    #[inline]
    pub fn add_outer(&mut self, v: Vec3, w: f32) {
        let m = &mut self.0;
        m[0] += w * v.x * v.x;
        m[1] += w * v.x * v.y;
        m[2] += w * v.x * v.z;
        m[3] += w * v.y * v.y;
        m[4] += w * v.y * v.z;
        m[5] += w * v.z * v.z;
    }

    #[inline]
    pub fn scale(&self, s: f32) -> Sym3 {
        Sym3(self.0.map(|v| v * s))
    }

    #[inline]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        let m = &self.0;
        Vec3::new(
            m[0] * v.x + m[1] * v.y + m[2] * v.z,
            m[1] * v.x + m[3] * v.y + m[4] * v.z,
            m[2] * v.x + m[4] * v.y + m[5] * v.z,
        )
    }

    #[inline]
    pub fn det(&self) -> f32 {
        let [a, b, c, d, e, f] = self.0;
        a * (d * f - e * e) - b * (b * f - e * c) + c * (b * e - d * c)
    }

    /// Builds `V diag(values) Vᵀ`.
    pub fn from_eigen(values: [f32; 3], vectors: &Mat3) -> Sym3 {
        let mut out = Sym3::ZERO;
        for k in 0..3 {
            out.add_outer(vectors.column(k), values[k]);
        }
        out
    }

    /// Cyclic Jacobi rotation; accumulates in f64.
    pub fn eigen(&self) -> Eigen3 {
        let [xx, xy, xz, yy, yz, zz] = self.0.map(f64::from);
        let mut a = [[xx, xy, xz], [xy, yy, yz], [xz, yz, zz]];
        let mut v = [[1.0f64, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        for _ in 0..JACOBI_MAX_SWEEPS {
            let off = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
            if off < 1e-24 {
                break;
            }
            for (p, q) in [(0usize, 1usize), (0, 2), (1, 2)] {
                if a[p][q].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..3 {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..3 {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let vp = row[p];
                    let vq = row[q];
                    row[p] = c * vp - s * vq;
                    row[q] = s * vp + c * vq;
                }
            }
        }
        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| a[j][j].total_cmp(&a[i][i]));
        let values = order.map(|i| a[i][i] as f32);
        let cols = order.map(|i| Vec3::new(v[0][i] as f32, v[1][i] as f32, v[2][i] as f32));
        Eigen3 {
            values,
            vectors: Mat3::from_columns(cols[0], cols[1], cols[2]),
        }
    }
}
