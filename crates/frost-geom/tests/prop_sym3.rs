use frost_geom::{Sym3, Vec3};
use proptest::prelude::*;

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn arb_sym3() -> impl Strategy<Value = Sym3> {
    proptest::array::uniform6(-10.0f32..10.0).prop_map(Sym3)
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (-5.0f32..5.0, -5.0f32..5.0, -5.0f32..5.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    // V diag(λ) Vᵀ reproduces the input
    #[test]
    fn eigen_reconstructs(m in arb_sym3()) {
        let e = m.eigen();
        let r = Sym3::from_eigen(e.values, &e.vectors);
        for k in 0..6 {
            prop_assert!(approx(r.0[k], m.0[k], 1e-3), "k={} {:?} vs {:?}", k, r, m);
        }
    }

    #[test]
    fn eigenvalues_sorted_descending(m in arb_sym3()) {
        let e = m.eigen();
        prop_assert!(e.values[0] >= e.values[1]);
        prop_assert!(e.values[1] >= e.values[2]);
    }

    #[test]
    fn eigenvectors_orthonormal(m in arb_sym3()) {
        let e = m.eigen();
        for i in 0..3 {
            let ci = e.vectors.column(i);
            prop_assert!(approx(ci.length(), 1.0, 1e-4));
            for j in (i + 1)..3 {
                prop_assert!(approx(ci.dot(e.vectors.column(j)), 0.0, 1e-4));
            }
        }
    }

    // det equals the product of eigenvalues
    #[test]
    fn det_matches_eigen_product(m in arb_sym3()) {
        let e = m.eigen();
        let prod = e.values[0] * e.values[1] * e.values[2];
        let scale = 1.0 + prod.abs();
        prop_assert!(approx(m.det(), prod, 2e-2 * scale));
    }

    #[test]
    fn mul_vec_is_linear(m in arb_sym3(), a in arb_vec3(), b in arb_vec3()) {
        let lhs = m.mul_vec(a + b);
        let rhs = m.mul_vec(a) + m.mul_vec(b);
        prop_assert!(approx(lhs.x, rhs.x, 1e-3));
        prop_assert!(approx(lhs.y, rhs.y, 1e-3));
        prop_assert!(approx(lhs.z, rhs.z, 1e-3));
    }
}
