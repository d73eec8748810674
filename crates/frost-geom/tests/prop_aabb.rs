use frost_geom::{Aabb, Vec3};
use proptest::prelude::*;

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (-1e4f32..1e4, -1e4f32..1e4, -1e4f32..1e4).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    // from_points contains every input point
    #[test]
    fn bounds_contain_points(pts in proptest::collection::vec(arb_vec3(), 1..32)) {
        let b = Aabb::from_points(pts.iter().copied());
        prop_assert!(!b.is_empty());
        for p in pts {
            prop_assert!(b.contains(p));
        }
    }

    #[test]
    fn union_contains_both(a in arb_vec3(), b in arb_vec3(), c in arb_vec3(), d in arb_vec3()) {
        let x = Aabb::from_points([a, b]);
        let y = Aabb::from_points([c, d]);
        let u = x.union(&y);
        for p in [a, b, c, d] {
            prop_assert!(u.contains(p));
        }
    }

    // expansion never removes a point and grows the size by 2d
    #[test]
    fn expansion_grows(a in arb_vec3(), b in arb_vec3(), d in 0.0f32..100.0) {
        let x = Aabb::from_points([a, b]);
        let e = x.expanded(d);
        prop_assert!(e.contains(a) && e.contains(b));
        let grow = e.size() - x.size();
        prop_assert!((grow.x - 2.0 * d).abs() <= 1e-2);
    }
}
