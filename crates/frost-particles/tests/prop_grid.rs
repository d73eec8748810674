use frost_geom::Vec3;
use frost_particles::{ParticleError, ParticleGrid};
use proptest::prelude::*;

fn arb_vec3(range: f32) -> impl Strategy<Value = Vec3> {
    (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

#[test]
fn rejects_bad_voxel_lengths() {
    for vl in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        assert!(matches!(
            ParticleGrid::new(vl),
            Err(ParticleError::InvalidVoxelLength(_))
        ));
    }
}

#[test]
fn empty_grid_has_empty_bounds_and_no_hits() {
    let g = ParticleGrid::new(1.0).unwrap();
    assert!(g.compute_bounds().is_empty());
    assert_eq!(g.query_sphere(Vec3::ZERO, 100.0).count(), 0);
}

#[test]
fn query_boundary_is_inclusive() {
    let mut g = ParticleGrid::new(0.5).unwrap();
    g.insert(7, Vec3::new(2.0, 0.0, 0.0));
    let hits: Vec<u32> = g.query_sphere(Vec3::ZERO, 2.0).map(|e| e.index).collect();
    assert_eq!(hits, vec![7]);
    assert_eq!(g.query_sphere(Vec3::ZERO, 1.99).count(), 0);
}

proptest! {
    // The voxel walk finds exactly the brute-force neighbour set.
    #[test]
    fn sphere_query_matches_brute_force(
        pts in proptest::collection::vec(arb_vec3(20.0), 0..200),
        center in arb_vec3(25.0),
        radius in 0.0f32..12.0,
        vl in 0.3f32..6.0,
    ) {
        let g = ParticleGrid::from_positions(vl, &pts).unwrap();
        let mut got: Vec<u32> = g.query_sphere(center, radius).map(|e| e.index).collect();
        got.sort_unstable();
        let mut cb: Vec<u32> = Vec::new();
        g.for_each_in_sphere(center, radius, |e, _| cb.push(e.index));
        cb.sort_unstable();
        let want: Vec<u32> = pts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.distance_squared(center) <= radius * radius)
            .map(|(i, _)| i as u32)
            .collect();
        prop_assert_eq!(&got, &want);
        prop_assert_eq!(&cb, &want);
    }

    #[test]
    fn bounds_are_tight(pts in proptest::collection::vec(arb_vec3(50.0), 1..64)) {
        let g = ParticleGrid::from_positions(1.0, &pts).unwrap();
        let b = g.compute_bounds();
        for p in &pts {
            prop_assert!(b.contains(*p));
        }
        prop_assert!(pts.iter().any(|p| p.x == b.min.x));
        prop_assert!(pts.iter().any(|p| p.z == b.max.z));
    }
}
