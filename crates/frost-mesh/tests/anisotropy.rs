use frost_geom::Vec3;
use frost_mesh::anisotropy::{AnisotropyParams, estimate};
use frost_runtime::{BuildProgress, CancelToken, NullProgress, WorkerPool};

fn params(smoothing: bool) -> AnisotropyParams {
    AnisotropyParams {
        compact_support_scale: 4.0,
        window_scale: 2.0,
        max_anisotropy: 4.0,
        min_neighbor_count: 25,
        position_smoothing: smoothing,
        smoothing_window_scale: 2.0,
        smoothing_weight: 0.9,
    }
}

// 11 x 11 particles spaced 0.5 apart in the z = 0 plane.
fn sheet() -> Vec<Vec3> {
    let mut out = Vec::new();
    for j in 0..11 {
        for i in 0..11 {
            out.push(Vec3::new(i as f32 * 0.5, j as f32 * 0.5, 0.0));
        }
    }
    out
}

fn approx(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() <= tol * b.abs().max(1.0)
}

#[test]
fn flat_neighbourhood_is_clamped_to_max_anisotropy() {
    let _ = env_logger::builder().is_test(true).try_init();
    let pool = WorkerPool::new(2).unwrap();
    let progress = BuildProgress::new(&NullProgress, CancelToken::new());
    let positions = sheet();
    let radii = vec![0.25; positions.len()];
    let out = estimate(&positions, &radii, &params(false), &pool, &progress, (10.0, 40.0)).unwrap();
    assert_eq!(out.records.len(), positions.len());
    assert_eq!(out.positions, positions);
    assert!(progress.reported() >= 40.0);

    let center = &out.records[60];
    let e = center.g.eigen();
    assert!(approx(e.values[0] / e.values[2], 4.0, 1e-2), "{:?}", e.values);
    assert!(e.vectors.column(0).z.abs() > 0.99);
    // unit-determinant stretch: det g = 1 / h³ with h = 4 * 0.25
    assert!(approx(center.det, 1.0, 1e-3));
    assert!(approx(center.g.det(), 1.0, 1e-3));
    assert!(approx(center.extent, 4f32.cbrt(), 1e-2));
    assert!(out.records.iter().all(|r| r.volume > 0.0 && r.volume.is_finite()));
}

#[test]
fn sparse_neighbourhood_falls_back_to_isotropic() {
    let pool = WorkerPool::new(1).unwrap();
    let progress = BuildProgress::new(&NullProgress, CancelToken::new());
    let positions = vec![Vec3::ZERO, Vec3::X * 0.3, Vec3::Y * 0.3];
    let out = estimate(&positions, &[0.5; 3], &params(true), &pool, &progress, (10.0, 40.0)).unwrap();
    for r in &out.records {
        let g = r.g.0;
        assert!(approx(g[0], 0.5, 1e-6) && approx(g[3], 0.5, 1e-6) && approx(g[5], 0.5, 1e-6));
        assert_eq!([g[1], g[2], g[4]], [0.0; 3]);
        assert!(approx(r.det, 0.125, 1e-6));
        assert_eq!(r.extent, 2.0);
    }
}

#[test]
fn smoothing_pulls_edges_inward_and_keeps_symmetric_points() {
    let pool = WorkerPool::new(2).unwrap();
    let progress = BuildProgress::new(&NullProgress, CancelToken::new());
    let positions = sheet();
    let radii = vec![0.25; positions.len()];
    let out = estimate(&positions, &radii, &params(true), &pool, &progress, (10.0, 40.0)).unwrap();
    let corner = out.positions[0];
    assert!(corner.x > 0.0 && corner.y > 0.0);
    assert!(out.positions[60].distance(positions[60]) < 1e-4);
    assert!(out.positions.iter().all(|p| p.z == 0.0));
}

#[test]
fn invalid_parameters_are_rejected() {
    let mut p = params(false);
    p.max_anisotropy = 0.5;
    assert!(p.validate().is_err());
    let mut p = params(true);
    p.smoothing_weight = 1.5;
    assert!(p.validate().is_err());
    let mut p = params(true);
    p.smoothing_weight = 0.005;
    assert!(p.validate().is_ok());
    assert!(!p.smoothing_active());
}

#[test]
fn cancellation_stops_estimation() {
    let pool = WorkerPool::new(2).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let progress = BuildProgress::new(&NullProgress, cancel);
    let positions = sheet();
    let err = estimate(&positions, &vec![0.25; positions.len()], &params(false), &pool, &progress, (10.0, 40.0))
        .unwrap_err();
    assert!(err.is_cancelled());
}
