use frost_geom::Vec3;
use frost_mesh::ImplicitField;
use frost_mesh::anisotropy::{Anisotropy, AnisotropyParams, AnisotropyRecord};
use frost_mesh::kernels::{
    AnisotropicField, MetaballField, UnionOfSpheresField, ZhuBridsonField, ZhuBridsonParams,
    union_effect_radius_scale,
};
use proptest::prelude::*;

fn zhu(trimming: bool) -> ZhuBridsonParams {
    ZhuBridsonParams {
        blend_radius_scale: 1.7,
        low_density_trimming: trimming,
        trimming_threshold: 1.0,
        trimming_strength: 15.0,
    }
}

proptest! {
    // The zero crossing sits at the sphere radius whatever the search radius.
    #[test]
    fn union_crossing_ignores_search_scale(r in 0.1f32..5.0, s in 1.0f32..4.0, dir in 0usize..3) {
        let field = UnionOfSpheresField::with_search_radius(vec![Vec3::ZERO], vec![r], s * r).unwrap();
        let eps = 1e-3 * r;
        let axis = [Vec3::X, Vec3::Y, Vec3::Z][dir];
        prop_assert!(field.eval(axis * (r - eps)) < 0.0);
        prop_assert!(field.eval(axis * (r + eps)) > 0.0);
    }
}

#[test]
fn union_scale_tightens_with_fine_voxels() {
    assert_eq!(union_effect_radius_scale(10.0, 1.0), 2.0);
    assert!((union_effect_radius_scale(0.05, 1.0) - 1.1).abs() < 1e-6);
    assert_eq!(union_effect_radius_scale(0.1, 0.0), 2.0);
}

#[test]
fn union_far_from_particles_is_outside() {
    let field = UnionOfSpheresField::new(vec![Vec3::ZERO], vec![1.0], 0.5).unwrap();
    let v = field.eval(Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(v, field.outside_value());
    assert!(v > 0.0);
}

#[test]
fn metaball_threshold_and_empty_neighbourhood() {
    let field = MetaballField::new(vec![Vec3::ZERO], vec![1.0], 2.0, 0.5).unwrap();
    // (1 - t²)³ = 0.5 at t² = 1 - 0.5^(1/3)
    let t = (1.0f32 - 0.5f32.cbrt()).sqrt() * 2.0;
    assert!(field.eval(Vec3::X * (t - 0.01)) < 0.0);
    assert!(field.eval(Vec3::X * (t + 0.01)) > 0.0);
    assert_eq!(field.eval(Vec3::new(0.0, 5.0, 0.0)), 0.5);
    assert!(MetaballField::new(vec![Vec3::ZERO], vec![1.0], 0.0, 0.5).is_err());
}

#[test]
fn zhu_bridson_single_particle_is_a_sphere() {
    let field = ZhuBridsonField::new(vec![Vec3::ZERO], vec![1.0], zhu(false)).unwrap();
    assert!(field.eval(Vec3::X * 0.99) < 0.0);
    assert!(field.eval(Vec3::X * 1.01) > 0.0);
    assert_eq!(field.eval(Vec3::X * 5.0), field.outside_value());
}

#[test]
fn zhu_bridson_rejects_blend_scales_that_clip_the_sphere() {
    for scale in [0.5, 1.0, f32::NAN] {
        let params = ZhuBridsonParams {
            blend_radius_scale: scale,
            ..zhu(false)
        };
        assert!(ZhuBridsonField::new(vec![Vec3::ZERO], vec![1.0], params).is_err(), "{scale}");
    }
    let lowest = ZhuBridsonParams {
        blend_radius_scale: 1.1,
        ..zhu(false)
    };
    let field = ZhuBridsonField::new(vec![Vec3::ZERO], vec![1.0], lowest).unwrap();
    assert!(field.eval(Vec3::X * 0.99) < 0.0);
    assert!(field.eval(Vec3::X * 1.01) > 0.0);
}

#[test]
fn zhu_bridson_trimming_only_pushes_outward() {
    let plain = ZhuBridsonField::new(vec![Vec3::ZERO], vec![1.0], zhu(false)).unwrap();
    let trimmed = ZhuBridsonField::new(vec![Vec3::ZERO], vec![1.0], zhu(true)).unwrap();
    let p = Vec3::X * 0.9;
    assert!(trimmed.eval(p) > plain.eval(p));
    assert!(trimmed.eval(Vec3::ZERO) >= plain.eval(Vec3::ZERO));
}

#[test]
fn weights_come_from_nearby_particles() {
    let field = MetaballField::new(
        vec![Vec3::ZERO, Vec3::X * 0.5, Vec3::X * 40.0],
        vec![1.0; 3],
        1.5,
        0.3,
    )
    .unwrap();
    let mut seen = Vec::new();
    field.for_each_weight(Vec3::X * 0.25, &mut |i, w| {
        assert!(w > 0.0);
        seen.push(i);
    });
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1]);
}

#[test]
fn isotropic_anisotropic_kernel_has_known_crossing() {
    let params = AnisotropyParams {
        compact_support_scale: 4.0,
        window_scale: 2.0,
        max_anisotropy: 4.0,
        min_neighbor_count: 25,
        position_smoothing: false,
        smoothing_window_scale: 2.0,
        smoothing_weight: 0.9,
    };
    let h = 4.0f32 * 0.5;
    let record = AnisotropyRecord {
        g: frost_geom::Sym3::scaled_identity(1.0 / h),
        det: 1.0 / (h * h * h),
        extent: h,
        volume: h * h * h / (315.0 / (64.0 * std::f32::consts::PI)),
    };
    let aniso = Anisotropy {
        positions: vec![Vec3::ZERO],
        records: vec![record],
    };
    let field = AnisotropicField::new(aniso, vec![0.5], &params, 0.5).unwrap();
    assert!((field.eval(Vec3::ZERO) + 0.5).abs() < 1e-4);
    let t = (1.0f32 - 0.5f32.cbrt()).sqrt() * h;
    assert!(field.eval(Vec3::Y * (t - 0.01)) < 0.0);
    assert!(field.eval(Vec3::Y * (t + 0.01)) > 0.0);
    assert_eq!(field.eval(Vec3::Y * 3.0), 0.5);
    assert_eq!(field.support_radius(), h);
}
