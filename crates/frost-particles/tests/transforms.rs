use frost_particles::channels::{ChannelData, ChannelMap, DataType, names};
use frost_particles::transforms::{
    LoadMode, RadiusAnimationMode, ScaleCurve, animate_radius, apply_load_fraction,
    discard_invalid, ensure_ids, hashword, id_randomized_radius, randomize_radius,
};
use frost_particles::ParticleArray;
use proptest::prelude::*;

fn particles(pos: Vec<f32>, radius: Vec<f32>) -> ParticleArray {
    let map = ChannelMap::new()
        .with(names::POSITION, DataType::Float32, 3)
        .with(names::RADIUS, DataType::Float32, 1);
    ParticleArray::from_columns(map, vec![ChannelData::F32(pos), ChannelData::F32(radius)])
        .unwrap()
}

#[test]
fn hashword_of_nothing_is_the_seed_constant() {
    assert_eq!(hashword(&[], 0), 0xdeadbeef);
    assert_ne!(hashword(&[1], 0), hashword(&[2], 0));
    assert_ne!(hashword(&[1], 0), hashword(&[1], 1));
}

// Word-aligned keys hash like lookup3 `hashlittle` over their little-endian bytes.
#[test]
fn hashword_matches_lookup3_reference_values() {
    assert_eq!(hashword(&[0], 0), 0x0493_96b8);
    assert_eq!(hashword(&[1], 0), 0x72a8_2a9b);
    assert_eq!(hashword(&[1], 12345), 0xe11c_4a47);
    assert_eq!(hashword(&[42], 7), 0x56ee_08a6);
    assert_eq!(hashword(&[1, 2, 3], 0), 0xa461_58f5);
    assert_eq!(hashword(&[1, 2, 3, 4], 0), 0x6649_1246);
}

#[test]
fn discard_invalid_counts_every_bad_particle() {
    let mut p = particles(
        vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            f32::NAN, 0.0, 0.0, //
            0.0, f32::INFINITY, 0.0, //
            2.0, 0.0, 0.0, //
            3.0, 0.0, 0.0,
        ],
        vec![1.0, 0.0, 1.0, 1.0, -2.0, f32::NAN],
    );
    let removed = discard_invalid(&mut p).unwrap();
    assert_eq!(removed, 5);
    assert_eq!(p.len(), 1);
    assert_eq!(p.radii().unwrap(), &[1.0]);
}

#[test]
fn ids_are_synthesized_only_when_absent() {
    let mut p = particles(vec![0.0; 9], vec![1.0; 3]);
    assert!(ensure_ids(&mut p, 10).unwrap());
    let ids = p.column(names::ID).unwrap();
    assert_eq!((0..3).map(|i| ids.get_i64(i)).collect::<Vec<_>>(), vec![10, 11, 12]);
    assert!(!ensure_ids(&mut p, 0).unwrap());
}

#[test]
fn head_and_stride_fractions() {
    let mut head = particles(vec![0.0; 30], vec![1.0; 10]);
    assert_eq!(apply_load_fraction(&mut head, LoadMode::Head, 0.3).unwrap(), 7);
    assert_eq!(head.len(), 3);

    let mut stride = particles(vec![0.0; 30], vec![1.0; 10]);
    apply_load_fraction(&mut stride, LoadMode::Stride, 0.5).unwrap();
    assert_eq!(stride.len(), 5);

    let mut full = particles(vec![0.0; 30], vec![1.0; 10]);
    assert_eq!(apply_load_fraction(&mut full, LoadMode::Head, 1.0).unwrap(), 0);
}

#[test]
fn id_fraction_requires_ids() {
    let mut p = particles(vec![0.0; 3], vec![1.0]);
    assert!(apply_load_fraction(&mut p, LoadMode::Id, 0.5).is_err());
}

#[test]
fn life_percent_animation_uses_age_over_lifespan() {
    let map = ChannelMap::new()
        .with(names::POSITION, DataType::Float32, 3)
        .with(names::RADIUS, DataType::Float32, 1)
        .with(names::AGE, DataType::Float32, 1)
        .with(names::LIFE_SPAN, DataType::Float32, 1);
    let mut p = ParticleArray::from_columns(
        map,
        vec![
            ChannelData::F32(vec![0.0; 6]),
            ChannelData::F32(vec![2.0, 2.0]),
            ChannelData::F32(vec![5.0, 10.0]),
            ChannelData::F32(vec![10.0, 10.0]),
        ],
    )
    .unwrap();
    let curve = ScaleCurve {
        keys: vec![(0.0, 1.0), (100.0, 0.0)],
    };
    animate_radius(&mut p, RadiusAnimationMode::LifePercent, &curve, 0.0).unwrap();
    let r = p.radii().unwrap();
    assert!((r[0] - 1.0).abs() < 1e-6);
    assert!(r[1].abs() < 1e-6);
}

#[test]
fn randomize_needs_ids() {
    let mut p = particles(vec![0.0; 3], vec![1.0]);
    assert!(randomize_radius(&mut p, 0.4, 12345).is_err());
    ensure_ids(&mut p, 0).unwrap();
    randomize_radius(&mut p, 0.4, 12345).unwrap();
    assert!(p.radii().unwrap()[0] <= 1.0);
}

proptest! {
    // Randomization only ever shrinks, and never below (1 - variation) * r.
    #[test]
    fn randomized_radius_within_variation(id in any::<i32>(), seed in any::<u32>(), r in 0.01f32..100.0, v in 0.0f32..1.0) {
        let out = id_randomized_radius(id, r, v, seed);
        prop_assert!(out <= r * (1.0 + 1e-6));
        prop_assert!(out >= r * (1.0 - v) * (1.0 - 1e-6));
    }

    #[test]
    fn curve_sample_is_clamped(x in -1e3f32..1e3) {
        let c = ScaleCurve { keys: vec![(0.0, 0.5), (10.0, 2.0)] };
        let y = c.sample(x);
        prop_assert!((0.5..=2.0).contains(&y));
    }
}
