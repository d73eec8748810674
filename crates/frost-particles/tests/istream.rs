use frost_geom::{Aabb, Vec3};
use frost_particles::channels::{ChannelData, ChannelMap, DataType, names};
use frost_particles::{BoxCullingIstream, ParticleArray, ParticleError, ParticleIstream, VecParticleIstream};

fn source(points: &[[f32; 3]]) -> ParticleArray {
    let map = ChannelMap::new().with(names::POSITION, DataType::Float32, 3);
    let flat: Vec<f32> = points.iter().flatten().copied().collect();
    ParticleArray::from_columns(map, vec![ChannelData::F32(flat)]).unwrap()
}

#[test]
fn missing_requested_channels_come_from_defaults() {
    let arr = source(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let mut s = VecParticleIstream::new(arr).with_default(names::RADIUS, vec![0.25]);
    let req = ChannelMap::new()
        .with(names::POSITION, DataType::Float32, 3)
        .with(names::RADIUS, DataType::Float32, 1)
        .with(names::VELOCITY, DataType::Float32, 3);
    s.set_channel_map(req.clone()).unwrap();
    assert!(!s.native_channel_map().has(names::RADIUS));

    let mut out = ParticleArray::new(req);
    let mut n = 10;
    let more = s.get_particles(&mut out, &mut n).unwrap();
    assert!(!more);
    assert_eq!(n, 2);
    assert_eq!(out.radii().unwrap(), &[0.25, 0.25]);
    assert_eq!(out.f32_column(names::VELOCITY, 3).unwrap(), &[0.0; 6]);
    assert_eq!(out.positions().unwrap()[1], Vec3::new(4.0, 5.0, 6.0));
}

#[test]
fn arity_mismatch_is_rejected() {
    let arr = source(&[[0.0; 3]]);
    let mut s = VecParticleIstream::new(arr);
    let bad = ChannelMap::new().with(names::POSITION, DataType::Float32, 2);
    assert!(matches!(
        s.set_channel_map(bad),
        Err(ParticleError::ChannelArity { .. })
    ));
}

#[test]
fn single_particle_pull_ends_with_false() {
    let arr = source(&[[0.0; 3]]);
    let map = arr.channel_map().clone();
    let mut s = VecParticleIstream::new(arr);
    let mut out = ParticleArray::new(map);
    assert!(s.get_particle(&mut out).unwrap());
    assert!(!s.get_particle(&mut out).unwrap());
    assert_eq!(out.len(), 1);
}

#[test]
fn box_culling_keeps_only_inside() {
    let pts: Vec<[f32; 3]> = (0..10_000).map(|i| [i as f32 * 0.01, 0.0, 0.0]).collect();
    let arr = source(&pts);
    let map = arr.channel_map().clone();
    let inner = VecParticleIstream::new(arr);
    let bounds = Aabb::new(Vec3::new(10.0, -1.0, -1.0), Vec3::new(20.0, 1.0, 1.0));
    let mut s = BoxCullingIstream::new(inner, bounds).unwrap();
    let mut out = ParticleArray::new(map);
    loop {
        let mut n = 333;
        if !s.get_particles(&mut out, &mut n).unwrap() {
            break;
        }
        assert_eq!(n, 333);
    }
    let pos = out.positions().unwrap();
    assert!(pos.iter().all(|p| bounds.contains(*p)));
    let expected = pts
        .iter()
        .filter(|p| bounds.contains(Vec3::from_array(**p)))
        .count();
    assert_eq!(pos.len(), expected);
}

#[test]
fn box_culling_passes_non_finite_positions_through() {
    let arr = source(&[
        [0.0, 0.0, 0.0],
        [f32::NAN, 0.0, 0.0],
        [50.0, 0.0, 0.0],
        [f32::INFINITY, 0.0, 0.0],
    ]);
    let map = arr.channel_map().clone();
    let bounds = Aabb::new(Vec3::new(-10.0, -10.0, -10.0), Vec3::new(10.0, 10.0, 10.0));
    let mut s = BoxCullingIstream::new(VecParticleIstream::new(arr), bounds).unwrap();
    let mut out = ParticleArray::new(map);
    let mut n = 16;
    assert!(!s.get_particles(&mut out, &mut n).unwrap());
    assert_eq!(n, 3);
    let pos = out.positions().unwrap();
    assert_eq!(pos[0], Vec3::new(0.0, 0.0, 0.0));
    assert!(pos[1].x.is_nan());
    assert_eq!(pos[2].x, f32::INFINITY);
}
