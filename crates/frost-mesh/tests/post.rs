use frost_geom::{Aabb, Vec3};
use frost_mesh::kernels::MetaballField;
use frost_mesh::post::{
    clamp_faces, cull_to_box, propagate_channels, set_single_material, vote_face_materials,
    vote_material,
};
use frost_mesh::{ExtractSettings, ImplicitField, MeshError, TriMesh, extract_surface};
use frost_particles::{ChannelData, ChannelDesc, ChannelMap, DataType, ParticleArray, names};
use frost_runtime::{BuildProgress, CancelToken, NullProgress, WorkerPool};

fn two_triangles() -> TriMesh {
    let mut m = TriMesh::default();
    for p in [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(50.0, 0.0, 0.0),
        Vec3::new(51.0, 0.0, 0.0),
        Vec3::new(50.0, 1.0, 0.0),
    ] {
        m.push_vertex(p);
    }
    m.push_face([0, 1, 2]);
    m.push_face([3, 4, 5]);
    m
}

#[test]
fn vote_prefers_agreeing_pair_then_first() {
    assert_eq!(vote_material(1, 2, 2), 2);
    assert_eq!(vote_material(1, 2, 3), 1);
    assert_eq!(vote_material(2, 2, 3), 2);
    assert_eq!(vote_material(7u16, 7, 7), 7);
}

#[test]
fn face_materials_are_voted_from_vertices() {
    let mut m = two_triangles();
    m.set_vertex_channel(
        ChannelDesc::new(names::MTL_INDEX, DataType::Int32, 1),
        ChannelData::I32(vec![1, 2, 2, -4, 5, 6]),
    )
    .unwrap();
    vote_face_materials(&mut m, names::MTL_INDEX, 100).unwrap();
    let ids = &m.face_channel(names::MATERIAL_ID).unwrap().data;
    assert_eq!(ids, &ChannelData::U16(vec![2, 100]));
    assert!(matches!(
        vote_face_materials(&mut m, "Missing", 100),
        Err(MeshError::Channel(_))
    ));
}

#[test]
fn single_material_fills_every_face() {
    let mut m = two_triangles();
    set_single_material(&mut m, 3).unwrap();
    assert_eq!(
        m.face_channel(names::MATERIAL_ID).unwrap().data,
        ChannelData::U16(vec![3, 3])
    );
}

#[test]
fn roi_cull_drops_faces_fully_outside_and_compacts() {
    let mut m = two_triangles();
    m.set_vertex_channel(
        ChannelDesc::new("Tag", DataType::Int32, 1),
        ChannelData::I32(vec![0, 1, 2, 3, 4, 5]),
    )
    .unwrap();
    set_single_material(&mut m, 9).unwrap();
    let roi = Aabb::new(Vec3::splat(-0.3), Vec3::splat(0.3));
    let removed = cull_to_box(&mut m, &roi, 0.5);
    assert_eq!(removed, 1);
    assert_eq!(m.face_count(), 1);
    assert_eq!(m.vertex_count(), 3);
    assert_eq!(m.vertex_channel("Tag").unwrap().data, ChannelData::I32(vec![0, 1, 2]));
    assert_eq!(m.face_channel(names::MATERIAL_ID).unwrap().data, ChannelData::U16(vec![9]));
}

#[test]
fn roi_cull_keeps_faces_straddling_the_box() {
    let mut m = two_triangles();
    let roi = Aabb::new(Vec3::new(0.6, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
    assert_eq!(cull_to_box(&mut m, &roi, 0.0), 1);
    assert_eq!(m.face(0), [0, 1, 2]);
}

#[test]
fn roi_cull_filters_point_clouds() {
    let mut m = TriMesh::default();
    for x in 0..10 {
        m.push_vertex(Vec3::new(x as f32, 0.0, 0.0));
    }
    let roi = Aabb::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(3.5, 0.5, 0.5));
    // snapped to [-1, 4] on x; the boundary is inclusive
    assert_eq!(cull_to_box(&mut m, &roi, 1.0), 5);
    assert_eq!(m.vertex_count(), 5);
}

#[test]
fn clamp_truncates_to_limit() {
    let mut m = two_triangles();
    assert_eq!(clamp_faces(&mut m, 5), 0);
    assert_eq!(clamp_faces(&mut m, 1), 1);
    assert_eq!(m.face_count(), 1);
    assert_eq!(m.vertex_count(), 3);
}

fn particles() -> ParticleArray {
    let map = ChannelMap::new()
        .with(names::POSITION, DataType::Float32, 3)
        .with(names::RADIUS, DataType::Float32, 1)
        .with(names::COLOR, DataType::Float32, 3)
        .with(names::MTL_INDEX, DataType::Int32, 1);
    ParticleArray::from_columns(
        map,
        vec![
            ChannelData::F32(vec![0.0, 0.0, 0.0, 1.05, 0.13, 0.0, 4.0, 0.1, 0.07]),
            ChannelData::F32(vec![1.0, 1.0, 1.0]),
            ChannelData::F32([0.2, 0.4, 0.6].repeat(3)),
            ChannelData::I32(vec![10, 11, 12]),
        ],
    )
    .unwrap()
}

#[test]
fn channels_blend_floats_and_copy_nearest_integers() {
    let arr = particles();
    let field = MetaballField::new(arr.positions().unwrap(), arr.radii().unwrap().to_vec(), 1.5, 0.3)
        .unwrap();
    let pool = WorkerPool::new(2).unwrap();
    let progress = BuildProgress::new(&NullProgress, CancelToken::new());
    let mut mesh = TriMesh::default();
    extract_surface(&field, &ExtractSettings::new(0.2), &pool, &progress, (40.0, 90.0), &mut mesh)
        .unwrap();
    assert!(mesh.vertex_count() > 0);

    let wanted = vec![names::COLOR.to_string(), names::MTL_INDEX.to_string()];
    propagate_channels(&mut mesh, &field, &arr, &wanted, &pool, &progress, (90.0, 95.0)).unwrap();
    let color = mesh.vertex_channel(names::COLOR).unwrap();
    assert_eq!(color.desc.arity, 3);
    let c = color.data.as_f32().unwrap();
    assert_eq!(c.len(), mesh.vertex_count() * 3);
    for rgb in c.chunks_exact(3) {
        assert!((rgb[0] - 0.2).abs() < 1e-5 && (rgb[1] - 0.4).abs() < 1e-5 && (rgb[2] - 0.6).abs() < 1e-5);
    }
    let mtl = &mesh.vertex_channel(names::MTL_INDEX).unwrap().data;
    assert_eq!(mtl.data_type(), DataType::Int32);
    let positions = arr.positions().unwrap();
    for (v, p) in mesh.vertices().enumerate() {
        let nearest = (0..3)
            .min_by(|&a, &b| p.distance_squared(positions[a]).total_cmp(&p.distance_squared(positions[b])))
            .unwrap();
        assert_eq!(mtl.get_i64(v), 10 + nearest as i64);
    }
    assert_eq!(field.particles().len(), 3);
}

#[test]
fn missing_policy_channel_is_an_error() {
    let arr = particles();
    let field = MetaballField::new(arr.positions().unwrap(), arr.radii().unwrap().to_vec(), 1.5, 0.3)
        .unwrap();
    let pool = WorkerPool::new(1).unwrap();
    let progress = BuildProgress::new(&NullProgress, CancelToken::new());
    let mut mesh = two_triangles();
    let err = propagate_channels(
        &mut mesh,
        &field,
        &arr,
        &[names::VELOCITY.to_string()],
        &pool,
        &progress,
        (90.0, 95.0),
    )
    .unwrap_err();
    assert!(matches!(err, MeshError::Channel(ref n) if n == names::VELOCITY));
}
