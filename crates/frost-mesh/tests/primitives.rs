use frost_geom::Vec3;
use frost_mesh::primitives::{
    GeometryMaterial, InstanceSettings, Orientation, ShapeKind, ShapeSelection, instance_shapes,
    tetrahedra, vertex_cloud,
};
use frost_mesh::{MeshError, TriMesh};
use frost_particles::{ChannelData, ChannelMap, DataType, ParticleArray, ParticleError, names};

fn particles() -> ParticleArray {
    let map = ChannelMap::new()
        .with(names::POSITION, DataType::Float32, 3)
        .with(names::RADIUS, DataType::Float32, 1)
        .with(names::ID, DataType::Int64, 1)
        .with(names::SHAPE_INDEX, DataType::Int32, 1)
        .with(names::MTL_INDEX, DataType::UInt8, 1)
        .with(names::VELOCITY, DataType::Float32, 3);
    ParticleArray::from_columns(
        map,
        vec![
            ChannelData::F32(vec![0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 10.0, 0.0]),
            ChannelData::F32(vec![1.0, 2.0, 0.5]),
            ChannelData::I64(vec![7, 8, 9]),
            ChannelData::I32(vec![0, 4, -1]),
            ChannelData::U8(vec![3, 4, 5]),
            ChannelData::F32(vec![0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ],
    )
    .unwrap()
}

fn signed_volume(m: &TriMesh, faces: std::ops::Range<usize>) -> f32 {
    faces
        .map(|f| {
            let [a, b, c] = m.face(f).map(|i| m.vertex(i as usize));
            a.dot(b.cross(c)) / 6.0
        })
        .sum()
}

#[test]
fn vertex_cloud_copies_channels_exactly() {
    let arr = particles();
    let mut out = TriMesh::default();
    vertex_cloud(&arr, &[names::ID.to_string(), names::MTL_INDEX.to_string()], &mut out).unwrap();
    assert_eq!(out.vertex_count(), 3);
    assert_eq!(out.face_count(), 0);
    assert_eq!(out.vertex(1), Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(out.vertex_channel(names::ID).unwrap().data, ChannelData::I64(vec![7, 8, 9]));
    assert_eq!(out.vertex_channel(names::MTL_INDEX).unwrap().data, ChannelData::U8(vec![3, 4, 5]));
}

#[test]
fn tetrahedra_sit_on_each_particle_sphere() {
    let arr = particles();
    let mut out = TriMesh::default();
    tetrahedra(&arr, &[], &mut out).unwrap();
    assert_eq!(out.vertex_count(), 12);
    assert_eq!(out.face_count(), 12);
    let radii = arr.radii().unwrap();
    let centers = arr.positions().unwrap();
    for v in 0..12 {
        let p = v / 4;
        assert!((out.vertex(v).distance(centers[p]) - radii[p]).abs() < 1e-5);
    }
    assert!(!out.has_degenerate_faces());
    // a single centered tet has positive volume with outward faces
    let mut single = TriMesh::default();
    let one = ParticleArray::from_columns(
        ChannelMap::new()
            .with(names::POSITION, DataType::Float32, 3)
            .with(names::RADIUS, DataType::Float32, 1),
        vec![ChannelData::F32(vec![0.0; 3]), ChannelData::F32(vec![1.0])],
    )
    .unwrap();
    tetrahedra(&one, &[], &mut single).unwrap();
    assert!(signed_volume(&single, 0..4) > 0.0);
}

#[test]
fn closed_shapes_are_outward() {
    for kind in [ShapeKind::Tetrahedron, ShapeKind::Box, ShapeKind::Sphere20] {
        let s = kind.shape();
        let mut m = TriMesh::default();
        for &v in &s.vertices {
            m.push_vertex(v);
        }
        for &f in &s.faces {
            m.push_face(f);
        }
        assert!(signed_volume(&m, 0..m.face_count()) > 0.0, "{kind:?}");
    }
    assert_eq!(ShapeKind::Sphere20.shape().faces.len(), 20);
    assert!(ShapeKind::Sphere20.shape().vertices.iter().all(|v| (v.length() - 1.0).abs() < 1e-5));
    assert_eq!(ShapeKind::Sprite.shape().faces.len(), 4);
}

#[test]
fn shape_index_selects_modulo_list_and_numbers_materials() {
    let arr = particles();
    let settings = InstanceSettings {
        shapes: vec![ShapeKind::Plane, ShapeKind::Box, ShapeKind::Tetrahedron],
        selection: ShapeSelection::ShapeIndexChannel,
        orientation: Orientation::None,
        material: GeometryMaterial::ShapeNumber,
    };
    let mut out = TriMesh::default();
    instance_shapes(&arr, &settings, &[names::ID.to_string()], &mut out).unwrap();
    // ShapeIndex 0, 4, -1 -> plane, box, tetrahedron
    assert_eq!(out.vertex_count(), 4 + 8 + 4);
    assert_eq!(out.face_count(), 2 + 12 + 4);
    let ids = &out.face_channel(names::MATERIAL_ID).unwrap().data;
    let expected: Vec<u16> = [0u16; 2].into_iter().chain([1; 12]).chain([2; 4]).collect();
    assert_eq!(ids, &ChannelData::U16(expected));
    let owner_ids = &out.vertex_channel(names::ID).unwrap().data;
    assert_eq!(owner_ids.get_i64(0), 7);
    assert_eq!(owner_ids.get_i64(4), 8);
    assert_eq!(owner_ids.get_i64(15), 9);
}

#[test]
fn vector_channel_orients_plane_normals() {
    let arr = particles();
    let settings = InstanceSettings {
        shapes: vec![ShapeKind::Plane],
        selection: ShapeSelection::Cycle,
        orientation: Orientation::VectorChannel(names::VELOCITY.to_string()),
        material: GeometryMaterial::MtlIndexChannel { undefined: 100 },
    };
    let mut out = TriMesh::default();
    instance_shapes(&arr, &settings, &[], &mut out).unwrap();
    let normal = |f: usize| {
        let [a, b, c] = out.face(f).map(|i| out.vertex(i as usize));
        (b - a).cross(c - a).normalized()
    };
    // velocity +Z keeps the plane, +X turns its normal onto X, zero keeps identity
    assert!((normal(0).z - 1.0).abs() < 1e-5);
    assert!((normal(2).x - 1.0).abs() < 1e-5);
    assert!((normal(4).z - 1.0).abs() < 1e-5);
    assert_eq!(
        out.face_channel(names::MATERIAL_ID).unwrap().data,
        ChannelData::U16(vec![3, 3, 4, 4, 5, 5])
    );
}

#[test]
fn specified_orientation_rotates_every_instance() {
    let arr = particles();
    let settings = InstanceSettings {
        shapes: vec![ShapeKind::Plane],
        selection: ShapeSelection::RandomById { seed: 42 },
        orientation: Orientation::Specify([90.0, 0.0, 0.0]),
        material: GeometryMaterial::Single(6),
    };
    let mut out = TriMesh::default();
    instance_shapes(&arr, &settings, &[], &mut out).unwrap();
    for v in out.vertices().take(4) {
        assert!(v.z.abs() > 0.99);
        assert!(v.y.abs() < 1e-5);
    }
}

#[test]
fn orientation_channel_is_required_when_selected() {
    let arr = particles();
    let settings = InstanceSettings {
        shapes: vec![ShapeKind::Box],
        selection: ShapeSelection::Cycle,
        orientation: Orientation::OrientationChannel,
        material: GeometryMaterial::FromGeometry,
    };
    let err = instance_shapes(&arr, &settings, &[], &mut TriMesh::default()).unwrap_err();
    assert!(matches!(err, MeshError::Particles(ParticleError::MissingChannel(_))));
}
