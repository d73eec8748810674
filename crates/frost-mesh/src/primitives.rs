//! Direct meshers: per-particle points, tetrahedra and instanced shapes.

use std::time::Instant;

use frost_geom::{Mat3, Vec3};
use frost_particles::transforms::hashword;
use frost_particles::{ChannelData, ChannelDesc, DataType, ParticleArray, names};

use crate::error::{MeshError, MeshResult};
use crate::trimesh::TriMesh;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Plane,
    /// Plane visible from both sides.
    Sprite,
    Tetrahedron,
    Box,
    /// Icosahedron.
    Sphere20,
}

/// Unit-radius shape centered at the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

/// Flips faces of a convex origin-centered shape whose normal points inward.
fn orient_outward(vertices: &[Vec3], faces: &mut [[u32; 3]]) {
    for f in faces.iter_mut() {
        let [a, b, c] = f.map(|i| vertices[i as usize]);
        let centroid = (a + b + c) / 3.0;
        if (b - a).cross(c - a).dot(centroid) < 0.0 {
            f.swap(1, 2);
        }
    }
}

impl ShapeKind {
    pub fn shape(self) -> Shape {
        let plane = || {
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ]
        };
        match self {
            ShapeKind::Plane => Shape {
                vertices: plane(),
                faces: vec![[0, 1, 2], [0, 2, 3]],
            },
            ShapeKind::Sprite => Shape {
                vertices: plane(),
                faces: vec![[0, 1, 2], [0, 2, 3], [0, 2, 1], [0, 3, 2]],
            },
            ShapeKind::Tetrahedron => {
                let s = 1.0 / 3f32.sqrt();
                let vertices = vec![
                    Vec3::new(1.0, 1.0, 1.0) * s,
                    Vec3::new(1.0, -1.0, -1.0) * s,
                    Vec3::new(-1.0, 1.0, -1.0) * s,
                    Vec3::new(-1.0, -1.0, 1.0) * s,
                ];
                let mut faces = vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
                orient_outward(&vertices, &mut faces);
                Shape { vertices, faces }
            }
            ShapeKind::Box => {
                let vertices = (0..8u32)
                    .map(|c| {
                        let s = |bit: u32| if c & bit != 0 { 1.0 } else { -1.0 };
                        Vec3::new(s(1), s(2), s(4))
                    })
                    .collect::<Vec<_>>();
                let quads = [
                    [0, 2, 6, 4],
                    [1, 3, 7, 5],
                    [0, 1, 5, 4],
                    [2, 3, 7, 6],
                    [0, 1, 3, 2],
                    [4, 5, 7, 6],
                ];
                let mut faces: Vec<[u32; 3]> = quads
                    .iter()
                    .flat_map(|q| [[q[0], q[1], q[2]], [q[0], q[2], q[3]]])
                    .collect();
                orient_outward(&vertices, &mut faces);
                Shape { vertices, faces }
            }
            ShapeKind::Sphere20 => {
                let phi = (1.0 + 5f32.sqrt()) * 0.5;
                let n = 1.0 / (1.0 + phi * phi).sqrt();
                let vertices = [
                    (-1.0, phi, 0.0),
                    (1.0, phi, 0.0),
                    (-1.0, -phi, 0.0),
                    (1.0, -phi, 0.0),
                    (0.0, -1.0, phi),
                    (0.0, 1.0, phi),
                    (0.0, -1.0, -phi),
                    (0.0, 1.0, -phi),
                    (phi, 0.0, -1.0),
                    (phi, 0.0, 1.0),
                    (-phi, 0.0, -1.0),
                    (-phi, 0.0, 1.0),
                ]
                .map(|(x, y, z)| Vec3::new(x, y, z) * n)
                .to_vec();
                let mut faces = vec![
                    [0, 11, 5],
                    [0, 5, 1],
                    [0, 1, 7],
                    [0, 7, 10],
                    [0, 10, 11],
                    [1, 5, 9],
                    [5, 11, 4],
                    [11, 10, 2],
                    [10, 7, 6],
                    [7, 1, 8],
                    [3, 9, 4],
                    [3, 4, 2],
                    [3, 2, 6],
                    [3, 6, 8],
                    [3, 8, 9],
                    [4, 9, 5],
                    [2, 4, 11],
                    [6, 2, 10],
                    [8, 6, 7],
                    [9, 8, 1],
                ];
                orient_outward(&vertices, &mut faces);
                Shape { vertices, faces }
            }
        }
    }
}

/// How each instance is rotated.
#[derive(Clone, Debug, PartialEq)]
pub enum Orientation {
    None,
    /// Quaternion `[x, y, z, w]` from the `Orientation` channel.
    OrientationChannel,
    /// +Z aligned with a 3-vector channel such as `Velocity`.
    VectorChannel(String),
    /// Fixed Euler angles in degrees, applied X then Y then Z.
    Specify([f32; 3]),
}

/// How each particle picks from the shape list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeSelection {
    /// Particle index modulo the list length.
    Cycle,
    /// Hash of the particle `ID`.
    RandomById { seed: u32 },
    /// `ShapeIndex` channel modulo the list length.
    ShapeIndexChannel,
}

/// Face `MaterialID` assignment for instanced shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryMaterial {
    Single(u16),
    /// Particle `MtlIndex`; out-of-range values become `undefined`.
    MtlIndexChannel { undefined: u16 },
    /// Position of the instanced shape in the shape list.
    ShapeNumber,
    /// The shape's own face ids; built-in shapes carry none and get 0.
    FromGeometry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstanceSettings {
    pub shapes: Vec<ShapeKind>,
    pub selection: ShapeSelection,
    pub orientation: Orientation,
    pub material: GeometryMaterial,
}

/// Copies `channels` onto vertices; vertex `v` takes the value of particle `owner[v]`.
fn copy_channels(
    mesh: &mut TriMesh,
    particles: &ParticleArray,
    channels: &[String],
    owner: Option<&[u32]>,
) -> MeshResult<()> {
    for name in channels {
        let desc = particles
            .channel_map()
            .get(name)
            .ok_or_else(|| MeshError::Channel(name.clone()))?
            .clone();
        let Some(column) = particles.column(name) else {
            return Err(MeshError::Channel(name.clone()));
        };
        let data = match owner {
            Some(owner) => column.gather(owner, desc.arity),
            None => column.clone(),
        };
        mesh.set_vertex_channel(desc, data)?;
    }
    Ok(())
}

/// One vertex per particle, no faces; channels are copied verbatim.
pub fn vertex_cloud(particles: &ParticleArray, channels: &[String], out: &mut TriMesh) -> MeshResult<()> {
    out.clear_keep_capacity();
    let positions = particles.positions()?;
    out.reserve(positions.len(), 0);
    for p in positions {
        out.push_vertex(p);
    }
    copy_channels(out, particles, channels, None)
}

/// One regular tetrahedron per particle with vertices at distance `radius`.
pub fn tetrahedra(particles: &ParticleArray, channels: &[String], out: &mut TriMesh) -> MeshResult<()> {
    let settings = InstanceSettings {
        shapes: vec![ShapeKind::Tetrahedron],
        selection: ShapeSelection::Cycle,
        orientation: Orientation::None,
        material: GeometryMaterial::Single(0),
    };
    instance_shapes(particles, &settings, channels, out)
}

fn rotations(particles: &ParticleArray, orientation: &Orientation) -> MeshResult<Vec<Mat3>> {
    let n = particles.len();
    Ok(match orientation {
        Orientation::None => vec![Mat3::IDENTITY; n],
        Orientation::Specify(deg) => {
            let [x, y, z] = deg.map(f32::to_radians);
            vec![Mat3::from_euler_xyz(x, y, z); n]
        }
        Orientation::OrientationChannel => {
            let col = particles.f32_column(names::ORIENTATION, 4)?;
            col.chunks_exact(4)
                .map(|q| Mat3::from_quat([q[0], q[1], q[2], q[3]]))
                .collect()
        }
        Orientation::VectorChannel(name) => {
            let col = particles.f32_column(name, 3)?;
            col.chunks_exact(3)
                .map(|v| Mat3::align_z(Vec3::new(v[0], v[1], v[2])))
                .collect()
        }
    })
}

fn selections(particles: &ParticleArray, selection: ShapeSelection, count: usize) -> MeshResult<Vec<usize>> {
    let n = particles.len();
    let int_column = |name: &str| {
        particles
            .column(name)
            .ok_or_else(|| MeshError::Channel(name.to_string()))
    };
    Ok(match selection {
        ShapeSelection::Cycle => (0..n).map(|i| i % count).collect(),
        ShapeSelection::RandomById { seed } => {
            let col = int_column(names::ID)?;
            (0..n)
                .map(|i| hashword(&[col.get_i64(i) as u32], seed) as usize % count)
                .collect()
        }
        ShapeSelection::ShapeIndexChannel => {
            let col = int_column(names::SHAPE_INDEX)?;
            (0..n)
                .map(|i| col.get_i64(i).rem_euclid(count as i64) as usize)
                .collect()
        }
    })
}

/// Places a scaled, rotated copy of a selected shape at every particle.
pub fn instance_shapes(
    particles: &ParticleArray,
    settings: &InstanceSettings,
    channels: &[String],
    out: &mut TriMesh,
) -> MeshResult<()> {
    let t0 = Instant::now();
    out.clear_keep_capacity();
    if settings.shapes.is_empty() {
        return Err(MeshError::invalid("geometry_shapes", "shape list is empty"));
    }
    let shapes: Vec<Shape> = settings.shapes.iter().map(|k| k.shape()).collect();
    let positions = particles.positions()?;
    let radii = particles.radii()?;
    let rot = rotations(particles, &settings.orientation)?;
    let picks = selections(particles, settings.selection, shapes.len())?;
    let mtl = match settings.material {
        GeometryMaterial::MtlIndexChannel { .. } => Some(
            particles
                .column(names::MTL_INDEX)
                .ok_or_else(|| MeshError::Channel(names::MTL_INDEX.to_string()))?,
        ),
        _ => None,
    };

    let mut owner = Vec::new();
    let mut material_ids = Vec::new();
    for (i, &pick) in picks.iter().enumerate() {
        let shape = &shapes[pick];
        let base = out.vertex_count() as u32;
        for &v in &shape.vertices {
            out.push_vertex(positions[i] + rot[i].mul_vec(v * radii[i]));
            owner.push(i as u32);
        }
        let id = match (settings.material, mtl) {
            (GeometryMaterial::Single(id), _) => id,
            (GeometryMaterial::ShapeNumber, _) => pick as u16,
            (GeometryMaterial::FromGeometry, _) => 0,
            (GeometryMaterial::MtlIndexChannel { undefined }, Some(col)) => {
                u16::try_from(col.get_i64(i)).unwrap_or(undefined)
            }
            (GeometryMaterial::MtlIndexChannel { undefined }, None) => undefined,
        };
        for f in &shape.faces {
            out.push_face(f.map(|k| base + k));
            material_ids.push(id);
        }
    }
    copy_channels(out, particles, channels, Some(&owner))?;
    out.set_face_channel(
        ChannelDesc::new(names::MATERIAL_ID, DataType::UInt16, 1),
        ChannelData::U16(material_ids),
    )?;
    log::info!(
        target: "perf",
        "ms={} instance_shapes particles={} verts={} faces={}",
        t0.elapsed().as_millis(),
        particles.len(),
        out.vertex_count(),
        out.face_count()
    );
    Ok(())
}
