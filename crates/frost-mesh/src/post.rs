//! Mesh post-processing: vertex channels from particles, face materials,
//! region-of-interest culling and face-count clamping.

use std::time::Instant;

use frost_geom::{Aabb, Vec3, VoxelCoordSystem};
use frost_particles::{ChannelData, ChannelDesc, DataType, ParticleArray, names};
use frost_runtime::{BuildProgress, WorkerPool};

use crate::constants::VERTEX_CHUNK;
use crate::error::{MeshError, MeshResult};
use crate::kernels::{ImplicitField, KernelParticles};
use crate::trimesh::TriMesh;

/// Face material from its three vertex materials: `b` when the last two
/// agree, otherwise `a`.
#[inline]
pub fn vote_material<T: PartialEq + Copy>(a: T, b: T, c: T) -> T {
    if b == c { b } else { a }
}

/// Fills the `MaterialID` face channel with `id`.
pub fn set_single_material(mesh: &mut TriMesh, id: u16) -> MeshResult<()> {
    let data = ChannelData::U16(vec![id; mesh.face_count()]);
    mesh.set_face_channel(ChannelDesc::new(names::MATERIAL_ID, DataType::UInt16, 1), data)
}

/// Votes face `MaterialID` from the vertex channel `source`. Values outside
/// the u16 range become `undefined`.
pub fn vote_face_materials(mesh: &mut TriMesh, source: &str, undefined: u16) -> MeshResult<()> {
    let column = mesh
        .vertex_channel(source)
        .filter(|c| c.desc.arity == 1)
        .ok_or_else(|| MeshError::Channel(source.to_string()))?;
    let data = &column.data;
    let ids: Vec<u16> = mesh
        .faces()
        .map(|f| {
            let [a, b, c] = f.map(|v| data.get_i64(v as usize));
            u16::try_from(vote_material(a, b, c)).unwrap_or(undefined)
        })
        .collect();
    mesh.set_face_channel(
        ChannelDesc::new(names::MATERIAL_ID, DataType::UInt16, 1),
        ChannelData::U16(ids),
    )
}

/// Nearest particle to `p`, searching the index first.
fn nearest_particle(particles: &KernelParticles, p: Vec3, radius: f32) -> Option<u32> {
    particles.nearest(p, radius).or_else(|| {
        particles
            .positions
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.distance_squared(p).total_cmp(&b.1.distance_squared(p)))
            .map(|(i, _)| i as u32)
    })
}

struct BlendChunk {
    nearest: Vec<u32>,
    floats: Vec<f64>,
}

/// Copies `channels` from `source` onto the mesh vertices. Float channels
/// are blended with the field's kernel weights around each vertex and fall
/// back to the nearest particle where no weight reaches; integer channels
/// take the nearest particle's value.
///
/// `source` must be index-aligned with the field's particles.
pub fn propagate_channels(
    mesh: &mut TriMesh,
    field: &dyn ImplicitField,
    source: &ParticleArray,
    channels: &[String],
    pool: &WorkerPool,
    progress: &BuildProgress<'_>,
    range: (f32, f32),
) -> MeshResult<()> {
    let t0 = Instant::now();
    let mut descs = Vec::with_capacity(channels.len());
    for name in channels {
        let desc = source
            .channel_map()
            .get(name)
            .ok_or_else(|| MeshError::Channel(name.clone()))?;
        descs.push(desc.clone());
    }
    if descs.is_empty() || mesh.vertex_count() == 0 {
        progress.report(range.1)?;
        return Ok(());
    }
    let particles = field.particles();
    if particles.len() != source.len() {
        return Err(MeshError::invalid(
            "channels",
            format!("{} particles for {} kernel entries", source.len(), particles.len()),
        ));
    }

    let floats: Vec<(&ChannelData, usize)> = descs
        .iter()
        .filter(|d| d.data_type.is_float())
        .filter_map(|d| source.column(&d.name).map(|c| (c, d.arity)))
        .collect();
    let stride: usize = floats.iter().map(|(_, a)| a).sum();
    let n = mesh.vertex_count();
    let radius = field.support_radius();
    let mesh_ref = &*mesh;

    let parts = pool.run_pass(
        "channel_propagation",
        progress,
        range,
        n.div_ceil(VERTEX_CHUNK),
        |u| {
            let lo = u * VERTEX_CHUNK;
            let hi = (lo + VERTEX_CHUNK).min(n);
            let mut out = BlendChunk {
                nearest: Vec::with_capacity(hi - lo),
                floats: Vec::with_capacity((hi - lo) * stride),
            };
            let mut acc = vec![0.0f64; stride];
            for v in lo..hi {
                let p = mesh_ref.vertex(v);
                let nearest = nearest_particle(particles, p, radius).unwrap_or(0);
                out.nearest.push(nearest);
                if stride == 0 {
                    continue;
                }
                acc.iter_mut().for_each(|x| *x = 0.0);
                let mut weight_sum = 0.0f64;
                field.for_each_weight(p, &mut |i: u32, w: f32| {
                    let w = f64::from(w);
                    weight_sum += w;
                    let mut o = 0;
                    for (col, arity) in &floats {
                        for k in 0..*arity {
                            acc[o + k] += w * col.get_f64(i as usize * arity + k);
                        }
                        o += arity;
                    }
                });
                if weight_sum > 0.0 {
                    out.floats.extend(acc.iter().map(|x| x / weight_sum));
                } else {
                    for (col, arity) in &floats {
                        let base = nearest as usize * arity;
                        out.floats.extend((base..base + arity).map(|k| col.get_f64(k)));
                    }
                }
            }
            out
        },
    )?;

    let mut nearest = Vec::with_capacity(n);
    let mut blended = Vec::with_capacity(n * stride);
    for part in parts {
        nearest.extend(part.nearest);
        blended.extend(part.floats);
    }

    let mut offset = 0;
    for desc in descs {
        let Some(column) = source.column(&desc.name) else {
            return Err(MeshError::Channel(desc.name));
        };
        let data = if desc.data_type.is_float() {
            let mut data = ChannelData::with_type(desc.data_type);
            data.reserve(n * desc.arity);
            for v in 0..n {
                let base = v * stride + offset;
                for k in 0..desc.arity {
                    data.push_f64(blended[base + k]);
                }
            }
            offset += desc.arity;
            data
        } else {
            column.gather(&nearest, desc.arity)
        };
        mesh.set_vertex_channel(desc, data)?;
    }
    log::info!(
        target: "perf",
        "ms={} propagate_channels vertices={} channels={}",
        t0.elapsed().as_millis(),
        n,
        mesh.vertex_channels.len()
    );
    Ok(())
}

/// Removes faces whose three vertices all lie outside `roi` grown to
/// meshing voxel boundaries. Point clouds are filtered per vertex.
/// Returns the number of removed faces (vertices for point clouds).
pub fn cull_to_box(mesh: &mut TriMesh, roi: &Aabb, voxel_length: f32) -> usize {
    let bounds = if voxel_length.is_finite() && voxel_length > 0.0 {
        VoxelCoordSystem::new(Vec3::ZERO, voxel_length).snap_outward(roi)
    } else {
        *roi
    };
    if mesh.face_count() == 0 {
        let before = mesh.vertex_count();
        let keep: Vec<bool> = mesh.vertices().map(|p| bounds.contains(p)).collect();
        mesh.retain_vertices(&keep);
        return before - mesh.vertex_count();
    }
    let inside: Vec<bool> = mesh.vertices().map(|p| bounds.contains(p)).collect();
    let keep: Vec<bool> = mesh
        .faces()
        .map(|f| f.iter().any(|&v| inside[v as usize]))
        .collect();
    let before = mesh.face_count();
    mesh.retain_faces(&keep);
    let removed = before - mesh.face_count();
    if removed > 0 {
        log::debug!("roi cull removed {removed} of {before} faces");
    }
    removed
}

/// Truncates the mesh to `max_faces`, warning when faces are dropped.
pub fn clamp_faces(mesh: &mut TriMesh, max_faces: usize) -> usize {
    let removed = mesh.truncate_faces(max_faces);
    if removed > 0 {
        log::warn!("face limit {max_faces} reached; dropped {removed} faces");
    }
    removed
}
