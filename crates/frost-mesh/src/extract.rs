//! Marching-tetrahedra extraction of the zero level set of an [`ImplicitField`].
//!
//! Samples sit at voxel centers of a lattice anchored at the world origin.
//! Each cell between eight samples is split into six tetrahedra (see
//! [`crate::tables`]). Vertices are keyed by the lattice edge they lie on,
//! so a chunked run merges to the same surface as a single pass.

use std::time::Instant;

use frost_geom::{Aabb, Vec3, VoxelCoordSystem, VoxelRange};
use frost_runtime::{BuildProgress, PassError, WorkerPool};
use hashbrown::HashMap;

use crate::constants::{SPARSE_CHUNK_CELLS, SPARSE_MESHING_VOXEL_COUNT_THRESHOLD};
use crate::error::{MeshError, MeshResult};
use crate::kernels::ImplicitField;
use crate::tables::{canonical_edge, cell_tets, corner_offset};
use crate::trimesh::TriMesh;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtractMode {
    /// One pass over the whole lattice on the calling thread.
    Dense,
    /// Fixed-size chunks near particles, run on the worker pool.
    Sparse,
}

impl ExtractMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractMode::Dense => "dense",
            ExtractMode::Sparse => "sparse",
        }
    }
}

/// Lattices with more than `threshold` cells go sparse.
#[inline]
pub fn select_mode(cell_count: u64, threshold: u64) -> ExtractMode {
    if cell_count > threshold {
        ExtractMode::Sparse
    } else {
        ExtractMode::Dense
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractSettings {
    pub voxel_length: f32,
    /// Root-finding iterations per edge vertex; 0 is plain linear interpolation.
    pub refinement: u32,
    pub sparse_threshold: u64,
    /// Restricts sampling to this box (grown to voxel boundaries plus a margin).
    pub roi: Option<Aabb>,
    /// Skips [`select_mode`] when set.
    pub force_mode: Option<ExtractMode>,
}

impl ExtractSettings {
    pub fn new(voxel_length: f32) -> Self {
        Self {
            voxel_length,
            refinement: 0,
            sparse_threshold: SPARSE_MESHING_VOXEL_COUNT_THRESHOLD,
            roi: None,
            force_mode: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractStats {
    pub mode: ExtractMode,
    /// Sample lattice.
    pub samples: VoxelRange,
    pub cells: u64,
    pub chunks: usize,
    pub chunks_skipped: usize,
    pub vertices: usize,
    pub faces: usize,
}

/// Sample lattice covering every cell the field can be negative in.
pub fn sample_lattice(field: &dyn ImplicitField, settings: &ExtractSettings) -> VoxelRange {
    let vl = settings.voxel_length;
    let vcs = VoxelCoordSystem::new(Vec3::ZERO, vl);
    let bounds = field.particles().bounds();
    if bounds.is_empty() {
        return VoxelRange::default();
    }
    let mut range = vcs
        .sample_range(&bounds.expanded(field.support_radius() + vl))
        .expanded(1);
    if let Some(roi) = settings.roi {
        let snapped = vcs.snap_outward(&roi).expanded(2.0 * vl);
        range = range.intersection(&vcs.sample_range(&snapped));
    }
    range
}

/// Cells spanned by a sample lattice: one fewer than samples per axis.
#[inline]
fn cell_range(samples: &VoxelRange) -> VoxelRange {
    VoxelRange {
        min: samples.min,
        max: samples.max.map(|v| v - 1),
    }
}

struct Lattice<'f> {
    field: &'f dyn ImplicitField,
    vcs: VoxelCoordSystem,
    samples: VoxelRange,
    dims: [u64; 3],
    refinement: u32,
}

impl Lattice<'_> {
    #[inline]
    fn edge_key(&self, lower: [i32; 3], dir_bits: u8) -> u64 {
        let l = [0, 1, 2].map(|a| (lower[a] - self.samples.min[a]) as u64);
        ((l[2] * self.dims[1] + l[1]) * self.dims[0] + l[0]) * 8 + u64::from(dir_bits)
    }

    /// Surface point on the edge `u -> v`, `u` being the lattice-lower end.
    fn edge_vertex(&self, pu: Vec3, fu: f32, pv: Vec3, fv: f32) -> Vec3 {
        let (mut a, mut fa, mut b, mut fb) = (0.0f32, fu, 1.0f32, fv);
        let mut t = fa / (fa - fb);
        // Illinois: halve the stale end's value when the same side moves twice.
        let mut side = 0i8;
        for _ in 0..self.refinement {
            let ft = self.field.eval(pu.lerp(pv, t));
            if ft == 0.0 {
                break;
            }
            if (ft < 0.0) == (fa < 0.0) {
                a = t;
                fa = ft;
                if side == -1 {
                    fb *= 0.5;
                }
                side = -1;
            } else {
                b = t;
                fb = ft;
                if side == 1 {
                    fa *= 0.5;
                }
                side = 1;
            }
            let denom = fb - fa;
            if denom == 0.0 {
                break;
            }
            t = ((a * fb - b * fa) / denom).clamp(0.0, 1.0);
        }
        pu.lerp(pv, t)
    }
}

/// Mesh of one block of cells in block-local vertex indices.
#[derive(Default)]
struct ChunkMesh {
    keys: Vec<u64>,
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

struct ChunkBuilder<'l, 'f> {
    lattice: &'l Lattice<'f>,
    lookup: HashMap<u64, u32>,
    mesh: ChunkMesh,
}

impl ChunkBuilder<'_, '_> {
    fn vertex(&mut self, corners: &[([i32; 3], Vec3, f32); 8], a: u8, b: u8) -> u32 {
        let (u, v) = canonical_edge(a, b);
        let (iu, pu, fu) = corners[u as usize];
        let (_, pv, fv) = corners[v as usize];
        let key = self.lattice.edge_key(iu, u ^ v);
        if let Some(&i) = self.lookup.get(&key) {
            return i;
        }
        let p = self.lattice.edge_vertex(pu, fu, pv, fv);
        let i = self.mesh.vertices.len() as u32;
        self.mesh.vertices.push(p);
        self.mesh.keys.push(key);
        self.lookup.insert(key, i);
        i
    }

    /// Emits `tri`, flipped if its normal points from outside toward inside.
    fn triangle(&mut self, mut tri: [u32; 3], outward: Vec3) {
        let v = &self.mesh.vertices;
        let (p0, p1, p2) = (v[tri[0] as usize], v[tri[1] as usize], v[tri[2] as usize]);
        if (p1 - p0).cross(p2 - p0).dot(outward) < 0.0 {
            tri.swap(1, 2);
        }
        self.mesh.triangles.push(tri);
    }

    fn cell(&mut self, corners: &[([i32; 3], Vec3, f32); 8]) {
        let inside = corners.iter().filter(|c| c.2 < 0.0).count();
        if inside == 0 || inside == 8 {
            return;
        }
        for tet in cell_tets() {
            let (ins, outs): (Vec<u8>, Vec<u8>) =
                tet.iter().partition(|&&c| corners[c as usize].2 < 0.0);
            if ins.is_empty() || outs.is_empty() {
                continue;
            }
            let centroid = |cs: &[u8]| {
                cs.iter()
                    .fold(Vec3::ZERO, |acc, &c| acc + corners[c as usize].1)
                    / cs.len() as f32
            };
            let outward = centroid(&outs) - centroid(&ins);
            match (ins.len(), outs.len()) {
                (1, 3) => {
                    let t = [0, 1, 2].map(|k| self.vertex(corners, ins[0], outs[k]));
                    self.triangle(t, outward);
                }
                (3, 1) => {
                    let t = [0, 1, 2].map(|k| self.vertex(corners, outs[0], ins[k]));
                    self.triangle(t, outward);
                }
                _ => {
                    let q = [
                        self.vertex(corners, ins[0], outs[0]),
                        self.vertex(corners, ins[0], outs[1]),
                        self.vertex(corners, ins[1], outs[1]),
                        self.vertex(corners, ins[1], outs[0]),
                    ];
                    self.triangle([q[0], q[1], q[2]], outward);
                    self.triangle([q[0], q[2], q[3]], outward);
                }
            }
        }
    }
}

/// Meshes `cells` plane by plane; `on_plane` runs after each sample plane
/// and may abort the chunk.
fn extract_cells(
    lattice: &Lattice<'_>,
    cells: VoxelRange,
    on_plane: &mut dyn FnMut() -> MeshResult<()>,
) -> MeshResult<ChunkMesh> {
    let mut builder = ChunkBuilder {
        lattice,
        lookup: HashMap::new(),
        mesh: ChunkMesh::default(),
    };
    if cells.is_empty() {
        return Ok(builder.mesh);
    }
    let (lo, hi) = (cells.min, cells.max);
    let nx = (hi[0] - lo[0] + 1) as usize;
    let ny = (hi[1] - lo[1] + 1) as usize;
    let sample_plane = |z: i32| -> Vec<f32> {
        let mut plane = Vec::with_capacity(nx * ny);
        for y in lo[1]..=hi[1] {
            for x in lo[0]..=hi[0] {
                plane.push(lattice.field.eval(lattice.vcs.voxel_center([x, y, z])));
            }
        }
        plane
    };

    let mut below = sample_plane(lo[2]);
    on_plane()?;
    for z in lo[2]..hi[2] {
        let above = sample_plane(z + 1);
        let planes = [&below, &above];
        for y in lo[1]..hi[1] {
            for x in lo[0]..hi[0] {
                let corners: [([i32; 3], Vec3, f32); 8] = std::array::from_fn(|c| {
                    let o = corner_offset(c as u8);
                    let ijk = [x + o[0], y + o[1], z + o[2]];
                    let local = (ijk[1] - lo[1]) as usize * nx + (ijk[0] - lo[0]) as usize;
                    let f = planes[o[2] as usize][local];
                    (ijk, lattice.vcs.voxel_center(ijk), f)
                });
                builder.cell(&corners);
            }
        }
        below = above;
        on_plane()?;
    }
    Ok(builder.mesh)
}

/// Sparse chunks of `cells`, in z-major order.
fn chunk_ranges(cells: &VoxelRange) -> Vec<VoxelRange> {
    let n = SPARSE_CHUNK_CELLS;
    let mut out = Vec::new();
    let mut z = cells.min[2];
    while z < cells.max[2] {
        let mut y = cells.min[1];
        while y < cells.max[1] {
            let mut x = cells.min[0];
            while x < cells.max[0] {
                out.push(VoxelRange {
                    min: [x, y, z],
                    max: [
                        (x + n).min(cells.max[0]),
                        (y + n).min(cells.max[1]),
                        (z + n).min(cells.max[2]),
                    ],
                });
                x += n;
            }
            y += n;
        }
        z += n;
    }
    out
}

/// Appends chunk meshes in order, sharing vertices on common edges.
fn merge_chunks(chunks: Vec<ChunkMesh>, out: &mut TriMesh) {
    let total_v: usize = chunks.iter().map(|c| c.vertices.len()).sum();
    let total_f: usize = chunks.iter().map(|c| c.triangles.len()).sum();
    out.reserve(total_v, total_f);
    let mut global: HashMap<u64, u32> = HashMap::with_capacity(total_v);
    for chunk in chunks {
        let remap: Vec<u32> = chunk
            .keys
            .iter()
            .zip(&chunk.vertices)
            .map(|(&k, &p)| *global.entry(k).or_insert_with(|| out.push_vertex(p)))
            .collect();
        for t in chunk.triangles {
            out.push_face(t.map(|i| remap[i as usize]));
        }
    }
}

/// Extracts the surface `field = 0` into `out` (cleared first), reporting
/// into `range` of `progress`.
pub fn extract_surface(
    field: &dyn ImplicitField,
    settings: &ExtractSettings,
    pool: &WorkerPool,
    progress: &BuildProgress<'_>,
    range: (f32, f32),
    out: &mut TriMesh,
) -> MeshResult<ExtractStats> {
    let t0 = Instant::now();
    let vl = settings.voxel_length;
    if !vl.is_finite() || vl <= 0.0 {
        return Err(MeshError::invalid("meshing_voxel_length", format!("{vl} must be > 0")));
    }
    out.clear_keep_capacity();
    let samples = sample_lattice(field, settings);
    let cells = cell_range(&samples);
    let cell_count = cells.count();
    let mode = settings
        .force_mode
        .unwrap_or_else(|| select_mode(cell_count, settings.sparse_threshold));
    let d = samples.dims();
    let lattice = Lattice {
        field,
        vcs: VoxelCoordSystem::new(Vec3::ZERO, vl),
        samples,
        dims: d.map(|v| v as u64),
        refinement: settings.refinement,
    };

    let mut stats = ExtractStats {
        mode,
        samples,
        cells: cell_count,
        chunks: 0,
        chunks_skipped: 0,
        vertices: 0,
        faces: 0,
    };
    if cells.is_empty() {
        progress.report(range.1)?;
        return Ok(stats);
    }

    match mode {
        ExtractMode::Dense => {
            let stage = progress.stage(range.0, range.1, d[2] as u64);
            let mesh = extract_cells(&lattice, cells, &mut || -> MeshResult<()> {
                stage.advance(1);
                stage.report()?;
                Ok(())
            })?;
            stats.chunks = 1;
            merge_chunks(vec![mesh], out);
            stage.finish()?;
        }
        ExtractMode::Sparse => {
            let margin = field.support_radius() + vl;
            let grid = &field.particles().grid;
            let all = chunk_ranges(&cells);
            let total = all.len();
            let live: Vec<VoxelRange> = all
                .into_iter()
                .filter(|c| {
                    let sample_box = Aabb::new(
                        lattice.vcs.voxel_center(c.min),
                        lattice.vcs.voxel_center(c.max),
                    );
                    grid.any_near_box(&sample_box, margin)
                })
                .collect();
            stats.chunks = live.len();
            stats.chunks_skipped = total - live.len();
            let cancel = progress.cancel_token();
            let meshes = pool.run_pass("extract_sparse", progress, range, live.len(), |u| {
                extract_cells(&lattice, live[u], &mut || {
                    cancel.check().map_err(|e| MeshError::Pass(PassError::from(e)))
                })
            })?;
            let meshes = meshes.into_iter().collect::<MeshResult<Vec<_>>>()?;
            merge_chunks(meshes, out);
        }
    }

    stats.vertices = out.vertex_count();
    stats.faces = out.face_count();
    log::info!(
        target: "perf",
        "ms={} extract mode={} cells={} chunks={} skipped={} verts={} faces={}",
        t0.elapsed().as_millis(),
        mode.as_str(),
        cell_count,
        stats.chunks,
        stats.chunks_skipped,
        stats.vertices,
        stats.faces
    );
    Ok(stats)
}
