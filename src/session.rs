//! The mesh build entry point: particles in, trimesh out.

use std::time::Instant;

use frost_geom::Vec3;
use frost_mesh::anisotropy;
use frost_mesh::kernels::{
    AnisotropicField, MetaballField, UnionOfSpheresField, ZhuBridsonField, radius_range,
};
use frost_mesh::post::{
    clamp_faces, cull_to_box, propagate_channels, set_single_material, vote_face_materials,
};
use frost_mesh::primitives::{self, GeometryMaterial, InstanceSettings};
use frost_mesh::constants::SPARSE_MESHING_VOXEL_COUNT_THRESHOLD;
use frost_mesh::{ExtractMode, ExtractSettings, ImplicitField, TriMesh, extract_surface};
use frost_particles::transforms::{
    LoadMode, RadiusAnimationMode, animate_radius, apply_load_fraction, discard_invalid,
    ensure_ids, offset_by_velocity, randomize_radius, set_constant_radius,
};
use frost_particles::{
    BoxCullingIstream, ChannelDesc, ChannelMap, DataType, ParticleArray, ParticleError,
    ParticleIstream, names,
};
use frost_runtime::{BuildProgress, CancelToken, ProgressLogger, WorkerPool};

use crate::cache::{CacheKey, ParticleCache};
use crate::config::{MaterialMode, MeshingMethod, MeshingParams};
use crate::error::{FrostError, FrostResult};

// Overall progress ranges in percent.
const LOAD: (f32, f32) = (0.0, 10.0);
const ANISOTROPY: (f32, f32) = (10.0, 40.0);
const EXTRACT: (f32, f32) = (40.0, 95.0);
const POST: (f32, f32) = (95.0, 100.0);

/// Particles requested from the source per pull.
const READ_BATCH: usize = 16 * 1024;

/// Outcome of one build.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildReport {
    /// Particles that reached the mesher.
    pub particle_count: usize,
    /// Particles dropped for a non-finite position or non-positive radius.
    pub discarded_count: usize,
    /// Extraction strategy; `None` for direct meshing methods and empty input.
    pub mode: Option<ExtractMode>,
    pub meshing_voxel_length: f32,
    pub vertex_count: usize,
    pub face_count: usize,
    pub cache_hit: bool,
}

/// Owns everything that outlives a single build: the worker pool, the
/// optional particle cache and the sparse-mode threshold.
///
/// Builds are serialized by `&mut self`; the spatial index and anisotropy
/// buffers of a build are created and dropped inside [`MeshBuildSession::build`].
pub struct MeshBuildSession {
    pool: WorkerPool,
    cache: Option<ParticleCache>,
    sparse_threshold: u64,
}

impl MeshBuildSession {
    /// `threads == 0` uses the available parallelism.
    pub fn new(threads: usize) -> FrostResult<Self> {
        Ok(Self {
            pool: WorkerPool::new(threads)?,
            cache: None,
            sparse_threshold: SPARSE_MESHING_VOXEL_COUNT_THRESHOLD,
        })
    }

    /// Session sized by `params.threads`.
    pub fn from_params(params: &MeshingParams) -> FrostResult<Self> {
        Self::new(params.threads)
    }

    pub fn with_cache(mut self, cache: ParticleCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Lattice cell count above which extraction runs chunked on the pool.
    pub fn with_sparse_threshold(mut self, threshold: u64) -> Self {
        self.sparse_threshold = threshold;
        self
    }

    pub fn cache(&self) -> Option<&ParticleCache> {
        self.cache.as_ref()
    }

    pub fn cache_mut(&mut self) -> Option<&mut ParticleCache> {
        self.cache.as_mut()
    }

    #[inline]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Meshes `source` into `out`. See [`MeshBuildSession::build_with_cancel`].
    pub fn build(
        &mut self,
        source: &mut dyn ParticleIstream,
        params: &MeshingParams,
        progress: &dyn ProgressLogger,
        out: &mut TriMesh,
    ) -> FrostResult<BuildReport> {
        self.build_with_cancel(source, params, progress, CancelToken::new(), out)
    }

    /// Meshes `source` into `out`, aborting when `cancel` trips or the logger
    /// refuses a progress update. `out` is empty after any error, including
    /// [`FrostError::Cancelled`].
    pub fn build_with_cancel(
        &mut self,
        source: &mut dyn ParticleIstream,
        params: &MeshingParams,
        progress: &dyn ProgressLogger,
        cancel: CancelToken,
        out: &mut TriMesh,
    ) -> FrostResult<BuildReport> {
        out.clear_keep_capacity();
        let progress = BuildProgress::new(progress, cancel);
        let result = self.run(source, params, &progress, out);
        if let Err(e) = &result {
            out.clear_keep_capacity();
            if e.is_cancelled() {
                log::info!("mesh build cancelled at {:.0}%", progress.reported());
            }
        }
        result
    }

    fn run(
        &mut self,
        source: &mut dyn ParticleIstream,
        params: &MeshingParams,
        progress: &BuildProgress<'_>,
        out: &mut TriMesh,
    ) -> FrostResult<BuildReport> {
        params.validate()?;
        if params.threads != 0 && params.threads != self.pool.threads() {
            log::debug!("resizing worker pool from {} to {} threads", self.pool.threads(), params.threads);
            self.pool = WorkerPool::new(params.threads)?;
        }
        let t_total = Instant::now();
        progress.report(LOAD.0)?;

        let t0 = Instant::now();
        let (mut particles, cache_hit) = self.load(source, params, progress)?;
        let discarded = prepare_particles(&mut particles, params)?;
        if discarded > 0 {
            log::warn!("discarded {discarded} particles with a non-finite position or non-positive radius");
        }
        progress.report(LOAD.1)?;
        log::info!(
            target: "perf",
            "ms={} load particles={} discarded={} cache_hit={}",
            t0.elapsed().as_millis(),
            particles.len(),
            discarded,
            cache_hit
        );

        let mut report = BuildReport {
            particle_count: particles.len(),
            discarded_count: discarded,
            mode: None,
            meshing_voxel_length: 0.0,
            vertex_count: 0,
            face_count: 0,
            cache_hit,
        };
        if particles.is_empty() {
            log::info!("no particles to mesh");
            progress.report(POST.1)?;
            return Ok(report);
        }

        let radii = particles.radii()?.to_vec();
        let (_, max_radius) = radius_range(&radii);
        let voxel_length = params.meshing_voxel_length(max_radius);
        if !voxel_length.is_finite() || voxel_length <= 0.0 {
            return Err(FrostError::config(
                "meshing_voxel_length",
                format!("{voxel_length} must be > 0"),
            ));
        }
        report.meshing_voxel_length = voxel_length;

        let material_channel = needs_vertex_material(params);
        let mut channels = params.channels.clone();
        if material_channel && !channels.iter().any(|c| c == names::MTL_INDEX) {
            channels.push(names::MTL_INDEX.to_string());
        }

        match params.method {
            MeshingMethod::VertexCloud => {
                primitives::vertex_cloud(&particles, &params.channels, out)?;
            }
            MeshingMethod::Tetrahedron => {
                primitives::tetrahedra(&particles, &channels, out)?;
                assign_materials(out, params)?;
            }
            MeshingMethod::Geometry => {
                let settings = InstanceSettings {
                    shapes: params.geometry_shapes.clone(),
                    selection: params.geometry_selection,
                    orientation: params.geometry_orientation.clone(),
                    material: geometry_material(params),
                };
                primitives::instance_shapes(&particles, &settings, &params.channels, out)?;
            }
            MeshingMethod::UnionOfSpheres
            | MeshingMethod::Metaballs
            | MeshingMethod::ZhuBridson
            | MeshingMethod::Anisotropic => {
                let positions = particles.positions()?;
                let field = self.build_field(params, positions, radii, voxel_length, progress)?;
                let settings = ExtractSettings {
                    voxel_length,
                    refinement: params.refinement,
                    sparse_threshold: self.sparse_threshold,
                    roi: params.mesh_culling_box,
                    force_mode: None,
                };
                let stats = extract_surface(field.as_ref(), &settings, &self.pool, progress, EXTRACT, out)?;
                report.mode = Some(stats.mode);

                let t_post = Instant::now();
                propagate_channels(
                    out,
                    field.as_ref(),
                    &particles,
                    &channels,
                    &self.pool,
                    progress,
                    (POST.0, POST.0 + 0.8 * (POST.1 - POST.0)),
                )?;
                assign_materials(out, params)?;
                log::info!(
                    target: "perf",
                    "ms={} post channels={} vertices={}",
                    t_post.elapsed().as_millis(),
                    channels.len(),
                    out.vertex_count()
                );
            }
        }
        if material_channel && !params.channels.iter().any(|c| c == names::MTL_INDEX) {
            out.remove_vertex_channel(names::MTL_INDEX);
        }

        if let Some(roi) = &params.mesh_culling_box {
            cull_to_box(out, roi, voxel_length);
        }
        if let Some(max) = params.max_faces {
            clamp_faces(out, max);
        }
        progress.report(POST.1)?;

        report.vertex_count = out.vertex_count();
        report.face_count = out.face_count();
        log::info!(
            target: "perf",
            "ms={} build method={} particles={} vertices={} faces={} mode={}",
            t_total.elapsed().as_millis(),
            params.method.as_str(),
            report.particle_count,
            report.vertex_count,
            report.face_count,
            report.mode.map_or("direct", ExtractMode::as_str)
        );
        Ok(report)
    }

    /// Pulls the source (or reuses the cached load) with the channels `params` need.
    fn load(
        &mut self,
        source: &mut dyn ParticleIstream,
        params: &MeshingParams,
        progress: &BuildProgress<'_>,
    ) -> FrostResult<(ParticleArray, bool)> {
        let (request, synthesize_ids) = requested_channels(source.native_channel_map(), params)?;
        let key = CacheKey {
            channels: request.clone(),
            fraction: params.load_fraction,
            load_mode: params.load_mode,
            culling_box: params.particle_culling_box,
        };
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            return Ok((cached.clone(), true));
        }

        let mut particles = match params.particle_culling_box {
            Some(bounds) => {
                let mut culled = BoxCullingIstream::new(&mut *source, bounds)?;
                pull_all(&mut culled, request, progress)?
            }
            None => pull_all(source, request, progress)?,
        };
        if synthesize_ids {
            ensure_ids(&mut particles, 0)?;
        }
        let skipped = apply_load_fraction(&mut particles, params.load_mode, params.load_fraction)?;
        if skipped > 0 {
            log::debug!(
                "partial load kept {} particles ({:.0}%)",
                particles.len(),
                params.load_fraction * 100.0
            );
        }
        if let Some(cache) = self.cache.as_mut() {
            cache.insert(key, particles.clone());
        }
        Ok((particles, false))
    }

    fn build_field(
        &self,
        params: &MeshingParams,
        positions: Vec<Vec3>,
        radii: Vec<f32>,
        voxel_length: f32,
        progress: &BuildProgress<'_>,
    ) -> FrostResult<Box<dyn ImplicitField>> {
        Ok(match params.method {
            MeshingMethod::UnionOfSpheres => {
                Box::new(UnionOfSpheresField::new(positions, radii, voxel_length)?)
            }
            MeshingMethod::Metaballs => Box::new(MetaballField::new(
                positions,
                radii,
                params.metaball_radius_scale,
                params.metaball_isosurface_level,
            )?),
            MeshingMethod::ZhuBridson => {
                Box::new(ZhuBridsonField::new(positions, radii, params.zhu_bridson)?)
            }
            MeshingMethod::Anisotropic => {
                let estimate = anisotropy::estimate(
                    &positions,
                    &radii,
                    &params.anisotropy,
                    &self.pool,
                    progress,
                    ANISOTROPY,
                )?;
                Box::new(AnisotropicField::new(
                    estimate,
                    radii,
                    &params.anisotropy,
                    params.anisotropic_isosurface_level,
                )?)
            }
            other => {
                return Err(FrostError::config(
                    "meshing_method",
                    format!("{} does not define an implicit surface", other.as_str()),
                ));
            }
        })
    }
}

fn pull_all(
    stream: &mut dyn ParticleIstream,
    request: ChannelMap,
    progress: &BuildProgress<'_>,
) -> FrostResult<ParticleArray> {
    stream.set_channel_map(request.clone())?;
    let hint = stream.particle_count_hint().filter(|&n| n > 0);
    let mut out = ParticleArray::new(request);
    loop {
        let mut n = READ_BATCH;
        let more = stream.get_particles(&mut out, &mut n)?;
        match hint {
            Some(total) => {
                let frac = (out.len() as f32 / total as f32).min(1.0);
                progress.report(LOAD.0 + 0.5 * (LOAD.1 - LOAD.0) * frac)?;
            }
            None => progress.check()?,
        }
        if !more {
            return Ok(out);
        }
    }
}

/// Radius source, animation, randomisation, motion offset, then the validity
/// filter. Returns the discarded count.
fn prepare_particles(particles: &mut ParticleArray, params: &MeshingParams) -> FrostResult<usize> {
    if !params.use_radius_channel {
        set_constant_radius(particles, params.radius)?;
    }
    if let Some(scale) = &params.radius_scale {
        animate_radius(particles, scale.mode, &scale.curve, scale.time)?;
    }
    if let Some(v) = &params.radius_variation {
        randomize_radius(particles, v.variation, v.seed)?;
    }
    if params.motion_offset != 0.0 {
        offset_by_velocity(particles, params.motion_offset)?;
    }
    Ok(discard_invalid(particles)?)
}

/// Channel layout to request from a source whose native layout is `native`.
/// Also returns whether `ID` must be synthesized after loading.
fn requested_channels(native: &ChannelMap, params: &MeshingParams) -> FrostResult<(ChannelMap, bool)> {
    let mut map = ChannelMap::new();
    let float = |map: &mut ChannelMap, name: &str, arity: usize| -> FrostResult<()> {
        native.require_float(name, arity)?;
        map.push(ChannelDesc::new(name, DataType::Float32, arity))?;
        Ok(())
    };
    let same_as_native = |map: &mut ChannelMap, name: &str| -> FrostResult<()> {
        let desc = native
            .get(name)
            .ok_or_else(|| ParticleError::MissingChannel(name.to_string()))?;
        map.push(desc.clone())?;
        Ok(())
    };

    float(&mut map, names::POSITION, 3)?;
    if params.use_radius_channel {
        float(&mut map, names::RADIUS, 1)?;
    }

    let geometry = params.method == MeshingMethod::Geometry;
    let needs_ids = params.radius_variation.is_some()
        || (params.load_fraction < 1.0 && params.load_mode == LoadMode::Id)
        || (geometry && matches!(params.geometry_selection, primitives::ShapeSelection::RandomById { .. }));
    let synthesize_ids = needs_ids && !native.has(names::ID);
    if needs_ids && !synthesize_ids {
        map.push(ChannelDesc::new(names::ID, DataType::Int64, 1))?;
    }

    if params.motion_offset != 0.0 {
        if native.has(names::VELOCITY) {
            float(&mut map, names::VELOCITY, 3)?;
        } else {
            log::warn!("source has no `{}` channel; motion offset ignored", names::VELOCITY);
        }
    }
    if let Some(scale) = &params.radius_scale {
        match scale.mode {
            RadiusAnimationMode::AbsoluteTime => {}
            RadiusAnimationMode::Age => float(&mut map, names::AGE, 1)?,
            RadiusAnimationMode::LifePercent => {
                float(&mut map, names::AGE, 1)?;
                float(&mut map, names::LIFE_SPAN, 1)?;
            }
        }
    }

    let wants_mtl = needs_vertex_material(params)
        || (geometry && params.material_mode == MaterialMode::MtlIndexChannel);
    if wants_mtl {
        if native.has(names::MTL_INDEX) {
            same_as_native(&mut map, names::MTL_INDEX)?;
        } else {
            log::warn!("source has no `{}` channel; material ids default to 0", names::MTL_INDEX);
            map.push(ChannelDesc::new(names::MTL_INDEX, DataType::Int32, 1))?;
        }
    }

    if geometry {
        if params.geometry_selection == primitives::ShapeSelection::ShapeIndexChannel {
            same_as_native(&mut map, names::SHAPE_INDEX)?;
        }
        match &params.geometry_orientation {
            primitives::Orientation::OrientationChannel => float(&mut map, names::ORIENTATION, 4)?,
            primitives::Orientation::VectorChannel(name) => float(&mut map, name.as_str(), 3)?,
            primitives::Orientation::None | primitives::Orientation::Specify(_) => {}
        }
    }

    for name in &params.channels {
        if !map.has(name) {
            same_as_native(&mut map, name.as_str())?;
        }
    }
    Ok((map, synthesize_ids))
}

/// Whether face materials are voted from a `MtlIndex` vertex channel.
fn needs_vertex_material(params: &MeshingParams) -> bool {
    params.material_mode == MaterialMode::MtlIndexChannel
        && (params.method.is_implicit() || params.method == MeshingMethod::Tetrahedron)
}

fn geometry_material(params: &MeshingParams) -> GeometryMaterial {
    match params.material_mode {
        MaterialMode::Single => GeometryMaterial::Single(0),
        MaterialMode::MtlIndexChannel => GeometryMaterial::MtlIndexChannel {
            undefined: params.undefined_material_id,
        },
        MaterialMode::ShapeNumber => GeometryMaterial::ShapeNumber,
        MaterialMode::MaterialIdFromGeometry | MaterialMode::MaterialFromGeometry => {
            GeometryMaterial::FromGeometry
        }
    }
}

/// Face `MaterialID` for meshes not built from instanced shapes.
fn assign_materials(mesh: &mut TriMesh, params: &MeshingParams) -> FrostResult<()> {
    match params.material_mode {
        MaterialMode::MtlIndexChannel => {
            vote_face_materials(mesh, names::MTL_INDEX, params.undefined_material_id)?;
        }
        MaterialMode::Single => set_single_material(mesh, 0)?,
        MaterialMode::ShapeNumber => {
            log::warn!(
                "material mode shape_number needs geometry meshing; {} uses a single material",
                params.method.as_str()
            );
            set_single_material(mesh, 0)?;
        }
        MaterialMode::MaterialIdFromGeometry | MaterialMode::MaterialFromGeometry => {
            log::debug!(
                "no source geometry for {}; using a single material",
                params.method.as_str()
            );
            set_single_material(mesh, 0)?;
        }
    }
    Ok(())
}
