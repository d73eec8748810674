//! On-disk meshing configuration and the flattened per-build parameter record.

use frost_geom::{Aabb, Vec3};
use frost_mesh::anisotropy::AnisotropyParams;
use frost_mesh::constants::MIN_BLEND_RADIUS_SCALE;
use frost_mesh::kernels::ZhuBridsonParams;
use frost_mesh::primitives::{Orientation, ShapeKind, ShapeSelection};
use frost_particles::transforms::{LoadMode, RadiusAnimationMode, ScaleCurve};
use serde::Deserialize;

use crate::error::{FrostError, FrostResult};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct MeshingConfig {
    #[serde(default)] pub meshing: Meshing,
    #[serde(default)] pub radius: Radius,
    #[serde(default)] pub metaballs: Metaballs,
    #[serde(default)] pub zhu_bridson: ZhuBridson,
    #[serde(default)] pub anisotropic: Anisotropic,
    #[serde(default)] pub material: Material,
    #[serde(default)] pub culling: Culling,
    #[serde(default)] pub channels: Channels,
    #[serde(default)] pub geometry: Geometry,
    #[serde(default)] pub load: Load,
}

// --- Enumerations ---

/// Maps a legacy integer code through `table`; `None` slots are known but unsupported codes.
fn from_code<T: Copy>(parameter: &str, code: i32, table: &[Option<T>]) -> FrostResult<T> {
    match usize::try_from(code).ok().and_then(|i| table.get(i)) {
        Some(Some(v)) => Ok(*v),
        Some(None) => Err(FrostError::config(parameter, format!("code {code} is not supported"))),
        None => Err(FrostError::config(parameter, format!("unknown code {code}"))),
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MeshingMethod { Tetrahedron, Geometry, UnionOfSpheres, Metaballs, ZhuBridson, VertexCloud, Anisotropic }

impl MeshingMethod {
    /// Methods that mesh an implicit field rather than placing shapes per particle.
    pub fn is_implicit(self) -> bool {
        matches!(
            self,
            MeshingMethod::UnionOfSpheres | MeshingMethod::Metaballs | MeshingMethod::ZhuBridson | MeshingMethod::Anisotropic
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeshingMethod::Tetrahedron => "tetrahedron",
            MeshingMethod::Geometry => "geometry",
            MeshingMethod::UnionOfSpheres => "union_of_spheres",
            MeshingMethod::Metaballs => "metaballs",
            MeshingMethod::ZhuBridson => "zhu_bridson",
            MeshingMethod::VertexCloud => "vertex_cloud",
            MeshingMethod::Anisotropic => "anisotropic",
        }
    }
}

impl TryFrom<i32> for MeshingMethod {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        use MeshingMethod::*;
        from_code(
            "meshing_method",
            code,
            &[Some(Tetrahedron), Some(Geometry), Some(UnionOfSpheres), Some(Metaballs), Some(ZhuBridson), Some(VertexCloud), Some(Anisotropic)],
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode { SubdivideMaxRadius, VoxelLength }

impl TryFrom<i32> for ResolutionMode {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        from_code("meshing_resolution_mode", code, &[Some(ResolutionMode::SubdivideMaxRadius), Some(ResolutionMode::VoxelLength)])
    }
}

/// Which set of resolution and refinement settings a build uses.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Quality { Render, Viewport }

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewportLoadMode { Head, Stride, Id }

impl ViewportLoadMode {
    pub fn load_mode(self) -> LoadMode {
        match self {
            ViewportLoadMode::Head => LoadMode::Head,
            ViewportLoadMode::Stride => LoadMode::Stride,
            ViewportLoadMode::Id => LoadMode::Id,
        }
    }
}

impl TryFrom<i32> for ViewportLoadMode {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        use ViewportLoadMode::*;
        from_code("viewport_load_mode", code, &[Some(Head), Some(Stride), Some(Id)])
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RadiusAnimation { AbsoluteTime, Age, LifePercent }

impl RadiusAnimation {
    pub fn mode(self) -> RadiusAnimationMode {
        match self {
            RadiusAnimation::AbsoluteTime => RadiusAnimationMode::AbsoluteTime,
            RadiusAnimation::Age => RadiusAnimationMode::Age,
            RadiusAnimation::LifePercent => RadiusAnimationMode::LifePercent,
        }
    }
}

impl TryFrom<i32> for RadiusAnimation {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        use RadiusAnimation::*;
        from_code("radius_animation_mode", code, &[Some(AbsoluteTime), Some(Age), Some(LifePercent)])
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType { Plane, Sprite, Tetrahedron, Box, Sphere20 }

impl GeometryType {
    pub fn shape_kind(self) -> ShapeKind {
        match self {
            GeometryType::Plane => ShapeKind::Plane,
            GeometryType::Sprite => ShapeKind::Sprite,
            GeometryType::Tetrahedron => ShapeKind::Tetrahedron,
            GeometryType::Box => ShapeKind::Box,
            GeometryType::Sphere20 => ShapeKind::Sphere20,
        }
    }
}

impl TryFrom<i32> for GeometryType {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        use GeometryType::*;
        // 3 is custom scene geometry.
        from_code("geometry_type", code, &[Some(Plane), Some(Sprite), Some(Tetrahedron), None, Some(Box), Some(Sphere20)])
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeometrySelection { Cycle, RandomById, ShapeIndexChannel }

impl TryFrom<i32> for GeometrySelection {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        use GeometrySelection::*;
        from_code("geometry_selection_mode", code, &[Some(Cycle), Some(RandomById), Some(ShapeIndexChannel)])
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode { OrientationChannel, VectorChannel, Specify }

impl TryFrom<i32> for OrientationMode {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        use OrientationMode::*;
        // 0 and 1 orient toward scene objects.
        from_code("geometry_orientation_mode", code, &[None, None, Some(OrientationChannel), Some(VectorChannel), Some(Specify)])
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaterialMode { Single, MtlIndexChannel, ShapeNumber, MaterialIdFromGeometry, MaterialFromGeometry }

impl TryFrom<i32> for MaterialMode {
    type Error = FrostError;
    fn try_from(code: i32) -> FrostResult<Self> {
        use MaterialMode::*;
        from_code(
            "material_mode",
            code,
            &[Some(Single), Some(MtlIndexChannel), Some(ShapeNumber), Some(MaterialIdFromGeometry), Some(MaterialFromGeometry)],
        )
    }
}

// --- Sections ---

#[derive(Clone, Debug, Deserialize)]
pub struct Meshing {
    #[serde(default = "default_method")] pub method: MeshingMethod,
    #[serde(default = "default_quality")] pub quality: Quality,
    #[serde(default = "default_resolution_mode")] pub resolution_mode: ResolutionMode,
    #[serde(default = "default_render_resolution")] pub render_resolution: f32,
    #[serde(default = "default_viewport_resolution")] pub viewport_resolution: f32,
    #[serde(default = "default_render_refinement")] pub render_refinement: u32,
    #[serde(default)] pub viewport_refinement: u32,
    #[serde(default = "default_render_voxel_length")] pub render_voxel_length: f32,
    #[serde(default = "default_viewport_voxel_length")] pub viewport_voxel_length: f32,
    /// Worker threads. 0 keeps the session's pool, which defaults to the available parallelism.
    #[serde(default)] pub threads: usize,
    #[serde(default)] pub max_faces: Option<usize>,
}
fn default_method() -> MeshingMethod { MeshingMethod::UnionOfSpheres }
fn default_quality() -> Quality { Quality::Render }
fn default_resolution_mode() -> ResolutionMode { ResolutionMode::SubdivideMaxRadius }
fn default_render_resolution() -> f32 { 3.0 }
fn default_viewport_resolution() -> f32 { 1.5 }
fn default_render_refinement() -> u32 { 10 }
fn default_render_voxel_length() -> f32 { 1.7 }
fn default_viewport_voxel_length() -> f32 { 3.3 }
impl Default for Meshing {
    fn default() -> Self {
        Self {
            method: default_method(),
            quality: default_quality(),
            resolution_mode: default_resolution_mode(),
            render_resolution: default_render_resolution(),
            viewport_resolution: default_viewport_resolution(),
            render_refinement: default_render_refinement(),
            viewport_refinement: 0,
            render_voxel_length: default_render_voxel_length(),
            viewport_voxel_length: default_viewport_voxel_length(),
            threads: 0,
            max_faces: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Radius {
    #[serde(default = "default_radius")] pub radius: f32,
    #[serde(default)] pub use_radius_channel: bool,
    #[serde(default)] pub randomize: bool,
    /// Percent, 0 to 99.
    #[serde(default = "default_variation")] pub random_variation: f32,
    #[serde(default = "default_seed")] pub random_seed: u32,
    #[serde(default)] pub enable_scale: bool,
    #[serde(default = "default_scale")] pub scale: f32,
    #[serde(default = "default_animation")] pub animation_mode: RadiusAnimation,
    /// `(x, scale)` keys; empty means the constant `scale`.
    #[serde(default)] pub scale_keys: Vec<[f32; 2]>,
    #[serde(default)] pub time: f32,
    /// Motion sample offset in seconds applied through `Velocity`.
    #[serde(default)] pub motion_offset: f32,
}
fn default_radius() -> f32 { 5.0 }
fn default_variation() -> f32 { 40.0 }
fn default_seed() -> u32 { 12345 }
fn default_scale() -> f32 { 1.0 }
fn default_animation() -> RadiusAnimation { RadiusAnimation::AbsoluteTime }
impl Default for Radius {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            use_radius_channel: false,
            randomize: false,
            random_variation: default_variation(),
            random_seed: default_seed(),
            enable_scale: false,
            scale: default_scale(),
            animation_mode: default_animation(),
            scale_keys: Vec::new(),
            time: 0.0,
            motion_offset: 0.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Metaballs {
    #[serde(default = "default_metaball_scale")] pub radius_scale: f32,
    #[serde(default = "default_metaball_level")] pub isosurface_level: f32,
}
fn default_metaball_scale() -> f32 { 1.5 }
fn default_metaball_level() -> f32 { 0.3 }
impl Default for Metaballs { fn default() -> Self { Self { radius_scale: default_metaball_scale(), isosurface_level: default_metaball_level() } } }

#[derive(Clone, Debug, Deserialize)]
pub struct ZhuBridson {
    #[serde(default = "default_blend_scale")] pub blend_radius_scale: f32,
    #[serde(default)] pub low_density_trimming: bool,
    #[serde(default = "default_trim_threshold")] pub trimming_threshold: f32,
    #[serde(default = "default_trim_strength")] pub trimming_strength: f32,
}
fn default_blend_scale() -> f32 { 1.7 }
fn default_trim_threshold() -> f32 { 1.0 }
fn default_trim_strength() -> f32 { 15.0 }
impl Default for ZhuBridson {
    fn default() -> Self {
        Self {
            blend_radius_scale: default_blend_scale(),
            low_density_trimming: false,
            trimming_threshold: default_trim_threshold(),
            trimming_strength: default_trim_strength(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Anisotropic {
    #[serde(default = "default_aniso_radius_scale")] pub radius_scale: f32,
    #[serde(default = "default_aniso_window")] pub window_scale: f32,
    #[serde(default = "default_aniso_level")] pub isosurface_level: f32,
    #[serde(default = "default_kr")] pub max_anisotropy: f32,
    #[serde(default = "default_ne")] pub min_neighbor_count: usize,
    #[serde(default = "default_true")] pub position_smoothing: bool,
    #[serde(default = "default_aniso_window")] pub smoothing_window_scale: f32,
    #[serde(default = "default_smoothing_weight")] pub smoothing_weight: f32,
}
fn default_aniso_radius_scale() -> f32 { 4.0 }
fn default_aniso_window() -> f32 { 2.0 }
fn default_aniso_level() -> f32 { 0.5 }
fn default_kr() -> f32 { 4.0 }
fn default_ne() -> usize { 25 }
fn default_true() -> bool { true }
fn default_smoothing_weight() -> f32 { 0.9 }
impl Default for Anisotropic {
    fn default() -> Self {
        Self {
            radius_scale: default_aniso_radius_scale(),
            window_scale: default_aniso_window(),
            isosurface_level: default_aniso_level(),
            max_anisotropy: default_kr(),
            min_neighbor_count: default_ne(),
            position_smoothing: true,
            smoothing_window_scale: default_aniso_window(),
            smoothing_weight: default_smoothing_weight(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Material {
    #[serde(default = "default_material_mode")] pub mode: MaterialMode,
    #[serde(default = "default_undefined_material")] pub undefined_material_id: u16,
}
fn default_material_mode() -> MaterialMode { MaterialMode::MaterialIdFromGeometry }
fn default_undefined_material() -> u16 { 100 }
impl Default for Material { fn default() -> Self { Self { mode: default_material_mode(), undefined_material_id: default_undefined_material() } } }

/// Axis-aligned box given by its center and edge lengths.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct BoxConfig {
    pub center: [f32; 3],
    pub size: [f32; 3],
}

impl BoxConfig {
    pub fn aabb(&self) -> Aabb {
        let c = Vec3::from_array(self.center);
        let h = Vec3::from_array(self.size) * 0.5;
        Aabb::new(c - h, c + h)
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Culling {
    /// Restricts which particles feed the kernels.
    #[serde(default)] pub particle_box: Option<BoxConfig>,
    /// Region of interest; faces outside it are removed after extraction.
    #[serde(default)] pub mesh_box: Option<BoxConfig>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Channels {
    /// Particle channels copied onto the output vertices.
    #[serde(default)] pub propagate: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Geometry {
    #[serde(default = "default_geometry_types")] pub types: Vec<GeometryType>,
    #[serde(default = "default_selection")] pub selection: GeometrySelection,
    #[serde(default = "default_seed")] pub selection_seed: u32,
    #[serde(default = "default_orientation")] pub orientation: OrientationMode,
    #[serde(default = "default_vector_channel")] pub vector_channel: String,
    /// Euler angles in degrees for `specify`.
    #[serde(default)] pub orientation_degrees: [f32; 3],
}
fn default_geometry_types() -> Vec<GeometryType> { vec![GeometryType::Plane] }
fn default_selection() -> GeometrySelection { GeometrySelection::Cycle }
fn default_orientation() -> OrientationMode { OrientationMode::Specify }
fn default_vector_channel() -> String { "Velocity".into() }
impl Default for Geometry {
    fn default() -> Self {
        Self {
            types: default_geometry_types(),
            selection: default_selection(),
            selection_seed: default_seed(),
            orientation: default_orientation(),
            vector_channel: default_vector_channel(),
            orientation_degrees: [0.0; 3],
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Load {
    /// Percent of particles loaded for viewport builds.
    #[serde(default = "default_load_percent")] pub viewport_percent: f32,
    #[serde(default = "default_load_mode")] pub viewport_mode: ViewportLoadMode,
}
fn default_load_percent() -> f32 { 100.0 }
fn default_load_mode() -> ViewportLoadMode { ViewportLoadMode::Head }
impl Default for Load { fn default() -> Self { Self { viewport_percent: default_load_percent(), viewport_mode: default_load_mode() } } }

// --- Flattened parameters ---

#[derive(Clone, Debug, PartialEq)]
pub struct RadiusScale {
    pub mode: RadiusAnimationMode,
    pub curve: ScaleCurve,
    pub time: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusVariation {
    /// Fraction in `[0, 1)`.
    pub variation: f32,
    pub seed: u32,
}

/// Immutable per-build parameters with the render/viewport choice resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshingParams {
    pub method: MeshingMethod,
    pub quality: Quality,
    pub resolution_mode: ResolutionMode,
    pub resolution: f32,
    pub voxel_length: f32,
    pub refinement: u32,
    pub threads: usize,
    pub max_faces: Option<usize>,

    pub radius: f32,
    pub use_radius_channel: bool,
    pub radius_scale: Option<RadiusScale>,
    pub radius_variation: Option<RadiusVariation>,
    pub motion_offset: f32,

    pub metaball_radius_scale: f32,
    pub metaball_isosurface_level: f32,
    pub zhu_bridson: ZhuBridsonParams,
    pub anisotropy: AnisotropyParams,
    pub anisotropic_isosurface_level: f32,

    pub material_mode: MaterialMode,
    pub undefined_material_id: u16,

    pub particle_culling_box: Option<Aabb>,
    pub mesh_culling_box: Option<Aabb>,
    pub channels: Vec<String>,

    pub geometry_shapes: Vec<ShapeKind>,
    pub geometry_selection: ShapeSelection,
    pub geometry_orientation: Orientation,

    /// 1.0 for render builds.
    pub load_fraction: f64,
    pub load_mode: LoadMode,
}

impl MeshingParams {
    pub fn from_config(cfg: &MeshingConfig) -> Self {
        let m = &cfg.meshing;
        let (resolution, voxel_length, refinement) = match m.quality {
            Quality::Render => (m.render_resolution, m.render_voxel_length, m.render_refinement),
            Quality::Viewport => (m.viewport_resolution, m.viewport_voxel_length, m.viewport_refinement),
        };
        let r = &cfg.radius;
        let radius_scale = r.enable_scale.then(|| RadiusScale {
            mode: r.animation_mode.mode(),
            curve: ScaleCurve {
                keys: if r.scale_keys.is_empty() {
                    vec![(0.0, r.scale)]
                } else {
                    r.scale_keys.iter().map(|k| (k[0], k[1])).collect()
                },
            },
            time: r.time,
        });
        let radius_variation = r.randomize.then(|| RadiusVariation {
            variation: r.random_variation / 100.0,
            seed: r.random_seed,
        });
        let a = &cfg.anisotropic;
        let g = &cfg.geometry;
        let geometry_selection = match g.selection {
            GeometrySelection::Cycle => ShapeSelection::Cycle,
            GeometrySelection::RandomById => ShapeSelection::RandomById { seed: g.selection_seed },
            GeometrySelection::ShapeIndexChannel => ShapeSelection::ShapeIndexChannel,
        };
        let geometry_orientation = match g.orientation {
            OrientationMode::OrientationChannel => Orientation::OrientationChannel,
            OrientationMode::VectorChannel => Orientation::VectorChannel(g.vector_channel.clone()),
            OrientationMode::Specify => Orientation::Specify(g.orientation_degrees),
        };
        let load_fraction = match m.quality {
            Quality::Render => 1.0,
            Quality::Viewport => f64::from(cfg.load.viewport_percent) / 100.0,
        };
        Self {
            method: m.method,
            quality: m.quality,
            resolution_mode: m.resolution_mode,
            resolution,
            voxel_length,
            refinement,
            threads: m.threads,
            max_faces: m.max_faces,
            radius: r.radius,
            use_radius_channel: r.use_radius_channel,
            radius_scale,
            radius_variation,
            motion_offset: r.motion_offset,
            metaball_radius_scale: cfg.metaballs.radius_scale,
            metaball_isosurface_level: cfg.metaballs.isosurface_level,
            zhu_bridson: ZhuBridsonParams {
                blend_radius_scale: cfg.zhu_bridson.blend_radius_scale,
                low_density_trimming: cfg.zhu_bridson.low_density_trimming,
                trimming_threshold: cfg.zhu_bridson.trimming_threshold,
                trimming_strength: cfg.zhu_bridson.trimming_strength,
            },
            anisotropy: AnisotropyParams {
                compact_support_scale: a.radius_scale,
                window_scale: a.window_scale,
                max_anisotropy: a.max_anisotropy,
                min_neighbor_count: a.min_neighbor_count,
                position_smoothing: a.position_smoothing,
                smoothing_window_scale: a.smoothing_window_scale,
                smoothing_weight: a.smoothing_weight,
            },
            anisotropic_isosurface_level: a.isosurface_level,
            material_mode: cfg.material.mode,
            undefined_material_id: cfg.material.undefined_material_id,
            particle_culling_box: cfg.culling.particle_box.map(|b| b.aabb()),
            mesh_culling_box: cfg.culling.mesh_box.map(|b| b.aabb()),
            channels: cfg.channels.propagate.clone(),
            geometry_shapes: g.types.iter().map(|t| t.shape_kind()).collect(),
            geometry_selection,
            geometry_orientation,
            load_fraction,
            load_mode: cfg.load.viewport_mode.load_mode(),
        }
    }

    /// Rejects values no build could use. Runs before any particle is read.
    pub fn validate(&self) -> FrostResult<()> {
        match self.resolution_mode {
            ResolutionMode::SubdivideMaxRadius => positive("meshing_resolution", self.resolution)?,
            ResolutionMode::VoxelLength => positive("meshing_voxel_length", self.voxel_length)?,
        }
        if self.refinement > MAX_REFINEMENT {
            return Err(FrostError::config(
                "vert_refinement_iterations",
                format!("{} exceeds {MAX_REFINEMENT}", self.refinement),
            ));
        }
        if !self.use_radius_channel {
            positive("radius", self.radius)?;
        }
        if let Some(v) = &self.radius_variation {
            if !(0.0..1.0).contains(&v.variation) {
                return Err(FrostError::config(
                    "radius_random_variation",
                    format!("{} percent must be within [0, 100)", v.variation * 100.0),
                ));
            }
        }
        if let Some(s) = &self.radius_scale {
            if s.curve.keys.iter().any(|&(x, y)| !x.is_finite() || !y.is_finite() || y < 0.0) {
                return Err(FrostError::config("radius_scale", "keys must be finite and non-negative"));
            }
        }
        if !self.motion_offset.is_finite() {
            return Err(FrostError::config("motion_offset", "must be finite"));
        }
        if !(0.0..=1.0).contains(&self.load_fraction) {
            return Err(FrostError::config(
                "viewport_load_percent",
                format!("{} must be within [0, 100]", self.load_fraction * 100.0),
            ));
        }
        for (name, b) in [("particle_culling_box", &self.particle_culling_box), ("mesh_culling_box", &self.mesh_culling_box)] {
            if let Some(b) = b {
                let ok = b.min.is_finite() && b.max.is_finite() && b.min.x <= b.max.x && b.min.y <= b.max.y && b.min.z <= b.max.z;
                if !ok {
                    return Err(FrostError::config(name, "size must be finite and non-negative"));
                }
            }
        }
        match self.method {
            MeshingMethod::Metaballs => {
                positive("metaball_radius_scale", self.metaball_radius_scale)?;
                positive("metaball_isosurface_level", self.metaball_isosurface_level)?;
            }
            MeshingMethod::ZhuBridson => {
                let blend = self.zhu_bridson.blend_radius_scale;
                if !blend.is_finite() || blend < MIN_BLEND_RADIUS_SCALE {
                    return Err(FrostError::config(
                        "zhu_bridson_blend_radius_scale",
                        format!("{blend} must be >= {MIN_BLEND_RADIUS_SCALE}"),
                    ));
                }
                if self.zhu_bridson.low_density_trimming {
                    positive("zhu_bridson_trimming_threshold", self.zhu_bridson.trimming_threshold)?;
                    positive("zhu_bridson_trimming_strength", self.zhu_bridson.trimming_strength)?;
                }
            }
            MeshingMethod::Anisotropic => {
                self.anisotropy.validate()?;
                positive("anisotropic_isosurface_level", self.anisotropic_isosurface_level)?;
            }
            MeshingMethod::Geometry => {
                if self.geometry_shapes.is_empty() {
                    return Err(FrostError::config("geometry_type", "no shapes listed"));
                }
            }
            MeshingMethod::UnionOfSpheres | MeshingMethod::VertexCloud | MeshingMethod::Tetrahedron => {}
        }
        Ok(())
    }

    /// Meshing voxel length for a particle set whose largest radius is `max_radius`.
    pub fn meshing_voxel_length(&self, max_radius: f32) -> f32 {
        match self.resolution_mode {
            ResolutionMode::SubdivideMaxRadius => max_radius / self.resolution,
            ResolutionMode::VoxelLength => self.voxel_length,
        }
    }
}

impl Default for MeshingParams {
    fn default() -> Self {
        Self::from_config(&MeshingConfig::default())
    }
}

/// Upper bound on per-vertex refinement iterations.
pub const MAX_REFINEMENT: u32 = 20;

fn positive(parameter: &str, v: f32) -> FrostResult<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(FrostError::config(parameter, format!("{v} must be > 0")))
    }
}

pub fn parse_params(s: &str) -> FrostResult<MeshingParams> {
    let cfg: MeshingConfig = toml::from_str(s)?;
    let params = MeshingParams::from_config(&cfg);
    params.validate()?;
    Ok(params)
}

pub fn load_params_from_path(path: &std::path::Path) -> FrostResult<MeshingParams> {
    let s = std::fs::read_to_string(path)?;
    parse_params(&s)
}
