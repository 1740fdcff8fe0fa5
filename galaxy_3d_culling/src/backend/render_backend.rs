/// RenderBackend trait: what the culling core calls on the renderer.
///
/// The backend owns GPU-facing state. The culling core only creates opaque
/// per-instance handles, pushes state changes through them, and hands the
/// assembled frame over with `render_scene`.
///
/// The backend is injected into the `SceneManager` at construction
/// (`Arc<parking_lot::Mutex<dyn RenderBackend>>`); there is no global.

use glam::{Mat4, Vec3};
use crate::scene::{CullResult, DebugDrawMode, ShadowCastingSetting, AABB};
use crate::shadow::CascadeShadow;
use super::resource_storage::{ParamValue, ShCoefficients};
use super::{BackendHandle, ResourceId};

// ============================================================================
// Frame data
// ============================================================================

/// What a `render_scene` call draws into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// The camera's viewport
    Camera,
    /// One cube face of a reflection probe
    ReflectionProbe { probe: BackendHandle, face: u32 },
}

/// One shadow map pass: a cascade of a directional light, a cube face /
/// paraboloid of an omni light, or a spot light.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowPass {
    pub light: BackendHandle,
    pub pass: u32,
    pub casters: Vec<BackendHandle>,
}

/// One SDFGI region update and the geometry that contributes to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SdfgiRegionPass {
    pub region: AABB,
    pub geometry: Vec<BackendHandle>,
}

/// Everything the backend needs to render one viewpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRenderData {
    pub target: RenderTarget,
    /// Viewpoint world transform
    pub transform: Mat4,
    pub projection: Mat4,
    pub environment: Option<ResourceId>,
    pub camera_attributes: Option<ResourceId>,
    pub shadow_atlas: Option<ResourceId>,
    pub reflection_atlas: Option<ResourceId>,
    pub debug_draw: DebugDrawMode,
    /// Visible lights, geometry, probes, decals
    pub cull: CullResult,
    pub directional_lights: Vec<BackendHandle>,
    pub directional_shadow_passes: Vec<ShadowPass>,
    pub positional_shadow_passes: Vec<ShadowPass>,
    pub sdfgi_regions: Vec<SdfgiRegionPass>,
}

// ============================================================================
// Backend trait
// ============================================================================

pub trait RenderBackend: Send {
    // ===== INSTANCE HANDLES =====

    fn geometry_instance_create(&mut self, base: ResourceId) -> BackendHandle;
    fn light_instance_create(&mut self, base: ResourceId) -> BackendHandle;
    fn reflection_probe_instance_create(&mut self, base: ResourceId) -> BackendHandle;
    fn decal_instance_create(&mut self, base: ResourceId) -> BackendHandle;
    fn gi_probe_instance_create(&mut self, base: ResourceId) -> BackendHandle;
    fn lightmap_instance_create(&mut self, base: ResourceId) -> BackendHandle;
    fn particles_collision_instance_create(&mut self, base: ResourceId) -> BackendHandle;

    /// Release any handle created above.
    fn instance_free(&mut self, handle: BackendHandle);

    fn instance_set_transform(&mut self, handle: BackendHandle, transform: &Mat4, aabb: &AABB);

    // ===== GEOMETRY STATE =====

    /// Effective material per surface (overrides already applied).
    fn geometry_instance_set_materials(&mut self, handle: BackendHandle, materials: &[ResourceId]);
    fn geometry_instance_set_skeleton(&mut self, handle: BackendHandle, skeleton: Option<ResourceId>);
    fn geometry_instance_set_layer_mask(&mut self, handle: BackendHandle, mask: u32);
    fn geometry_instance_set_cast_shadows(&mut self, handle: BackendHandle, setting: ShadowCastingSetting);
    /// (parameter buffer slot, value)
    fn geometry_instance_set_instance_parameters(&mut self, handle: BackendHandle, parameters: &[(u32, ParamValue)]);
    fn geometry_instance_set_lightmap_capture(&mut self, handle: BackendHandle, capture: Option<&ShCoefficients>);

    // ===== PAIRING =====

    fn geometry_instance_pair_light_instances(&mut self, handle: BackendHandle, lights: &[BackendHandle]);
    fn geometry_instance_pair_reflection_probe_instances(&mut self, handle: BackendHandle, probes: &[BackendHandle]);
    fn geometry_instance_pair_decal_instances(&mut self, handle: BackendHandle, decals: &[BackendHandle]);
    fn geometry_instance_pair_gi_probe_instances(&mut self, handle: BackendHandle, probes: &[BackendHandle]);

    // ===== ATLASES =====

    fn shadow_atlas_create(&mut self, resolution: u32) -> ResourceId;
    fn reflection_atlas_create(&mut self) -> ResourceId;
    fn reflection_atlas_set_size(&mut self, atlas: ResourceId, size: u32, count: u32);
    fn atlas_free(&mut self, atlas: ResourceId);

    // ===== SHADOWS =====

    /// Place or keep `light` in the shadow atlas.
    ///
    /// Returns `true` when the light's shadow must be redrawn: new slot,
    /// slot resized, or `version` differs from the last one seen.
    fn shadow_atlas_update_light(&mut self, atlas: ResourceId, light: BackendHandle, coverage: f32, version: u64) -> bool;

    fn light_instance_set_shadow_transform(&mut self, light: BackendHandle, cascade: usize, shadow: &CascadeShadow);

    // ===== REFLECTION PROBES =====

    /// Renderer heuristic: the cached reflection is stale (atlas slot lost, ...).
    fn reflection_probe_instance_needs_redraw(&self, probe: BackendHandle) -> bool;

    /// Acquire an atlas slot. `false` means none is free this frame.
    fn reflection_probe_instance_begin_render(&mut self, probe: BackendHandle, atlas: ResourceId) -> bool;

    fn reflection_probe_render_roughness_layer(&mut self, probe: BackendHandle, layer: u32);

    // ===== GI =====

    fn gi_probe_needs_update(&self, probe: BackendHandle) -> bool;

    fn gi_probe_update(&mut self, probe: BackendHandle, lights: &[BackendHandle], dynamic_geometry: &[BackendHandle]);

    /// SDFGI regions needing a re-voxelization around the camera.
    fn sdfgi_pending_regions(&mut self, environment: Option<ResourceId>, camera_position: Vec3) -> Vec<AABB>;

    // ===== PARTICLES =====

    fn particles_set_colliders(&mut self, particles: BackendHandle, colliders: &[BackendHandle]);

    // ===== FRAME =====

    fn render_scene(&mut self, data: &SceneRenderData);
}
