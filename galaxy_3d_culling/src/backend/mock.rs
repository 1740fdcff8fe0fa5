/// Mock collaborators for unit/integration tests (no GPU required)
///
/// `MockBackend` records every call the culling core makes so tests can
/// assert on pairings, shadow redraws and submitted frames.
/// `MockResources` serves meshes, materials, lights and probes that tests
/// register (and delete) at will.

use glam::{Mat4, Vec3};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::scene::{InstanceKind, ShadowCastingSetting, AABB};
use crate::shadow::CascadeShadow;
use super::render_backend::{RenderBackend, SceneRenderData};
use super::resource_storage::{
    InstanceParameterDecl, LightInfo, LightmapInfo, ParamValue, ReflectionProbeInfo,
    ResourceStorage, ShCoefficients,
};
use super::{BackendHandle, ResourceId};

// ============================================================================
// Mock backend
// ============================================================================

/// Recording render backend.
#[derive(Debug, Default)]
pub struct MockBackend {
    next_id: u64,
    /// Name of every call, in order
    pub calls: Vec<&'static str>,
    /// Live handles and the base they were created from
    pub instances: FxHashMap<BackendHandle, ResourceId>,
    pub transforms: FxHashMap<BackendHandle, (Mat4, AABB)>,
    pub materials: FxHashMap<BackendHandle, Vec<ResourceId>>,
    pub skeletons: FxHashMap<BackendHandle, Option<ResourceId>>,
    pub layer_masks: FxHashMap<BackendHandle, u32>,
    pub cast_shadows: FxHashMap<BackendHandle, ShadowCastingSetting>,
    pub instance_parameters: FxHashMap<BackendHandle, Vec<(u32, ParamValue)>>,
    pub lightmap_captures: FxHashMap<BackendHandle, Option<ShCoefficients>>,
    /// Last pairing array sent per geometry handle
    pub light_pairs: FxHashMap<BackendHandle, Vec<BackendHandle>>,
    pub reflection_probe_pairs: FxHashMap<BackendHandle, Vec<BackendHandle>>,
    pub decal_pairs: FxHashMap<BackendHandle, Vec<BackendHandle>>,
    pub gi_probe_pairs: FxHashMap<BackendHandle, Vec<BackendHandle>>,
    /// Shadow atlas placement: light -> last version drawn
    pub shadow_versions: FxHashMap<BackendHandle, u64>,
    /// Lights reported as needing a redraw regardless of version
    pub force_shadow_redraw: FxHashSet<BackendHandle>,
    pub shadow_transforms: Vec<(BackendHandle, usize, CascadeShadow)>,
    pub reflection_atlas_sizes: FxHashMap<ResourceId, (u32, u32)>,
    pub probes_needing_redraw: FxHashSet<BackendHandle>,
    /// When false, `reflection_probe_instance_begin_render` refuses
    pub reflection_slots_full: bool,
    pub roughness_layers: Vec<(BackendHandle, u32)>,
    pub gi_probes_needing_update: FxHashSet<BackendHandle>,
    pub gi_updates: Vec<(BackendHandle, Vec<BackendHandle>, Vec<BackendHandle>)>,
    /// Regions returned by `sdfgi_pending_regions`
    pub sdfgi_regions: Vec<AABB>,
    pub particle_colliders: FxHashMap<BackendHandle, Vec<BackendHandle>>,
    pub frames: Vec<SceneRenderData>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded calls with this name.
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.iter().filter(|call| **call == name).count()
    }

    pub fn last_frame(&self) -> Option<&SceneRenderData> {
        self.frames.last()
    }

    fn create(&mut self, name: &'static str, base: ResourceId) -> BackendHandle {
        self.calls.push(name);
        self.next_id += 1;
        let handle = BackendHandle(self.next_id);
        self.instances.insert(handle, base);
        handle
    }

    fn next_resource(&mut self) -> ResourceId {
        self.next_id += 1;
        ResourceId(self.next_id)
    }
}

impl RenderBackend for MockBackend {
    fn geometry_instance_create(&mut self, base: ResourceId) -> BackendHandle {
        self.create("geometry_instance_create", base)
    }

    fn light_instance_create(&mut self, base: ResourceId) -> BackendHandle {
        self.create("light_instance_create", base)
    }

    fn reflection_probe_instance_create(&mut self, base: ResourceId) -> BackendHandle {
        self.create("reflection_probe_instance_create", base)
    }

    fn decal_instance_create(&mut self, base: ResourceId) -> BackendHandle {
        self.create("decal_instance_create", base)
    }

    fn gi_probe_instance_create(&mut self, base: ResourceId) -> BackendHandle {
        self.create("gi_probe_instance_create", base)
    }

    fn lightmap_instance_create(&mut self, base: ResourceId) -> BackendHandle {
        self.create("lightmap_instance_create", base)
    }

    fn particles_collision_instance_create(&mut self, base: ResourceId) -> BackendHandle {
        self.create("particles_collision_instance_create", base)
    }

    fn instance_free(&mut self, handle: BackendHandle) {
        self.calls.push("instance_free");
        self.instances.remove(&handle);
        self.transforms.remove(&handle);
        self.light_pairs.remove(&handle);
        self.reflection_probe_pairs.remove(&handle);
        self.decal_pairs.remove(&handle);
        self.gi_probe_pairs.remove(&handle);
        self.shadow_versions.remove(&handle);
    }

    fn instance_set_transform(&mut self, handle: BackendHandle, transform: &Mat4, aabb: &AABB) {
        self.calls.push("instance_set_transform");
        self.transforms.insert(handle, (*transform, *aabb));
    }

    fn geometry_instance_set_materials(&mut self, handle: BackendHandle, materials: &[ResourceId]) {
        self.calls.push("geometry_instance_set_materials");
        self.materials.insert(handle, materials.to_vec());
    }

    fn geometry_instance_set_skeleton(&mut self, handle: BackendHandle, skeleton: Option<ResourceId>) {
        self.calls.push("geometry_instance_set_skeleton");
        self.skeletons.insert(handle, skeleton);
    }

    fn geometry_instance_set_layer_mask(&mut self, handle: BackendHandle, mask: u32) {
        self.calls.push("geometry_instance_set_layer_mask");
        self.layer_masks.insert(handle, mask);
    }

    fn geometry_instance_set_cast_shadows(&mut self, handle: BackendHandle, setting: ShadowCastingSetting) {
        self.calls.push("geometry_instance_set_cast_shadows");
        self.cast_shadows.insert(handle, setting);
    }

    fn geometry_instance_set_instance_parameters(&mut self, handle: BackendHandle, parameters: &[(u32, ParamValue)]) {
        self.calls.push("geometry_instance_set_instance_parameters");
        self.instance_parameters.insert(handle, parameters.to_vec());
    }

    fn geometry_instance_set_lightmap_capture(&mut self, handle: BackendHandle, capture: Option<&ShCoefficients>) {
        self.calls.push("geometry_instance_set_lightmap_capture");
        self.lightmap_captures.insert(handle, capture.copied());
    }

    fn geometry_instance_pair_light_instances(&mut self, handle: BackendHandle, lights: &[BackendHandle]) {
        self.calls.push("geometry_instance_pair_light_instances");
        self.light_pairs.insert(handle, lights.to_vec());
    }

    fn geometry_instance_pair_reflection_probe_instances(&mut self, handle: BackendHandle, probes: &[BackendHandle]) {
        self.calls.push("geometry_instance_pair_reflection_probe_instances");
        self.reflection_probe_pairs.insert(handle, probes.to_vec());
    }

    fn geometry_instance_pair_decal_instances(&mut self, handle: BackendHandle, decals: &[BackendHandle]) {
        self.calls.push("geometry_instance_pair_decal_instances");
        self.decal_pairs.insert(handle, decals.to_vec());
    }

    fn geometry_instance_pair_gi_probe_instances(&mut self, handle: BackendHandle, probes: &[BackendHandle]) {
        self.calls.push("geometry_instance_pair_gi_probe_instances");
        self.gi_probe_pairs.insert(handle, probes.to_vec());
    }

    fn shadow_atlas_create(&mut self, _resolution: u32) -> ResourceId {
        self.calls.push("shadow_atlas_create");
        self.next_resource()
    }

    fn reflection_atlas_create(&mut self) -> ResourceId {
        self.calls.push("reflection_atlas_create");
        self.next_resource()
    }

    fn reflection_atlas_set_size(&mut self, atlas: ResourceId, size: u32, count: u32) {
        self.calls.push("reflection_atlas_set_size");
        self.reflection_atlas_sizes.insert(atlas, (size, count));
    }

    fn atlas_free(&mut self, atlas: ResourceId) {
        self.calls.push("atlas_free");
        self.reflection_atlas_sizes.remove(&atlas);
    }

    fn shadow_atlas_update_light(&mut self, _atlas: ResourceId, light: BackendHandle, _coverage: f32, version: u64) -> bool {
        self.calls.push("shadow_atlas_update_light");
        let forced = self.force_shadow_redraw.remove(&light);
        let changed = self.shadow_versions.insert(light, version) != Some(version);
        forced || changed
    }

    fn light_instance_set_shadow_transform(&mut self, light: BackendHandle, cascade: usize, shadow: &CascadeShadow) {
        self.calls.push("light_instance_set_shadow_transform");
        self.shadow_transforms.push((light, cascade, *shadow));
    }

    fn reflection_probe_instance_needs_redraw(&self, probe: BackendHandle) -> bool {
        self.probes_needing_redraw.contains(&probe)
    }

    fn reflection_probe_instance_begin_render(&mut self, probe: BackendHandle, _atlas: ResourceId) -> bool {
        self.calls.push("reflection_probe_instance_begin_render");
        self.probes_needing_redraw.remove(&probe);
        !self.reflection_slots_full
    }

    fn reflection_probe_render_roughness_layer(&mut self, probe: BackendHandle, layer: u32) {
        self.calls.push("reflection_probe_render_roughness_layer");
        self.roughness_layers.push((probe, layer));
    }

    fn gi_probe_needs_update(&self, probe: BackendHandle) -> bool {
        self.gi_probes_needing_update.contains(&probe)
    }

    fn gi_probe_update(&mut self, probe: BackendHandle, lights: &[BackendHandle], dynamic_geometry: &[BackendHandle]) {
        self.calls.push("gi_probe_update");
        self.gi_probes_needing_update.remove(&probe);
        self.gi_updates.push((probe, lights.to_vec(), dynamic_geometry.to_vec()));
    }

    fn sdfgi_pending_regions(&mut self, _environment: Option<ResourceId>, _camera_position: Vec3) -> Vec<AABB> {
        self.calls.push("sdfgi_pending_regions");
        self.sdfgi_regions.clone()
    }

    fn particles_set_colliders(&mut self, particles: BackendHandle, colliders: &[BackendHandle]) {
        self.calls.push("particles_set_colliders");
        self.particle_colliders.insert(particles, colliders.to_vec());
    }

    fn render_scene(&mut self, data: &SceneRenderData) {
        self.calls.push("render_scene");
        self.frames.push(data.clone());
    }
}

// ============================================================================
// Mock resources
// ============================================================================

/// A mesh: local bounds plus one material per surface.
#[derive(Debug, Clone, PartialEq)]
pub struct MockMesh {
    pub aabb: AABB,
    pub surface_materials: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockMaterial {
    pub casts_shadows: bool,
    pub animated: bool,
    pub instance_parameters: Vec<InstanceParameterDecl>,
}

impl Default for MockMaterial {
    fn default() -> Self {
        Self { casts_shadows: true, animated: false, instance_parameters: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockLightmap {
    pub info: LightmapInfo,
    /// Uniform capture returned for every point inside `info.bounds`
    pub capture: ShCoefficients,
}

#[derive(Debug, Default)]
struct MockResourceTables {
    next_id: u64,
    meshes: FxHashMap<ResourceId, MockMesh>,
    materials: FxHashMap<ResourceId, MockMaterial>,
    lights: FxHashMap<ResourceId, LightInfo>,
    reflection_probes: FxHashMap<ResourceId, (ReflectionProbeInfo, AABB)>,
    lightmaps: FxHashMap<ResourceId, MockLightmap>,
    /// Decals, GI probes, particles, colliders, multimeshes
    volumes: FxHashMap<ResourceId, AABB>,
    particles_collision: FxHashSet<ResourceId>,
}

/// Thread-safe in-memory `ResourceStorage`.
///
/// Setters take `&self` so tests can edit resources while the scene
/// manager holds an `Arc` to the same storage.
#[derive(Debug, Default)]
pub struct MockResources {
    tables: RwLock<MockResourceTables>,
}

impl MockResources {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(tables: &mut MockResourceTables) -> ResourceId {
        tables.next_id += 1;
        ResourceId(tables.next_id)
    }

    pub fn add_material(&self, material: MockMaterial) -> ResourceId {
        let mut tables = self.tables.write();
        let id = Self::allocate(&mut tables);
        tables.materials.insert(id, material);
        id
    }

    pub fn add_mesh(&self, aabb: AABB, surface_materials: Vec<ResourceId>) -> ResourceId {
        let mut tables = self.tables.write();
        let id = Self::allocate(&mut tables);
        tables.meshes.insert(id, MockMesh { aabb, surface_materials });
        id
    }

    /// Mesh with one shadow-casting material and the given half size.
    pub fn add_box_mesh(&self, half_extents: Vec3) -> ResourceId {
        let material = self.add_material(MockMaterial::default());
        self.add_mesh(AABB::from_center_half_extents(Vec3::ZERO, half_extents), vec![material])
    }

    pub fn add_light(&self, info: LightInfo) -> ResourceId {
        let mut tables = self.tables.write();
        let id = Self::allocate(&mut tables);
        tables.lights.insert(id, info);
        id
    }

    pub fn add_reflection_probe(&self, info: ReflectionProbeInfo) -> ResourceId {
        let mut tables = self.tables.write();
        let id = Self::allocate(&mut tables);
        let aabb = AABB::from_center_half_extents(Vec3::ZERO, info.extents);
        tables.reflection_probes.insert(id, (info, aabb));
        id
    }

    pub fn add_lightmap(&self, lightmap: MockLightmap) -> ResourceId {
        let mut tables = self.tables.write();
        let id = Self::allocate(&mut tables);
        tables.lightmaps.insert(id, lightmap);
        id
    }

    /// Any bounded resource without extra data (decal, GI probe, particles, ...).
    pub fn add_volume(&self, aabb: AABB) -> ResourceId {
        let mut tables = self.tables.write();
        let id = Self::allocate(&mut tables);
        tables.volumes.insert(id, aabb);
        id
    }

    pub fn set_particles_collision(&self, particles: ResourceId, enabled: bool) {
        let mut tables = self.tables.write();
        if enabled {
            tables.particles_collision.insert(particles);
        } else {
            tables.particles_collision.remove(&particles);
        }
    }

    pub fn update_material(&self, id: ResourceId, material: MockMaterial) {
        self.tables.write().materials.insert(id, material);
    }

    pub fn update_light(&self, id: ResourceId, info: LightInfo) {
        self.tables.write().lights.insert(id, info);
    }

    pub fn update_mesh_aabb(&self, id: ResourceId, aabb: AABB) {
        if let Some(mesh) = self.tables.write().meshes.get_mut(&id) {
            mesh.aabb = aabb;
        }
    }

    /// Drop a resource of any type, as if freed mid-frame.
    pub fn remove(&self, id: ResourceId) {
        let mut tables = self.tables.write();
        tables.meshes.remove(&id);
        tables.materials.remove(&id);
        tables.lights.remove(&id);
        tables.reflection_probes.remove(&id);
        tables.lightmaps.remove(&id);
        tables.volumes.remove(&id);
        tables.particles_collision.remove(&id);
    }
}

impl ResourceStorage for MockResources {
    fn base_aabb(&self, kind: InstanceKind, base: ResourceId) -> Option<AABB> {
        let tables = self.tables.read();
        match kind {
            InstanceKind::Mesh => tables.meshes.get(&base).map(|mesh| mesh.aabb),
            InstanceKind::ReflectionProbe => tables.reflection_probes.get(&base).map(|(_, aabb)| *aabb),
            InstanceKind::Lightmap => tables.lightmaps.get(&base).map(|lightmap| lightmap.info.bounds),
            InstanceKind::Light => tables.lights.get(&base).and_then(LightInfo::local_aabb),
            _ => tables
                .volumes
                .get(&base)
                .or_else(|| tables.meshes.get(&base).map(|mesh| &mesh.aabb))
                .copied(),
        }
    }

    fn mesh_surface_materials(&self, mesh: ResourceId) -> Option<Vec<ResourceId>> {
        self.tables.read().meshes.get(&mesh).map(|mesh| mesh.surface_materials.clone())
    }

    fn material_casts_shadows(&self, material: ResourceId) -> Option<bool> {
        self.tables.read().materials.get(&material).map(|m| m.casts_shadows)
    }

    fn material_is_animated(&self, material: ResourceId) -> Option<bool> {
        self.tables.read().materials.get(&material).map(|m| m.animated)
    }

    fn material_instance_parameters(&self, material: ResourceId) -> Option<Vec<InstanceParameterDecl>> {
        self.tables.read().materials.get(&material).map(|m| m.instance_parameters.clone())
    }

    fn light_info(&self, light: ResourceId) -> Option<LightInfo> {
        self.tables.read().lights.get(&light).cloned()
    }

    fn reflection_probe_info(&self, probe: ResourceId) -> Option<ReflectionProbeInfo> {
        self.tables.read().reflection_probes.get(&probe).map(|(info, _)| info.clone())
    }

    fn lightmap_info(&self, lightmap: ResourceId) -> Option<LightmapInfo> {
        self.tables.read().lightmaps.get(&lightmap).map(|lightmap| lightmap.info.clone())
    }

    fn lightmap_sample_capture(&self, lightmap: ResourceId, local_point: Vec3) -> Option<ShCoefficients> {
        let tables = self.tables.read();
        let lightmap = tables.lightmaps.get(&lightmap)?;
        lightmap.info.bounds.contains_point(local_point).then_some(lightmap.capture)
    }

    fn particles_collision_enabled(&self, particles: ResourceId) -> Option<bool> {
        let tables = self.tables.read();
        tables.volumes.contains_key(&particles).then(|| tables.particles_collision.contains(&particles))
    }
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
