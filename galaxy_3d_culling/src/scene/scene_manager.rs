//! Central scene manager for the culling core.
//!
//! Owns every instance, scenario and camera, addressed by generation-checked
//! slot map keys, plus the injected render backend and resource storage.
//! Mutators record the new value and queue the instance; the expensive
//! work happens in `update()` (see `updater`). The per-frame drivers live
//! in `render_frame`.
//!
//! Invalid keys are logged and ignored: mutators return `false`, queries
//! return `None` or an empty list.

use std::sync::Arc;
use glam::{Mat4, Vec2, Vec3, Vec4};
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use slotmap::{new_key_type, SlotMap};
use crate::backend::{ParamValue, RenderBackend, ResourceId, ResourceStorage};
use crate::camera::{Camera, FovAxis};
use crate::error::{Error, Result};
use crate::settings::CullingSettings;
use crate::{engine_debug, engine_error, engine_info, engine_trace};
use super::culler::{CullSchedule, ParallelCuller, SerialCuller};
use super::instance::{
    GeometryFlags, Instance, InstanceKey, InstanceKind, InstanceParameter, Payload, ShadowCastingSetting,
};
use super::pairing::unpair_all;
use super::scenario::{DebugDrawMode, InstanceFlags, Scenario, ScenarioKey};
use super::updater::{create_backend_instance, DirtyQueue};
use super::AABB;

new_key_type! {
    /// Stable key for a Camera inside a SceneManager.
    pub struct CameraKey;
}

/// Registry of instances, scenarios and cameras.
pub struct SceneManager {
    pub(crate) settings: CullingSettings,
    pub(crate) instances: SlotMap<InstanceKey, Instance>,
    pub(crate) scenarios: SlotMap<ScenarioKey, Scenario>,
    pub(crate) cameras: SlotMap<CameraKey, Camera>,
    pub(crate) dirty: DirtyQueue,
    pub(crate) backend: Arc<Mutex<dyn RenderBackend>>,
    pub(crate) resources: Arc<dyn ResourceStorage>,
    pub(crate) serial_culler: SerialCuller,
    pub(crate) parallel_culler: Option<ParallelCuller>,
    /// Probe redraws and GI updates found by cull passes
    pub(crate) schedule: CullSchedule,
    frame: u64,
}

impl SceneManager {
    /// Create a scene manager around its collaborators.
    ///
    /// Builds the cull worker pool when more than one worker is configured.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for settings that fail validation and
    /// `InitializationFailed` when the worker pool cannot be built.
    pub fn new(
        settings: CullingSettings,
        backend: Arc<Mutex<dyn RenderBackend>>,
        resources: Arc<dyn ResourceStorage>,
    ) -> Result<Self> {
        settings.validate()?;

        let workers = settings.effective_worker_count();
        let parallel_culler = if workers > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|index| format!("galaxy3d-cull-{}", index))
                .build()
                .map_err(|e| Error::InitializationFailed(format!("cull worker pool: {}", e)))?;
            engine_info!(
                "galaxy3d::SceneManager",
                "Cull worker pool created with {} threads (parallel from {} instances)",
                workers,
                settings.effective_threaded_cull_minimum()
            );
            Some(ParallelCuller::new(Arc::new(pool)))
        } else {
            None
        };

        Ok(Self {
            settings,
            instances: SlotMap::with_key(),
            scenarios: SlotMap::with_key(),
            cameras: SlotMap::with_key(),
            dirty: DirtyQueue::new(),
            backend,
            resources,
            serial_culler: SerialCuller::new(),
            parallel_culler,
            schedule: CullSchedule::default(),
            frame: 0,
        })
    }

    // ===== ACCESSORS =====

    pub fn settings(&self) -> &CullingSettings {
        &self.settings
    }

    pub fn backend(&self) -> &Arc<Mutex<dyn RenderBackend>> {
        &self.backend
    }

    /// Frames completed by `update()`.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Threads of the cull worker pool (0 = always serial).
    pub fn worker_count(&self) -> usize {
        self.parallel_culler.as_ref().map_or(0, ParallelCuller::worker_count)
    }

    /// Instances waiting for the next flush.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_queued(&self, key: InstanceKey) -> bool {
        self.dirty.contains(key)
    }

    /// Reflection probes waiting for a redraw.
    pub fn pending_probe_count(&self) -> usize {
        self.schedule.probes.len()
    }

    pub fn is_probe_scheduled(&self, key: InstanceKey) -> bool {
        self.schedule.probes.contains(key)
    }

    pub fn is_gi_probe_dirty(&self, key: InstanceKey) -> bool {
        self.schedule.gi_probes_dirty.contains(&key)
    }

    /// Whether a pass over `scenario` runs on the worker pool.
    ///
    /// Counts the instances in the cull array, so hidden and unindexed
    /// members never push a scenario over the threshold.
    pub fn culls_threaded(&self, scenario: ScenarioKey) -> bool {
        let indexed = self.scenarios.get(scenario).map_or(0, |s| s.instance_data().len());
        self.parallel_culler.is_some() && indexed >= self.settings.effective_threaded_cull_minimum()
    }

    fn instance_mut(&mut self, key: InstanceKey, operation: &str) -> Option<&mut Instance> {
        let instance = self.instances.get_mut(key);
        if instance.is_none() {
            engine_error!("galaxy3d::SceneManager", "{}: invalid instance {:?}", operation, key);
        }
        instance
    }

    fn scenario_mut(&mut self, key: ScenarioKey, operation: &str) -> Option<&mut Scenario> {
        let scenario = self.scenarios.get_mut(key);
        if scenario.is_none() {
            engine_error!("galaxy3d::SceneManager", "{}: invalid scenario {:?}", operation, key);
        }
        scenario
    }

    fn camera_mut(&mut self, key: CameraKey, operation: &str) -> Option<&mut Camera> {
        let camera = self.cameras.get_mut(key);
        if camera.is_none() {
            engine_error!("galaxy3d::SceneManager", "{}: invalid camera {:?}", operation, key);
        }
        camera
    }

    // ========================================================================
    // Cameras
    // ========================================================================

    pub fn camera_create(&mut self) -> CameraKey {
        self.cameras.insert(Camera::default())
    }

    pub fn camera_free(&mut self, key: CameraKey) -> bool {
        if self.cameras.remove(key).is_none() {
            engine_error!("galaxy3d::SceneManager", "camera_free: invalid camera {:?}", key);
            return false;
        }
        true
    }

    pub fn camera(&self, key: CameraKey) -> Option<&Camera> {
        self.cameras.get(key)
    }

    pub fn camera_set_perspective(&mut self, key: CameraKey, fov_degrees: f32, near: f32, far: f32) -> bool {
        self.camera_mut(key, "camera_set_perspective")
            .map(|camera| camera.set_perspective(fov_degrees, near, far))
            .is_some()
    }

    pub fn camera_set_orthogonal(&mut self, key: CameraKey, size: f32, near: f32, far: f32) -> bool {
        self.camera_mut(key, "camera_set_orthogonal")
            .map(|camera| camera.set_orthogonal(size, near, far))
            .is_some()
    }

    pub fn camera_set_frustum(&mut self, key: CameraKey, size: f32, offset: Vec2, near: f32, far: f32) -> bool {
        self.camera_mut(key, "camera_set_frustum")
            .map(|camera| camera.set_frustum(size, offset, near, far))
            .is_some()
    }

    pub fn camera_set_transform(&mut self, key: CameraKey, transform: Mat4) -> bool {
        self.camera_mut(key, "camera_set_transform")
            .map(|camera| camera.set_transform(transform))
            .is_some()
    }

    pub fn camera_set_fov_axis(&mut self, key: CameraKey, axis: FovAxis) -> bool {
        self.camera_mut(key, "camera_set_fov_axis")
            .map(|camera| camera.set_fov_axis(axis))
            .is_some()
    }

    pub fn camera_set_cull_mask(&mut self, key: CameraKey, mask: u32) -> bool {
        self.camera_mut(key, "camera_set_cull_mask")
            .map(|camera| camera.set_cull_mask(mask))
            .is_some()
    }

    pub fn camera_set_environment(&mut self, key: CameraKey, environment: Option<ResourceId>) -> bool {
        self.camera_mut(key, "camera_set_environment")
            .map(|camera| camera.set_environment(environment))
            .is_some()
    }

    pub fn camera_set_attributes(&mut self, key: CameraKey, attributes: Option<ResourceId>) -> bool {
        self.camera_mut(key, "camera_set_attributes")
            .map(|camera| camera.set_attributes(attributes))
            .is_some()
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    /// Create an empty scenario with its shadow and reflection atlases.
    pub fn scenario_create(&mut self) -> ScenarioKey {
        let (shadow_atlas, reflection_atlas) = {
            let mut backend = self.backend.lock();
            (
                backend.shadow_atlas_create(self.settings.default_shadow_atlas_resolution),
                backend.reflection_atlas_create(),
            )
        };
        let scenario = Scenario::new(self.settings.bvh_max_motion_expansion, shadow_atlas, reflection_atlas);
        let key = self.scenarios.insert(scenario);
        engine_debug!("galaxy3d::SceneManager", "Scenario {:?} created", key);
        key
    }

    /// Free a scenario. Its instances are detached first and survive.
    pub fn scenario_free(&mut self, key: ScenarioKey) -> bool {
        let Some(scenario) = self.scenario_mut(key, "scenario_free") else {
            return false;
        };
        let mut members: Vec<InstanceKey> = scenario.instances.iter().copied().collect();
        members.sort_unstable();
        for member in members {
            self.detach_from_scenario(member);
        }

        if let Some(scenario) = self.scenarios.remove(key) {
            let mut backend = self.backend.lock();
            backend.atlas_free(scenario.shadow_atlas);
            backend.atlas_free(scenario.reflection_atlas);
        }
        engine_debug!("galaxy3d::SceneManager", "Scenario {:?} freed", key);
        true
    }

    pub fn scenario(&self, key: ScenarioKey) -> Option<&Scenario> {
        self.scenarios.get(key)
    }

    pub fn scenario_set_debug(&mut self, key: ScenarioKey, mode: DebugDrawMode) -> bool {
        self.scenario_mut(key, "scenario_set_debug")
            .map(|scenario| scenario.debug_draw = mode)
            .is_some()
    }

    pub fn scenario_set_environment(&mut self, key: ScenarioKey, environment: Option<ResourceId>) -> bool {
        self.scenario_mut(key, "scenario_set_environment")
            .map(|scenario| scenario.environment = environment)
            .is_some()
    }

    pub fn scenario_set_fallback_environment(&mut self, key: ScenarioKey, environment: Option<ResourceId>) -> bool {
        self.scenario_mut(key, "scenario_set_fallback_environment")
            .map(|scenario| scenario.fallback_environment = environment)
            .is_some()
    }

    pub fn scenario_set_camera_effects(&mut self, key: ScenarioKey, attributes: Option<ResourceId>) -> bool {
        self.scenario_mut(key, "scenario_set_camera_effects")
            .map(|scenario| scenario.camera_attributes = attributes)
            .is_some()
    }

    /// Resize the reflection atlas. Every probe of the scenario is redrawn.
    pub fn scenario_set_reflection_atlas_size(&mut self, key: ScenarioKey, size: u32, count: u32) -> bool {
        let Some(scenario) = self.scenario_mut(key, "scenario_set_reflection_atlas_size") else {
            return false;
        };
        scenario.reflection_atlas_size = (size, count);
        let atlas = scenario.reflection_atlas;
        let probes: Vec<InstanceKey> = scenario.reflection_probes.iter().copied().collect();

        self.backend.lock().reflection_atlas_set_size(atlas, size, count);
        for probe in probes {
            let Some(slot) = self.instances.get(probe).and_then(|i| i.index_slot) else {
                continue;
            };
            if let Some(data) = self.scenarios.get_mut(key).and_then(|s| s.data_mut(slot.array_index)) {
                data.flags |= InstanceFlags::REFLECTION_DIRTY;
            }
        }
        true
    }

    // ========================================================================
    // Instance lifecycle
    // ========================================================================

    /// Allocate an instance with no base and no scenario.
    pub fn instance_create(&mut self) -> InstanceKey {
        self.instances.insert(Instance::default())
    }

    /// Allocate an instance, give it a base and place it in a scenario.
    pub fn instance_create2(&mut self, kind: InstanceKind, base: ResourceId, scenario: ScenarioKey) -> InstanceKey {
        let key = self.instance_create();
        self.instance_set_base(key, kind, Some(base));
        self.instance_set_scenario(key, Some(scenario));
        key
    }

    /// Free an instance. Its links are torn down before the record goes.
    pub fn instance_free(&mut self, key: InstanceKey) -> bool {
        if self.instance_mut(key, "instance_free").is_none() {
            return false;
        }
        self.detach_from_scenario(key);
        self.dirty.remove(key);
        if let Some(handle) = self.instances.remove(key).and_then(|instance| instance.handle) {
            self.backend.lock().instance_free(handle);
        }
        engine_trace!("galaxy3d::SceneManager", "Instance {:?} freed", key);
        true
    }

    pub fn instance(&self, key: InstanceKey) -> Option<&Instance> {
        self.instances.get(key)
    }

    /// Incremented by every flush that touched the instance.
    pub fn instance_version(&self, key: InstanceKey) -> Option<u64> {
        self.instances.get(key).map(Instance::version)
    }

    /// Set (or clear with `None`) the base resource and the kind it has.
    ///
    /// The previous backend handle and every link go away with the old base.
    pub fn instance_set_base(&mut self, key: InstanceKey, kind: InstanceKind, base: Option<ResourceId>) -> bool {
        if self.instance_mut(key, "instance_set_base").is_none() {
            return false;
        }
        self.unindex_instance(key);

        let (kind, base) = match base {
            Some(base) if kind != InstanceKind::None => (kind, Some(base)),
            _ => (InstanceKind::None, None),
        };
        {
            let mut backend = self.backend.lock();
            let Some(instance) = self.instances.get_mut(key) else {
                return false;
            };
            if let Some(handle) = instance.handle.take() {
                backend.instance_free(handle);
            }
            instance.kind = kind;
            instance.base = base;
            instance.payload = Payload::for_kind(kind);
            instance.handle = base.and_then(|base| create_backend_instance(&mut *backend, kind, base));
            if let (Some(handle), true) = (instance.handle, kind.is_geometry()) {
                backend.geometry_instance_set_layer_mask(handle, instance.layer_mask);
            }
        }
        self.sync_scenario_lists(key);
        self.queue_update(key, true, true);
        true
    }

    /// Move an instance to another scenario (`None` removes it from any).
    pub fn instance_set_scenario(&mut self, key: InstanceKey, scenario: Option<ScenarioKey>) -> bool {
        if let Some(scenario) = scenario {
            if self.scenario_mut(scenario, "instance_set_scenario").is_none() {
                return false;
            }
        }
        let Some(instance) = self.instance_mut(key, "instance_set_scenario") else {
            return false;
        };
        if instance.scenario == scenario {
            return true;
        }

        self.detach_from_scenario(key);
        if let Some(scenario) = scenario {
            if let Some(instance) = self.instances.get_mut(key) {
                instance.scenario = Some(scenario);
            }
            self.sync_scenario_lists(key);
            self.queue_update(key, false, false);
        }
        true
    }

    // ========================================================================
    // Instance mutators
    // ========================================================================

    pub fn instance_set_transform(&mut self, key: InstanceKey, transform: Mat4) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_set_transform") else {
            return false;
        };
        instance.transform = transform;
        self.queue_update(key, false, false);
        true
    }

    pub fn instance_set_visible(&mut self, key: InstanceKey, visible: bool) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_set_visible") else {
            return false;
        };
        if instance.visible != visible {
            instance.visible = visible;
            self.queue_update(key, false, false);
        }
        true
    }

    pub fn instance_set_layer_mask(&mut self, key: InstanceKey, mask: u32) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_set_layer_mask") else {
            return false;
        };
        instance.layer_mask = mask;
        if let (Some(handle), true) = (instance.handle, instance.kind.is_geometry()) {
            self.backend.lock().geometry_instance_set_layer_mask(handle, mask);
        }
        self.queue_update(key, false, false);
        true
    }

    /// Replace the computed AABB (`None` goes back to the base's).
    pub fn instance_set_custom_aabb(&mut self, key: InstanceKey, aabb: Option<AABB>) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_set_custom_aabb") else {
            return false;
        };
        instance.custom_aabb = aabb;
        self.queue_update(key, true, false);
        true
    }

    /// Pad the AABB on every side (particles whose visuals overflow, ...).
    pub fn instance_set_extra_visibility_margin(&mut self, key: InstanceKey, margin: f32) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_set_extra_visibility_margin") else {
            return false;
        };
        instance.extra_margin = if margin.is_finite() { margin.max(0.0) } else { 0.0 };
        self.queue_update(key, true, false);
        true
    }

    /// Id reported by the spatial query entry points.
    pub fn instance_attach_object_instance_id(&mut self, key: InstanceKey, object_id: u64) -> bool {
        self.instance_mut(key, "instance_attach_object_instance_id")
            .map(|instance| instance.object_id = object_id)
            .is_some()
    }

    pub fn instance_attach_skeleton(&mut self, key: InstanceKey, skeleton: Option<ResourceId>) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_attach_skeleton") else {
            return false;
        };
        instance.skeleton = skeleton;
        self.queue_update(key, true, true);
        true
    }

    pub fn instance_set_surface_override_material(
        &mut self,
        key: InstanceKey,
        surface: usize,
        material: Option<ResourceId>,
    ) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_set_surface_override_material") else {
            return false;
        };
        if instance.surface_overrides.len() <= surface {
            instance.surface_overrides.resize(surface + 1, None);
        }
        instance.surface_overrides[surface] = material;
        self.queue_update(key, false, true);
        true
    }

    /// Material used on every surface, over surface overrides.
    pub fn instance_geometry_set_material_override(&mut self, key: InstanceKey, material: Option<ResourceId>) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_geometry_set_material_override") else {
            return false;
        };
        instance.material_override = material;
        self.queue_update(key, false, true);
        true
    }

    pub fn instance_geometry_set_cast_shadows_setting(&mut self, key: InstanceKey, setting: ShadowCastingSetting) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_geometry_set_cast_shadows_setting") else {
            return false;
        };
        instance.cast_shadows = setting;
        self.queue_update(key, false, true);
        true
    }

    pub fn instance_geometry_set_flag(&mut self, key: InstanceKey, flag: GeometryFlags, enabled: bool) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_geometry_set_flag") else {
            return false;
        };
        let before = instance.geometry_flags;
        instance.geometry_flags.set(flag, enabled);
        let gi_changed = (before ^ instance.geometry_flags).contains(GeometryFlags::USE_DYNAMIC_GI);
        let scenario_key = instance.scenario;

        // GI probe sets and lightmap captures depend on the dynamic GI choice
        if gi_changed {
            if let Some(scenario_key) = scenario_key {
                if let Some(scenario) = self.scenarios.get_mut(scenario_key) {
                    let outcome = unpair_all(&mut self.instances, scenario, key);
                    self.refresh_geometry(scenario_key, &outcome.unpaired_geometry);
                }
            }
            let handle = self.instances.get_mut(key).and_then(|instance| {
                if let Some(geometry) = instance.payload.geometry_mut() {
                    geometry.lightmap_sh = None;
                    geometry.capture_dirty = false;
                }
                instance.handle
            });
            if let Some(handle) = handle {
                self.backend.lock().geometry_instance_set_lightmap_capture(handle, None);
            }
        }
        self.queue_update(key, false, false);
        true
    }

    // ========================================================================
    // Instance shader parameters
    // ========================================================================

    /// Set a per-instance shader parameter by name.
    ///
    /// Names no material declares yet are kept and sent once one does.
    pub fn instance_geometry_set_shader_parameter(&mut self, key: InstanceKey, name: &str, value: ParamValue) -> bool {
        let Some(instance) = self.instance_mut(key, "instance_geometry_set_shader_parameter") else {
            return false;
        };
        let parameter = instance
            .shader_parameters
            .entry(name.to_string())
            .or_insert(InstanceParameter { index: None, value: None, default_value: None });
        parameter.value = Some(value);

        let declared = parameter.index.is_some();
        if let (true, Some(handle)) = (declared, instance.handle) {
            let buffer = instance.parameter_buffer();
            self.backend.lock().geometry_instance_set_instance_parameters(handle, &buffer);
        }
        true
    }

    /// Value set on the instance, if any.
    pub fn instance_geometry_get_shader_parameter(&self, key: InstanceKey, name: &str) -> Option<ParamValue> {
        self.instances.get(key)?.shader_parameters.get(name)?.value
    }

    /// Default from the declaring material.
    pub fn instance_geometry_get_shader_parameter_default_value(&self, key: InstanceKey, name: &str) -> Option<ParamValue> {
        self.instances.get(key)?.shader_parameters.get(name)?.default_value
    }

    /// Parameters declared by the instance's materials, in declaration order.
    pub fn instance_geometry_get_shader_parameter_list(&self, key: InstanceKey) -> Vec<String> {
        self.instances
            .get(key)
            .map(|instance| instance.declared_parameters.clone())
            .unwrap_or_default()
    }

    /// A base resource or material changed: requeue every instance using it.
    pub fn resource_changed(&mut self, resource: ResourceId) {
        let users: Vec<InstanceKey> = self
            .instances
            .iter()
            .filter(|(_, instance)| {
                instance.base == Some(resource)
                    || instance.material_override == Some(resource)
                    || instance.payload.geometry().map_or(false, |g| g.materials.contains(&resource))
            })
            .map(|(key, _)| key)
            .collect();
        for key in users {
            self.queue_update(key, true, true);
        }
    }

    // ========================================================================
    // Spatial queries
    // ========================================================================

    /// Object ids of the geometry whose world AABB overlaps `aabb`.
    ///
    /// Works on the state of the last flush. Instances without an object
    /// id are skipped.
    pub fn instances_cull_aabb(&self, aabb: &AABB, scenario: ScenarioKey) -> Vec<u64> {
        let mut found = Vec::new();
        if let Some(scenario) = self.scenarios.get(scenario) {
            scenario.geometry_index().aabb_query(aabb, &mut |_, key| {
                self.push_object_id(*key, &mut found);
                false
            });
        }
        found
    }

    /// Object ids of the geometry whose world AABB the segment crosses.
    pub fn instances_cull_ray(&self, from: Vec3, to: Vec3, scenario: ScenarioKey) -> Vec<u64> {
        let mut found = Vec::new();
        if let Some(scenario) = self.scenarios.get(scenario) {
            scenario.geometry_index().ray_query(from, to, &mut |_, key| {
                self.push_object_id(*key, &mut found);
                false
            });
        }
        found
    }

    /// Object ids of the geometry overlapping a convex volume (inward planes).
    ///
    /// Plane tests only, so boxes near a hull edge may be reported.
    pub fn instances_cull_convex(&self, planes: &[Vec4], scenario: ScenarioKey) -> Vec<u64> {
        let mut found = Vec::new();
        if let Some(scenario) = self.scenarios.get(scenario) {
            scenario.geometry_index().convex_query(planes, &[], &mut |_, key| {
                self.push_object_id(*key, &mut found);
                false
            });
        }
        found
    }

    fn push_object_id(&self, key: InstanceKey, found: &mut Vec<u64>) {
        if let Some(instance) = self.instances.get(key) {
            if instance.object_id != 0 {
                found.push(instance.object_id);
            }
        }
    }

    // ========================================================================
    // Frame update
    // ========================================================================

    /// Once per frame: incremental BVH optimization, then the dirty flush.
    pub fn update(&mut self) {
        let steps = self.settings.bvh_optimize_steps_per_frame;
        for scenario in self.scenarios.values_mut() {
            scenario.geometry_index.optimize_incremental(steps);
            scenario.volume_index.optimize_incremental(steps);
        }
        self.update_dirty_instances();
        self.frame += 1;
    }
}

#[cfg(test)]
#[path = "scene_manager_tests.rs"]
mod tests;
