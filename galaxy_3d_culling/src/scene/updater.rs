/// Deferred instance updates.
///
/// Mutators on the `SceneManager` only record the new value, raise the
/// instance's `update_aabb` / `update_dependencies` flags and push its key
/// on the `DirtyQueue`. `update_dirty_instances` drains the queue once per
/// frame, in three phases per instance:
/// - Dependencies: effective materials, shadow casting, animated
///   materials, instance shader parameters, light / probe info
/// - Local AABB: base resource, custom override, extra margin
/// - Placement: world AABB, spatial index, render data, pairing
///
/// Keys queued while a flush runs wait for the next one.

use std::sync::Arc;
use rustc_hash::FxHashSet;
use crate::backend::{BackendHandle, LightType, RenderBackend, ResourceId};
use crate::{engine_trace, engine_warn};
use super::instance::{
    GeometryFlags, IndexSlot, Instance, InstanceKey, InstanceKind, Payload, ShadowCastingSetting,
};
use super::lightmap_capture::update_lightmap_capture;
use super::pairing::{pair_instance, refresh_pairing_arrays, unpair_all};
use super::scenario::{InstanceData, InstanceFlags, ScenarioKey};
use super::scene_manager::SceneManager;
use super::AABB;

// ============================================================================
// Dirty queue
// ============================================================================

/// Stale entries tolerated in `DirtyQueue::order` before it is compacted.
const DIRTY_QUEUE_SLACK: usize = 64;

/// Work list of instances waiting for the next flush.
///
/// Pushing a key that is already queued is a no-op; keys come out in
/// the order they were first pushed. Removal only forgets the key in
/// `queued`; its entry in `order` goes stale and is skipped by `take`.
#[derive(Debug, Clone, Default)]
pub struct DirtyQueue {
    order: Vec<InstanceKey>,
    queued: FxHashSet<InstanceKey>,
}

impl DirtyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key. Returns `false` if it was already queued.
    pub fn push(&mut self, key: InstanceKey) -> bool {
        if !self.queued.insert(key) {
            return false;
        }
        self.order.push(key);
        true
    }

    /// Take every queued key, leaving the queue empty.
    pub fn take(&mut self) -> Vec<InstanceKey> {
        let mut order = std::mem::take(&mut self.order);
        let queued = &mut self.queued;
        // First live entry wins; stale and repeated entries are dropped
        order.retain(|key| queued.remove(key));
        queued.clear();
        order
    }

    pub fn contains(&self, key: InstanceKey) -> bool {
        self.queued.contains(&key)
    }

    /// Drop a key (freed before the flush).
    pub fn remove(&mut self, key: InstanceKey) {
        if self.queued.remove(&key) && self.order.len() > 2 * self.queued.len() + DIRTY_QUEUE_SLACK {
            self.compact();
        }
    }

    /// Entries in the work list, stale ones included.
    pub fn backlog(&self) -> usize {
        self.order.len()
    }

    fn compact(&mut self) {
        let queued = &self.queued;
        let mut seen = FxHashSet::default();
        self.order.retain(|key| queued.contains(key) && seen.insert(*key));
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Backend handle for a freshly based instance.
pub(crate) fn create_backend_instance(
    backend: &mut dyn RenderBackend,
    kind: InstanceKind,
    base: ResourceId,
) -> Option<BackendHandle> {
    let handle = match kind {
        InstanceKind::None => return None,
        InstanceKind::Mesh | InstanceKind::MultiMesh | InstanceKind::Particles => {
            backend.geometry_instance_create(base)
        }
        InstanceKind::ParticlesCollision => backend.particles_collision_instance_create(base),
        InstanceKind::Light => backend.light_instance_create(base),
        InstanceKind::ReflectionProbe => backend.reflection_probe_instance_create(base),
        InstanceKind::Decal => backend.decal_instance_create(base),
        InstanceKind::GiProbe => backend.gi_probe_instance_create(base),
        InstanceKind::Lightmap => backend.lightmap_instance_create(base),
    };
    Some(handle)
}

/// Render-data flags derived from an instance's current state.
fn render_flags(instance: &Instance) -> InstanceFlags {
    let mut flags = InstanceFlags::empty();
    match &instance.payload {
        Payload::Geometry(geometry) => {
            flags.set(InstanceFlags::CAST_SHADOWS, geometry.can_cast_shadows);
            flags.set(
                InstanceFlags::SHADOWS_ONLY,
                instance.cast_shadows == ShadowCastingSetting::ShadowsOnly,
            );
            flags.set(InstanceFlags::SKINNED, instance.skeleton.is_some());
            flags.set(InstanceFlags::ANIMATED_MATERIAL, geometry.material_is_animated);
            flags.set(
                InstanceFlags::DYNAMIC_GI,
                instance.geometry_flags.contains(GeometryFlags::USE_DYNAMIC_GI),
            );
        }
        Payload::Light(light) => flags.set(InstanceFlags::LIGHT_SHADOWED, light.shadow_enabled),
        Payload::ReflectionProbe(probe) => flags.set(
            InstanceFlags::REFLECTION_ALWAYS,
            probe.update_mode == crate::backend::ReflectionProbeUpdateMode::Always,
        ),
        _ => {}
    }
    flags
}

fn is_directional(instance: &Instance) -> bool {
    instance.payload.light().map_or(false, |light| light.light_type == LightType::Directional)
}

// ============================================================================
// Flush
// ============================================================================

impl SceneManager {
    /// Queue `key` for the next flush, raising the requested work flags.
    pub(crate) fn queue_update(&mut self, key: InstanceKey, update_aabb: bool, update_dependencies: bool) {
        if let Some(instance) = self.instances.get_mut(key) {
            instance.update_aabb |= update_aabb;
            instance.update_dependencies |= update_dependencies;
            self.dirty.push(key);
        }
    }

    /// Bring every queued instance up to date.
    ///
    /// Afterwards the queue is empty, every indexed instance sits in its
    /// index at its current world AABB and its relationship sets match
    /// what it overlaps.
    pub fn update_dirty_instances(&mut self) {
        let keys = self.dirty.take();
        if keys.is_empty() {
            return;
        }
        engine_trace!("galaxy3d::Updater", "Flushing {} dirty instance(s)", keys.len());
        for key in keys {
            self.update_instance(key);
        }
    }

    fn update_instance(&mut self, key: InstanceKey) {
        // Freed since it was queued
        let Some(instance) = self.instances.get_mut(key) else {
            return;
        };
        let update_dependencies = std::mem::take(&mut instance.update_dependencies);
        let update_aabb = std::mem::take(&mut instance.update_aabb);

        if update_dependencies {
            self.update_dependencies(key);
        }
        if update_aabb {
            self.update_local_aabb(key);
        }
        self.update_placement(key);
    }

    // ===== DEPENDENCIES =====

    fn update_dependencies(&mut self, key: InstanceKey) {
        let resources = Arc::clone(&self.resources);
        let Some(instance) = self.instances.get_mut(key) else {
            return;
        };
        let Some(base) = instance.base else {
            return;
        };

        match instance.kind {
            InstanceKind::Mesh | InstanceKind::MultiMesh | InstanceKind::Particles => {
                let surfaces = resources.mesh_surface_materials(base).unwrap_or_default();
                let materials: Vec<ResourceId> = surfaces
                    .iter()
                    .enumerate()
                    .map(|(surface, material)| {
                        instance
                            .material_override
                            .or_else(|| instance.surface_overrides.get(surface).copied().flatten())
                            .unwrap_or(*material)
                    })
                    .collect();

                // Missing materials contribute nothing
                let mut materials_cast = true;
                let mut animated = false;
                let mut declarations = Vec::new();
                for material in &materials {
                    if resources.material_casts_shadows(*material) == Some(false) {
                        materials_cast = false;
                    }
                    if resources.material_is_animated(*material) == Some(true) {
                        animated = true;
                    }
                    if let Some(parameters) = resources.material_instance_parameters(*material) {
                        declarations.extend(parameters);
                    }
                }

                for name in instance.resolve_parameters(&declarations) {
                    engine_warn!(
                        "galaxy3d::Updater",
                        "Instance {:?}: shader parameter '{}' declared with different slots or types, first declaration kept",
                        key,
                        name
                    );
                }

                let can_cast = materials_cast && instance.cast_shadows != ShadowCastingSetting::Off;
                let parameters = instance.parameter_buffer();
                let skeleton = instance.skeleton;
                let setting = instance.cast_shadows;
                let handle = instance.handle;

                let Some(geometry) = instance.payload.geometry_mut() else {
                    return;
                };
                let cast_changed = geometry.can_cast_shadows != can_cast;
                geometry.can_cast_shadows = can_cast;
                geometry.material_is_animated = animated;
                geometry.materials = materials.clone();
                let lights: Vec<InstanceKey> = if cast_changed {
                    geometry.lights.iter().copied().collect()
                } else {
                    Vec::new()
                };

                if let Some(handle) = handle {
                    let mut backend = self.backend.lock();
                    backend.geometry_instance_set_materials(handle, &materials);
                    backend.geometry_instance_set_instance_parameters(handle, &parameters);
                    backend.geometry_instance_set_skeleton(handle, skeleton);
                    backend.geometry_instance_set_cast_shadows(handle, setting);
                }
                for light in lights {
                    self.mark_light_dirty(light);
                }
            }
            InstanceKind::Light => {
                let info = resources.light_info(base);
                if let Some(light) = instance.payload.light_mut() {
                    match info {
                        Some(info) => {
                            light.light_type = info.light_type;
                            light.shadow_enabled = info.shadow_enabled;
                        }
                        None => light.shadow_enabled = false,
                    }
                }
                self.mark_light_dirty(key);
                self.sync_scenario_lists(key);
            }
            InstanceKind::ReflectionProbe => {
                if let (Some(info), Payload::ReflectionProbe(probe)) =
                    (resources.reflection_probe_info(base), &mut instance.payload)
                {
                    probe.update_mode = info.update_mode;
                }
            }
            _ => {}
        }
    }

    // ===== LOCAL AABB =====

    fn update_local_aabb(&mut self, key: InstanceKey) {
        let resources = Arc::clone(&self.resources);
        let Some(instance) = self.instances.get_mut(key) else {
            return;
        };

        let base_aabb = match (instance.kind, instance.base) {
            (InstanceKind::None, _) | (_, None) => None,
            (InstanceKind::Light, Some(base)) => resources.light_info(base).and_then(|info| info.local_aabb()),
            (kind, Some(base)) => resources.base_aabb(kind, base),
        };
        let mut aabb = instance.custom_aabb.or(base_aabb).unwrap_or_else(AABB::default_cube);
        if instance.extra_margin > 0.0 {
            aabb = aabb.grown(instance.extra_margin);
        }
        if aabb.is_degenerate() {
            engine_warn!(
                "galaxy3d::Updater",
                "Instance {:?} has a degenerate AABB {:?}, using the default cube",
                key,
                aabb
            );
            aabb = AABB::default_cube();
        }
        instance.aabb = aabb;
    }

    // ===== PLACEMENT =====

    fn update_placement(&mut self, key: InstanceKey) {
        let Some(instance) = self.instances.get_mut(key) else {
            return;
        };
        let Some(scenario_key) = instance.scenario.filter(|s| self.scenarios.contains_key(*s)) else {
            return;
        };

        let world_aabb = instance.aabb.transformed(&instance.transform);
        if !instance.has_valid_transform() || !world_aabb.is_finite() {
            engine_warn!(
                "galaxy3d::Updater",
                "Instance {:?} has a degenerate transform, excluded from spatial queries",
                key
            );
            self.unindex_instance(key);
            return;
        }

        instance.prev_transformed_aabb = instance.transformed_aabb;
        instance.transformed_aabb = world_aabb;
        instance.version += 1;
        if let Some(handle) = instance.handle {
            self.backend.lock().instance_set_transform(handle, &instance.transform, &world_aabb);
        }

        let indexable = instance.visible
            && instance.handle.is_some()
            && instance.kind != InstanceKind::None
            && !is_directional(instance);
        if !indexable {
            self.unindex_instance(key);
            return;
        }

        let kind = instance.kind;
        let moved = instance.prev_transformed_aabb != world_aabb;
        let newly_indexed = instance.index_slot.is_none();
        let mut flags = render_flags(instance);
        if kind == InstanceKind::ReflectionProbe && (newly_indexed || moved) {
            flags |= InstanceFlags::REFLECTION_DIRTY;
        }
        let data = InstanceData {
            key,
            kind,
            flags,
            layer_mask: instance.layer_mask,
            // Checked by `indexable`
            handle: instance.handle.unwrap_or(BackendHandle(0)),
        };

        let scenario = &mut self.scenarios[scenario_key];
        match instance.index_slot {
            None => {
                let leaf = scenario.index_for_mut(kind).insert(&world_aabb, key);
                let array_index = scenario.push_instance_data(data, world_aabb);
                instance.index_slot = Some(IndexSlot { leaf, array_index });
            }
            Some(slot) => {
                scenario.index_for_mut(kind).update(slot.leaf, &world_aabb);
                scenario.set_aabb(slot.array_index, world_aabb);
                if let Some(existing) = scenario.data_mut(slot.array_index) {
                    let kept = existing.flags & (InstanceFlags::PAIR_DIRTY_MASK | InstanceFlags::REFLECTION_DIRTY);
                    *existing = InstanceData { flags: data.flags | kept, ..data };
                }
            }
        }

        let outcome = pair_instance(&mut self.instances, scenario, key);
        self.refresh_geometry(scenario_key, &outcome.unpaired_geometry);

        self.after_pairing(key, moved || newly_indexed);
    }

    /// Propagate a placement change to whatever depends on it.
    fn after_pairing(&mut self, key: InstanceKey, moved: bool) {
        let Some(instance) = self.instances.get(key) else {
            return;
        };
        match &instance.payload {
            Payload::Light(_) if moved => self.mark_light_dirty(key),
            Payload::Geometry(geometry) => {
                let dynamic_gi = instance.geometry_flags.contains(GeometryFlags::USE_DYNAMIC_GI);
                let lights: Vec<InstanceKey> = if moved && geometry.can_cast_shadows {
                    geometry.lights.iter().copied().collect()
                } else {
                    Vec::new()
                };
                let gi_probes: Vec<InstanceKey> = if moved && dynamic_gi {
                    geometry.gi_probes.iter().copied().collect()
                } else {
                    Vec::new()
                };
                let recapture = geometry.capture_dirty
                    || (moved && dynamic_gi && !geometry.lightmap_captures.is_empty());

                for light in lights {
                    self.mark_light_dirty(light);
                }
                self.schedule.gi_probes_dirty.extend(gi_probes);
                if recapture {
                    let mut backend = self.backend.lock();
                    update_lightmap_capture(&mut self.instances, key, self.resources.as_ref(), &mut *backend);
                }
            }
            Payload::Lightmap(lightmap) => {
                let mut geometries: Vec<InstanceKey> = lightmap
                    .geometries
                    .iter()
                    .copied()
                    .filter(|geometry| {
                        moved || self
                            .instances
                            .get(*geometry)
                            .and_then(|g| g.payload.geometry())
                            .map_or(false, |g| g.capture_dirty)
                    })
                    .collect();
                geometries.sort_unstable();
                let mut backend = self.backend.lock();
                for geometry in geometries {
                    update_lightmap_capture(&mut self.instances, geometry, self.resources.as_ref(), &mut *backend);
                }
            }
            Payload::GiProbe(_) if moved => {
                self.schedule.gi_probes_dirty.insert(key);
            }
            _ => {}
        }
    }

    /// Bump a light's shadow version; GI probes it lights must update.
    pub(crate) fn mark_light_dirty(&mut self, key: InstanceKey) {
        let Some(light) = self.instances.get_mut(key).and_then(|i| i.payload.light_mut()) else {
            return;
        };
        light.mark_shadow_dirty();
        let gi_probes: Vec<InstanceKey> = light.gi_probes.iter().copied().collect();
        self.schedule.gi_probes_dirty.extend(gi_probes);
    }

    /// Push pairing arrays and lightmap captures of geometry whose links changed.
    pub(crate) fn refresh_geometry(&mut self, scenario_key: ScenarioKey, keys: &[InstanceKey]) {
        if keys.is_empty() {
            return;
        }
        let Some(scenario) = self.scenarios.get_mut(scenario_key) else {
            return;
        };
        let max_pairs = self.settings.max_instance_pairs;
        let mut backend = self.backend.lock();
        for key in keys {
            refresh_pairing_arrays(&self.instances, scenario, *key, &mut *backend, max_pairs);
            let capture_dirty = self
                .instances
                .get(*key)
                .and_then(|instance| instance.payload.geometry())
                .map_or(false, |geometry| geometry.capture_dirty);
            if capture_dirty {
                update_lightmap_capture(&mut self.instances, *key, self.resources.as_ref(), &mut *backend);
            }
        }
    }

    // ===== INDEX MEMBERSHIP =====

    /// Remove `key` from its scenario's index and render data.
    ///
    /// Links are torn down first, on both sides. The instance keeps its
    /// scenario and comes back on the next flush that finds it indexable.
    pub(crate) fn unindex_instance(&mut self, key: InstanceKey) {
        let Some(instance) = self.instances.get(key) else {
            return;
        };
        let (Some(slot), Some(scenario_key)) = (instance.index_slot, instance.scenario) else {
            return;
        };
        let kind = instance.kind;
        let Some(scenario) = self.scenarios.get_mut(scenario_key) else {
            return;
        };

        let outcome = unpair_all(&mut self.instances, scenario, key);
        scenario.index_for_mut(kind).remove(slot.leaf);
        if let Some(moved) = scenario.remove_instance_data(slot.array_index) {
            if let Some(moved_slot) = self.instances.get_mut(moved).and_then(|i| i.index_slot.as_mut()) {
                moved_slot.array_index = slot.array_index;
            }
        }
        if let Some(instance) = self.instances.get_mut(key) {
            instance.index_slot = None;
        }

        let schedule = &mut self.schedule;
        schedule.probes.remove(key);
        schedule.gi_probes_dirty.remove(&key);

        // Unindexed geometry sends empty arrays
        self.refresh_geometry(scenario_key, &outcome.unpaired_geometry);
    }

    /// Re-file `key` in its scenario's membership lists.
    pub(crate) fn sync_scenario_lists(&mut self, key: InstanceKey) {
        let Some(instance) = self.instances.get(key) else {
            return;
        };
        let Some(scenario) = instance.scenario.and_then(|s| self.scenarios.get_mut(s)) else {
            return;
        };
        scenario.track_instance(key, instance.kind, is_directional(instance));
    }

    /// Unindex `key` and take it out of its scenario.
    pub(crate) fn detach_from_scenario(&mut self, key: InstanceKey) {
        self.unindex_instance(key);
        let Some(scenario_key) = self.instances.get_mut(key).and_then(|i| i.scenario.take()) else {
            return;
        };
        if let Some(scenario) = self.scenarios.get_mut(scenario_key) {
            scenario.forget_instance(key);
        }
    }
}

#[cfg(test)]
#[path = "updater_tests.rs"]
mod tests;
