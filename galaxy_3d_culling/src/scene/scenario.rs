/// Scenario: one independent world.
///
/// Owns the two spatial indexes (geometry, volumes), the flat render-data
/// array the cull pass walks, the parallel AABB array, and the list of
/// directional lights (which are never indexed: they affect everything).
///
/// `instance_data[i]` belongs to the instance whose `IndexSlot::array_index`
/// is `i`. Removal swaps the last entry into the hole; the caller patches
/// the moved instance's slot with the key returned by `remove_instance_data`.

use bitflags::bitflags;
use rustc_hash::FxHashSet;
use slotmap::new_key_type;
use crate::backend::{BackendHandle, ResourceId};
use super::dynamic_bvh::DynamicBvh;
use super::instance::{InstanceKey, InstanceKind};
use super::scene_index::SceneIndex;
use super::AABB;

new_key_type! {
    /// Stable key for a Scenario inside a SceneManager.
    pub struct ScenarioKey;
}

/// Debug visualization requested for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugDrawMode {
    #[default]
    Disabled,
    Unshaded,
    Lighting,
    Overdraw,
    Wireframe,
}

bitflags! {
    /// Per-instance render-data flags read by the cull pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstanceFlags: u32 {
        /// Geometry that ends up in shadow maps
        const CAST_SHADOWS            = 1 << 0;
        /// Geometry drawn only into shadow maps
        const SHADOWS_ONLY            = 1 << 1;
        /// Light with shadows enabled
        const LIGHT_SHADOWED          = 1 << 2;
        const DYNAMIC_GI              = 1 << 3;
        /// Has a skeleton attached
        const SKINNED                 = 1 << 4;
        const ANIMATED_MATERIAL       = 1 << 5;
        /// Reflection probe has never been rendered at its current place
        const REFLECTION_DIRTY        = 1 << 6;
        /// Reflection probe refreshed every frame
        const REFLECTION_ALWAYS       = 1 << 7;

        const PAIR_LIGHTS_DIRTY       = 1 << 8;
        const PAIR_REFLECTIONS_DIRTY  = 1 << 9;
        const PAIR_DECALS_DIRTY       = 1 << 10;
        const PAIR_GI_PROBES_DIRTY    = 1 << 11;

        const PAIR_DIRTY_MASK = Self::PAIR_LIGHTS_DIRTY.bits()
            | Self::PAIR_REFLECTIONS_DIRTY.bits()
            | Self::PAIR_DECALS_DIRTY.bits()
            | Self::PAIR_GI_PROBES_DIRTY.bits();
    }
}

/// Render-facing projection of one indexed instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceData {
    pub key: InstanceKey,
    pub kind: InstanceKind,
    pub flags: InstanceFlags,
    pub layer_mask: u32,
    pub handle: BackendHandle,
}

/// Pairing bookkeeping counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairingStats {
    /// Pair passes run since creation
    pub passes: u64,
    pub pairs_added: u64,
    pub pairs_removed: u64,
}

pub struct Scenario {
    pub(crate) geometry_index: Box<dyn SceneIndex<InstanceKey>>,
    pub(crate) volume_index: Box<dyn SceneIndex<InstanceKey>>,
    pub(crate) instance_data: Vec<InstanceData>,
    pub(crate) instance_aabbs: Vec<AABB>,
    /// Every instance assigned to this scenario, indexed or not
    pub(crate) instances: FxHashSet<InstanceKey>,
    pub(crate) directional_lights: Vec<InstanceKey>,
    pub(crate) particles: FxHashSet<InstanceKey>,
    pub(crate) gi_probes: FxHashSet<InstanceKey>,
    pub(crate) reflection_probes: FxHashSet<InstanceKey>,
    pub(crate) shadow_atlas: ResourceId,
    pub(crate) reflection_atlas: ResourceId,
    pub(crate) reflection_atlas_size: (u32, u32),
    pub(crate) debug_draw: DebugDrawMode,
    pub(crate) environment: Option<ResourceId>,
    pub(crate) fallback_environment: Option<ResourceId>,
    pub(crate) camera_attributes: Option<ResourceId>,
    pub(crate) pairing_stats: PairingStats,
}

impl Scenario {
    /// Empty scenario backed by two dynamic BVHs.
    pub fn new(max_motion_expansion: f32, shadow_atlas: ResourceId, reflection_atlas: ResourceId) -> Self {
        Self::with_indexes(
            Box::new(DynamicBvh::new(max_motion_expansion)),
            Box::new(DynamicBvh::new(max_motion_expansion)),
            shadow_atlas,
            reflection_atlas,
        )
    }

    /// Empty scenario with caller-provided spatial indexes.
    pub fn with_indexes(
        geometry_index: Box<dyn SceneIndex<InstanceKey>>,
        volume_index: Box<dyn SceneIndex<InstanceKey>>,
        shadow_atlas: ResourceId,
        reflection_atlas: ResourceId,
    ) -> Self {
        Self {
            geometry_index,
            volume_index,
            instance_data: Vec::new(),
            instance_aabbs: Vec::new(),
            instances: FxHashSet::default(),
            directional_lights: Vec::new(),
            particles: FxHashSet::default(),
            gi_probes: FxHashSet::default(),
            reflection_probes: FxHashSet::default(),
            shadow_atlas,
            reflection_atlas,
            reflection_atlas_size: (0, 0),
            debug_draw: DebugDrawMode::Disabled,
            environment: None,
            fallback_environment: None,
            camera_attributes: None,
            pairing_stats: PairingStats::default(),
        }
    }

    // ===== ACCESSORS =====

    pub fn geometry_index(&self) -> &dyn SceneIndex<InstanceKey> {
        self.geometry_index.as_ref()
    }

    pub fn volume_index(&self) -> &dyn SceneIndex<InstanceKey> {
        self.volume_index.as_ref()
    }

    /// Index holding instances of this kind.
    pub fn index_for(&self, kind: InstanceKind) -> &dyn SceneIndex<InstanceKey> {
        if kind.is_geometry() { self.geometry_index() } else { self.volume_index() }
    }

    pub(crate) fn index_for_mut(&mut self, kind: InstanceKind) -> &mut dyn SceneIndex<InstanceKey> {
        if kind.is_geometry() {
            self.geometry_index.as_mut()
        } else {
            self.volume_index.as_mut()
        }
    }

    pub fn instance_data(&self) -> &[InstanceData] {
        &self.instance_data
    }

    pub fn instance_aabbs(&self) -> &[AABB] {
        &self.instance_aabbs
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn contains(&self, key: InstanceKey) -> bool {
        self.instances.contains(&key)
    }

    pub fn directional_lights(&self) -> &[InstanceKey] {
        &self.directional_lights
    }

    pub fn shadow_atlas(&self) -> ResourceId {
        self.shadow_atlas
    }

    pub fn reflection_atlas(&self) -> ResourceId {
        self.reflection_atlas
    }

    pub fn reflection_atlas_size(&self) -> (u32, u32) {
        self.reflection_atlas_size
    }

    pub fn debug_draw(&self) -> DebugDrawMode {
        self.debug_draw
    }

    /// Environment used by cameras without one of their own.
    pub fn effective_environment(&self, camera_environment: Option<ResourceId>) -> Option<ResourceId> {
        camera_environment.or(self.environment).or(self.fallback_environment)
    }

    pub fn pairing_stats(&self) -> PairingStats {
        self.pairing_stats
    }

    // ===== RENDER DATA ARRAY =====

    /// Append a render-data entry; returns its array index.
    pub(crate) fn push_instance_data(&mut self, data: InstanceData, aabb: AABB) -> usize {
        self.instance_data.push(data);
        self.instance_aabbs.push(aabb);
        self.instance_data.len() - 1
    }

    /// Swap-remove entry `index`.
    ///
    /// Returns the key of the instance that moved into `index`, if any.
    pub(crate) fn remove_instance_data(&mut self, index: usize) -> Option<InstanceKey> {
        if index >= self.instance_data.len() {
            return None;
        }
        self.instance_data.swap_remove(index);
        self.instance_aabbs.swap_remove(index);
        self.instance_data.get(index).map(|data| data.key)
    }

    /// Record `key` as a member, in the list matching its kind.
    pub(crate) fn track_instance(&mut self, key: InstanceKey, kind: InstanceKind, directional: bool) {
        self.forget_instance(key);
        self.instances.insert(key);
        match kind {
            InstanceKind::Particles => {
                self.particles.insert(key);
            }
            InstanceKind::GiProbe => {
                self.gi_probes.insert(key);
            }
            InstanceKind::ReflectionProbe => {
                self.reflection_probes.insert(key);
            }
            InstanceKind::Light if directional => self.directional_lights.push(key),
            _ => {}
        }
    }

    /// Drop `key` from every membership list.
    pub(crate) fn forget_instance(&mut self, key: InstanceKey) {
        self.instances.remove(&key);
        self.particles.remove(&key);
        self.gi_probes.remove(&key);
        self.reflection_probes.remove(&key);
        self.directional_lights.retain(|light| *light != key);
    }

    pub(crate) fn data_mut(&mut self, index: usize) -> Option<&mut InstanceData> {
        self.instance_data.get_mut(index)
    }

    pub(crate) fn set_aabb(&mut self, index: usize, aabb: AABB) {
        if let Some(slot) = self.instance_aabbs.get_mut(index) {
            *slot = aabb;
        }
    }
}

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod tests;
