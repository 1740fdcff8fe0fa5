/// Output of one cull pass.
///
/// Lists the backend draws from hold backend handles. Lists only the
/// update thread consumes (shadow scheduling, pairing refresh) hold
/// instance keys. Per-cascade and per-SDFGI-region lists are indexed like
/// the request that produced them.

use crate::backend::BackendHandle;
use super::instance::InstanceKey;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CullResult {
    /// Visible positional lights
    pub lights: Vec<BackendHandle>,
    /// Visible lights with shadows enabled (only with a shadow atlas)
    pub shadow_lights: Vec<InstanceKey>,
    pub reflection_probes: Vec<BackendHandle>,
    pub decals: Vec<BackendHandle>,
    pub gi_probes: Vec<BackendHandle>,
    pub lightmaps: Vec<BackendHandle>,
    /// Geometry drawn by the main pass (shadow-only casters excluded)
    pub geometry: Vec<BackendHandle>,
    /// Visible geometry whose backend pairing arrays are stale
    pub pairing_dirty: Vec<InstanceKey>,
    /// Visible shadow casters with animated materials
    pub animated_casters: Vec<InstanceKey>,
    /// Visible skinned geometry
    pub skinned: Vec<BackendHandle>,
    pub cascade_casters: Vec<Vec<BackendHandle>>,
    pub sdfgi_region_geometry: Vec<Vec<BackendHandle>>,
}

impl CullResult {
    /// Empty result with one caster list per cascade and per region.
    pub fn with_regions(cascades: usize, sdfgi_regions: usize) -> Self {
        Self {
            cascade_casters: vec![Vec::new(); cascades],
            sdfgi_region_geometry: vec![Vec::new(); sdfgi_regions],
            ..Default::default()
        }
    }

    /// Concatenate `other` after `self`, list by list.
    pub fn append(&mut self, mut other: CullResult) {
        self.lights.append(&mut other.lights);
        self.shadow_lights.append(&mut other.shadow_lights);
        self.reflection_probes.append(&mut other.reflection_probes);
        self.decals.append(&mut other.decals);
        self.gi_probes.append(&mut other.gi_probes);
        self.lightmaps.append(&mut other.lightmaps);
        self.geometry.append(&mut other.geometry);
        self.pairing_dirty.append(&mut other.pairing_dirty);
        self.animated_casters.append(&mut other.animated_casters);
        self.skinned.append(&mut other.skinned);
        append_regions(&mut self.cascade_casters, other.cascade_casters);
        append_regions(&mut self.sdfgi_region_geometry, other.sdfgi_region_geometry);
    }

    /// Empty every list, keeping the region counts.
    pub fn clear(&mut self) {
        self.lights.clear();
        self.shadow_lights.clear();
        self.reflection_probes.clear();
        self.decals.clear();
        self.gi_probes.clear();
        self.lightmaps.clear();
        self.geometry.clear();
        self.pairing_dirty.clear();
        self.animated_casters.clear();
        self.skinned.clear();
        self.cascade_casters.iter_mut().for_each(Vec::clear);
        self.sdfgi_region_geometry.iter_mut().for_each(Vec::clear);
    }

    /// Copy with every list sorted, for order-independent comparison.
    pub fn sorted(&self) -> Self {
        let mut result = self.clone();
        result.lights.sort_unstable();
        result.shadow_lights.sort_unstable();
        result.reflection_probes.sort_unstable();
        result.decals.sort_unstable();
        result.gi_probes.sort_unstable();
        result.lightmaps.sort_unstable();
        result.geometry.sort_unstable();
        result.pairing_dirty.sort_unstable();
        result.animated_casters.sort_unstable();
        result.skinned.sort_unstable();
        result.cascade_casters.iter_mut().for_each(|list| list.sort_unstable());
        result.sdfgi_region_geometry.iter_mut().for_each(|list| list.sort_unstable());
        result
    }
}

fn append_regions(target: &mut Vec<Vec<BackendHandle>>, other: Vec<Vec<BackendHandle>>) {
    if target.len() < other.len() {
        target.resize_with(other.len(), Vec::new);
    }
    for (list, mut extra) in target.iter_mut().zip(other) {
        list.append(&mut extra);
    }
}

#[cfg(test)]
#[path = "cull_result_tests.rs"]
mod tests;
