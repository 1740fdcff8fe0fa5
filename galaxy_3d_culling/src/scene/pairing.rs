/// Pairing engine: symmetric geometry <-> volume relationships.
///
/// After an instance is inserted or moved in its index, `pair_instance`
/// queries the complementary index for overlapping candidates, links the
/// new ones and unlinks the ones no longer confirmed. Every link is
/// written on both sides in the same call, so "B in A's set" holds if and
/// only if "A in B's set".
///
/// Pair rules (geometry kinds are the lower tag and always the "A" side):
/// - geometry <-> light: light shadow dirty if the geometry casts shadows
/// - geometry <-> reflection probe, decal
/// - geometry <-> GI probe: dynamic-GI geometry goes to the dynamic set
/// - geometry <-> lightmap: only for dynamic-GI geometry, recaptures SH
/// - light <-> GI probe

use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use crate::backend::{BackendHandle, RenderBackend};
use super::instance::{GeometryFlags, Instance, InstanceKey, InstanceKind, Payload};
use super::scenario::{InstanceFlags, Scenario};
use super::scene_index::LeafId;

/// Summary of one pairing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairOutcome {
    pub added: usize,
    pub removed: usize,
    /// Geometry instances that lost a link; their backend arrays are stale
    pub unpaired_geometry: Vec<InstanceKey>,
}

impl PairOutcome {
    fn merge(&mut self, other: PairOutcome) {
        self.added += other.added;
        self.removed += other.removed;
        self.unpaired_geometry.extend(other.unpaired_geometry);
    }
}

/// Whether two instances may be paired, independently of overlap.
pub fn pair_allowed(a: &Instance, b: &Instance) -> bool {
    let (first, second) = if a.kind <= b.kind { (a, b) } else { (b, a) };
    match (first.kind, second.kind) {
        (g, InstanceKind::Light | InstanceKind::ReflectionProbe | InstanceKind::Decal | InstanceKind::GiProbe)
            if g.is_geometry() => true,
        (g, InstanceKind::Lightmap) if g.is_geometry() => {
            first.geometry_flags.contains(GeometryFlags::USE_DYNAMIC_GI)
        }
        (InstanceKind::Light, InstanceKind::GiProbe) => true,
        _ => false,
    }
}

/// Overlapping, pairable instances for `key` at its current AABB.
fn collect_candidates(
    instances: &SlotMap<InstanceKey, Instance>,
    scenario: &Scenario,
    key: InstanceKey,
) -> FxHashSet<InstanceKey> {
    let mut found = FxHashSet::default();
    let Some(instance) = instances.get(key) else {
        return found;
    };
    if !instance.is_indexed() {
        return found;
    }
    let aabb = instance.transformed_aabb;
    let mut visit = |_: LeafId, other: &InstanceKey| {
        if *other != key {
            if let Some(other_instance) = instances.get(*other) {
                if pair_allowed(instance, other_instance) {
                    found.insert(*other);
                }
            }
        }
        false
    };

    if instance.kind.is_geometry() {
        scenario.volume_index().aabb_query(&aabb, &mut visit);
    } else {
        scenario.geometry_index().aabb_query(&aabb, &mut visit);
        if matches!(instance.kind, InstanceKind::Light | InstanceKind::GiProbe) {
            scenario.volume_index().aabb_query(&aabb, &mut visit);
        }
    }
    found
}

/// Re-pair `key` against the scenario's indexes.
///
/// Links not re-confirmed are torn down, new overlaps are linked.
/// Running it twice without motion changes nothing the second time.
pub fn pair_instance(
    instances: &mut SlotMap<InstanceKey, Instance>,
    scenario: &mut Scenario,
    key: InstanceKey,
) -> PairOutcome {
    let candidates = collect_candidates(instances, scenario, key);
    let Some(current) = instances.get(key).map(|instance| instance.payload.paired()) else {
        return PairOutcome::default();
    };

    scenario.pairing_stats.passes += 1;
    let pass = scenario.pairing_stats.passes;
    let mut outcome = PairOutcome::default();

    let mut stale: Vec<InstanceKey> = current.difference(&candidates).copied().collect();
    stale.sort_unstable();
    for other in stale {
        outcome.merge(unlink(instances, scenario, key, other));
    }

    let mut fresh: Vec<InstanceKey> = candidates.difference(&current).copied().collect();
    fresh.sort_unstable();
    for other in fresh {
        if link(instances, scenario, key, other) {
            outcome.added += 1;
        }
    }

    if let Some(instance) = instances.get_mut(key) {
        instance.pair_pass = pass;
    }
    scenario.pairing_stats.pairs_added += outcome.added as u64;
    scenario.pairing_stats.pairs_removed += outcome.removed as u64;
    outcome
}

/// Tear down every link of `key` (removal from the index, free).
pub fn unpair_all(
    instances: &mut SlotMap<InstanceKey, Instance>,
    scenario: &mut Scenario,
    key: InstanceKey,
) -> PairOutcome {
    let Some(current) = instances.get(key).map(|instance| instance.payload.paired()) else {
        return PairOutcome::default();
    };
    let mut current: Vec<InstanceKey> = current.into_iter().collect();
    current.sort_unstable();

    let mut outcome = PairOutcome::default();
    for other in current {
        outcome.merge(unlink(instances, scenario, key, other));
    }
    scenario.pairing_stats.pairs_removed += outcome.removed as u64;
    outcome
}

fn set_flags(scenario: &mut Scenario, instance: &Instance, flags: InstanceFlags) {
    if flags.is_empty() {
        return;
    }
    if let Some(slot) = instance.index_slot {
        if let Some(data) = scenario.data_mut(slot.array_index) {
            data.flags |= flags;
        }
    }
}

/// Add the link on both sides. Returns `false` if the pair is not valid.
fn link(
    instances: &mut SlotMap<InstanceKey, Instance>,
    scenario: &mut Scenario,
    a: InstanceKey,
    b: InstanceKey,
) -> bool {
    let Some([first, second]) = instances.get_disjoint_mut([a, b]) else {
        return false;
    };
    let (low_key, low, high_key, high) = if first.kind <= second.kind {
        (a, first, b, second)
    } else {
        (b, second, a, first)
    };
    let dynamic_gi = low.geometry_flags.contains(GeometryFlags::USE_DYNAMIC_GI);

    let geometry_flags = match (&mut low.payload, &mut high.payload) {
        (Payload::Geometry(geometry), Payload::Light(light)) => {
            geometry.lights.insert(high_key);
            light.geometries.insert(low_key);
            if geometry.can_cast_shadows {
                light.mark_shadow_dirty();
            }
            InstanceFlags::PAIR_LIGHTS_DIRTY
        }
        (Payload::Geometry(geometry), Payload::ReflectionProbe(probe)) => {
            geometry.reflection_probes.insert(high_key);
            probe.geometries.insert(low_key);
            InstanceFlags::PAIR_REFLECTIONS_DIRTY
        }
        (Payload::Geometry(geometry), Payload::Decal(decal)) => {
            geometry.decals.insert(high_key);
            decal.geometries.insert(low_key);
            InstanceFlags::PAIR_DECALS_DIRTY
        }
        (Payload::Geometry(geometry), Payload::GiProbe(probe)) => {
            geometry.gi_probes.insert(high_key);
            if dynamic_gi {
                probe.dynamic_geometries.insert(low_key);
            } else {
                probe.geometries.insert(low_key);
            }
            InstanceFlags::PAIR_GI_PROBES_DIRTY
        }
        (Payload::Geometry(geometry), Payload::Lightmap(lightmap)) => {
            geometry.lightmap_captures.insert(high_key);
            lightmap.geometries.insert(low_key);
            geometry.capture_dirty = true;
            InstanceFlags::empty()
        }
        (Payload::Light(light), Payload::GiProbe(probe)) => {
            light.gi_probes.insert(high_key);
            probe.lights.insert(low_key);
            InstanceFlags::empty()
        }
        _ => return false,
    };
    set_flags(scenario, low, geometry_flags);
    true
}

/// Remove `other` from every relationship set of `payload`.
///
/// Returns the geometry pairing categories that changed.
fn forget(payload: &mut Payload, other: InstanceKey) -> (bool, InstanceFlags) {
    let mut flags = InstanceFlags::empty();
    let removed = match payload {
        Payload::Geometry(geometry) => {
            if geometry.lights.remove(&other) {
                flags |= InstanceFlags::PAIR_LIGHTS_DIRTY;
            }
            if geometry.reflection_probes.remove(&other) {
                flags |= InstanceFlags::PAIR_REFLECTIONS_DIRTY;
            }
            if geometry.decals.remove(&other) {
                flags |= InstanceFlags::PAIR_DECALS_DIRTY;
            }
            if geometry.gi_probes.remove(&other) {
                flags |= InstanceFlags::PAIR_GI_PROBES_DIRTY;
            }
            let lightmap = geometry.lightmap_captures.remove(&other);
            if lightmap {
                geometry.capture_dirty = true;
            }
            lightmap || !flags.is_empty()
        }
        Payload::Light(light) => {
            let geometry = light.geometries.remove(&other);
            geometry | light.gi_probes.remove(&other)
        }
        Payload::ReflectionProbe(probe) => probe.geometries.remove(&other),
        Payload::Decal(decal) => decal.geometries.remove(&other),
        Payload::GiProbe(probe) => {
            probe.geometries.remove(&other)
                | probe.dynamic_geometries.remove(&other)
                | probe.lights.remove(&other)
        }
        Payload::Lightmap(lightmap) => lightmap.geometries.remove(&other),
        Payload::None | Payload::ParticlesCollision => false,
    };
    (removed, flags)
}

/// Remove the link on both sides. A freed partner only loses its half.
fn unlink(
    instances: &mut SlotMap<InstanceKey, Instance>,
    scenario: &mut Scenario,
    a: InstanceKey,
    b: InstanceKey,
) -> PairOutcome {
    let mut outcome = PairOutcome::default();
    let Some([first, second]) = instances.get_disjoint_mut([a, b]) else {
        // Partner already gone: drop our dangling half
        if let Some(instance) = instances.get_mut(a) {
            let (removed, flags) = forget(&mut instance.payload, b);
            if removed {
                outcome.removed += 1;
                if instance.kind.is_geometry() {
                    outcome.unpaired_geometry.push(a);
                }
            }
            let instance = &instances[a];
            set_flags(scenario, instance, flags);
        }
        return outcome;
    };

    let (removed_first, flags_first) = forget(&mut first.payload, b);
    let (removed_second, flags_second) = forget(&mut second.payload, a);
    if !(removed_first || removed_second) {
        return outcome;
    }
    outcome.removed += 1;

    caster_left_light(first, second);
    caster_left_light(second, first);

    for (key, instance) in [(a, &*first), (b, &*second)] {
        if instance.kind.is_geometry() {
            outcome.unpaired_geometry.push(key);
        }
    }
    set_flags(scenario, first, flags_first);
    set_flags(scenario, second, flags_second);
    outcome
}

/// A caster leaving a light changes its shadow.
fn caster_left_light(geometry: &Instance, light: &mut Instance) {
    if let (Payload::Geometry(g), Payload::Light(light)) = (&geometry.payload, &mut light.payload) {
        if g.can_cast_shadows {
            light.mark_shadow_dirty();
        }
    }
}

/// Push refreshed pairing arrays for the dirty categories of `key`.
///
/// Each array keeps the `max_pairs` nearest partners (squared distance
/// between AABB centers, ties by key order). Clears the dirty bits.
pub fn refresh_pairing_arrays(
    instances: &SlotMap<InstanceKey, Instance>,
    scenario: &mut Scenario,
    key: InstanceKey,
    backend: &mut dyn RenderBackend,
    max_pairs: usize,
) {
    let Some(instance) = instances.get(key) else {
        return;
    };
    let (Some(geometry), Some(handle)) = (instance.payload.geometry(), instance.handle) else {
        return;
    };

    let dirty = match instance.index_slot {
        Some(slot) => match scenario.data_mut(slot.array_index) {
            Some(data) => {
                let dirty = data.flags & InstanceFlags::PAIR_DIRTY_MASK;
                data.flags.remove(InstanceFlags::PAIR_DIRTY_MASK);
                dirty
            }
            None => InstanceFlags::PAIR_DIRTY_MASK,
        },
        // Not indexed: sets are empty, clear everything on the backend
        None => InstanceFlags::PAIR_DIRTY_MASK,
    };

    let center = instance.transformed_aabb.center();
    let nearest = |set: &FxHashSet<InstanceKey>| -> Vec<BackendHandle> {
        let mut ranked: Vec<(f32, InstanceKey, BackendHandle)> = set
            .iter()
            .filter_map(|other| {
                let other_instance = instances.get(*other)?;
                let distance = other_instance.transformed_aabb.center().distance_squared(center);
                Some((distance, *other, other_instance.handle?))
            })
            .collect();
        ranked.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
        ranked.into_iter().take(max_pairs).map(|(_, _, h)| h).collect()
    };

    if dirty.contains(InstanceFlags::PAIR_LIGHTS_DIRTY) {
        backend.geometry_instance_pair_light_instances(handle, &nearest(&geometry.lights));
    }
    if dirty.contains(InstanceFlags::PAIR_REFLECTIONS_DIRTY) {
        backend.geometry_instance_pair_reflection_probe_instances(handle, &nearest(&geometry.reflection_probes));
    }
    if dirty.contains(InstanceFlags::PAIR_DECALS_DIRTY) {
        backend.geometry_instance_pair_decal_instances(handle, &nearest(&geometry.decals));
    }
    if dirty.contains(InstanceFlags::PAIR_GI_PROBES_DIRTY) {
        backend.geometry_instance_pair_gi_probe_instances(handle, &nearest(&geometry.gi_probes));
    }
}

#[cfg(test)]
#[path = "pairing_tests.rs"]
mod tests;
