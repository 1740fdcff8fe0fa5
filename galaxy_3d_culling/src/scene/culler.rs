/// Cull strategies.
///
/// A Culler walks a scenario's flat render-data array once and classifies
/// every instance against all regions of a request at the same time: the
/// main frustum, each directional shadow cascade and each SDFGI region.
///
/// The pass is read-only over the scenario. The only writes go to a
/// `CullSink` (probe redraws, GI probe updates). A serial pass owns the
/// schedule and the backend outright; only worker passes share them
/// behind locks. Work that mutates instances (pairing array refresh,
/// shadow version bumps) is reported in the `CullResult` and done by the
/// caller after the pass.

use std::ops::Range;
use std::sync::Arc;
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPool;
use rustc_hash::FxHashSet;
use crate::backend::{BackendHandle, ReflectionProbeUpdateMode, RenderBackend};
use crate::camera::Frustum;
use crate::shadow::ProbeRenderQueue;
use super::cull_result::CullResult;
use super::instance::{InstanceKey, InstanceKind};
use super::scenario::{InstanceData, InstanceFlags, Scenario};
use super::AABB;

/// What to cull against.
#[derive(Debug, Clone, PartialEq)]
pub struct CullRequest {
    pub frustum: Frustum,
    /// Instances whose layer mask misses this are not in the main lists
    pub layer_mask: u32,
    /// Directional shadow cascade caster volumes
    pub cascades: Vec<Frustum>,
    pub sdfgi_regions: Vec<AABB>,
    /// Probe being rendered by this very pass, never in its own result
    pub excluded_probe: Option<InstanceKey>,
    /// The target has a shadow atlas: report shadowed lights
    pub shadow_atlas: bool,
}

impl CullRequest {
    pub fn new(frustum: Frustum, layer_mask: u32) -> Self {
        Self {
            frustum,
            layer_mask,
            cascades: Vec::new(),
            sdfgi_regions: Vec::new(),
            excluded_probe: None,
            shadow_atlas: false,
        }
    }
}

/// Cross-cutting work discovered during a pass.
#[derive(Debug, Clone, Default)]
pub struct CullSchedule {
    pub probes: ProbeRenderQueue,
    pub gi_probes_dirty: FxHashSet<InstanceKey>,
}

/// Everything a pass reads.
#[derive(Clone, Copy)]
pub struct CullContext<'a> {
    pub scenario: &'a Scenario,
    pub request: &'a CullRequest,
}

/// Receiver of the cross-cutting work a pass discovers.
pub trait CullSink {
    fn probe_needs_redraw(&mut self, probe: BackendHandle) -> bool;
    fn gi_probe_needs_update(&mut self, probe: BackendHandle) -> bool;
    fn schedule_probe(&mut self, key: InstanceKey, probe: BackendHandle, mode: ReflectionProbeUpdateMode);
    fn mark_gi_probe_dirty(&mut self, key: InstanceKey);
}

/// Exclusive access to what a pass writes to. No locking.
pub struct PassTargets<'a> {
    pub schedule: &'a mut CullSchedule,
    pub backend: &'a mut dyn RenderBackend,
}

impl CullSink for PassTargets<'_> {
    fn probe_needs_redraw(&mut self, probe: BackendHandle) -> bool {
        self.backend.reflection_probe_instance_needs_redraw(probe)
    }

    fn gi_probe_needs_update(&mut self, probe: BackendHandle) -> bool {
        self.backend.gi_probe_needs_update(probe)
    }

    fn schedule_probe(&mut self, key: InstanceKey, probe: BackendHandle, mode: ReflectionProbeUpdateMode) {
        self.schedule.probes.schedule(key, probe, mode);
    }

    fn mark_gi_probe_dirty(&mut self, key: InstanceKey) {
        self.schedule.gi_probes_dirty.insert(key);
    }
}

/// Worker view of the pass targets, every access behind its lock.
#[derive(Clone, Copy)]
struct LockedTargets<'a, 'b> {
    schedule: &'a Mutex<CullSchedule>,
    backend: &'a Mutex<&'b mut dyn RenderBackend>,
}

impl CullSink for LockedTargets<'_, '_> {
    fn probe_needs_redraw(&mut self, probe: BackendHandle) -> bool {
        self.backend.lock().reflection_probe_instance_needs_redraw(probe)
    }

    fn gi_probe_needs_update(&mut self, probe: BackendHandle) -> bool {
        self.backend.lock().gi_probe_needs_update(probe)
    }

    fn schedule_probe(&mut self, key: InstanceKey, probe: BackendHandle, mode: ReflectionProbeUpdateMode) {
        self.schedule.lock().probes.schedule(key, probe, mode);
    }

    fn mark_gi_probe_dirty(&mut self, key: InstanceKey) {
        self.schedule.lock().gi_probes_dirty.insert(key);
    }
}

/// Cull `scenario.instance_data()[range]` into a fresh result.
pub fn cull_range(ctx: &CullContext, range: Range<usize>, sink: &mut dyn CullSink) -> CullResult {
    let request = ctx.request;
    let mut result = CullResult::with_regions(request.cascades.len(), request.sdfgi_regions.len());
    let data = ctx.scenario.instance_data().get(range.clone()).unwrap_or(&[]);
    let aabbs = ctx.scenario.instance_aabbs().get(range).unwrap_or(&[]);

    for (data, aabb) in data.iter().zip(aabbs) {
        if data.layer_mask & request.layer_mask != 0 && request.frustum.intersects_aabb(aabb) {
            classify_visible(ctx, data, sink, &mut result);
        }

        if !data.kind.is_geometry() {
            continue;
        }
        if data.flags.contains(InstanceFlags::CAST_SHADOWS) {
            for (casters, cascade) in result.cascade_casters.iter_mut().zip(&request.cascades) {
                if cascade.intersects_aabb(aabb) {
                    casters.push(data.handle);
                }
            }
        }
        for (geometry, region) in result.sdfgi_region_geometry.iter_mut().zip(&request.sdfgi_regions) {
            if region.intersects(aabb) {
                geometry.push(data.handle);
            }
        }
    }
    result
}

fn classify_visible(ctx: &CullContext, data: &InstanceData, sink: &mut dyn CullSink, result: &mut CullResult) {
    match data.kind {
        InstanceKind::Light => {
            result.lights.push(data.handle);
            if ctx.request.shadow_atlas && data.flags.contains(InstanceFlags::LIGHT_SHADOWED) {
                result.shadow_lights.push(data.key);
            }
        }
        InstanceKind::ReflectionProbe => {
            if ctx.request.excluded_probe == Some(data.key) {
                return;
            }
            result.reflection_probes.push(data.handle);

            let always = data.flags.contains(InstanceFlags::REFLECTION_ALWAYS);
            let redraw = always
                || data.flags.contains(InstanceFlags::REFLECTION_DIRTY)
                || sink.probe_needs_redraw(data.handle);
            if redraw {
                let mode = if always {
                    ReflectionProbeUpdateMode::Always
                } else {
                    ReflectionProbeUpdateMode::Once
                };
                sink.schedule_probe(data.key, data.handle, mode);
            }
        }
        InstanceKind::Decal => result.decals.push(data.handle),
        InstanceKind::GiProbe => {
            result.gi_probes.push(data.handle);
            if sink.gi_probe_needs_update(data.handle) {
                sink.mark_gi_probe_dirty(data.key);
            }
        }
        InstanceKind::Lightmap => result.lightmaps.push(data.handle),
        InstanceKind::Mesh | InstanceKind::MultiMesh | InstanceKind::Particles => {
            if !data.flags.contains(InstanceFlags::SHADOWS_ONLY) {
                result.geometry.push(data.handle);
            }
            if data.flags.intersects(InstanceFlags::PAIR_DIRTY_MASK) {
                result.pairing_dirty.push(data.key);
            }
            if data.flags.contains(InstanceFlags::SKINNED) {
                result.skinned.push(data.handle);
            }
            if data.flags.contains(InstanceFlags::ANIMATED_MATERIAL | InstanceFlags::CAST_SHADOWS) {
                result.animated_casters.push(data.key);
            }
        }
        // Colliders are assigned to particles separately
        InstanceKind::ParticlesCollision | InstanceKind::None => {}
    }
}

/// Split `0..len` into `slices` contiguous ranges; the last absorbs the remainder.
pub fn slice_ranges(len: usize, slices: usize) -> Vec<Range<usize>> {
    let slices = slices.max(1);
    let size = len / slices;
    if size == 0 {
        return vec![0..len];
    }
    (0..slices)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == slices { len } else { start + size };
            start..end
        })
        .collect()
}

/// Strategy for running a cull pass.
pub trait Culler: Send + Sync {
    fn cull(&self, ctx: &CullContext, targets: PassTargets<'_>) -> CullResult;
}

/// Single-threaded culler, one range over the whole array.
pub struct SerialCuller;

impl SerialCuller {
    pub fn new() -> Self {
        Self
    }
}

impl Culler for SerialCuller {
    fn cull(&self, ctx: &CullContext, mut targets: PassTargets<'_>) -> CullResult {
        cull_range(ctx, 0..ctx.scenario.instance_data().len(), &mut targets)
    }
}

/// Worker-pool culler.
///
/// One contiguous slice per worker, each culled into a private result.
/// Results are concatenated in slice order, so the output is the same
/// for every run. The schedule and backend are put behind locks for the
/// duration of the pass only.
pub struct ParallelCuller {
    pool: Arc<ThreadPool>,
}

impl ParallelCuller {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Culler for ParallelCuller {
    fn cull(&self, ctx: &CullContext, targets: PassTargets<'_>) -> CullResult {
        let PassTargets { schedule, backend } = targets;
        let shared_schedule = Mutex::new(std::mem::take(schedule));
        let shared_backend = Mutex::new(backend);
        let locked = LockedTargets { schedule: &shared_schedule, backend: &shared_backend };

        let ranges = slice_ranges(ctx.scenario.instance_data().len(), self.worker_count());
        let partials: Vec<CullResult> = self.pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| {
                    let mut sink = locked;
                    cull_range(ctx, range, &mut sink)
                })
                .collect()
        });
        *schedule = shared_schedule.into_inner();

        let request = ctx.request;
        let mut result = CullResult::with_regions(request.cascades.len(), request.sdfgi_regions.len());
        for partial in partials {
            result.append(partial);
        }
        result
    }
}

#[cfg(test)]
#[path = "culler_tests.rs"]
mod tests;
