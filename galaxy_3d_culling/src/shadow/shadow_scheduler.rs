/// Positional shadow scheduling.
///
/// Every visible shadowed omni/spot light is offered to the shadow atlas
/// with its screen coverage and shadow version. The backend answers
/// whether the cached shadow must be redrawn. At most `budget` lights
/// are redrawn per frame, largest coverage first; the others keep their
/// stale shadow and stay pending until a later frame has room.

use crate::backend::{BackendHandle, LightType, OmniShadowMode, RenderBackend, ResourceId};
use crate::camera::Camera;
use crate::scene::{InstanceKey, AABB};

/// Shadow map passes needed to redraw one light.
pub fn shadow_pass_count(light_type: LightType, omni_mode: OmniShadowMode) -> u32 {
    match (light_type, omni_mode) {
        (LightType::Directional, _) => 0,
        (LightType::Omni, OmniShadowMode::Cube) => 6,
        (LightType::Omni, OmniShadowMode::DualParaboloid) => 2,
        (LightType::Spot, _) => 1,
    }
}

/// Fraction of the viewport covered by a light volume, in [0, 1].
///
/// A camera inside the volume gets full coverage.
pub fn light_coverage(camera: &Camera, aspect: f32, light_aabb: &AABB) -> f32 {
    let center = light_aabb.center();
    let radius = light_aabb.size().length() * 0.5;
    if camera.position().distance(center) <= radius {
        return 1.0;
    }

    let view_center = camera.view_matrix().transform_point3(center);
    let depth = -view_center.z;
    if depth <= 0.0 {
        // Behind the camera but not containing it
        return 0.0;
    }

    let projection = camera.projection_matrix(aspect);
    let edge = view_center + glam::Vec3::new(radius, 0.0, 0.0);
    let ndc_center = projection.project_point3(view_center);
    let ndc_edge = projection.project_point3(edge);
    // Projected diameter over the 2-unit NDC width
    let fraction = (ndc_edge.x - ndc_center.x).abs();
    if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 }
}

/// A visible shadowed light competing for this frame's budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCandidate {
    pub key: InstanceKey,
    pub handle: BackendHandle,
    pub passes: u32,
    pub coverage: f32,
    pub version: u64,
    /// Redraw requested by an earlier frame that ran out of budget
    pub pending: bool,
}

/// Outcome of one scheduling round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowSchedule {
    /// Lights to redraw now, in priority order
    pub redraw: Vec<ShadowCandidate>,
    /// Lights that needed a redraw but did not fit the budget
    pub deferred: Vec<InstanceKey>,
}

/// Place every candidate in the atlas and pick the lights to redraw.
///
/// Candidates are visited by decreasing coverage, ties by key, so the
/// budget favors what is large on screen and the order is stable.
pub fn schedule_positional_shadows(
    candidates: &mut [ShadowCandidate],
    budget: usize,
    atlas: ResourceId,
    backend: &mut dyn RenderBackend,
) -> ShadowSchedule {
    candidates.sort_by(|a, b| b.coverage.total_cmp(&a.coverage).then(a.key.cmp(&b.key)));

    let mut schedule = ShadowSchedule::default();
    for candidate in candidates.iter() {
        let changed = backend.shadow_atlas_update_light(atlas, candidate.handle, candidate.coverage, candidate.version);
        if !(changed || candidate.pending) {
            continue;
        }
        if schedule.redraw.len() < budget {
            schedule.redraw.push(*candidate);
        } else {
            schedule.deferred.push(candidate.key);
        }
    }

    if !schedule.deferred.is_empty() {
        crate::engine_debug!(
            "galaxy3d::ShadowScheduler",
            "Shadow budget {} reached, {} light(s) deferred",
            budget,
            schedule.deferred.len()
        );
    }
    schedule
}

#[cfg(test)]
#[path = "shadow_scheduler_tests.rs"]
mod tests;
