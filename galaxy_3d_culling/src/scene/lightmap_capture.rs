/// Dynamic-GI lightmap capture.
///
/// A geometry that opted into dynamic GI samples the SH capture field of
/// every lightmap volume it is paired with, at its own AABB center, and
/// blends the samples. The blend weight falls off smoothly toward the
/// volume boundary. Interior volumes fully override exterior ones; volumes
/// of the same class are averaged by weight.

use glam::Vec3;
use slotmap::SlotMap;
use crate::backend::{RenderBackend, ResourceStorage, ShCoefficients};
use super::instance::{Instance, InstanceKey, Payload};
use super::AABB;

/// One lightmap's contribution at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSample {
    pub sh: ShCoefficients,
    pub weight: f32,
    pub interior: bool,
}

/// Weight of a point inside `bounds`: 1 at the center, 0 on the faces.
///
/// The falloff is a rounded box: it follows the largest axis distance
/// near the faces and the euclidean distance near the center.
pub fn falloff_weight(local_point: Vec3, bounds: &AABB) -> f32 {
    let size = bounds.size();
    if size.cmple(Vec3::ZERO).any() || !bounds.is_finite() {
        return 0.0;
    }
    let inner = ((local_point - bounds.min) / size) * 2.0 - Vec3::ONE;
    let max_axis = inner.abs().max_element();
    let rounded = inner.length() + (max_axis - inner.length()) * max_axis;
    (1.0 - rounded * rounded).max(0.0)
}

/// Blend samples into one capture.
///
/// Returns `None` when nothing contributes.
pub fn blend_captures(samples: &[CaptureSample]) -> Option<ShCoefficients> {
    let use_interior = samples.iter().any(|s| s.interior && s.weight > 0.0);
    let mut accum = [Vec3::ZERO; 9];
    let mut total = 0.0;

    for sample in samples.iter().filter(|s| s.interior == use_interior && s.weight > 0.0) {
        for (acc, coefficient) in accum.iter_mut().zip(sample.sh.iter()) {
            *acc += *coefficient * sample.weight;
        }
        total += sample.weight;
    }

    if total <= 0.0 {
        return None;
    }
    for acc in accum.iter_mut() {
        *acc /= total;
    }
    Some(accum)
}

/// Resample the lightmap capture of geometry `key` and push it.
///
/// Lightmaps whose resource disappeared contribute nothing.
pub fn update_lightmap_capture(
    instances: &mut SlotMap<InstanceKey, Instance>,
    key: InstanceKey,
    resources: &dyn ResourceStorage,
    backend: &mut dyn RenderBackend,
) {
    let Some(instance) = instances.get(key) else {
        return;
    };
    let Some(geometry) = instance.payload.geometry() else {
        return;
    };
    let center = instance.transformed_aabb.center();

    let mut lightmaps: Vec<InstanceKey> = geometry.lightmap_captures.iter().copied().collect();
    lightmaps.sort_unstable();

    let samples: Vec<CaptureSample> = lightmaps
        .into_iter()
        .filter_map(|lightmap_key| {
            let lightmap = instances.get(lightmap_key)?;
            let base = lightmap.base?;
            let info = resources.lightmap_info(base)?;
            let local = lightmap.transform.inverse().transform_point3(center);
            let sh = resources.lightmap_sample_capture(base, local)?;
            Some(CaptureSample {
                sh,
                weight: falloff_weight(local, &info.bounds),
                interior: info.interior,
            })
        })
        .collect();

    let capture = blend_captures(&samples);
    let handle = instance.handle;

    if let Some(Payload::Geometry(geometry)) = instances.get_mut(key).map(|i| &mut i.payload) {
        geometry.lightmap_sh = capture;
        geometry.capture_dirty = false;
    }
    if let Some(handle) = handle {
        backend.geometry_instance_set_lightmap_capture(handle, capture.as_ref());
    }
}

#[cfg(test)]
#[path = "lightmap_capture_tests.rs"]
mod tests;
