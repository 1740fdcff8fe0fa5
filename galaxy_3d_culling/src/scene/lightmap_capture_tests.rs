use super::*;
use glam::Mat4;
use crate::backend::mock::{MockBackend, MockLightmap, MockResources};
use crate::backend::{BackendHandle, LightmapInfo};
use crate::scene::instance::{GeometryPayload, InstanceKind, LightmapPayload};

fn uniform_sh(value: f32) -> ShCoefficients {
    [Vec3::splat(value); 9]
}

fn unit_bounds() -> AABB {
    AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0))
}

// ============================================================================
// Falloff
// ============================================================================

#[test]
fn test_falloff_center_is_full_weight() {
    assert!((falloff_weight(Vec3::ZERO, &unit_bounds()) - 1.0).abs() < 1e-6);
}

#[test]
fn test_falloff_face_and_outside_are_zero() {
    assert_eq!(falloff_weight(Vec3::new(1.0, 0.0, 0.0), &unit_bounds()), 0.0);
    assert_eq!(falloff_weight(Vec3::new(0.0, -1.0, 0.0), &unit_bounds()), 0.0);
    assert_eq!(falloff_weight(Vec3::new(3.0, 0.0, 0.0), &unit_bounds()), 0.0);
}

#[test]
fn test_falloff_decreases_toward_faces() {
    let bounds = unit_bounds();
    let a = falloff_weight(Vec3::new(0.2, 0.0, 0.0), &bounds);
    let b = falloff_weight(Vec3::new(0.5, 0.0, 0.0), &bounds);
    let c = falloff_weight(Vec3::new(0.9, 0.0, 0.0), &bounds);
    assert!(a > b && b > c && c > 0.0);
}

#[test]
fn test_falloff_flat_bounds_is_zero() {
    let flat = AABB::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 1.0));
    assert_eq!(falloff_weight(Vec3::ZERO, &flat), 0.0);
}

// ============================================================================
// Blending
// ============================================================================

#[test]
fn test_blend_empty_is_none() {
    assert!(blend_captures(&[]).is_none());
    let zero = CaptureSample { sh: uniform_sh(1.0), weight: 0.0, interior: false };
    assert!(blend_captures(&[zero]).is_none());
}

#[test]
fn test_blend_same_class_is_weighted_average() {
    let samples = [
        CaptureSample { sh: uniform_sh(1.0), weight: 3.0, interior: false },
        CaptureSample { sh: uniform_sh(5.0), weight: 1.0, interior: false },
    ];
    let blended = blend_captures(&samples).unwrap();
    for coefficient in blended {
        assert!((coefficient - Vec3::splat(2.0)).length() < 1e-5);
    }
}

#[test]
fn test_interior_overrides_exterior() {
    let samples = [
        CaptureSample { sh: uniform_sh(9.0), weight: 1.0, interior: false },
        CaptureSample { sh: uniform_sh(1.0), weight: 0.1, interior: true },
        CaptureSample { sh: uniform_sh(3.0), weight: 0.1, interior: true },
    ];
    let blended = blend_captures(&samples).unwrap();
    assert!((blended[0] - Vec3::splat(2.0)).length() < 1e-5);
}

#[test]
fn test_interior_with_zero_weight_does_not_override() {
    let samples = [
        CaptureSample { sh: uniform_sh(9.0), weight: 1.0, interior: false },
        CaptureSample { sh: uniform_sh(1.0), weight: 0.0, interior: true },
    ];
    assert_eq!(blend_captures(&samples).unwrap(), uniform_sh(9.0));
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn test_update_samples_paired_lightmaps() {
    let resources = MockResources::new();
    let base = resources.add_lightmap(MockLightmap {
        info: LightmapInfo { bounds: unit_bounds(), interior: false },
        capture: uniform_sh(0.5),
    });

    let mut instances: SlotMap<InstanceKey, Instance> = SlotMap::with_key();
    let lightmap = instances.insert(Instance {
        kind: InstanceKind::Lightmap,
        base: Some(base),
        transform: Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
        payload: Payload::Lightmap(LightmapPayload::default()),
        ..Default::default()
    });
    let mut geometry = GeometryPayload { capture_dirty: true, ..Default::default() };
    geometry.lightmap_captures.insert(lightmap);
    let mesh = instances.insert(Instance {
        kind: InstanceKind::Mesh,
        transformed_aabb: AABB::from_center_half_extents(Vec3::new(10.2, 0.0, 0.0), Vec3::splat(0.1)),
        handle: Some(BackendHandle(7)),
        payload: Payload::Geometry(geometry),
        ..Default::default()
    });

    let mut backend = MockBackend::new();
    update_lightmap_capture(&mut instances, mesh, &resources, &mut backend);

    let geometry = instances[mesh].payload.geometry().unwrap();
    assert!(!geometry.capture_dirty);
    assert_eq!(geometry.lightmap_sh, Some(uniform_sh(0.5)));
    assert_eq!(backend.lightmap_captures[&BackendHandle(7)], Some(uniform_sh(0.5)));
}

#[test]
fn test_update_without_lightmaps_clears_capture() {
    let resources = MockResources::new();
    let mut instances: SlotMap<InstanceKey, Instance> = SlotMap::with_key();
    let mesh = instances.insert(Instance {
        kind: InstanceKind::Mesh,
        handle: Some(BackendHandle(3)),
        payload: Payload::Geometry(GeometryPayload {
            lightmap_sh: Some(uniform_sh(1.0)),
            capture_dirty: true,
            ..Default::default()
        }),
        ..Default::default()
    });

    let mut backend = MockBackend::new();
    update_lightmap_capture(&mut instances, mesh, &resources, &mut backend);

    assert_eq!(instances[mesh].payload.geometry().unwrap().lightmap_sh, None);
    assert_eq!(backend.lightmap_captures[&BackendHandle(3)], None);
}
