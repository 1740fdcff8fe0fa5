use glam::{Mat4, Vec3, Vec4};
use crate::scene::AABB;
use super::*;

fn perspective_frustum(fov: f32, near: f32, far: f32) -> Frustum {
    let projection = Mat4::perspective_rh(fov, 1.0, near, far);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    Frustum::from_view_projection(&(projection * view))
}

fn unit_box_at(center: Vec3) -> AABB {
    AABB::from_center_half_extents(center, Vec3::ONE)
}

// ============================================================================
// Frustum::from_view_projection
// ============================================================================

#[test]
fn test_frustum_planes_are_normalized() {
    let frustum = perspective_frustum(std::f32::consts::FRAC_PI_4, 0.1, 100.0);
    for plane in &frustum.planes {
        let normal_len = plane.truncate().length();
        assert!((normal_len - 1.0).abs() < 1e-4, "plane normal should be unit length");
    }
}

#[test]
fn test_near_plane_sits_at_near_distance() {
    let frustum = perspective_frustum(std::f32::consts::FRAC_PI_2, 1.0, 100.0);
    // Camera at z=5 looking at -Z: near plane at z=4
    assert!(frustum.contains_point(Vec3::new(0.0, 0.0, 3.9)));
    assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 4.1)));
}

// ============================================================================
// Frustum::intersects_aabb
// ============================================================================

#[test]
fn test_aabb_inside_frustum() {
    let frustum = perspective_frustum(std::f32::consts::FRAC_PI_2, 0.1, 100.0);
    assert!(frustum.intersects_aabb(&unit_box_at(Vec3::ZERO)));
}

#[test]
fn test_aabb_outside_frustum() {
    let frustum = perspective_frustum(std::f32::consts::FRAC_PI_4, 0.1, 100.0);
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::splat(100.0))));
}

#[test]
fn test_aabb_behind_camera() {
    let frustum = perspective_frustum(std::f32::consts::FRAC_PI_2, 0.1, 100.0);
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 0.0, 11.0))));
}

#[test]
fn test_aabb_beyond_far_plane() {
    let frustum = perspective_frustum(std::f32::consts::FRAC_PI_2, 0.1, 10.0);
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 0.0, -19.0))));
}

#[test]
fn test_aabb_intersecting_frustum_boundary() {
    let projection = Mat4::orthographic_rh(-5.0, 5.0, -5.0, 5.0, 0.1, 100.0);
    let frustum = Frustum::from_view_projection(&projection);

    // Straddles the right boundary at x=5
    let aabb = AABB { min: Vec3::new(4.0, 0.0, -10.0), max: Vec3::new(6.0, 1.0, -5.0) };
    assert!(frustum.intersects_aabb(&aabb));
    assert_eq!(frustum.classify_aabb(&aabb), FrustumTest::Partial);
}

// ============================================================================
// classify / from_aabb / disabled planes
// ============================================================================

#[test]
fn test_classify_inside_and_outside() {
    let frustum = Frustum::from_aabb(&AABB::new(Vec3::splat(-10.0), Vec3::splat(10.0)));
    assert_eq!(frustum.classify_aabb(&unit_box_at(Vec3::ZERO)), FrustumTest::Inside);
    assert_eq!(frustum.classify_aabb(&unit_box_at(Vec3::splat(20.0))), FrustumTest::Outside);
    assert_eq!(frustum.classify_aabb(&unit_box_at(Vec3::new(10.0, 0.0, 0.0))), FrustumTest::Partial);
}

#[test]
fn test_from_aabb_matches_box_overlap() {
    let region = AABB::new(Vec3::new(-2.0, 0.0, -2.0), Vec3::new(2.0, 4.0, 2.0));
    let frustum = Frustum::from_aabb(&region);
    for center in [Vec3::ZERO, Vec3::new(3.5, 1.0, 0.0), Vec3::new(0.0, 6.0, 0.0)] {
        let aabb = unit_box_at(center);
        assert_eq!(frustum.intersects_aabb(&aabb), region.intersects(&aabb));
    }
}

#[test]
fn test_disabled_plane_accepts_everything_on_that_side() {
    let frustum = Frustum::from_aabb(&AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0)))
        .with_disabled_plane(PLANE_NEAR);
    // Far below min.z but otherwise inside
    assert!(frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 0.0, -500.0))));
    // Still clipped by the far plane
    assert!(!frustum.intersects_aabb(&unit_box_at(Vec3::new(0.0, 0.0, 500.0))));
}

#[test]
fn test_plane_distance_sign() {
    let plane = Vec4::new(0.0, 1.0, 0.0, -2.0); // y >= 2
    assert!(Frustum::plane_distance(&plane, Vec3::new(0.0, 3.0, 0.0)) > 0.0);
    assert!(Frustum::plane_distance(&plane, Vec3::new(0.0, 1.0, 0.0)) < 0.0);
}

// ============================================================================
// Plane constants
// ============================================================================

#[test]
fn test_plane_constants() {
    assert_eq!(PLANE_LEFT, 0);
    assert_eq!(PLANE_RIGHT, 1);
    assert_eq!(PLANE_BOTTOM, 2);
    assert_eq!(PLANE_TOP, 3);
    assert_eq!(PLANE_NEAR, 4);
    assert_eq!(PLANE_FAR, 5);
}
