/// Frustum: six clipping planes for visibility culling.
///
/// Each plane is represented as a Vec4 (A, B, C, D) where:
/// - (A, B, C) is the inward-pointing normal
/// - D is the signed distance
/// - A point P is inside the frustum if dot(plane, P_homogeneous) >= 0 for all planes
///
/// Shadow cascades replace their near plane by `DISABLED_PLANE` so that
/// casters between the light and the cascade box are still collected.

use glam::{Mat4, Vec3, Vec4};
use crate::scene::AABB;

/// Result of a 3-way frustum/AABB classification.
///
/// Used by the BVH convex query to skip plane tests below a node that
/// is already fully inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumTest {
    /// AABB is entirely outside the frustum
    Outside,
    /// AABB is entirely inside the frustum
    Inside,
    /// AABB partially overlaps the frustum
    Partial,
}

/// Frustum plane indices
pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_BOTTOM: usize = 2;
pub const PLANE_TOP: usize = 3;
pub const PLANE_NEAR: usize = 4;
pub const PLANE_FAR: usize = 5;

/// A plane every point is in front of.
pub const DISABLED_PLANE: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Six frustum planes for culling.
///
/// Normal (A, B, C) points inward (toward the visible volume).
/// Works with both perspective and orthographic projections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Frustum planes: left, right, bottom, top, near, far
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    ///
    /// Uses the Gribb & Hartmann method. glam projections map depth to
    /// [0, 1], so the near plane is row2 alone.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        let mut planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near
            r3 - r2, // far
        ];

        for plane in &mut planes {
            let normal_len = plane.truncate().length();
            if normal_len > 0.0 {
                *plane /= normal_len;
            }
        }

        Self { planes }
    }

    /// Build from explicit planes (inward normals, normalized by caller).
    pub fn from_planes(planes: [Vec4; 6]) -> Self {
        Self { planes }
    }

    /// Frustum whose planes are the six faces of a box.
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            planes: [
                Vec4::new(1.0, 0.0, 0.0, -aabb.min.x),
                Vec4::new(-1.0, 0.0, 0.0, aabb.max.x),
                Vec4::new(0.0, 1.0, 0.0, -aabb.min.y),
                Vec4::new(0.0, -1.0, 0.0, aabb.max.y),
                Vec4::new(0.0, 0.0, 1.0, -aabb.min.z),
                Vec4::new(0.0, 0.0, -1.0, aabb.max.z),
            ],
        }
    }

    /// Same frustum with one plane replaced by `DISABLED_PLANE`.
    pub fn with_disabled_plane(mut self, index: usize) -> Self {
        self.planes[index] = DISABLED_PLANE;
        self
    }

    /// Signed distance of a point to a plane (positive = inside).
    pub fn plane_distance(plane: &Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| Self::plane_distance(p, point) >= 0.0)
    }

    /// Test if an AABB intersects this frustum.
    ///
    /// Uses the "positive vertex" test: for each plane, find the AABB corner
    /// most in the direction of the plane normal. If that corner is outside,
    /// the AABB is fully outside.
    ///
    /// May return false positives (conservative), never false negatives.
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        planes_intersect_aabb(&self.planes, aabb)
    }

    /// Classify an AABB against the frustum (3-way test).
    pub fn classify_aabb(&self, aabb: &AABB) -> FrustumTest {
        classify_planes(&self.planes, aabb)
    }
}

/// Positive-vertex test of an AABB against any inward plane set.
pub fn planes_intersect_aabb(planes: &[Vec4], aabb: &AABB) -> bool {
    for plane in planes {
        let normal = plane.truncate();

        let p_vertex = Vec3::new(
            if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
            if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
            if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
        );

        if normal.dot(p_vertex) + plane.w < 0.0 {
            return false;
        }
    }

    true
}

/// 3-way classification of an AABB against any inward plane set.
///
/// - If the p-vertex is outside any plane → `Outside` (early out)
/// - If the n-vertex is outside any plane → at least `Partial`
/// - If all n-vertices are inside all planes → `Inside`
pub fn classify_planes(planes: &[Vec4], aabb: &AABB) -> FrustumTest {
    let mut all_inside = true;

    for plane in planes {
        let normal = plane.truncate();

        let p_vertex = Vec3::new(
            if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
            if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
            if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
        );

        if normal.dot(p_vertex) + plane.w < 0.0 {
            return FrustumTest::Outside;
        }

        let n_vertex = Vec3::new(
            if normal.x >= 0.0 { aabb.min.x } else { aabb.max.x },
            if normal.y >= 0.0 { aabb.min.y } else { aabb.max.y },
            if normal.z >= 0.0 { aabb.min.z } else { aabb.max.z },
        );

        if normal.dot(n_vertex) + plane.w < 0.0 {
            all_inside = false;
        }
    }

    if all_inside { FrustumTest::Inside } else { FrustumTest::Partial }
}

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;
