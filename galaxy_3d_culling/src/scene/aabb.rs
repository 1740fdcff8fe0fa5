/// Axis-aligned bounding box, the coarse volume used by every spatial query.

use glam::{Mat4, Vec3};

/// Edge length of the cube substituted for degenerate boxes.
pub const DEFAULT_AABB_SIZE: f32 = 0.4;

/// Axis-Aligned Bounding Box
///
/// Stored either in local space (instance base resource) or in world
/// space (transformed, indexed). `min <= max` on every axis for valid boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl AABB {
    /// Create a box from its two corners (components are reordered if needed).
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    /// Box centered on `center` with half-size `half_extents`.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half = half_extents.abs();
        Self { min: center - half, max: center + half }
    }

    /// Smallest box enclosing every point (None for an empty slice).
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let mut aabb = AABB { min: first, max: first };
        for p in &points[1..] {
            aabb.expand_to(*p);
        }
        Some(aabb)
    }

    /// The 0.4-unit cube around the origin used for degenerate boxes.
    pub fn default_cube() -> Self {
        Self::from_center_half_extents(Vec3::ZERO, Vec3::splat(DEFAULT_AABB_SIZE * 0.5))
    }

    /// Transform this AABB by a matrix, returning a new AABB.
    ///
    /// Uses the Arvo method: projects each matrix axis onto the AABB extents
    /// for an exact (tight) result without transforming all 8 corners.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        AABB { min: new_min, max: new_max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area, the cost metric of the BVH insertion heuristic.
    pub fn surface_area(&self) -> f32 {
        let d = self.size();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// All components finite and `min <= max`.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// Non-finite, inverted, or of zero volume on every axis.
    pub fn is_degenerate(&self) -> bool {
        !self.is_finite() || self.size() == Vec3::ZERO
    }

    /// Test if this AABB fully contains another AABB.
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x && self.max.x >= other.max.x
        && self.min.y <= other.min.y && self.max.y >= other.max.y
        && self.min.z <= other.min.z && self.max.z >= other.max.z
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Test if this AABB intersects (overlaps) another AABB.
    ///
    /// Returns `true` if the two AABBs overlap or touch.
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
        && self.min.y <= other.max.y && self.max.y >= other.min.y
        && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Slab test against the segment `from -> to`.
    pub fn intersects_segment(&self, from: Vec3, to: Vec3) -> bool {
        let dir = to - from;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for axis in 0..3 {
            let origin = from[axis];
            let d = dir[axis];
            if d.abs() < f32::EPSILON {
                if origin < self.min[axis] || origin > self.max[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - origin) * inv;
            let mut t1 = (self.max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }

    /// Smallest box enclosing both boxes.
    pub fn merge(&self, other: &AABB) -> AABB {
        AABB { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    pub fn expand_to(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Box grown by `margin` on every side.
    pub fn grown(&self, margin: f32) -> AABB {
        AABB { min: self.min - Vec3::splat(margin), max: self.max + Vec3::splat(margin) }
    }

    /// The 8 corners, bit0 = X, bit1 = Y, bit2 = Z (0 = min, 1 = max).
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| Vec3::new(
            if i & 1 == 0 { self.min.x } else { self.max.x },
            if i & 2 == 0 { self.min.y } else { self.max.y },
            if i & 4 == 0 { self.min.z } else { self.max.z },
        ))
    }

    /// Snap outward to multiples of `step` (no-op for step <= 0).
    pub fn quantized(&self, step: f32) -> AABB {
        if step <= 0.0 {
            return *self;
        }
        AABB {
            min: (self.min / step).floor() * step,
            max: (self.max / step).ceil() * step,
        }
    }
}

#[cfg(test)]
#[path = "aabb_tests.rs"]
mod tests;
