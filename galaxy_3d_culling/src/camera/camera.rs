/// Camera: viewpoint configuration owned by the SceneManager.
///
/// Stores the projection parameters set through the scene-manager API and
/// derives view/projection matrices, the culling frustum, and the world
/// space corners of depth slices (used by directional shadow cascades).

use glam::{Mat4, Vec2, Vec3};
use crate::backend::ResourceId;
use super::frustum::Frustum;

/// Which screen axis the field of view / size refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FovAxis {
    /// Field of view / size measured along the viewport height
    #[default]
    Vertical,
    /// Field of view / size measured along the viewport width
    Horizontal,
}

/// Projection kind and its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraProjection {
    /// Symmetric perspective
    Perspective { fov_degrees: f32, near: f32, far: f32 },
    /// Orthographic, `size` = full extent along the FOV axis
    Orthogonal { size: f32, near: f32, far: f32 },
    /// Off-center perspective: `size` of the near plane, shifted by `offset`
    Frustum { size: f32, offset: Vec2, near: f32, far: f32 },
}

impl CameraProjection {
    pub fn near(&self) -> f32 {
        match *self {
            CameraProjection::Perspective { near, .. }
            | CameraProjection::Orthogonal { near, .. }
            | CameraProjection::Frustum { near, .. } => near,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            CameraProjection::Perspective { far, .. }
            | CameraProjection::Orthogonal { far, .. }
            | CameraProjection::Frustum { far, .. } => far,
        }
    }

    pub fn is_orthogonal(&self) -> bool {
        matches!(self, CameraProjection::Orthogonal { .. })
    }
}

impl Default for CameraProjection {
    fn default() -> Self {
        CameraProjection::Perspective { fov_degrees: 75.0, near: 0.05, far: 4000.0 }
    }
}

/// A viewpoint: world transform, projection, culling mask and
/// the environment it renders with.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    transform: Mat4,
    projection: CameraProjection,
    fov_axis: FovAxis,
    cull_mask: u32,
    environment: Option<ResourceId>,
    attributes: Option<ResourceId>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            projection: CameraProjection::default(),
            fov_axis: FovAxis::Vertical,
            cull_mask: u32::MAX,
            environment: None,
            attributes: None,
        }
    }
}

impl Camera {
    pub fn new(transform: Mat4, projection: CameraProjection) -> Self {
        Self { transform, projection, ..Default::default() }
    }

    // ===== GETTERS =====

    /// Camera world transform (camera looks down its local -Z).
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn projection(&self) -> &CameraProjection {
        &self.projection
    }

    pub fn fov_axis(&self) -> FovAxis {
        self.fov_axis
    }

    /// Layers this camera renders (compared with instance layer masks).
    pub fn cull_mask(&self) -> u32 {
        self.cull_mask
    }

    pub fn environment(&self) -> Option<ResourceId> {
        self.environment
    }

    pub fn attributes(&self) -> Option<ResourceId> {
        self.attributes
    }

    pub fn position(&self) -> Vec3 {
        self.transform.col(3).truncate()
    }

    /// Unit view direction (world space).
    pub fn forward(&self) -> Vec3 {
        (-self.transform.col(2).truncate()).normalize_or_zero()
    }

    /// View matrix (inverse of the camera's world transform).
    pub fn view_matrix(&self) -> Mat4 {
        self.transform.inverse()
    }

    /// Projection matrix for a viewport aspect ratio (width / height).
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect > 0.0 { aspect } else { 1.0 };
        match self.projection {
            CameraProjection::Perspective { fov_degrees, near, far } => {
                Mat4::perspective_rh(self.vertical_fov(fov_degrees, aspect), aspect, near, far)
            }
            CameraProjection::Orthogonal { size, near, far } => {
                let half = self.half_extents(size, aspect);
                Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, near, far)
            }
            CameraProjection::Frustum { size, offset, near, far } => {
                let half = self.half_extents(size, aspect);
                off_center_perspective(
                    offset.x - half.x, offset.x + half.x,
                    offset.y - half.y, offset.y + half.y,
                    near, far,
                )
            }
        }
    }

    /// Combined view-projection matrix (projection * view).
    pub fn view_projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Culling frustum for a viewport aspect ratio.
    pub fn frustum(&self, aspect: f32) -> Frustum {
        Frustum::from_view_projection(&self.view_projection_matrix(aspect))
    }

    /// World-space corners of the view volume cross-section at view depth `depth`.
    ///
    /// Order: (-x,-y), (+x,-y), (+x,+y), (-x,+y) in view space.
    pub fn slice_corners(&self, aspect: f32, depth: f32) -> [Vec3; 4] {
        let aspect = if aspect > 0.0 { aspect } else { 1.0 };
        let (min, max) = match self.projection {
            CameraProjection::Perspective { fov_degrees, .. } => {
                let half_y = (self.vertical_fov(fov_degrees, aspect) * 0.5).tan() * depth;
                let half = Vec2::new(half_y * aspect, half_y);
                (-half, half)
            }
            CameraProjection::Orthogonal { size, .. } => {
                let half = self.half_extents(size, aspect);
                (-half, half)
            }
            CameraProjection::Frustum { size, offset, near, .. } => {
                let half = self.half_extents(size, aspect);
                let scale = if near > 0.0 { depth / near } else { 1.0 };
                ((offset - half) * scale, (offset + half) * scale)
            }
        };
        [
            Vec3::new(min.x, min.y, -depth),
            Vec3::new(max.x, min.y, -depth),
            Vec3::new(max.x, max.y, -depth),
            Vec3::new(min.x, max.y, -depth),
        ]
        .map(|p| self.transform.transform_point3(p))
    }

    fn vertical_fov(&self, fov_degrees: f32, aspect: f32) -> f32 {
        let fov = fov_degrees.to_radians();
        match self.fov_axis {
            FovAxis::Vertical => fov,
            FovAxis::Horizontal => 2.0 * ((fov * 0.5).tan() / aspect).atan(),
        }
    }

    fn half_extents(&self, size: f32, aspect: f32) -> Vec2 {
        match self.fov_axis {
            FovAxis::Vertical => Vec2::new(size * 0.5 * aspect, size * 0.5),
            FovAxis::Horizontal => Vec2::new(size * 0.5, size * 0.5 / aspect),
        }
    }

    // ===== SETTERS: store, derive lazily =====

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn set_perspective(&mut self, fov_degrees: f32, near: f32, far: f32) {
        self.projection = CameraProjection::Perspective { fov_degrees, near, far };
    }

    pub fn set_orthogonal(&mut self, size: f32, near: f32, far: f32) {
        self.projection = CameraProjection::Orthogonal { size, near, far };
    }

    pub fn set_frustum(&mut self, size: f32, offset: Vec2, near: f32, far: f32) {
        self.projection = CameraProjection::Frustum { size, offset, near, far };
    }

    pub fn set_fov_axis(&mut self, axis: FovAxis) {
        self.fov_axis = axis;
    }

    pub fn set_cull_mask(&mut self, mask: u32) {
        self.cull_mask = mask;
    }

    pub fn set_environment(&mut self, environment: Option<ResourceId>) {
        self.environment = environment;
    }

    pub fn set_attributes(&mut self, attributes: Option<ResourceId>) {
        self.attributes = attributes;
    }
}

/// Right-handed off-center perspective with depth mapped to [0, 1].
fn off_center_perspective(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let w = right - left;
    let h = top - bottom;
    let depth = near - far;
    Mat4::from_cols_array(&[
        2.0 * near / w, 0.0, 0.0, 0.0,
        0.0, 2.0 * near / h, 0.0, 0.0,
        (right + left) / w, (top + bottom) / h, far / depth, -1.0,
        0.0, 0.0, near * far / depth, 0.0,
    ])
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
