//! Camera module: viewpoints and frustum planes.
//!
//! Cameras are stored by the SceneManager and addressed by `CameraKey`;
//! the culling pass only needs the derived `Frustum`.

mod camera;
mod frustum;

pub use camera::{Camera, CameraProjection, FovAxis};
pub use frustum::{
    Frustum, FrustumTest, DISABLED_PLANE,
    planes_intersect_aabb, classify_planes,
    PLANE_LEFT, PLANE_RIGHT, PLANE_BOTTOM, PLANE_TOP, PLANE_NEAR, PLANE_FAR,
};
