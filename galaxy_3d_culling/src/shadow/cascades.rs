/// Directional light cascades.
///
/// Each cascade bounds one depth slice of the camera frustum with a
/// sphere, so its size does not depend on the camera orientation. The
/// sphere center is snapped to the shadow-map texel grid in light space:
/// camera motion moves the cascade by whole texels only.

use glam::{Mat4, Vec3};
use crate::backend::{DirectionalShadowMode, LightInfo};
use crate::camera::{Camera, Frustum, PLANE_NEAR};

/// Radius quantum, absorbs float noise in the corner distances
const RADIUS_QUANTUM: f32 = 16.0;

/// Keeps every tile wider than the two margin texels
const MIN_RESOLUTION: u32 = 16;

/// One cascade of a directional shadow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeShadow {
    /// Orthographic projection of the cascade's light camera
    pub projection: Mat4,
    /// World transform of the light camera (looks along its -Z)
    pub transform: Mat4,
    /// Caster volume: the projection box extended toward the light
    pub frustum: Frustum,
    /// View-depth range of the camera slice
    pub split_near: f32,
    pub split_far: f32,
    pub radius: f32,
    /// `radius / first cascade radius`
    pub bias_scale: f32,
    /// Texel width / texel height inside the cascade's atlas tile
    pub aspect_bias_scale: f32,
    /// World size of one shadow-map texel (horizontal)
    pub texel_size: f32,
    /// Depth of the orthographic box
    pub z_range: f32,
}

impl CascadeShadow {
    /// Light-space X/Y of the snapped cascade center.
    pub fn light_space_center(&self) -> (f32, f32) {
        let origin = self.transform.w_axis.truncate();
        (
            self.transform.x_axis.truncate().dot(origin),
            self.transform.y_axis.truncate().dot(origin),
        )
    }
}

/// Tile size (width, height) of one cascade inside a directional shadow map.
pub fn cascade_tile_size(mode: DirectionalShadowMode, resolution: u32) -> (u32, u32) {
    let resolution = resolution.max(MIN_RESOLUTION);
    match mode {
        DirectionalShadowMode::Orthogonal => (resolution, resolution),
        DirectionalShadowMode::Parallel2Splits => (resolution / 2, resolution),
        DirectionalShadowMode::Parallel4Splits => (resolution / 2, resolution / 2),
    }
}

/// View-depth ranges `(near, far)` of every cascade.
///
/// Cascades after the first start earlier by `cascade_blend` of the
/// previous slice so adjacent cascades overlap.
pub fn split_ranges(info: &LightInfo, camera_near: f32, camera_far: f32) -> Vec<(f32, f32)> {
    let max_distance = if info.shadow_max_distance > 0.0 {
        info.shadow_max_distance.min(camera_far)
    } else {
        camera_far
    };
    if max_distance.is_nan() || max_distance <= camera_near {
        return Vec::new();
    }

    let count = info.directional_shadow_mode.cascade_count();
    let mut bounds = Vec::with_capacity(count + 1);
    bounds.push(camera_near);
    for i in 0..count {
        let fraction = if i + 1 == count { 1.0 } else { info.cascade_splits[i].clamp(0.0, 1.0) };
        let distance = camera_near + (max_distance - camera_near) * fraction;
        // Splits must be increasing
        let previous = bounds[i];
        bounds.push(distance.max(previous));
    }

    let blend = info.cascade_blend.clamp(0.0, 1.0);
    (0..count)
        .map(|i| {
            let mut near = bounds[i];
            if i > 0 && blend > 0.0 {
                near -= (bounds[i] - bounds[i - 1]) * blend;
            }
            (near, bounds[i + 1])
        })
        .collect()
}

/// Build the stabilized cascades of a directional light for a camera.
///
/// Returns an empty list for a degenerate light basis or an empty range.
pub fn compute_cascades(
    camera: &Camera,
    aspect: f32,
    light_transform: &Mat4,
    info: &LightInfo,
    resolution: u32,
) -> Vec<CascadeShadow> {
    let x = light_transform.x_axis.truncate().normalize_or_zero();
    let y = light_transform.y_axis.truncate().normalize_or_zero();
    let z = light_transform.z_axis.truncate().normalize_or_zero();
    if x == Vec3::ZERO || y == Vec3::ZERO || z == Vec3::ZERO {
        return Vec::new();
    }

    let projection = camera.projection();
    let ranges = split_ranges(info, projection.near(), projection.far());
    let (tile_width, tile_height) = cascade_tile_size(info.directional_shadow_mode, resolution);
    let pancake = info.pancake_size.max(0.0);
    let smallest_tile = tile_width.min(tile_height) as f32;
    let margin_scale = smallest_tile / (smallest_tile - 2.0);

    let mut cascades: Vec<CascadeShadow> = Vec::with_capacity(ranges.len());
    for (split_near, split_far) in ranges {
        let near_corners = camera.slice_corners(aspect, split_near);
        let far_corners = camera.slice_corners(aspect, split_far);
        let corners: Vec<Vec3> = near_corners.iter().chain(far_corners.iter()).copied().collect();

        let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
        let radius = corners
            .iter()
            .map(|corner| corner.distance(center))
            .fold(0.0f32, f32::max);
        // One texel of margin on each side covers the snapping shift
        let radius = (radius * RADIUS_QUANTUM).ceil() / RADIUS_QUANTUM * margin_scale;
        if !radius.is_finite() || radius <= 0.0 {
            continue;
        }

        // Snap to the texel grid
        let texel_x = 2.0 * radius / tile_width as f32;
        let texel_y = 2.0 * radius / tile_height as f32;
        let center_x = (x.dot(center) / texel_x).floor() * texel_x;
        let center_y = (y.dot(center) / texel_y).floor() * texel_y;
        let center_z = z.dot(center);

        // Near plane sits toward the light; pancaking pushes it further
        let near_z = center_z + radius + pancake;
        let origin = x * center_x + y * center_y + z * near_z;
        let transform = Mat4::from_cols(
            x.extend(0.0),
            y.extend(0.0),
            z.extend(0.0),
            origin.extend(1.0),
        );
        let z_range = 2.0 * radius + pancake;
        let ortho = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, z_range);
        let frustum = Frustum::from_view_projection(&(ortho * transform.inverse()))
            .with_disabled_plane(PLANE_NEAR);

        let first_radius = cascades.first().map_or(radius, |first| first.radius);
        cascades.push(CascadeShadow {
            projection: ortho,
            transform,
            frustum,
            split_near,
            split_far,
            radius,
            bias_scale: radius / first_radius,
            aspect_bias_scale: tile_height as f32 / tile_width as f32,
            texel_size: texel_x,
            z_range,
        });
    }
    cascades
}

#[cfg(test)]
#[path = "cascades_tests.rs"]
mod tests;
