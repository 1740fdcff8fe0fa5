/// Read-only view of the resource system (meshes, materials, lights, probes).
///
/// The culling core never owns resources. It only asks questions about
/// them while flushing dirty instances. Every query returns `Option`:
/// `None` means the resource is gone (deleted mid-frame) and is treated
/// as "no contribution" by the caller.

use glam::Vec3;
use crate::scene::{InstanceKind, AABB};
use super::ResourceId;

// ===== PARAMETER VALUES =====

/// A typed per-instance shader parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    UInt(u32),
    Bool(bool),
}

/// An instance parameter declared by a material's shader.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceParameterDecl {
    pub name: String,
    /// Slot in the per-instance parameter buffer
    pub index: u32,
    pub default_value: ParamValue,
}

// ===== LIGHTS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Omni,
    Spot,
}

/// Cascade layout of a directional light shadow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionalShadowMode {
    Orthogonal,
    Parallel2Splits,
    Parallel4Splits,
}

impl DirectionalShadowMode {
    pub fn cascade_count(self) -> usize {
        match self {
            DirectionalShadowMode::Orthogonal => 1,
            DirectionalShadowMode::Parallel2Splits => 2,
            DirectionalShadowMode::Parallel4Splits => 4,
        }
    }
}

/// Omni shadows are rendered as two paraboloids or a six-face cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmniShadowMode {
    DualParaboloid,
    Cube,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightInfo {
    pub light_type: LightType,
    /// Omni/spot reach (world units)
    pub range: f32,
    /// Spot half-angle
    pub spot_angle_degrees: f32,
    pub shadow_enabled: bool,
    pub omni_shadow_mode: OmniShadowMode,
    pub directional_shadow_mode: DirectionalShadowMode,
    /// Cascade split points as fractions of `shadow_max_distance`
    pub cascade_splits: [f32; 3],
    /// Fraction of each split overlapped with the next cascade
    pub cascade_blend: f32,
    pub shadow_max_distance: f32,
    /// Near plane pancaking distance (0 disables)
    pub pancake_size: f32,
    /// Lights that bake fully are skipped by GI probes
    pub baked: bool,
}

impl Default for LightInfo {
    fn default() -> Self {
        Self {
            light_type: LightType::Omni,
            range: 5.0,
            spot_angle_degrees: 45.0,
            shadow_enabled: false,
            omni_shadow_mode: OmniShadowMode::Cube,
            directional_shadow_mode: DirectionalShadowMode::Parallel4Splits,
            cascade_splits: [0.1, 0.2, 0.5],
            cascade_blend: 0.0,
            shadow_max_distance: 100.0,
            pancake_size: 20.0,
            baked: false,
        }
    }
}

impl LightInfo {
    /// Local-space bounds of the lit volume.
    ///
    /// Directional lights have no bounds; they affect everything.
    pub fn local_aabb(&self) -> Option<AABB> {
        match self.light_type {
            LightType::Directional => None,
            LightType::Omni => Some(AABB::from_center_half_extents(Vec3::ZERO, Vec3::splat(self.range))),
            LightType::Spot => {
                // Cone along local -Z
                let angle = self.spot_angle_degrees.clamp(0.0, 89.9).to_radians();
                let radius = angle.tan() * self.range;
                Some(AABB::new(
                    Vec3::new(-radius, -radius, -self.range),
                    Vec3::new(radius, radius, 0.0),
                ))
            }
        }
    }
}

// ===== PROBES =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionProbeUpdateMode {
    /// Rendered once, spread over several frames
    Once,
    /// Rendered completely every frame
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionProbeInfo {
    pub update_mode: ReflectionProbeUpdateMode,
    /// Half size of the captured box
    pub extents: Vec3,
    /// Capture point relative to the probe origin
    pub origin_offset: Vec3,
    pub cull_mask: u32,
    pub interior: bool,
}

impl Default for ReflectionProbeInfo {
    fn default() -> Self {
        Self {
            update_mode: ReflectionProbeUpdateMode::Once,
            extents: Vec3::splat(10.0),
            origin_offset: Vec3::ZERO,
            cull_mask: u32::MAX,
            interior: false,
        }
    }
}

/// Baked lightmap volume with a spherical-harmonics capture field.
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapInfo {
    /// Local bounds of the capture field
    pub bounds: AABB,
    /// Interior volumes override exterior ones
    pub interior: bool,
}

/// Nine L2 spherical-harmonics RGB coefficients.
pub type ShCoefficients = [Vec3; 9];

// ===== STORAGE TRAIT =====

/// Queries the culling core makes about base resources.
pub trait ResourceStorage: Send + Sync {
    /// Local AABB of a base resource for the given instance kind.
    ///
    /// Not used for lights, whose bounds come from `light_info`.
    fn base_aabb(&self, kind: InstanceKind, base: ResourceId) -> Option<AABB>;

    /// Materials of each mesh surface, in surface order.
    fn mesh_surface_materials(&self, mesh: ResourceId) -> Option<Vec<ResourceId>>;

    fn material_casts_shadows(&self, material: ResourceId) -> Option<bool>;

    /// Whether the material changes every frame (shadows must follow).
    fn material_is_animated(&self, material: ResourceId) -> Option<bool>;

    fn material_instance_parameters(&self, material: ResourceId) -> Option<Vec<InstanceParameterDecl>>;

    fn light_info(&self, light: ResourceId) -> Option<LightInfo>;

    fn reflection_probe_info(&self, probe: ResourceId) -> Option<ReflectionProbeInfo>;

    fn lightmap_info(&self, lightmap: ResourceId) -> Option<LightmapInfo>;

    /// SH capture at a point in the lightmap's local space.
    fn lightmap_sample_capture(&self, lightmap: ResourceId, local_point: Vec3) -> Option<ShCoefficients>;

    fn particles_collision_enabled(&self, particles: ResourceId) -> Option<bool>;
}
