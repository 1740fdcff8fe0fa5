/// Instance records owned by the SceneManager.
///
/// An Instance is one placed object: a mesh, a light, a probe, a decal...
/// The kind-specific state lives in `Payload`, a sum type so pairing and
/// culling can match exhaustively on it. Relationship sets inside the
/// payloads hold `InstanceKey`s (weak, generation-checked); only the
/// pairing code adds or removes them, always on both sides.

use bitflags::bitflags;
use glam::Mat4;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::new_key_type;
use crate::backend::{
    BackendHandle, InstanceParameterDecl, LightType, ParamValue, ReflectionProbeUpdateMode,
    ResourceId, ShCoefficients,
};
use super::scene_index::LeafId;
use super::scenario::ScenarioKey;
use super::AABB;

/// Smallest |det| / (|x| |y| |z|) of an indexable transform (1 for an
/// orthogonal basis, 0 for coplanar axes).
const MIN_AXIS_INDEPENDENCE: f32 = 1e-6;

// ===== SLOT MAP KEY =====

new_key_type! {
    /// Stable key for an Instance inside a SceneManager.
    ///
    /// A freed key never aliases a later instance (generation check).
    pub struct InstanceKey;
}

// ===== KIND =====

/// What an instance is. Declaration order is the pairing tag order:
/// geometry kinds come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum InstanceKind {
    /// No base assigned yet
    #[default]
    None,
    Mesh,
    MultiMesh,
    Particles,
    ParticlesCollision,
    Light,
    ReflectionProbe,
    Decal,
    GiProbe,
    Lightmap,
}

impl InstanceKind {
    /// Drawable kinds, stored in the geometry index.
    pub fn is_geometry(self) -> bool {
        matches!(self, InstanceKind::Mesh | InstanceKind::MultiMesh | InstanceKind::Particles)
    }

    /// Volume kinds, stored in the volume index.
    pub fn is_volume(self) -> bool {
        matches!(
            self,
            InstanceKind::ParticlesCollision
                | InstanceKind::Light
                | InstanceKind::ReflectionProbe
                | InstanceKind::Decal
                | InstanceKind::GiProbe
                | InstanceKind::Lightmap
        )
    }
}

/// Shadow casting mode of a geometry instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowCastingSetting {
    Off,
    #[default]
    On,
    DoubleSided,
    /// Casts shadows but is never drawn in the main pass
    ShadowsOnly,
}

bitflags! {
    /// User-facing geometry options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GeometryFlags: u32 {
        /// Receives baked lighting from lightmaps
        const USE_BAKED_LIGHT           = 1 << 0;
        /// Captures lightmap SH and contributes to GI probes dynamically
        const USE_DYNAMIC_GI            = 1 << 1;
        const IGNORE_OCCLUSION_CULLING  = 1 << 2;
    }
}

// ===== PAYLOADS =====

/// Geometry side of every relationship.
#[derive(Debug, Clone, Default)]
pub struct GeometryPayload {
    pub lights: FxHashSet<InstanceKey>,
    pub reflection_probes: FxHashSet<InstanceKey>,
    pub decals: FxHashSet<InstanceKey>,
    pub gi_probes: FxHashSet<InstanceKey>,
    pub lightmap_captures: FxHashSet<InstanceKey>,
    /// Last blended lightmap capture (dynamic GI only)
    pub lightmap_sh: Option<ShCoefficients>,
    /// Effective material per surface after overrides
    pub materials: Vec<ResourceId>,
    pub can_cast_shadows: bool,
    pub material_is_animated: bool,
    /// Lightmap pairing changed: capture must be recomputed
    pub capture_dirty: bool,
}

#[derive(Debug, Clone)]
pub struct LightPayload {
    pub light_type: LightType,
    pub shadow_enabled: bool,
    pub geometries: FxHashSet<InstanceKey>,
    pub gi_probes: FxHashSet<InstanceKey>,
    /// Bumped whenever the shadow contents may have changed
    pub shadow_version: u64,
    /// A redraw was requested but deferred by the per-frame budget
    pub shadow_pending: bool,
}

impl LightPayload {
    pub fn new(light_type: LightType, shadow_enabled: bool) -> Self {
        Self {
            light_type,
            shadow_enabled,
            geometries: FxHashSet::default(),
            gi_probes: FxHashSet::default(),
            shadow_version: 1,
            shadow_pending: false,
        }
    }

    pub fn mark_shadow_dirty(&mut self) {
        self.shadow_version += 1;
    }
}

#[derive(Debug, Clone)]
pub struct ReflectionProbePayload {
    pub update_mode: ReflectionProbeUpdateMode,
    pub geometries: FxHashSet<InstanceKey>,
}

#[derive(Debug, Clone, Default)]
pub struct DecalPayload {
    pub geometries: FxHashSet<InstanceKey>,
}

#[derive(Debug, Clone, Default)]
pub struct GiProbePayload {
    /// Lit by the probe, baked contribution
    pub geometries: FxHashSet<InstanceKey>,
    /// Lit by the probe and re-voxelized every update
    pub dynamic_geometries: FxHashSet<InstanceKey>,
    pub lights: FxHashSet<InstanceKey>,
}

#[derive(Debug, Clone, Default)]
pub struct LightmapPayload {
    pub geometries: FxHashSet<InstanceKey>,
}

/// Kind-specific state.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    None,
    Geometry(GeometryPayload),
    Light(LightPayload),
    ReflectionProbe(ReflectionProbePayload),
    Decal(DecalPayload),
    GiProbe(GiProbePayload),
    Lightmap(LightmapPayload),
    ParticlesCollision,
}

impl Payload {
    /// Empty payload matching an instance kind.
    pub fn for_kind(kind: InstanceKind) -> Self {
        match kind {
            InstanceKind::None => Payload::None,
            InstanceKind::Mesh | InstanceKind::MultiMesh | InstanceKind::Particles => {
                Payload::Geometry(GeometryPayload::default())
            }
            InstanceKind::ParticlesCollision => Payload::ParticlesCollision,
            // Real type and shadow state arrive with the dependency update
            InstanceKind::Light => Payload::Light(LightPayload::new(LightType::Omni, false)),
            InstanceKind::ReflectionProbe => Payload::ReflectionProbe(ReflectionProbePayload {
                update_mode: ReflectionProbeUpdateMode::Once,
                geometries: FxHashSet::default(),
            }),
            InstanceKind::Decal => Payload::Decal(DecalPayload::default()),
            InstanceKind::GiProbe => Payload::GiProbe(GiProbePayload::default()),
            InstanceKind::Lightmap => Payload::Lightmap(LightmapPayload::default()),
        }
    }

    pub fn geometry(&self) -> Option<&GeometryPayload> {
        match self {
            Payload::Geometry(geometry) => Some(geometry),
            _ => None,
        }
    }

    pub fn geometry_mut(&mut self) -> Option<&mut GeometryPayload> {
        match self {
            Payload::Geometry(geometry) => Some(geometry),
            _ => None,
        }
    }

    pub fn light(&self) -> Option<&LightPayload> {
        match self {
            Payload::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut LightPayload> {
        match self {
            Payload::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Every instance this one is currently paired with.
    pub fn paired(&self) -> FxHashSet<InstanceKey> {
        let mut all = FxHashSet::default();
        match self {
            Payload::Geometry(g) => {
                all.extend(&g.lights);
                all.extend(&g.reflection_probes);
                all.extend(&g.decals);
                all.extend(&g.gi_probes);
                all.extend(&g.lightmap_captures);
            }
            Payload::Light(l) => {
                all.extend(&l.geometries);
                all.extend(&l.gi_probes);
            }
            Payload::ReflectionProbe(p) => all.extend(&p.geometries),
            Payload::Decal(d) => all.extend(&d.geometries),
            Payload::GiProbe(p) => {
                all.extend(&p.geometries);
                all.extend(&p.dynamic_geometries);
                all.extend(&p.lights);
            }
            Payload::Lightmap(l) => all.extend(&l.geometries),
            Payload::None | Payload::ParticlesCollision => {}
        }
        all
    }
}

// ===== INSTANCE PARAMETERS =====

/// A per-instance shader parameter after resolution against materials.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceParameter {
    /// Buffer slot, `None` until a material declares the name
    pub index: Option<u32>,
    pub value: Option<ParamValue>,
    pub default_value: Option<ParamValue>,
}

// ===== INSTANCE =====

/// Where an instance lives in its scenario's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSlot {
    pub leaf: LeafId,
    /// Position in `Scenario::instance_data`
    pub array_index: usize,
}

/// One placed object.
#[derive(Debug, Clone)]
pub struct Instance {
    pub(crate) kind: InstanceKind,
    pub(crate) base: Option<ResourceId>,
    pub(crate) scenario: Option<ScenarioKey>,
    pub(crate) transform: Mat4,
    /// Local-space AABB (base + custom override + margin)
    pub(crate) aabb: AABB,
    pub(crate) transformed_aabb: AABB,
    pub(crate) prev_transformed_aabb: AABB,
    pub(crate) custom_aabb: Option<AABB>,
    pub(crate) extra_margin: f32,
    pub(crate) visible: bool,
    pub(crate) layer_mask: u32,
    pub(crate) object_id: u64,
    pub(crate) material_override: Option<ResourceId>,
    pub(crate) surface_overrides: Vec<Option<ResourceId>>,
    pub(crate) skeleton: Option<ResourceId>,
    pub(crate) cast_shadows: ShadowCastingSetting,
    pub(crate) geometry_flags: GeometryFlags,
    pub(crate) shader_parameters: FxHashMap<String, InstanceParameter>,
    /// Parameter names in declaration order
    pub(crate) declared_parameters: Vec<String>,
    pub(crate) version: u64,
    /// Deferred work flags consumed by the dirty flush
    pub(crate) update_aabb: bool,
    pub(crate) update_dependencies: bool,
    pub(crate) handle: Option<BackendHandle>,
    pub(crate) index_slot: Option<IndexSlot>,
    pub(crate) pair_pass: u64,
    pub(crate) payload: Payload,
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            kind: InstanceKind::None,
            base: None,
            scenario: None,
            transform: Mat4::IDENTITY,
            aabb: AABB::default_cube(),
            transformed_aabb: AABB::default_cube(),
            prev_transformed_aabb: AABB::default_cube(),
            custom_aabb: None,
            extra_margin: 0.0,
            visible: true,
            layer_mask: 1,
            object_id: 0,
            material_override: None,
            surface_overrides: Vec::new(),
            skeleton: None,
            cast_shadows: ShadowCastingSetting::On,
            geometry_flags: GeometryFlags::empty(),
            shader_parameters: FxHashMap::default(),
            declared_parameters: Vec::new(),
            version: 0,
            update_aabb: false,
            update_dependencies: false,
            handle: None,
            index_slot: None,
            pair_pass: 0,
            payload: Payload::None,
        }
    }
}

impl Instance {
    pub fn kind(&self) -> InstanceKind {
        self.kind
    }

    pub fn base(&self) -> Option<ResourceId> {
        self.base
    }

    pub fn scenario(&self) -> Option<ScenarioKey> {
        self.scenario
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Local-space AABB used for culling.
    pub fn aabb(&self) -> &AABB {
        &self.aabb
    }

    /// World-space AABB as of the last dirty flush.
    pub fn transformed_aabb(&self) -> &AABB {
        &self.transformed_aabb
    }

    pub fn prev_transformed_aabb(&self) -> &AABB {
        &self.prev_transformed_aabb
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn layer_mask(&self) -> u32 {
        self.layer_mask
    }

    pub fn object_id(&self) -> u64 {
        self.object_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn handle(&self) -> Option<BackendHandle> {
        self.handle
    }

    /// Present in its scenario's spatial index.
    pub fn is_indexed(&self) -> bool {
        self.index_slot.is_some()
    }

    pub fn index_slot(&self) -> Option<IndexSlot> {
        self.index_slot
    }

    pub fn cast_shadows(&self) -> ShadowCastingSetting {
        self.cast_shadows
    }

    pub fn geometry_flags(&self) -> GeometryFlags {
        self.geometry_flags
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Has pending deferred work.
    pub fn is_dirty(&self) -> bool {
        self.update_aabb || self.update_dependencies
    }

    /// A transform the index can use: finite and invertible.
    ///
    /// The determinant is compared relative to the axis lengths, so small
    /// uniform scales stay valid while collapsed or coplanar axes do not.
    pub fn has_valid_transform(&self) -> bool {
        if !self.transform.is_finite() {
            return false;
        }
        let scale = self.transform.x_axis.truncate().length()
            * self.transform.y_axis.truncate().length()
            * self.transform.z_axis.truncate().length();
        if !(scale > 0.0) || !scale.is_finite() {
            return false;
        }
        let determinant = self.transform.determinant();
        determinant != 0.0 && (determinant / scale).abs() > MIN_AXIS_INDEPENDENCE
    }

    /// Resolve this instance's parameters against material declarations.
    ///
    /// The first declaration of a name wins. Returns the names whose later
    /// declarations disagreed on slot or type.
    pub(crate) fn resolve_parameters(&mut self, declarations: &[InstanceParameterDecl]) -> Vec<String> {
        let mut collisions = Vec::new();
        let mut declared: Vec<String> = Vec::new();
        let mut resolved: FxHashMap<String, (u32, ParamValue)> = FxHashMap::default();

        for decl in declarations {
            match resolved.get(&decl.name) {
                Some((index, default_value)) => {
                    let same_type = std::mem::discriminant(default_value)
                        == std::mem::discriminant(&decl.default_value);
                    if *index != decl.index || !same_type {
                        collisions.push(decl.name.clone());
                    }
                }
                None => {
                    resolved.insert(decl.name.clone(), (decl.index, decl.default_value));
                    declared.push(decl.name.clone());
                }
            }
        }

        // Keep user values, drop undeclared names that were never set
        self.shader_parameters.retain(|name, param| {
            param.value.is_some() || resolved.contains_key(name)
        });
        for param in self.shader_parameters.values_mut() {
            param.index = None;
            param.default_value = None;
        }
        for (name, (index, default_value)) in resolved {
            let entry = self.shader_parameters.entry(name).or_insert(InstanceParameter {
                index: None,
                value: None,
                default_value: None,
            });
            entry.index = Some(index);
            entry.default_value = Some(default_value);
        }
        self.declared_parameters = declared;
        collisions
    }

    /// (slot, value) pairs the backend needs; unset parameters send their default.
    pub(crate) fn parameter_buffer(&self) -> Vec<(u32, ParamValue)> {
        let mut buffer: Vec<(u32, ParamValue)> = self
            .shader_parameters
            .values()
            .filter_map(|param| {
                let index = param.index?;
                let value = param.value.or(param.default_value)?;
                Some((index, value))
            })
            .collect();
        buffer.sort_by_key(|(index, _)| *index);
        buffer
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
