//! Scene module
//!
//! Spatial indexing, the instance registry and its dirty-update protocol,
//! the pairing engine, and the cull pass.

mod aabb;
mod scene_index;
mod dynamic_bvh;
mod instance;
mod scenario;
mod pairing;
mod lightmap_capture;
mod cull_result;
mod culler;
mod scene_manager;
mod updater;
mod render_frame;

pub use aabb::{AABB, DEFAULT_AABB_SIZE};
pub use scene_index::{SceneIndex, LeafId, Visitor};
pub use dynamic_bvh::DynamicBvh;
pub use instance::{
    Instance, InstanceKey, InstanceKind, InstanceParameter, IndexSlot,
    ShadowCastingSetting, GeometryFlags, Payload,
    GeometryPayload, LightPayload, ReflectionProbePayload, DecalPayload,
    GiProbePayload, LightmapPayload,
};
pub use scenario::{Scenario, ScenarioKey, DebugDrawMode, InstanceFlags, InstanceData, PairingStats};
pub use pairing::{PairOutcome, pair_allowed, pair_instance, unpair_all, refresh_pairing_arrays};
pub use lightmap_capture::{CaptureSample, falloff_weight, blend_captures, update_lightmap_capture};
pub use cull_result::CullResult;
pub use culler::{
    Culler, SerialCuller, ParallelCuller, CullRequest, CullSchedule, CullContext,
    CullSink, PassTargets, cull_range, slice_ranges,
};
pub use scene_manager::{SceneManager, CameraKey};
pub use updater::DirtyQueue;
