//! Backend module: collaborators below the culling core.
//!
//! - `ResourceStorage`: read-only queries about meshes, materials, lights
//! - `RenderBackend`: receives per-instance handles, pairings and frames
//! - `mock`: recording implementations for tests and headless tools

mod render_backend;
mod resource_storage;
pub mod mock;

pub use render_backend::{
    RenderBackend, RenderTarget, SceneRenderData, ShadowPass, SdfgiRegionPass,
};
pub use resource_storage::{
    ResourceStorage, ParamValue, InstanceParameterDecl,
    LightType, LightInfo, DirectionalShadowMode, OmniShadowMode,
    ReflectionProbeUpdateMode, ReflectionProbeInfo, LightmapInfo, ShCoefficients,
};

/// Opaque id of a base resource (mesh, light, material, atlas, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Opaque id of a backend-side instance (geometry, light, probe, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendHandle(pub u64);
