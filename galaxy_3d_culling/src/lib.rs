/*!
# Galaxy 3D Culling

Scene culling and spatial indexing core of the Galaxy 3D engine.

Sits between the scene graph and the renderer backend. Every frame it keeps
a spatial index of the placed instances up to date, pairs geometry with the
lights, probes, decals and GI volumes that affect it, and culls the camera,
shadow cascade, reflection probe and SDFGI viewpoints in one pass.

## Architecture

- **SceneManager**: registry of instances, scenarios and cameras; per-frame drivers
- **DynamicBvh**: `SceneIndex` implementation used by every scenario
- **Culler**: serial or worker-pool cull pass over a scenario
- **RenderBackend / ResourceStorage**: collaborator traits the core talks to
- **shadow**: directional cascades, positional shadow budget, probe queue

Collaborators are injected into the `SceneManager`; `backend::mock` provides
recording implementations for tests and headless tools.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod settings;
pub mod utils;
pub mod camera;
pub mod backend;
pub mod scene;
pub mod shadow;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Scene manager, the main entry point
    pub use crate::scene::SceneManager;
    pub use crate::settings::CullingSettings;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod camera {
        pub use crate::camera::*;
    }

    pub mod shadow {
        pub use crate::shadow::*;
    }

    pub mod backend {
        pub use crate::backend::*;
    }
}

// Re-export math library at crate root
pub use glam;
