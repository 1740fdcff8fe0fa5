//! Shadow and probe scheduling
//!
//! - `cascades`: stabilized directional light cascades
//! - `shadow_scheduler`: positional light shadow redraws under a per-frame budget
//! - `probe_scheduler`: reflection probe face / roughness pipeline queue

mod cascades;
mod shadow_scheduler;
mod probe_scheduler;

pub use cascades::{CascadeShadow, compute_cascades, split_ranges, cascade_tile_size};
pub use shadow_scheduler::{
    ShadowCandidate, ShadowSchedule, schedule_positional_shadows, light_coverage, shadow_pass_count,
};
pub use probe_scheduler::{ProbeRenderQueue, ProbeStep, PROBE_FACES};
