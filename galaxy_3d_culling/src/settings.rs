//! Culling settings
//!
//! Plain configuration struct handed to `SceneManager::new`. Every field has
//! a default, so a TOML document only needs to name what it overrides:
//!
//! ```toml
//! bvh_optimize_steps_per_frame = 32
//! threaded_cull_minimum_instances = 4096
//! worker_thread_count = 4
//! ```

use serde::Deserialize;
use crate::error::{Error, Result};

/// Tunables of the culling core.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CullingSettings {
    /// Leaves re-inserted by `DynamicBvh::optimize_incremental` per frame.
    pub bvh_optimize_steps_per_frame: u32,
    /// Upper bound of the motion envelope added around moving leaves
    /// (world units). 0 stores tight boxes and disables quantization.
    pub bvh_max_motion_expansion: f32,
    /// Instance count at which the cull pass fans out to the worker pool.
    pub threaded_cull_minimum_instances: usize,
    /// Worker pool size. 0 = available hardware concurrency.
    pub worker_thread_count: usize,
    /// Per-category cap of renderer-facing pairing arrays.
    pub max_instance_pairs: usize,
    /// Positional shadow maps rebuilt per frame at most.
    pub max_shadow_updates_per_frame: usize,
    /// SDFGI regions culled per frame at most.
    pub max_sdfgi_region_updates_per_frame: usize,
    /// Roughness convolution steps after the 6 faces of a reflection probe.
    pub reflection_probe_roughness_layers: u32,
    /// Resolution of the directional shadow map (texel snapping unit).
    pub directional_shadow_resolution: u32,
    /// Resolution of a per-scenario positional shadow atlas.
    pub default_shadow_atlas_resolution: u32,
}

impl Default for CullingSettings {
    fn default() -> Self {
        Self {
            bvh_optimize_steps_per_frame: 10,
            bvh_max_motion_expansion: 1.0,
            threaded_cull_minimum_instances: 1000,
            worker_thread_count: 0,
            max_instance_pairs: 32,
            max_shadow_updates_per_frame: 8,
            max_sdfgi_region_updates_per_frame: 8,
            reflection_probe_roughness_layers: 8,
            directional_shadow_resolution: 4096,
            default_shadow_atlas_resolution: 4096,
        }
    }
}

impl CullingSettings {
    /// Parse and validate settings from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: CullingSettings = toml::from_str(source)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the culling core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.bvh_max_motion_expansion.is_finite() || self.bvh_max_motion_expansion < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "bvh_max_motion_expansion must be finite and >= 0 (got {})",
                self.bvh_max_motion_expansion
            )));
        }
        if self.directional_shadow_resolution == 0 {
            return Err(Error::InvalidConfig(
                "directional_shadow_resolution must be > 0".to_string(),
            ));
        }
        if self.default_shadow_atlas_resolution == 0 {
            return Err(Error::InvalidConfig(
                "default_shadow_atlas_resolution must be > 0".to_string(),
            ));
        }
        if self.max_instance_pairs == 0 {
            return Err(Error::InvalidConfig("max_instance_pairs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Worker pool size after resolving 0 to the hardware concurrency.
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_thread_count > 0 {
            return self.worker_thread_count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Parallel cull threshold, clamped so every worker gets an instance.
    pub fn effective_threaded_cull_minimum(&self) -> usize {
        self.threaded_cull_minimum_instances
            .max(self.effective_worker_count())
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
