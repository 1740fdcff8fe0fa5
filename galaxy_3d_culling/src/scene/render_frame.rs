//! Per-frame drivers.
//!
//! `render_camera` runs one fused cull pass for the camera frustum, the
//! directional shadow cascades and the pending SDFGI regions, then does
//! the post-pass work on the calling thread: pairing array refresh,
//! positional shadow scheduling, and submission to the backend.
//!
//! `render_probes` advances the reflection probe queue and refreshes dirty
//! GI probes. `render_particle_colliders` hands each colliding particle
//! system the colliders it overlaps.

use glam::{Mat4, Vec3};
use crate::backend::{
    BackendHandle, RenderTarget, SceneRenderData, SdfgiRegionPass, ShadowPass,
};
use crate::camera::{Camera, CameraProjection};
use crate::shadow::{
    compute_cascades, light_coverage, schedule_positional_shadows, shadow_pass_count, ProbeStep,
    ShadowCandidate,
};
use crate::{engine_error, engine_trace};
use super::cull_result::CullResult;
use super::culler::{CullContext, CullRequest, Culler, PassTargets};
use super::instance::{InstanceKey, InstanceKind, Payload};
use super::scenario::{DebugDrawMode, InstanceFlags, Scenario, ScenarioKey};
use super::scene_manager::{CameraKey, SceneManager};

/// Cube map face directions and up vectors (+X, -X, +Y, -Y, +Z, -Z).
const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

const PROBE_NEAR: f32 = 0.01;

/// Directional light cascades taking part in a camera pass.
struct DirectionalCascades {
    light: BackendHandle,
    /// First cascade's index in the request
    first: usize,
    count: usize,
}

impl SceneManager {
    /// Cull a scenario with the culler sized for it.
    ///
    /// The backend is locked once for the whole pass. Returns `None` for
    /// an unknown scenario.
    pub fn cull_scenario(&mut self, scenario_key: ScenarioKey, request: &CullRequest) -> Option<CullResult> {
        let threaded = self.culls_threaded(scenario_key);
        let scenario = self.scenarios.get(scenario_key)?;
        let culler = match &self.parallel_culler {
            Some(parallel) if threaded => parallel as &dyn Culler,
            _ => &self.serial_culler as &dyn Culler,
        };
        let ctx = CullContext { scenario, request };
        let mut backend = self.backend.lock();
        let targets = PassTargets { schedule: &mut self.schedule, backend: &mut *backend };
        Some(culler.cull(&ctx, targets))
    }

    /// Directional lights of a scenario visible under `cull_mask`.
    fn visible_directional_lights(&self, scenario: &Scenario, cull_mask: u32) -> Vec<InstanceKey> {
        scenario
            .directional_lights()
            .iter()
            .copied()
            .filter(|key| {
                self.instances.get(*key).map_or(false, |light| {
                    light.visible && light.handle.is_some() && light.layer_mask & cull_mask != 0
                })
            })
            .collect()
    }

    // ========================================================================
    // Camera
    // ========================================================================

    /// Cull and submit one camera view of a scenario.
    ///
    /// Returns `false` when the camera or scenario does not exist.
    pub fn render_camera(&mut self, camera: CameraKey, scenario_key: ScenarioKey, viewport: (u32, u32)) -> bool {
        let Some(camera) = self.cameras.get(camera).cloned() else {
            engine_error!("galaxy3d::SceneManager", "render_camera: invalid camera {:?}", camera);
            return false;
        };
        let Some(scenario) = self.scenarios.get(scenario_key) else {
            engine_error!("galaxy3d::SceneManager", "render_camera: invalid scenario {:?}", scenario_key);
            return false;
        };
        let aspect = viewport.0.max(1) as f32 / viewport.1.max(1) as f32;
        let environment = scenario.effective_environment(camera.environment());

        // ----- Directional cascades -----
        let directional = self.visible_directional_lights(scenario, camera.cull_mask());
        let mut directional_handles = Vec::with_capacity(directional.len());
        let mut cascade_frustums = Vec::new();
        let mut cascade_lights: Vec<DirectionalCascades> = Vec::new();
        {
            let mut backend = self.backend.lock();
            for key in &directional {
                let Some(light) = self.instances.get(*key) else {
                    continue;
                };
                let Some(handle) = light.handle else {
                    continue;
                };
                directional_handles.push(handle);

                let shadowed = light.payload.light().map_or(false, |payload| payload.shadow_enabled);
                let info = light.base.and_then(|base| self.resources.light_info(base));
                let (true, Some(info)) = (shadowed, info) else {
                    continue;
                };
                let cascades = compute_cascades(
                    &camera,
                    aspect,
                    &light.transform,
                    &info,
                    self.settings.directional_shadow_resolution,
                );
                for (index, cascade) in cascades.iter().enumerate() {
                    backend.light_instance_set_shadow_transform(handle, index, cascade);
                }
                cascade_lights.push(DirectionalCascades {
                    light: handle,
                    first: cascade_frustums.len(),
                    count: cascades.len(),
                });
                cascade_frustums.extend(cascades.iter().map(|cascade| cascade.frustum));
            }
        }

        // ----- SDFGI -----
        let mut sdfgi_regions = self.backend.lock().sdfgi_pending_regions(environment, camera.position());
        sdfgi_regions.truncate(self.settings.max_sdfgi_region_updates_per_frame);

        // ----- Fused cull -----
        let request = CullRequest {
            frustum: camera.frustum(aspect),
            layer_mask: camera.cull_mask(),
            cascades: cascade_frustums,
            sdfgi_regions,
            excluded_probe: None,
            shadow_atlas: true,
        };
        let Some(result) = self.cull_scenario(scenario_key, &request) else {
            return false;
        };
        engine_trace!(
            "galaxy3d::SceneManager",
            "Camera pass: {} geometry, {} light(s), {} probe(s), {} pairing refresh(es)",
            result.geometry.len(),
            result.lights.len(),
            result.reflection_probes.len(),
            result.pairing_dirty.len()
        );

        // ----- Post-pass, single threaded -----
        self.refresh_geometry(scenario_key, &result.pairing_dirty);
        for key in &result.animated_casters {
            let lights: Vec<InstanceKey> = self
                .instances
                .get(*key)
                .and_then(|instance| instance.payload.geometry())
                .map(|geometry| geometry.lights.iter().copied().collect())
                .unwrap_or_default();
            for light in lights {
                self.mark_light_dirty(light);
            }
        }

        let positional_shadow_passes = self.schedule_shadows(&camera, aspect, scenario_key, &result.shadow_lights);

        let directional_shadow_passes: Vec<ShadowPass> = cascade_lights
            .iter()
            .flat_map(|cascades| {
                (0..cascades.count).map(move |index| (cascades.light, index, cascades.first + index))
            })
            .map(|(light, index, request_index)| ShadowPass {
                light,
                pass: index as u32,
                casters: result.cascade_casters.get(request_index).cloned().unwrap_or_default(),
            })
            .collect();

        let sdfgi_passes: Vec<SdfgiRegionPass> = request
            .sdfgi_regions
            .iter()
            .zip(&result.sdfgi_region_geometry)
            .map(|(region, geometry)| SdfgiRegionPass { region: *region, geometry: geometry.clone() })
            .collect();

        let Some(scenario) = self.scenarios.get(scenario_key) else {
            return false;
        };
        let data = SceneRenderData {
            target: RenderTarget::Camera,
            transform: *camera.transform(),
            projection: camera.projection_matrix(aspect),
            environment,
            camera_attributes: camera.attributes().or(scenario.camera_attributes),
            shadow_atlas: Some(scenario.shadow_atlas()),
            reflection_atlas: Some(scenario.reflection_atlas()),
            debug_draw: scenario.debug_draw(),
            cull: result,
            directional_lights: directional_handles,
            directional_shadow_passes,
            positional_shadow_passes,
            sdfgi_regions: sdfgi_passes,
        };
        self.backend.lock().render_scene(&data);
        true
    }

    /// Offer visible shadowed lights to the atlas and build the passes of
    /// the ones redrawn this frame.
    fn schedule_shadows(
        &mut self,
        camera: &Camera,
        aspect: f32,
        scenario_key: ScenarioKey,
        shadow_lights: &[InstanceKey],
    ) -> Vec<ShadowPass> {
        let Some(atlas) = self.scenarios.get(scenario_key).map(Scenario::shadow_atlas) else {
            return Vec::new();
        };

        let mut candidates: Vec<ShadowCandidate> = Vec::with_capacity(shadow_lights.len());
        for key in shadow_lights {
            let Some(instance) = self.instances.get(*key) else {
                continue;
            };
            let (Some(handle), Some(light), Some(base)) = (instance.handle, instance.payload.light(), instance.base)
            else {
                continue;
            };
            let Some(info) = self.resources.light_info(base) else {
                continue;
            };
            let passes = shadow_pass_count(info.light_type, info.omni_shadow_mode);
            if passes == 0 {
                continue;
            }
            candidates.push(ShadowCandidate {
                key: *key,
                handle,
                passes,
                coverage: light_coverage(camera, aspect, &instance.transformed_aabb),
                version: light.shadow_version,
                pending: light.shadow_pending,
            });
        }

        let schedule = {
            let mut backend = self.backend.lock();
            schedule_positional_shadows(
                &mut candidates,
                self.settings.max_shadow_updates_per_frame,
                atlas,
                &mut *backend,
            )
        };

        for (key, pending) in schedule
            .redraw
            .iter()
            .map(|candidate| (candidate.key, false))
            .chain(schedule.deferred.iter().map(|key| (*key, true)))
        {
            if let Some(light) = self.instances.get_mut(key).and_then(|i| i.payload.light_mut()) {
                light.shadow_pending = pending;
            }
        }

        let mut passes = Vec::new();
        for candidate in &schedule.redraw {
            let casters = self.light_casters(candidate.key);
            for pass in 0..candidate.passes {
                passes.push(ShadowPass { light: candidate.handle, pass, casters: casters.clone() });
            }
        }
        passes
    }

    /// Handles of the shadow casting geometry paired with a light, sorted.
    fn light_casters(&self, light: InstanceKey) -> Vec<BackendHandle> {
        let Some(light) = self.instances.get(light).and_then(|i| i.payload.light()) else {
            return Vec::new();
        };
        let mut casters: Vec<BackendHandle> = light
            .geometries
            .iter()
            .filter_map(|key| self.instances.get(*key))
            .filter(|geometry| geometry.payload.geometry().map_or(false, |g| g.can_cast_shadows))
            .filter_map(|geometry| geometry.handle)
            .collect();
        casters.sort_unstable();
        casters
    }

    // ========================================================================
    // Probes
    // ========================================================================

    /// Advance reflection probe redraws and refresh dirty GI probes.
    pub fn render_probes(&mut self) {
        let mut queue = std::mem::take(&mut self.schedule.probes);
        let layers = self.settings.reflection_probe_roughness_layers;
        let finished = queue.advance(layers, |key, handle, step| self.run_probe_step(key, handle, step));

        for key in &finished {
            let slot = self.instances.get(*key).and_then(|instance| Some((instance.scenario?, instance.index_slot?)));
            if let Some((scenario_key, slot)) = slot {
                if let Some(data) = self.scenarios.get_mut(scenario_key).and_then(|s| s.data_mut(slot.array_index)) {
                    data.flags.remove(InstanceFlags::REFLECTION_DIRTY);
                }
            }
        }

        // Probes found by the face passes of this frame
        let schedule = &mut self.schedule;
        let mut found = std::mem::take(&mut schedule.probes);
        for key in &finished {
            found.remove(*key);
        }
        queue.merge(found);
        schedule.probes = queue;

        self.update_gi_probes();
    }

    /// Run one step of a probe's pipeline. `false` retries next frame.
    fn run_probe_step(&mut self, key: InstanceKey, handle: BackendHandle, step: ProbeStep) -> bool {
        let Some(instance) = self.instances.get(key) else {
            return false;
        };
        let Some(scenario_key) = instance.scenario else {
            return false;
        };
        let Some(reflection_atlas) = self.scenarios.get(scenario_key).map(Scenario::reflection_atlas) else {
            return false;
        };
        let Some(info) = instance.base.and_then(|base| self.resources.reflection_probe_info(base)) else {
            // Resource gone: nothing to capture
            return true;
        };
        let probe_transform = instance.transform;

        let face = match step {
            ProbeStep::RoughnessLayer(layer) => {
                self.backend.lock().reflection_probe_render_roughness_layer(handle, layer);
                return true;
            }
            ProbeStep::Face(face) => face,
        };
        if face == 0 && !self.backend.lock().reflection_probe_instance_begin_render(handle, reflection_atlas) {
            return false;
        }

        let origin = probe_transform.transform_point3(info.origin_offset);
        let (direction, up) = CUBE_FACES[face as usize % CUBE_FACES.len()];
        let far = (info.extents + info.origin_offset.abs()).length().max(PROBE_NEAR * 2.0);
        let mut face_camera = Camera::new(
            Mat4::look_to_rh(origin, direction, up).inverse(),
            CameraProjection::Perspective { fov_degrees: 90.0, near: PROBE_NEAR, far },
        );
        face_camera.set_cull_mask(info.cull_mask);

        let mut request = CullRequest::new(face_camera.frustum(1.0), info.cull_mask);
        request.excluded_probe = Some(key);
        let Some(result) = self.cull_scenario(scenario_key, &request) else {
            return false;
        };
        let Some(scenario) = self.scenarios.get(scenario_key) else {
            return false;
        };

        let directional_lights = self
            .visible_directional_lights(scenario, info.cull_mask)
            .iter()
            .filter_map(|light| self.instances.get(*light).and_then(|i| i.handle))
            .collect();
        let data = SceneRenderData {
            target: RenderTarget::ReflectionProbe { probe: handle, face },
            transform: *face_camera.transform(),
            projection: face_camera.projection_matrix(1.0),
            // Interiors do not see the sky
            environment: if info.interior { None } else { scenario.effective_environment(None) },
            camera_attributes: None,
            shadow_atlas: None,
            reflection_atlas: None,
            debug_draw: DebugDrawMode::Disabled,
            cull: result,
            directional_lights,
            directional_shadow_passes: Vec::new(),
            positional_shadow_passes: Vec::new(),
            sdfgi_regions: Vec::new(),
        };
        self.backend.lock().render_scene(&data);
        true
    }

    /// Send every dirty GI probe its lights and dynamic geometry.
    fn update_gi_probes(&mut self) {
        let mut dirty: Vec<InstanceKey> = self.schedule.gi_probes_dirty.drain().collect();
        if dirty.is_empty() {
            return;
        }
        dirty.sort_unstable();

        let mut backend = self.backend.lock();
        for key in dirty {
            let Some(instance) = self.instances.get(key) else {
                continue;
            };
            let (Some(handle), Payload::GiProbe(probe)) = (instance.handle, &instance.payload) else {
                continue;
            };

            let directional = instance
                .scenario
                .and_then(|s| self.scenarios.get(s))
                .map(|scenario| scenario.directional_lights().to_vec())
                .unwrap_or_default();
            let mut lights: Vec<BackendHandle> = probe
                .lights
                .iter()
                .chain(directional.iter())
                .filter_map(|light| self.instances.get(*light))
                .filter(|light| light.visible)
                .filter(|light| {
                    // Fully baked lights are already in the probe's data
                    let baked = light
                        .base
                        .and_then(|base| self.resources.light_info(base))
                        .map_or(false, |info| info.baked);
                    !baked
                })
                .filter_map(|light| light.handle)
                .collect();
            lights.sort_unstable();
            lights.dedup();

            let mut geometry: Vec<BackendHandle> = probe
                .dynamic_geometries
                .iter()
                .filter_map(|geometry| self.instances.get(*geometry).and_then(|i| i.handle))
                .collect();
            geometry.sort_unstable();

            backend.gi_probe_update(handle, &lights, &geometry);
        }
    }

    // ========================================================================
    // Particles
    // ========================================================================

    /// Give every colliding particle system the colliders it overlaps.
    pub fn render_particle_colliders(&self) {
        let mut backend = self.backend.lock();
        for scenario in self.scenarios.values() {
            let mut particles: Vec<InstanceKey> = scenario.particles.iter().copied().collect();
            particles.sort_unstable();

            for key in particles {
                let Some(instance) = self.instances.get(key) else {
                    continue;
                };
                let (Some(handle), Some(base), true) = (instance.handle, instance.base, instance.is_indexed()) else {
                    continue;
                };
                if self.resources.particles_collision_enabled(base) != Some(true) {
                    continue;
                }

                let mut colliders = Vec::new();
                scenario.volume_index().aabb_query(&instance.transformed_aabb, &mut |_, other| {
                    if let Some(collider) = self.instances.get(*other) {
                        if collider.kind == InstanceKind::ParticlesCollision {
                            colliders.extend(collider.handle);
                        }
                    }
                    false
                });
                colliders.sort_unstable();
                backend.particles_set_colliders(handle, &colliders);
            }
        }
    }
}

#[cfg(test)]
#[path = "render_frame_tests.rs"]
mod tests;
