use super::*;
use crate::backend::mock::{MockBackend, MockMaterial, MockResources};
use crate::backend::{InstanceParameterDecl, LightInfo, LightType};
use crate::camera::Frustum;
use crate::scene::CullRequest;

struct Harness {
    manager: SceneManager,
    backend: Arc<Mutex<MockBackend>>,
    resources: Arc<MockResources>,
}

fn harness_with(settings: CullingSettings) -> Harness {
    let backend = Arc::new(Mutex::new(MockBackend::new()));
    let resources = Arc::new(MockResources::new());
    let manager = SceneManager::new(settings, backend.clone(), resources.clone()).unwrap();
    Harness { manager, backend, resources }
}

fn harness() -> Harness {
    harness_with(CullingSettings { worker_thread_count: 1, ..Default::default() })
}

fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, y, z))
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_rejects_invalid_settings() {
    let settings = CullingSettings { max_instance_pairs: 0, ..Default::default() };
    let backend: Arc<Mutex<dyn RenderBackend>> = Arc::new(Mutex::new(MockBackend::new()));
    let result = SceneManager::new(settings, backend, Arc::new(MockResources::new()));
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_single_worker_has_no_pool() {
    let h = harness();
    assert_eq!(h.manager.worker_count(), 0);
}

#[test]
fn test_worker_pool_size_follows_settings() {
    let h = harness_with(CullingSettings {
        worker_thread_count: 3,
        threaded_cull_minimum_instances: 10,
        ..Default::default()
    });
    assert_eq!(h.manager.worker_count(), 3);
}

// ============================================================================
// Cameras
// ============================================================================

#[test]
fn test_camera_setters_and_free() {
    let mut h = harness();
    let camera = h.manager.camera_create();
    assert!(h.manager.camera_set_perspective(camera, 60.0, 0.1, 50.0));
    assert!(h.manager.camera_set_cull_mask(camera, 0b10));
    assert!(h.manager.camera_set_environment(camera, Some(ResourceId(9))));
    assert_eq!(h.manager.camera(camera).map(Camera::cull_mask), Some(0b10));
    assert_eq!(h.manager.camera(camera).and_then(Camera::environment), Some(ResourceId(9)));

    assert!(h.manager.camera_free(camera));
    assert!(!h.manager.camera_free(camera));
    assert!(!h.manager.camera_set_transform(camera, Mat4::IDENTITY));
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_create_allocates_atlases() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    assert!(h.manager.scenario(scenario).is_some());
    let backend = h.backend.lock();
    assert_eq!(backend.call_count("shadow_atlas_create"), 1);
    assert_eq!(backend.call_count("reflection_atlas_create"), 1);
}

#[test]
fn test_scenario_free_detaches_members() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();
    assert!(h.manager.instance(instance).unwrap().is_indexed());

    assert!(h.manager.scenario_free(scenario));
    let instance = h.manager.instance(instance).unwrap();
    assert_eq!(instance.scenario(), None);
    assert!(!instance.is_indexed());
    assert_eq!(h.backend.lock().call_count("atlas_free"), 2);
    assert!(!h.manager.scenario_free(scenario));
}

#[test]
fn test_scenario_settings() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    assert!(h.manager.scenario_set_debug(scenario, DebugDrawMode::Wireframe));
    assert!(h.manager.scenario_set_fallback_environment(scenario, Some(ResourceId(4))));
    let stored = h.manager.scenario(scenario).unwrap();
    assert_eq!(stored.debug_draw(), DebugDrawMode::Wireframe);
    assert_eq!(stored.effective_environment(None), Some(ResourceId(4)));
}

#[test]
fn test_reflection_atlas_resize_marks_probes() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let probe_base = h.resources.add_reflection_probe(Default::default());
    let probe = h.manager.instance_create2(InstanceKind::ReflectionProbe, probe_base, scenario);
    h.manager.update();

    let slot = h.manager.instance(probe).unwrap().index_slot().unwrap();
    h.manager.scenarios[scenario].data_mut(slot.array_index).unwrap().flags.remove(InstanceFlags::REFLECTION_DIRTY);

    assert!(h.manager.scenario_set_reflection_atlas_size(scenario, 256, 16));
    let data = &h.manager.scenario(scenario).unwrap().instance_data()[slot.array_index];
    assert!(data.flags.contains(InstanceFlags::REFLECTION_DIRTY));
    assert_eq!(h.manager.scenario(scenario).unwrap().reflection_atlas_size(), (256, 16));
}

// ============================================================================
// Instance lifecycle
// ============================================================================

#[test]
fn test_created_instance_is_indexed_after_update() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    assert!(h.manager.is_queued(instance));
    assert!(!h.manager.instance(instance).unwrap().is_indexed());

    h.manager.update();
    assert_eq!(h.manager.dirty_count(), 0);
    assert!(h.manager.instance(instance).unwrap().is_indexed());
    assert_eq!(h.manager.scenario(scenario).unwrap().instance_count(), 1);
    assert_eq!(h.manager.frame(), 1);
}

#[test]
fn test_instance_free_releases_handle() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();

    assert!(h.manager.instance_free(instance));
    assert!(h.manager.instance(instance).is_none());
    assert_eq!(h.manager.scenario(scenario).unwrap().instance_count(), 0);
    assert_eq!(h.backend.lock().call_count("instance_free"), 1);
    // Stale key
    assert!(!h.manager.instance_set_visible(instance, false));
}

#[test]
fn test_free_before_flush_is_dropped_from_queue() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.instance_free(instance);
    assert_eq!(h.manager.dirty_count(), 0);
    h.manager.update();
    assert_eq!(h.manager.scenario(scenario).unwrap().instance_count(), 0);
}

#[test]
fn test_set_base_replaces_handle() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let light = h.resources.add_light(LightInfo::default());
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();

    assert!(h.manager.instance_set_base(instance, InstanceKind::Light, Some(light)));
    h.manager.update();
    let stored = h.manager.instance(instance).unwrap();
    assert_eq!(stored.kind(), InstanceKind::Light);
    assert!(stored.payload().light().is_some());
    assert!(stored.is_indexed());
    let backend = h.backend.lock();
    assert_eq!(backend.call_count("instance_free"), 1);
    assert_eq!(backend.call_count("light_instance_create"), 1);
}

#[test]
fn test_clearing_base_unindexes() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();

    h.manager.instance_set_base(instance, InstanceKind::Mesh, None);
    h.manager.update();
    let stored = h.manager.instance(instance).unwrap();
    assert_eq!(stored.kind(), InstanceKind::None);
    assert_eq!(stored.handle(), None);
    assert!(!stored.is_indexed());
}

#[test]
fn test_move_between_scenarios() {
    let mut h = harness();
    let first = h.manager.scenario_create();
    let second = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, first);
    h.manager.update();

    assert!(h.manager.instance_set_scenario(instance, Some(second)));
    assert_eq!(h.manager.scenario(first).unwrap().instance_count(), 0);
    h.manager.update();
    assert_eq!(h.manager.scenario(second).unwrap().instance_count(), 1);
    assert!(!h.manager.scenario(first).unwrap().contains(instance));
    assert!(h.manager.scenario(second).unwrap().contains(instance));
}

#[test]
fn test_hidden_instance_leaves_index() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();

    h.manager.instance_set_visible(instance, false);
    h.manager.update();
    assert!(!h.manager.instance(instance).unwrap().is_indexed());
    h.manager.instance_set_visible(instance, true);
    h.manager.update();
    assert!(h.manager.instance(instance).unwrap().is_indexed());
}

#[test]
fn test_directional_light_is_listed_not_indexed() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let sun = h.resources.add_light(LightInfo { light_type: LightType::Directional, ..Default::default() });
    let instance = h.manager.instance_create2(InstanceKind::Light, sun, scenario);
    h.manager.update();

    assert!(!h.manager.instance(instance).unwrap().is_indexed());
    assert_eq!(h.manager.scenario(scenario).unwrap().directional_lights(), &[instance]);
}

// ============================================================================
// Mutators and flush
// ============================================================================

#[test]
fn test_transform_moves_world_aabb_and_version() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();
    let version = h.manager.instance_version(instance).unwrap();

    h.manager.instance_set_transform(instance, translation(10.0, 0.0, 0.0));
    h.manager.update();
    let stored = h.manager.instance(instance).unwrap();
    assert_eq!(stored.transformed_aabb().center(), Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(stored.prev_transformed_aabb().center(), Vec3::ZERO);
    assert_eq!(h.manager.instance_version(instance), Some(version + 1));
}

#[test]
fn test_custom_aabb_and_margin() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    let custom = AABB::new(Vec3::splat(-2.0), Vec3::splat(2.0));
    h.manager.instance_set_custom_aabb(instance, Some(custom));
    h.manager.instance_set_extra_visibility_margin(instance, 1.0);
    h.manager.update();

    assert_eq!(*h.manager.instance(instance).unwrap().aabb(), custom.grown(1.0));
}

#[test]
fn test_non_finite_transform_is_excluded() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();

    h.manager.instance_set_transform(instance, translation(f32::NAN, 0.0, 0.0));
    h.manager.update();
    assert!(!h.manager.instance(instance).unwrap().is_indexed());
    assert!(h.manager.instances_cull_aabb(&AABB::new(Vec3::splat(-1e6), Vec3::splat(1e6)), scenario).is_empty());
}

#[test]
fn test_millimeter_scaled_mesh_is_indexed_and_paired() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    // 1 m box authored in millimeters
    let mesh = h.resources.add_box_mesh(Vec3::splat(500.0));
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.instance_attach_object_instance_id(instance, 7);
    h.manager.instance_set_transform(instance, Mat4::from_scale(Vec3::splat(0.001)));
    let light_base = h.resources.add_light(LightInfo { range: 5.0, ..Default::default() });
    let light = h.manager.instance_create2(InstanceKind::Light, light_base, scenario);
    h.manager.update();

    let placed = h.manager.instance(instance).unwrap();
    assert!(placed.is_indexed());
    assert!((placed.transformed_aabb().size() - Vec3::ONE).abs().max_element() < 1e-4);
    assert_eq!(h.manager.instances_cull_aabb(&AABB::new(Vec3::splat(-0.1), Vec3::splat(0.1)), scenario), vec![7]);
    assert!(placed.payload().geometry().unwrap().lights.contains(&light));

    // Zero scale stays out of the index
    h.manager.instance_set_transform(instance, Mat4::from_scale(Vec3::ZERO));
    h.manager.update();
    assert!(!h.manager.instance(instance).unwrap().is_indexed());
    assert!(h.manager.instances_cull_aabb(&AABB::new(Vec3::splat(-0.1), Vec3::splat(0.1)), scenario).is_empty());
}

#[test]
fn test_layer_mask_reaches_backend_immediately() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    let handle = h.manager.instance(instance).unwrap().handle().unwrap();

    h.manager.instance_set_layer_mask(instance, 0b100);
    assert_eq!(h.backend.lock().layer_masks.get(&handle), Some(&0b100));
    h.manager.update();
    let slot = h.manager.instance(instance).unwrap().index_slot().unwrap();
    assert_eq!(h.manager.scenario(scenario).unwrap().instance_data()[slot.array_index].layer_mask, 0b100);
}

#[test]
fn test_material_override_wins_over_surfaces() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let surface = h.resources.add_material(MockMaterial::default());
    let over = h.resources.add_material(MockMaterial { casts_shadows: false, ..Default::default() });
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.instance_set_surface_override_material(instance, 0, Some(surface));
    h.manager.update();
    let handle = h.manager.instance(instance).unwrap().handle().unwrap();
    assert_eq!(h.backend.lock().materials.get(&handle), Some(&vec![surface]));

    h.manager.instance_geometry_set_material_override(instance, Some(over));
    h.manager.update();
    assert_eq!(h.backend.lock().materials.get(&handle), Some(&vec![over]));
    let geometry = h.manager.instance(instance).unwrap().payload().geometry().unwrap();
    assert!(!geometry.can_cast_shadows);
}

#[test]
fn test_cast_shadows_off_disables_casting() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();
    assert!(h.manager.instance(instance).unwrap().payload().geometry().unwrap().can_cast_shadows);

    h.manager.instance_geometry_set_cast_shadows_setting(instance, ShadowCastingSetting::Off);
    h.manager.update();
    assert!(!h.manager.instance(instance).unwrap().payload().geometry().unwrap().can_cast_shadows);
}

#[test]
fn test_mesh_and_light_pair_after_flush() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let light_base = h.resources.add_light(LightInfo { range: 5.0, ..Default::default() });
    let geometry = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    let light = h.manager.instance_create2(InstanceKind::Light, light_base, scenario);
    h.manager.update();

    let paired = &h.manager.instance(geometry).unwrap().payload().geometry().unwrap().lights;
    assert!(paired.contains(&light));
    assert!(h.manager.instance(light).unwrap().payload().light().unwrap().geometries.contains(&geometry));

    // Moving out of range breaks the pair on both sides
    h.manager.instance_set_transform(geometry, translation(50.0, 0.0, 0.0));
    h.manager.update();
    assert!(h.manager.instance(geometry).unwrap().payload().geometry().unwrap().lights.is_empty());
    assert!(h.manager.instance(light).unwrap().payload().light().unwrap().geometries.is_empty());
}

#[test]
fn test_moving_caster_bumps_light_shadow_version() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let light_base = h.resources.add_light(LightInfo { range: 10.0, shadow_enabled: true, ..Default::default() });
    let geometry = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    let light = h.manager.instance_create2(InstanceKind::Light, light_base, scenario);
    h.manager.update();
    let version = h.manager.instance(light).unwrap().payload().light().unwrap().shadow_version;

    h.manager.instance_set_transform(geometry, translation(1.0, 0.0, 0.0));
    h.manager.update();
    let after = h.manager.instance(light).unwrap().payload().light().unwrap().shadow_version;
    assert!(after > version);
}

// ============================================================================
// Shader parameters
// ============================================================================

#[test]
fn test_shader_parameters_resolve_against_materials() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let material = h.resources.add_material(MockMaterial {
        instance_parameters: vec![InstanceParameterDecl {
            name: "tint".to_string(),
            index: 2,
            default_value: ParamValue::Float(0.5),
        }],
        ..Default::default()
    });
    let mesh = h.resources.add_mesh(AABB::default_cube(), vec![material]);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);

    // Unknown until the flush resolves declarations
    assert!(h.manager.instance_geometry_set_shader_parameter(instance, "tint", ParamValue::Float(1.0)));
    h.manager.update();

    assert_eq!(h.manager.instance_geometry_get_shader_parameter_list(instance), vec!["tint".to_string()]);
    assert_eq!(
        h.manager.instance_geometry_get_shader_parameter_default_value(instance, "tint"),
        Some(ParamValue::Float(0.5))
    );
    let handle = h.manager.instance(instance).unwrap().handle().unwrap();
    assert_eq!(
        h.backend.lock().instance_parameters.get(&handle),
        Some(&vec![(2, ParamValue::Float(1.0))])
    );

    // Declared now: pushed right away
    h.manager.instance_geometry_set_shader_parameter(instance, "tint", ParamValue::Float(0.25));
    assert_eq!(
        h.backend.lock().instance_parameters.get(&handle),
        Some(&vec![(2, ParamValue::Float(0.25))])
    );
    assert_eq!(
        h.manager.instance_geometry_get_shader_parameter(instance, "tint"),
        Some(ParamValue::Float(0.25))
    );
}

#[test]
fn test_resource_change_requeues_users() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let instance = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.update();

    h.resources.update_mesh_aabb(mesh, AABB::new(Vec3::splat(-3.0), Vec3::splat(3.0)));
    h.manager.resource_changed(mesh);
    assert!(h.manager.is_queued(instance));
    h.manager.update();
    assert_eq!(h.manager.instance(instance).unwrap().aabb().max, Vec3::splat(3.0));
}

// ============================================================================
// Spatial queries
// ============================================================================

#[test]
fn test_cull_queries_report_object_ids() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::splat(0.5));
    let near = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    let far = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    let anonymous = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
    h.manager.instance_attach_object_instance_id(near, 11);
    h.manager.instance_attach_object_instance_id(far, 22);
    h.manager.instance_set_transform(far, translation(20.0, 0.0, 0.0));
    h.manager.instance_set_transform(anonymous, translation(0.0, 0.2, 0.0));
    h.manager.update();

    let query = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    assert_eq!(h.manager.instances_cull_aabb(&query, scenario), vec![11]);

    let mut hits = h.manager.instances_cull_ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(25.0, 0.0, 0.0), scenario);
    hits.sort_unstable();
    assert_eq!(hits, vec![11, 22]);

    // Half space x >= 10
    let planes = [Vec4::new(1.0, 0.0, 0.0, -10.0)];
    assert_eq!(h.manager.instances_cull_convex(&planes, scenario), vec![22]);
}

#[test]
fn test_queries_on_missing_scenario_are_empty() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    h.manager.scenario_free(scenario);
    assert!(h.manager.instances_cull_aabb(&AABB::default_cube(), scenario).is_empty());
}

// ============================================================================
// Cull dispatch
// ============================================================================

#[test]
fn test_threaded_cull_counts_only_indexed_instances() {
    let mut h = harness_with(CullingSettings {
        worker_thread_count: 2,
        threaded_cull_minimum_instances: 4,
        ..Default::default()
    });
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    let mut hidden = Vec::new();
    for i in 0..12 {
        let key = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
        h.manager.instance_set_transform(key, translation(i as f32 * 3.0, 0.0, 0.0));
        if i >= 2 {
            h.manager.instance_set_visible(key, false);
            hidden.push(key);
        }
    }
    h.manager.update();

    assert_eq!(h.manager.scenario(scenario).unwrap().instance_count(), 12);
    assert_eq!(h.manager.scenario(scenario).unwrap().instance_data().len(), 2);
    assert!(!h.manager.culls_threaded(scenario));

    let everything = Frustum::from_aabb(&AABB::new(Vec3::splat(-100.0), Vec3::splat(100.0)));
    let request = CullRequest::new(everything, u32::MAX);
    assert_eq!(h.manager.cull_scenario(scenario, &request).unwrap().geometry.len(), 2);

    for key in &hidden[..2] {
        h.manager.instance_set_visible(*key, true);
    }
    h.manager.update();
    assert!(h.manager.culls_threaded(scenario));
    assert_eq!(h.manager.cull_scenario(scenario, &request).unwrap().geometry.len(), 4);
}

#[test]
fn test_single_worker_never_culls_threaded() {
    let mut h = harness();
    let scenario = h.manager.scenario_create();
    let mesh = h.resources.add_box_mesh(Vec3::ONE);
    for i in 0..20 {
        let key = h.manager.instance_create2(InstanceKind::Mesh, mesh, scenario);
        h.manager.instance_set_transform(key, translation(i as f32 * 3.0, 0.0, 0.0));
    }
    h.manager.update();
    assert!(!h.manager.culls_threaded(scenario));
}
