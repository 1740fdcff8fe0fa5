//! Randomized integration tests for the culling core
//!
//! Seeded random edit sequences are applied to a SceneManager; after every
//! flush the index and the pairings are compared against brute force.
//!
//! Run with: cargo test --test property_integration_tests

use galaxy_3d_culling::galaxy3d::{CullingSettings, SceneManager};
use galaxy_3d_culling::backend::mock::{MockBackend, MockResources};
use galaxy_3d_culling::backend::LightInfo;
use galaxy_3d_culling::camera::Frustum;
use galaxy_3d_culling::glam::{Mat4, Vec3};
use galaxy_3d_culling::scene::{CullRequest, InstanceKey, InstanceKind, ScenarioKey, AABB};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// FIXTURE
// ============================================================================

struct RandomScene {
    manager: SceneManager,
    resources: Arc<MockResources>,
    scenario: ScenarioKey,
    meshes: Vec<InstanceKey>,
    lights: Vec<InstanceKey>,
}

fn random_point(rng: &mut ChaCha8Rng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
    )
}

impl RandomScene {
    fn new(settings: CullingSettings) -> Self {
        let backend = Arc::new(Mutex::new(MockBackend::new()));
        let resources = Arc::new(MockResources::new());
        let mut manager = SceneManager::new(settings, backend, resources.clone()).unwrap();
        let scenario = manager.scenario_create();
        Self { manager, resources, scenario, meshes: Vec::new(), lights: Vec::new() }
    }

    fn populate(&mut self, rng: &mut ChaCha8Rng, meshes: usize, lights: usize) {
        for _ in 0..meshes {
            let half = Vec3::new(rng.gen_range(0.2..2.0), rng.gen_range(0.2..2.0), rng.gen_range(0.2..2.0));
            let mesh = self.resources.add_box_mesh(half);
            let key = self.manager.instance_create2(InstanceKind::Mesh, mesh, self.scenario);
            self.manager.instance_set_transform(key, Mat4::from_translation(random_point(rng, 40.0)));
            self.manager.instance_attach_object_instance_id(key, self.meshes.len() as u64 + 1);
            self.meshes.push(key);
        }
        for _ in 0..lights {
            let light = self.resources.add_light(LightInfo { range: rng.gen_range(1.0..8.0), ..Default::default() });
            let key = self.manager.instance_create2(InstanceKind::Light, light, self.scenario);
            self.manager.instance_set_transform(key, Mat4::from_translation(random_point(rng, 40.0)));
            self.lights.push(key);
        }
    }

    /// Move, hide or show a random instance.
    fn random_edit(&mut self, rng: &mut ChaCha8Rng) {
        let key = if rng.gen_bool(0.7) {
            self.meshes[rng.gen_range(0..self.meshes.len())]
        } else {
            self.lights[rng.gen_range(0..self.lights.len())]
        };
        match rng.gen_range(0..4) {
            0 => {
                let visible = self.manager.instance(key).unwrap().visible();
                self.manager.instance_set_visible(key, !visible);
            }
            1 => {
                let transform = *self.manager.instance(key).unwrap().transform();
                let nudge = Mat4::from_translation(random_point(rng, 0.5));
                self.manager.instance_set_transform(key, nudge * transform);
            }
            _ => {
                self.manager.instance_set_transform(key, Mat4::from_translation(random_point(rng, 40.0)));
            }
        }
    }

    fn world_box(&self, key: InstanceKey) -> Option<AABB> {
        let instance = self.manager.instance(key)?;
        instance.is_indexed().then(|| *instance.transformed_aabb())
    }

    fn object_ids_overlapping(&self, aabb: &AABB) -> BTreeSet<u64> {
        self.meshes
            .iter()
            .filter(|key| self.world_box(**key).map_or(false, |b| b.intersects(aabb)))
            .map(|key| self.manager.instance(*key).unwrap().object_id())
            .collect()
    }

    fn assert_pairing_matches_overlap(&self) {
        for mesh in &self.meshes {
            let paired = &self.manager.instance(*mesh).unwrap().payload().geometry().unwrap().lights;
            for light in &self.lights {
                let overlapping = match (self.world_box(*mesh), self.world_box(*light)) {
                    (Some(a), Some(b)) => a.intersects(&b),
                    _ => false,
                };
                assert_eq!(paired.contains(light), overlapping, "mesh {:?} / light {:?}", mesh, light);

                let back = self.manager.instance(*light).unwrap().payload().light().unwrap();
                assert_eq!(back.geometries.contains(mesh), paired.contains(light));
            }
        }
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

#[test]
fn test_integration_pairing_tracks_overlap_under_random_edits() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let mut scene = RandomScene::new(CullingSettings { worker_thread_count: 1, ..Default::default() });
    scene.populate(&mut rng, 120, 25);
    scene.manager.update();
    scene.assert_pairing_matches_overlap();

    for _ in 0..30 {
        for _ in 0..rng.gen_range(1..20) {
            scene.random_edit(&mut rng);
        }
        scene.manager.update();
        scene.assert_pairing_matches_overlap();
    }
}

#[test]
fn test_integration_aabb_query_matches_brute_force() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut scene = RandomScene::new(CullingSettings { worker_thread_count: 1, ..Default::default() });
    scene.populate(&mut rng, 300, 4);
    scene.manager.update();

    for round in 0..40 {
        for _ in 0..10 {
            scene.random_edit(&mut rng);
        }
        scene.manager.update();

        let center = random_point(&mut rng, 40.0);
        let query = AABB::from_center_half_extents(center, Vec3::splat(rng.gen_range(1.0..15.0)));
        let found: BTreeSet<u64> = scene.manager.instances_cull_aabb(&query, scene.scenario).into_iter().collect();
        assert_eq!(found, scene.object_ids_overlapping(&query), "round {}", round);
    }
}

#[test]
fn test_integration_dirty_flush_converges() {
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let mut scene = RandomScene::new(CullingSettings { worker_thread_count: 1, ..Default::default() });
    scene.populate(&mut rng, 60, 10);

    for _ in 0..50 {
        scene.random_edit(&mut rng);
    }
    assert!(scene.manager.dirty_count() > 0);
    scene.manager.update();
    assert_eq!(scene.manager.dirty_count(), 0);

    let keys: Vec<InstanceKey> = scene.meshes.iter().chain(&scene.lights).copied().collect();
    assert!(keys.iter().all(|key| !scene.manager.instance(*key).unwrap().is_dirty()));

    // A flush with nothing queued changes nothing
    let versions: Vec<Option<u64>> = keys.iter().map(|key| scene.manager.instance_version(*key)).collect();
    let stats = scene.manager.scenario(scene.scenario).unwrap().pairing_stats();
    scene.manager.update();
    let after: Vec<Option<u64>> = keys.iter().map(|key| scene.manager.instance_version(*key)).collect();
    assert_eq!(versions, after);
    assert_eq!(scene.manager.scenario(scene.scenario).unwrap().pairing_stats(), stats);
}

#[test]
fn test_integration_parallel_and_serial_managers_agree() {
    let settings = [
        CullingSettings { worker_thread_count: 1, ..Default::default() },
        CullingSettings { worker_thread_count: 3, threaded_cull_minimum_instances: 8, ..Default::default() },
    ];
    let mut scenes: Vec<RandomScene> = settings.into_iter().map(RandomScene::new).collect();
    for scene in &mut scenes {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        scene.populate(&mut rng, 500, 20);
        scene.manager.update();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(77);
    for _ in 0..10 {
        let region = AABB::from_center_half_extents(random_point(&mut rng, 30.0), Vec3::splat(12.0));
        let mut request = CullRequest::new(Frustum::from_aabb(&region), u32::MAX);
        request.cascades = vec![Frustum::from_aabb(&region.grown(5.0))];

        let serial_scenario = scenes[0].scenario;
        let serial = scenes[0].manager.cull_scenario(serial_scenario, &request).unwrap();
        let threaded_scenario = scenes[1].scenario;
        let threaded = scenes[1].manager.cull_scenario(threaded_scenario, &request).unwrap();
        // Both mocks hand out the same handles for the same edit sequence
        assert_eq!(serial.sorted(), threaded.sorted());
    }
}
