use super::*;
use slotmap::SlotMap;
use crate::backend::mock::MockBackend;

fn keys(count: usize) -> Vec<InstanceKey> {
    let mut map: SlotMap<InstanceKey, ()> = SlotMap::with_key();
    (0..count).map(|_| map.insert(())).collect()
}

// ============================================================================
// DirtyQueue
// ============================================================================

#[test]
fn test_push_is_idempotent() {
    let keys = keys(2);
    let mut queue = DirtyQueue::new();
    assert!(queue.push(keys[0]));
    assert!(!queue.push(keys[0]));
    assert!(queue.push(keys[1]));
    assert_eq!(queue.len(), 2);
    assert!(queue.contains(keys[0]));
}

#[test]
fn test_take_keeps_first_push_order_and_empties() {
    let keys = keys(3);
    let mut queue = DirtyQueue::new();
    queue.push(keys[2]);
    queue.push(keys[0]);
    queue.push(keys[2]);
    queue.push(keys[1]);

    assert_eq!(queue.take(), vec![keys[2], keys[0], keys[1]]);
    assert!(queue.is_empty());
    assert!(!queue.contains(keys[2]));
    // Queueable again after a take
    assert!(queue.push(keys[2]));
}

#[test]
fn test_remove_drops_key() {
    let keys = keys(2);
    let mut queue = DirtyQueue::new();
    queue.push(keys[0]);
    queue.push(keys[1]);
    queue.remove(keys[0]);
    queue.remove(keys[0]);
    assert_eq!(queue.take(), vec![keys[1]]);
}

#[test]
fn test_removing_most_of_a_large_queue() {
    let keys = keys(5000);
    let mut queue = DirtyQueue::new();
    for key in &keys {
        queue.push(*key);
    }
    for (i, key) in keys.iter().enumerate() {
        if i % 1000 != 0 {
            queue.remove(*key);
        }
    }
    assert_eq!(queue.len(), 5);
    assert!(queue.backlog() <= 2 * queue.len() + DIRTY_QUEUE_SLACK);
    assert_eq!(queue.take(), vec![keys[0], keys[1000], keys[2000], keys[3000], keys[4000]]);
    assert!(queue.is_empty());
    assert_eq!(queue.backlog(), 0);
}

#[test]
fn test_removed_key_can_be_queued_again_once() {
    let keys = keys(3);
    let mut queue = DirtyQueue::new();
    queue.push(keys[0]);
    queue.push(keys[1]);
    queue.remove(keys[0]);
    assert_eq!(queue.len(), 1);
    assert!(!queue.contains(keys[0]));

    assert!(queue.push(keys[0]));
    queue.push(keys[2]);
    assert_eq!(queue.len(), 3);
    let taken = queue.take();
    assert_eq!(taken.len(), 3);
    assert_eq!(taken.iter().filter(|key| **key == keys[0]).count(), 1);
}

// ============================================================================
// Helpers
// ============================================================================

#[test]
fn test_backend_instance_per_kind() {
    let mut backend = MockBackend::new();
    let base = ResourceId(5);
    assert_eq!(create_backend_instance(&mut backend, InstanceKind::None, base), None);
    for kind in [InstanceKind::Mesh, InstanceKind::MultiMesh, InstanceKind::Particles] {
        assert!(create_backend_instance(&mut backend, kind, base).is_some());
    }
    create_backend_instance(&mut backend, InstanceKind::Light, base);
    create_backend_instance(&mut backend, InstanceKind::Lightmap, base);

    assert_eq!(backend.call_count("geometry_instance_create"), 3);
    assert_eq!(backend.call_count("light_instance_create"), 1);
    assert_eq!(backend.call_count("lightmap_instance_create"), 1);
}

#[test]
fn test_render_flags_follow_payload() {
    let mut mesh = Instance {
        kind: InstanceKind::Mesh,
        payload: Payload::for_kind(InstanceKind::Mesh),
        cast_shadows: ShadowCastingSetting::ShadowsOnly,
        skeleton: Some(ResourceId(3)),
        ..Default::default()
    };
    if let Some(geometry) = mesh.payload.geometry_mut() {
        geometry.can_cast_shadows = true;
    }
    assert_eq!(
        render_flags(&mesh),
        InstanceFlags::CAST_SHADOWS | InstanceFlags::SHADOWS_ONLY | InstanceFlags::SKINNED
    );

    let mut light = Instance {
        kind: InstanceKind::Light,
        payload: Payload::for_kind(InstanceKind::Light),
        ..Default::default()
    };
    assert_eq!(render_flags(&light), InstanceFlags::empty());
    if let Some(payload) = light.payload.light_mut() {
        payload.shadow_enabled = true;
        payload.light_type = LightType::Directional;
    }
    assert_eq!(render_flags(&light), InstanceFlags::LIGHT_SHADOWED);
    assert!(is_directional(&light));
}
