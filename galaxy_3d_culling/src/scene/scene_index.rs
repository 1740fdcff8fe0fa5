/// Spatial acceleration structures for scene queries.
///
/// A SceneIndex stores world-space AABBs tagged with a small payload
/// (an `InstanceKey` inside a scenario) and answers overlap queries.
/// Each scenario owns two of them: one for geometry, one for volumes.
///
/// The index never owns instance memory: the payload is a weak,
/// generation-checked key and the returned `LeafId` is stored back on
/// the instance.

use glam::{Vec3, Vec4};
use super::AABB;

/// Opaque identifier of one leaf, valid until `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(pub(crate) u32);

impl LeafId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Query visitor. Returning `true` stops the whole query.
pub type Visitor<'a, T> = dyn FnMut(LeafId, &T) -> bool + 'a;

/// Trait for spatial indexing of scene instances.
///
/// Queries on an empty index visit nothing. `update`/`remove` with an
/// unknown id is a programmer error: it asserts in debug builds and is
/// ignored in release builds.
pub trait SceneIndex<T>: Send + Sync {
    /// Insert a leaf with its world-space AABB.
    fn insert(&mut self, aabb: &AABB, item: T) -> LeafId;

    /// Move a leaf. Returns `true` if the tree had to be restructured.
    fn update(&mut self, id: LeafId, aabb: &AABB) -> bool;

    /// Remove a leaf, returning its payload.
    fn remove(&mut self, id: LeafId) -> Option<T>;

    /// Tight AABB last recorded for a leaf.
    fn leaf_aabb(&self, id: LeafId) -> Option<AABB>;

    /// Visit every leaf whose AABB overlaps `aabb`.
    fn aabb_query(&self, aabb: &AABB, visitor: &mut Visitor<'_, T>);

    /// Visit every leaf whose AABB is crossed by the segment `from..to`.
    fn ray_query(&self, from: Vec3, to: Vec3, visitor: &mut Visitor<'_, T>);

    /// Visit every leaf overlapping the convex hull given by inward
    /// `planes` and, optionally, its corner `points`.
    fn convex_query(&self, planes: &[Vec4], points: &[Vec3], visitor: &mut Visitor<'_, T>);

    /// Perform up to `steps` tree-improvement operations.
    fn optimize_incremental(&mut self, steps: u32);

    /// Number of leaves
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every leaf.
    fn clear(&mut self);
}
