/// DynamicBvh: incremental bounding-volume hierarchy over moving AABBs.
///
/// Binary tree in the style of a dynamic AABB tree:
/// - Leaves carry the payload, the tight AABB and a padded "fat" AABB.
/// - Internal nodes bound the fat AABBs of their two children.
/// - Insertion descends by surface-area cost, then AVL rotations keep the
///   height logarithmic.
///
/// Motion handling: the first insert stores the tight box. When a leaf
/// is updated with a box that still fits inside its fat box, only the
/// tight box is recorded and the tree is untouched. When the box escapes,
/// the leaf is re-inserted with a fat box snapped to a power-of-two grid
/// sized by the observed displacement, capped at `max_motion_expansion`
/// (0 disables padding). Leaves are tested with their tight box, internal
/// nodes with their fat bounds, so queries report exactly the leaves whose
/// recorded AABB overlaps the query shape.
///
/// Leaf ids are node indices. Rotations only move internal nodes, so a
/// leaf keeps its id for its whole lifetime.

use glam::{Vec3, Vec4};
use crate::camera::{classify_planes, FrustumTest};
use crate::utils::SlotPool;
use super::scene_index::{LeafId, SceneIndex, Visitor};
use super::AABB;

const NULL_NODE: u32 = u32::MAX;

/// Initial capacity of the traversal stack.
const STACK_CAPACITY: usize = 64;

struct Node<T> {
    /// Fat AABB (leaf) or union of children (branch)
    aabb: AABB,
    parent: u32,
    left: u32,
    right: u32,
    /// Leaf = 0
    height: u32,
    /// Leaf only
    tight: AABB,
    /// Leaf only
    item: Option<T>,
}

impl<T> Node<T> {
    fn leaf(aabb: AABB, item: T) -> Self {
        Self {
            aabb,
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: 0,
            tight: aabb,
            item: Some(item),
        }
    }

    fn branch(aabb: AABB, height: u32) -> Self {
        Self {
            aabb,
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height,
            tight: aabb,
            item: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Dynamic AABB tree.
pub struct DynamicBvh<T> {
    nodes: SlotPool<Node<T>>,
    root: u32,
    leaf_count: usize,
    max_motion_expansion: f32,
    /// Next node index considered by `optimize_incremental`
    optimize_cursor: u32,
}

impl<T: Copy + Send + Sync> DynamicBvh<T> {
    /// Create an empty tree.
    ///
    /// `max_motion_expansion` caps the per-side padding added to moving
    /// leaves (world units). 0 keeps every leaf tight.
    pub fn new(max_motion_expansion: f32) -> Self {
        let max_motion_expansion = if max_motion_expansion.is_finite() {
            max_motion_expansion.max(0.0)
        } else {
            0.0
        };
        Self {
            nodes: SlotPool::new(),
            root: NULL_NODE,
            leaf_count: 0,
            max_motion_expansion,
            optimize_cursor: 0,
        }
    }

    pub fn max_motion_expansion(&self) -> f32 {
        self.max_motion_expansion
    }

    /// Height of the tree (0 for a single leaf or an empty tree).
    pub fn height(&self) -> u32 {
        if self.root == NULL_NODE { 0 } else { self.nodes[self.root].height }
    }

    /// Padded AABB stored for a leaf.
    pub fn fat_aabb(&self, id: LeafId) -> Option<AABB> {
        self.leaf(id).map(|node| node.aabb)
    }

    pub fn item(&self, id: LeafId) -> Option<&T> {
        self.leaf(id).and_then(|node| node.item.as_ref())
    }

    /// Check every structural invariant (parent links, heights, bounds).
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.root == NULL_NODE {
            return if self.leaf_count == 0 {
                Ok(())
            } else {
                Err(format!("empty tree reports {} leaves", self.leaf_count))
            };
        }
        if self.nodes[self.root].parent != NULL_NODE {
            return Err("root has a parent".to_string());
        }
        let mut leaves = 0usize;
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = self.nodes.get(index).ok_or_else(|| format!("dangling node {}", index))?;
            if node.is_leaf() {
                leaves += 1;
                if node.height != 0 || node.item.is_none() {
                    return Err(format!("malformed leaf {}", index));
                }
                if !node.aabb.contains(&node.tight) {
                    return Err(format!("leaf {} fat box does not contain tight box", index));
                }
                continue;
            }
            let (left, right) = (node.left, node.right);
            for child in [left, right] {
                let child_node = self.nodes.get(child).ok_or_else(|| format!("dangling child {}", child))?;
                if child_node.parent != index {
                    return Err(format!("node {} has wrong parent", child));
                }
                if !node.aabb.contains(&child_node.aabb) {
                    return Err(format!("node {} does not contain child {}", index, child));
                }
            }
            let expected = 1 + self.nodes[left].height.max(self.nodes[right].height);
            if node.height != expected {
                return Err(format!("node {} height {} != {}", index, node.height, expected));
            }
            stack.push(left);
            stack.push(right);
        }
        if leaves != self.leaf_count {
            return Err(format!("found {} leaves, expected {}", leaves, self.leaf_count));
        }
        Ok(())
    }

    // ===== INTERNAL =====

    fn leaf(&self, id: LeafId) -> Option<&Node<T>> {
        self.nodes.get(id.0).filter(|node| node.is_leaf())
    }

    fn is_valid_leaf(&self, id: LeafId) -> bool {
        let valid = self.leaf(id).is_some();
        debug_assert!(valid, "DynamicBvh: invalid leaf id {}", id.0);
        valid
    }

    /// Fat box for a leaf that moved from `previous` to `tight`.
    fn fatten(&self, tight: &AABB, previous: &AABB) -> AABB {
        if self.max_motion_expansion <= 0.0 {
            return *tight;
        }
        let motion = (tight.center() - previous.center()).abs().max_element();
        if !(motion > 0.0) {
            return *tight;
        }
        let step = motion.log2().ceil().exp2().min(self.max_motion_expansion);
        // Finer than the box's float resolution the grid adds nothing and
        // the division in `quantized` overflows
        let resolution = tight.min.abs().max(tight.max.abs()).max_element().max(1.0) * f32::EPSILON;
        if !(step >= resolution) {
            return *tight;
        }
        tight.quantized(step).merge(tight)
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Find the best sibling by surface-area cost
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let node = &self.nodes[index];
            let (left, right) = (node.left, node.right);
            let area = node.aabb.surface_area();
            let combined_area = node.aabb.merge(&leaf_aabb).surface_area();

            // Cost of creating a new parent for this node and the leaf
            let cost = 2.0 * combined_area;
            // Minimum cost of pushing the leaf further down
            let inheritance = 2.0 * (combined_area - area);

            let cost_left = self.descend_cost(left, &leaf_aabb) + inheritance;
            let cost_right = self.descend_cost(right, &leaf_aabb) + inheritance;

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }
        let sibling = index;

        // New parent joins sibling and leaf
        let old_parent = self.nodes[sibling].parent;
        let parent_aabb = leaf_aabb.merge(&self.nodes[sibling].aabb);
        let parent_height = self.nodes[sibling].height + 1;
        let new_parent = self.nodes.insert(Node::branch(parent_aabb, parent_height));
        {
            let parent = &mut self.nodes[new_parent];
            parent.parent = old_parent;
            parent.left = sibling;
            parent.right = leaf;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent].left == sibling {
            self.nodes[old_parent].left = new_parent;
        } else {
            self.nodes[old_parent].right = new_parent;
        }

        self.refit_from(self.nodes[leaf].parent);
    }

    fn descend_cost(&self, child: u32, leaf_aabb: &AABB) -> f32 {
        let node = &self.nodes[child];
        let merged = node.aabb.merge(leaf_aabb).surface_area();
        if node.is_leaf() { merged } else { merged - node.aabb.surface_area() }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.nodes.remove(parent);
        } else {
            if self.nodes[grand_parent].left == parent {
                self.nodes[grand_parent].left = sibling;
            } else {
                self.nodes[grand_parent].right = sibling;
            }
            self.nodes[sibling].parent = grand_parent;
            self.nodes.remove(parent);
            self.refit_from(grand_parent);
        }
        self.nodes[leaf].parent = NULL_NODE;
    }

    /// Walk to the root re-balancing and refitting each ancestor.
    fn refit_from(&mut self, start: u32) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);

            let (left, right) = (self.nodes[index].left, self.nodes[index].right);
            let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
            let aabb = self.nodes[left].aabb.merge(&self.nodes[right].aabb);
            let node = &mut self.nodes[index];
            node.height = height;
            node.aabb = aabb;

            index = node.parent;
        }
    }

    /// Rotate `a` if its subtrees differ in height by more than one.
    /// Returns the index of the subtree root after rotation.
    fn balance(&mut self, a: u32) -> u32 {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }
        let b = self.nodes[a].left;
        let c = self.nodes[a].right;
        let balance = self.nodes[c].height as i64 - self.nodes[b].height as i64;

        if balance > 1 {
            self.rotate_up(a, c, b, false)
        } else if balance < -1 {
            self.rotate_up(a, b, c, true)
        } else {
            a
        }
    }

    /// Promote child `up` of `a` (the other child is `stay`).
    /// `up_is_left` tells which side of `a` `up` hangs on.
    fn rotate_up(&mut self, a: u32, up: u32, stay: u32, up_is_left: bool) -> u32 {
        let f = self.nodes[up].left;
        let g = self.nodes[up].right;

        // Swap a and up
        let a_parent = self.nodes[a].parent;
        self.nodes[up].left = a;
        self.nodes[up].parent = a_parent;
        self.nodes[a].parent = up;

        if a_parent == NULL_NODE {
            self.root = up;
        } else if self.nodes[a_parent].left == a {
            self.nodes[a_parent].left = up;
        } else {
            self.nodes[a_parent].right = up;
        }

        // The taller grandchild stays under `up`, the shorter moves to `a`
        let (keep, moved) = if self.nodes[f].height > self.nodes[g].height { (f, g) } else { (g, f) };
        self.nodes[up].right = keep;
        if up_is_left {
            self.nodes[a].left = moved;
        } else {
            self.nodes[a].right = moved;
        }
        self.nodes[moved].parent = a;

        let a_aabb = self.nodes[stay].aabb.merge(&self.nodes[moved].aabb);
        let a_height = 1 + self.nodes[stay].height.max(self.nodes[moved].height);
        self.nodes[a].aabb = a_aabb;
        self.nodes[a].height = a_height;

        let up_aabb = a_aabb.merge(&self.nodes[keep].aabb);
        let up_height = 1 + a_height.max(self.nodes[keep].height);
        self.nodes[up].aabb = up_aabb;
        self.nodes[up].height = up_height;

        up
    }

    /// Stack traversal shared by all queries.
    ///
    /// `test` sees the fat bounds of branches and the tight box of leaves.
    fn traverse(
        &self,
        mut test: impl FnMut(&AABB) -> bool,
        visitor: &mut Visitor<'_, T>,
    ) {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = Vec::with_capacity(STACK_CAPACITY);
        stack.push(self.root);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.is_leaf() {
                if test(&node.tight) {
                    if let Some(item) = node.item.as_ref() {
                        if visitor(LeafId(index), item) {
                            return;
                        }
                    }
                }
            } else if test(&node.aabb) {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }
}

/// Separating-axis check of a point cloud against a box.
fn points_separated(points: &[Vec3], aabb: &AABB) -> bool {
    if points.is_empty() {
        return false;
    }
    (0..3).any(|axis| {
        points.iter().all(|p| p[axis] < aabb.min[axis])
            || points.iter().all(|p| p[axis] > aabb.max[axis])
    })
}

impl<T: Copy + Send + Sync> SceneIndex<T> for DynamicBvh<T> {
    fn insert(&mut self, aabb: &AABB, item: T) -> LeafId {
        let leaf = self.nodes.insert(Node::leaf(*aabb, item));
        self.insert_leaf(leaf);
        self.leaf_count += 1;
        LeafId(leaf)
    }

    fn update(&mut self, id: LeafId, aabb: &AABB) -> bool {
        if !self.is_valid_leaf(id) {
            return false;
        }
        let node = &mut self.nodes[id.0];
        let previous = node.tight;
        node.tight = *aabb;
        if node.aabb.contains(aabb) {
            return false;
        }

        let fat = self.fatten(aabb, &previous);
        self.remove_leaf(id.0);
        self.nodes[id.0].aabb = fat;
        self.insert_leaf(id.0);
        true
    }

    fn remove(&mut self, id: LeafId) -> Option<T> {
        if !self.is_valid_leaf(id) {
            return None;
        }
        self.remove_leaf(id.0);
        self.leaf_count -= 1;
        self.nodes.remove(id.0).and_then(|node| node.item)
    }

    fn leaf_aabb(&self, id: LeafId) -> Option<AABB> {
        self.leaf(id).map(|node| node.tight)
    }

    fn aabb_query(&self, aabb: &AABB, visitor: &mut Visitor<'_, T>) {
        self.traverse(|node_aabb| node_aabb.intersects(aabb), visitor);
    }

    fn ray_query(&self, from: Vec3, to: Vec3, visitor: &mut Visitor<'_, T>) {
        self.traverse(|node_aabb| node_aabb.intersects_segment(from, to), visitor);
    }

    fn convex_query(&self, planes: &[Vec4], points: &[Vec3], visitor: &mut Visitor<'_, T>) {
        if self.root == NULL_NODE {
            return;
        }
        // (node, fully inside the hull)
        let mut stack: Vec<(u32, bool)> = Vec::with_capacity(STACK_CAPACITY);
        stack.push((self.root, false));
        while let Some((index, inside)) = stack.pop() {
            let node = &self.nodes[index];
            let bounds = if node.is_leaf() { &node.tight } else { &node.aabb };
            let inside = if inside {
                true
            } else {
                match classify_planes(planes, bounds) {
                    FrustumTest::Outside => continue,
                    FrustumTest::Inside => true,
                    FrustumTest::Partial if points_separated(points, bounds) => continue,
                    FrustumTest::Partial => false,
                }
            };
            if node.is_leaf() {
                if let Some(item) = node.item.as_ref() {
                    if visitor(LeafId(index), item) {
                        return;
                    }
                }
            } else {
                stack.push((node.left, inside));
                stack.push((node.right, inside));
            }
        }
    }

    fn optimize_incremental(&mut self, steps: u32) {
        if self.leaf_count < 3 {
            return;
        }
        let capacity = self.nodes.high_water_mark();
        let mut remaining = steps;
        let mut scanned = 0u32;
        while remaining > 0 && scanned < capacity {
            let index = self.optimize_cursor % capacity;
            self.optimize_cursor = (index + 1) % capacity;
            scanned += 1;

            let is_leaf = self.nodes.get(index).map_or(false, |node| node.is_leaf());
            if !is_leaf {
                continue;
            }
            self.remove_leaf(index);
            self.insert_leaf(index);
            remaining -= 1;
            scanned = 0;
        }
    }

    fn len(&self) -> usize {
        self.leaf_count
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = NULL_NODE;
        self.leaf_count = 0;
        self.optimize_cursor = 0;
    }
}

#[cfg(test)]
#[path = "dynamic_bvh_tests.rs"]
mod tests;
