//! Dynamic Bounding-Volume Hierarchy
//!
//! Binary AABB tree over slab-allocated nodes for broadphase collision
//! queries. Nodes live in a slab indexed by stable 1-based slots; slot 0 is
//! the nil sentinel and freed slots chain into an intrusive freelist through
//! the `next_free` field.
//!
//! # Features
//!
//! - **Fat AABBs**: leaves store boxes expanded by a constant pad so minor
//!   body motion does not require tree surgery
//! - **Incremental insert**: Catto branch-and-bound sibling search, refitting
//!   and rotating up the ancestor chain
//! - **Rotations**: O(1) sibling-swap improvement steps driven by the
//!   surface-area heuristic
//! - **Queue-driven traversal**: `query` and `trace` run breadth-first over a
//!   caller-owned reusable ring queue, never touching the heap
//!
//! The bulk binned-SAH builder and the bonsai re-pruning pass live in
//! [`crate::bvh_build`].

use crate::error::PhysicsError;
use crate::hull::Aabb;
use crate::math::Vec3;
use crate::queue::Queue;

/// Nil slot sentinel. Live slots are 1-based.
pub const NIL: u32 = 0;

/// Default fat-AABB padding, added on every side of a dynamic leaf.
pub const AABB_PADDING: f32 = 0.5;

/// Node role in the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeFlag {
    /// Slot is on the freelist
    #[default]
    Free = 0,
    /// Internal node with two children
    Branch = 1,
    /// Leaf holding a body payload
    Leaf = 2,
}

/// Tagged slab node.
#[derive(Clone, Copy, Debug)]
pub struct BvhNode {
    /// Role tag
    pub flag: NodeFlag,
    /// World AABB (fat for dynamic leaves)
    pub aabb: Aabb,
    /// AABB center, kept in sync with `aabb`
    pub center: Vec3,
    /// Left child slot (NIL for leaves)
    pub left: u32,
    /// Right child slot (NIL for leaves)
    pub right: u32,
    /// Parent slot (NIL for the root)
    pub parent: u32,
    /// Next slot in the freelist chain (NIL terminates)
    pub next_free: u32,
    /// Body reference carried by leaves
    pub payload: usize,
}

impl Default for BvhNode {
    fn default() -> Self {
        Self {
            flag: NodeFlag::Free,
            aabb: Aabb::new(Vec3::ZERO, Vec3::ZERO),
            center: Vec3::ZERO,
            left: NIL,
            right: NIL,
            parent: NIL,
            next_free: NIL,
            payload: usize::MAX,
        }
    }
}

/// A leaf reported by [`Bvh::trace`].
#[derive(Clone, Copy, Debug)]
pub struct TraceHit {
    /// Leaf payload (body reference)
    pub payload: usize,
    /// Entry parameter along the swept segment, in [0, 1]
    pub t: f32,
}

/// Dynamic AABB tree.
#[derive(Clone, Debug)]
pub struct Bvh {
    pub(crate) nodes: Vec<BvhNode>,
    pub(crate) root: u32,
    pub(crate) free_head: u32,
    pub(crate) leaf_count: usize,
}

impl Bvh {
    /// Create an empty tree. Slot 0 is reserved as the nil sentinel.
    pub fn new() -> Self {
        Self {
            nodes: vec![BvhNode::default()],
            root: NIL,
            free_head: NIL,
            leaf_count: 0,
        }
    }

    /// Root slot (NIL when empty)
    #[inline]
    pub fn root(&self) -> u32 {
        self.root
    }

    /// Number of live leaves
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Total slots in the slab, including slot 0 and freed slots
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stored (possibly fat) AABB of a leaf
    #[inline]
    pub fn leaf_aabb(&self, leaf: u32) -> Aabb {
        self.nodes[leaf as usize].aabb
    }

    /// Remove every node and reset the slab.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(BvhNode::default());
        self.root = NIL;
        self.free_head = NIL;
        self.leaf_count = 0;
    }

    // ========================================================================
    // Slab allocation
    // ========================================================================

    pub(crate) fn alloc_node(&mut self) -> u32 {
        if self.free_head != NIL {
            let slot = self.free_head;
            self.free_head = self.nodes[slot as usize].next_free;
            self.nodes[slot as usize] = BvhNode::default();
            slot
        } else {
            self.nodes.push(BvhNode::default());
            (self.nodes.len() - 1) as u32
        }
    }

    pub(crate) fn free_node(&mut self, slot: u32) {
        let node = &mut self.nodes[slot as usize];
        node.flag = NodeFlag::Free;
        node.left = NIL;
        node.right = NIL;
        node.parent = NIL;
        node.payload = usize::MAX;
        node.next_free = self.free_head;
        self.free_head = slot;
    }

    // ========================================================================
    // Insert / remove / update
    // ========================================================================

    /// Insert a leaf for `payload`, padding the box by `pad` on every side.
    /// Returns the stable leaf slot.
    pub fn insert(&mut self, aabb: Aabb, payload: usize, pad: f32) -> u32 {
        let leaf = self.alloc_node();
        let fat = aabb.expanded(pad);
        {
            let node = &mut self.nodes[leaf as usize];
            node.flag = NodeFlag::Leaf;
            node.aabb = fat;
            node.center = fat.center();
            node.payload = payload;
        }
        self.insert_leaf(leaf);
        self.leaf_count += 1;
        leaf
    }

    /// Remove a leaf and return its slot (and its parent's) to the freelist.
    pub fn remove(&mut self, leaf: u32) {
        self.detach_leaf(leaf);
        self.free_node(leaf);
        self.leaf_count -= 1;
    }

    /// Re-home a leaf whose body moved. Returns true when the tree changed.
    ///
    /// The leaf is only re-inserted when the tight AABB has escaped its
    /// stored fat AABB.
    pub fn update(&mut self, leaf: u32, tight: Aabb, pad: f32) -> bool {
        if self.nodes[leaf as usize].aabb.contains(&tight) {
            return false;
        }

        self.detach_leaf(leaf);
        let fat = tight.expanded(pad);
        let node = &mut self.nodes[leaf as usize];
        node.aabb = fat;
        node.center = fat.center();
        self.insert_leaf(leaf);
        true
    }

    /// Attach a prepared leaf slot using Catto's branch-and-bound descent:
    /// walk toward the cheaper child while its inherited-growth cost beats
    /// attaching directly at the current node.
    pub(crate) fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NIL {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NIL;
            return;
        }

        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = self.root;

        while self.nodes[index as usize].flag == NodeFlag::Branch {
            let node = self.nodes[index as usize];
            let area = node.aabb.surface_area();
            let combined = node.aabb.union(&leaf_aabb).surface_area();

            // Attach here: a new branch wrapping this node and the leaf.
            let cost = 2.0 * combined;
            // Growing this node's box is inherited by every descent.
            let inheritance = 2.0 * (combined - area);

            let cost_left = self.child_cost(node.left, &leaf_aabb) + inheritance;
            let cost_right = self.child_cost(node.right, &leaf_aabb) + inheritance;

            if cost < cost_left && cost < cost_right {
                break;
            }

            index = if cost_left < cost_right {
                node.left
            } else {
                node.right
            };
        }

        // Wrap the chosen sibling and the leaf in a new branch.
        let sibling = index;
        let old_parent = self.nodes[sibling as usize].parent;
        let branch = self.alloc_node();
        {
            let union = self.nodes[sibling as usize].aabb.union(&leaf_aabb);
            let node = &mut self.nodes[branch as usize];
            node.flag = NodeFlag::Branch;
            node.aabb = union;
            node.center = union.center();
            node.parent = old_parent;
            node.left = sibling;
            node.right = leaf;
        }

        if old_parent == NIL {
            self.root = branch;
        } else if self.nodes[old_parent as usize].left == sibling {
            self.nodes[old_parent as usize].left = branch;
        } else {
            self.nodes[old_parent as usize].right = branch;
        }
        self.nodes[sibling as usize].parent = branch;
        self.nodes[leaf as usize].parent = branch;

        // Refit and locally improve the ancestor chain.
        let mut walk = branch;
        while walk != NIL {
            self.refit_node(walk);
            self.rotate(walk);
            walk = self.nodes[walk as usize].parent;
        }
    }

    /// Cost of pushing the leaf into `child`: direct union for leaves, union
    /// growth for branches (the branch's own area is re-spent deeper down).
    fn child_cost(&self, child: u32, leaf_aabb: &Aabb) -> f32 {
        let node = &self.nodes[child as usize];
        let combined = node.aabb.union(leaf_aabb).surface_area();
        match node.flag {
            NodeFlag::Leaf => 2.0 * combined,
            _ => 2.0 * (combined - node.aabb.surface_area()),
        }
    }

    /// Detach a leaf, promoting its sibling into the parent's slot.
    fn detach_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NIL;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == leaf {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grandparent == NIL {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NIL;
        } else {
            if self.nodes[grandparent as usize].left == parent {
                self.nodes[grandparent as usize].left = sibling;
            } else {
                self.nodes[grandparent as usize].right = sibling;
            }
            self.nodes[sibling as usize].parent = grandparent;

            let mut walk = grandparent;
            while walk != NIL {
                self.refit_node(walk);
                walk = self.nodes[walk as usize].parent;
            }
        }

        self.free_node(parent);
        self.nodes[leaf as usize].parent = NIL;
    }

    /// Detach an internal subtree the same way a leaf is detached. The
    /// subtree's nodes keep their links; the caller owns their fate.
    pub(crate) fn detach_subtree(&mut self, node: u32) {
        if node == self.root {
            self.root = NIL;
            return;
        }

        let parent = self.nodes[node as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == node {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grandparent == NIL {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NIL;
        } else {
            if self.nodes[grandparent as usize].left == parent {
                self.nodes[grandparent as usize].left = sibling;
            } else {
                self.nodes[grandparent as usize].right = sibling;
            }
            self.nodes[sibling as usize].parent = grandparent;

            let mut walk = grandparent;
            while walk != NIL {
                self.refit_node(walk);
                walk = self.nodes[walk as usize].parent;
            }
        }

        self.free_node(parent);
        self.nodes[node as usize].parent = NIL;
    }

    /// Recompute a branch's AABB and center from its children.
    pub(crate) fn refit_node(&mut self, index: u32) {
        let node = self.nodes[index as usize];
        if node.flag != NodeFlag::Branch {
            return;
        }
        let union = self.nodes[node.left as usize]
            .aabb
            .union(&self.nodes[node.right as usize].aabb);
        let n = &mut self.nodes[index as usize];
        n.aabb = union;
        n.center = union.center();
    }

    // ========================================================================
    // Rotation
    // ========================================================================

    /// Single O(1) improvement step at branch `x` (no-op at the root or on
    /// leaves): compare the sibling against `x`'s children and swap it with
    /// whichever child yields the smaller union area.
    pub(crate) fn rotate(&mut self, x: u32) {
        let node = self.nodes[x as usize];
        if node.flag != NodeFlag::Branch || node.parent == NIL {
            return;
        }

        let parent = node.parent;
        let sibling = if self.nodes[parent as usize].left == x {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        let sib_aabb = self.nodes[sibling as usize].aabb;
        let left_aabb = self.nodes[node.left as usize].aabb;
        let right_aabb = self.nodes[node.right as usize].aabb;

        let sa_lr = left_aabb.union(&right_aabb).surface_area();
        let sa_sl = sib_aabb.union(&left_aabb).surface_area();
        let sa_sr = sib_aabb.union(&right_aabb).surface_area();

        if sa_lr <= sa_sl && sa_lr <= sa_sr {
            return; // The current pairing is already the tightest.
        }

        // Swap the sibling with the child not in the winning pair.
        let child = if sa_sl < sa_sr { node.right } else { node.left };
        self.swap_with_sibling(parent, sibling, x, child);
        self.refit_node(x);
    }

    /// Exchange `sibling` (a child of `parent`) with `child` (a child of `x`).
    fn swap_with_sibling(&mut self, parent: u32, sibling: u32, x: u32, child: u32) {
        if self.nodes[parent as usize].left == sibling {
            self.nodes[parent as usize].left = child;
        } else {
            self.nodes[parent as usize].right = child;
        }
        self.nodes[child as usize].parent = parent;

        if self.nodes[x as usize].left == child {
            self.nodes[x as usize].left = sibling;
        } else {
            self.nodes[x as usize].right = sibling;
        }
        self.nodes[sibling as usize].parent = x;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Report every leaf whose AABB overlaps `[min, max]`, breadth-first.
    pub fn query(
        &self,
        queue: &mut Queue<u32>,
        min: Vec3,
        max: Vec3,
        out: &mut Vec<usize>,
    ) -> Result<(), PhysicsError> {
        let proxy = Aabb::new(min, max);
        if self.root == NIL {
            return Ok(());
        }

        queue.clear();
        queue.enqueue(self.root)?;

        while let Some(index) = queue.dequeue() {
            let node = &self.nodes[index as usize];
            if !node.aabb.intersects(&proxy) {
                continue;
            }
            match node.flag {
                NodeFlag::Leaf => out.push(node.payload),
                NodeFlag::Branch => {
                    queue.enqueue(node.left)?;
                    queue.enqueue(node.right)?;
                }
                NodeFlag::Free => {}
            }
        }

        Ok(())
    }

    /// Sweep a box of extents `size` from `origin` along `dir` (the full
    /// displacement, t in [0, 1]) and report entered leaves sorted by entry
    /// time. Each AABB is expanded by half the swept size; a slab test with
    /// `inv_dir` produces the entry/exit interval.
    pub fn trace(
        &self,
        queue: &mut Queue<u32>,
        origin: Vec3,
        dir: Vec3,
        size: Vec3,
        out: &mut Vec<TraceHit>,
    ) -> Result<(), PhysicsError> {
        if self.root == NIL {
            return Ok(());
        }

        let half = size * 0.5;
        queue.clear();
        queue.enqueue(self.root)?;

        while let Some(index) = queue.dequeue() {
            let node = &self.nodes[index as usize];
            let expanded = Aabb::new(node.aabb.min - half, node.aabb.max + half);
            let Some((t_min, t_max)) = slab_interval(&expanded, origin, dir) else {
                continue;
            };
            // The segment must reach the box inside [0, 1].
            if t_max < 0.0 || t_min > 1.0 {
                continue;
            }
            match node.flag {
                NodeFlag::Leaf => {
                    if t_min >= 0.0 && t_min <= 1.0 && t_min <= t_max {
                        out.push(TraceHit {
                            payload: node.payload,
                            t: t_min,
                        });
                    }
                }
                NodeFlag::Branch => {
                    queue.enqueue(node.left)?;
                    queue.enqueue(node.right)?;
                }
                NodeFlag::Free => {}
            }
        }

        out.sort_by(|a, b| a.t.total_cmp(&b.t));
        Ok(())
    }

    /// Visit every live leaf as `(slot, payload)`.
    pub fn for_each_leaf<F: FnMut(u32, usize)>(&self, mut f: F) {
        if self.root == NIL {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            match node.flag {
                NodeFlag::Leaf => f(index, node.payload),
                NodeFlag::Branch => {
                    stack.push(node.left);
                    stack.push(node.right);
                }
                NodeFlag::Free => {}
            }
        }
    }

    /// Visit every live node, branches and leaves alike.
    pub fn for_each_node<F: FnMut(&BvhNode)>(&self, mut f: F) {
        if self.root == NIL {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            f(node);
            if node.flag == NodeFlag::Branch {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    // ========================================================================
    // Structure validation (used by the invariant tests)
    // ========================================================================

    /// Walk the whole structure checking the tree invariants: child AABB
    /// containment, parent-link consistency, bounded ancestor chains, and
    /// freelist/live disjointness.
    pub fn validate(&self) -> Result<(), &'static str> {
        // Freelist slots must be flagged Free and never reachable as live.
        let mut on_freelist = vec![false; self.nodes.len()];
        let mut cursor = self.free_head;
        let mut hops = 0;
        while cursor != NIL {
            if self.nodes[cursor as usize].flag != NodeFlag::Free {
                return Err("freelist slot not flagged Free");
            }
            if on_freelist[cursor as usize] {
                return Err("freelist cycle");
            }
            on_freelist[cursor as usize] = true;
            cursor = self.nodes[cursor as usize].next_free;
            hops += 1;
            if hops > self.nodes.len() {
                return Err("freelist longer than slab");
            }
        }

        if self.root == NIL {
            return Ok(());
        }
        if self.nodes[self.root as usize].parent != NIL {
            return Err("root has a parent");
        }

        let mut stack = vec![self.root];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(index) = stack.pop() {
            if seen[index as usize] {
                return Err("node reachable twice (cycle)");
            }
            seen[index as usize] = true;
            if on_freelist[index as usize] {
                return Err("live node on freelist");
            }

            let node = &self.nodes[index as usize];
            match node.flag {
                NodeFlag::Free => return Err("free node reachable from root"),
                NodeFlag::Leaf => {}
                NodeFlag::Branch => {
                    for child in [node.left, node.right] {
                        if child == NIL {
                            return Err("branch with missing child");
                        }
                        if self.nodes[child as usize].parent != index {
                            return Err("child parent link broken");
                        }
                        if !node.aabb.contains(&self.nodes[child as usize].aabb) {
                            return Err("child AABB escapes parent");
                        }
                        stack.push(child);
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for Bvh {
    fn default() -> Self {
        Self::new()
    }
}

/// Slab test: entry/exit parameters of a segment `origin + dir * t` against
/// an AABB. `None` when the line misses entirely. Axes with zero direction
/// require the origin inside that slab.
fn slab_interval(aabb: &Aabb, origin: Vec3, dir: Vec3) -> Option<(f32, f32)> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let (o, d, lo, hi) = match axis {
            0 => (origin.x, dir.x, aabb.min.x, aabb.max.x),
            1 => (origin.y, dir.y, aabb.min.y, aabb.max.y),
            _ => (origin.z, dir.z, aabb.min.z, aabb.max.z),
        };

        if d.abs() <= f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (lo - o) * inv;
        let mut t1 = (hi - o) * inv;
        if t0 > t1 {
            core::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    Some((t_min, t_max))
}
