//! BVH Bulk Construction and Re-Pruning
//!
//! Binned surface-area-heuristic bulk build plus the "bonsai" post-build
//! pass. Both are written against an explicit work queue / stack — no
//! recursion, matching the rest of the tree code.
//!
//! # Bulk build
//!
//! Each queue entry covers a leaf range: compute the range bounds, bin the
//! leaf centers into 8 bins per eligible axis, sweep bin prefixes and
//! suffixes accumulating `2·SA·count` costs, partition in place around the
//! cheapest split, and enqueue the two halves. Degenerate partitions fall
//! back to a midpoint split.
//!
//! # Bonsai prune
//!
//! A bottom-up rotation sweep first squeezes the existing topology; then any
//! subtree whose root area is at or below 5% of the tree root's area is
//! detached, its branch slots freed into the freelist, and its leaves
//! re-inserted through the incremental path. Upper levels stay dense while
//! cheap subtrees get rebuilt by the insertion heuristic.

use crate::bvh::{Bvh, NodeFlag, NIL};
use crate::error::PhysicsError;
use crate::hull::Aabb;
use crate::math::Vec3;
use crate::queue::Queue;

/// Number of SAH bins per axis.
const BINS: usize = 8;

/// Axes whose centroid extent is below this do not participate in binning.
const MIN_AXIS_EXTENT: f32 = 1e-2;

/// Subtrees at or below this fraction of the root's area get rebuilt.
const PRUNE_COST_FRACTION: f32 = 0.05;

#[derive(Clone, Copy, Debug, Default)]
struct BuildItem {
    aabb: Aabb,
    center: Vec3,
    payload: usize,
}

impl Bvh {
    /// Replace the tree contents with a bulk-built binned-SAH tree over
    /// `leaves`. Leaf boxes are stored as given (no fat padding); moving
    /// bodies should be re-inserted through [`Bvh::update`] afterwards.
    pub fn build(&mut self, leaves: &[(Aabb, usize)]) -> Result<(), PhysicsError> {
        if leaves.is_empty() {
            return Err(PhysicsError::EmptyPartition);
        }

        self.clear();

        let mut items: Vec<BuildItem> = leaves
            .iter()
            .map(|&(aabb, payload)| BuildItem {
                aabb,
                center: aabb.center(),
                payload,
            })
            .collect();

        let root = self.alloc_node();
        self.root = root;

        // Work queue of (slot, lo, hi) inclusive leaf ranges.
        let mut work: Queue<(u32, u32, u32)> = Queue::with_capacity(items.len() + 1);
        work.enqueue((root, 0, (items.len() - 1) as u32))?;

        while let Some((slot, lo, hi)) = work.dequeue() {
            let (lo_i, hi_i) = (lo as usize, hi as usize);

            let mut bounds = items[lo_i].aabb;
            for item in &items[lo_i + 1..=hi_i] {
                bounds = bounds.union(&item.aabb);
            }

            if lo == hi {
                let node = &mut self.nodes[slot as usize];
                node.flag = NodeFlag::Leaf;
                node.aabb = bounds;
                node.center = bounds.center();
                node.payload = items[lo_i].payload;
                continue;
            }

            let split = partition_range(&mut items[lo_i..=hi_i]) + lo_i;

            let left = self.alloc_node();
            let right = self.alloc_node();
            {
                let node = &mut self.nodes[slot as usize];
                node.flag = NodeFlag::Branch;
                node.aabb = bounds;
                node.center = bounds.center();
                node.left = left;
                node.right = right;
            }
            self.nodes[left as usize].parent = slot;
            self.nodes[right as usize].parent = slot;

            work.enqueue((left, lo, (split - 1) as u32))?;
            work.enqueue((right, split as u32, hi))?;
        }

        self.leaf_count = items.len();
        Ok(())
    }

    /// Post-build rebalancing: bottom-up rotations, then rebuild every
    /// subtree whose SAH cost is at or below 5% of the root's.
    pub fn bonsai_prune(&mut self) {
        if self.root == NIL || self.nodes[self.root as usize].flag != NodeFlag::Branch {
            return;
        }

        // Pass 1 — rotate every internal node, children before parents.
        let mut preorder = Vec::new();
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = self.nodes[index as usize];
            if node.flag == NodeFlag::Branch {
                preorder.push(index);
                stack.push(node.left);
                stack.push(node.right);
            }
        }
        for &index in preorder.iter().rev() {
            self.rotate(index);
        }

        // Pass 2 — find the prune frontier below the root.
        let threshold = PRUNE_COST_FRACTION * self.nodes[self.root as usize].aabb.surface_area();
        let mut frontier = Vec::new();
        let root_node = self.nodes[self.root as usize];
        let mut stack = vec![root_node.left, root_node.right];
        while let Some(index) = stack.pop() {
            let node = self.nodes[index as usize];
            if node.flag != NodeFlag::Branch {
                continue;
            }
            if node.aabb.surface_area() > threshold {
                stack.push(node.left);
                stack.push(node.right);
            } else {
                frontier.push(index);
            }
        }

        // Pass 3 — detach the frontier, free its branches, keep the leaf
        // slots, and re-insert them one at a time.
        let mut detached_leaves = Vec::new();
        for subtree in frontier {
            self.detach_subtree(subtree);

            let mut walk = vec![subtree];
            while let Some(index) = walk.pop() {
                let node = self.nodes[index as usize];
                match node.flag {
                    NodeFlag::Leaf => {
                        self.nodes[index as usize].parent = NIL;
                        detached_leaves.push(index);
                    }
                    NodeFlag::Branch => {
                        walk.push(node.left);
                        walk.push(node.right);
                        self.free_node(index);
                    }
                    NodeFlag::Free => {}
                }
            }
        }

        for leaf in detached_leaves {
            self.insert_leaf(leaf);
        }
    }
}

/// Choose the cheapest binned-SAH split for `items` and partition in place.
/// Returns the first index of the right half (0 < split <= len - 1).
fn partition_range(items: &mut [BuildItem]) -> usize {
    let len = items.len();
    debug_assert!(len >= 2);

    // Centroid bounds drive the binning.
    let mut c_min = items[0].center;
    let mut c_max = items[0].center;
    for item in &items[1..] {
        c_min = c_min.min(item.center);
        c_max = c_max.max(item.center);
    }
    let extent = c_max - c_min;

    let mut best: Option<(usize, usize, f32)> = None; // (axis, bin, cost)

    for axis in 0..3 {
        let (axis_min, axis_extent) = match axis {
            0 => (c_min.x, extent.x),
            1 => (c_min.y, extent.y),
            _ => (c_min.z, extent.z),
        };
        if axis_extent <= MIN_AXIS_EXTENT {
            continue;
        }

        let mut bin_bounds = [Aabb::default(); BINS];
        let mut bin_counts = [0usize; BINS];
        let mut bin_used = [false; BINS];

        for item in items.iter() {
            let bin = bin_index(item.center, axis, axis_min, axis_extent);
            bin_counts[bin] += 1;
            bin_bounds[bin] = if bin_used[bin] {
                bin_bounds[bin].union(&item.aabb)
            } else {
                item.aabb
            };
            bin_used[bin] = true;
        }

        // Left-to-right prefix sweep.
        let mut left_area = [0.0f32; BINS];
        let mut left_count = [0usize; BINS];
        let mut acc: Option<Aabb> = None;
        let mut count = 0;
        for k in 0..BINS {
            if bin_used[k] {
                acc = Some(match acc {
                    Some(a) => a.union(&bin_bounds[k]),
                    None => bin_bounds[k],
                });
            }
            count += bin_counts[k];
            left_area[k] = acc.map_or(0.0, |a| a.surface_area());
            left_count[k] = count;
        }

        // Right-to-left suffix sweep, scoring each split as it forms.
        let mut acc: Option<Aabb> = None;
        let mut count = 0;
        for k in (1..BINS).rev() {
            if bin_used[k] {
                acc = Some(match acc {
                    Some(a) => a.union(&bin_bounds[k]),
                    None => bin_bounds[k],
                });
            }
            count += bin_counts[k];

            let nl = left_count[k - 1];
            let nr = count;
            if nl == 0 || nr == 0 {
                continue;
            }
            let cost = 2.0 * left_area[k - 1] * nl as f32
                + 2.0 * acc.map_or(0.0, |a| a.surface_area()) * nr as f32;
            if best.map_or(true, |(_, _, c)| cost < c) {
                best = Some((axis, k - 1, cost));
            }
        }
    }

    let Some((axis, split_bin, _)) = best else {
        // No axis had usable extent: midpoint split in current order.
        return len / 2;
    };

    let (axis_min, axis_extent) = match axis {
        0 => (c_min.x, extent.x),
        1 => (c_min.y, extent.y),
        _ => (c_min.z, extent.z),
    };

    // Two-pointer partition: bins <= split_bin to the left.
    let mut i = 0usize;
    let mut j = len - 1;
    while i <= j {
        if bin_index(items[i].center, axis, axis_min, axis_extent) <= split_bin {
            i += 1;
        } else {
            items.swap(i, j);
            if j == 0 {
                break;
            }
            j -= 1;
        }
    }

    if i == 0 || i >= len {
        // Degenerate partition: midpoint fallback.
        len / 2
    } else {
        i
    }
}

/// Bin index of a center projection along a world axis.
#[inline]
fn bin_index(center: Vec3, axis: usize, axis_min: f32, axis_extent: f32) -> usize {
    let c = match axis {
        0 => center.x,
        1 => center.y,
        _ => center.z,
    };
    let t = (c - axis_min) * (BINS - 1) as f32 / axis_extent;
    (t as usize).min(BINS - 1)
}
