//! PVS topology traversal: mark the BSP tree from the view leaf's cluster
//! bitmask, then descend pruning by `ViewMark` and the frustum (§4.3).

use glam::Vec3;

use crate::geometry::Plane;
use crate::world::bsp::Terminal;
use crate::world::types::LeafId;
use crate::world::World;

use super::cull::{cull_area, initial_mask, VisMasks, VisResult};
use super::frustum::cull_aabb;

fn terminal_of(child: i32) -> Option<Terminal> {
    if child == 0 {
        Some(Terminal::Solid)
    } else if child < 0 {
        Some(Terminal::Leaf(LeafId((-1 - child) as u32)))
    } else {
        None
    }
}

/// Re-mark every leaf reachable (per the decompressed PVS row for `from`)
/// and their ancestor chains with `tree_mark`, stopping a chain walk the
/// instant an ancestor is already marked current.
pub fn mark_visible_tree(world: &World, from: LeafId, tree_mark: u32) {
    let Some(visdata) = world.leaf_visdata(from) else {
        // No PVS data: treat every leaf as potentially visible.
        for leaf in &world.bsp.leafs {
            leaf.view_mark.set(tree_mark);
        }
        for node in &world.bsp.nodes {
            node.view_mark.set(tree_mark);
        }
        return;
    };

    for (leaf_idx, leaf) in world.bsp.leafs.iter().enumerate() {
        let cluster = leaf.pvs_cluster;
        if cluster < 0 {
            continue;
        }
        let byte = (cluster as usize) / 8;
        let bit = (cluster as usize) % 8;
        let visible = visdata.get(byte).map(|b| b & (1 << bit) != 0).unwrap_or(false);
        if !visible {
            continue;
        }

        leaf.view_mark.set(tree_mark);
        let _ = leaf_idx;

        let mut cur = leaf.parent;
        while let Some(node_id) = cur {
            let node = &world.bsp.nodes[node_id.0 as usize];
            if node.view_mark.get() == tree_mark {
                break;
            }
            node.view_mark.set(tree_mark);
            cur = node.parent;
        }
    }
}

/// Descend from node 0, pruning subtrees whose `ViewMark` isn't current or
/// that the frustum fully culls; cull surviving leaves' areas.
pub fn descend_and_cull(
    world: &World,
    tree_mark: u32,
    frustum: &[Plane],
    marker: u32,
    view_pos: Vec3,
    masks: VisMasks,
    result: &mut VisResult,
) {
    if world.bsp.is_empty() {
        return;
    }
    descend(world, 0, tree_mark, frustum, initial_mask(frustum), marker, view_pos, masks, result);
}

#[allow(clippy::too_many_arguments)]
fn descend(
    world: &World,
    node_idx: usize,
    tree_mark: u32,
    frustum: &[Plane],
    cull_mask: u32,
    marker: u32,
    view_pos: Vec3,
    masks: VisMasks,
    result: &mut VisResult,
) {
    let node = &world.bsp.nodes[node_idx];
    if node.view_mark.get() != tree_mark {
        return;
    }
    let Some(mask) = cull_aabb(frustum, node.aabb.mins, node.aabb.maxs, cull_mask) else { return };

    for &child in &node.children {
        match terminal_of(child) {
            Some(Terminal::Solid) => {}
            Some(Terminal::Leaf(leaf_id)) => {
                let leaf = &world.bsp.leafs[leaf_id.0 as usize];
                if leaf.view_mark.get() != tree_mark {
                    continue;
                }
                if cull_aabb(frustum, leaf.aabb.mins, leaf.aabb.maxs, mask).is_none() {
                    continue;
                }
                cull_area(world, leaf.area, frustum, mask, marker, view_pos, masks, result);
            }
            None => descend(world, child as usize, tree_mark, frustum, mask, marker, view_pos, masks, result),
        }
    }
}
