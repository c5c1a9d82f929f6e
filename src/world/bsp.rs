//! Binary-space tree: interior nodes + leaves, descended from node 0.
//!
//! Child-index convention: a negative child `c` is a leaf `-1 - c`; `0`
//! means **solid**; a positive child is another interior node index.

use std::cell::Cell;

use glam::Vec3;

use crate::geometry::plane::{classify_aabb, Plane, PlaneSide};
use crate::geometry::{Aabb, Sphere};

use super::types::{AreaId, LeafId, NodeId, PlaneId};

#[derive(Debug)]
pub struct Node {
    pub aabb: Aabb,
    pub plane: PlaneId,
    /// `children[0]` is the front (d > 0) child, `children[1]` the back.
    pub children: [i32; 2],
    pub parent: Option<NodeId>,
    pub view_mark: Cell<u32>,
}

#[derive(Debug)]
pub struct Leaf {
    pub aabb: Aabb,
    /// PVS cluster id, or `-1` if the level has no PVS data.
    pub pvs_cluster: i32,
    pub visdata_offset: Option<u32>,
    pub area: AreaId,
    pub audio_area: i32,
    pub parent: Option<NodeId>,
    pub view_mark: Cell<u32>,
}

impl Node {
    #[inline(always)]
    pub fn point_side(&self, p: Vec3, planes: &[Plane]) -> i32 {
        let plane = &planes[self.plane.0 as usize];
        if plane.distance_to_point(p) <= 0.0 { 1 } else { 0 }
    }
}

#[derive(Debug, Default)]
pub struct BspTree {
    pub nodes: Vec<Node>,
    pub leafs: Vec<Leaf>,
}

/// Result of descending to a terminal child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Solid,
    Leaf(LeafId),
}

fn terminal_of(child: i32) -> Option<Terminal> {
    if child == 0 {
        Some(Terminal::Solid)
    } else if child < 0 {
        Some(Terminal::Leaf(LeafId((-1 - child) as u32)))
    } else {
        None
    }
}

impl BspTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve `parent` pointers on every node/leaf from the child arrays.
    /// Called once after the raw arrays are loaded.
    pub fn resolve_parents(&mut self) {
        for i in 0..self.nodes.len() {
            let children = self.nodes[i].children;
            for &child in &children {
                match terminal_of(child) {
                    Some(Terminal::Solid) => {}
                    Some(Terminal::Leaf(leaf_id)) => self.leafs[leaf_id.0 as usize].parent = Some(NodeId(i as u32)),
                    None => self.nodes[child as usize].parent = Some(NodeId(i as u32)),
                }
            }
        }
    }

    /// Walk from node 0 to the leaf containing `p`. `None` means `p` is in
    /// solid space.
    pub fn find_leaf(&self, p: Vec3, planes: &[Plane]) -> Option<LeafId> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            let side = node.point_side(p, planes);
            let child = node.children[side as usize];
            match terminal_of(child) {
                Some(Terminal::Solid) => return None,
                Some(Terminal::Leaf(leaf_id)) => return Some(leaf_id),
                None => idx = child as usize,
            }
        }
    }

    /// Ancestor chain from `leaf` to the root, inclusive, in leaf-to-root
    /// order. Used by PVS marking.
    pub fn leaf_ancestors(&self, leaf: LeafId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cur = self.leafs[leaf.0 as usize].parent;
        while let Some(node_id) = cur {
            chain.push(node_id);
            cur = self.nodes[node_id.0 as usize].parent;
        }
        chain
    }

    /// Descend the tree collecting every leaf whose AABB overlaps `bounds`,
    /// pruning subtrees that fall entirely to one side of a split plane.
    /// `bounds` is either an AABB or a sphere; `visit` is called once per
    /// overlapping leaf (possibly more than once for the same leaf if it is
    /// reachable through multiple branches — callers dedup at the area
    /// level).
    pub fn query_overlapping_leaves(&self, bounds: QueryBounds, planes: &[Plane], mut visit: impl FnMut(LeafId)) {
        if self.nodes.is_empty() {
            return;
        }
        self.descend(0, bounds, planes, &mut visit);
    }

    fn descend(&self, mut idx: usize, bounds: QueryBounds, planes: &[Plane], visit: &mut impl FnMut(LeafId)) {
        loop {
            let node = &self.nodes[idx];
            let plane = &planes[node.plane.0 as usize];
            let side = bounds.classify(plane);

            let (recurse_front, recurse_back) = match side {
                PlaneSide::Front => (true, false),
                PlaneSide::Back => (false, true),
                _ => (true, true),
            };

            if recurse_back {
                match terminal_of(node.children[1]) {
                    Some(Terminal::Solid) => {}
                    Some(Terminal::Leaf(leaf_id)) => visit(leaf_id),
                    None => self.descend(node.children[1] as usize, bounds, planes, visit),
                }
            }

            if recurse_front {
                match terminal_of(node.children[0]) {
                    Some(Terminal::Solid) => return,
                    Some(Terminal::Leaf(leaf_id)) => {
                        visit(leaf_id);
                        return;
                    }
                    None => {
                        // Tail-loop into the front child instead of a
                        // recursive call, to bound recursion depth on long
                        // straddling chains.
                        idx = node.children[0] as usize;
                        continue;
                    }
                }
            }

            return;
        }
    }
}

/// Query shape used by `query_overlapping_leaves` / area linkage.
#[derive(Clone, Copy, Debug)]
pub enum QueryBounds {
    Aabb(Aabb),
    Sphere(Sphere),
}

impl QueryBounds {
    fn classify(&self, plane: &Plane) -> PlaneSide {
        match self {
            QueryBounds::Aabb(b) => classify_aabb(plane, b.mins, b.maxs),
            QueryBounds::Sphere(s) => {
                let d = plane.distance_to_point(s.center);
                if d > s.radius {
                    PlaneSide::Front
                } else if d < -s.radius {
                    PlaneSide::Back
                } else {
                    PlaneSide::Cross
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn two_leaf_tree() -> (BspTree, Vec<Plane>) {
        let planes = vec![Plane::new(Vec3::X, 0.0)];
        let mut tree = BspTree {
            nodes: vec![Node {
                aabb: Aabb::new(vec3(-10.0, -10.0, -10.0), vec3(10.0, 10.0, 10.0)),
                plane: PlaneId(0),
                children: [-1, -2], // leaf 0 front, leaf 1 back
                parent: None,
                view_mark: Cell::new(0),
            }],
            leafs: vec![
                Leaf {
                    aabb: Aabb::new(vec3(0.0, -10.0, -10.0), vec3(10.0, 10.0, 10.0)),
                    pvs_cluster: 0,
                    visdata_offset: None,
                    area: AreaId(0),
                    audio_area: 0,
                    parent: None,
                    view_mark: Cell::new(0),
                },
                Leaf {
                    aabb: Aabb::new(vec3(-10.0, -10.0, -10.0), vec3(0.0, 10.0, 10.0)),
                    pvs_cluster: 1,
                    visdata_offset: None,
                    area: AreaId(1),
                    audio_area: 0,
                    parent: None,
                    view_mark: Cell::new(0),
                },
            ],
        };
        tree.resolve_parents();
        (tree, planes)
    }

    #[test]
    fn find_leaf_matches_side() {
        let (tree, planes) = two_leaf_tree();
        assert_eq!(tree.find_leaf(vec3(5.0, 0.0, 0.0), &planes), Some(LeafId(0)));
        assert_eq!(tree.find_leaf(vec3(-5.0, 0.0, 0.0), &planes), Some(LeafId(1)));
    }

    #[test]
    fn parents_resolve_to_root() {
        let (tree, _planes) = two_leaf_tree();
        assert_eq!(tree.leaf_ancestors(LeafId(0)), vec![NodeId(0)]);
    }

    #[test]
    fn solid_child_returns_none() {
        let planes = vec![Plane::new(Vec3::X, 0.0)];
        let mut tree = BspTree {
            nodes: vec![Node {
                aabb: Aabb::new(vec3(-10.0, -10.0, -10.0), vec3(10.0, 10.0, 10.0)),
                plane: PlaneId(0),
                children: [0, -1],
                parent: None,
                view_mark: Cell::new(0),
            }],
            leafs: vec![Leaf {
                aabb: Aabb::new(vec3(-10.0, -10.0, -10.0), vec3(0.0, 10.0, 10.0)),
                pvs_cluster: -1,
                visdata_offset: None,
                area: AreaId(0),
                audio_area: 0,
                parent: None,
                view_mark: Cell::new(0),
            }],
        };
        tree.resolve_parents();
        assert_eq!(tree.find_leaf(vec3(5.0, 0.0, 0.0), &planes), None);
    }
}
