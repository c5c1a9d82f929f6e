//! Dynamic obstacles and the tile cache that carves them into layered
//! tiles (§4.5 step 8, "Obstacles"; §7 "deferred-call contention").

use std::collections::{HashMap, HashSet, VecDeque};

use glam::Vec3;

use crate::error::NavMeshError;

use super::compact::{self, CompactHeightfield, HeightfieldLayer};
use super::{area, contour, detail, mesher, region, tile, NavMeshBuildConfig, NavMesh, PartitionMethod};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObstacleId(pub u32);

#[derive(Clone, Copy, Debug)]
pub enum ObstacleShape {
    Box { half_extents: Vec3 },
    Cylinder { radius: f32, height: f32 },
}

#[derive(Clone, Copy, Debug)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub position: Vec3,
    pub shape: ObstacleShape,
}

enum PendingRequest {
    Add(Obstacle),
    Remove(ObstacleId),
}

/// Obstacle add/remove calls are deferred: they enqueue here and only take
/// effect (carving the affected tile's layers and triggering a rebuild)
/// once `update` pumps the queue. At most one request drains per tick,
/// mirroring the real tile cache's `BUFFER_TOO_SMALL` contention, which
/// callers work around by retrying `update` until the queue is empty.
#[derive(Default)]
pub struct TileCache {
    next_id: u32,
    obstacles: HashMap<ObstacleId, Obstacle>,
    layers: HashMap<(i32, i32), Vec<HeightfieldLayer>>,
    pending: VecDeque<PendingRequest>,
    dirty_tiles: HashSet<(i32, i32)>,
}

const MAX_REQUESTS_PER_UPDATE: usize = 1;

impl TileCache {
    pub fn add_tile(&mut self, tx: i32, tz: i32, layers: Vec<HeightfieldLayer>) {
        self.layers.insert((tx, tz), layers);
    }

    pub fn clear_tile(&mut self, tx: i32, tz: i32) {
        self.layers.remove(&(tx, tz));
        self.dirty_tiles.remove(&(tx, tz));
    }

    pub fn clear_all(&mut self) {
        self.layers.clear();
        self.dirty_tiles.clear();
    }

    pub fn add_obstacle(&mut self, position: Vec3, shape: ObstacleShape) -> ObstacleId {
        let id = ObstacleId(self.next_id);
        self.next_id += 1;
        self.pending.push_back(PendingRequest::Add(Obstacle { id, position, shape }));
        id
    }

    pub fn remove_obstacle(&mut self, id: ObstacleId) {
        self.pending.push_back(PendingRequest::Remove(id));
    }

    /// Returns `true` once the pending queue is fully drained. Callers
    /// retry with further `update` calls until this returns `true`. `_dt`
    /// doesn't gate the drain rate — a fixed number of requests processes
    /// per call regardless of frame time, matching `BUFFER_TOO_SMALL`
    /// pumping rather than a timed budget.
    pub fn update(&mut self, _dt: f32, cfg: &NavMeshBuildConfig, navmesh: &mut NavMesh) -> bool {
        for _ in 0..MAX_REQUESTS_PER_UPDATE {
            let Some(request) = self.pending.pop_front() else { break };
            match request {
                PendingRequest::Add(obstacle) => {
                    for t in touching_tiles(cfg, &obstacle) {
                        self.dirty_tiles.insert(t);
                    }
                    self.obstacles.insert(obstacle.id, obstacle);
                }
                PendingRequest::Remove(id) => {
                    if let Some(obstacle) = self.obstacles.remove(&id) {
                        for t in touching_tiles(cfg, &obstacle) {
                            self.dirty_tiles.insert(t);
                        }
                    }
                }
            }
        }

        let dirty: Vec<_> = self.dirty_tiles.drain().collect();
        for (tx, tz) in dirty {
            if let Err(err) = self.rebuild_tile(tx, tz, cfg, navmesh) {
                log::warn!("tile cache rebuild of ({tx}, {tz}) failed: {err}");
            }
        }

        self.pending.is_empty()
    }

    /// Re-runs the region/contour/mesh pipeline for every layer at
    /// `(tx, tz)` against a heightfield snapshot with obstacles carved in.
    pub fn rebuild_tile(&mut self, tx: i32, tz: i32, cfg: &NavMeshBuildConfig, navmesh: &mut NavMesh) -> Result<(), NavMeshError> {
        navmesh.remove_tile(tx, tz);
        let Some(layers) = self.layers.get(&(tx, tz)) else { return Ok(()) };
        let origin = cfg.tile_origin(tx, tz);

        for layer in layers {
            let mut chf = compact::compact_heightfield_from_layer(cfg, layer);
            carve_obstacles(&mut chf, self.obstacles.values());

            let dist_field = (cfg.partition_method == PartitionMethod::Watershed).then(|| compact::calculate_distance_field(&chf));
            region::build_regions(cfg, &mut chf, dist_field.as_deref());

            let Ok(contours) = contour::build_contours(cfg, &chf) else { continue };
            let Ok(poly_mesh) = mesher::build_poly_mesh(cfg, &contours) else { continue };
            let Ok(detail_mesh) = detail::build_detail_mesh(cfg, &chf, &poly_mesh) else { continue };

            let built = tile::create_nav_mesh_tile(tx, tz, origin, cfg, &poly_mesh, &detail_mesh);
            navmesh.add_tile(built);
            // One navmesh tile per grid coordinate; the first layer that
            // meshes successfully wins (overlapping layers at a single
            // coordinate are a Layers-partition concept, not stitched here).
            break;
        }

        Ok(())
    }
}

fn touching_tiles(cfg: &NavMeshBuildConfig, obstacle: &Obstacle) -> Vec<(i32, i32)> {
    let radius = match obstacle.shape {
        ObstacleShape::Box { half_extents } => half_extents.x.max(half_extents.z),
        ObstacleShape::Cylinder { radius, .. } => radius,
    };
    let min = obstacle.position - Vec3::new(radius, 0.0, radius);
    let max = obstacle.position + Vec3::new(radius, 0.0, radius);
    let (tx0, tz0) = cfg.world_to_tile(min);
    let (tx1, tz1) = cfg.world_to_tile(max);

    let mut tiles = Vec::new();
    for tz in tz0..=tz1 {
        for tx in tx0..=tx1 {
            tiles.push((tx, tz));
        }
    }
    tiles
}

fn carve_obstacles<'a>(chf: &mut CompactHeightfield, obstacles: impl Iterator<Item = &'a Obstacle>) {
    for obstacle in obstacles {
        let (y_min, y_max) = match obstacle.shape {
            ObstacleShape::Box { half_extents } => (obstacle.position.y - half_extents.y, obstacle.position.y + half_extents.y),
            ObstacleShape::Cylinder { height, .. } => (obstacle.position.y, obstacle.position.y + height),
        };

        for cz in 0..chf.height {
            for cx in 0..chf.width {
                let (wx, wz) = chf.cell_center_xz(cx, cz);
                let inside = match obstacle.shape {
                    ObstacleShape::Box { half_extents } => (wx - obstacle.position.x).abs() <= half_extents.x && (wz - obstacle.position.z).abs() <= half_extents.z,
                    ObstacleShape::Cylinder { radius, .. } => {
                        let dx = wx - obstacle.position.x;
                        let dz = wz - obstacle.position.z;
                        dx * dx + dz * dz <= radius * radius
                    }
                };
                if !inside {
                    continue;
                }
                for span_idx in chf.column_spans(cx, cz) {
                    let span_min = chf.span_floor_world_y(span_idx);
                    let span_max = span_min + chf.spans[span_idx].height as f32 * chf.cell_height;
                    if span_max < y_min || span_min > y_max {
                        continue;
                    }
                    chf.areas[span_idx] = area::NULL_AREA;
                }
            }
        }
    }
}
