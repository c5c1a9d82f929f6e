//! Tiled navmesh builder and query (C5/C6): voxel heightfield rasterization,
//! region partitioning, contour extraction, polygon/detail meshing, tile
//! packing, dynamic obstacles, and the query operations that run against
//! the packed tiles.

pub mod area;
pub mod compact;
pub mod contour;
pub mod detail;
pub mod heightfield;
pub mod mesher;
pub mod obstacle;
pub mod query;
pub mod region;
pub mod tile;

use glam::Vec3;
use log::{debug, warn};

use crate::error::NavMeshError;

pub use area::{AreaType, NavAreaShape};
pub use obstacle::{Obstacle, ObstacleId, ObstacleShape, TileCache};
pub use query::{NavMeshQuery, QueryFilter};
pub use tile::{NavMesh, NavMeshTile, PolyRef};

/// Which algorithm partitions the walkable surface into regions (§4.5
/// step 7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PartitionMethod {
    /// Best tessellation; requires a distance field.
    #[default]
    Watershed,
    /// Fastest; tends to produce long thin polygons.
    Monotone,
    /// Independent per-height-band regions, supports overlapping stacks.
    Layers,
}

/// Static tuning an interface owns for the lifetime of a navmesh (§4.5).
#[derive(Clone, Copy, Debug)]
pub struct NavMeshBuildConfig {
    pub cell_size: f32,
    pub cell_height: f32,
    pub tile_size: u16,
    pub border_size: u16,
    pub world_half_extents: f32,
    pub world_bottom_bound: f32,

    pub walkable_slope_deg: f32,
    pub walkable_height: u16,
    pub walkable_radius: u16,
    pub walkable_climb: u16,

    pub min_region_area: u32,
    pub merge_region_area: u32,

    pub max_edge_length: u16,
    pub max_simplification_error: f32,
    pub max_verts_per_poly: u8,

    pub detail_sample_dist: f32,
    pub detail_sample_max_error: f32,

    pub partition_method: PartitionMethod,
    /// Layered (dynamic) tiles get re-added to the tile cache and rebuilt
    /// eagerly whenever an obstacle touches them; static tiles are built
    /// once and never revisited by obstacle updates.
    pub dynamic: bool,
}

impl Default for NavMeshBuildConfig {
    fn default() -> Self {
        NavMeshBuildConfig {
            cell_size: 0.25,
            cell_height: 0.2,
            tile_size: 64,
            border_size: 4,
            world_half_extents: 256.0,
            world_bottom_bound: -64.0,
            walkable_slope_deg: 45.0,
            walkable_height: 10,
            walkable_radius: 2,
            walkable_climb: 4,
            min_region_area: 64,
            merge_region_area: 400,
            max_edge_length: 80,
            max_simplification_error: 1.3,
            max_verts_per_poly: 6,
            detail_sample_dist: 6.0,
            detail_sample_max_error: 1.0,
            partition_method: PartitionMethod::default(),
            dynamic: false,
        }
    }
}

impl NavMeshBuildConfig {
    /// Called once at interface construction (§4.5.1).
    pub fn validate(&self) -> Result<(), NavMeshError> {
        if !(3..=6).contains(&self.max_verts_per_poly) {
            return Err(NavMeshError::InvalidConfig("max_verts_per_poly must be in 3..=6"));
        }
        if self.tile_size == 0 {
            return Err(NavMeshError::InvalidConfig("tile_size must be > 0"));
        }
        if self.cell_size <= 0.0 || self.cell_height <= 0.0 {
            return Err(NavMeshError::InvalidConfig("cell_size and cell_height must be > 0"));
        }
        if !(self.walkable_slope_deg > 0.0 && self.walkable_slope_deg < 90.0) {
            return Err(NavMeshError::InvalidConfig("walkable_slope_deg must be in (0, 90)"));
        }
        Ok(())
    }

    pub fn tile_world_size(&self) -> f32 {
        self.tile_size as f32 * self.cell_size
    }

    /// Tile coordinate containing world-space point `p` (XZ plane, origin
    /// at the world center per `world_half_extents`).
    pub fn world_to_tile(&self, p: Vec3) -> (i32, i32) {
        let size = self.tile_world_size();
        let tx = ((p.x + self.world_half_extents) / size).floor() as i32;
        let tz = ((p.z + self.world_half_extents) / size).floor() as i32;
        (tx, tz)
    }

    pub fn tile_origin(&self, tx: i32, tz: i32) -> Vec3 {
        let size = self.tile_world_size();
        Vec3::new(tx as f32 * size - self.world_half_extents, self.world_bottom_bound, tz as f32 * size - self.world_half_extents)
    }
}

/// One triangle of input geometry gathered for a tile build (§4.5 step 1).
#[derive(Clone, Copy, Debug)]
pub struct InputTriangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

/// Owns the static config plus the live navmesh/tile-cache state and runs
/// the per-tile build pipeline (§4.5).
pub struct NavMeshBuilder {
    pub config: NavMeshBuildConfig,
    pub navmesh: NavMesh,
    pub tile_cache: Option<TileCache>,
    pub areas: Vec<area::NavAreaVolume>,
}

impl NavMeshBuilder {
    pub fn new(config: NavMeshBuildConfig) -> Result<Self, NavMeshError> {
        config.validate()?;
        let tile_cache = config.dynamic.then(TileCache::default);
        Ok(NavMeshBuilder { navmesh: NavMesh::new(config.tile_size, config.cell_size), config, tile_cache, areas: Vec::new() })
    }

    /// Build every tile whose AABB overlaps `[mins, maxs]` (§4.5 "Build").
    pub fn build(&mut self, mins: Vec3, maxs: Vec3, geometry: &[InputTriangle]) {
        let (tx0, tz0) = self.config.world_to_tile(mins);
        let (tx1, tz1) = self.config.world_to_tile(maxs);

        for tz in tz0..=tz1 {
            for tx in tx0..=tx1 {
                self.build_tile(tx, tz, geometry);
            }
        }
    }

    pub fn clear_tile(&mut self, tx: i32, tz: i32) {
        self.navmesh.remove_tile(tx, tz);
        if let Some(cache) = &mut self.tile_cache {
            cache.clear_tile(tx, tz);
        }
    }

    pub fn clear_all(&mut self) {
        self.navmesh.clear();
        if let Some(cache) = &mut self.tile_cache {
            cache.clear_all();
        }
    }

    fn build_tile(&mut self, tx: i32, tz: i32, geometry: &[InputTriangle]) {
        self.clear_tile(tx, tz);

        match self.build_tile_inner(tx, tz, geometry) {
            Ok(()) => {}
            Err(err) => warn!("navmesh tile ({tx}, {tz}) build failed: {err}"),
        }
    }

    fn build_tile_inner(&mut self, tx: i32, tz: i32, geometry: &[InputTriangle]) -> Result<(), NavMeshError> {
        debug!("voxelize tile ({tx}, {tz})");
        let mut hf = heightfield::build_heightfield_tile(tx, tz, &self.config, geometry)?;

        debug!("filter tile ({tx}, {tz})");
        heightfield::filter_low_hanging_obstacles(&self.config, &mut hf);
        heightfield::filter_ledge_spans(&self.config, &mut hf);
        heightfield::filter_walkable_low_height_spans(&self.config, &mut hf);

        debug!("compact tile ({tx}, {tz})");
        let mut chf = compact::build_compact_heightfield(&self.config, &hf)?;
        compact::erode_walkable_area(self.config.walkable_radius, &mut chf);

        for volume in &self.areas {
            area::paint_area(&mut chf, volume);
        }

        if let Some(cache) = &mut self.tile_cache {
            debug!("layers tile ({tx}, {tz})");
            let layers = compact::build_heightfield_layers(&chf)?;
            cache.add_tile(tx, tz, layers);
            cache.rebuild_tile(tx, tz, &self.config, &mut self.navmesh)?;
            return Ok(());
        }

        debug!("partition tile ({tx}, {tz})");
        let dist_field = (self.config.partition_method == PartitionMethod::Watershed).then(|| compact::calculate_distance_field(&chf));
        region::build_regions(&self.config, &mut chf, dist_field.as_deref());

        debug!("contours tile ({tx}, {tz})");
        let contours = contour::build_contours(&self.config, &chf)?;

        debug!("poly_mesh tile ({tx}, {tz})");
        let poly_mesh = mesher::build_poly_mesh(&self.config, &contours)?;

        debug!("detail_mesh tile ({tx}, {tz})");
        let detail_mesh = detail::build_detail_mesh(&self.config, &chf, &poly_mesh)?;

        debug!("tile_pack tile ({tx}, {tz})");
        let origin = self.config.tile_origin(tx, tz);
        let tile = tile::create_nav_mesh_tile(tx, tz, origin, &self.config, &poly_mesh, &detail_mesh);
        self.navmesh.add_tile(tile);

        Ok(())
    }

    /// Pumps `tile_cache.update` until deferred obstacle requests drain
    /// (§4.5 "Obstacles" / §7 "deferred-call contention").
    pub fn tick(&mut self, dt: f32) {
        if let Some(cache) = &mut self.tile_cache {
            cache.update(dt, &self.config, &mut self.navmesh);
        }
    }
}
