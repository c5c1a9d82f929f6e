//! Compact heightfield: cross-linked walkable spans (§4.5 step 5), radius
//! erosion, and the watershed distance field (§4.5 step 7, Watershed
//! variant). Also the per-tile layer extraction used by the dynamic tile
//! cache (§4.5 step 8).

use glam::Vec3;

use crate::error::NavMeshError;

use super::area::NULL_AREA;
use super::heightfield::Heightfield;
use super::NavMeshBuildConfig;

/// 4-connected neighbour offsets, matching the bit order used by
/// `connections`.
const NEIGHBOURS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

#[derive(Clone, Copy, Debug)]
pub struct CompactSpan {
    pub y: u16,
    pub height: u16,
    pub connections: [Option<u32>; 4],
}

pub struct CompactHeightfield {
    pub width: i32,
    pub height: i32,
    pub bmin: Vec3,
    pub cell_size: f32,
    pub cell_height: f32,
    pub walkable_height: u16,
    /// (first span index, count) per column, row-major `z * width + x`.
    pub cell_index: Vec<(u32, u32)>,
    pub spans: Vec<CompactSpan>,
    pub areas: Vec<u8>,
    pub dist: Vec<u16>,
    pub regions: Vec<u16>,
    pub max_distance: u16,
}

impl CompactHeightfield {
    pub fn column_spans(&self, cx: i32, cz: i32) -> std::ops::Range<usize> {
        let (first, count) = self.cell_index[(cz * self.width + cx) as usize];
        first as usize..(first + count) as usize
    }

    pub fn cell_center_xz(&self, cx: i32, cz: i32) -> (f32, f32) {
        (self.bmin.x + (cx as f32 + 0.5) * self.cell_size, self.bmin.z + (cz as f32 + 0.5) * self.cell_size)
    }

    pub fn span_floor_world_y(&self, span_idx: usize) -> f32 {
        self.bmin.y + self.spans[span_idx].y as f32 * self.cell_height
    }

    pub(crate) fn span_column(&self, span_idx: usize) -> (i32, i32) {
        for (idx, &(first, count)) in self.cell_index.iter().enumerate() {
            if (span_idx as u32) >= first && (span_idx as u32) < first + count {
                return (idx as i32 % self.width, idx as i32 / self.width);
            }
        }
        unreachable!("span index not owned by any column")
    }
}

pub fn build_compact_heightfield(cfg: &NavMeshBuildConfig, hf: &Heightfield) -> Result<CompactHeightfield, NavMeshError> {
    let mut cell_index = vec![(0u32, 0u32); (hf.width * hf.depth) as usize];
    let mut spans = Vec::new();
    let mut areas = Vec::new();

    for z in 0..hf.depth {
        for x in 0..hf.width {
            let col = hf.column(x, z);
            let first = spans.len() as u32;
            let mut count = 0u32;

            for i in 0..col.len() {
                if col[i].area == NULL_AREA {
                    continue;
                }
                let floor = col[i].max;
                let ceiling = col.get(i + 1).map(|s| s.min).unwrap_or(u16::MAX);
                if ceiling <= floor {
                    continue;
                }
                let open_height = ceiling - floor;
                if (open_height as u16) < cfg.walkable_height {
                    continue;
                }

                spans.push(CompactSpan { y: floor, height: open_height, connections: [None; 4] });
                areas.push(col[i].area);
                count += 1;
            }

            cell_index[(z * hf.width + x) as usize] = (first, count);
        }
    }

    if spans.is_empty() {
        return Err(NavMeshError::BuildStageFailed { stage: "compact", reason: "no walkable spans in tile".into() });
    }

    let mut chf = CompactHeightfield {
        width: hf.width,
        height: hf.depth,
        bmin: hf.bmin,
        cell_size: hf.cell_size,
        cell_height: hf.cell_height,
        walkable_height: cfg.walkable_height,
        cell_index,
        spans,
        areas,
        dist: Vec::new(),
        regions: Vec::new(),
        max_distance: 0,
    };

    link_neighbours(cfg, &mut chf);
    chf.regions = vec![0; chf.spans.len()];
    Ok(chf)
}

fn find_span_at_floor(chf: &CompactHeightfield, cx: i32, cz: i32, floor: u16, climb: u16) -> Option<u32> {
    if cx < 0 || cz < 0 || cx >= chf.width || cz >= chf.height {
        return None;
    }
    let range = chf.column_spans(cx, cz);
    range
        .into_iter()
        .find(|&idx| (chf.spans[idx].y as i32 - floor as i32).unsigned_abs() as u16 <= climb)
        .map(|idx| idx as u32)
}

fn link_neighbours(cfg: &NavMeshBuildConfig, chf: &mut CompactHeightfield) {
    for cz in 0..chf.height {
        for cx in 0..chf.width {
            for span_idx in chf.column_spans(cx, cz) {
                let floor = chf.spans[span_idx].y;
                for (dir, (dx, dz)) in NEIGHBOURS.iter().enumerate() {
                    chf.spans[span_idx].connections[dir] = find_span_at_floor(chf, cx + dx, cz + dz, floor, cfg.walkable_climb);
                }
            }
        }
    }
}

/// Two-pass (forward/backward) Manhattan-ish distance transform to the
/// nearest unwalkable border, used both for watershed seeding and radius
/// erosion.
fn distance_transform(chf: &CompactHeightfield) -> Vec<u16> {
    let mut dist = vec![u16::MAX; chf.spans.len()];

    for cz in 0..chf.height {
        for cx in 0..chf.width {
            for span_idx in chf.column_spans(cx, cz) {
                let span = chf.spans[span_idx];
                let border = span.connections.iter().any(|c| c.is_none());
                if border {
                    dist[span_idx] = 0;
                }
            }
        }
    }

    // Forward pass: (-x, -z) and their diagonals.
    for cz in 0..chf.height {
        for cx in 0..chf.width {
            for span_idx in chf.column_spans(cx, cz) {
                relax(chf, &mut dist, span_idx, 0);
                relax(chf, &mut dist, span_idx, 2);
            }
        }
    }
    // Backward pass: (+x, +z).
    for cz in (0..chf.height).rev() {
        for cx in (0..chf.width).rev() {
            for span_idx in chf.column_spans(cx, cz) {
                relax(chf, &mut dist, span_idx, 1);
                relax(chf, &mut dist, span_idx, 3);
            }
        }
    }

    dist
}

fn relax(chf: &CompactHeightfield, dist: &mut [u16], span_idx: usize, dir: usize) {
    let Some(neighbour) = chf.spans[span_idx].connections[dir] else { return };
    let candidate = dist[neighbour as usize].saturating_add(2);
    if candidate < dist[span_idx] {
        dist[span_idx] = candidate;
    }
}

pub fn calculate_distance_field(chf: &CompactHeightfield) -> Vec<u16> {
    distance_transform(chf)
}

/// Reconstructs a compact heightfield from one dynamic-cache layer, so the
/// obstacle rebuild path can run the same region/contour/mesh pipeline the
/// static build uses instead of a bespoke quad mesher.
pub fn compact_heightfield_from_layer(cfg: &NavMeshBuildConfig, layer: &HeightfieldLayer) -> CompactHeightfield {
    let w = layer.width as i32;
    let h = layer.height as i32;
    let mut cell_index = vec![(0u32, 0u32); (w * h) as usize];
    let mut spans = Vec::new();
    let mut areas = Vec::new();

    for idx in 0..(w * h) as usize {
        let first = spans.len() as u32;
        let mut count = 0u32;
        if layer.heights[idx] != 0xFFFF {
            spans.push(CompactSpan { y: layer.heights[idx], height: cfg.walkable_height, connections: [None; 4] });
            areas.push(layer.areas[idx]);
            count = 1;
        }
        cell_index[idx] = (first, count);
    }

    let mut chf = CompactHeightfield {
        width: w,
        height: h,
        bmin: layer.bmin,
        cell_size: cfg.cell_size,
        cell_height: cfg.cell_height,
        walkable_height: cfg.walkable_height,
        cell_index,
        spans,
        areas,
        dist: Vec::new(),
        regions: Vec::new(),
        max_distance: 0,
    };

    for cz in 0..h {
        for cx in 0..w {
            let idx = (cz * w + cx) as usize;
            if chf.cell_index[idx].1 == 0 {
                continue;
            }
            let span_idx = chf.cell_index[idx].0 as usize;
            let bits = layer.connections[idx];
            for (dir, &(dx, dz)) in NEIGHBOURS.iter().enumerate() {
                if bits & (1 << dir) == 0 {
                    continue;
                }
                let (nx, nz) = (cx + dx, cz + dz);
                if nx < 0 || nz < 0 || nx >= w || nz >= h {
                    continue;
                }
                let nidx = (nz * w + nx) as usize;
                if chf.cell_index[nidx].1 > 0 {
                    chf.spans[span_idx].connections[dir] = Some(chf.cell_index[nidx].0);
                }
            }
        }
    }

    chf.regions = vec![0; chf.spans.len()];
    chf
}

/// Flags any span within `radius` cells of a border (including a
/// non-walkable area it was painted with) as unwalkable, so the final
/// navmesh keeps agents `radius` cells away from obstacles (§4.5 step 5).
pub fn erode_walkable_area(radius: u16, chf: &mut CompactHeightfield) {
    if radius == 0 {
        return;
    }
    let dist = distance_transform(chf);
    let threshold = radius.saturating_mul(2);
    for (span_idx, area) in chf.areas.iter_mut().enumerate() {
        if dist[span_idx] < threshold {
            *area = NULL_AREA;
        }
    }
}

/// One vertical stack of a tile's compact heightfield, serialized
/// independently for the dynamic tile cache (§4.5 step 8).
pub struct HeightfieldLayer {
    pub layer_index: i32,
    pub width: u8,
    pub height: u8,
    pub bounds_min_cell: (u8, u8),
    pub bounds_max_cell: (u8, u8),
    pub bmin: Vec3,
    pub bmax: Vec3,
    pub heights: Vec<u16>,
    pub areas: Vec<u8>,
    pub connections: Vec<u8>,
}

/// Groups spans by stack position: the `n`th walkable span encountered
/// bottom-to-top in a column belongs to layer `n`. This mirrors the
/// "one layer per vertical stack" contract without the full watershed
/// layer-merge heuristics.
pub fn build_heightfield_layers(chf: &CompactHeightfield) -> Result<Vec<HeightfieldLayer>, NavMeshError> {
    let w = chf.width as usize;
    let h = chf.height as usize;
    if w > 255 || h > 255 {
        return Err(NavMeshError::BuildStageFailed { stage: "layers", reason: "tile too large for u8-indexed layer".into() });
    }

    let mut max_stack = 0usize;
    for cz in 0..chf.height {
        for cx in 0..chf.width {
            max_stack = max_stack.max(chf.column_spans(cx, cz).len());
        }
    }

    let mut layers = Vec::with_capacity(max_stack);
    for layer_index in 0..max_stack {
        let mut heights = vec![0xFFFFu16; w * h];
        let mut areas = vec![NULL_AREA; w * h];
        let mut connections = vec![0u8; w * h];
        let mut hmin = u16::MAX;
        let mut hmax = 0u16;
        let mut any = false;

        for cz in 0..chf.height {
            for cx in 0..chf.width {
                let spans = chf.column_spans(cx, cz);
                let Some(span_idx) = spans.clone().nth(layer_index) else { continue };
                let span = chf.spans[span_idx];
                let idx = (cz as usize) * w + cx as usize;
                heights[idx] = span.y;
                areas[idx] = chf.areas[span_idx];
                hmin = hmin.min(span.y);
                hmax = hmax.max(span.y);
                any = true;

                let mut bits = 0u8;
                for (dir, conn) in span.connections.iter().enumerate() {
                    if conn.is_some() {
                        bits |= 1 << dir;
                    }
                }
                connections[idx] = bits;
            }
        }

        if !any {
            continue;
        }

        layers.push(HeightfieldLayer {
            layer_index: layer_index as i32,
            width: w as u8,
            height: h as u8,
            bounds_min_cell: (0, 0),
            bounds_max_cell: (w as u8 - 1, h as u8 - 1),
            bmin: chf.bmin,
            bmax: chf.bmin + Vec3::new(w as f32 * chf.cell_size, hmax as f32 * chf.cell_height, h as f32 * chf.cell_size),
            heights,
            areas,
            connections,
        });
    }

    Ok(layers)
}
