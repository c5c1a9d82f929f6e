//! Voxel heightfield rasterization (§4.5 steps 1-4): triangles are clipped
//! into cell columns using the crate's own allocation-free polygon clipper
//! (the same routine the portal flood uses), then reduced to min/max span
//! pairs per column.

use glam::Vec3;

use crate::error::NavMeshError;
use crate::geometry::clip::{clip_polygon_fast, ClipBuffer, ClipScratch};
use crate::geometry::Plane;

use super::area::{NULL_AREA, WALKABLE_AREA};
use super::{InputTriangle, NavMeshBuildConfig};

#[derive(Clone, Copy, Debug)]
pub struct HeightSpan {
    pub min: u16,
    pub max: u16,
    pub area: u8,
}

/// Solid voxel heightfield for one padded tile. `cells` holds a bottom-to-top
/// sorted, climb-merged span list per column.
pub struct Heightfield {
    pub width: i32,
    pub depth: i32,
    pub bmin: Vec3,
    pub cell_size: f32,
    pub cell_height: f32,
    pub cells: Vec<Vec<HeightSpan>>,
}

impl Heightfield {
    fn column_mut(&mut self, x: i32, z: i32) -> Option<&mut Vec<HeightSpan>> {
        if x < 0 || z < 0 || x >= self.width || z >= self.depth {
            return None;
        }
        Some(&mut self.cells[(z * self.width + x) as usize])
    }

    pub fn column(&self, x: i32, z: i32) -> &[HeightSpan] {
        &self.cells[(z * self.width + x) as usize]
    }

    fn add_span(&mut self, x: i32, z: i32, min: u16, max: u16, area: u8, walkable_climb: u16) {
        let Some(col) = self.column_mut(x, z) else { return };

        let mut merged = false;
        for span in col.iter_mut() {
            let gap_below = (min as i32 - span.max as i32).unsigned_abs() as u16;
            let gap_above = (span.min as i32 - max as i32).unsigned_abs() as u16;
            let overlapping = min <= span.max && max >= span.min;
            if overlapping || gap_below <= walkable_climb || gap_above <= walkable_climb {
                if span.max == max && span.min == min {
                    span.area = span.area.max(area);
                } else if max >= span.min.min(min) {
                    // Higher span wins the area of whichever touches the new top.
                    if max >= span.max {
                        span.area = area;
                    }
                    span.min = span.min.min(min);
                    span.max = span.max.max(max);
                }
                merged = true;
                break;
            }
        }

        if !merged {
            col.push(HeightSpan { min, max, area });
        }
        col.sort_by_key(|s| s.min);
    }
}

fn is_triangle_walkable(a: Vec3, b: Vec3, c: Vec3, walkable_slope_deg: f32) -> bool {
    let normal = (b - a).cross(c - a).normalize_or_zero();
    normal.y > walkable_slope_deg.to_radians().cos()
}

/// Clip `points` to `coord >= bound` (axis 0 = x, axis 2 = z) using the
/// front-half convention of `clip_polygon_fast`.
fn clip_to_lower_bound(scratch: &mut ClipScratch, points: &[Vec3], out: &mut ClipBuffer, axis: usize, bound: f32) {
    let normal = if axis == 0 { Vec3::X } else { Vec3::Z };
    let plane = Plane::new(normal, -bound);
    if clip_polygon_fast(scratch, points, out, &plane, 1e-6).is_none() {
        out.copy_from(points);
    }
}

fn clip_to_upper_bound(scratch: &mut ClipScratch, points: &[Vec3], out: &mut ClipBuffer, axis: usize, bound: f32) {
    let normal = if axis == 0 { -Vec3::X } else { -Vec3::Z };
    let plane = Plane::new(normal, bound);
    if clip_polygon_fast(scratch, points, out, &plane, 1e-6).is_none() {
        out.copy_from(points);
    }
}

fn rasterize_triangle(hf: &mut Heightfield, cfg: &NavMeshBuildConfig, a: Vec3, b: Vec3, c: Vec3) {
    let walkable = is_triangle_walkable(a, b, c, cfg.walkable_slope_deg);
    let area = if walkable { WALKABLE_AREA } else { NULL_AREA };

    let min_bound = a.min(b).min(c);
    let max_bound = a.max(b).max(c);

    let cs = hf.cell_size;
    let z0 = ((min_bound.z / cs).floor() as i32).max(0);
    let z1 = ((max_bound.z / cs).floor() as i32).min(hf.depth - 1);
    if z0 > z1 {
        return;
    }

    let mut scratch = ClipScratch::default();
    let mut row_lo = ClipBuffer::default();
    let mut row_hi = ClipBuffer::default();
    let mut col_lo = ClipBuffer::default();
    let mut col_hi = ClipBuffer::default();

    let tri = [a, b, c];

    for z in z0..=z1 {
        let row_min = z as f32 * cs;
        let row_max = row_min + cs;

        clip_to_lower_bound(&mut scratch, &tri, &mut row_lo, 2, row_min);
        if row_lo.count < 3 {
            continue;
        }
        clip_to_upper_bound(&mut scratch, row_lo.as_slice(), &mut row_hi, 2, row_max);
        if row_hi.count < 3 {
            continue;
        }

        let row_verts = row_hi.as_slice();
        let col_min_x = row_verts.iter().fold(f32::MAX, |m, p| m.min(p.x));
        let col_max_x = row_verts.iter().fold(f32::MIN, |m, p| m.max(p.x));
        let x0 = ((col_min_x / cs).floor() as i32).max(0);
        let x1 = ((col_max_x / cs).floor() as i32).min(hf.width - 1);

        for x in x0..=x1 {
            let col_min = x as f32 * cs;
            let col_max = col_min + cs;

            clip_to_lower_bound(&mut scratch, row_verts, &mut col_lo, 0, col_min);
            if col_lo.count < 3 {
                continue;
            }
            clip_to_upper_bound(&mut scratch, col_lo.as_slice(), &mut col_hi, 0, col_max);
            if col_hi.count < 3 {
                continue;
            }

            let cell_verts = col_hi.as_slice();
            let mut y_min = cell_verts[0].y;
            let mut y_max = cell_verts[0].y;
            for p in &cell_verts[1..] {
                y_min = y_min.min(p.y);
                y_max = y_max.max(p.y);
            }
            if y_max < 0.0 {
                continue;
            }
            y_min = y_min.max(0.0);

            let span_min = (y_min / hf.cell_height) as u16;
            let span_max = (y_max / hf.cell_height).ceil() as u16;
            hf.add_span(x, z, span_min, span_max.max(span_min + 1), area, cfg.walkable_climb);
        }
    }
}

/// Build the padded voxel heightfield for tile `(tx, tz)` from the
/// already-gathered triangle soup (§4.5 step 1/3).
pub fn build_heightfield_tile(tx: i32, tz: i32, cfg: &NavMeshBuildConfig, geometry: &[InputTriangle]) -> Result<Heightfield, NavMeshError> {
    let side = cfg.tile_size as i32 + 2 * cfg.border_size as i32;
    if side <= 0 {
        return Err(NavMeshError::BuildStageFailed { stage: "voxelize", reason: "tile side is zero".into() });
    }

    let origin = cfg.tile_origin(tx, tz) - Vec3::new(cfg.border_size as f32 * cfg.cell_size, 0.0, cfg.border_size as f32 * cfg.cell_size);

    let mut hf = Heightfield {
        width: side,
        depth: side,
        bmin: origin,
        cell_size: cfg.cell_size,
        cell_height: cfg.cell_height,
        cells: vec![Vec::new(); (side * side) as usize],
    };

    let padded_size = side as f32 * cfg.cell_size;
    let tile_min = Vec3::new(origin.x, origin.y, origin.z);
    let tile_max = tile_min + Vec3::new(padded_size, 0.0, padded_size);

    for tri in geometry {
        let a = tri.a - tile_min;
        let b = tri.b - tile_min;
        let c = tri.c - tile_min;

        let tri_min = a.min(b).min(c) + tile_min;
        let tri_max = a.max(b).max(c) + tile_min;
        if tri_max.x < tile_min.x || tri_min.x > tile_max.x || tri_max.z < tile_min.z || tri_min.z > tile_max.z {
            continue;
        }

        rasterize_triangle(&mut hf, cfg, a, b, c);
    }

    Ok(hf)
}

/// Remove single-voxel low-hanging obstacles next to a taller walkable
/// neighbour (a character can just step onto them).
pub fn filter_low_hanging_obstacles(cfg: &NavMeshBuildConfig, hf: &mut Heightfield) {
    let climb = cfg.walkable_climb as i32;
    for z in 0..hf.depth {
        for x in 0..hf.width {
            let col = &mut hf.cells[(z * hf.width + x) as usize];
            for i in 1..col.len() {
                let (prev_area, prev_max) = (col[i - 1].area, col[i - 1].max as i32);
                let cur = &mut col[i];
                if cur.area == NULL_AREA && prev_area != NULL_AREA && (cur.min as i32 - prev_max).abs() <= climb {
                    cur.area = prev_area;
                }
            }
        }
    }
}

/// Remove spans whose floor neighbours (in any of the 4 cardinal
/// directions) differ in height by more than `walkable_climb` on every
/// side: these are narrow ledges an agent can't actually stand near.
pub fn filter_ledge_spans(cfg: &NavMeshBuildConfig, hf: &mut Heightfield) {
    let climb = cfg.walkable_climb as i32;
    let height = cfg.walkable_height as i32;

    let snapshot: Vec<Vec<HeightSpan>> = hf.cells.clone();
    let neighbour_offsets = [(-1, 0), (1, 0), (0, -1), (0, 1)];

    for z in 0..hf.depth {
        for x in 0..hf.width {
            let idx = (z * hf.width + x) as usize;
            for span_idx in 0..snapshot[idx].len() {
                let span = snapshot[idx][span_idx];
                if span.area == NULL_AREA {
                    continue;
                }
                let floor = span.max as i32;
                let ceiling = snapshot[idx].get(span_idx + 1).map(|s| s.min as i32).unwrap_or(i32::MAX);
                if ceiling - floor < height {
                    continue;
                }

                let mut min_neighbour_floor = i32::MAX;
                let mut max_neighbour_floor = i32::MIN;

                for (dx, dz) in neighbour_offsets {
                    let nx = x + dx;
                    let nz = z + dz;
                    if nx < 0 || nz < 0 || nx >= hf.width || nz >= hf.depth {
                        min_neighbour_floor = min_neighbour_floor.min(-climb - 1);
                        continue;
                    }
                    let ncol = &snapshot[(nz * hf.width + nx) as usize];
                    let Some(nspan) = ncol.iter().find(|s| (s.max as i32 - floor).abs() <= height) else {
                        min_neighbour_floor = min_neighbour_floor.min(-climb - 1);
                        continue;
                    };
                    min_neighbour_floor = min_neighbour_floor.min(nspan.max as i32);
                    max_neighbour_floor = max_neighbour_floor.max(nspan.max as i32);
                }

                if max_neighbour_floor - min_neighbour_floor > climb {
                    hf.cells[idx][span_idx].area = NULL_AREA;
                }
            }
        }
    }
}

/// Mark spans whose open height above the floor is below `walkable_height`
/// as unwalkable.
pub fn filter_walkable_low_height_spans(cfg: &NavMeshBuildConfig, hf: &mut Heightfield) {
    let height = cfg.walkable_height as i32;
    for col in &mut hf.cells {
        for i in 0..col.len() {
            let floor = col[i].max as i32;
            let ceiling = col.get(i + 1).map(|s| s.min as i32).unwrap_or(i32::MAX);
            if ceiling - floor < height {
                col[i].area = NULL_AREA;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_triangle_rasterizes_into_single_span() {
        let cfg = NavMeshBuildConfig { cell_size: 1.0, cell_height: 0.5, ..Default::default() };
        let mut hf = Heightfield { width: 8, depth: 8, bmin: Vec3::ZERO, cell_size: 1.0, cell_height: 0.5, cells: vec![Vec::new(); 64] };
        rasterize_triangle(&mut hf, &cfg, Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 1.0, 5.0), Vec3::new(5.0, 1.0, 1.0));

        let col = hf.column(2, 2);
        assert!(!col.is_empty());
        assert_eq!(col[0].area, WALKABLE_AREA);
    }

    #[test]
    fn steep_triangle_is_not_walkable() {
        let cfg = NavMeshBuildConfig { cell_size: 1.0, cell_height: 0.5, walkable_slope_deg: 30.0, ..Default::default() };
        let mut hf = Heightfield { width: 8, depth: 8, bmin: Vec3::ZERO, cell_size: 1.0, cell_height: 0.5, cells: vec![Vec::new(); 64] };
        rasterize_triangle(&mut hf, &cfg, Vec3::new(1.0, 0.0, 1.0), Vec3::new(5.0, 0.0, 1.0), Vec3::new(1.0, 5.0, 5.0));

        let col = hf.column(2, 2);
        assert!(!col.is_empty());
        assert_eq!(col[0].area, NULL_AREA);
    }
}
