//! Contour tracing and simplification (§4.5 step 8): walks the boundary of
//! every region in the compact heightfield, then collapses each traced
//! edge loop to a small set of straight segments bounded by
//! `max_simplification_error` and `max_edge_length`.

use crate::error::NavMeshError;

use super::compact::CompactHeightfield;
use super::NavMeshBuildConfig;

/// Clockwise cell-edge walk order: west, south, east, north. Matches the
/// corner-vertex convention below, not `CompactSpan::connections`' own
/// west/east/north/south ordering (remapped via `CONN_FOR_DIR`).
const DIR_DX: [i32; 4] = [-1, 0, 1, 0];
const DIR_DZ: [i32; 4] = [0, 1, 0, -1];
const CONN_FOR_DIR: [usize; 4] = [0, 3, 1, 2];

#[derive(Clone, Copy, Debug)]
pub struct ContourVertex {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Region id on the far side of this vertex's outgoing edge, or 0 at a
    /// tile/unwalkable border.
    pub region: u32,
}

#[derive(Clone, Debug)]
pub struct Contour {
    pub region: u16,
    pub area: u8,
    pub vertices: Vec<ContourVertex>,
}

#[derive(Default)]
pub struct ContourSet {
    pub contours: Vec<Contour>,
}

pub fn build_contours(cfg: &NavMeshBuildConfig, chf: &CompactHeightfield) -> Result<ContourSet, NavMeshError> {
    let n = chf.spans.len();
    let mut boundary_flags = vec![0u8; n];

    for span_idx in 0..n {
        if chf.areas[span_idx] == 0 {
            continue;
        }
        let mut flags = 0u8;
        for dir in 0..4u8 {
            let conn = chf.spans[span_idx].connections[CONN_FOR_DIR[dir as usize]];
            let other_region = conn.map(|s| chf.regions[s as usize]).unwrap_or(0);
            if chf.regions[span_idx] != other_region {
                flags |= 1 << dir;
            }
        }
        boundary_flags[span_idx] = flags;
    }

    let mut set = ContourSet::default();
    let mut raw = Vec::with_capacity(256);
    let mut simplified = Vec::with_capacity(64);

    for span_idx in 0..n {
        if boundary_flags[span_idx] == 0 || chf.regions[span_idx] == 0 || chf.areas[span_idx] == 0 {
            continue;
        }

        raw.clear();
        simplified.clear();
        walk_contour(chf, span_idx, &mut boundary_flags, &mut raw);
        simplify_contour(&raw, &mut simplified, cfg.max_simplification_error, cfg.max_edge_length);
        remove_degenerate_segments(&mut simplified);

        if simplified.len() >= 3 {
            set.contours.push(Contour { region: chf.regions[span_idx], area: chf.areas[span_idx], vertices: simplified.clone() });
        }
    }

    if set.contours.is_empty() {
        return Err(NavMeshError::BuildStageFailed { stage: "contour", reason: "no region boundaries traced".into() });
    }
    Ok(set)
}

fn neighbour_span(chf: &CompactHeightfield, span_idx: usize, dir: u8) -> Option<usize> {
    chf.spans[span_idx].connections[CONN_FOR_DIR[dir as usize]].map(|s| s as usize)
}

/// Height (and bordering region) at the grid corner a boundary edge in
/// direction `dir` ends at: the max floor of every walkable span sharing
/// that corner, mirroring how up to four cells meet at one lattice point.
fn corner_height_and_region(chf: &CompactHeightfield, span_idx: usize, dir: u8) -> (u16, u32) {
    let next_dir = (dir + 1) & 3;
    let mut height = chf.spans[span_idx].y;
    let mut region = 0u32;

    if let Some(a) = neighbour_span(chf, span_idx, dir) {
        height = height.max(chf.spans[a].y);
        region = chf.regions[a] as u32;
        if let Some(diag) = neighbour_span(chf, a, next_dir) {
            height = height.max(chf.spans[diag].y);
        }
    }
    if let Some(b) = neighbour_span(chf, span_idx, next_dir) {
        height = height.max(chf.spans[b].y);
        if region == 0 {
            region = chf.regions[b] as u32;
        }
        if let Some(diag) = neighbour_span(chf, b, dir) {
            height = height.max(chf.spans[diag].y);
        }
    }

    (height, region)
}

fn walk_contour(chf: &CompactHeightfield, start_span: usize, boundary_flags: &mut [u8], out: &mut Vec<ContourVertex>) {
    let mut span_idx = start_span;
    let mut dir = 0u8;
    while boundary_flags[span_idx] & (1 << dir) == 0 {
        dir += 1;
    }
    let start_dir = dir;

    loop {
        if boundary_flags[span_idx] & (1 << dir) != 0 {
            let (cx, cz) = chf.span_column(span_idx);
            let (height, region) = corner_height_and_region(chf, span_idx, dir);

            let (mut px, mut pz) = (cx, cz);
            match dir {
                0 => pz += 1,
                1 => {
                    px += 1;
                    pz += 1;
                }
                2 => px += 1,
                _ => {}
            }
            out.push(ContourVertex { x: px, y: height as i32, z: pz, region });

            boundary_flags[span_idx] &= !(1 << dir);
            dir = (dir + 1) & 3;
        } else {
            let Some(next_span) = neighbour_span(chf, span_idx, dir) else { break };
            span_idx = next_span;
            dir = (dir + 3) & 3;
        }

        if span_idx == start_span && dir == start_dir {
            break;
        }
    }
}

fn point_seg_distance(p: (i32, i32), a: (i32, i32), b: (i32, i32)) -> f32 {
    let (px, pz) = (p.0 as f32, p.1 as f32);
    let (ax, az) = (a.0 as f32, a.1 as f32);
    let (bx, bz) = (b.0 as f32, b.1 as f32);
    let (dx, dz) = (bx - ax, bz - az);
    let len_sq = dx * dx + dz * dz;
    if len_sq < 1e-9 {
        return ((px - ax).powi(2) + (pz - az).powi(2)).sqrt();
    }
    let t = (((px - ax) * dx + (pz - az) * dz) / len_sq).clamp(0.0, 1.0);
    let (cx, cz) = (ax + t * dx, az + t * dz);
    ((px - cx).powi(2) + (pz - cz).powi(2)).sqrt()
}

/// Straight-line (Douglas-Peucker over the traced lattice path) simplification
/// of one closed boundary loop, subdividing on unconnected edges only and
/// never producing a gap longer than `max_edge_len`.
fn simplify_contour(points: &[ContourVertex], simplified: &mut Vec<ContourVertex>, max_error: f32, max_edge_len: u16) {
    let has_connections = points.iter().any(|p| p.region != 0);
    let n = points.len();

    if has_connections {
        for i in 0..n {
            let next = (i + 1) % n;
            if points[i].region != points[next].region {
                simplified.push(points[i]);
            }
        }
    } else {
        let (mut ll, mut ur) = (0usize, 0usize);
        for i in 1..n {
            if points[i].x < points[ll].x || (points[i].x == points[ll].x && points[i].z < points[ll].z) {
                ll = i;
            }
            if points[i].x > points[ur].x || (points[i].x == points[ur].x && points[i].z > points[ur].z) {
                ur = i;
            }
        }
        simplified.push(points[ll]);
        simplified.push(points[ur]);
    }

    if simplified.is_empty() {
        simplified.extend_from_slice(points);
        return;
    }

    let mut i = 0;
    while i < simplified.len() {
        let next = (i + 1) % simplified.len();
        let a = simplified[i];
        let b = simplified[next];

        let a_idx = points.iter().position(|p| p.x == a.x && p.z == a.z).unwrap_or(0);
        let b_idx = points.iter().position(|p| p.x == b.x && p.z == b.z).unwrap_or(0);

        let mut c = (a_idx + 1) % n;
        let end = b_idx;

        let mut max_dev = 0.0f32;
        let mut max_point: Option<ContourVertex> = None;

        while c != end {
            if points[c].region == 0 {
                let dev = point_seg_distance((points[c].x, points[c].z), (a.x, a.z), (b.x, b.z));
                if dev > max_dev {
                    max_dev = dev;
                    max_point = Some(points[c]);
                }
            }
            c = (c + 1) % n;
        }

        let edge_len_sq = ((b.x - a.x).pow(2) + (b.z - a.z).pow(2)) as f32;
        let too_long = max_edge_len > 0 && edge_len_sq > (max_edge_len as f32).powi(2);

        if let Some(point) = max_point {
            if max_dev > max_error || too_long {
                simplified.insert(i + 1, point);
                continue;
            }
        } else if too_long {
            simplified.insert(i + 1, ContourVertex { x: (a.x + b.x) / 2, y: (a.y + b.y) / 2, z: (a.z + b.z) / 2, region: 0 });
            continue;
        }

        i += 1;
    }
}

fn remove_degenerate_segments(vertices: &mut Vec<ContourVertex>) {
    let mut i = 0;
    while vertices.len() > 3 && i < vertices.len() {
        let next = (i + 1) % vertices.len();
        if vertices[i].x == vertices[next].x && vertices[i].z == vertices[next].z {
            vertices.remove(next.min(i));
        } else {
            i += 1;
        }
    }
}
