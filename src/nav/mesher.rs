//! Polygon mesh construction (§4.5 step 9): ear-clip each traced contour
//! into triangles, then greedily fuse triangles that share an edge back
//! into convex polygons bounded by `max_verts_per_poly`.

use crate::error::NavMeshError;

use super::contour::ContourSet;
use super::NavMeshBuildConfig;

pub type GridVertex = (i32, i32, i32);

pub struct PolyMesh {
    pub verts: Vec<GridVertex>,
    pub polys: Vec<Vec<u32>>,
    pub neighbours: Vec<Vec<Option<u32>>>,
    pub regions: Vec<u16>,
    pub areas: Vec<u8>,
    pub max_verts_per_poly: u8,
}

pub fn build_poly_mesh(cfg: &NavMeshBuildConfig, contours: &ContourSet) -> Result<PolyMesh, NavMeshError> {
    let mut verts: Vec<GridVertex> = Vec::new();
    let mut lookup: std::collections::HashMap<GridVertex, u32> = std::collections::HashMap::new();
    let mut polys: Vec<Vec<u32>> = Vec::new();
    let mut regions = Vec::new();
    let mut areas = Vec::new();

    for contour in &contours.contours {
        if contour.vertices.len() < 3 {
            continue;
        }

        let local: Vec<u32> = contour
            .vertices
            .iter()
            .map(|v| {
                let key = (v.x, v.y, v.z);
                *lookup.entry(key).or_insert_with(|| {
                    verts.push(key);
                    (verts.len() - 1) as u32
                })
            })
            .collect();

        let oriented = if signed_area(&local, &verts) < 0.0 { local.iter().rev().copied().collect() } else { local };

        for tri in triangulate_polygon(&oriented, &verts) {
            polys.push(tri.to_vec());
            regions.push(contour.region);
            areas.push(contour.area);
        }
    }

    if polys.is_empty() {
        return Err(NavMeshError::BuildStageFailed { stage: "mesher", reason: "no triangles produced from contours".into() });
    }

    merge_polys(&mut polys, &mut regions, &mut areas, &verts, cfg.max_verts_per_poly);
    let neighbours = build_adjacency(&polys);

    Ok(PolyMesh { verts, polys, neighbours, regions, areas, max_verts_per_poly: cfg.max_verts_per_poly })
}

fn cross_xz(o: GridVertex, a: GridVertex, b: GridVertex) -> f32 {
    let (ax, az) = ((a.0 - o.0) as f32, (a.2 - o.2) as f32);
    let (bx, bz) = ((b.0 - o.0) as f32, (b.2 - o.2) as f32);
    ax * bz - az * bx
}

fn signed_area(poly: &[u32], verts: &[GridVertex]) -> f32 {
    let mut area = 0.0;
    let n = poly.len();
    for i in 0..n {
        let a = verts[poly[i] as usize];
        let b = verts[poly[(i + 1) % n] as usize];
        area += (a.0 * b.2 - b.0 * a.2) as f32;
    }
    area * 0.5
}

fn point_in_triangle(p: GridVertex, a: GridVertex, b: GridVertex, c: GridVertex) -> bool {
    let d1 = cross_xz(a, b, p);
    let d2 = cross_xz(b, c, p);
    let d3 = cross_xz(c, a, p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn is_ear(prev: u32, cur: u32, next: u32, indices: &[u32], verts: &[GridVertex]) -> bool {
    let (pv, cv, nv) = (verts[prev as usize], verts[cur as usize], verts[next as usize]);
    if cross_xz(pv, cv, nv) <= 0.0 {
        return false;
    }
    for &v in indices {
        if v == prev || v == cur || v == next {
            continue;
        }
        if point_in_triangle(verts[v as usize], pv, cv, nv) {
            return false;
        }
    }
    true
}

/// Ear-clipping triangulation of one CCW simple polygon (no holes — region
/// boundaries never self-intersect by construction of the contour trace).
fn triangulate_polygon(poly: &[u32], verts: &[GridVertex]) -> Vec<[u32; 3]> {
    let mut indices = poly.to_vec();
    let mut tris = Vec::new();

    while indices.len() > 3 {
        let n = indices.len();
        let mut clipped = false;
        for i in 0..n {
            let prev = indices[(i + n - 1) % n];
            let cur = indices[i];
            let next = indices[(i + 1) % n];
            if is_ear(prev, cur, next, &indices, verts) {
                tris.push([prev, cur, next]);
                indices.remove(i);
                clipped = true;
                break;
            }
        }
        if !clipped {
            break; // numerically degenerate polygon; keep what triangulated cleanly
        }
    }
    if indices.len() == 3 {
        tris.push([indices[0], indices[1], indices[2]]);
    }
    tris
}

fn is_convex_polygon(poly: &[u32], verts: &[GridVertex]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let a = verts[poly[i] as usize];
        let b = verts[poly[(i + 1) % n] as usize];
        let c = verts[poly[(i + 2) % n] as usize];
        if cross_xz(a, b, c) < 0.0 {
            return false;
        }
    }
    true
}

fn try_merge(a: &[u32], b: &[u32], verts: &[GridVertex], max_verts: u8) -> Option<Vec<u32>> {
    for ai in 0..a.len() {
        let a0 = a[ai];
        let a1 = a[(ai + 1) % a.len()];
        for bi in 0..b.len() {
            let b0 = b[bi];
            let b1 = b[(bi + 1) % b.len()];
            if a0 != b1 || a1 != b0 {
                continue;
            }

            let merged_len = a.len() + b.len() - 2;
            if merged_len as u8 > max_verts {
                return None;
            }

            let mut merged = Vec::with_capacity(merged_len);
            let mut k = (ai + 1) % a.len();
            while k != ai {
                merged.push(a[k]);
                k = (k + 1) % a.len();
            }
            merged.push(a[ai]);
            let mut k = (bi + 1) % b.len();
            while k != bi {
                merged.push(b[k]);
                k = (k + 1) % b.len();
            }

            return is_convex_polygon(&merged, verts).then_some(merged);
        }
    }
    None
}

/// Greedily fuses any pair of same-region polygons that share an edge,
/// whenever the fused shape stays convex and within `max_verts`.
fn merge_polys(polys: &mut Vec<Vec<u32>>, regions: &mut Vec<u16>, areas: &mut Vec<u8>, verts: &[GridVertex], max_verts: u8) {
    loop {
        let mut merged_pair = None;
        'search: for i in 0..polys.len() {
            for j in (i + 1)..polys.len() {
                if regions[i] != regions[j] {
                    continue;
                }
                if let Some(merged) = try_merge(&polys[i], &polys[j], verts, max_verts) {
                    merged_pair = Some((i, j, merged));
                    break 'search;
                }
            }
        }

        let Some((i, j, merged)) = merged_pair else { break };
        polys[i] = merged;
        polys.remove(j);
        regions.remove(j);
        areas.remove(j);
    }
}

fn build_adjacency(polys: &[Vec<u32>]) -> Vec<Vec<Option<u32>>> {
    let mut neighbours = vec![Vec::new(); polys.len()];
    for (i, poly) in polys.iter().enumerate() {
        neighbours[i] = vec![None; poly.len()];
        for (edge_idx, window) in poly.iter().enumerate() {
            let next = poly[(edge_idx + 1) % poly.len()];
            let (v0, v1) = (*window, next);
            'find: for (j, other) in polys.iter().enumerate() {
                if i == j {
                    continue;
                }
                for k in 0..other.len() {
                    if other[k] == v1 && other[(k + 1) % other.len()] == v0 {
                        neighbours[i][edge_idx] = Some(j as u32);
                        break 'find;
                    }
                }
            }
        }
    }
    neighbours
}
