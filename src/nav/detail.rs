//! Detail mesh construction (§4.5 step 10): fans each polygon into
//! triangles at full heightfield resolution, then inserts extra sample
//! points wherever the flat fan disagrees with the true ground height by
//! more than `detail_sample_max_error`.

use glam::Vec3;

use crate::error::NavMeshError;

use super::compact::CompactHeightfield;
use super::mesher::PolyMesh;
use super::NavMeshBuildConfig;

#[derive(Clone)]
pub struct DetailMesh {
    /// (vertex base, vertex count, triangle base, triangle count) per poly,
    /// indexing into `verts`/`tris`.
    pub meshes: Vec<(u32, u32, u32, u32)>,
    pub verts: Vec<Vec3>,
    pub tris: Vec<[u32; 3]>,
}

fn world_vertex(chf: &CompactHeightfield, v: (i32, i32, i32)) -> Vec3 {
    Vec3::new(chf.bmin.x + v.0 as f32 * chf.cell_size, chf.bmin.y + v.1 as f32 * chf.cell_height, chf.bmin.z + v.2 as f32 * chf.cell_size)
}

fn sample_ground_height(chf: &CompactHeightfield, wx: f32, wz: f32, fallback: f32) -> f32 {
    let cx = ((wx - chf.bmin.x) / chf.cell_size) as i32;
    let cz = ((wz - chf.bmin.z) / chf.cell_size) as i32;
    if cx < 0 || cz < 0 || cx >= chf.width || cz >= chf.height {
        return fallback;
    }
    let mut best = fallback;
    let mut best_dy = f32::MAX;
    for span_idx in chf.column_spans(cx, cz) {
        let y = chf.span_floor_world_y(span_idx);
        let dy = (y - fallback).abs();
        if dy < best_dy {
            best_dy = dy;
            best = y;
        }
    }
    best
}

fn barycentric(p: (f32, f32), a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32)> {
    let v0 = (b.x - a.x, b.z - a.z);
    let v1 = (c.x - a.x, c.z - a.z);
    let v2 = (p.0 - a.x, p.1 - a.z);
    let den = v0.0 * v1.1 - v1.0 * v0.1;
    if den.abs() < 1e-9 {
        return None;
    }
    let v = (v2.0 * v1.1 - v1.0 * v2.1) / den;
    let w = (v0.0 * v2.1 - v2.0 * v0.1) / den;
    let u = 1.0 - v - w;
    if u >= -1e-4 && v >= -1e-4 && w >= -1e-4 {
        Some((u, v, w))
    } else {
        None
    }
}

/// Triangulates one polygon at full resolution: start from a triangle fan,
/// then insert a new interior sample wherever the fan's flat interpolation
/// misses the real ground height by more than the configured tolerance.
fn build_poly_detail(chf: &CompactHeightfield, cfg: &NavMeshBuildConfig, world_verts: &[Vec3]) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let mut verts = world_verts.to_vec();
    let mut tris: Vec<[u32; 3]> = (1..world_verts.len() - 1).map(|i| [0, i as u32, (i + 1) as u32]).collect();

    if cfg.detail_sample_dist <= 0.0 {
        return (verts, tris);
    }

    let min = verts.iter().fold(verts[0], |m, v| m.min(*v));
    let max = verts.iter().fold(verts[0], |m, v| m.max(*v));

    let mut z = min.z;
    while z <= max.z {
        let mut x = min.x;
        while x <= max.x {
            let sample = (x, z);
            x += cfg.detail_sample_dist;

            let Some((tri_idx, bary)) = tris.iter().enumerate().find_map(|(i, t)| {
                barycentric(sample, verts[t[0] as usize], verts[t[1] as usize], verts[t[2] as usize]).map(|b| (i, b))
            }) else {
                continue;
            };

            let t = tris[tri_idx];
            let (u, v, w) = bary;
            let flat_y = u * verts[t[0] as usize].y + v * verts[t[1] as usize].y + w * verts[t[2] as usize].y;
            let real_y = sample_ground_height(chf, sample.0, sample.1, flat_y);

            if (real_y - flat_y).abs() <= cfg.detail_sample_max_error {
                continue;
            }

            let new_idx = verts.len() as u32;
            verts.push(Vec3::new(sample.0, real_y, sample.1));
            let [a, b, c] = t;
            tris.remove(tri_idx);
            tris.push([a, b, new_idx]);
            tris.push([b, c, new_idx]);
            tris.push([c, a, new_idx]);
        }
        z += cfg.detail_sample_dist;
    }

    (verts, tris)
}

pub fn build_detail_mesh(cfg: &NavMeshBuildConfig, chf: &CompactHeightfield, poly_mesh: &PolyMesh) -> Result<DetailMesh, NavMeshError> {
    let mut verts = Vec::new();
    let mut tris = Vec::new();
    let mut meshes = Vec::with_capacity(poly_mesh.polys.len());

    for poly in &poly_mesh.polys {
        let world_poly: Vec<Vec3> = poly.iter().map(|&v| world_vertex(chf, poly_mesh.verts[v as usize])).collect();
        let (local_verts, local_tris) = build_poly_detail(chf, cfg, &world_poly);

        let vert_base = verts.len() as u32;
        let tri_base = tris.len() as u32;
        verts.extend(local_verts);
        tris.extend(local_tris.iter().map(|t| [t[0] + vert_base, t[1] + vert_base, t[2] + vert_base]));
        meshes.push((vert_base, (verts.len() as u32) - vert_base, tri_base, (tris.len() as u32) - tri_base));
    }

    if meshes.is_empty() {
        return Err(NavMeshError::BuildStageFailed { stage: "detail", reason: "poly mesh had no polygons to sample".into() });
    }
    Ok(DetailMesh { meshes, verts, tris })
}
