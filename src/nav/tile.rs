//! Tile packing and the persisted wire format (§4.5 step 11, §6): turns a
//! poly/detail mesh pair into a `NavMeshTile`, links matching border edges
//! between adjacent tiles, and (de)serializes heightfield layers for the
//! dynamic tile cache using a deterministic RLE byte compressor.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec3;

use crate::error::NavMeshError;

use super::compact::HeightfieldLayer;
use super::detail::DetailMesh;
use super::mesher::PolyMesh;
use super::NavMeshBuildConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PolyRef {
    pub tile_x: i32,
    pub tile_z: i32,
    pub poly_index: u16,
}

pub struct NavMeshTile {
    pub tx: i32,
    pub tz: i32,
    pub bmin: Vec3,
    pub bmax: Vec3,
    pub verts: Vec<Vec3>,
    pub polys: Vec<Vec<u32>>,
    pub neighbours: Vec<Vec<Option<PolyRef>>>,
    pub regions: Vec<u16>,
    pub areas: Vec<u8>,
    pub detail: DetailMesh,
}

impl NavMeshTile {
    pub fn poly_world_verts(&self, poly_index: usize) -> Vec<Vec3> {
        self.polys[poly_index].iter().map(|&v| self.verts[v as usize]).collect()
    }
}

#[derive(Default)]
pub struct NavMesh {
    pub tile_size: u16,
    pub cell_size: f32,
    pub tiles: HashMap<(i32, i32), NavMeshTile>,
}

const BORDER_LINK_EPS: f32 = 1e-3;

impl NavMesh {
    pub fn new(tile_size: u16, cell_size: f32) -> Self {
        NavMesh { tile_size, cell_size, tiles: HashMap::new() }
    }

    pub fn add_tile(&mut self, tile: NavMeshTile) {
        let coord = (tile.tx, tile.tz);
        self.tiles.insert(coord, tile);
        self.link_tile_borders(coord);
    }

    pub fn remove_tile(&mut self, tx: i32, tz: i32) {
        self.tiles.remove(&(tx, tz));
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn get_tile(&self, tx: i32, tz: i32) -> Option<&NavMeshTile> {
        self.tiles.get(&(tx, tz))
    }

    pub fn poly_vertices(&self, r: PolyRef) -> Option<Vec<Vec3>> {
        self.tiles.get(&(r.tile_x, r.tile_z)).map(|t| t.poly_world_verts(r.poly_index as usize))
    }

    /// Stitches border edges of the tile at `coord` to matching border
    /// edges of its four neighbours, both directions, by world-space
    /// vertex proximity (§4.5 "Build" tile assembly).
    fn link_tile_borders(&mut self, coord: (i32, i32)) {
        for (dx, dz) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            let neighbour_coord = (coord.0 + dx, coord.1 + dz);
            self.link_tile_pair(coord, neighbour_coord);
        }
    }

    fn link_tile_pair(&mut self, a: (i32, i32), b: (i32, i32)) {
        let (Some(_), Some(_)) = (self.tiles.get(&a), self.tiles.get(&b)) else { return };

        let a_edges = self.border_edges(a);
        let b_edges = self.border_edges(b);

        for &(a_poly, a_edge, a0, a1) in &a_edges {
            for &(b_poly, b_edge, b0, b1) in &b_edges {
                if edge_matches(a0, a1, b1, b0) {
                    if let Some(tile) = self.tiles.get_mut(&a) {
                        tile.neighbours[a_poly][a_edge] = Some(PolyRef { tile_x: b.0, tile_z: b.1, poly_index: b_poly as u16 });
                    }
                    if let Some(tile) = self.tiles.get_mut(&b) {
                        tile.neighbours[b_poly][b_edge] = Some(PolyRef { tile_x: a.0, tile_z: a.1, poly_index: a_poly as u16 });
                    }
                }
            }
        }
    }

    fn border_edges(&self, coord: (i32, i32)) -> Vec<(usize, usize, Vec3, Vec3)> {
        let Some(tile) = self.tiles.get(&coord) else { return Vec::new() };
        let mut edges = Vec::new();
        for (poly_idx, poly) in tile.polys.iter().enumerate() {
            for edge_idx in 0..poly.len() {
                if tile.neighbours[poly_idx][edge_idx].is_some() {
                    continue;
                }
                let v0 = tile.verts[poly[edge_idx] as usize];
                let v1 = tile.verts[poly[(edge_idx + 1) % poly.len()] as usize];
                edges.push((poly_idx, edge_idx, v0, v1));
            }
        }
        edges
    }
}

fn edge_matches(a0: Vec3, a1: Vec3, b0: Vec3, b1: Vec3) -> bool {
    a0.distance(b0) < BORDER_LINK_EPS && a1.distance(b1) < BORDER_LINK_EPS
}

pub fn create_nav_mesh_tile(tx: i32, tz: i32, origin: Vec3, cfg: &NavMeshBuildConfig, poly_mesh: &PolyMesh, detail: &DetailMesh) -> NavMeshTile {
    let verts: Vec<Vec3> =
        poly_mesh.verts.iter().map(|&(x, y, z)| origin + Vec3::new(x as f32 * cfg.cell_size, y as f32 * cfg.cell_height, z as f32 * cfg.cell_size)).collect();

    let neighbours =
        poly_mesh.neighbours.iter().map(|edges| edges.iter().map(|e| e.map(|idx| PolyRef { tile_x: tx, tile_z: tz, poly_index: idx as u16 })).collect()).collect();

    let size = cfg.tile_world_size();
    NavMeshTile {
        tx,
        tz,
        bmin: origin,
        bmax: origin + Vec3::new(size, 0.0, size),
        verts,
        polys: poly_mesh.polys.clone(),
        neighbours,
        regions: poly_mesh.regions.clone(),
        areas: poly_mesh.areas.clone(),
        detail: detail.clone(),
    }
}

pub const TILE_MAGIC: u32 = u32::from_le_bytes(*b"DTLC");
pub const TILE_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug)]
pub struct TileHeader {
    pub magic: u32,
    pub version: u32,
    pub tx: i32,
    pub ty: i32,
    pub tlayer: i32,
    pub bmin: [f32; 3],
    pub bmax: [f32; 3],
    pub width: u8,
    pub height: u8,
    pub minx: u8,
    pub maxx: u8,
    pub miny: u8,
    pub maxy: u8,
    pub hmin: u16,
    pub hmax: u16,
}

impl TileHeader {
    pub fn for_layer(tx: i32, tz: i32, layer_index: i32, layer: &HeightfieldLayer) -> Self {
        TileHeader {
            magic: TILE_MAGIC,
            version: TILE_VERSION,
            tx,
            ty: tz,
            tlayer: layer_index,
            bmin: layer.bmin.to_array(),
            bmax: layer.bmax.to_array(),
            width: layer.width,
            height: layer.height,
            minx: layer.bounds_min_cell.0,
            maxx: layer.bounds_max_cell.0,
            miny: layer.bounds_min_cell.1,
            maxy: layer.bounds_max_cell.1,
            hmin: layer.heights.iter().copied().filter(|&h| h != 0xFFFF).min().unwrap_or(0),
            hmax: layer.heights.iter().copied().filter(|&h| h != 0xFFFF).max().unwrap_or(0),
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.magic)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_i32::<LittleEndian>(self.tx)?;
        w.write_i32::<LittleEndian>(self.ty)?;
        w.write_i32::<LittleEndian>(self.tlayer)?;
        for v in self.bmin {
            w.write_f32::<LittleEndian>(v)?;
        }
        for v in self.bmax {
            w.write_f32::<LittleEndian>(v)?;
        }
        w.write_u8(self.width)?;
        w.write_u8(self.height)?;
        w.write_u8(self.minx)?;
        w.write_u8(self.maxx)?;
        w.write_u8(self.miny)?;
        w.write_u8(self.maxy)?;
        w.write_u16::<LittleEndian>(self.hmin)?;
        w.write_u16::<LittleEndian>(self.hmax)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic = r.read_u32::<LittleEndian>()?;
        let version = r.read_u32::<LittleEndian>()?;
        let tx = r.read_i32::<LittleEndian>()?;
        let ty = r.read_i32::<LittleEndian>()?;
        let tlayer = r.read_i32::<LittleEndian>()?;
        let mut bmin = [0f32; 3];
        for v in bmin.iter_mut() {
            *v = r.read_f32::<LittleEndian>()?;
        }
        let mut bmax = [0f32; 3];
        for v in bmax.iter_mut() {
            *v = r.read_f32::<LittleEndian>()?;
        }
        let width = r.read_u8()?;
        let height = r.read_u8()?;
        let minx = r.read_u8()?;
        let maxx = r.read_u8()?;
        let miny = r.read_u8()?;
        let maxy = r.read_u8()?;
        let hmin = r.read_u16::<LittleEndian>()?;
        let hmax = r.read_u16::<LittleEndian>()?;
        Ok(TileHeader { magic, version, tx, ty, tlayer, bmin, bmax, width, height, minx, maxx, miny, maxy, hmin, hmax })
    }
}

/// Upper bound on `compress`'s output length for any input of length `n`:
/// worst case every byte is a singleton literal run, costing 1 control
/// byte per 127 literal bytes plus the literal bytes themselves.
pub fn max_compressed_size(n: usize) -> usize {
    n + n.div_ceil(127) + 1
}

/// Deterministic byte-oriented RLE: each block is either a run (high bit
/// set, `(len-1)` in the low 7 bits, followed by the repeated byte) or a
/// literal span (`len-1` in 7 bits, followed by that many raw bytes).
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(max_compressed_size(input.len()));
    let mut i = 0;
    while i < input.len() {
        let byte = input[i];
        let mut run = 1;
        while i + run < input.len() && input[i + run] == byte && run < 128 {
            run += 1;
        }

        if run >= 2 {
            out.push(0x80 | (run as u8 - 1));
            out.push(byte);
            i += run;
            continue;
        }

        let start = i;
        let mut j = i + 1;
        let mut lit_len = 1;
        while j < input.len() && lit_len < 128 {
            if j + 1 < input.len() && input[j] == input[j + 1] {
                break;
            }
            lit_len += 1;
            j += 1;
        }
        out.push(lit_len as u8 - 1);
        out.extend_from_slice(&input[start..start + lit_len]);
        i = start + lit_len;
    }
    out
}

pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, NavMeshError> {
    let mut out = Vec::with_capacity(expected_len);
    let mut i = 0;
    while i < input.len() {
        let ctrl = input[i];
        i += 1;
        if ctrl & 0x80 != 0 {
            let run = (ctrl & 0x7F) as usize + 1;
            let byte = *input.get(i).ok_or(NavMeshError::Compressor("truncated run block"))?;
            i += 1;
            out.extend(std::iter::repeat(byte).take(run));
        } else {
            let lit_len = ctrl as usize + 1;
            if i + lit_len > input.len() {
                return Err(NavMeshError::Compressor("truncated literal block"));
            }
            out.extend_from_slice(&input[i..i + lit_len]);
            i += lit_len;
        }
    }
    if out.len() != expected_len {
        return Err(NavMeshError::Compressor("decompressed length does not match header"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_round_trips() {
        let input = [0u8, 0, 0, 1, 2, 2, 2, 2, 3, 4, 5, 5];
        let packed = compress(&input);
        assert!(packed.len() <= max_compressed_size(input.len()));
        let unpacked = decompress(&packed, input.len()).unwrap();
        assert_eq!(&unpacked, &input);
    }

    #[test]
    fn compress_handles_all_unique_bytes() {
        let input: Vec<u8> = (0..=255u8).collect();
        let packed = compress(&input);
        let unpacked = decompress(&packed, input.len()).unwrap();
        assert_eq!(unpacked, input);
    }
}
