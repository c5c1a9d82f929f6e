//! Navigation area types and area-painting volumes (§4.5 step 6).

use glam::Vec3;

use super::compact::CompactHeightfield;

/// 0 = Ground; 1 = Water; 2..31 user-defined; `NULL` marks unwalkable.
pub type AreaType = u8;

pub const NULL_AREA: AreaType = 0;
pub const WALKABLE_AREA: AreaType = 63;

#[derive(Clone, Copy, Debug)]
pub enum NavAreaShape {
    Box { half_extents: Vec3 },
    Cylinder { radius: f32, half_height: f32 },
    /// XZ polygon, even-odd rule, restricted to a Y band.
    ConvexVolume { min_y: f32, max_y: f32 },
}

/// An externally registered area volume, positioned in world space and
/// carrying the area type to paint onto any compact-heightfield cell it
/// overlaps.
#[derive(Clone, Debug)]
pub struct NavAreaVolume {
    pub center: Vec3,
    pub shape: NavAreaShape,
    pub points_xz: Vec<(f32, f32)>,
    pub area_type: AreaType,
}

fn point_in_polygon_xz(points: &[(f32, f32)], x: f32, z: f32) -> bool {
    let mut inside = false;
    let n = points.len();
    for i in 0..n {
        let (xi, zi) = points[i];
        let (xj, zj) = points[(i + n - 1) % n];
        if (zi > z) != (zj > z) {
            let x_cross = xi + (z - zi) / (zj - zi) * (xj - xi);
            if x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Paint `volume.area_type` onto every compact-heightfield cell it
/// overlaps. Box/Cylinder volumes use axis-aligned cell ranges; convex
/// volumes use the even-odd rule against `points_xz`, restricted to
/// `[min_y, max_y]`.
pub fn paint_area(chf: &mut CompactHeightfield, volume: &NavAreaVolume) {
    for cz in 0..chf.height {
        for cx in 0..chf.width {
            let (wx, wz) = chf.cell_center_xz(cx, cz);

            let in_footprint = match &volume.shape {
                NavAreaShape::Box { half_extents } => {
                    (wx - volume.center.x).abs() <= half_extents.x && (wz - volume.center.z).abs() <= half_extents.z
                }
                NavAreaShape::Cylinder { radius, .. } => {
                    let dx = wx - volume.center.x;
                    let dz = wz - volume.center.z;
                    dx * dx + dz * dz <= radius * radius
                }
                NavAreaShape::ConvexVolume { .. } => point_in_polygon_xz(&volume.points_xz, wx, wz),
            };
            if !in_footprint {
                continue;
            }

            let (min_y, max_y) = match &volume.shape {
                NavAreaShape::Box { half_extents } => (volume.center.y - half_extents.y, volume.center.y + half_extents.y),
                NavAreaShape::Cylinder { half_height, .. } => (volume.center.y - half_height, volume.center.y + half_height),
                NavAreaShape::ConvexVolume { min_y, max_y } => (*min_y, *max_y),
            };

            for span_idx in chf.column_spans(cx, cz) {
                let span_y = chf.span_floor_world_y(span_idx);
                if span_y >= min_y && span_y <= max_y {
                    chf.areas[span_idx] = volume.area_type;
                }
            }
        }
    }
}
