//! Region partitioning (§4.5 step 7): labels every walkable compact span
//! with a region id, using whichever of Watershed/Monotone/Layers the
//! build config selects, then prunes and merges by area.

use std::collections::HashMap;

use super::compact::CompactHeightfield;
use super::{NavMeshBuildConfig, PartitionMethod};

const NULL_REGION: u16 = 0;

pub fn build_regions(cfg: &NavMeshBuildConfig, chf: &mut CompactHeightfield, dist_field: Option<&[u16]>) {
    chf.regions = vec![NULL_REGION; chf.spans.len()];

    match cfg.partition_method {
        PartitionMethod::Watershed => {
            let dist = dist_field.expect("watershed partitioning requires a precomputed distance field");
            chf.max_distance = dist.iter().copied().max().unwrap_or(0);
            watershed_partition(chf, dist);
        }
        PartitionMethod::Monotone => monotone_partition(chf),
        PartitionMethod::Layers => layers_partition(chf),
    }

    filter_small_regions(cfg, chf);
}

/// Level-stepped flood fill seeded from the distance field, widening
/// outward from ridge lines two levels at a time until every span with
/// non-zero distance has a region.
fn watershed_partition(chf: &mut CompactHeightfield, dist: &[u16]) {
    let n = chf.spans.len();
    let mut region_id = 1u16;
    let mut level = (chf.max_distance + 1) & !1u16;

    loop {
        level = level.saturating_sub(2);

        expand_regions(chf, dist, level);

        for span_idx in 0..n {
            if chf.regions[span_idx] == NULL_REGION && dist[span_idx] >= level && chf.areas[span_idx] != 0 && flood_fill_region(chf, dist, span_idx, level, region_id) {
                if region_id == u16::MAX {
                    log::warn!("watershed partition exceeded {} regions; remaining spans left unassigned", u16::MAX - 1);
                    expand_regions(chf, dist, 0);
                    return;
                }
                region_id += 1;
            }
        }

        if level == 0 {
            break;
        }
    }

    // A final unconstrained expansion mops up any span an earlier level
    // skipped because none of its neighbours had a region yet.
    expand_regions(chf, dist, 0);
}

/// Grows existing regions into unlabeled neighbouring spans at or above
/// `level`, repeating until a full sweep makes no further assignment.
fn expand_regions(chf: &mut CompactHeightfield, dist: &[u16], level: u16) {
    loop {
        let mut changed = false;
        for span_idx in 0..chf.spans.len() {
            if chf.regions[span_idx] != NULL_REGION || dist[span_idx] < level || chf.areas[span_idx] == 0 {
                continue;
            }
            let mut counts: HashMap<u16, u32> = HashMap::new();
            for conn in chf.spans[span_idx].connections {
                if let Some(neighbour) = conn {
                    let r = chf.regions[neighbour as usize];
                    if r != NULL_REGION {
                        *counts.entry(r).or_default() += 1;
                    }
                }
            }
            if let Some((&best, _)) = counts.iter().max_by_key(|(_, &c)| c) {
                chf.regions[span_idx] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn flood_fill_region(chf: &mut CompactHeightfield, dist: &[u16], seed: usize, level: u16, region_id: u16) -> bool {
    let mut stack = vec![seed];
    let mut count = 0u32;
    chf.regions[seed] = region_id;

    while let Some(span_idx) = stack.pop() {
        count += 1;
        for conn in chf.spans[span_idx].connections {
            let Some(neighbour) = conn else { continue };
            let neighbour = neighbour as usize;
            if chf.regions[neighbour] == NULL_REGION && dist[neighbour] >= level && chf.areas[neighbour] != 0 {
                chf.regions[neighbour] = region_id;
                stack.push(neighbour);
            }
        }
    }

    count > 0
}

/// Classic row-major connected-component sweep with union-find, merging a
/// span only with its west and north neighbours (both already labeled by
/// the time a row-major walk reaches it). Produces the long, thin regions
/// Monotone partitioning is named for.
fn monotone_partition(chf: &mut CompactHeightfield) {
    let n = chf.spans.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    fn union(parent: &mut [usize], a: usize, b: usize) {
        let (ra, rb) = (find(parent, a), find(parent, b));
        if ra != rb {
            parent[ra] = rb;
        }
    }

    for cz in 0..chf.height {
        for cx in 0..chf.width {
            for span_idx in chf.column_spans(cx, cz) {
                if chf.areas[span_idx] == 0 {
                    continue;
                }
                // West (dir 0) and north (dir 2) were assigned indices in
                // NEIGHBOURS order by `link_neighbours`.
                if let Some(west) = chf.spans[span_idx].connections[0] {
                    if chf.areas[west as usize] != 0 {
                        union(&mut parent, span_idx, west as usize);
                    }
                }
                if let Some(north) = chf.spans[span_idx].connections[2] {
                    if chf.areas[north as usize] != 0 {
                        union(&mut parent, span_idx, north as usize);
                    }
                }
            }
        }
    }

    let mut ids: HashMap<usize, u16> = HashMap::new();
    let mut next_id = 1u16;
    for span_idx in 0..n {
        if chf.areas[span_idx] == 0 {
            continue;
        }
        let root = find(&mut parent, span_idx);
        let id = *ids.entry(root).or_insert_with(|| {
            let id = next_id;
            next_id += 1;
            id
        });
        chf.regions[span_idx] = id;
    }
}

/// Connected components over the span graph with no distance guidance,
/// one region per stack-independent walkable blob. Naturally supports
/// overlapping stacks since `connections` links spans at the same floor
/// height regardless of how many spans sit above or below them.
fn layers_partition(chf: &mut CompactHeightfield) {
    let zero_dist = vec![0u16; chf.spans.len()];
    let mut region_id = 1u16;
    for span_idx in 0..chf.spans.len() {
        if chf.regions[span_idx] != NULL_REGION || chf.areas[span_idx] == 0 {
            continue;
        }
        if flood_fill_region(chf, &zero_dist, span_idx, 0, region_id) {
            region_id += 1;
        }
    }
}

/// Deletes regions smaller than `min_region_area` (merging into the
/// dominant neighbour when one exists), then folds anything still under
/// `merge_region_area` into a neighbour to reduce fragmentation.
fn filter_small_regions(cfg: &NavMeshBuildConfig, chf: &mut CompactHeightfield) {
    let mut sizes: HashMap<u16, u32> = HashMap::new();
    for &r in &chf.regions {
        if r != NULL_REGION {
            *sizes.entry(r).or_default() += 1;
        }
    }

    for threshold in [cfg.min_region_area, cfg.merge_region_area] {
        let small: Vec<u16> = sizes.iter().filter(|(_, &count)| count < threshold).map(|(&id, _)| id).collect();
        for region in small {
            if sizes.get(&region).copied().unwrap_or(0) >= threshold {
                continue; // already absorbed by an earlier merge this pass
            }
            let replacement = dominant_neighbour_region(chf, region);
            let moved = relabel_region(chf, region, replacement.unwrap_or(NULL_REGION));
            sizes.remove(&region);
            if let Some(target) = replacement {
                *sizes.entry(target).or_default() += moved;
            }
        }
    }
}

fn dominant_neighbour_region(chf: &CompactHeightfield, region: u16) -> Option<u16> {
    let mut counts: HashMap<u16, u32> = HashMap::new();
    for span_idx in 0..chf.spans.len() {
        if chf.regions[span_idx] != region {
            continue;
        }
        for conn in chf.spans[span_idx].connections {
            if let Some(neighbour) = conn {
                let r = chf.regions[neighbour as usize];
                if r != NULL_REGION && r != region {
                    *counts.entry(r).or_default() += 1;
                }
            }
        }
    }
    counts.into_iter().max_by_key(|(_, c)| *c).map(|(id, _)| id)
}

fn relabel_region(chf: &mut CompactHeightfield, from: u16, to: u16) -> u32 {
    let mut moved = 0u32;
    for r in chf.regions.iter_mut() {
        if *r == from {
            *r = to;
            moved += 1;
        }
    }
    moved
}
