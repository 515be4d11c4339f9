//! Uniform-grid spatial hash and its hierarchical variant
//!
//! Cells are keyed by the floored integer coordinates of world positions.
//! A side table remembers which cells each body occupies so updates only
//! touch the cells that changed. Empty cells are pruned immediately.
//!
//! Bodies whose footprint exceeds the per-body cell cap (huge ground slabs,
//! long CCD sweeps) are kept in a separate oversized set. They are offered as
//! a candidate to every pair and every query instead of filling the grid.
//!
//! Cell keys hash through a fixed prime-XOR hasher, so map layout (and every
//! iteration over it) is identical across runs with the same inputs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hash, Hasher};

use glam::Vec3;

use super::body::BodyId;
use super::math::Aabb;
use crate::config::SpatialHashConfig;
use crate::consts::MAX_CELLS_PER_BODY;
use crate::vec3_is_finite;

/// Integer cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellKey {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// (x·73856093) ^ (y·19349663) ^ (z·83492791)
    #[inline]
    pub fn spatial_hash(&self) -> u64 {
        let h = (self.x as i64).wrapping_mul(73_856_093)
            ^ (self.y as i64).wrapping_mul(19_349_663)
            ^ (self.z as i64).wrapping_mul(83_492_791);
        h as u64
    }
}

impl Hash for CellKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.spatial_hash());
    }
}

/// Pass-through hasher for `CellKey`'s precomputed hash
#[derive(Debug, Default, Clone, Copy)]
pub struct CellHasher(u64);

impl Hasher for CellHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 ^ b as u64).wrapping_mul(0x0100_0000_01b3);
        }
    }

    fn write_u64(&mut self, i: u64) {
        self.0 ^= i;
    }
}

type CellMap = HashMap<CellKey, Vec<BodyId>, BuildHasherDefault<CellHasher>>;

/// Operation counters (not part of equality)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialHashCounters {
    pub inserts: u64,
    pub removes: u64,
    pub updates: u64,
    pub queries: u64,
}

/// Flat uniform grid
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    inv_cell_size: f32,
    /// Cell → sorted occupant ids
    cells: CellMap,
    /// Body → sorted keys of the cells it occupies (empty when oversized)
    body_cells: BTreeMap<BodyId, Vec<CellKey>>,
    /// Bodies too large for the grid
    oversized: BTreeSet<BodyId>,
    max_cells: u64,
    pub counters: SpatialHashCounters,
}

impl PartialEq for SpatialHash {
    fn eq(&self, other: &Self) -> bool {
        self.cell_size == other.cell_size
            && self.max_cells == other.max_cells
            && self.cells == other.cells
            && self.body_cells == other.body_cells
            && self.oversized == other.oversized
    }
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: CellMap::default(),
            body_cells: BTreeMap::new(),
            oversized: BTreeSet::new(),
            max_cells: MAX_CELLS_PER_BODY as u64,
            counters: SpatialHashCounters::default(),
        }
    }

    /// Set the per-body cell cap; takes effect for later inserts and updates
    pub fn with_max_cells(mut self, max_cells: u32) -> Self {
        self.max_cells = max_cells.max(1) as u64;
        self
    }

    pub fn max_cells(&self) -> u64 {
        self.max_cells
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing a world point
    #[inline]
    pub fn cell_of(&self, p: Vec3) -> CellKey {
        let c = (p * self.inv_cell_size).floor();
        CellKey::new(c.x as i32, c.y as i32, c.z as i32)
    }

    /// Number of cells an AABB overlaps, saturating at `u64::MAX`
    pub fn footprint(&self, aabb: &Aabb) -> u64 {
        let lo = self.cell_of(aabb.min);
        let hi = self.cell_of(aabb.max);
        let span = |a: i32, b: i32| (b as i64 - a as i64 + 1).max(0) as u64;
        span(lo.x, hi.x)
            .saturating_mul(span(lo.y, hi.y))
            .saturating_mul(span(lo.z, hi.z))
    }

    /// True when a box is too large to be spread over the grid
    pub fn is_oversized(&self, aabb: &Aabb) -> bool {
        self.footprint(aabb) > self.max_cells
    }

    /// Every cell an AABB overlaps, in key order. Empty for an oversized box.
    pub fn cells_overlapping(&self, aabb: &Aabb) -> Vec<CellKey> {
        let count = self.footprint(aabb);
        if count > self.max_cells {
            return Vec::new();
        }
        let lo = self.cell_of(aabb.min);
        let hi = self.cell_of(aabb.max);
        let mut keys = Vec::with_capacity(count as usize);
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    keys.push(CellKey::new(x, y, z));
                }
            }
        }
        keys
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.body_cells.contains_key(&id)
    }

    /// Cells currently holding `id`
    pub fn cells_of(&self, id: BodyId) -> Option<&[CellKey]> {
        self.body_cells.get(&id).map(Vec::as_slice)
    }

    pub fn occupants(&self, key: CellKey) -> &[BodyId] {
        self.cells.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn body_count(&self) -> usize {
        self.body_cells.len()
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Bodies kept off the grid, in id order
    pub fn oversized(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.oversized.iter().copied()
    }

    /// Smallest and largest occupied cell coordinates per axis
    pub fn occupied_bounds(&self) -> Option<(CellKey, CellKey)> {
        let mut keys = self.cells.keys();
        let first = *keys.next()?;
        Some(keys.fold((first, first), |(lo, hi), k| {
            (
                CellKey::new(lo.x.min(k.x), lo.y.min(k.y), lo.z.min(k.z)),
                CellKey::new(hi.x.max(k.x), hi.y.max(k.y), hi.z.max(k.z)),
            )
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.body_cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.body_cells.clear();
        self.oversized.clear();
    }

    /// Add a body; an already-indexed body is updated instead
    pub fn insert(&mut self, id: BodyId, aabb: &Aabb) {
        if self.contains(id) {
            self.update(id, aabb);
            return;
        }
        self.place(id, aabb);
    }

    fn place(&mut self, id: BodyId, aabb: &Aabb) {
        let keys = self.cells_overlapping(aabb);
        for &key in &keys {
            self.add_to_cell(key, id);
        }
        if keys.is_empty() && self.is_oversized(aabb) {
            self.oversized.insert(id);
        }
        self.body_cells.insert(id, keys);
        self.counters.inserts += 1;
    }

    /// Evict a body from every cell; false if it was not indexed
    pub fn remove(&mut self, id: BodyId) -> bool {
        let Some(keys) = self.body_cells.remove(&id) else {
            return false;
        };
        for key in keys {
            self.remove_from_cell(key, id);
        }
        self.oversized.remove(&id);
        self.counters.removes += 1;
        true
    }

    /// Move a body to the cells of its new AABB, touching only the cells that
    /// differ between the old and new footprint
    pub fn update(&mut self, id: BodyId, aabb: &Aabb) {
        if !self.body_cells.contains_key(&id) {
            self.place(id, aabb);
            return;
        }
        let new_keys = self.cells_overlapping(aabb);
        let old_keys = self.body_cells.remove(&id).unwrap_or_default();
        if new_keys.is_empty() && self.is_oversized(aabb) {
            self.oversized.insert(id);
        } else {
            self.oversized.remove(&id);
        }

        if old_keys != new_keys {
            // both lists are in key order
            for &key in &old_keys {
                if new_keys.binary_search(&key).is_err() {
                    self.remove_from_cell(key, id);
                }
            }
            for &key in &new_keys {
                if old_keys.binary_search(&key).is_err() {
                    self.add_to_cell(key, id);
                }
            }
        }
        self.body_cells.insert(id, new_keys);
        self.counters.updates += 1;
    }

    /// Bodies in any cell the box overlaps (candidates, not exact overlaps)
    pub fn query_aabb(&mut self, aabb: &Aabb) -> Vec<BodyId> {
        self.counters.queries += 1;
        let mut found = BTreeSet::new();
        for key in self.cells_overlapping(aabb) {
            if let Some(ids) = self.cells.get(&key) {
                found.extend(ids.iter().copied());
            }
        }
        found.extend(self.oversized.iter().copied());
        found.into_iter().collect()
    }

    pub fn query_point_radius(&mut self, point: Vec3, radius: f32) -> Vec<BodyId> {
        let aabb = Aabb::from_center_half_extents(point, Vec3::splat(radius.max(0.0)));
        self.query_aabb(&aabb)
    }

    /// Every unordered pair sharing at least one cell, accepted by `filter`.
    /// Each pair is offered to the filter once, lower id first; the result is
    /// sorted.
    pub fn enumerate_pairs(
        &self,
        mut filter: impl FnMut(BodyId, BodyId) -> bool,
    ) -> Vec<(BodyId, BodyId)> {
        let mut checked: HashSet<(BodyId, BodyId)> = HashSet::new();
        let mut pairs = Vec::new();
        for ids in self.cells.values() {
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    // occupants are sorted, so a < b
                    if checked.insert((a, b)) && filter(a, b) {
                        pairs.push((a, b));
                    }
                }
            }
        }
        for &big in &self.oversized {
            for &other in self.body_cells.keys() {
                if other == big {
                    continue;
                }
                let pair = (big.min(other), big.max(other));
                if checked.insert(pair) && filter(pair.0, pair.1) {
                    pairs.push(pair);
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// Bodies in the cells a ray passes through, in first-visit order.
    /// Oversized bodies come first since they may be anywhere on the ray.
    pub fn raycast_candidates(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Vec<BodyId> {
        let mut found: Vec<BodyId> = self.oversized.iter().copied().collect();
        let mut seen: HashSet<BodyId> = found.iter().copied().collect();
        for cell in self.ray_cells(origin, dir, max_distance) {
            for &id in self.occupants(cell) {
                if seen.insert(id) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// Cells a ray crosses, in visit order. The segment is first clipped to
    /// the occupied region, so rays through empty space cost nothing and the
    /// walk never leaves the grid's extent. Grid traversal is Amanatides-Woo.
    pub fn ray_cells(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Vec<CellKey> {
        let mut visited = Vec::new();
        let max_distance = max_distance.max(0.0);
        if !max_distance.is_finite() || !vec3_is_finite(origin) || !vec3_is_finite(dir) {
            return visited;
        }
        let Some((lo, hi)) = self.occupied_bounds() else {
            return visited;
        };
        let region_min = Vec3::new(lo.x as f32, lo.y as f32, lo.z as f32) * self.cell_size;
        let region_max = Vec3::new(hi.x as f32 + 1.0, hi.y as f32 + 1.0, hi.z as f32 + 1.0) * self.cell_size;
        let Some((t_enter, t_exit)) = clip_to_box(origin, dir, max_distance, region_min, region_max) else {
            return visited;
        };

        let clamp = |k: CellKey| {
            CellKey::new(
                k.x.clamp(lo.x, hi.x),
                k.y.clamp(lo.y, hi.y),
                k.z.clamp(lo.z, hi.z),
            )
        };
        let mut cell = clamp(self.cell_of(origin + dir * t_enter));
        let end = clamp(self.cell_of(origin + dir * t_exit));
        let step = [axis_step(dir.x), axis_step(dir.y), axis_step(dir.z)];
        let mut t_max = [f32::INFINITY; 3];
        let mut t_delta = [f32::INFINITY; 3];
        let coords = [cell.x, cell.y, cell.z];
        for axis in 0..3 {
            let d = dir[axis];
            if d.abs() < 1e-12 {
                continue;
            }
            let boundary_cell = if d > 0.0 { coords[axis] as i64 + 1 } else { coords[axis] as i64 };
            let boundary = boundary_cell as f32 * self.cell_size;
            t_max[axis] = (boundary - origin[axis]) / d;
            t_delta[axis] = self.cell_size / d.abs();
        }

        // both ends lie inside the occupied region, so this stays small;
        // the slack absorbs float drift at cell borders
        let span = |a: i32, b: i32| (b as i64 - a as i64).unsigned_abs();
        let budget = span(cell.x, end.x) + span(cell.y, end.y) + span(cell.z, end.z) + 4;
        for _ in 0..budget {
            visited.push(cell);
            let axis = if t_max[0] <= t_max[1] && t_max[0] <= t_max[2] {
                0
            } else if t_max[1] <= t_max[2] {
                1
            } else {
                2
            };
            if t_max[axis] > t_exit {
                break;
            }
            let next = match axis {
                0 => cell.x.checked_add(step[0]),
                1 => cell.y.checked_add(step[1]),
                _ => cell.z.checked_add(step[2]),
            };
            let Some(next) = next else {
                break;
            };
            match axis {
                0 => cell.x = next,
                1 => cell.y = next,
                _ => cell.z = next,
            }
            if clamp(cell) != cell {
                break;
            }
            t_max[axis] += t_delta[axis];
        }
        visited
    }

    fn add_to_cell(&mut self, key: CellKey, id: BodyId) {
        let ids = self.cells.entry(key).or_default();
        if let Err(pos) = ids.binary_search(&id) {
            ids.insert(pos, id);
        }
    }

    fn remove_from_cell(&mut self, key: CellKey, id: BodyId) {
        if let Some(ids) = self.cells.get_mut(&key) {
            if let Ok(pos) = ids.binary_search(&id) {
                ids.remove(pos);
            }
            if ids.is_empty() {
                self.cells.remove(&key);
            }
        }
    }
}

/// Parametric range `[t_enter, t_exit]` of the segment `origin + dir * t`,
/// `t` in `[0, max_distance]`, inside a box
fn clip_to_box(origin: Vec3, dir: Vec3, max_distance: f32, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
    let mut t0 = 0.0f32;
    let mut t1 = max_distance;
    for axis in 0..3 {
        let d = dir[axis];
        let o = origin[axis];
        if d.abs() < 1e-12 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut ta, mut tb) = ((min[axis] - o) * inv, (max[axis] - o) * inv);
        if ta > tb {
            std::mem::swap(&mut ta, &mut tb);
        }
        t0 = t0.max(ta);
        t1 = t1.min(tb);
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

#[inline]
fn axis_step(d: f32) -> i32 {
    if d > 0.0 {
        1
    } else if d < 0.0 {
        -1
    } else {
        0
    }
}

/// Stack of grids with cell sizes `base * 2^i`. Every body lives in every
/// level; each query picks the level that fits it.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalSpatialHash {
    levels: Vec<SpatialHash>,
    /// Largest AABB edge per body, for choosing the pair level
    extents: BTreeMap<BodyId, f32>,
}

impl HierarchicalSpatialHash {
    pub fn new(base_cell_size: f32, levels: u32) -> Self {
        let levels = (0..levels.max(1))
            .map(|i| SpatialHash::new(base_cell_size * (1u32 << i) as f32))
            .collect();
        Self {
            levels,
            extents: BTreeMap::new(),
        }
    }

    /// Apply one per-body cell cap to every level
    pub fn with_max_cells(mut self, max_cells: u32) -> Self {
        self.levels = self
            .levels
            .into_iter()
            .map(|level| level.with_max_cells(max_cells))
            .collect();
        self
    }

    pub fn levels(&self) -> &[SpatialHash] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Finest level whose cells span at least `size`, else the coarsest
    pub fn level_for_size(&self, size: f32) -> usize {
        self.levels
            .iter()
            .position(|level| level.cell_size() >= size)
            .unwrap_or(self.levels.len() - 1)
    }

    /// Level used for pair enumeration: cells at least as large as the
    /// largest indexed body
    pub fn pair_level(&self) -> usize {
        let largest = self.extents.values().copied().fold(0.0f32, f32::max);
        self.level_for_size(largest)
    }

    pub fn insert(&mut self, id: BodyId, aabb: &Aabb) {
        for level in &mut self.levels {
            level.insert(id, aabb);
        }
        self.extents.insert(id, largest_edge(aabb));
    }

    pub fn remove(&mut self, id: BodyId) -> bool {
        let mut removed = false;
        for level in &mut self.levels {
            removed |= level.remove(id);
        }
        self.extents.remove(&id);
        removed
    }

    pub fn update(&mut self, id: BodyId, aabb: &Aabb) {
        for level in &mut self.levels {
            level.update(id, aabb);
        }
        self.extents.insert(id, largest_edge(aabb));
    }

    /// Uses the level whose cells fit the box's largest half-extent
    pub fn query_aabb(&mut self, aabb: &Aabb) -> Vec<BodyId> {
        let level = self.level_for_size(2.0 * aabb.half_extents().max_element());
        self.levels[level].query_aabb(aabb)
    }

    /// Uses the finest level whose cells span the query diameter
    pub fn query_point_radius(&mut self, point: Vec3, radius: f32) -> Vec<BodyId> {
        let level = self.level_for_size(2.0 * radius);
        self.levels[level].query_point_radius(point, radius)
    }

    pub fn enumerate_pairs(&self, filter: impl FnMut(BodyId, BodyId) -> bool) -> Vec<(BodyId, BodyId)> {
        self.levels[self.pair_level()].enumerate_pairs(filter)
    }

    /// Rays walk the base level
    pub fn raycast_candidates(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Vec<BodyId> {
        self.levels[0].raycast_candidates(origin, dir, max_distance)
    }

    pub fn clear(&mut self) {
        for level in &mut self.levels {
            level.clear();
        }
        self.extents.clear();
    }
}

fn largest_edge(aabb: &Aabb) -> f32 {
    (aabb.max - aabb.min).max_element()
}

/// The broad-phase index the world owns
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialIndex {
    Flat(SpatialHash),
    Hierarchical(HierarchicalSpatialHash),
}

impl SpatialIndex {
    pub fn from_config(config: &SpatialHashConfig) -> Self {
        if config.levels <= 1 {
            SpatialIndex::Flat(SpatialHash::new(config.cell_size).with_max_cells(config.max_cells_per_body))
        } else {
            SpatialIndex::Hierarchical(
                HierarchicalSpatialHash::new(config.cell_size, config.levels)
                    .with_max_cells(config.max_cells_per_body),
            )
        }
    }

    /// The finest grid (the only one for a flat index)
    pub fn base(&self) -> &SpatialHash {
        match self {
            SpatialIndex::Flat(hash) => hash,
            SpatialIndex::Hierarchical(h) => &h.levels[0],
        }
    }

    pub fn insert(&mut self, id: BodyId, aabb: &Aabb) {
        match self {
            SpatialIndex::Flat(hash) => hash.insert(id, aabb),
            SpatialIndex::Hierarchical(h) => h.insert(id, aabb),
        }
    }

    pub fn remove(&mut self, id: BodyId) -> bool {
        match self {
            SpatialIndex::Flat(hash) => hash.remove(id),
            SpatialIndex::Hierarchical(h) => h.remove(id),
        }
    }

    pub fn update(&mut self, id: BodyId, aabb: &Aabb) {
        match self {
            SpatialIndex::Flat(hash) => hash.update(id, aabb),
            SpatialIndex::Hierarchical(h) => h.update(id, aabb),
        }
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.base().contains(id)
    }

    pub fn body_count(&self) -> usize {
        self.base().body_count()
    }

    pub fn query_aabb(&mut self, aabb: &Aabb) -> Vec<BodyId> {
        match self {
            SpatialIndex::Flat(hash) => hash.query_aabb(aabb),
            SpatialIndex::Hierarchical(h) => h.query_aabb(aabb),
        }
    }

    pub fn query_point_radius(&mut self, point: Vec3, radius: f32) -> Vec<BodyId> {
        match self {
            SpatialIndex::Flat(hash) => hash.query_point_radius(point, radius),
            SpatialIndex::Hierarchical(h) => h.query_point_radius(point, radius),
        }
    }

    pub fn enumerate_pairs(&self, filter: impl FnMut(BodyId, BodyId) -> bool) -> Vec<(BodyId, BodyId)> {
        match self {
            SpatialIndex::Flat(hash) => hash.enumerate_pairs(filter),
            SpatialIndex::Hierarchical(h) => h.enumerate_pairs(filter),
        }
    }

    pub fn raycast_candidates(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Vec<BodyId> {
        match self {
            SpatialIndex::Flat(hash) => hash.raycast_candidates(origin, dir, max_distance),
            SpatialIndex::Hierarchical(h) => h.raycast_candidates(origin, dir, max_distance),
        }
    }

    pub fn clear(&mut self) {
        match self {
            SpatialIndex::Flat(hash) => hash.clear(),
            SpatialIndex::Hierarchical(h) => h.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(center: Vec3, half: f32) -> Aabb {
        Aabb::from_center_half_extents(center, Vec3::splat(half))
    }

    #[test]
    fn test_insert_covers_overlapped_cells() {
        let mut hash = SpatialHash::new(4.0);
        let bounds = aabb(Vec3::new(4.0, 1.0, 1.0), 0.5);
        hash.insert(BodyId(1), &bounds);
        // straddles x = 4
        let cells = hash.cells_of(BodyId(1)).unwrap();
        assert_eq!(cells, &[CellKey::new(0, 0, 0), CellKey::new(1, 0, 0)]);
        assert_eq!(hash.occupants(CellKey::new(1, 0, 0)), &[BodyId(1)]);
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let hash = SpatialHash::new(4.0);
        assert_eq!(hash.cell_of(Vec3::new(-0.1, -4.0, -4.1)), CellKey::new(-1, -1, -2));
    }

    #[test]
    fn test_insert_remove_restores_state() {
        let mut hash = SpatialHash::new(2.0);
        hash.insert(BodyId(1), &aabb(Vec3::ZERO, 1.0));
        let before = hash.clone();
        hash.insert(BodyId(2), &aabb(Vec3::new(3.0, 0.0, 0.0), 2.5));
        assert!(hash.remove(BodyId(2)));
        assert_eq!(hash, before);
        assert!(!hash.remove(BodyId(2)));
    }

    #[test]
    fn test_delta_update_moves_body() {
        let mut hash = SpatialHash::new(1.0);
        hash.insert(BodyId(3), &aabb(Vec3::splat(0.5), 0.25));
        let moved = aabb(Vec3::new(5.5, 0.5, 0.5), 0.25);
        hash.update(BodyId(3), &moved);
        assert_eq!(hash.cells_of(BodyId(3)).unwrap(), hash.cells_overlapping(&moved).as_slice());
        assert!(hash.occupants(CellKey::new(0, 0, 0)).is_empty());
        // old cell pruned
        assert_eq!(hash.cell_count(), 1);
        assert!(hash.query_aabb(&moved).contains(&BodyId(3)));
    }

    #[test]
    fn test_pairs_deduplicated_across_cells() {
        let mut hash = SpatialHash::new(1.0);
        // both span the same 8 cells around the origin
        hash.insert(BodyId(1), &aabb(Vec3::ZERO, 0.5));
        hash.insert(BodyId(2), &aabb(Vec3::ZERO, 0.4));
        hash.insert(BodyId(3), &aabb(Vec3::splat(10.0), 0.4));
        let mut offered = 0;
        let pairs = hash.enumerate_pairs(|_, _| {
            offered += 1;
            true
        });
        assert_eq!(pairs, vec![(BodyId(1), BodyId(2))]);
        assert_eq!(offered, 1);
    }

    #[test]
    fn test_query_point_radius() {
        let mut hash = SpatialHash::new(4.0);
        hash.insert(BodyId(1), &aabb(Vec3::new(1.0, 1.0, 1.0), 0.5));
        hash.insert(BodyId(2), &aabb(Vec3::new(30.0, 1.0, 1.0), 0.5));
        assert_eq!(hash.query_point_radius(Vec3::ZERO, 2.0), vec![BodyId(1)]);
        assert_eq!(hash.counters.queries, 1);
    }

    #[test]
    fn test_raycast_walks_cells_in_order() {
        let mut hash = SpatialHash::new(1.0);
        hash.insert(BodyId(5), &aabb(Vec3::new(7.5, 0.5, 0.5), 0.2));
        hash.insert(BodyId(2), &aabb(Vec3::new(3.5, 0.5, 0.5), 0.2));
        hash.insert(BodyId(9), &aabb(Vec3::new(3.5, 5.5, 0.5), 0.2));
        let hits = hash.raycast_candidates(Vec3::new(0.5, 0.5, 0.5), Vec3::X, 20.0);
        assert_eq!(hits, vec![BodyId(2), BodyId(5)]);
        let short = hash.raycast_candidates(Vec3::new(0.5, 0.5, 0.5), Vec3::X, 4.0);
        assert_eq!(short, vec![BodyId(2)]);
    }

    #[test]
    fn test_raycast_diagonal_negative() {
        let mut hash = SpatialHash::new(1.0);
        hash.insert(BodyId(1), &aabb(Vec3::new(-3.5, -3.5, 0.5), 0.2));
        let dir = Vec3::new(-1.0, -1.0, 0.0).normalize();
        let hits = hash.raycast_candidates(Vec3::new(0.5, 0.5, 0.5), dir, 10.0);
        assert_eq!(hits, vec![BodyId(1)]);
    }

    #[test]
    fn test_hierarchy_levels_and_selection() {
        let mut h = HierarchicalSpatialHash::new(1.0, 4);
        let sizes: Vec<f32> = h.levels().iter().map(SpatialHash::cell_size).collect();
        assert_eq!(sizes, vec![1.0, 2.0, 4.0, 8.0]);
        assert_eq!(h.level_for_size(3.0), 2);
        assert_eq!(h.level_for_size(100.0), 3);

        h.insert(BodyId(1), &aabb(Vec3::ZERO, 0.25));
        h.insert(BodyId(2), &aabb(Vec3::new(0.6, 0.0, 0.0), 0.25));
        assert_eq!(h.pair_level(), 0);
        assert_eq!(h.enumerate_pairs(|_, _| true), vec![(BodyId(1), BodyId(2))]);

        h.insert(BodyId(3), &aabb(Vec3::new(20.0, 0.0, 0.0), 1.5));
        assert_eq!(h.pair_level(), 2);
        assert!(h.levels().iter().all(|level| level.contains(BodyId(3))));

        assert!(h.remove(BodyId(3)));
        assert!(h.levels().iter().all(|level| !level.contains(BodyId(3))));
    }

    #[test]
    fn test_index_dispatch() {
        let mut index = SpatialIndex::from_config(&SpatialHashConfig {
            cell_size: 2.0,
            levels: 3,
            ..SpatialHashConfig::default()
        });
        assert!(matches!(index, SpatialIndex::Hierarchical(_)));
        index.insert(BodyId(4), &aabb(Vec3::ONE, 0.5));
        assert!(index.contains(BodyId(4)));
        assert_eq!(index.query_point_radius(Vec3::ONE, 0.1), vec![BodyId(4)]);

        let flat = SpatialIndex::from_config(&SpatialHashConfig::default());
        assert!(matches!(flat, SpatialIndex::Flat(_)));
    }

    #[test]
    fn test_huge_box_stays_off_grid() {
        let mut hash = SpatialHash::new(4.0);
        let ground = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(2.0e5, 1.0, 2.0e5));
        assert!(hash.footprint(&ground) > hash.max_cells());
        assert!(hash.cells_overlapping(&ground).is_empty());

        hash.insert(BodyId(0), &ground);
        hash.insert(BodyId(1), &aabb(Vec3::new(3.0, 1.5, 3.0), 0.5));
        assert_eq!(hash.oversized().collect::<Vec<_>>(), vec![BodyId(0)]);
        assert_eq!(hash.cells_of(BodyId(0)), Some(&[][..]));
        assert_eq!(hash.cell_count(), 1);
        assert_eq!(hash.enumerate_pairs(|_, _| true), vec![(BodyId(0), BodyId(1))]);
        assert_eq!(
            hash.query_point_radius(Vec3::new(-900.0, 0.0, 0.0), 1.0),
            vec![BodyId(0)]
        );

        // shrinking back under the cap puts it on the grid
        hash.update(BodyId(0), &aabb(Vec3::ZERO, 1.0));
        assert_eq!(hash.oversized().count(), 0);
        assert!(hash.occupants(CellKey::new(0, 0, 0)).contains(&BodyId(0)));
        assert!(hash.remove(BodyId(0)));
    }

    #[test]
    fn test_footprint_saturates_for_extreme_boxes() {
        let hash = SpatialHash::new(0.5);
        let everything = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(f32::MAX / 2.0));
        assert!(hash.footprint(&everything) > u32::MAX as u64);
        assert!(hash.cells_overlapping(&everything).is_empty());
    }

    #[test]
    fn test_ray_walk_is_clipped_to_occupied_cells() {
        let mut hash = SpatialHash::new(4.0);
        assert!(hash.ray_cells(Vec3::ZERO, Vec3::Y, 1.0e8).is_empty());

        hash.insert(BodyId(3), &aabb(Vec3::ONE, 0.5));
        let cells = hash.ray_cells(Vec3::ZERO, Vec3::Y, 1.0e8);
        assert_eq!(cells, vec![CellKey::new(0, 0, 0)]);

        // from outside the occupied region, toward it, with no useful bound
        let candidates = hash.raycast_candidates(Vec3::new(50.0, 1.0, 1.0), -Vec3::X, f32::MAX);
        assert_eq!(candidates, vec![BodyId(3)]);
        assert!(hash.raycast_candidates(Vec3::new(50.0, 1.0, 1.0), Vec3::X, f32::MAX).is_empty());
    }

    #[test]
    fn test_ray_walk_spans_region_once() {
        let mut hash = SpatialHash::new(1.0);
        hash.insert(BodyId(1), &aabb(Vec3::new(0.5, 0.5, 0.5), 0.25));
        hash.insert(BodyId(2), &aabb(Vec3::new(9.5, 0.5, 0.5), 0.25));
        let cells = hash.ray_cells(Vec3::new(-1.0e6, 0.5, 0.5), Vec3::X, f32::MAX);
        assert_eq!(cells.len(), 10);
        assert_eq!(cells.first(), Some(&CellKey::new(0, 0, 0)));
        assert_eq!(cells.last(), Some(&CellKey::new(9, 0, 0)));
        assert_eq!(
            hash.raycast_candidates(Vec3::new(-1.0e6, 0.5, 0.5), Vec3::X, f32::MAX),
            vec![BodyId(1), BodyId(2)]
        );
    }
}
