//! Per-vertex attribute record store.
//!
//! [`VertexDb`] owns one sparse map per attribute channel keyed by a dense
//! internal key, a manifest of live keys, a directory from external id to
//! internal key, and three spatial indices (position, texture coordinate,
//! and color).
//! All state sits behind one coarse `RwLock`: queries take the read lock,
//! every mutation takes the write lock for the whole
//! mutate-and-index-update sequence, so concurrent writers serialize against
//! each other and against readers.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::def::{BoneWeight, FieldMask, VertId, VertexDef};
use crate::grid::PointGrid;
use crate::math::{self, Real, Vec3};
use crate::sparse::SparseSet;

/// Dense internal record key. Assigned at insert, never reused, doubles as
/// the index into the dense payload array.
pub type VertKey = u32;

/// Sentinel returned by lookups that found nothing.
pub const INVALID_VERT_KEY: VertKey = VertKey::MAX;

/// Construction-time configuration for a [`VertexDb`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Grid bucket width for both spatial indices. Affects query cost only,
    /// never results.
    pub bucket_width: Real,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { bucket_width: 1.0 }
    }
}

/// Options for [`VertexDb::find_weights`].
#[derive(Debug, Clone)]
pub struct WeightOptions {
    /// Keep at most this many entries (0 = unlimited). Applied by sorting
    /// descending on accumulated weight and truncating.
    pub cap: usize,
    /// Remove entries below this threshold after normalization (0 = keep all).
    pub clip: Real,
    /// Divide every weight by the total (skipped when the sum is not positive).
    pub normalize: bool,
}

impl Default for WeightOptions {
    fn default() -> Self {
        Self {
            cap: 0,
            clip: 0.1,
            normalize: true,
        }
    }
}

struct DbState<U> {
    // Authoritative payload storage; the key is the index.
    user_data: Vec<U>,
    manifest: HashSet<VertKey>,
    // Remap from external ids to internal keys.
    directory: HashMap<VertId, VertKey>,
    // Per-channel sparse storage.
    ids: SparseSet<VertId>,
    positions: SparseSet<Vec3>,
    normals: SparseSet<Vec3>,
    uvws: SparseSet<Vec3>,
    colors: SparseSet<Vec3>,
    weights: SparseSet<Vec<BoneWeight>>,
    connects: SparseSet<Vec<VertId>>,
    // Acceleration structures, populated on insert only.
    pos_grid: PointGrid<VertKey>,
    uvw_grid: PointGrid<VertKey>,
    color_grid: PointGrid<VertKey>,
}

/// In-memory record store for per-vertex mesh attributes.
///
/// `U` is the caller-supplied opaque payload type; a default-valued payload
/// is stored for every record even when the inserted definition carries none.
pub struct VertexDb<U> {
    state: RwLock<DbState<U>>,
}

impl<U: Default + Clone> Default for VertexDb<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Default + Clone> VertexDb<U> {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            state: RwLock::new(DbState {
                user_data: Vec::new(),
                manifest: HashSet::new(),
                directory: HashMap::new(),
                ids: SparseSet::new(),
                positions: SparseSet::new(),
                normals: SparseSet::new(),
                uvws: SparseSet::new(),
                colors: SparseSet::new(),
                weights: SparseSet::new(),
                connects: SparseSet::new(),
                pos_grid: PointGrid::new(config.bucket_width),
                uvw_grid: PointGrid::new(config.bucket_width),
                color_grid: PointGrid::new(config.bucket_width),
            }),
        }
    }

    /// Number of records ever inserted.
    pub fn len(&self) -> usize {
        self.state.read().user_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live keys, ascending.
    pub fn keys(&self) -> Vec<VertKey> {
        let state = self.state.read();
        let mut keys: Vec<VertKey> = state.manifest.iter().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Inserts a record, assigning and returning the next dense key.
    ///
    /// Every present field of `def` is written to its channel; the directory
    /// and the spatial indices are updated here and only here. Takes the
    /// store's edit lock for the whole sequence, so concurrent inserters
    /// serialize.
    pub fn insert(&self, def: &VertexDef<U>) -> VertKey {
        self.state.write().insert(def)
    }

    /// Overwrites only the fields present in `def` for an existing key.
    ///
    /// Does not touch the manifest, the directory, or the spatial indices:
    /// updating a record's id or position desynchronizes `find_id` and the
    /// radius queries from the stored field values. There is no existence
    /// check; updating an unknown key writes channel entries with no
    /// manifest membership (caller error).
    pub fn update(&self, key: VertKey, def: &VertexDef<U>) {
        self.state.write().write_fields(key, def);
    }

    /// Fills every field present for `key` into `def`. Returns false when
    /// the key is not in the manifest; never partially succeeds.
    pub fn gather(&self, key: VertKey, def: &mut VertexDef<U>) -> bool {
        self.state.read().gather(key, def)
    }

    /// Directory lookup; [`INVALID_VERT_KEY`] when the id is unknown.
    pub fn find_id(&self, id: VertId) -> VertKey {
        self.state.read().find_id(id)
    }

    /// Keys of all records whose position is within `radius` of `location`.
    /// Pass [`math::epsilon`] for an exact coordinate match.
    pub fn find_position(&self, location: &Vec3, radius: Real) -> Vec<VertKey> {
        self.state.read().pos_grid.find(location, radius)
    }

    /// Keys of all records whose texture coordinate is within `radius`.
    pub fn find_uvw(&self, location: &Vec3, radius: Real) -> Vec<VertKey> {
        self.state.read().uvw_grid.find(location, radius)
    }

    /// Keys of all records whose color is within `radius` in color space.
    pub fn find_color(&self, color: &Vec3, radius: Real) -> Vec<VertKey> {
        self.state.read().color_grid.find(color, radius)
    }

    /// Breadth-first connectivity traversal from one seed key.
    pub fn find_connects(&self, seed: VertKey, depth: usize, inclusive: bool) -> Vec<VertKey> {
        self.find_connects_all(&[seed], depth, inclusive)
    }

    /// Breadth-first connectivity traversal from a seed frontier.
    ///
    /// Level-synchronous BFS with depth limiting: neighbors are resolved
    /// through the directory (unresolvable ids are silently skipped) and
    /// deduplicated by a seen set. The result preserves discovery order and
    /// starts at the first non-seed entry unless `inclusive`.
    pub fn find_connects_all(
        &self,
        seeds: &[VertKey],
        depth: usize,
        inclusive: bool,
    ) -> Vec<VertKey> {
        self.state.read().find_connects(seeds, depth, inclusive)
    }

    /// Spatially-weighted bone weight blend around `location`.
    ///
    /// Gaussian kernel with `sigma = radius / 2` — tied to the query radius,
    /// not the sample's dispersion, so results depend only on the query and
    /// stored geometry. An empty spatial query yields an empty result.
    pub fn find_weights(
        &self,
        location: &Vec3,
        radius: Real,
        options: &WeightOptions,
    ) -> Vec<BoneWeight> {
        self.state.read().find_weights(location, radius, options)
    }

    pub fn id(&self, key: VertKey) -> Option<VertId> {
        self.state.read().ids.get(key).copied()
    }

    pub fn position(&self, key: VertKey) -> Option<Vec3> {
        self.state.read().positions.get(key).copied()
    }

    pub fn normal(&self, key: VertKey) -> Option<Vec3> {
        self.state.read().normals.get(key).copied()
    }

    pub fn uvw(&self, key: VertKey) -> Option<Vec3> {
        self.state.read().uvws.get(key).copied()
    }

    pub fn color(&self, key: VertKey) -> Option<Vec3> {
        self.state.read().colors.get(key).copied()
    }

    pub fn weights(&self, key: VertKey) -> Option<Vec<BoneWeight>> {
        self.state.read().weights.get(key).cloned()
    }

    pub fn connects(&self, key: VertKey) -> Option<Vec<VertId>> {
        self.state.read().connects.get(key).cloned()
    }

    pub fn user_data(&self, key: VertKey) -> Option<U> {
        self.state.read().user_data.get(key as usize).cloned()
    }

    /// Euclidean distance from `point` to the key's stored position.
    /// An absent position measures against the zero vector.
    pub fn distance_to(&self, point: &Vec3, key: VertKey) -> Real {
        let state = self.state.read();
        let position = state.positions.get(key).copied().unwrap_or_else(Vec3::zeros);
        (position - point).norm()
    }

    /// Euclidean distance from `point` to the key's stored texture
    /// coordinate. An absent coordinate measures against the zero vector.
    pub fn distance_to_uvw(&self, point: &Vec3, key: VertKey) -> Real {
        let state = self.state.read();
        let uvw = state.uvws.get(key).copied().unwrap_or_else(Vec3::zeros);
        (uvw - point).norm()
    }

    /// Distance in color space from `color` to the key's stored color.
    /// An absent color measures against the zero vector.
    pub fn distance_to_color(&self, color: &Vec3, key: VertKey) -> Real {
        let state = self.state.read();
        let stored = state.colors.get(key).copied().unwrap_or_else(Vec3::zeros);
        (stored - color).norm()
    }

    /// Gaussian-averaged color of the records around `location`.
    ///
    /// Queries the position index, weights each candidate's color by the
    /// same radius-derived kernel as [`find_weights`](Self::find_weights),
    /// and returns the weighted mean. Records without a color are skipped;
    /// an empty query yields the zero vector.
    pub fn sample_color(&self, location: &Vec3, radius: Real) -> Vec3 {
        self.state.read().sample_color(location, radius)
    }

    /// Re-inserts every gatherable record of `other` into this store.
    /// `other` must be a different store.
    pub fn merge_from(&self, other: &Self) {
        let keys = other.keys();
        log::debug!("merging {} records", keys.len());
        for key in keys {
            let mut def = VertexDef::new();
            if other.gather(key, &mut def) {
                self.insert(&def);
            }
        }
    }

    /// Rebuckets both spatial indices to a new grid width. O(n).
    pub fn rebucket(&self, bucket_width: Real) {
        let mut state = self.state.write();
        state.pos_grid.rebucket(bucket_width);
        state.uvw_grid.rebucket(bucket_width);
        state.color_grid.rebucket(bucket_width);
    }
}

impl<U: Default + Clone + PartialEq> VertexDb<U> {
    /// Structural equality restricted to the channels in `mask`.
    pub fn channel_equal(&self, other: &Self, mask: FieldMask) -> bool {
        let a = self.state.read();
        let b = other.state.read();

        if mask.intersects(FieldMask::ID) && !a.ids.content_eq(&b.ids) {
            return false;
        }
        if mask.intersects(FieldMask::POSITION) && !a.positions.content_eq(&b.positions) {
            return false;
        }
        if mask.intersects(FieldMask::NORMAL) && !a.normals.content_eq(&b.normals) {
            return false;
        }
        if mask.intersects(FieldMask::UVW) && !a.uvws.content_eq(&b.uvws) {
            return false;
        }
        if mask.intersects(FieldMask::COLOR) && !a.colors.content_eq(&b.colors) {
            return false;
        }
        if mask.intersects(FieldMask::WEIGHTS) && !a.weights.content_eq(&b.weights) {
            return false;
        }
        if mask.intersects(FieldMask::CONNECTS) && !a.connects.content_eq(&b.connects) {
            return false;
        }
        if mask.intersects(FieldMask::USER_DATA) && a.user_data != b.user_data {
            return false;
        }
        true
    }
}

impl<U: Default + Clone + PartialEq> PartialEq for VertexDb<U> {
    fn eq(&self, other: &Self) -> bool {
        {
            let a = self.state.read();
            let b = other.state.read();
            if a.user_data.len() != b.user_data.len()
                || a.manifest != b.manifest
                || a.directory != b.directory
            {
                return false;
            }
        }
        self.channel_equal(other, FieldMask::ALL)
    }
}

impl<U: Default + Clone> DbState<U> {
    fn insert(&mut self, def: &VertexDef<U>) -> VertKey {
        let key = self.user_data.len() as VertKey;
        // Payload is required even when absent from the definition.
        self.user_data
            .push(def.user_data().cloned().unwrap_or_default());
        self.manifest.insert(key);

        self.write_fields(key, def);

        if let Some(id) = def.id() {
            self.directory.insert(id, key);
        }
        if let Some(position) = def.position() {
            self.pos_grid.insert(position, key);
        }
        if let Some(uvw) = def.uvw() {
            self.uvw_grid.insert(uvw, key);
        }
        if let Some(color) = def.color() {
            self.color_grid.insert(color, key);
        }

        key
    }

    fn write_fields(&mut self, key: VertKey, def: &VertexDef<U>) {
        if let Some(id) = def.id() {
            self.ids.insert(key, id);
        }
        if let Some(position) = def.position() {
            self.positions.insert(key, position);
        }
        if let Some(normal) = def.normal() {
            self.normals.insert(key, normal);
        }
        if let Some(uvw) = def.uvw() {
            self.uvws.insert(key, uvw);
        }
        if let Some(color) = def.color() {
            self.colors.insert(key, color);
        }
        if let Some(weights) = def.weights() {
            self.weights.insert(key, weights.to_vec());
        }
        if let Some(connects) = def.connects() {
            self.connects.insert(key, connects.to_vec());
        }
        if let Some(user_data) = def.user_data() {
            if let Some(slot) = self.user_data.get_mut(key as usize) {
                *slot = user_data.clone();
            }
        }
    }

    fn gather(&self, key: VertKey, def: &mut VertexDef<U>) -> bool {
        if !self.manifest.contains(&key) {
            return false;
        }

        if let Some(&id) = self.ids.get(key) {
            def.set_id(id);
        }
        if let Some(&position) = self.positions.get(key) {
            def.set_position(position);
        }
        if let Some(&normal) = self.normals.get(key) {
            def.set_normal(normal);
        }
        if let Some(&uvw) = self.uvws.get(key) {
            def.set_uvw(uvw);
        }
        if let Some(&color) = self.colors.get(key) {
            def.set_color(color);
        }
        if let Some(weights) = self.weights.get(key) {
            def.set_weights(weights.clone());
        }
        if let Some(connects) = self.connects.get(key) {
            def.set_connects(connects.clone());
        }

        true
    }

    fn find_id(&self, id: VertId) -> VertKey {
        self.directory.get(&id).copied().unwrap_or(INVALID_VERT_KEY)
    }

    fn find_connects(&self, seeds: &[VertKey], depth: usize, inclusive: bool) -> Vec<VertKey> {
        let mut frontier: Vec<VertKey> = seeds.to_vec();
        let mut seen: HashSet<VertKey> = frontier.iter().copied().collect();

        let mut cursor = 0;
        let mut current_depth = 0;
        // Marks the end of the current depth level.
        let mut sentinel = frontier.len();
        let first = if inclusive { 0 } else { frontier.len() };

        while cursor < frontier.len() {
            let current = frontier[cursor];
            if let Some(connects) = self.connects.get(current) {
                for &id in connects {
                    let found = self.find_id(id);
                    if found != INVALID_VERT_KEY && seen.insert(found) {
                        frontier.push(found);
                    }
                }
            }

            cursor += 1;

            if cursor >= sentinel {
                current_depth += 1;
                if current_depth >= depth {
                    break;
                }
                sentinel = frontier.len();
            }
        }

        frontier.split_off(first.min(frontier.len()))
    }

    fn find_weights(
        &self,
        location: &Vec3,
        radius: Real,
        options: &WeightOptions,
    ) -> Vec<BoneWeight> {
        let mut results = Vec::new();

        let verts = self.pos_grid.find(location, radius);
        if verts.is_empty() {
            return results;
        }

        // Radius-derived kernel width: the caller intends a filter around
        // their query point, not around whatever the radius query happened
        // to return.
        let sigma = radius / 2.0;

        for &key in &verts {
            let position = self.positions.get(key).copied().unwrap_or_else(Vec3::zeros);
            let distance = (position - location).norm();
            let kernel = math::gaussian_weight(distance, sigma);
            if let Some(stored) = self.weights.get(key) {
                crate::def::accumulate_weights(&mut results, stored, kernel);
            }
        }

        if options.cap > 0 && results.len() > options.cap {
            results.sort_by(|a, b| {
                b.weight
                    .partial_cmp(&a.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            results.truncate(options.cap);
        }

        if options.normalize {
            normalize_weights(&mut results);
        }

        if options.clip > 0.0 {
            let before = results.len();
            results.retain(|w| w.weight >= options.clip);
            if results.len() != before && options.normalize {
                normalize_weights(&mut results);
            }
        }

        results
    }

    fn sample_color(&self, location: &Vec3, radius: Real) -> Vec3 {
        let verts = self.pos_grid.find(location, radius);
        let sigma = radius / 2.0;

        let mut blended = Vec3::zeros();
        let mut total = 0.0;
        for &key in &verts {
            let Some(&color) = self.colors.get(key) else {
                continue;
            };
            let position = self.positions.get(key).copied().unwrap_or_else(Vec3::zeros);
            let kernel = math::gaussian_weight((position - location).norm(), sigma);
            blended += color * kernel;
            total += kernel;
        }

        if total > 0.0 {
            blended / total
        } else {
            Vec3::zeros()
        }
    }
}

/// Scales weights so they sum to one. Skipped (returns false) when the sum
/// is not positive.
fn normalize_weights(weights: &mut [BoneWeight]) -> bool {
    let sum: Real = weights.iter().map(|w| w.weight).sum();
    if sum > 0.0 {
        for w in weights.iter_mut() {
            w.weight /= sum;
        }
        true
    } else {
        false
    }
}
