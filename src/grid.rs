//! Uniform-grid spatial index.
//!
//! [`PointGrid`] buckets `(coordinate, payload)` pairs by floored scaled
//! coordinate. Radius queries enumerate every grid cell overlapping the
//! query sphere's bounding box and filter bucket entries by exact squared
//! distance, so the grid partitioning is purely a pruning optimization —
//! never a source of false negatives or positives.

use std::collections::HashMap;

use crate::math::{self, CellKey, Real, Vec3};
use crate::parallel::{self, ParConfig};

/// Uniform grid bucket map from cell key to `(coordinate, payload)` pairs.
pub struct PointGrid<T> {
    scale: Real,
    buckets: HashMap<CellKey, Vec<(Vec3, T)>>,
}

impl<T: Clone + Send + Sync> PointGrid<T> {
    /// Creates a grid with the given bucket width.
    ///
    /// A zero width falls back to an epsilon-derived scale instead of
    /// dividing by zero.
    pub fn new(bucket_width: Real) -> Self {
        Self {
            scale: width_to_scale(bucket_width),
            buckets: HashMap::new(),
        }
    }

    /// Number of occupied grid cells.
    pub fn cell_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of stored points across all cells.
    pub fn point_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Cell key of a location under the current scale.
    pub fn cell_of(&self, location: &Vec3) -> CellKey {
        math::cell_key(location, self.scale)
    }

    /// All cell keys whose box overlaps the sphere at `location` with
    /// `radius`.
    pub fn grid_keys(&self, location: &Vec3, radius: Real) -> Vec<CellKey> {
        let half = Vec3::new(radius, radius, radius);
        let low = self.cell_of(&(location - half));
        let high = self.cell_of(&(location + half));
        math::flood(low, high)
    }

    /// Inserts a payload at a coordinate. O(1) amortized; never fails.
    pub fn insert(&mut self, location: Vec3, item: T) {
        let key = self.cell_of(&location);
        self.buckets.entry(key).or_default().push((location, item));
    }

    /// Returns every payload within `radius` of `location`, unordered.
    ///
    /// The candidate cell scan is distributed across per-call threads; each
    /// worker filters its slice of cells by exact squared distance before
    /// the partial results are merged.
    pub fn find(&self, location: &Vec3, radius: Real) -> Vec<T> {
        let keys = self.grid_keys(location, radius);
        let radius_sq = radius * radius;

        parallel::process_slices(&keys, &ParConfig::default(), |key, results| {
            if let Some(bucket) = self.buckets.get(key) {
                for (point, item) in bucket {
                    let between = location - point;
                    if between.dot(&between) <= radius_sq {
                        results.push(item.clone());
                    }
                }
            }
        })
    }

    /// Moves every stored pair into freshly keyed buckets computed from the
    /// new width. O(n); coordinates are unchanged, only their grouping.
    pub fn rebucket(&mut self, bucket_width: Real) {
        let old = std::mem::take(&mut self.buckets);
        self.scale = width_to_scale(bucket_width);

        let mut moved = 0usize;
        for (_, bucket) in old {
            for (location, item) in bucket {
                let key = math::cell_key(&location, self.scale);
                self.buckets.entry(key).or_default().push((location, item));
                moved += 1;
            }
        }
        log::debug!(
            "rebucketed {} points into {} cells (width {})",
            moved,
            self.buckets.len(),
            bucket_width
        );
    }
}

fn width_to_scale(bucket_width: Real) -> Real {
    if bucket_width == 0.0 {
        math::epsilon()
    } else {
        1.0 / bucket_width
    }
}
