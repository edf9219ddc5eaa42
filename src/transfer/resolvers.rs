//! Per-vertex transfer resolvers.
//!
//! Every resolver here is per-vertex-independent: the frontier is fanned out
//! across the parallel runner and each vertex either resolves (the masked
//! channels are written to the target through its edit lock) or passes to
//! the next stage.

use super::{copy_channels, resolve_per_vertex, TransferResolver, DEFAULT_TOLERANCE};
use crate::def::FieldMask;
use crate::math::Real;
use crate::store::{VertKey, VertexDb, WeightOptions, INVALID_VERT_KEY};

/// Resolves a target vertex against the source record with the same
/// external id, guarded by a position tolerance.
///
/// The guard rejects id collisions between unrelated geometry: a directory
/// hit only counts when the source position is within `tolerance` of the
/// target's current position.
pub struct IdMatchResolver {
    mask: FieldMask,
    tolerance: Real,
}

impl IdMatchResolver {
    pub fn new(mask: FieldMask) -> Self {
        Self {
            mask,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl<U: Default + Clone + Send + Sync> TransferResolver<U> for IdMatchResolver {
    fn resolve(
        &self,
        source: &VertexDb<U>,
        frontier: &[VertKey],
        target: &VertexDb<U>,
    ) -> Vec<VertKey> {
        resolve_per_vertex(frontier, |key| {
            let Some(id) = target.id(key) else {
                return false;
            };
            let found = source.find_id(id);
            if found == INVALID_VERT_KEY {
                return false;
            }

            let Some(position) = target.position(key) else {
                return false;
            };
            if source.distance_to(&position, found) > self.tolerance {
                return false;
            }

            copy_channels(source, found, target, key, self.mask)
        })
    }
}

/// Resolves a target vertex against the spatially nearest source record.
///
/// Queries the source position index at the target's position with the
/// tolerance as radius and picks the minimum-distance candidate; ties go to
/// the first encountered. Fails when the query is empty or the target has
/// no position.
pub struct NearestPositionResolver {
    mask: FieldMask,
    tolerance: Real,
}

impl NearestPositionResolver {
    pub fn new(mask: FieldMask) -> Self {
        Self {
            mask,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl<U: Default + Clone + Send + Sync> TransferResolver<U> for NearestPositionResolver {
    fn resolve(
        &self,
        source: &VertexDb<U>,
        frontier: &[VertKey],
        target: &VertexDb<U>,
    ) -> Vec<VertKey> {
        resolve_per_vertex(frontier, |key| {
            let Some(position) = target.position(key) else {
                return false;
            };
            let candidates = source.find_position(&position, self.tolerance);
            let Some(best) = nearest(&candidates, |k| source.distance_to(&position, k)) else {
                return false;
            };
            copy_channels(source, best, target, key, self.mask)
        })
    }
}

/// [`NearestPositionResolver`] in texture-coordinate space.
pub struct NearestUvwResolver {
    mask: FieldMask,
    tolerance: Real,
}

impl NearestUvwResolver {
    pub fn new(mask: FieldMask) -> Self {
        Self {
            mask,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl<U: Default + Clone + Send + Sync> TransferResolver<U> for NearestUvwResolver {
    fn resolve(
        &self,
        source: &VertexDb<U>,
        frontier: &[VertKey],
        target: &VertexDb<U>,
    ) -> Vec<VertKey> {
        resolve_per_vertex(frontier, |key| {
            let Some(uvw) = target.uvw(key) else {
                return false;
            };
            let candidates = source.find_uvw(&uvw, self.tolerance);
            let Some(best) = nearest(&candidates, |k| source.distance_to_uvw(&uvw, k)) else {
                return false;
            };
            copy_channels(source, best, target, key, self.mask)
        })
    }
}

/// Bulk resolver: seeds several channels from the nearest source match in
/// one pass.
///
/// Id, normal, uv, and connectivity come from the nearest source record
/// within `radius`; position is the target's own; color and bone weights
/// come from the source's spatially-weighted samples at the target
/// position.
pub struct GaussianResolver {
    mask: FieldMask,
    radius: Real,
    weight_options: WeightOptions,
}

impl GaussianResolver {
    pub fn new(mask: FieldMask, radius: Real) -> Self {
        Self {
            mask,
            radius,
            weight_options: WeightOptions {
                clip: 0.05,
                ..Default::default()
            },
        }
    }

    pub fn with_weight_options(mut self, options: WeightOptions) -> Self {
        self.weight_options = options;
        self
    }
}

impl<U: Default + Clone + Send + Sync> TransferResolver<U> for GaussianResolver {
    fn resolve(
        &self,
        source: &VertexDb<U>,
        frontier: &[VertKey],
        target: &VertexDb<U>,
    ) -> Vec<VertKey> {
        resolve_per_vertex(frontier, |key| {
            let Some(position) = target.position(key) else {
                return false;
            };
            let candidates = source.find_position(&position, self.radius);
            let Some(best) = nearest(&candidates, |k| source.distance_to(&position, k)) else {
                return false;
            };

            let mut def = crate::def::VertexDef::<U>::new();

            if self.mask.intersects(FieldMask::ID) {
                if let Some(id) = source.id(best) {
                    def.set_id(id);
                }
            }
            if self.mask.intersects(FieldMask::POSITION) {
                def.set_position(position);
            }
            if self.mask.intersects(FieldMask::NORMAL) {
                if let Some(normal) = source.normal(best) {
                    def.set_normal(normal);
                }
            }
            if self.mask.intersects(FieldMask::UVW) {
                if let Some(uvw) = source.uvw(best) {
                    def.set_uvw(uvw);
                }
            }
            if self.mask.intersects(FieldMask::COLOR) {
                def.set_color(source.sample_color(&position, self.radius));
            }
            if self.mask.intersects(FieldMask::WEIGHTS) {
                let weights = source.find_weights(&position, self.radius, &self.weight_options);
                def.set_weights(weights);
            }
            if self.mask.intersects(FieldMask::CONNECTS) {
                if let Some(connects) = source.connects(best) {
                    def.set_connects(connects);
                }
            }

            target.update(key, &def);
            true
        })
    }
}

/// Minimum-distance candidate; ties broken by first-encountered.
fn nearest<F: Fn(VertKey) -> Real>(candidates: &[VertKey], distance: F) -> Option<VertKey> {
    let mut best: Option<(VertKey, Real)> = None;
    for &key in candidates {
        let d = distance(key);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((key, d)),
        }
    }
    best.map(|(key, _)| key)
}
