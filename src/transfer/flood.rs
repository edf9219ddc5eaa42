//! Graph-diffusion ("flood fill") resolver.
//!
//! Unlike the per-vertex resolvers, diffusion is not independent per key:
//! it runs in generations over the target store's own connectivity graph.
//! Each generation inspects the still-unresolved frontier, averages the
//! definitions of already-resolved graph neighbors, and stages the results;
//! staged definitions are committed only after the generation joins, so
//! resolution order within a generation cannot influence the outcome.

use parking_lot::Mutex;

use super::TransferResolver;
use crate::def::{combine_defs_uniform, FieldMask, VertexDef};
use crate::parallel::{self, ParConfig};
use crate::store::{VertKey, VertexDb, INVALID_VERT_KEY};

/// Propagates resolved values to unresolved graph neighbors until no
/// generation makes progress.
pub struct FloodFillResolver {
    mask: FieldMask,
    max_generations: Option<usize>,
}

impl FloodFillResolver {
    /// Unbounded diffusion: runs until convergence.
    pub fn new(mask: FieldMask) -> Self {
        Self {
            mask,
            max_generations: None,
        }
    }

    /// Halt after at most `generations` even if the frontier is still
    /// shrinking.
    pub fn with_max_generations(mut self, generations: usize) -> Self {
        self.max_generations = Some(generations);
        self
    }

    /// Attempt one vertex: average the definitions of its already-resolved
    /// neighbors that carry every requested field.
    ///
    /// Neighbor ids resolve through the target directory; dangling ids are
    /// skipped as normal absence. Returns `None` when no neighbor qualifies.
    fn resolve_vert<U: Default + Clone>(
        &self,
        target: &VertexDb<U>,
        key: VertKey,
    ) -> Option<VertexDef<U>> {
        let connects = target.connects(key)?;

        let mut neighbor_defs = Vec::new();
        for id in connects {
            let neighbor = target.find_id(id);
            if neighbor == INVALID_VERT_KEY {
                continue;
            }
            let mut def = VertexDef::new();
            if target.gather(neighbor, &mut def) && def.mask().contains_all(self.mask) {
                neighbor_defs.push(def);
            }
        }

        if neighbor_defs.is_empty() {
            return None;
        }

        let mut combined = combine_defs_uniform(&neighbor_defs, true);
        combined.retain(self.mask);
        Some(combined)
    }
}

impl<U: Default + Clone + Send + Sync> TransferResolver<U> for FloodFillResolver {
    fn resolve(
        &self,
        _source: &VertexDb<U>,
        frontier: &[VertKey],
        target: &VertexDb<U>,
    ) -> Vec<VertKey> {
        let mut frontier = frontier.to_vec();
        let mut generations = 0usize;

        while !frontier.is_empty() {
            let staged: Mutex<Vec<(VertKey, VertexDef<U>)>> = Mutex::new(Vec::new());

            let next = parallel::process_slices(
                &frontier,
                &ParConfig::default(),
                |&key, unresolved| match self.resolve_vert(target, key) {
                    Some(def) => staged.lock().push((key, def)),
                    None => unresolved.push(key),
                },
            );

            let staged = staged.into_inner();
            // Commit the whole generation at once so in-generation order
            // cannot leak into the result.
            for (key, def) in &staged {
                target.update(*key, def);
            }

            log::debug!(
                "diffusion generation {}: resolved {}, {} unresolved",
                generations,
                staged.len(),
                next.len()
            );

            frontier = next;
            if staged.is_empty() {
                break;
            }

            generations += 1;
            if let Some(cap) = self.max_generations {
                if generations >= cap {
                    break;
                }
            }
        }

        frontier
    }
}
