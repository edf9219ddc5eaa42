//! Attribute transfer pipeline.
//!
//! A [`TransferDb`] owns a source [`VertexDb`] and an ordered list of
//! resolver strategies. [`TransferDb::apply`] seeds the work frontier with
//! every key of the target store and runs it through the resolver chain:
//! each resolver sees strictly the unresolved remainder of its predecessor
//! and returns what it could not resolve — a narrowing chain, never
//! re-expanding. The final frontier is the only aggregate failure signal; a
//! non-empty result means some target vertices remain unresolved.

mod flood;
mod resolvers;

pub use flood::FloodFillResolver;
pub use resolvers::{
    GaussianResolver, IdMatchResolver, NearestPositionResolver, NearestUvwResolver,
};

use crate::def::{FieldMask, VertexDef};
use crate::parallel::{self, ParConfig};
use crate::store::{VertKey, VertexDb};

/// Default position/uv tolerance for the matching resolvers.
pub const DEFAULT_TOLERANCE: crate::math::Real = 1e-5;

/// One stage of the transfer pipeline.
///
/// A resolver attempts to resolve a batch of target keys against the source
/// store, writing resolved definitions into the target, and returns the
/// keys it could not resolve.
pub trait TransferResolver<U>: Send + Sync {
    fn resolve(
        &self,
        source: &VertexDb<U>,
        frontier: &[VertKey],
        target: &VertexDb<U>,
    ) -> Vec<VertKey>;
}

/// A source store plus an ordered chain of transfer resolvers.
///
/// Constructed once per transfer job; resolvers are appended in execution
/// order and `apply` runs the whole chain against a target store.
pub struct TransferDb<U> {
    source: VertexDb<U>,
    resolvers: Vec<Box<dyn TransferResolver<U>>>,
}

impl<U: Default + Clone + Send + Sync> Default for TransferDb<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Default + Clone + Send + Sync> TransferDb<U> {
    pub fn new() -> Self {
        Self::from_source(VertexDb::new())
    }

    /// Builds a transfer job around an existing source store.
    pub fn from_source(source: VertexDb<U>) -> Self {
        Self {
            source,
            resolvers: Vec::new(),
        }
    }

    /// The source store attributes are transferred from.
    pub fn source(&self) -> &VertexDb<U> {
        &self.source
    }

    /// Appends a resolver to the end of the chain.
    pub fn add_resolver(&mut self, resolver: impl TransferResolver<U> + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    /// Runs the resolver chain against `target`.
    ///
    /// Returns the keys no resolver could handle. Idempotent only if the
    /// registered resolvers are.
    pub fn apply(&self, target: &VertexDb<U>) -> Vec<VertKey> {
        let mut frontier = target.keys();
        log::debug!(
            "transfer: {} resolvers, {} target keys",
            self.resolvers.len(),
            frontier.len()
        );

        for (stage, resolver) in self.resolvers.iter().enumerate() {
            let before = frontier.len();
            frontier = resolver.resolve(&self.source, &frontier, target);
            log::debug!(
                "transfer stage {}: {} -> {} unresolved",
                stage,
                before,
                frontier.len()
            );
        }

        frontier
    }
}

/// Fans a frontier across the parallel runner, one call per vertex.
///
/// `resolve_vert` either resolves the key (writing to the target itself)
/// and returns true, or returns false to leave the key for the next stage.
/// Returns the merged unresolved keys; their order across worker slices is
/// unspecified.
pub(crate) fn resolve_per_vertex<F>(frontier: &[VertKey], resolve_vert: F) -> Vec<VertKey>
where
    F: Fn(VertKey) -> bool + Sync,
{
    parallel::process_slices(frontier, &ParConfig::default(), |&key, unresolved| {
        if !resolve_vert(key) {
            unresolved.push(key);
        }
    })
}

/// Copies the masked channels of one source record into a target record.
///
/// Gathers the source definition, drops everything outside `mask`, and
/// writes the remainder through the target's edit lock.
pub(crate) fn copy_channels<U: Default + Clone>(
    source: &VertexDb<U>,
    source_key: VertKey,
    target: &VertexDb<U>,
    target_key: VertKey,
    mask: FieldMask,
) -> bool {
    let mut def = VertexDef::new();
    if !source.gather(source_key, &mut def) {
        return false;
    }
    def.retain(mask);
    target.update(target_key, &def);
    true
}
