//! Immutable resource registry
//!
//! Built once at bootstrap and shared read-only afterwards. The only
//! mutable part is a memo of raw-type candidate lists, kept in a `DashMap`
//! so concurrent resolutions never block each other on it.

use crate::locator::Locator;
use crate::request::Request;
use crate::resource::Resource;
use crate::types::{RawType, TypeDescriptor};
use ahash::RandomState;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Resources by serial plus a memoized raw-type index.
pub struct Registry {
    resources: Box<[Resource]>,
    /// (raw type, dimensions) -> serials of raw-assignable resources
    candidates: DashMap<(RawType, u8), Arc<[usize]>, RandomState>,
}

impl Registry {
    /// Resources must already carry dense serials in order.
    pub(crate) fn new(resources: Vec<Resource>) -> Self {
        // Scale shards with the registry, as the container storage did
        let shard_amount = if resources.len() <= 16 {
            8
        } else if resources.len() <= 64 {
            16
        } else {
            32
        };
        Self {
            resources: resources.into_boxed_slice(),
            candidates: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                shard_amount,
            ),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    #[inline]
    pub fn get(&self, serial: usize) -> Option<&Resource> {
        self.resources.get(serial)
    }

    /// All resources in serial order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Serials of resources whose raw type and dimension fit `ty`.
    fn raw_candidates(&self, ty: &TypeDescriptor) -> Arc<[usize]> {
        let key = (ty.raw().clone(), ty.dimensions());
        if let Some(hit) = self.candidates.get(&key) {
            return Arc::clone(hit.value());
        }
        let found: Arc<[usize]> = self
            .resources
            .iter()
            .filter(|r| r.instance().ty().is_raw_assignable_to(ty))
            .map(Resource::serial)
            .collect();

        #[cfg(feature = "logging")]
        trace!(
            target: "graph_injector",
            ty = %ty,
            candidates = found.len(),
            "Indexed raw-type candidates"
        );

        Arc::clone(self.candidates.entry(key).or_insert(found).value())
    }

    /// Resources matching `request`, most preferred first.
    pub fn matching(&self, request: &Request) -> Vec<&Resource> {
        let mut matched: Vec<&Resource> = self
            .raw_candidates(request.instance().ty())
            .iter()
            .filter_map(|serial| self.resources.get(*serial))
            .filter(|r| r.locator().is_matching(request))
            .collect();
        matched.sort_by(|a, b| precedence(a, b));
        matched
    }

    /// Raw-compatible resources that failed the full match, for diagnostics.
    pub fn dropped(&self, request: &Request) -> Vec<&Locator> {
        self.raw_candidates(request.instance().ty())
            .iter()
            .filter_map(|serial| self.resources.get(*serial))
            .filter(|r| !r.locator().is_matching(request))
            .map(Resource::locator)
            .collect()
    }
}

/// Resolution order among matching resources.
///
/// Fallback provenance sorts last regardless of type. Otherwise a more
/// specific provided type wins, then the more specific locator, then the
/// lower serial.
pub fn precedence(a: &Resource, b: &Resource) -> Ordering {
    a.source()
        .kind()
        .is_fallback()
        .cmp(&b.source().kind().is_fallback())
        .then_with(|| a.instance().ty().specificity_cmp(b.instance().ty()))
        .then_with(|| a.specificity_cmp(b))
}
