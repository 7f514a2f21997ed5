//! Injectable values and lazy providers
//!
//! A [`Provider`] is the explicit indirection between a long-lived receiver
//! and a shorter-lived dependency: instead of the dependency itself the
//! receiver gets a handle that resolves it on demand, from an empty request
//! path, so no lifetime nesting is recorded.

use crate::error::{DiError, Result};
use crate::factory::{AnyInstance, downcast};
use crate::request::Request;
use crate::resolver::WeakResolver;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Marker trait for values a generator can produce.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

impl<T: Send + Sync + 'static> Injectable for T {}

/// Deferred access to one instance.
///
/// Holds the resolver weakly: a provider stored inside an application-scoped
/// instance does not keep the resolver alive.
#[derive(Clone)]
pub struct Provider {
    resolver: WeakResolver,
    request: Request,
}

impl Provider {
    pub(crate) fn new(resolver: WeakResolver, request: Request) -> Self {
        Self { resolver, request }
    }

    /// The request this provider resolves.
    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Resolve now.
    pub fn get_any(&self) -> Result<AnyInstance> {
        let resolver = self.resolver.upgrade().ok_or_else(|| {
            DiError::configuration(format!(
                "provider for {} outlived its resolver",
                self.request.instance()
            ))
        })?;

        #[cfg(feature = "logging")]
        trace!(
            target: "graph_injector",
            instance = %self.request.instance(),
            "Provider resolving deferred instance"
        );

        resolver.resolve(&self.request)
    }

    /// Resolve now and downcast to `T`.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        downcast(self.get_any()?, self.request.instance())
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("instance", self.request.instance())
            .finish()
    }
}
