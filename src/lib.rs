//! # Graph Injector - Deterministic Object-Graph Resolution
//!
//! The resolution core of an object-graph construction library. Given a
//! fixed set of compiled bindings it answers requests of the form "produce
//! an instance of this type under this qualifier, requested from this place
//! in the graph", and it detects cycles and unsafe lifetime nesting from the
//! shape of the request path alone.
//!
//! ## Features
//!
//! - **Structural types** - generic parameters, upper bounds and array
//!   dimensions are data, matched by explicit assignability rules
//! - **Qualifiers** - default, any, namespaced and single-wildcard names
//!   with a consistent specificity order
//! - **Deterministic** - every comparator is a total order, so the same
//!   registry always picks the same winner
//! - **Safe nesting** - cycles and shorter-lived-inside-longer-lived
//!   injections fail fast with a descriptive error
//! - **Pluggable scopes** - application, per-type, per-request-path,
//!   per-thread, attachable worker contexts, or your own [`Scope`]
//! - **Lock-free reads** - the registry is immutable after bootstrap
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use graph_injector::{Binding, Generator, Instance, LifeCycle, Parameter, Resolver};
//!
//! struct Database { url: String }
//! struct UserService { db: std::sync::Arc<Database> }
//!
//! let resolver = Resolver::builder()
//!     .bind(
//!         Binding::new(
//!             Instance::of_type::<Database>(),
//!             Generator::value("Database", Database { url: "postgres://localhost".into() }),
//!         )
//!         .scoped(LifeCycle::application()),
//!     )
//!     .bind(Binding::new(
//!         Instance::of_type::<UserService>(),
//!         Generator::from_fn(
//!             "UserService::new",
//!             [Parameter::relative(Instance::of_type::<Database>())],
//!             |args| Ok(UserService { db: args.get::<Database>(0)? }),
//!         ),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let users = resolver.get::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Qualifiers and Fallbacks
//!
//! ```rust
//! use graph_injector::{Binding, Generator, Instance, Resolver, TypeDescriptor};
//!
//! struct Port(u16);
//! let port = TypeDescriptor::of::<Port>();
//!
//! let resolver = Resolver::builder()
//!     .bind(Binding::new(Instance::of(port.clone()), Generator::value("http", Port(80))))
//!     .bind(Binding::new(Instance::new("admin", port.clone()), Generator::value("admin", Port(8080))))
//!     .bind(Binding::new(Instance::new("*", port), Generator::value("any", Port(0))))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(resolver.get::<Port>().unwrap().0, 80);
//! assert_eq!(resolver.get_named::<Port>("admin").unwrap().0, 8080);
//! assert_eq!(resolver.get_named::<Port>("metrics").unwrap().0, 0);
//! ```

mod error;
mod factory;
mod lifecycle;
mod locator;
#[cfg(feature = "logging")]
pub mod logging;
mod name;
mod provider;
mod request;
mod resolver;
mod resource;
mod scope;
mod storage;
mod types;

pub use error::*;
pub use factory::*;
pub use lifecycle::*;
pub use locator::*;
pub use name::*;
pub use provider::*;
pub use request::*;
pub use resolver::*;
pub use resource::*;
pub use scope::*;
pub use storage::*;
pub use types::*;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AnyInstance, Binding, Bootstrap, DeclarationType, DiError, Generator, Injectable,
        Instance, LifeCycle, Name, Parameter, Provider, RawType, Request, Resolver, Result,
        Scope, Target, TypeDescriptor, Visibility,
    };
    pub use std::sync::Arc;
}
