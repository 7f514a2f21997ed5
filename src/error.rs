//! Error types for resolution and bootstrap

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error type returned by generator functions.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors that can occur while bootstrapping a [`Resolver`](crate::Resolver)
/// or resolving a [`Request`](crate::Request).
///
/// None of these are retried internally; each aborts the current call.
#[derive(Error, Debug)]
pub enum DiError {
    /// No resource survived candidate filtering
    #[error("No resource matches {requested}{}", format_dropped(.dropped))]
    NoMatch {
        requested: String,
        /// Resources with a compatible raw type that failed the full match
        dropped: Vec<String>,
    },

    /// The request path revisits an identical (instance, locator) pair
    #[error("Dependency cycle detected: {path}")]
    Cycle { path: String },

    /// A shorter-lived instance would be embedded in a longer-lived one
    #[error(
        "Unstable nesting: {dependency} ({lifecycle}) cannot be injected into {ancestor} ({ancestor_lifecycle}) without an indirection"
    )]
    Unstable {
        dependency: String,
        lifecycle: String,
        ancestor: String,
        ancestor_lifecycle: String,
    },

    /// Two bindings for the same locator with equal or incomparable provenance
    #[error("Ambiguous bindings: {first} [{first_source}] clashes with {second} [{second_source}]")]
    Ambiguous {
        first: String,
        first_source: String,
        second: String,
        second_source: String,
    },

    /// The chosen generator failed to produce an instance
    #[error("Generator {generator} failed: {source}")]
    GeneratorFailed {
        generator: String,
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },

    /// An indirect-only binding was requested through a concrete type
    #[error("Illegal direct access to {locator} through concrete type {requested}")]
    IllegalAccess { requested: String, locator: String },

    /// A produced instance is not of the requested Rust type
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// A scope that needs an attached context was used without one
    #[error("Scope {scope} is not active on the current thread")]
    ScopeNotActive { scope: String },

    /// Misconfigured bootstrap (verification, unknown scope, unfulfilled requirement)
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

fn format_dropped(dropped: &[String]) -> String {
    if dropped.is_empty() {
        String::new()
    } else {
        format!(" (dropped candidates: {})", dropped.join(", "))
    }
}

impl DiError {
    /// Create a NoMatch error
    #[inline]
    pub fn no_match(requested: impl ToString, dropped: Vec<String>) -> Self {
        Self::NoMatch {
            requested: requested.to_string(),
            dropped,
        }
    }

    /// Create a Cycle error from the rendered request path
    #[inline]
    pub fn cycle(path: impl Into<String>) -> Self {
        Self::Cycle { path: path.into() }
    }

    /// Wrap a generator failure, keeping the original cause
    #[inline]
    pub fn generator_failed(generator: impl Into<String>, source: BoxError) -> Self {
        Self::GeneratorFailed {
            generator: generator.into(),
            source: Arc::from(source),
        }
    }

    /// Create a TypeMismatch error for the expected type `T`
    #[inline]
    pub fn type_mismatch<T: 'static>(actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>(),
            actual: actual.into(),
        }
    }

    /// Create a Configuration error
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error was raised by the cycle check
    #[inline]
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }

    /// Whether this error was raised by the lifetime-stability check
    #[inline]
    pub fn is_unstable(&self) -> bool {
        matches!(self, Self::Unstable { .. })
    }
}

impl Clone for DiError {
    fn clone(&self) -> Self {
        match self {
            Self::NoMatch { requested, dropped } => Self::NoMatch {
                requested: requested.clone(),
                dropped: dropped.clone(),
            },
            Self::Cycle { path } => Self::Cycle { path: path.clone() },
            Self::Unstable {
                dependency,
                lifecycle,
                ancestor,
                ancestor_lifecycle,
            } => Self::Unstable {
                dependency: dependency.clone(),
                lifecycle: lifecycle.clone(),
                ancestor: ancestor.clone(),
                ancestor_lifecycle: ancestor_lifecycle.clone(),
            },
            Self::Ambiguous {
                first,
                first_source,
                second,
                second_source,
            } => Self::Ambiguous {
                first: first.clone(),
                first_source: first_source.clone(),
                second: second.clone(),
                second_source: second_source.clone(),
            },
            Self::GeneratorFailed { generator, source } => Self::GeneratorFailed {
                generator: generator.clone(),
                source: Arc::clone(source),
            },
            Self::IllegalAccess { requested, locator } => Self::IllegalAccess {
                requested: requested.clone(),
                locator: locator.clone(),
            },
            Self::TypeMismatch { expected, actual } => Self::TypeMismatch {
                expected,
                actual: actual.clone(),
            },
            Self::ScopeNotActive { scope } => Self::ScopeNotActive {
                scope: scope.clone(),
            },
            Self::Configuration { message } => Self::Configuration {
                message: message.clone(),
            },
        }
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;
