//! Generators and their declared parameters
//!
//! A [`Generator`] is the already-discovered function that produces an
//! instance for one binding, together with the [`Parameter`]s it wants
//! injected. How each parameter is obtained is a [`Reference`] kind that the
//! resolver dispatches on with a single `match`.

use crate::error::{BoxError, DiError, Result};
use crate::locator::Instance;
use crate::provider::{Injectable, Provider};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased instance, shared between scopes and receivers.
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Type-erased generator function
type GeneratorFn = Arc<dyn Fn(&Args) -> std::result::Result<AnyInstance, BoxError> + Send + Sync>;

/// How a declared parameter is obtained.
#[derive(Clone)]
pub enum Reference {
    /// A fixed value; nothing is resolved
    Constant(AnyInstance),
    /// Resolved from the current request path, one frame deeper
    Relative,
    /// Resolved from an empty path
    Absolute,
    /// Not resolved now; the generator receives a [`Provider`]
    Lazy,
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(_) => f.write_str("Constant"),
            Self::Relative => f.write_str("Relative"),
            Self::Absolute => f.write_str("Absolute"),
            Self::Lazy => f.write_str("Lazy"),
        }
    }
}

/// One declared generator parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    instance: Instance,
    reference: Reference,
}

impl Parameter {
    pub fn new(instance: Instance, reference: Reference) -> Self {
        Self {
            instance,
            reference,
        }
    }

    /// Resolved in the context of the receiving binding.
    pub fn relative(instance: Instance) -> Self {
        Self::new(instance, Reference::Relative)
    }

    /// Resolved as if requested from the root.
    pub fn absolute(instance: Instance) -> Self {
        Self::new(instance, Reference::Absolute)
    }

    /// Handed to the generator as a [`Provider`].
    pub fn lazy(instance: Instance) -> Self {
        Self::new(instance, Reference::Lazy)
    }

    /// A constant value described as `instance`.
    pub fn constant<T: Injectable>(instance: Instance, value: T) -> Self {
        Self::new(instance, Reference::Constant(Arc::new(value)))
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn reference(&self) -> &Reference {
        &self.reference
    }
}

/// Produces the instance of one binding.
///
/// # Examples
///
/// ```rust
/// use graph_injector::{Generator, Instance, Parameter};
///
/// struct Config { url: String }
/// struct Pool { url: String }
///
/// let pool = Generator::from_fn(
///     "Pool::connect",
///     [Parameter::relative(Instance::of_type::<Config>())],
///     |args| {
///         let config = args.get::<Config>(0)?;
///         Ok(Pool { url: config.url.clone() })
///     },
/// );
/// assert_eq!(pool.parameters().len(), 1);
/// ```
#[derive(Clone)]
pub struct Generator {
    name: Arc<str>,
    parameters: Arc<[Parameter]>,
    func: GeneratorFn,
}

impl Generator {
    /// A generator returning an already type-erased instance.
    pub fn new<F>(
        name: impl Into<Arc<str>>,
        parameters: impl IntoIterator<Item = Parameter>,
        func: F,
    ) -> Self
    where
        F: Fn(&Args) -> std::result::Result<AnyInstance, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().collect(),
            func: Arc::new(func),
        }
    }

    /// A generator producing values of `T`.
    pub fn from_fn<T, F>(
        name: impl Into<Arc<str>>,
        parameters: impl IntoIterator<Item = Parameter>,
        func: F,
    ) -> Self
    where
        T: Injectable,
        F: Fn(&Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(name, parameters, move |args| {
            func(args).map(|value| Arc::new(value) as AnyInstance)
        })
    }

    /// A parameterless generator that always hands out the same value.
    pub fn value<T: Injectable>(name: impl Into<Arc<str>>, value: T) -> Self {
        let value: AnyInstance = Arc::new(value);
        Self::new(name, [], move |_| Ok(Arc::clone(&value)))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub(crate) fn invoke(&self, args: &Args) -> std::result::Result<AnyInstance, BoxError> {
        (self.func)(args)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// A resolved generator argument.
pub(crate) enum Arg {
    Value(AnyInstance),
    Lazy(Provider),
}

/// Arguments passed to a generator, in declaration order.
pub struct Args {
    values: Vec<(Instance, Arg)>,
}

impl Args {
    pub(crate) fn new(values: Vec<(Instance, Arg)>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn slot(&self, index: usize) -> Result<&(Instance, Arg)> {
        self.values.get(index).ok_or_else(|| {
            DiError::configuration(format!(
                "generator argument {index} requested, {} declared",
                self.values.len()
            ))
        })
    }

    /// The erased value at `index`.
    pub fn get_any(&self, index: usize) -> Result<AnyInstance> {
        match self.slot(index)? {
            (_, Arg::Value(value)) => Ok(Arc::clone(value)),
            (instance, Arg::Lazy(_)) => Err(DiError::configuration(format!(
                "argument {index} ({instance}) is lazy; use Args::provider"
            ))),
        }
    }

    /// The value at `index` as `T`.
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>> {
        let value = self.get_any(index)?;
        let (instance, _) = self.slot(index)?;
        downcast(value, instance)
    }

    /// The elements of an array-shaped argument at `index`.
    pub fn elements<T: Injectable>(&self, index: usize) -> Result<Vec<Arc<T>>> {
        let value = self.get_any(index)?;
        let (instance, _) = self.slot(index)?;
        let elements = downcast::<Vec<AnyInstance>>(value, instance)?;
        elements
            .iter()
            .map(|e| downcast(Arc::clone(e), instance))
            .collect()
    }

    /// The provider handed out for a lazy argument at `index`.
    pub fn provider(&self, index: usize) -> Result<Provider> {
        match self.slot(index)? {
            (_, Arg::Lazy(provider)) => Ok(provider.clone()),
            (instance, Arg::Value(_)) => Err(DiError::configuration(format!(
                "argument {index} ({instance}) is not lazy"
            ))),
        }
    }
}

/// Downcast an erased instance, reporting `described` on mismatch.
pub(crate) fn downcast<T: Injectable>(value: AnyInstance, described: &dyn fmt::Display) -> Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::type_mismatch::<T>(described.to_string()))
}
