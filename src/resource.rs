//! Bindings and compiled resources
//!
//! A [`Binding`] is the descriptor produced by whatever declaration layer
//! sits upstream. Bootstrap compiles the ordered binding list into
//! [`Resource`]s: exact-duplicate locators are settled by provenance
//! strength and every survivor gets a fixed serial index.

use crate::error::{DiError, Result};
use crate::factory::Generator;
use crate::lifecycle::LifeCycle;
use crate::locator::{Instance, Locator, Target};
use crate::resolver::Resolver;
use ahash::RandomState;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Provenance of a binding, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DeclarationType {
    /// Generated fallback; loses against everything
    Auto,
    /// A default declared at most once
    Default,
    /// Offered by a module for others to use
    Offered,
    /// Published by a module
    Published,
    /// One of several bindings that coexist on purpose
    Multi,
    /// Explicitly declared
    #[default]
    Explicit,
    /// Placeholder that some other binding must satisfy
    Required,
}

impl DeclarationType {
    /// Sorts after every other provenance at resolution time.
    #[inline]
    pub fn is_fallback(self) -> bool {
        self == Self::Auto
    }

    /// Two of these for the same locator drop each other instead of failing.
    #[inline]
    fn drops_on_clash(self) -> bool {
        matches!(self, Self::Auto | Self::Default)
    }
}

impl fmt::Display for DeclarationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Default => "default",
            Self::Offered => "offered",
            Self::Published => "published",
            Self::Multi => "multi",
            Self::Explicit => "explicit",
            Self::Required => "required",
        };
        f.write_str(name)
    }
}

/// Where a binding was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    kind: DeclarationType,
    module: Arc<str>,
    sequence: usize,
}

impl Source {
    pub fn new(kind: DeclarationType, module: impl Into<Arc<str>>, sequence: usize) -> Self {
        Self {
            kind,
            module: module.into(),
            sequence,
        }
    }

    #[inline]
    pub fn kind(&self) -> DeclarationType {
        self.kind
    }

    #[inline]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Position of the declaration in the bootstrap input.
    #[inline]
    pub fn sequence(&self) -> usize {
        self.sequence
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}#{}", self.kind, self.module, self.sequence)
    }
}

/// Post-assembly check for one resource.
pub type Verifier = Arc<dyn Fn(&Resource, &Resolver) -> std::result::Result<(), String> + Send + Sync>;

/// A binding descriptor.
///
/// # Examples
///
/// ```rust
/// use graph_injector::{Binding, DeclarationType, Generator, Instance, LifeCycle};
///
/// struct Clock;
///
/// let binding = Binding::new(Instance::of_type::<Clock>(), Generator::value("Clock", Clock))
///     .scoped(LifeCycle::application())
///     .declared(DeclarationType::Default)
///     .in_module("time");
/// assert_eq!(binding.kind(), DeclarationType::Default);
/// ```
#[derive(Clone)]
pub struct Binding {
    locator: Locator,
    lifecycle: LifeCycle,
    kind: DeclarationType,
    module: Arc<str>,
    generator: Generator,
    verifier: Option<Verifier>,
}

impl Binding {
    /// An explicit binding of `instance` that applies anywhere and creates a
    /// new instance on every injection.
    pub fn new(instance: Instance, generator: Generator) -> Self {
        Self {
            locator: Locator::anywhere(instance),
            lifecycle: LifeCycle::injection(),
            kind: DeclarationType::Explicit,
            module: Arc::from("main"),
            generator,
            verifier: None,
        }
    }

    /// A `Required` placeholder: bootstrap fails unless another binding
    /// provides something assignable to `instance`.
    pub fn required(instance: Instance) -> Self {
        let generator = Generator::new(format!("required {instance}"), [], |_| {
            Err("required placeholders are never instantiated".into())
        });
        Self::new(instance, generator).declared(DeclarationType::Required)
    }

    pub fn target(mut self, target: Target) -> Self {
        self.locator = Locator::new(self.locator.instance().clone(), target);
        self
    }

    pub fn scoped(mut self, lifecycle: LifeCycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn declared(mut self, kind: DeclarationType) -> Self {
        self.kind = kind;
        self
    }

    pub fn in_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = module.into();
        self
    }

    pub fn verified_by<F>(mut self, verifier: F) -> Self
    where
        F: Fn(&Resource, &Resolver) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    #[inline]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    #[inline]
    pub fn lifecycle(&self) -> &LifeCycle {
        &self.lifecycle
    }

    #[inline]
    pub fn kind(&self) -> DeclarationType {
        self.kind
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("locator", &self.locator.to_string())
            .field("lifecycle", &self.lifecycle.name())
            .field("kind", &self.kind)
            .field("module", &self.module)
            .finish()
    }
}

/// A compiled binding with its fixed serial index.
#[derive(Clone)]
pub struct Resource {
    serial: usize,
    locator: Locator,
    lifecycle: LifeCycle,
    source: Source,
    generator: Generator,
    verifier: Option<Verifier>,
}

impl Resource {
    fn compile(serial: usize, sequence: usize, binding: Binding) -> Self {
        Self {
            serial,
            locator: binding.locator,
            lifecycle: binding.lifecycle,
            source: Source::new(binding.kind, binding.module, sequence),
            generator: binding.generator,
            verifier: binding.verifier,
        }
    }

    #[inline]
    pub fn serial(&self) -> usize {
        self.serial
    }

    #[inline]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        self.locator.instance()
    }

    #[inline]
    pub fn lifecycle(&self) -> &LifeCycle {
        &self.lifecycle
    }

    #[inline]
    pub fn source(&self) -> &Source {
        &self.source
    }

    #[inline]
    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    #[inline]
    pub(crate) fn verifier(&self) -> Option<&Verifier> {
        self.verifier.as_ref()
    }

    /// Locator specificity, then serial.
    pub fn specificity_cmp(&self, other: &Resource) -> Ordering {
        self.locator
            .specificity_cmp(&other.locator)
            .then_with(|| self.serial.cmp(&other.serial))
    }

    #[inline]
    pub fn more_qualified_than(&self, other: &Resource) -> bool {
        self.specificity_cmp(other) == Ordering::Less
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] @ {}", self.locator, self.source, self.lifecycle)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("serial", &self.serial)
            .field("locator", &self.locator.to_string())
            .field("lifecycle", &self.lifecycle.name())
            .field("source", &self.source.to_string())
            .field("generator", &self.generator.name())
            .finish()
    }
}

/// Result of compiling the bootstrap input.
pub(crate) struct Compiled {
    pub(crate) resources: Vec<Resource>,
    /// `Required` placeholders, checked once the registry exists
    pub(crate) required: Vec<Binding>,
}

enum Slot {
    Live(Vec<usize>),
    /// Both sides of a fallback clash were dropped
    Dropped(DeclarationType),
}

/// Settle duplicate locators by provenance and assign serials.
pub(crate) fn compile(bindings: Vec<Binding>) -> Result<Compiled> {
    let mut kept: Vec<Option<(usize, Binding)>> = Vec::with_capacity(bindings.len());
    let mut required = Vec::new();
    let mut slots: HashMap<Locator, Slot, RandomState> = HashMap::default();

    for (position, binding) in bindings.into_iter().enumerate() {
        if binding.kind == DeclarationType::Required {
            required.push(binding);
            continue;
        }
        let index = kept.len();
        let kind = binding.kind;
        let slot = slots.entry(binding.locator.clone()).or_insert(Slot::Live(Vec::new()));

        let (existing, dropped) = match &*slot {
            Slot::Live(live) => (
                live.first().and_then(|i| kept[*i].as_ref()).map(|(_, b)| b.kind),
                None,
            ),
            Slot::Dropped(dropped) => (None, Some(*dropped)),
        };
        if let Some(dropped) = dropped {
            if kind > dropped {
                *slot = Slot::Live(vec![index]);
                kept.push(Some((position, binding)));
            }
            continue;
        }

        match existing {
            None => {
                *slot = Slot::Live(vec![index]);
                kept.push(Some((position, binding)));
            }
            Some(current) if kind < current => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "graph_injector",
                    locator = %binding.locator,
                    kind = %kind,
                    kept = %current,
                    "Ignoring weaker binding"
                );
            }
            Some(current) if kind > current => {
                if let Slot::Live(live) = slot {
                    for replaced in live.drain(..) {
                        kept[replaced] = None;
                    }
                }
                #[cfg(feature = "logging")]
                debug!(
                    target: "graph_injector",
                    locator = %binding.locator,
                    kind = %kind,
                    replaced = %current,
                    "Stronger binding replaces weaker one"
                );
                *slot = Slot::Live(vec![index]);
                kept.push(Some((position, binding)));
            }
            Some(current) if current == DeclarationType::Multi => {
                if let Slot::Live(live) = slot {
                    live.push(index);
                }
                kept.push(Some((position, binding)));
            }
            Some(current) if current.drops_on_clash() => {
                if let Slot::Live(live) = slot {
                    for dropped in live.drain(..) {
                        kept[dropped] = None;
                    }
                }
                #[cfg(feature = "logging")]
                debug!(
                    target: "graph_injector",
                    locator = %binding.locator,
                    kind = %kind,
                    "Clashing fallback bindings dropped"
                );
                *slot = Slot::Dropped(current);
            }
            Some(_) => {
                let first = match &*slot {
                    Slot::Live(live) => live.first().and_then(|i| kept[*i].as_ref()).map(|(_, b)| b),
                    Slot::Dropped(_) => None,
                };
                let (first, first_source) = first
                    .map(|b| (b.locator.to_string(), format!("{} in {}", b.kind, b.module)))
                    .unwrap_or_default();

                #[cfg(feature = "logging")]
                warn!(
                    target: "graph_injector",
                    locator = %binding.locator,
                    kind = %kind,
                    "Ambiguous bindings for the same locator"
                );

                return Err(DiError::Ambiguous {
                    first,
                    first_source,
                    second: binding.locator.to_string(),
                    second_source: format!("{} in {}", binding.kind, binding.module),
                });
            }
        }
    }

    let resources = kept
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(serial, (sequence, binding))| Resource::compile(serial, sequence, binding))
        .collect();

    Ok(Compiled {
        resources,
        required,
    })
}
