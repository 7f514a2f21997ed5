//! The resolver
//!
//! [`Resolver`] is the only entry point callers use. It is built once by
//! [`Bootstrap`] from an ordered list of [`Binding`]s and never changes
//! afterwards; all mutation happens inside the [`Scope`]s it delegates to.
//!
//! Resolution of one request:
//!
//! 1. filter the registry to matching resources and sort them
//! 2. take the first one (or, for an array-shaped request nobody binds
//!    directly, every matching element)
//! 3. push a frame for it onto the request (cycle and stability checks)
//! 4. let the resource's scope reuse an instance or create one, resolving
//!    the generator's parameters against the pushed request

use crate::error::{DiError, Result};
use crate::factory::{AnyInstance, Arg, Args, Reference, downcast};
use crate::lifecycle::LifeCycle;
use crate::locator::Instance;
use crate::name::Name;
use crate::provider::{Injectable, Provider};
use crate::request::{Frame, Request};
use crate::resource::{Binding, Resource, compile};
use crate::scope::{ApplicationScope, InjectionScope, KeyedScope, Scope, WorkerScope};
use crate::storage::Registry;
use crate::types::TypeDescriptor;
use ahash::RandomState;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, info, trace};

/// Called once for every permanent instance actually created.
pub type Observer = Arc<dyn Fn(&Resource, &AnyInstance) + Send + Sync>;

struct Inner {
    registry: Registry,
    scopes: HashMap<Arc<str>, Arc<dyn Scope>, RandomState>,
    worker: Option<Arc<WorkerScope>>,
    observer: Option<Observer>,
}

/// Immutable, thread-safe resolver over a compiled registry.
///
/// Cloning is cheap and every clone shares the same registry and scopes.
///
/// # Examples
///
/// ```rust
/// use graph_injector::{Binding, Generator, Instance, LifeCycle, Parameter, Resolver};
///
/// struct Config { url: String }
/// struct Database { url: String }
///
/// let resolver = Resolver::builder()
///     .bind(
///         Binding::new(
///             Instance::of_type::<Config>(),
///             Generator::value("Config", Config { url: "postgres://localhost".into() }),
///         )
///         .scoped(LifeCycle::application()),
///     )
///     .bind(Binding::new(
///         Instance::of_type::<Database>(),
///         Generator::from_fn(
///             "Database::connect",
///             [Parameter::relative(Instance::of_type::<Config>())],
///             |args| Ok(Database { url: args.get::<Config>(0)?.url.clone() }),
///         ),
///     ))
///     .build()
///     .unwrap();
///
/// let db = resolver.get::<Database>().unwrap();
/// assert_eq!(db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

/// Non-owning handle to a [`Resolver`].
#[derive(Clone)]
pub(crate) struct WeakResolver(Weak<Inner>);

impl WeakResolver {
    pub(crate) fn upgrade(&self) -> Option<Resolver> {
        self.0.upgrade().map(|inner| Resolver { inner })
    }
}

impl Resolver {
    /// Start a bootstrap with the standard scopes registered.
    pub fn builder() -> Bootstrap {
        Bootstrap::new()
    }

    /// Resolve a request.
    pub fn resolve(&self, request: &Request) -> Result<AnyInstance> {
        let candidates = self.inner.registry.matching(request);

        #[cfg(feature = "logging")]
        trace!(
            target: "graph_injector",
            request = %request,
            candidates = candidates.len(),
            depth = request.depth(),
            "Resolving"
        );

        if let Some(winner) = candidates.first() {
            return self.produce(winner, request);
        }
        if let Some(element) = request.instance().ty().element() {
            return self.collect(request, element);
        }

        let dropped: Vec<String> = self
            .inner
            .registry
            .dropped(request)
            .iter()
            .map(|l| l.to_string())
            .collect();

        #[cfg(feature = "logging")]
        debug!(
            target: "graph_injector",
            request = %request,
            dropped = dropped.len(),
            "No resource matches"
        );

        Err(DiError::no_match(request.instance(), dropped))
    }

    /// Resolve the default-qualified `ty` from the root.
    pub fn resolve_type(&self, ty: TypeDescriptor) -> Result<AnyInstance> {
        self.resolve(&Request::of(ty))
    }

    /// Resolve `ty` under `name` from the root.
    pub fn resolve_named(&self, name: impl Into<Name>, ty: TypeDescriptor) -> Result<AnyInstance> {
        self.resolve(&Request::named(name, ty))
    }

    /// Every instance of `ty`, most qualified first.
    pub fn resolve_all(&self, ty: TypeDescriptor) -> Result<Vec<AnyInstance>> {
        let described = ty.array();
        let all = self.resolve(&Request::of(described.clone()))?;
        let all = downcast::<Vec<AnyInstance>>(all, &described)?;
        Ok(all.as_ref().clone())
    }

    /// Resolve the Rust type `T`.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        let request = Request::of_type::<T>();
        downcast(self.resolve(&request)?, request.instance())
    }

    /// Resolve the Rust type `T` under `name`.
    pub fn get_named<T: Injectable>(&self, name: impl Into<Name>) -> Result<Arc<T>> {
        let request = Request::new(Instance::new(name, TypeDescriptor::of::<T>()));
        downcast(self.resolve(&request)?, request.instance())
    }

    /// Every instance bound for `T`, most qualified first.
    pub fn get_all<T: Injectable>(&self) -> Result<Vec<Arc<T>>> {
        let ty = TypeDescriptor::of::<T>();
        self.resolve_all(ty.clone())?
            .into_iter()
            .map(|value| downcast(value, &ty))
            .collect()
    }

    /// Resolve `T`, or `None` on any error.
    #[inline]
    pub fn try_get<T: Injectable>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    /// Resources that would serve `request`, in resolution order.
    pub fn matching(&self, request: &Request) -> Vec<&Resource> {
        self.inner.registry.matching(request)
    }

    /// All resources in serial order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.inner.registry.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    /// The built-in worker scope, for attaching and detaching threads.
    ///
    /// `None` when the `worker` lifecycle was given another scope at
    /// bootstrap.
    #[inline]
    pub fn worker(&self) -> Option<&WorkerScope> {
        self.inner.worker.as_deref()
    }

    pub(crate) fn downgrade(&self) -> WeakResolver {
        WeakResolver(Arc::downgrade(&self.inner))
    }

    fn scope_for(&self, lifecycle: &LifeCycle) -> Result<&Arc<dyn Scope>> {
        self.inner.scopes.get(lifecycle.name()).ok_or_else(|| {
            DiError::configuration(format!("no scope registered for lifecycle {lifecycle}"))
        })
    }

    /// Array-shaped request with no direct binding: resolve every element
    /// bound for the element type. Elements are not themselves collected,
    /// so `T[][]` only gathers `T[]` bindings.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn collect(&self, request: &Request, element: TypeDescriptor) -> Result<AnyInstance> {
        let wanted = request.instance();
        let name = if wanted.name().is_default() {
            Name::ANY
        } else {
            wanted.name().clone()
        };
        let element_request = request.with_instance(Instance::new(name, element));
        let candidates = self.inner.registry.matching(&element_request);

        let mut values: Vec<AnyInstance> = Vec::with_capacity(candidates.len());
        for resource in candidates {
            match self.produce(resource, &element_request) {
                Ok(value) => values.push(value),
                Err(err) if request.is_best_effort() => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "graph_injector",
                        resource = %resource,
                        error = %err,
                        "Skipping element that failed to produce"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Arc::new(values))
    }

    fn produce(&self, resource: &Resource, request: &Request) -> Result<AnyInstance> {
        let target = resource.locator().target();
        if target.is_indirect_only() && !request.instance().ty().raw().is_abstract() {
            return Err(DiError::IllegalAccess {
                requested: request.instance().to_string(),
                locator: resource.locator().to_string(),
            });
        }

        let frame = Frame::new(
            request.instance().clone(),
            resource.locator().clone(),
            resource.lifecycle().clone(),
            resource.source().module(),
        );
        let pushed = request.push(frame)?;
        let scope = self.scope_for(resource.lifecycle())?;

        scope.provide(resource.serial(), self.len(), request, &|| {
            self.create(resource, &pushed)
        })
    }

    fn create(&self, resource: &Resource, pushed: &Request) -> Result<AnyInstance> {
        let generator = resource.generator();
        let mut args = Vec::with_capacity(generator.parameters().len());
        for parameter in generator.parameters() {
            let instance = parameter.instance().clone();
            let arg = match parameter.reference() {
                Reference::Constant(value) => Arg::Value(Arc::clone(value)),
                Reference::Relative => Arg::Value(self.resolve(&pushed.with_instance(instance.clone()))?),
                Reference::Absolute => Arg::Value(self.resolve(&Request::new(instance.clone()))?),
                Reference::Lazy => Arg::Lazy(Provider::new(self.downgrade(), Request::new(instance.clone()))),
            };
            args.push((instance, arg));
        }

        let instance = generator
            .invoke(&Args::new(args))
            .map_err(|cause| DiError::generator_failed(generator.name(), cause))?;

        if resource.lifecycle().is_permanent() {
            #[cfg(feature = "logging")]
            debug!(
                target: "graph_injector",
                resource = %resource,
                "Created permanent instance"
            );

            if let Some(observer) = &self.inner.observer {
                observer(resource, &instance);
            }
        }

        Ok(instance)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resources", &self.inner.registry.len())
            .field("scopes", &self.inner.scopes.len())
            .finish()
    }
}

/// Collects bindings and scopes, then freezes them into a [`Resolver`].
pub struct Bootstrap {
    bindings: Vec<Binding>,
    scopes: HashMap<Arc<str>, Arc<dyn Scope>, RandomState>,
    worker: Option<Arc<WorkerScope>>,
    observer: Option<Observer>,
    eager: bool,
}

impl Bootstrap {
    /// A bootstrap with a scope for every standard lifecycle.
    pub fn new() -> Self {
        let worker = Arc::new(WorkerScope::new());
        let mut bootstrap = Self {
            bindings: Vec::new(),
            scopes: HashMap::default(),
            worker: None,
            observer: None,
            eager: true,
        }
        .scope(LifeCycle::container(), Arc::new(ApplicationScope::new()))
        .scope(LifeCycle::application(), Arc::new(ApplicationScope::new()))
        .scope(LifeCycle::eager_application(), Arc::new(ApplicationScope::new()))
        .scope(LifeCycle::per_type(), Arc::new(KeyedScope::per_type()))
        .scope(LifeCycle::per_instance(), Arc::new(KeyedScope::per_instance()))
        .scope(LifeCycle::injection(), Arc::new(InjectionScope))
        .scope(LifeCycle::dependency(), Arc::new(KeyedScope::dependency()))
        .scope(LifeCycle::target(), Arc::new(KeyedScope::target()))
        .scope(LifeCycle::thread(), Arc::new(KeyedScope::thread()))
        .scope(LifeCycle::worker(), Arc::clone(&worker) as Arc<dyn Scope>);
        bootstrap.worker = Some(worker);
        bootstrap
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bind_all(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Register or replace the scope backing `lifecycle`.
    ///
    /// Replacing the `worker` scope detaches [`Resolver::worker`].
    pub fn scope(mut self, lifecycle: LifeCycle, scope: Arc<dyn Scope>) -> Self {
        if lifecycle == LifeCycle::worker() {
            self.worker = None;
        }
        self.scopes.insert(Arc::from(lifecycle.name()), scope);
        self
    }

    /// Install the observer hook.
    pub fn observe<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Resource, &AnyInstance) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Whether eager resources are created by [`build`](Self::build).
    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    /// Compile, check and freeze.
    ///
    /// Fails on ambiguous bindings, lifecycles without a scope, unmet
    /// `Required` placeholders, failing verifiers, and eager instances that
    /// cannot be created.
    pub fn build(self) -> Result<Resolver> {
        let compiled = compile(self.bindings)?;

        if let Some(orphan) = compiled
            .resources
            .iter()
            .find(|r| !self.scopes.contains_key(r.lifecycle().name()))
        {
            return Err(DiError::configuration(format!(
                "{orphan} uses lifecycle {} which has no registered scope",
                orphan.lifecycle()
            )));
        }

        let resolver = Resolver {
            inner: Arc::new(Inner {
                registry: Registry::new(compiled.resources),
                scopes: self.scopes,
                worker: self.worker,
                observer: self.observer,
            }),
        };

        for required in &compiled.required {
            let wanted = required.locator().instance();
            if !resolver.resources().any(|r| r.instance().is_assignable_to(wanted)) {
                return Err(DiError::configuration(format!(
                    "required {wanted} is not provided by any binding"
                )));
            }
        }

        for resource in resolver.resources() {
            if let Some(verify) = resource.verifier() {
                verify(resource, &resolver).map_err(|message| {
                    DiError::configuration(format!("verification of {resource} failed: {message}"))
                })?;
            }
        }

        if self.eager {
            for resource in resolver.resources().filter(|r| r.lifecycle().is_eager()) {
                #[cfg(feature = "logging")]
                debug!(
                    target: "graph_injector",
                    resource = %resource,
                    "Creating eager instance"
                );
                resolver.produce(resource, &Request::new(resource.instance().clone()))?;
            }
        }

        #[cfg(feature = "logging")]
        info!(
            target: "graph_injector",
            resources = resolver.len(),
            required = compiled.required.len(),
            eager = self.eager,
            "Resolver bootstrapped"
        );

        Ok(resolver)
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{Generator, Parameter};
    use crate::locator::{Target, Visibility};
    use crate::resource::DeclarationType;
    use crate::types::RawType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex, mpsc};
    use std::thread;
    use std::time::Duration;

    fn ty(name: &'static str) -> TypeDescriptor {
        RawType::concrete(name).into()
    }

    fn text(value: &'static str) -> Generator {
        Generator::value(value, value)
    }

    fn bind(name: &'static str, t: &TypeDescriptor, generator: Generator) -> Binding {
        Binding::new(Instance::new(name, t.clone()), generator)
    }

    fn read(value: AnyInstance) -> &'static str {
        *value.downcast_ref::<&'static str>().unwrap()
    }

    #[test]
    fn test_qualifier_resolution() {
        let t = ty("T");
        let resolver = Resolver::builder()
            .bind(bind("", &t, text("a")))
            .bind(bind("x", &t, text("b")))
            .build()
            .unwrap();
        assert_eq!(read(resolver.resolve_type(t.clone()).unwrap()), "a");
        assert_eq!(read(resolver.resolve_named("x", t.clone()).unwrap()), "b");
        let err = resolver.resolve_named("y", t.clone()).unwrap_err();
        match err {
            DiError::NoMatch { requested, dropped } => {
                assert_eq!(requested, "\"y\" T");
                assert_eq!(dropped.len(), 2);
            }
            other => panic!("unexpected {other}"),
        }

        let with_wildcard = Resolver::builder()
            .bind(bind("", &t, text("a")))
            .bind(bind("x", &t, text("b")))
            .bind(bind("*", &t, text("c")))
            .build()
            .unwrap();
        assert_eq!(read(with_wildcard.resolve_named("y", t.clone()).unwrap()), "c");
        assert_eq!(read(with_wildcard.resolve_named("x", t).unwrap()), "b");
    }

    #[test]
    fn test_constructor_cycle_is_detected() {
        let (foo, bar) = (ty("Foo"), ty("Bar"));
        let resolver = Resolver::builder()
            .bind(bind(
                "",
                &foo,
                Generator::new("Foo::new", [Parameter::relative(Instance::of(bar.clone()))], |_| {
                    Ok(Arc::new(()) as AnyInstance)
                }),
            ))
            .bind(bind(
                "",
                &bar,
                Generator::new("Bar::new", [Parameter::relative(Instance::of(foo.clone()))], |_| {
                    Ok(Arc::new(()) as AnyInstance)
                }),
            ))
            .build()
            .unwrap();
        let err = resolver.resolve_type(foo).unwrap_err();
        assert!(err.is_cycle(), "{err}");
    }

    #[test]
    fn test_reentry_through_another_instance_is_a_cycle() {
        let service = RawType::capability("Service");
        let implementation: TypeDescriptor = RawType::concrete("ServiceImpl").extending([&service]).into();
        let resolver = Resolver::builder()
            .bind(
                bind(
                    "",
                    &implementation,
                    Generator::new(
                        "ServiceImpl::new",
                        [Parameter::relative(Instance::of(service.into()))],
                        |_| Ok(Arc::new(()) as AnyInstance),
                    ),
                )
                .scoped(LifeCycle::application()),
            )
            .build()
            .unwrap();
        assert!(resolver.resolve_type(implementation).unwrap_err().is_cycle());
    }

    fn nesting(session: LifeCycle, reference: fn(Instance) -> Parameter) -> Result<Resolver> {
        let (outer, inner) = (ty("Outer"), ty("Inner"));
        Resolver::builder()
            .scope(session.clone(), Arc::new(InjectionScope))
            .bind(
                bind(
                    "",
                    &outer,
                    Generator::new("Outer::new", [reference(Instance::of(inner.clone()))], |_| {
                        Ok(Arc::new("outer") as AnyInstance)
                    }),
                )
                .scoped(LifeCycle::application()),
            )
            .bind(bind("", &inner, text("inner")).scoped(session))
            .build()
    }

    #[test]
    fn test_unstable_nesting() {
        let resolver = nesting(LifeCycle::new("session"), Parameter::relative).unwrap();
        let err = resolver.resolve_type(ty("Outer")).unwrap_err();
        assert!(err.is_unstable(), "{err}");

        let declared = LifeCycle::new("session").consistent_with(["application"]);
        let resolver = nesting(declared, Parameter::relative).unwrap();
        assert!(resolver.resolve_type(ty("Outer")).is_ok());

        // a lazy accessor is the explicit indirection
        let resolver = nesting(LifeCycle::new("session"), Parameter::lazy).unwrap();
        assert!(resolver.resolve_type(ty("Outer")).is_ok());
    }

    #[test]
    fn test_lazy_provider_resolves_on_demand() {
        let (outer, inner) = (ty("Outer"), ty("Inner"));
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let resolver = Resolver::builder()
            .bind(bind(
                "",
                &outer,
                Generator::new("Outer::new", [Parameter::lazy(Instance::of(inner.clone()))], |args| {
                    Ok(Arc::new(args.provider(0)?) as AnyInstance)
                }),
            ))
            .bind(bind(
                "",
                &inner,
                Generator::new("Inner::new", [], move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new("inner") as AnyInstance)
                }),
            ))
            .build()
            .unwrap();

        let provider = resolver.resolve_type(outer).unwrap().downcast::<Provider>().unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(*provider.get::<&'static str>().unwrap(), "inner");
        assert_eq!(created.load(Ordering::SeqCst), 1);

        drop(resolver);
        assert!(matches!(provider.get_any(), Err(DiError::Configuration { .. })));
    }

    #[test]
    fn test_array_request_collects_in_precedence_order() {
        let number = RawType::capability("Number");
        let integer: TypeDescriptor = RawType::concrete("Integer").extending([&number]).into();
        let long: TypeDescriptor = RawType::concrete("Long").extending([&number]).into();
        let number: TypeDescriptor = number.into();

        let resolver = Resolver::builder()
            .bind(bind("n", &number, text("number")))
            .bind(bind("", &integer, text("integer")).declared(DeclarationType::Auto))
            .bind(bind("l", &long, text("long")))
            .build()
            .unwrap();

        let all: Vec<&str> = resolver
            .resolve_all(number.clone())
            .unwrap()
            .into_iter()
            .map(read)
            .collect();
        assert_eq!(all, ["long", "number", "integer"]);

        // a qualified array request only collects that qualifier
        let named = resolver
            .resolve(&Request::named("l", number.array()))
            .unwrap()
            .downcast::<Vec<AnyInstance>>()
            .unwrap();
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn test_direct_array_binding_wins_over_collection() {
        let t = ty("T");
        let resolver = Resolver::builder()
            .bind(bind("", &t, text("element")))
            .bind(bind("", &t.array(), Generator::value("T[]", Vec::<AnyInstance>::new())))
            .build()
            .unwrap();
        assert!(resolver.resolve_all(t).unwrap().is_empty());
    }

    #[test]
    fn test_nested_array_collects_only_its_element_bindings() {
        let t = ty("T");
        let resolver = Resolver::builder()
            .bind(bind("", &t, text("scalar")))
            .bind(bind("", &t.array(), Generator::value("T[]", Vec::<AnyInstance>::new())))
            .build()
            .unwrap();
        let nested = resolver
            .resolve(&Request::of(t.array().array()))
            .unwrap()
            .downcast::<Vec<AnyInstance>>()
            .unwrap();
        assert_eq!(nested.len(), 1);
        assert!(nested[0].downcast_ref::<Vec<AnyInstance>>().is_some());

        let scalars_only = Resolver::builder().bind(bind("", &t, text("scalar"))).build().unwrap();
        let empty = scalars_only
            .resolve(&Request::of(t.array().array()))
            .unwrap()
            .downcast::<Vec<AnyInstance>>()
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_best_effort_arrays_skip_failures() {
        let t = ty("T");
        let failing = Generator::new("broken", [], |_| Err("boom".into()));
        let resolver = Resolver::builder()
            .bind(bind("a", &t, text("a")))
            .bind(bind("b", &t, failing))
            .build()
            .unwrap();

        let strict = resolver.resolve(&Request::of(t.array())).unwrap_err();
        assert!(matches!(strict, DiError::GeneratorFailed { .. }), "{strict}");

        let lenient = resolver
            .resolve(&Request::of(t.array()).best_effort())
            .unwrap()
            .downcast::<Vec<AnyInstance>>()
            .unwrap();
        assert_eq!(lenient.len(), 1);
    }

    #[test]
    fn test_binding_clashes() {
        let t = ty("T");
        let err = Resolver::builder()
            .bind(bind("", &t, text("a")).in_module("first"))
            .bind(bind("", &t, text("b")).in_module("second"))
            .build()
            .unwrap_err();
        match err {
            DiError::Ambiguous {
                first,
                first_source,
                second_source,
                ..
            } => {
                assert_eq!(first, "T");
                assert!(first_source.contains("first"));
                assert!(second_source.contains("second"));
            }
            other => panic!("unexpected {other}"),
        }

        let resolver = Resolver::builder()
            .bind(bind("", &t, text("fallback")).declared(DeclarationType::Auto))
            .bind(bind("", &t, text("explicit")))
            .build()
            .unwrap();
        assert_eq!(resolver.len(), 1);
        assert_eq!(read(resolver.resolve_type(t).unwrap()), "explicit");
    }

    #[test]
    fn test_application_scope_and_observer() {
        let t = ty("T");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let resolver = Resolver::builder()
            .bind(
                bind("", &t, Generator::new("T::new", [], |_| Ok(Arc::new(1u8) as AnyInstance)))
                    .scoped(LifeCycle::application()),
            )
            .bind(bind("x", &t, text("transient")))
            .observe(move |resource, _| log.lock().unwrap().push(resource.serial()))
            .build()
            .unwrap();

        let a = resolver.resolve_type(t.clone()).unwrap();
        let b = resolver.resolve_type(t.clone()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        resolver.resolve_named("x", t.clone()).unwrap();
        resolver.resolve_named("x", t).unwrap();
        assert_eq!(*seen.lock().unwrap(), [0]);
    }

    #[test]
    fn test_concurrent_first_access_creates_once() {
        let t = ty("T");
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let resolver = Resolver::builder()
            .bind(
                bind(
                    "",
                    &t,
                    Generator::new("T::new", [], move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(()) as AnyInstance)
                    }),
                )
                .scoped(LifeCycle::application()),
            )
            .build()
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                let t = t.clone();
                thread::spawn(move || resolver.resolve_type(t).unwrap())
            })
            .collect();
        let first = resolver.resolve_type(t).unwrap();
        for handle in handles {
            assert!(Arc::ptr_eq(&handle.join().unwrap(), &first));
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_eager_instances_created_at_build() {
        let t = ty("T");
        let created = Arc::new(AtomicUsize::new(0));
        let binding = |counter: Arc<AtomicUsize>| {
            bind(
                "",
                &t,
                Generator::new("T::new", [], move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(()) as AnyInstance)
                }),
            )
            .scoped(LifeCycle::eager_application())
        };

        let resolver = Resolver::builder()
            .bind(binding(Arc::clone(&created)))
            .build()
            .unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
        resolver.resolve_type(t.clone()).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);

        Resolver::builder()
            .bind(binding(Arc::clone(&created)))
            .eager(false)
            .build()
            .unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bootstrap_checks() {
        let t = ty("T");

        let unknown = Resolver::builder()
            .bind(bind("", &t, text("a")).scoped(LifeCycle::new("session")))
            .build()
            .unwrap_err();
        assert!(matches!(unknown, DiError::Configuration { .. }));

        let unmet = Resolver::builder()
            .bind(Binding::required(Instance::of(t.clone())))
            .build()
            .unwrap_err();
        assert!(unmet.to_string().contains("required T"), "{unmet}");

        let met = Resolver::builder()
            .bind(Binding::required(Instance::of(t.clone())))
            .bind(bind("", &t, text("a")))
            .build()
            .unwrap();
        assert_eq!(met.len(), 1);

        let rejected = Resolver::builder()
            .bind(bind("", &t, text("a")).verified_by(|_, _| Err("not today".into())))
            .build()
            .unwrap_err();
        assert!(rejected.to_string().contains("not today"));

        let verified = Resolver::builder()
            .bind(bind("", &t, text("a")).verified_by(|resource, resolver| {
                resolver
                    .resolve(&Request::new(resource.instance().clone()))
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }))
            .build();
        assert!(verified.is_ok());
    }

    #[test]
    fn test_indirect_only_binding() {
        let service = RawType::capability("Service");
        let implementation: TypeDescriptor = RawType::concrete("ServiceImpl").extending([&service]).into();
        let resolver = Resolver::builder()
            .bind(bind("", &implementation, text("impl")).target(Target::any().indirect()))
            .build()
            .unwrap();
        assert_eq!(read(resolver.resolve_type(service.into()).unwrap()), "impl");
        let err = resolver.resolve_type(implementation).unwrap_err();
        assert!(matches!(err, DiError::IllegalAccess { .. }), "{err}");
    }

    #[test]
    fn test_parent_chain_and_absolute_parameters() {
        let (client, config) = (ty("Client"), ty("Config"));
        let client_instance = Instance::of(client.clone());
        let resolver = Resolver::builder()
            .bind(bind("", &config, text("global")))
            .bind(bind("", &config, text("client")).target(Target::any().within([client_instance.clone()])))
            .bind(bind(
                "",
                &client,
                Generator::new(
                    "Client::new",
                    [
                        Parameter::relative(Instance::of(config.clone())),
                        Parameter::absolute(Instance::of(config.clone())),
                        Parameter::constant(Instance::of(ty("Retries")), 3u32),
                    ],
                    |args| {
                        let relative = *args.get::<&'static str>(0)?;
                        let absolute = *args.get::<&'static str>(1)?;
                        let retries = *args.get::<u32>(2)?;
                        Ok(Arc::new((relative, absolute, retries)) as AnyInstance)
                    },
                ),
            ))
            .build()
            .unwrap();

        let made = resolver
            .resolve_type(client)
            .unwrap()
            .downcast::<(&'static str, &'static str, u32)>()
            .unwrap();
        assert_eq!(*made, ("client", "global", 3));
        assert_eq!(read(resolver.resolve_type(config).unwrap()), "global");
    }

    #[test]
    fn test_module_visibility() {
        let (consumer, secret) = (ty("Consumer"), ty("Secret"));
        let consumer_of = |module: &'static str| {
            bind(
                "",
                &consumer,
                Generator::new("Consumer::new", [Parameter::relative(Instance::of(secret.clone()))], |args| {
                    args.get_any(0)
                        .map_err(Into::into)
                }),
            )
            .in_module(module)
        };
        let secret_binding =
            bind("", &secret, text("secret")).target(Target::any().visible(Visibility::module("vault")));

        let inside = Resolver::builder()
            .bind(consumer_of("vault"))
            .bind(secret_binding.clone())
            .build()
            .unwrap();
        assert_eq!(read(inside.resolve_type(consumer.clone()).unwrap()), "secret");
        assert!(inside.resolve_type(secret.clone()).is_err());

        let outside = Resolver::builder()
            .bind(consumer_of("app"))
            .bind(secret_binding)
            .build()
            .unwrap();
        assert!(matches!(
            outside.resolve_type(consumer).unwrap_err(),
            DiError::NoMatch { .. }
        ));
    }

    #[test]
    fn test_generator_failure_is_wrapped() {
        let t = ty("T");
        let resolver = Resolver::builder()
            .bind(bind("", &t, Generator::new("T::open", [], |_| Err("locked".into()))))
            .build()
            .unwrap();
        match resolver.resolve_type(t).unwrap_err() {
            DiError::GeneratorFailed { generator, source } => {
                assert_eq!(generator, "T::open");
                assert_eq!(source.to_string(), "locked");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_typed_api() {
        #[derive(Debug, PartialEq)]
        struct Port(u16);

        let resolver = Resolver::builder()
            .bind(Binding::new(Instance::of_type::<Port>(), Generator::value("Port", Port(80))))
            .bind(Binding::new(
                Instance::new("admin", TypeDescriptor::of::<Port>()),
                Generator::value("admin Port", Port(8080)),
            ))
            .build()
            .unwrap();

        assert_eq!(*resolver.get::<Port>().unwrap(), Port(80));
        assert_eq!(*resolver.get_named::<Port>("admin").unwrap(), Port(8080));
        let all: Vec<u16> = resolver.get_all::<Port>().unwrap().iter().map(|p| p.0).collect();
        assert_eq!(all, [80, 8080]);
        assert!(resolver.try_get::<String>().is_none());
        assert_eq!(resolver.matching(&Request::of_type::<Port>()).len(), 1);
        assert_eq!(resolver.resources().count(), 2);
    }

    #[test]
    fn test_worker_scope_through_resolver() {
        let t = ty("T");
        let resolver = Resolver::builder()
            .bind(
                bind("", &t, Generator::new("T::new", [], |_| Ok(Arc::new(()) as AnyInstance)))
                    .scoped(LifeCycle::worker()),
            )
            .build()
            .unwrap();

        assert!(matches!(
            resolver.resolve_type(t.clone()).unwrap_err(),
            DiError::ScopeNotActive { .. }
        ));
        let worker = resolver.worker().unwrap();
        worker.attach();
        let a = resolver.resolve_type(t.clone()).unwrap();
        let b = resolver.resolve_type(t.clone()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        worker.detach();
    }

    #[test]
    fn test_replaced_worker_scope_is_not_handed_out() {
        let t = ty("T");
        let resolver = Resolver::builder()
            .scope(LifeCycle::worker(), Arc::new(InjectionScope))
            .bind(bind("", &t, text("w")).scoped(LifeCycle::worker()))
            .build()
            .unwrap();
        assert!(resolver.worker().is_none());
        // no attachment needed: the replacement scope serves the lifecycle
        assert_eq!(read(resolver.resolve_type(t).unwrap()), "w");
    }

    #[test]
    fn test_verifiers_run_before_eager_creation() {
        let t = ty("T");
        let created = Arc::new(AtomicUsize::new(0));
        let seen_by_verifier = Arc::new(AtomicUsize::new(usize::MAX));
        let eager = |counter: Arc<AtomicUsize>| {
            bind(
                "",
                &t,
                Generator::new("T::new", [], move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(()) as AnyInstance)
                }),
            )
            .scoped(LifeCycle::eager_application())
        };

        let (counter, seen) = (Arc::clone(&created), Arc::clone(&seen_by_verifier));
        Resolver::builder()
            .bind(eager(Arc::clone(&created)).verified_by(move |_, _| {
                seen.store(counter.load(Ordering::SeqCst), Ordering::SeqCst);
                Ok(())
            }))
            .build()
            .unwrap();
        assert_eq!(seen_by_verifier.load(Ordering::SeqCst), 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);

        created.store(0, Ordering::SeqCst);
        let rejected = Resolver::builder()
            .bind(eager(Arc::clone(&created)).verified_by(|_, _| Err("no".into())))
            .build();
        assert!(matches!(rejected, Err(DiError::Configuration { .. })));
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_first_access_to_a_cycle_fails_on_both_threads() {
        let (x, y, p, q) = (ty("X"), ty("Y"), ty("P"), ty("Q"));
        // P and Q hold each thread inside its first creation until both started
        let barrier = Arc::new(Barrier::new(2));
        let gate = |name: &'static str| {
            let barrier = Arc::clone(&barrier);
            Generator::new(name, [], move |_| {
                barrier.wait();
                Ok(Arc::new(name) as AnyInstance)
            })
        };
        let node = |name: &'static str, gate: &TypeDescriptor, other: &TypeDescriptor| {
            Generator::new(
                name,
                [
                    Parameter::relative(Instance::of(gate.clone())),
                    Parameter::relative(Instance::of(other.clone())),
                ],
                move |_| Ok(Arc::new(name) as AnyInstance),
            )
        };
        let resolver = Resolver::builder()
            .bind(bind("", &x, node("X::new", &p, &y)).scoped(LifeCycle::application()))
            .bind(bind("", &y, node("Y::new", &q, &x)).scoped(LifeCycle::application()))
            .bind(bind("", &p, gate("P::new")).scoped(LifeCycle::application()))
            .bind(bind("", &q, gate("Q::new")).scoped(LifeCycle::application()))
            .build()
            .unwrap();

        let (tx, rx) = mpsc::channel();
        for wanted in [x, y] {
            let (resolver, tx) = (resolver.clone(), tx.clone());
            thread::spawn(move || {
                let outcome = resolver.resolve_type(wanted).map(|_| ());
                tx.send(outcome).unwrap();
            });
        }

        for _ in 0..2 {
            let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();
            assert!(outcome.unwrap_err().is_cycle());
        }
    }
}
