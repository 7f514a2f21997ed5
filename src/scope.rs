//! Scope SPI and built-in scopes
//!
//! A [`Scope`] decides whether a request gets a fresh instance or one it
//! produced before. Each implementation owns its cache and its
//! synchronization; the resolver only ever calls [`Scope::provide`].
//!
//! Every caching scope stores instances in [`Slot`]s. A slot runs its
//! create function at most once, even under concurrent first access. All
//! slots under construction share one wait-for table, so a re-entry or a
//! ring of threads each waiting on another's slot is reported as a cycle
//! instead of deadlocking.

use crate::error::{DiError, Result};
use crate::factory::AnyInstance;
use crate::locator::Instance;
use crate::request::Request;
use crate::types::RawType;
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Instance cache for one named lifecycle.
pub trait Scope: Send + Sync {
    /// Return the instance for `request` of the resource at `serial`,
    /// calling `create` only when this scope has none to reuse.
    ///
    /// `total` is the number of resources in the registry.
    fn provide(
        &self,
        serial: usize,
        total: usize,
        request: &Request,
        create: &dyn Fn() -> Result<AnyInstance>,
    ) -> Result<AnyInstance>;
}

/// Slots under construction and the threads blocked on them.
#[derive(Default)]
struct Creations {
    /// slot id -> thread running its create function
    owners: HashMap<usize, ThreadId, RandomState>,
    /// thread -> slot id it is blocked on
    waiting: HashMap<ThreadId, usize, RandomState>,
}

impl Creations {
    /// Whether `from` is, through a chain of blocked creators, waiting on `to`.
    fn waits_for(&self, from: ThreadId, to: ThreadId) -> bool {
        let mut current = from;
        for _ in 0..=self.waiting.len() {
            if current == to {
                return true;
            }
            let Some(owner) = self
                .waiting
                .get(&current)
                .and_then(|slot| self.owners.get(slot))
            else {
                return false;
            };
            current = *owner;
        }
        false
    }
}

static CREATIONS: Lazy<Mutex<Creations>> = Lazy::new(Mutex::default);
static FINISHED: Condvar = Condvar::new();
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

/// A create-once cell.
pub struct Slot {
    id: usize,
    value: OnceCell<AnyInstance>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            id: NEXT_SLOT.fetch_add(1, Ordering::Relaxed),
            value: OnceCell::new(),
        }
    }
}

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> Option<AnyInstance> {
        self.value.get().map(Arc::clone)
    }

    /// The stored instance, creating it first if needed.
    ///
    /// Concurrent callers wait for the creating thread. Re-entry from the
    /// creating thread, or waiting that would close a loop of creators each
    /// blocked on the next, fails with a cycle instead of blocking. A failed
    /// create leaves the slot empty.
    pub fn get_or_create(&self, create: &dyn Fn() -> Result<AnyInstance>) -> Result<AnyInstance> {
        if let Some(value) = self.value.get() {
            return Ok(Arc::clone(value));
        }
        let me = thread::current().id();
        {
            let mut creations = CREATIONS.lock();
            loop {
                if let Some(value) = self.value.get() {
                    return Ok(Arc::clone(value));
                }
                match creations.owners.get(&self.id).copied() {
                    None => {
                        creations.owners.insert(self.id, me);
                        break;
                    }
                    Some(owner) if owner == me => {
                        return Err(DiError::cycle(
                            "instance requested again while it is being created",
                        ));
                    }
                    Some(owner) => {
                        if creations.waits_for(owner, me) {
                            #[cfg(feature = "logging")]
                            debug!(
                                target: "graph_injector",
                                thread = ?me,
                                owner = ?owner,
                                "Concurrent creations wait on each other"
                            );
                            return Err(DiError::cycle(
                                "instances under concurrent creation wait on each other",
                            ));
                        }
                        creations.waiting.insert(me, self.id);
                        FINISHED.wait(&mut creations);
                        creations.waiting.remove(&me);
                    }
                }
            }
        }

        let _owned = Owned(self.id);
        let created = create();
        if let Ok(value) = &created {
            let _ = self.value.set(Arc::clone(value));
        }
        created
    }
}

/// Releases a slot's ownership and wakes waiters, also on unwind.
struct Owned(usize);

impl Drop for Owned {
    fn drop(&mut self) {
        CREATIONS.lock().owners.remove(&self.0);
        FINISHED.notify_all();
    }
}

/// One instance per resource for the life of the resolver.
#[derive(Default)]
pub struct ApplicationScope {
    slots: OnceCell<Box<[Slot]>>,
}

impl ApplicationScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scope for ApplicationScope {
    fn provide(
        &self,
        serial: usize,
        total: usize,
        _request: &Request,
        create: &dyn Fn() -> Result<AnyInstance>,
    ) -> Result<AnyInstance> {
        let slots = self
            .slots
            .get_or_init(|| (0..total).map(|_| Slot::new()).collect());
        let slot = slots.get(serial).ok_or_else(|| {
            DiError::configuration(format!("resource serial {serial} out of range ({total})"))
        })?;
        slot.get_or_create(create)
    }
}

/// A new instance for every injection.
#[derive(Debug, Default, Clone, Copy)]
pub struct InjectionScope;

impl Scope for InjectionScope {
    #[inline]
    fn provide(
        &self,
        _serial: usize,
        _total: usize,
        _request: &Request,
        create: &dyn Fn() -> Result<AnyInstance>,
    ) -> Result<AnyInstance> {
        create()
    }
}

/// One instance per resource and key, where the key is derived from the
/// request.
pub struct KeyedScope<K> {
    name: &'static str,
    key: fn(&Request) -> K,
    slots: DashMap<(usize, K), Arc<Slot>, RandomState>,
}

impl<K: Eq + Hash> KeyedScope<K> {
    pub fn new(name: &'static str, key: fn(&Request) -> K) -> Self {
        Self {
            name,
            key,
            slots: DashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyedScope<Request> {
    /// Keyed by the full request, stack included.
    pub fn dependency() -> Self {
        Self::new("dependency", Request::clone)
    }
}

impl KeyedScope<Option<Instance>> {
    /// Keyed by the receiving binding's instance.
    pub fn target() -> Self {
        Self::new("target", |request| {
            request.innermost().map(|f| f.locator().instance().clone())
        })
    }
}

impl KeyedScope<RawType> {
    /// Keyed by the requested raw type.
    pub fn per_type() -> Self {
        Self::new("type", |request| request.instance().ty().raw().clone())
    }
}

impl KeyedScope<Instance> {
    /// Keyed by the requested instance.
    pub fn per_instance() -> Self {
        Self::new("instance", |request| request.instance().clone())
    }
}

impl KeyedScope<ThreadId> {
    /// Keyed by the calling thread.
    pub fn thread() -> Self {
        Self::new("thread", |_| thread::current().id())
    }
}

impl<K> Scope for KeyedScope<K>
where
    K: Eq + Hash + Send + Sync,
{
    fn provide(
        &self,
        serial: usize,
        _total: usize,
        request: &Request,
        create: &dyn Fn() -> Result<AnyInstance>,
    ) -> Result<AnyInstance> {
        let key = (serial, (self.key)(request));
        // clone the slot out so no shard lock is held while creating
        let slot = Arc::clone(self.slots.entry(key).or_default().value());

        #[cfg(feature = "logging")]
        trace!(
            target: "graph_injector",
            scope = self.name,
            serial,
            cached = slot.get().is_some(),
            "Keyed scope lookup"
        );

        slot.get_or_create(create)
    }
}

/// Instances of one worker context, shareable across threads.
#[derive(Clone, Default)]
pub struct WorkerContext(Arc<DashMap<usize, Arc<Slot>, RandomState>>);

impl WorkerContext {
    fn slot(&self, serial: usize) -> Arc<Slot> {
        Arc::clone(self.0.entry(serial).or_default().value())
    }

    /// Whether two handles refer to the same context.
    pub fn same_as(&self, other: &WorkerContext) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// One instance per resource per attached worker context.
///
/// A thread must [`attach`](Self::attach) before resolving worker-scoped
/// resources. A context can be handed to another thread with
/// [`attach_to`](Self::attach_to); both threads then share it until each
/// detaches on its own.
#[derive(Default)]
pub struct WorkerScope {
    contexts: DashMap<ThreadId, WorkerContext, RandomState>,
}

impl WorkerScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The calling thread's context, created if the thread has none.
    pub fn attach(&self) -> WorkerContext {
        let id = thread::current().id();
        let context = self.contexts.entry(id).or_default().value().clone();

        #[cfg(feature = "logging")]
        debug!(
            target: "graph_injector",
            thread = ?id,
            "Worker context attached"
        );

        context
    }

    /// Share `context` with the calling thread, replacing any context the
    /// thread had before.
    pub fn attach_to(&self, context: &WorkerContext) {
        let id = thread::current().id();
        self.contexts.insert(id, context.clone());

        #[cfg(feature = "logging")]
        debug!(
            target: "graph_injector",
            thread = ?id,
            "Worker context transferred"
        );
    }

    /// Remove the calling thread's association. Other threads sharing the
    /// same context keep it.
    pub fn detach(&self) -> Option<WorkerContext> {
        let id = thread::current().id();
        let removed = self.contexts.remove(&id).map(|(_, context)| context);

        #[cfg(feature = "logging")]
        debug!(
            target: "graph_injector",
            thread = ?id,
            attached = removed.is_some(),
            "Worker context detached"
        );

        removed
    }

    pub fn is_attached(&self) -> bool {
        self.contexts.contains_key(&thread::current().id())
    }

    /// The calling thread's context, if attached.
    pub fn current(&self) -> Option<WorkerContext> {
        self.contexts
            .get(&thread::current().id())
            .map(|c| c.value().clone())
    }
}

impl Scope for WorkerScope {
    fn provide(
        &self,
        serial: usize,
        _total: usize,
        _request: &Request,
        create: &dyn Fn() -> Result<AnyInstance>,
    ) -> Result<AnyInstance> {
        let context = self.current().ok_or_else(|| DiError::ScopeNotActive {
            scope: "worker".to_string(),
        })?;
        context.slot(serial).get_or_create(create)
    }
}
