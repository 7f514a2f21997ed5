//! Requests and the injection path that led to them
//!
//! A [`Request`] is the wanted [`Instance`] plus an immutable stack of
//! [`Frame`]s, one per enclosing injection. Pushing a frame returns a new
//! request that shares the old stack; the old request is never touched.
//!
//! Pushing is where the structural safety checks live: a frame that is
//! already on the stack is a cycle, and a frame whose lifecycle is not
//! declared consistent with an enclosing frame's lifecycle is unstable.

use crate::error::{DiError, Result};
use crate::lifecycle::LifeCycle;
use crate::locator::{Instance, Locator};
use crate::name::Name;
use crate::types::TypeDescriptor;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// One enclosing injection: which instance was requested, which binding was
/// chosen to provide it, and that binding's lifecycle and module.
#[derive(Clone)]
pub struct Frame {
    instance: Instance,
    locator: Locator,
    lifecycle: LifeCycle,
    module: Arc<str>,
}

impl Frame {
    pub fn new(
        instance: Instance,
        locator: Locator,
        lifecycle: LifeCycle,
        module: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            instance,
            locator,
            lifecycle,
            module: module.into(),
        }
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    #[inline]
    pub fn lifecycle(&self) -> &LifeCycle {
        &self.lifecycle
    }

    /// Module that declared the receiving binding.
    #[inline]
    pub fn module(&self) -> &str {
        &self.module
    }
}

// Frames are identified by (instance, locator) only.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.instance == other.instance && self.locator == other.locator
    }
}

impl Eq for Frame {}

impl Hash for Frame {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance.hash(state);
        self.locator.hash(state);
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if &self.instance == self.locator.instance() {
            write!(f, "{}", self.locator)
        } else {
            write!(f, "{} => {}", self.instance, self.locator)
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({self} @ {})", self.lifecycle)
    }
}

struct Node {
    frame: Frame,
    parent: Option<Arc<Node>>,
    depth: usize,
}

/// A request for an instance, made from a specific place in the graph.
#[derive(Clone)]
pub struct Request {
    instance: Instance,
    stack: Option<Arc<Node>>,
    best_effort: bool,
}

impl Request {
    /// A root request with an empty stack.
    pub fn new(instance: Instance) -> Self {
        Self {
            instance,
            stack: None,
            best_effort: false,
        }
    }

    /// Root request for the default-qualified `ty`.
    pub fn of(ty: TypeDescriptor) -> Self {
        Self::new(Instance::of(ty))
    }

    /// Root request for `ty` under `name`.
    pub fn named(name: impl Into<Name>, ty: TypeDescriptor) -> Self {
        Self::new(Instance::new(name, ty))
    }

    /// Root request for the default-qualified Rust type `T`.
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        Self::new(Instance::of_type::<T>())
    }

    /// Array-shaped requests skip elements whose generator fails instead of
    /// failing as a whole.
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    #[inline]
    pub fn is_best_effort(&self) -> bool {
        self.best_effort
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The same stack asking for a different instance.
    pub fn with_instance(&self, instance: Instance) -> Self {
        Self {
            instance,
            stack: self.stack.clone(),
            best_effort: self.best_effort,
        }
    }

    /// Number of enclosing frames.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.as_ref().map_or(0, |n| n.depth)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.stack.is_none()
    }

    /// The frame of the binding this request is being made for.
    #[inline]
    pub fn innermost(&self) -> Option<&Frame> {
        self.stack.as_deref().map(|n| &n.frame)
    }

    /// Frames from the innermost outward.
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            node: self.stack.as_deref(),
        }
    }

    /// Extend the stack by `frame`.
    ///
    /// Fails with [`DiError::Cycle`] if an equal frame is already on the
    /// stack, and with [`DiError::Unstable`] if the frame's lifecycle is not
    /// consistent with some enclosing frame's lifecycle. On failure nothing
    /// is pushed.
    pub fn push(&self, frame: Frame) -> Result<Request> {
        if self.frames().any(|f| f == &frame) {
            #[cfg(feature = "logging")]
            debug!(
                target: "graph_injector",
                frame = %frame,
                depth = self.depth(),
                "Cycle detected while pushing frame"
            );
            return Err(DiError::cycle(self.render_path(&frame)));
        }

        if let Some(ancestor) = self
            .frames()
            .find(|f| !frame.lifecycle.is_consistent_within(&f.lifecycle))
        {
            return Err(DiError::Unstable {
                dependency: frame.locator.to_string(),
                lifecycle: frame.lifecycle.to_string(),
                ancestor: ancestor.locator.to_string(),
                ancestor_lifecycle: ancestor.lifecycle.to_string(),
            });
        }

        let depth = self.depth() + 1;
        Ok(Self {
            instance: self.instance.clone(),
            stack: Some(Arc::new(Node {
                frame,
                parent: self.stack.clone(),
                depth,
            })),
            best_effort: self.best_effort,
        })
    }

    /// Drop the innermost frame.
    pub fn pop(&self) -> Request {
        Self {
            instance: self.instance.clone(),
            stack: self.stack.as_ref().and_then(|n| n.parent.clone()),
            best_effort: self.best_effort,
        }
    }

    /// The same instance with an empty stack.
    pub fn simple(&self) -> Request {
        Self {
            instance: self.instance.clone(),
            stack: None,
            best_effort: self.best_effort,
        }
    }

    fn render_path(&self, closing: &Frame) -> String {
        let mut frames: Vec<&Frame> = self.frames().collect();
        frames.reverse();
        frames.push(closing);
        frames
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        if self.instance != other.instance || self.depth() != other.depth() {
            return false;
        }
        match (&self.stack, &other.stack) {
            (Some(a), Some(b)) if Arc::ptr_eq(a, b) => true,
            _ => self.frames().eq(other.frames()),
        }
    }
}

impl Eq for Request {}

impl Hash for Request {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance.hash(state);
        self.depth().hash(state);
        for frame in self.frames() {
            frame.hash(state);
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance)?;
        if let Some(frame) = self.innermost() {
            write!(f, " for {frame}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("instance", &self.instance)
            .field("frames", &self.frames().collect::<Vec<_>>())
            .field("best_effort", &self.best_effort)
            .finish()
    }
}

/// Iterator over a request's frames, innermost first.
pub struct Frames<'a> {
    node: Option<&'a Node>,
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.node?;
        self.node = node.parent.as_deref();
        Some(&node.frame)
    }
}
