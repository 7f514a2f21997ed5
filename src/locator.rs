//! Binding identity: what is provided and where it applies
//!
//! An [`Instance`] says *what* is wanted (qualifier + type), a [`Target`]
//! says *where* a binding may be used, and a [`Locator`] pairs the two into
//! the full identity of one binding.

use crate::name::Name;
use crate::request::Request;
use crate::types::TypeDescriptor;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A qualified type: the "what" of a request or binding.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instance {
    name: Name,
    ty: TypeDescriptor,
}

impl Instance {
    pub fn new(name: impl Into<Name>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// The default-qualified instance of `ty`.
    pub fn of(ty: TypeDescriptor) -> Self {
        Self::new(Name::DEFAULT, ty)
    }

    /// The default-qualified instance of the Rust type `T`.
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        Self::of(TypeDescriptor::of::<T>())
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Same type under a different name.
    pub fn named(&self, name: impl Into<Name>) -> Self {
        Self::new(name, self.ty.clone())
    }

    /// Same name for a different type.
    pub fn typed(&self, ty: TypeDescriptor) -> Self {
        Self::new(self.name.clone(), ty)
    }

    /// Whether a binding offering `self` can satisfy a request for `required`.
    pub fn is_assignable_to(&self, required: &Instance) -> bool {
        required.name.is_compatible_with(&self.name) && self.ty.is_assignable_to(&required.ty)
    }

    /// Total specificity order: type first, then name.
    pub fn specificity_cmp(&self, other: &Instance) -> Ordering {
        self.ty
            .specificity_cmp(&other.ty)
            .then_with(|| self.name.specificity_cmp(&other.name))
    }

    #[inline]
    pub fn more_qualified_than(&self, other: &Instance) -> bool {
        self.specificity_cmp(other) == Ordering::Less
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_default() {
            write!(f, "{}", self.ty)
        } else {
            write!(f, "{} {}", self.name, self.ty)
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({self})")
    }
}

/// Which requests may see a binding, by the module the request comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible to every request
    Everywhere,
    /// Visible only to requests made while producing an instance for a
    /// resource declared in the named module
    Module(Arc<str>),
}

impl Visibility {
    pub fn module(name: impl Into<Arc<str>>) -> Self {
        Self::Module(name.into())
    }

    fn is_visible(&self, request: &Request) -> bool {
        match self {
            Self::Everywhere => true,
            Self::Module(module) => request
                .innermost()
                .is_some_and(|frame| frame.module() == module.as_ref()),
        }
    }

    fn breadth(&self) -> u8 {
        match self {
            Self::Module(_) => 0,
            Self::Everywhere => 1,
        }
    }
}

/// Where a binding applies.
///
/// `parents` lists the instances that must enclose the request, outermost
/// first; the last entry has to match the innermost frame of the request.
/// An empty chain applies anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    parents: Arc<[Instance]>,
    receiver: Option<Instance>,
    visibility: Visibility,
    indirect_only: bool,
}

impl Target {
    /// Applies everywhere, to any receiver.
    pub fn any() -> Self {
        Self {
            parents: Arc::from(Vec::new()),
            receiver: None,
            visibility: Visibility::Everywhere,
            indirect_only: false,
        }
    }

    /// Require the given enclosing chain, outermost first.
    pub fn within(mut self, parents: impl IntoIterator<Item = Instance>) -> Self {
        self.parents = parents.into_iter().collect();
        self
    }

    /// Only apply when injected directly into the binding of `receiver`.
    pub fn into_receiver(mut self, receiver: Instance) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn visible(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Only usable when requested through an abstract capability.
    pub fn indirect(mut self) -> Self {
        self.indirect_only = true;
        self
    }

    #[inline]
    pub fn parents(&self) -> &[Instance] {
        &self.parents
    }

    #[inline]
    pub fn receiver(&self) -> Option<&Instance> {
        self.receiver.as_ref()
    }

    #[inline]
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    #[inline]
    pub fn is_indirect_only(&self) -> bool {
        self.indirect_only
    }

    pub fn is_any(&self) -> bool {
        self.parents.is_empty() && self.receiver.is_none() && self.visibility == Visibility::Everywhere
    }

    /// Whether `request` is made from a place this target admits.
    pub fn is_applicable(&self, request: &Request) -> bool {
        if !self.visibility.is_visible(request) {
            return false;
        }
        if let Some(receiver) = &self.receiver {
            let matches = request
                .innermost()
                .is_some_and(|frame| frame.locator().instance() == receiver);
            if !matches {
                return false;
            }
        }
        if self.parents.is_empty() {
            return true;
        }
        if request.depth() < self.parents.len() {
            return false;
        }
        // innermost frame against the last required parent, moving outward
        self.parents
            .iter()
            .rev()
            .zip(request.frames())
            .all(|(parent, frame)| {
                frame.locator().instance().ty().is_assignable_to(parent.ty())
                    && frame.instance().name().is_compatible_with(parent.name())
            })
    }

    /// Total specificity order: deeper parent chains first, then narrower
    /// visibility, then a fixed receiver, then the involved instances.
    pub fn specificity_cmp(&self, other: &Target) -> Ordering {
        other
            .parents
            .len()
            .cmp(&self.parents.len())
            .then_with(|| self.visibility.breadth().cmp(&other.visibility.breadth()))
            .then_with(|| other.receiver.is_some().cmp(&self.receiver.is_some()))
            .then_with(|| {
                for (a, b) in self.parents.iter().zip(other.parents.iter()) {
                    let ord = a.specificity_cmp(b);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            })
            .then_with(|| match (&self.receiver, &other.receiver) {
                (Some(a), Some(b)) => a.specificity_cmp(b),
                _ => Ordering::Equal,
            })
            .then_with(|| match (&self.visibility, &other.visibility) {
                (Visibility::Module(a), Visibility::Module(b)) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }

    #[inline]
    pub fn more_qualified_than(&self, other: &Target) -> bool {
        self.specificity_cmp(other) == Ordering::Less
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() && !self.indirect_only {
            return f.write_str("anywhere");
        }
        let mut sep = "";
        if !self.parents.is_empty() {
            f.write_str("within ")?;
            for (i, parent) in self.parents.iter().enumerate() {
                if i > 0 {
                    f.write_str(" > ")?;
                }
                write!(f, "{parent}")?;
            }
            sep = " ";
        }
        if let Some(receiver) = &self.receiver {
            write!(f, "{sep}into {receiver}")?;
            sep = " ";
        }
        if let Visibility::Module(module) = &self.visibility {
            write!(f, "{sep}from module {module}")?;
            sep = " ";
        }
        if self.indirect_only {
            write!(f, "{sep}(indirect only)")?;
        }
        Ok(())
    }
}

/// Full identity of a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    instance: Instance,
    target: Target,
}

impl Locator {
    pub fn new(instance: Instance, target: Target) -> Self {
        Self { instance, target }
    }

    /// A locator for `instance` that applies anywhere.
    pub fn anywhere(instance: Instance) -> Self {
        Self::new(instance, Target::any())
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Qualifier compatibility, then target applicability, then full type
    /// assignability (the most expensive check last).
    pub fn is_matching(&self, request: &Request) -> bool {
        let wanted = request.instance();
        wanted.name().is_compatible_with(self.instance.name())
            && self.target.is_applicable(request)
            && self.instance.ty().is_assignable_to(wanted.ty())
    }

    /// Total specificity order: instance first, then target.
    pub fn specificity_cmp(&self, other: &Locator) -> Ordering {
        self.instance
            .specificity_cmp(&other.instance)
            .then_with(|| self.target.specificity_cmp(&other.target))
    }

    #[inline]
    pub fn more_qualified_than(&self, other: &Locator) -> bool {
        self.specificity_cmp(other) == Ordering::Less
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.target.is_any() && !self.target.indirect_only {
            write!(f, "{}", self.instance)
        } else {
            write!(f, "{} {}", self.instance, self.target)
        }
    }
}
