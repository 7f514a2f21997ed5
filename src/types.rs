//! Structural type descriptors
//!
//! A [`TypeDescriptor`] describes a possibly generic, possibly array-shaped
//! type without relying on Rust's own type system: the resolver matches
//! bindings against requests structurally, so generic parameters, array
//! dimensions and upper bounds are all data.
//!
//! The host type hierarchy is modelled by [`RawType`] nodes that list their
//! direct supertypes. Nodes are immutable and built bottom-up by value, so
//! the hierarchy is always a finite DAG and every subtype check terminates.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

struct RawTypeData {
    name: Arc<str>,
    supertypes: Box<[RawType]>,
    /// 1 + max depth of supertypes; a strict subtype is always deeper
    depth: u32,
    is_abstract: bool,
}

/// Identity of a raw (unparameterized) type plus its place in the hierarchy.
///
/// Two raw types are the same iff their names are equal.
///
/// # Examples
///
/// ```rust
/// use graph_injector::RawType;
///
/// let service = RawType::capability("Service");
/// let basic = RawType::concrete("BasicService").extending([&service]);
///
/// assert!(basic.is_subtype_of(&service));
/// assert!(!service.is_subtype_of(&basic));
/// ```
#[derive(Clone)]
pub struct RawType(Arc<RawTypeData>);

impl RawType {
    fn build(name: Arc<str>, supertypes: Box<[RawType]>, is_abstract: bool) -> Self {
        let depth = supertypes.iter().map(|s| s.depth() + 1).max().unwrap_or(0);
        Self(Arc::new(RawTypeData {
            name,
            supertypes,
            depth,
            is_abstract,
        }))
    }

    /// A concrete raw type with no supertypes.
    pub fn concrete(name: impl Into<Arc<str>>) -> Self {
        Self::build(name.into(), Box::new([]), false)
    }

    /// An abstract capability (interface-like) raw type with no supertypes.
    pub fn capability(name: impl Into<Arc<str>>) -> Self {
        Self::build(name.into(), Box::new([]), true)
    }

    /// The concrete raw type of a Rust type, named by `std::any::type_name`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::concrete(std::any::type_name::<T>())
    }

    /// Return a copy of this raw type that additionally extends `supertypes`.
    pub fn extending<'a>(self, supertypes: impl IntoIterator<Item = &'a RawType>) -> Self {
        let mut all: Vec<RawType> = self.0.supertypes.to_vec();
        all.extend(supertypes.into_iter().cloned());
        Self::build(Arc::clone(&self.0.name), all.into_boxed_slice(), self.0.is_abstract)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn supertypes(&self) -> &[RawType] {
        &self.0.supertypes
    }

    /// Distance to the farthest root of the hierarchy (roots are 0).
    #[inline]
    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.0.is_abstract
    }

    /// Whether `self` is `other` or transitively extends it.
    pub fn is_subtype_of(&self, other: &RawType) -> bool {
        if self == other {
            return true;
        }
        // a deeper type can never be a supertype
        if self.depth() <= other.depth() {
            return false;
        }
        self.supertypes().iter().any(|s| s.is_subtype_of(other))
    }

    /// Whether the two raw types are related in either direction.
    #[inline]
    pub fn is_related_to(&self, other: &RawType) -> bool {
        self.is_subtype_of(other) || other.is_subtype_of(self)
    }
}

impl PartialEq for RawType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for RawType {}

impl Hash for RawType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl PartialOrd for RawType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RawType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl fmt::Display for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawType")
            .field("name", &self.name())
            .field("depth", &self.depth())
            .field("abstract", &self.is_abstract())
            .finish()
    }
}

/// Structural description of a (possibly generic) type.
///
/// Equality covers the raw type, the parameter list and the array
/// dimension; the upper-bound flag only influences assignability.
#[derive(Clone)]
pub struct TypeDescriptor {
    raw: RawType,
    parameters: Arc<[TypeDescriptor]>,
    dimensions: u8,
    upper_bound: bool,
}

impl TypeDescriptor {
    /// An unparameterized, non-array descriptor of `raw`.
    pub fn new(raw: RawType) -> Self {
        Self {
            raw,
            parameters: Arc::from(Vec::new()),
            dimensions: 0,
            upper_bound: false,
        }
    }

    /// Descriptor of the Rust type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(RawType::of::<T>())
    }

    /// The same raw type with the given actual parameters.
    pub fn parameterized(&self, parameters: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self {
            parameters: parameters.into_iter().collect(),
            ..self.clone()
        }
    }

    /// One more array dimension.
    pub fn array(&self) -> Self {
        Self {
            dimensions: self.dimensions.saturating_add(1),
            ..self.clone()
        }
    }

    /// The element type of an array descriptor.
    pub fn element(&self) -> Option<Self> {
        (self.dimensions > 0).then(|| Self {
            dimensions: self.dimensions - 1,
            ..self.clone()
        })
    }

    /// This descriptor used as an upper bound (`? extends T`).
    pub fn as_upper_bound(&self) -> Self {
        Self {
            upper_bound: true,
            ..self.clone()
        }
    }

    /// This descriptor as an exact type.
    pub fn as_exact(&self) -> Self {
        Self {
            upper_bound: false,
            ..self.clone()
        }
    }

    #[inline]
    pub fn raw(&self) -> &RawType {
        &self.raw
    }

    #[inline]
    pub fn parameters(&self) -> &[TypeDescriptor] {
        &self.parameters
    }

    #[inline]
    pub fn parameter(&self, index: usize) -> Option<&TypeDescriptor> {
        self.parameters.get(index)
    }

    #[inline]
    pub fn is_parameterized(&self) -> bool {
        !self.parameters.is_empty()
    }

    #[inline]
    pub fn dimensions(&self) -> u8 {
        self.dimensions
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.dimensions > 0
    }

    #[inline]
    pub fn is_upper_bound(&self) -> bool {
        self.upper_bound
    }

    /// Cheap pre-filter: same dimension and a raw type that is a subtype.
    #[inline]
    pub fn is_raw_assignable_to(&self, required: &TypeDescriptor) -> bool {
        self.dimensions == required.dimensions && self.raw.is_subtype_of(&required.raw)
    }

    /// Whether a value described by `self` may be used where `required` is
    /// declared.
    ///
    /// Identical raw types with identical parameters are assignable. A
    /// subtype without parameters is assignable. Otherwise every parameter
    /// position of `required` is checked: covariantly when either side's
    /// parameter is an upper bound, by structural equality when neither is.
    /// Arrays must have the same dimension; their element types follow the
    /// same rules. There is no coercion.
    pub fn is_assignable_to(&self, required: &TypeDescriptor) -> bool {
        if self.dimensions != required.dimensions {
            return false;
        }
        if self.raw == required.raw && self.parameters == required.parameters {
            return true;
        }
        if !self.raw.is_subtype_of(&required.raw) {
            return false;
        }
        if self.parameters.is_empty() {
            return true;
        }
        required.parameters.iter().enumerate().all(|(i, req)| {
            let Some(own) = self.parameters.get(i) else {
                return false;
            };
            if own.upper_bound || req.upper_bound {
                own.is_assignable_to(req)
            } else {
                own == req
            }
        })
    }

    /// Total specificity order: more specific types sort first.
    ///
    /// Deeper raw types (strict subtypes) come before their supertypes;
    /// unrelated raw types at equal depth are ordered by name. Within the
    /// same raw type, more dimensions and more parameters are more specific,
    /// exact parameters before upper bounds.
    pub fn specificity_cmp(&self, other: &TypeDescriptor) -> Ordering {
        other
            .raw
            .depth()
            .cmp(&self.raw.depth())
            .then_with(|| self.raw.cmp(&other.raw))
            .then_with(|| other.dimensions.cmp(&self.dimensions))
            .then_with(|| other.parameters.len().cmp(&self.parameters.len()))
            .then_with(|| {
                for (a, b) in self.parameters.iter().zip(other.parameters.iter()) {
                    let ord = a.specificity_cmp(b);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            })
            .then_with(|| self.upper_bound.cmp(&other.upper_bound))
    }

    /// Strict "more specific than" derived from [`specificity_cmp`](Self::specificity_cmp).
    #[inline]
    pub fn more_qualified_than(&self, other: &TypeDescriptor) -> bool {
        self.specificity_cmp(other) == Ordering::Less
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && self.raw == other.raw
            && self.parameters == other.parameters
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
        self.dimensions.hash(state);
        self.parameters.hash(state);
    }
}

impl PartialOrd for TypeDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deterministic structural order, consistent with `Eq`.
impl Ord for TypeDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw
            .cmp(&other.raw)
            .then_with(|| self.dimensions.cmp(&other.dimensions))
            .then_with(|| self.parameters.iter().cmp(other.parameters.iter()))
    }
}

impl From<RawType> for TypeDescriptor {
    fn from(raw: RawType) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.upper_bound {
            f.write_str("? extends ")?;
        }
        f.write_str(self.raw.name())?;
        if let Some((first, rest)) = self.parameters.split_first() {
            write!(f, "<{first}")?;
            for p in rest {
                write!(f, ", {p}")?;
            }
            f.write_str(">")?;
        }
        for _ in 0..self.dimensions {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hierarchy {
        number: TypeDescriptor,
        integer: TypeDescriptor,
        list: RawType,
        array_list: RawType,
        string: TypeDescriptor,
    }

    fn hierarchy() -> Hierarchy {
        let number = RawType::capability("Number");
        let integer = RawType::concrete("Integer").extending([&number]);
        let list = RawType::capability("List");
        let array_list = RawType::concrete("ArrayList").extending([&list]);
        Hierarchy {
            number: number.into(),
            integer: integer.into(),
            list,
            array_list,
            string: RawType::concrete("String").into(),
        }
    }

    #[test]
    fn test_reflexive() {
        let h = hierarchy();
        let list_of_int = TypeDescriptor::new(h.list.clone()).parameterized([h.integer.clone()]);
        for t in [&h.number, &h.integer, &h.string, &list_of_int, &list_of_int.array()] {
            assert!(t.is_assignable_to(t), "{t} must be assignable to itself");
        }
    }

    #[test]
    fn test_transitive_raw_chain() {
        let a = RawType::capability("A");
        let b = RawType::capability("B").extending([&a]);
        let c = RawType::concrete("C").extending([&b]);
        let (a, b, c) = (TypeDescriptor::new(a), TypeDescriptor::new(b), TypeDescriptor::new(c));

        assert!(c.is_assignable_to(&b));
        assert!(b.is_assignable_to(&a));
        assert!(c.is_assignable_to(&a));
        assert!(!a.is_assignable_to(&c));
    }

    #[test]
    fn test_unparameterized_subtype_is_assignable() {
        let h = hierarchy();
        let raw_array_list = TypeDescriptor::new(h.array_list.clone());
        let list_of_int = TypeDescriptor::new(h.list.clone()).parameterized([h.integer.clone()]);
        assert!(raw_array_list.is_assignable_to(&list_of_int));
    }

    #[test]
    fn test_parameters_are_invariant_without_bounds() {
        let h = hierarchy();
        let list_of_int = TypeDescriptor::new(h.list.clone()).parameterized([h.integer.clone()]);
        let list_of_num = TypeDescriptor::new(h.list.clone()).parameterized([h.number.clone()]);
        let array_list_of_int =
            TypeDescriptor::new(h.array_list.clone()).parameterized([h.integer.clone()]);

        assert!(!list_of_int.is_assignable_to(&list_of_num));
        assert!(!list_of_num.is_assignable_to(&list_of_int));
        assert!(array_list_of_int.is_assignable_to(&list_of_int));
        assert!(!array_list_of_int.is_assignable_to(&list_of_num));
    }

    #[test]
    fn test_upper_bound_parameters_are_covariant() {
        let h = hierarchy();
        let list_of_int = TypeDescriptor::new(h.list.clone()).parameterized([h.integer.clone()]);
        let list_of_some_num =
            TypeDescriptor::new(h.list.clone()).parameterized([h.number.as_upper_bound()]);
        let list_of_some_int =
            TypeDescriptor::new(h.list.clone()).parameterized([h.integer.as_upper_bound()]);

        assert!(list_of_int.is_assignable_to(&list_of_some_num));
        assert!(list_of_some_int.is_assignable_to(&list_of_some_num));
        assert!(!list_of_some_num.is_assignable_to(&list_of_int));
    }

    #[test]
    fn test_missing_parameter_position_is_not_assignable() {
        let h = hierarchy();
        let pair = RawType::capability("Pair");
        let pair_of_two = TypeDescriptor::new(pair.clone()).parameterized([h.integer.clone(), h.string.clone()]);
        let pair_of_one = TypeDescriptor::new(pair).parameterized([h.integer.clone()]);
        assert!(!pair_of_one.is_assignable_to(&pair_of_two));
    }

    #[test]
    fn test_arrays_compare_dimension_for_dimension() {
        let h = hierarchy();
        assert!(h.integer.array().is_assignable_to(&h.number.array()));
        assert!(!h.integer.array().is_assignable_to(&h.number));
        assert!(!h.integer.is_assignable_to(&h.integer.array()));
        assert!(!h.integer.array().array().is_assignable_to(&h.integer.array()));
        assert_eq!(h.integer.array().element(), Some(h.integer.clone()));
        assert_eq!(h.integer.element(), None);
    }

    #[test]
    fn test_no_coercion_between_unrelated_types() {
        let h = hierarchy();
        assert!(!h.integer.is_assignable_to(&h.string));
        assert!(!h.string.is_assignable_to(&h.number));
    }

    #[test]
    fn test_equality_ignores_upper_bound_flag() {
        let h = hierarchy();
        assert_eq!(h.integer, h.integer.as_upper_bound());
        assert_ne!(h.integer, h.integer.array());
    }

    #[test]
    fn test_specificity_subtype_first() {
        let h = hierarchy();
        assert_eq!(h.integer.specificity_cmp(&h.number), Ordering::Less);
        assert!(h.integer.more_qualified_than(&h.number));
        assert!(!h.number.more_qualified_than(&h.integer));
        assert!(!h.integer.more_qualified_than(&h.integer));
    }

    #[test]
    fn test_specificity_is_a_total_order_over_mixed_hierarchy() {
        // C <: A by hierarchy, names A < B < C; a name-only tie-break would cycle
        let a = RawType::capability("A");
        let b = TypeDescriptor::new(RawType::concrete("B"));
        let c = TypeDescriptor::new(RawType::concrete("C").extending([&a]));
        let a = TypeDescriptor::new(a);

        let mut all = vec![a.clone(), b.clone(), c.clone()];
        all.sort_by(|x, y| x.specificity_cmp(y));
        let pos = |t: &TypeDescriptor| all.iter().position(|x| x == t).unwrap();
        assert!(pos(&c) < pos(&a));
        for x in &all {
            for y in &all {
                assert_eq!(x.specificity_cmp(y), y.specificity_cmp(x).reverse());
            }
        }
    }

    #[test]
    fn test_display() {
        let h = hierarchy();
        let t = TypeDescriptor::new(h.list.clone())
            .parameterized([h.number.as_upper_bound()])
            .array();
        assert_eq!(t.to_string(), "List<? extends Number>[]");
    }
}
