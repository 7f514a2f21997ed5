//! Qualifiers
//!
//! A [`Name`] discriminates bindings of the same type. Besides plain
//! literals it has three special forms:
//!
//! - `DEFAULT` (the empty string): the unqualified binding, tried first
//! - `ANY` (`*`): matches every qualifier, tried last
//! - single-wildcard patterns such as `db-*`, `*-primary` or `ns:*`
//!
//! A literal may carry a namespace prefix (`ns:value`). Namespaces are
//! matched structurally like any other part of the string.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

const WILDCARD: char = '*';
const NAMESPACE_SEPARATOR: char = ':';

/// Qualifier of an [`Instance`](crate::Instance).
///
/// # Examples
///
/// ```rust
/// use graph_injector::Name;
///
/// let primary = Name::new("db-primary");
/// let any_db = Name::new("db-*");
///
/// assert!(primary.is_compatible_with(&any_db));
/// assert!(primary.is_compatible_with(&Name::ANY));
/// assert!(!Name::DEFAULT.is_compatible_with(&any_db));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Cow<'static, str>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    Default,
    Literal,
    Pattern,
    Any,
}

impl Name {
    /// The unqualified name; the most specific qualifier.
    pub const DEFAULT: Name = Name(Cow::Borrowed(""));

    /// The wildcard name; compatible with everything, least specific.
    pub const ANY: Name = Name(Cow::Borrowed("*"));

    /// Create a name from a string.
    ///
    /// A string with exactly one `*` is a pattern. A string with more than
    /// one `*` is treated as a plain literal.
    pub fn new(value: impl Into<Cow<'static, str>>) -> Self {
        Self(value.into())
    }

    /// Create a namespaced name `ns:value`.
    pub fn namespaced(namespace: &str, value: &str) -> Self {
        Self(Cow::Owned(format!("{namespace}{NAMESPACE_SEPARATOR}{value}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        self.0 == "*"
    }

    /// Whether this is a single-wildcard pattern other than `ANY`.
    pub fn is_pattern(&self) -> bool {
        !self.is_any() && self.0.matches(WILDCARD).count() == 1
    }

    /// Neither default, `ANY` nor a pattern.
    #[inline]
    pub fn is_literal(&self) -> bool {
        self.kind() == Kind::Literal
    }

    fn kind(&self) -> Kind {
        if self.is_default() {
            Kind::Default
        } else if self.is_any() {
            Kind::Any
        } else if self.is_pattern() {
            Kind::Pattern
        } else {
            Kind::Literal
        }
    }

    /// The namespace of an `ns:value` name.
    pub fn namespace(&self) -> Option<&str> {
        self.0
            .split_once(NAMESPACE_SEPARATOR)
            .map(|(ns, _)| ns)
            .filter(|ns| !ns.is_empty())
    }

    /// The part after the namespace, or the whole name.
    pub fn value(&self) -> &str {
        match self.namespace() {
            Some(ns) => &self.0[ns.len() + 1..],
            None => &self.0,
        }
    }

    /// Whether a binding offered under `offered` may satisfy a request for
    /// `self`.
    ///
    /// `ANY` on either side matches everything. Identical names match. An
    /// offered pattern matches a requested literal (including namespaced
    /// literals) whose prefix and suffix equal the pattern's segments around
    /// the wildcard.
    pub fn is_compatible_with(&self, offered: &Name) -> bool {
        if offered.is_any() || self.is_any() || self == offered {
            return true;
        }
        offered.is_pattern() && self.is_literal() && offered.matches_pattern(&self.0)
    }

    fn matches_pattern(&self, candidate: &str) -> bool {
        let Some((prefix, suffix)) = self.0.split_once(WILDCARD) else {
            return false;
        };
        candidate.len() >= prefix.len() + suffix.len()
            && candidate.starts_with(prefix)
            && candidate.ends_with(suffix)
    }

    /// Strict partial order used for tie-breaks.
    ///
    /// `DEFAULT` beats every other name, every name beats `ANY`, and literals
    /// beat patterns. Among two literals a longer one that starts with the
    /// shorter one is more qualified. Among two patterns one is more
    /// qualified when its segments around the wildcard extend the other's
    /// (prefix outward to the right, suffix outward to the left) and at least
    /// one of them is strictly longer, so `ab*` beats `a*` and `*bc` beats `*c`.
    pub fn more_qualified_than(&self, other: &Name) -> bool {
        let (a, b) = (self.kind(), other.kind());
        if a != b {
            return a < b;
        }
        match a {
            Kind::Literal => self.0.len() > other.0.len() && self.0.starts_with(other.0.as_ref()),
            Kind::Pattern => match (self.segments(), other.segments()) {
                (Some((prefix, suffix)), Some((their_prefix, their_suffix))) => {
                    prefix.starts_with(their_prefix)
                        && suffix.ends_with(their_suffix)
                        && prefix.len() + suffix.len() > their_prefix.len() + their_suffix.len()
                }
                _ => false,
            },
            Kind::Default | Kind::Any => false,
        }
    }

    /// Total order extending [`more_qualified_than`](Self::more_qualified_than);
    /// more qualified names sort first.
    ///
    /// Literals sort by descending string order, which puts `abc` before its
    /// prefix `ab`. Patterns sort by descending length first, since a pattern
    /// extending another is always longer, then by descending string order.
    pub fn specificity_cmp(&self, other: &Name) -> Ordering {
        let kind = self.kind();
        kind.cmp(&other.kind()).then_with(|| match kind {
            Kind::Pattern => other
                .0
                .len()
                .cmp(&self.0.len())
                .then_with(|| other.0.cmp(&self.0)),
            _ => other.0.cmp(&self.0),
        })
    }

    /// The fixed text before and after the wildcard of a pattern.
    fn segments(&self) -> Option<(&str, &str)> {
        self.0.split_once(WILDCARD)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&'static str> for Name {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("default")
        } else {
            write!(f, "\"{}\"", self.0)
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.0)
    }
}
