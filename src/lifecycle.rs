//! Lifetime descriptors
//!
//! A [`LifeCycle`] is static metadata about a named scope: whether its
//! instances live as long as the resolver (permanent), whether they are
//! created at bootstrap (eager), and which shorter-lived scopes it may be
//! nested inside. The standard set is built once per process.

use once_cell::sync::Lazy;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Wildcard entry for [`LifeCycle::consistent_with`]: consistent with any scope.
pub const ANY_SCOPE: &str = "*";

struct LifeCycleData {
    name: Arc<str>,
    permanent: bool,
    eager: bool,
    consistent_with: Box<[Arc<str>]>,
    group: Option<Arc<str>>,
}

/// Static description of a named scope.
///
/// Identity is the name: two descriptors with the same name are the same
/// lifecycle.
#[derive(Clone)]
pub struct LifeCycle(Arc<LifeCycleData>);

impl LifeCycle {
    /// A non-permanent, non-eager lifecycle with no consistency declarations.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(Arc::new(LifeCycleData {
            name: name.into(),
            permanent: false,
            eager: false,
            consistent_with: Box::new([]),
            group: None,
        }))
    }

    fn update(self, f: impl FnOnce(&mut LifeCycleData)) -> Self {
        let mut data = LifeCycleData {
            name: Arc::clone(&self.0.name),
            permanent: self.0.permanent,
            eager: self.0.eager,
            consistent_with: self.0.consistent_with.clone(),
            group: self.0.group.clone(),
        };
        f(&mut data);
        Self(Arc::new(data))
    }

    /// Instances live as long as the resolver.
    pub fn permanent(self) -> Self {
        self.update(|d| d.permanent = true)
    }

    /// Instances are created when the resolver is built. Implies permanent.
    pub fn eager(self) -> Self {
        self.update(|d| {
            d.permanent = true;
            d.eager = true;
        })
    }

    /// Declare that instances may be nested inside the named scopes.
    pub fn consistent_with<I, S>(self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let extra: Vec<Arc<str>> = scopes.into_iter().map(Into::into).collect();
        self.update(|d| {
            let mut all = d.consistent_with.to_vec();
            all.extend(extra);
            d.consistent_with = all.into_boxed_slice();
        })
    }

    /// Link this lifecycle to a group it derives from.
    pub fn derived_from(self, group: impl Into<Arc<str>>) -> Self {
        let group = group.into();
        self.update(|d| d.group = Some(group))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.0.permanent
    }

    #[inline]
    pub fn is_eager(&self) -> bool {
        self.0.eager
    }

    #[inline]
    pub fn group(&self) -> Option<&str> {
        self.0.group.as_deref()
    }

    pub fn consistent_scopes(&self) -> impl Iterator<Item = &str> {
        self.0.consistent_with.iter().map(|s| s.as_ref())
    }

    /// Whether an instance of this lifecycle may be injected directly into
    /// an instance of `ancestor`.
    pub fn is_consistent_within(&self, ancestor: &LifeCycle) -> bool {
        if self.is_permanent() || self == ancestor {
            return true;
        }
        self.consistent_scopes().any(|s| {
            s == ANY_SCOPE || s == ancestor.name() || Some(s) == ancestor.group()
        })
    }

    /// `container`: permanent, one instance per resolver.
    pub fn container() -> Self {
        STANDARD.container.clone()
    }

    /// `application`: permanent, one instance per resolver.
    pub fn application() -> Self {
        STANDARD.application.clone()
    }

    /// `eager`: like `application`, created at bootstrap.
    pub fn eager_application() -> Self {
        STANDARD.eager.clone()
    }

    /// `type`: permanent, one instance per requested raw type.
    pub fn per_type() -> Self {
        STANDARD.per_type.clone()
    }

    /// `instance`: permanent, one instance per requested instance.
    pub fn per_instance() -> Self {
        STANDARD.per_instance.clone()
    }

    /// `injection`: a new instance for every injection.
    pub fn injection() -> Self {
        STANDARD.injection.clone()
    }

    /// `dependency`: one instance per distinct request path.
    pub fn dependency() -> Self {
        STANDARD.dependency.clone()
    }

    /// `target`: one instance per receiving binding.
    pub fn target() -> Self {
        STANDARD.target.clone()
    }

    /// `thread`: one instance per thread.
    pub fn thread() -> Self {
        STANDARD.thread.clone()
    }

    /// `worker`: one instance per attached worker context.
    pub fn worker() -> Self {
        STANDARD.worker.clone()
    }

    /// All standard lifecycles.
    pub fn standard() -> [LifeCycle; 10] {
        let s = &*STANDARD;
        [
            s.container.clone(),
            s.application.clone(),
            s.eager.clone(),
            s.per_type.clone(),
            s.per_instance.clone(),
            s.injection.clone(),
            s.dependency.clone(),
            s.target.clone(),
            s.thread.clone(),
            s.worker.clone(),
        ]
    }
}

struct Standard {
    container: LifeCycle,
    application: LifeCycle,
    eager: LifeCycle,
    per_type: LifeCycle,
    per_instance: LifeCycle,
    injection: LifeCycle,
    dependency: LifeCycle,
    target: LifeCycle,
    thread: LifeCycle,
    worker: LifeCycle,
}

static STANDARD: Lazy<Standard> = Lazy::new(|| {
    const SHORT_LIVED: [&str; 3] = ["injection", "dependency", "target"];
    Standard {
        container: LifeCycle::new("container").permanent(),
        application: LifeCycle::new("application").permanent(),
        eager: LifeCycle::new("eager").eager().derived_from("application"),
        per_type: LifeCycle::new("type").permanent(),
        per_instance: LifeCycle::new("instance").permanent(),
        injection: LifeCycle::new("injection").consistent_with([ANY_SCOPE]),
        dependency: LifeCycle::new("dependency").consistent_with([ANY_SCOPE]),
        target: LifeCycle::new("target").consistent_with([ANY_SCOPE]),
        thread: LifeCycle::new("thread").consistent_with(SHORT_LIVED),
        worker: LifeCycle::new("worker").consistent_with(SHORT_LIVED),
    }
});

impl PartialEq for LifeCycle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for LifeCycle {}

impl Hash for LifeCycle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Display for LifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for LifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifeCycle")
            .field("name", &self.name())
            .field("permanent", &self.is_permanent())
            .field("eager", &self.is_eager())
            .field("consistent_with", &self.0.consistent_with)
            .field("group", &self.group())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_is_consistent_with_everything() {
        for ancestor in LifeCycle::standard() {
            assert!(LifeCycle::application().is_consistent_within(&ancestor));
            assert!(LifeCycle::eager_application().is_consistent_within(&ancestor));
        }
    }

    #[test]
    fn test_short_lived_inside_permanent() {
        let session = LifeCycle::new("session");
        assert!(!session.is_consistent_within(&LifeCycle::application()));
        assert!(session.is_consistent_within(&session));

        let declared = LifeCycle::new("session").consistent_with(["application"]);
        assert!(declared.is_consistent_within(&LifeCycle::application()));
    }

    #[test]
    fn test_group_link() {
        let request = LifeCycle::new("request").consistent_with(["application"]);
        // eager derives from application
        assert!(request.is_consistent_within(&LifeCycle::eager_application()));
        assert!(!request.is_consistent_within(&LifeCycle::per_type()));
    }

    #[test]
    fn test_thread_scope_nesting() {
        let thread = LifeCycle::thread();
        assert!(thread.is_consistent_within(&LifeCycle::injection()));
        assert!(thread.is_consistent_within(&LifeCycle::thread()));
        assert!(!thread.is_consistent_within(&LifeCycle::application()));
        assert!(!thread.is_consistent_within(&LifeCycle::worker()));
        assert!(LifeCycle::injection().is_consistent_within(&LifeCycle::application()));
    }

    #[test]
    fn test_identity_by_name() {
        assert_eq!(LifeCycle::new("application"), LifeCycle::application());
        assert_ne!(LifeCycle::thread(), LifeCycle::worker());
        assert!(LifeCycle::eager_application().is_eager());
        assert!(LifeCycle::eager_application().is_permanent());
        assert_eq!(LifeCycle::eager_application().group(), Some("application"));
    }
}
