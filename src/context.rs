//! Immutable service contexts.
//!
//! A [`Context`] maps service keys to implementations. It is never mutated in
//! place: adding or merging produces a new context, so a snapshot handed to a
//! running fiber can not change underneath it.

use std::any::Any;
use std::sync::Arc;

use crate::error::{Defect, DefectResult};
use crate::key::{ServiceKey, Tag};

#[cfg(feature = "ahash")]
type ServiceMap = ahash::AHashMap<ServiceKey, AnyArc>;
#[cfg(not(feature = "ahash"))]
type ServiceMap = std::collections::HashMap<ServiceKey, AnyArc>;

// Type-erased storage; each entry holds an `Arc<S>` for its tag's interface.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Immutable registry of service implementations.
///
/// Cloning is cheap (one `Arc`). Each [`ServiceKey`] maps to at most one
/// implementation.
///
/// # Examples
///
/// ```rust
/// use ferrous_effect::{Context, Tag};
/// use std::sync::Arc;
///
/// trait Random: Send + Sync {
///     fn next_int(&self) -> i64;
/// }
/// struct Fixed(i64);
/// impl Random for Fixed {
///     fn next_int(&self) -> i64 { self.0 }
/// }
///
/// const RANDOM: Tag<dyn Random> = Tag::new("Random");
///
/// let base = Context::empty().add(RANDOM, Arc::new(Fixed(1)) as Arc<dyn Random>);
/// let over = Context::empty().add(RANDOM, Arc::new(Fixed(2)) as Arc<dyn Random>);
///
/// // Right-biased merge, and the original is untouched
/// assert_eq!(base.merge(&over).get(RANDOM).unwrap().next_int(), 2);
/// assert_eq!(base.get(RANDOM).unwrap().next_int(), 1);
/// ```
#[derive(Clone, Default)]
pub struct Context {
    services: Arc<ServiceMap>,
}

impl Context {
    /// The context with no services.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context holding exactly one service.
    pub fn make<S>(tag: Tag<S>, service: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        Self::empty().add(tag, service)
    }

    /// Returns a new context with `service` bound to `tag`, replacing any
    /// previous binding for the same key.
    pub fn add<S>(&self, tag: Tag<S>, service: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let mut services = (*self.services).clone();
        services.insert(tag.key(), Arc::new(service) as AnyArc);
        Self { services: Arc::new(services) }
    }

    /// Returns a new context holding both sets of services; on a key present
    /// in both, `other` wins.
    pub fn merge(&self, other: &Context) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut services = (*self.services).clone();
        for (key, value) in other.services.iter() {
            services.insert(*key, value.clone());
        }
        Self { services: Arc::new(services) }
    }

    /// Resolves the implementation bound to `tag`.
    ///
    /// A missing binding is a [`Defect::ServiceNotFound`]: code that requires
    /// a service and runs without it is a programming error.
    pub fn get<S>(&self, tag: Tag<S>) -> DefectResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let key = tag.key();
        let entry = self.services.get(&key).ok_or(Defect::ServiceNotFound {
            service: key.type_name(),
            name: key.name(),
        })?;
        entry
            .downcast_ref::<Arc<S>>()
            .cloned()
            .ok_or(Defect::TypeMismatch(key.type_name()))
    }

    pub fn contains_key(&self, key: &ServiceKey) -> bool {
        self.services.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Keys of every bound service, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.services.keys()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.services.keys().map(ToString::to_string).collect();
        names.sort();
        f.debug_struct("Context").field("services", &names).finish()
    }
}

/// Looks `tag` up in a context snapshot.
///
/// Free-function form of [`Context::get`].
pub fn resolve<S>(snapshot: &Context, tag: Tag<S>) -> DefectResult<Arc<S>>
where
    S: ?Sized + Send + Sync + 'static,
{
    snapshot.get(tag)
}

/// Mutable builder for a [`Context`].
///
/// Registering many services through [`Context::add`] copies the map each
/// time; the builder collects them first and freezes once.
///
/// # Examples
///
/// ```rust
/// use ferrous_effect::{ContextBuilder, Tag};
/// use std::sync::Arc;
///
/// trait Port: Send + Sync { fn port(&self) -> u16; }
/// struct P(u16);
/// impl Port for P { fn port(&self) -> u16 { self.0 } }
///
/// let mut builder = ContextBuilder::new();
/// builder.add(Tag::<dyn Port>::new("Http"), Arc::new(P(80)) as Arc<dyn Port>);
/// builder.add(Tag::<dyn Port>::new("Https"), Arc::new(P(443)) as Arc<dyn Port>);
/// let context = builder.build();
///
/// assert_eq!(context.len(), 2);
/// assert_eq!(context.get(Tag::<dyn Port>::new("Https")).unwrap().port(), 443);
/// ```
#[derive(Default)]
pub struct ContextBuilder {
    services: ServiceMap,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `service` to `tag`; a later binding for the same key wins.
    pub fn add<S>(&mut self, tag: Tag<S>, service: Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let key = tag.key();
        if self.services.insert(key, Arc::new(service) as AnyArc).is_some() {
            tracing::debug!(service = %key, "replacing existing service binding");
        }
        self
    }

    /// Binds a sized value, wrapping it in an `Arc`.
    pub fn add_value<S>(&mut self, tag: Tag<S>, service: S) -> &mut Self
    where
        S: Send + Sync + 'static,
    {
        self.add(tag, Arc::new(service))
    }

    /// Copies every binding of `context` into the builder.
    pub fn extend(&mut self, context: &Context) -> &mut Self {
        for (key, value) in context.services.iter() {
            self.services.insert(*key, value.clone());
        }
        self
    }

    pub fn build(self) -> Context {
        Context { services: Arc::new(self.services) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct A;
    impl Named for A {
        fn name(&self) -> &'static str {
            "a"
        }
    }

    const NAMED: Tag<dyn Named> = Tag::new("Named");

    #[test]
    fn missing_service_is_a_defect() {
        let err = Context::empty().get(NAMED).err();
        assert_eq!(
            err,
            Some(Defect::ServiceNotFound {
                service: std::any::type_name::<dyn Named>(),
                name: "Named",
            })
        );
    }

    #[test]
    fn sized_and_unsized_services_coexist() {
        let count: Tag<u32> = Tag::new("Count");
        let ctx = Context::make(NAMED, Arc::new(A) as Arc<dyn Named>).add(count, Arc::new(3));
        assert_eq!(ctx.get(NAMED).unwrap().name(), "a");
        assert_eq!(*ctx.get(count).unwrap(), 3);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn builder_extend_keeps_later_bindings() {
        let first: Tag<u32> = Tag::new("N");
        let mut builder = ContextBuilder::new();
        builder.add_value(first, 1);
        builder.extend(&Context::make(first, Arc::new(2)));
        assert_eq!(*builder.build().get(first).unwrap(), 2);
    }
}
