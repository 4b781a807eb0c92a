//! Service identifiers.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use crate::members::ServiceMembers;

/// Key for service storage and lookup.
///
/// A key pairs the `TypeId` of the service interface with the name the
/// service was declared with, so two services sharing an interface type can
/// still live side by side in one context.
///
/// # Examples
///
/// ```rust
/// use ferrous_effect::{ServiceKey, Tag};
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// let wall = Tag::<dyn Clock>::new("WallClock");
/// let mono = Tag::<dyn Clock>::new("MonotonicClock");
///
/// assert_ne!(wall.key(), mono.key());
/// assert_eq!(wall.key(), Tag::<dyn Clock>::new("WallClock").key());
/// assert_eq!(wall.key().name(), "WallClock");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
    name: &'static str,
}

impl ServiceKey {
    /// Key for interface `S` declared under `name`.
    #[inline]
    pub fn of<S: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            name,
        }
    }

    /// The declared service name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The interface type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// Identity is the TypeId plus the declared name; the type name string is only for display.
impl PartialEq for ServiceKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for ServiceKey {}

impl std::hash::Hash for ServiceKey {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.type_name)
    }
}

/// Typed handle for a service declaration.
///
/// `Tag<S>` is the declaration of a service: the interface type `S`
/// (usually a `dyn Trait`) plus a name. It is used to add implementations to
/// a [`Context`](crate::Context), to resolve them, and to build effects that
/// require the service.
///
/// # Examples
///
/// ```rust
/// use ferrous_effect::{Context, Effect, Runtime, Tag};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".to_string() }
/// }
///
/// const GREETER: Tag<dyn Greeter> = Tag::new("Greeter");
///
/// let program = Effect::<String>::service_with(GREETER, |g| g.greet());
/// let context = Context::empty().add(GREETER, Arc::new(English) as Arc<dyn Greeter>);
///
/// let exit = Runtime::new().run(&program.provide(context));
/// assert_eq!(exit.success(), Some("hello".to_string()));
/// ```
pub struct Tag<S: ?Sized + 'static> {
    name: &'static str,
    _service: PhantomData<fn() -> Box<S>>,
}

impl<S: ?Sized + 'static> Tag<S> {
    /// Declares a service named `name` with interface `S`.
    pub const fn new(name: &'static str) -> Self {
        Self { name, _service: PhantomData }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn key(&self) -> ServiceKey {
        ServiceKey::of::<S>(self.name)
    }

    /// Derives member accessors that already depend on this service.
    pub fn members(self) -> ServiceMembers<S> {
        ServiceMembers::new(self)
    }
}

impl<S: ?Sized + 'static> Clone for Tag<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized + 'static> Copy for Tag<S> {}

impl<S: ?Sized + 'static> fmt::Debug for Tag<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("service", &std::any::type_name::<S>())
            .finish()
    }
}
