//! Effects derived from the members of a service.
//!
//! Rather than resolving a service and then reaching into it, callers can
//! derive effects that already depend on the service. One generic builder
//! covers plain values, zero-argument effectful members and parameterized
//! members, so no per-service code is needed.

use std::sync::Arc;

use crate::effect::Effect;
use crate::key::Tag;
use crate::Never;

/// Builder for effects that resolve a service and project one of its members.
///
/// Obtained from [`Tag::members`].
///
/// # Examples
///
/// ```
/// use ferrous_effect::{Context, Effect, Never, Runtime, Tag};
/// use std::sync::Arc;
///
/// trait Random: Send + Sync {
///     fn next_int(&self) -> Effect<i32>;
///     fn next_int_between(&self, min: i32, max: i32) -> Effect<i32>;
/// }
///
/// struct Fixed;
///
/// impl Random for Fixed {
///     fn next_int(&self) -> Effect<i32> {
///         Effect::succeed(42)
///     }
///     fn next_int_between(&self, min: i32, max: i32) -> Effect<i32> {
///         Effect::succeed(min + max)
///     }
/// }
///
/// const RANDOM: Tag<dyn Random> = Tag::new("Random");
///
/// let members = RANDOM.members();
/// let next_int = members.constant(|r| r.next_int());
/// let between = members.function(|r, (min, max): (i32, i32)| r.next_int_between(min, max));
///
/// let program = Effect::<(i32, i32), Never>::gen(move |fx| {
///     Ok((fx.run(&next_int)?, fx.run(&between((10, 20)))?))
/// })
/// .provide(Context::make(RANDOM, Arc::new(Fixed) as Arc<dyn Random>));
///
/// assert_eq!(Runtime::new().run(&program).success(), Some((42, 30)));
/// ```
pub struct ServiceMembers<S: ?Sized + 'static> {
    tag: Tag<S>,
}

impl<S: ?Sized + 'static> ServiceMembers<S> {
    pub fn new(tag: Tag<S>) -> Self {
        Self { tag }
    }

    pub fn tag(&self) -> Tag<S> {
        self.tag
    }
}

impl<S> ServiceMembers<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    /// An effect reading a plain value out of the service.
    pub fn value<A, F>(&self, project: F) -> Effect<A, Never>
    where
        A: 'static,
        F: Fn(&S) -> A + Send + Sync + 'static,
    {
        Effect::service_with(self.tag, project)
    }

    /// An effect running a zero-argument effectful member of the service.
    pub fn constant<A, E, F>(&self, member: F) -> Effect<A, E>
    where
        A: 'static,
        E: 'static,
        F: Fn(&S) -> Effect<A, E> + Send + Sync + 'static,
    {
        Effect::service_with_effect(self.tag, member)
    }

    /// A function building effects from a parameterized member of the service.
    ///
    /// Multiple parameters are passed as a tuple.
    pub fn function<P, A, E, F>(
        &self,
        member: F,
    ) -> impl Fn(P) -> Effect<A, E> + Clone + Send + Sync + 'static
    where
        P: Clone + Send + Sync + 'static,
        A: 'static,
        E: 'static,
        F: Fn(&S, P) -> Effect<A, E> + Send + Sync + 'static,
    {
        let tag = self.tag;
        let member = Arc::new(member);
        move |params: P| {
            let member = member.clone();
            Effect::service_with_effect(tag, move |service| member(service, params.clone()))
        }
    }
}

impl<S: ?Sized + 'static> Clone for ServiceMembers<S> {
    fn clone(&self) -> Self {
        Self { tag: self.tag }
    }
}

impl<S: ?Sized + 'static> Copy for ServiceMembers<S> {}

impl<S: ?Sized + 'static> std::fmt::Debug for ServiceMembers<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMembers").field("tag", &self.tag).finish()
    }
}
