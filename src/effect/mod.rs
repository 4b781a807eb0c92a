//! Deferred computations.
//!
//! An [`Effect<A, E>`] describes work that, when run on a [`Fiber`],
//! produces either an `A` or a [`Cause<E>`]. Building an effect never runs
//! anything; running it twice runs its side effects twice.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Defect;
use crate::exit::{Cause, Exit};
use crate::key::Tag;
use crate::runtime::Fiber;
use crate::Never;

pub mod resource;
pub mod retry;

pub use retry::{all_partitioned, all_validate, eventually};

type Thunk<A, E> = dyn Fn(&Fiber) -> Exit<A, E> + Send + Sync;

/// A lazily evaluated, replayable computation.
///
/// `A` is the success type and `E` the expected-failure type; effects that
/// can not fail use [`Never`].
///
/// # Examples
///
/// ```
/// use ferrous_effect::{Effect, Runtime};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let calls = Arc::new(AtomicU32::new(0));
/// let counter = calls.clone();
/// let effect = Effect::<u32, String>::sync(move || counter.fetch_add(1, Ordering::SeqCst) + 1);
///
/// // Nothing has run yet
/// assert_eq!(calls.load(Ordering::SeqCst), 0);
///
/// let runtime = Runtime::new();
/// assert_eq!(runtime.run(&effect).success(), Some(1));
/// assert_eq!(runtime.run(&effect).success(), Some(2));
/// ```
pub struct Effect<A, E = Never> {
    thunk: Arc<Thunk<A, E>>,
}

impl<A, E> Clone for Effect<A, E> {
    fn clone(&self) -> Self {
        Self { thunk: self.thunk.clone() }
    }
}

impl<A, E> fmt::Debug for Effect<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("success", &std::any::type_name::<A>())
            .field("error", &std::any::type_name::<E>())
            .finish()
    }
}

impl<A: 'static, E: 'static> Effect<A, E> {
    /// Builds an effect from a function of the executing fiber.
    ///
    /// This is the primitive every other constructor is written in terms of.
    pub fn from_fiber<F>(f: F) -> Self
    where
        F: Fn(&Fiber) -> Exit<A, E> + Send + Sync + 'static,
    {
        Self { thunk: Arc::new(f) }
    }

    /// Runs the effect on `fiber`, stopping first if the fiber was interrupted.
    pub(crate) fn run_on(&self, fiber: &Fiber) -> Exit<A, E> {
        if fiber.is_interrupted() {
            return Exit::interrupt();
        }
        (self.thunk)(fiber)
    }

    /// An effect that succeeds with `value`.
    pub fn succeed(value: A) -> Self
    where
        A: Clone + Send + Sync,
    {
        Self::from_fiber(move |_| Exit::succeed(value.clone()))
    }

    /// An effect that fails with the expected error `error`.
    pub fn fail(error: E) -> Self
    where
        E: Clone + Send + Sync,
    {
        Self::from_fiber(move |_| Exit::fail(error.clone()))
    }

    /// An effect that dies with `defect`.
    pub fn die(defect: Defect) -> Self {
        Self::from_fiber(move |_| Exit::die(defect.clone()))
    }

    /// An effect that interrupts the fiber running it.
    pub fn interrupt() -> Self {
        Self::from_fiber(|_| Exit::interrupt())
    }

    /// Runs `f` every time the effect runs. A panic becomes a defect.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::from_fiber(move |fx| match fx.guard(&f) {
            Ok(value) => Exit::succeed(value),
            Err(defect) => Exit::die(defect),
        })
    }

    /// Runs a fallible `f` every time the effect runs.
    pub fn try_sync<F>(f: F) -> Self
    where
        F: Fn() -> Result<A, E> + Send + Sync + 'static,
    {
        Self::from_fiber(move |fx| match fx.guard(&f) {
            Ok(Ok(value)) => Exit::succeed(value),
            Ok(Err(error)) => Exit::fail(error),
            Err(defect) => Exit::die(defect),
        })
    }

    /// Defers construction of an effect until it runs.
    ///
    /// `f` is evaluated afresh on every run, which is what lets a retried
    /// effect observe state that changed between attempts.
    pub fn suspend<F>(f: F) -> Self
    where
        F: Fn() -> Effect<A, E> + Send + Sync + 'static,
    {
        Self::from_fiber(move |fx| match fx.guard(&f) {
            Ok(effect) => effect.run_on(fx),
            Err(defect) => Exit::die(defect),
        })
    }

    /// Imperative sequencing: `f` runs sub-effects with [`Fiber::run`] and
    /// short-circuits with `?`.
    pub fn gen<F>(f: F) -> Self
    where
        F: Fn(&Fiber) -> Result<A, Cause<E>> + Send + Sync + 'static,
    {
        Self::from_fiber(move |fx| match fx.guard(|| f(fx)) {
            Ok(result) => Exit::from(result),
            Err(defect) => Exit::die(defect),
        })
    }

    pub fn map<B, F>(self, f: F) -> Effect<B, E>
    where
        B: 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        Effect::from_fiber(move |fx| self.run_on(fx).map(&f))
    }

    pub fn map_err<E2, F>(self, f: F) -> Effect<A, E2>
    where
        E2: 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        Effect::from_fiber(move |fx| match self.run_on(fx) {
            Exit::Success(a) => Exit::Success(a),
            Exit::Failure(cause) => Exit::Failure(cause.map(&f)),
        })
    }

    /// Feeds the success value into `f` and runs the effect it returns.
    pub fn flat_map<B, F>(self, f: F) -> Effect<B, E>
    where
        B: 'static,
        F: Fn(A) -> Effect<B, E> + Send + Sync + 'static,
    {
        Effect::from_fiber(move |fx| match self.run_on(fx) {
            Exit::Success(a) => f(a).run_on(fx),
            Exit::Failure(cause) => Exit::Failure(cause),
        })
    }

    /// Runs `next` after `self`, keeping `next`'s value.
    pub fn and_then<B: 'static>(self, next: Effect<B, E>) -> Effect<B, E> {
        Effect::from_fiber(move |fx| match self.run_on(fx) {
            Exit::Success(_) => next.run_on(fx),
            Exit::Failure(cause) => Exit::Failure(cause),
        })
    }

    /// Runs `next` after `self`, keeping `self`'s value.
    pub fn and_then_discard<B: 'static>(self, next: Effect<B, E>) -> Effect<A, E> {
        Effect::from_fiber(move |fx| match self.run_on(fx) {
            Exit::Success(a) => match next.run_on(fx) {
                Exit::Success(_) => Exit::Success(a),
                Exit::Failure(cause) => Exit::Failure(cause),
            },
            Exit::Failure(cause) => Exit::Failure(cause),
        })
    }

    /// Recovers from expected failures. Defects and interruptions pass through.
    pub fn catch_all<E2, F>(self, f: F) -> Effect<A, E2>
    where
        E2: 'static,
        F: Fn(E) -> Effect<A, E2> + Send + Sync + 'static,
    {
        Effect::from_fiber(move |fx| match self.run_on(fx) {
            Exit::Success(a) => Exit::Success(a),
            Exit::Failure(cause) => match cause.split_failure() {
                Ok(e) => f(e).run_on(fx),
                Err(cause) => Exit::Failure(cause),
            },
        })
    }

    /// Moves expected failures into the success channel.
    pub fn either<E2: 'static>(self) -> Effect<Result<A, E>, E2> {
        Effect::from_fiber(move |fx| match self.run_on(fx) {
            Exit::Success(a) => Exit::Success(Ok(a)),
            Exit::Failure(cause) => match cause.split_failure() {
                Ok(e) => Exit::Success(Err(e)),
                Err(cause) => Exit::Failure(cause),
            },
        })
    }

    /// Makes the exit itself the success value.
    pub fn exit<E2: 'static>(self) -> Effect<Exit<A, E>, E2> {
        Effect::from_fiber(move |fx| Exit::Success(self.run_on(fx)))
    }

    /// Runs the effect with `context` layered over the current services.
    ///
    /// On a key present in both, `context` wins, so the innermost `provide`
    /// decides.
    pub fn provide(self, context: Context) -> Self {
        Effect::from_fiber(move |fx| {
            let services = fx.services().merge(&context);
            self.run_on(&fx.with_services(services))
        })
    }

    /// Provides a single service.
    pub fn provide_service<S>(self, tag: Tag<S>, service: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.provide(Context::make(tag, service))
    }

    /// Reads a service and maps it to a value.
    pub fn service_with<S, F>(tag: Tag<S>, f: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&S) -> A + Send + Sync + 'static,
    {
        Self::from_fiber(move |fx| match fx.service(tag) {
            Ok(service) => match fx.guard(|| f(&*service)) {
                Ok(value) => Exit::succeed(value),
                Err(defect) => Exit::die(defect),
            },
            Err(defect) => Exit::die(defect),
        })
    }

    /// Reads a service and runs the effect `f` builds from it.
    pub fn service_with_effect<S, F>(tag: Tag<S>, f: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&S) -> Effect<A, E> + Send + Sync + 'static,
    {
        Self::from_fiber(move |fx| match fx.service(tag) {
            Ok(service) => match fx.guard(|| f(&*service)) {
                Ok(effect) => effect.run_on(fx),
                Err(defect) => Exit::die(defect),
            },
            Err(defect) => Exit::die(defect),
        })
    }
}

impl<S, E> Effect<Arc<S>, E>
where
    S: ?Sized + Send + Sync + 'static,
    E: 'static,
{
    /// Resolves the service declared by `tag`.
    ///
    /// A missing service is a [`Defect::ServiceNotFound`].
    pub fn service(tag: Tag<S>) -> Self {
        Self::from_fiber(move |fx| match fx.service(tag) {
            Ok(service) => Exit::succeed(service),
            Err(defect) => Exit::die(defect),
        })
    }
}

impl<E: 'static> Effect<(), E> {
    /// Succeeds with `()`.
    pub fn unit() -> Self {
        Self::from_fiber(|_| Exit::succeed(()))
    }

    /// Appends `line` to the run's side-channel log.
    pub fn log(line: impl Into<String>) -> Self {
        let line: String = line.into();
        Self::from_fiber(move |fx| {
            fx.log(line.clone());
            Exit::succeed(())
        })
    }
}

impl<A: 'static> Effect<A, Never> {
    /// Widens an infallible effect into any error type.
    pub fn widen<E: 'static>(self) -> Effect<A, E> {
        self.map_err(|never| match never {})
    }
}
