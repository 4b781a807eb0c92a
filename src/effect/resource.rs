//! Scope boundaries and resource lifecycles.
//!
//! Resources register their release on the *ambient* scope of the fiber that
//! acquires them. [`Effect::scoped`] opens a fresh ambient scope and closes it
//! when the wrapped effect ends, whatever the outcome; [`Effect::in_scope`]
//! binds an effect to a scope chosen by the caller instead.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::exit::{Cause, Exit, ExitStatus};
use crate::runtime::{Fiber, Scope};
use crate::traits::Release;
use crate::Never;
use super::Effect;

impl<A: 'static, E: 'static> Effect<A, E> {
    /// Runs the effect inside a fresh scope that closes when it ends.
    ///
    /// The scope is closed on success, failure, defect and interruption,
    /// before the outcome propagates. A finalizer failure is sequenced after
    /// the effect's own cause.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_effect::{Effect, Runtime};
    ///
    /// let program = Effect::<(), String>::add_finalizer(|_| Effect::log("Last!"))
    ///     .and_then(Effect::log("First"))
    ///     .scoped();
    ///
    /// let (_, logs) = Runtime::new().run_with_logs(&program);
    /// assert_eq!(logs, vec!["First", "Last!"]);
    /// ```
    pub fn scoped(self) -> Self {
        Effect::from_fiber(move |fx| {
            let scope = Scope::make();
            fx.observers().scope_opened(scope.id());
            let inner = fx.with_scope(scope.clone());
            // Uncaught panics still close the scope before unwinding further.
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_on(&inner))) {
                Ok(exit) => {
                    let cleanup = scope.close_on(fx, exit.status());
                    exit.then_cleanup(cleanup)
                }
                Err(payload) => {
                    if let Err(defect) = scope.close_on(fx, ExitStatus::Defect) {
                        tracing::warn!(scope = %scope.id(), error = %defect, "finalizers failed while unwinding");
                    }
                    panic::resume_unwind(payload)
                }
            }
        })
    }

    /// Runs the effect with `scope` as its ambient scope.
    ///
    /// Resources acquired by the effect are released when `scope` closes, not
    /// at the nearest [`scoped`](Effect::scoped) boundary.
    pub fn in_scope(self, scope: &Scope) -> Self {
        let scope = scope.clone();
        Effect::from_fiber(move |fx| self.run_on(&fx.with_scope(scope.clone())))
    }

    /// Acquires a resource and registers its release on the ambient scope.
    ///
    /// Acquisition runs uninterruptibly. If it fails nothing is registered.
    /// With no ambient scope the effect dies with [`Defect::NoScope`](crate::Defect::NoScope) before
    /// acquiring anything.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_effect::{Effect, Runtime};
    ///
    /// fn file(fd: u32) -> Effect<u32, String> {
    ///     Effect::acquire_release(
    ///         Effect::log(format!("open {}", fd)).map(move |_| fd),
    ///         |fd| Effect::log(format!("close {}", fd)),
    ///     )
    /// }
    ///
    /// let program = file(1).and_then(file(2)).scoped();
    /// let (_, logs) = Runtime::new().run_with_logs(&program);
    /// assert_eq!(logs, vec!["open 1", "open 2", "close 2", "close 1"]);
    /// ```
    pub fn acquire_release<F>(acquire: Effect<A, E>, release: F) -> Self
    where
        A: Clone + Send + Sync,
        F: Fn(A) -> Effect<(), Never> + Send + Sync + 'static,
    {
        Self::acquire_release_exit(acquire, move |value, _| release(value))
    }

    /// Like [`acquire_release`](Effect::acquire_release), with the release
    /// receiving the status its scope closed with.
    pub fn acquire_release_exit<F>(acquire: Effect<A, E>, release: F) -> Self
    where
        A: Clone + Send + Sync,
        F: Fn(A, ExitStatus) -> Effect<(), Never> + Send + Sync + 'static,
    {
        let release = Arc::new(release);
        Effect::from_fiber(move |fx| {
            let scope = match fx.require_scope() {
                Ok(scope) => scope.clone(),
                Err(defect) => return Exit::die(defect),
            };
            let value = match acquire.run_on(&fx.uninterruptible()) {
                Exit::Success(value) => value,
                Exit::Failure(cause) => return Exit::Failure(cause),
            };
            let release = release.clone();
            let resource = value.clone();
            match register(fx, &scope, move |status| release(resource.clone(), status)) {
                Ok(()) => Exit::Success(value),
                Err(cause) => Exit::Failure(cause),
            }
        })
    }

    /// Acquires a resource, uses it and releases it right after `use_`,
    /// regardless of how `use_` ended.
    ///
    /// The resource lives in a boundary of its own, so it can not outlive
    /// `use_`.
    pub fn acquire_use_release<R, U, F>(acquire: Effect<R, E>, use_: U, release: F) -> Self
    where
        R: Clone + Send + Sync + 'static,
        U: Fn(R) -> Effect<A, E> + Send + Sync + 'static,
        F: Fn(R) -> Effect<(), Never> + Send + Sync + 'static,
    {
        Effect::<R, E>::acquire_release(acquire, release)
            .flat_map(use_)
            .scoped()
    }
}

impl<R, E> Effect<Arc<R>, E>
where
    R: Release + ?Sized,
    E: 'static,
{
    /// Acquires a [`Release`] resource; its own `release` runs on scope close.
    pub fn acquire(acquire: Effect<Arc<R>, E>) -> Self {
        Self::acquire_release_exit(acquire, |resource, status| resource.release(status))
    }
}

impl<E: 'static> Effect<(), E> {
    /// Registers a release-only finalizer on the ambient scope.
    ///
    /// Without an ambient scope this dies with [`Defect::NoScope`](crate::Defect::NoScope); wrap the
    /// program with [`scoped`](Effect::scoped) to decide where it runs.
    pub fn add_finalizer<F>(finalizer: F) -> Self
    where
        F: Fn(ExitStatus) -> Effect<(), Never> + Send + Sync + 'static,
    {
        let finalizer = Arc::new(finalizer);
        Effect::from_fiber(move |fx| {
            let finalizer = finalizer.clone();
            let registered = fx
                .require_scope()
                .and_then(|scope| fx.add_finalizer(scope, move |status| finalizer(status)));
            match registered {
                Ok(()) => Exit::succeed(()),
                Err(defect) => Exit::die(defect),
            }
        })
    }
}

impl<E: 'static> Effect<Scope, E> {
    /// The ambient scope, or a [`Defect::NoScope`](crate::Defect::NoScope) defect.
    pub fn scope() -> Self {
        Effect::from_fiber(|fx| match fx.require_scope() {
            Ok(scope) => Exit::succeed(scope.clone()),
            Err(defect) => Exit::die(defect),
        })
    }

    /// Creates a fresh, unattached scope. The caller is responsible for closing it.
    pub fn make_scope() -> Self {
        Effect::from_fiber(|_| Exit::succeed(Scope::make()))
    }
}

impl<E: 'static> Effect<(), E> {
    /// Closes `scope` with `status`, running its finalizers on this fiber.
    pub fn close_scope(scope: &Scope, status: ExitStatus) -> Self {
        let scope = scope.clone();
        Effect::from_fiber(move |fx| match fx.close_scope(&scope, status) {
            Ok(()) => Exit::succeed(()),
            Err(defect) => Exit::die(defect),
        })
    }
}

/// Registers a release, running it at once if the scope closed meanwhile.
///
/// The rejection is reported as `ScopeClosed`, followed by the release's own
/// failure if it had one.
fn register<E, F>(fx: &Fiber, scope: &Scope, release: F) -> Result<(), Cause<E>>
where
    F: Fn(ExitStatus) -> Effect<(), Never> + Send + Sync + 'static,
{
    let release = Arc::new(release);
    let registered = release.clone();
    match fx.add_finalizer(scope, move |status| registered(status)) {
        Ok(()) => Ok(()),
        Err(defect) => {
            tracing::warn!(scope = %scope.id(), "releasing resource acquired into a closed scope");
            let rejected = Cause::Die(defect);
            match fx.for_finalizers().exit(&release(ExitStatus::Interrupted)) {
                Exit::Success(()) => Err(rejected),
                Exit::Failure(cause) => Err(rejected.then(cause.map(|never| match never {}))),
            }
        }
    }
}
