//! Scopes and their finalizers.
//!
//! A [`Scope`] is the one mutable structure in the runtime: an ordered list
//! of finalizers plus an open/closed flag. It moves from open to closed
//! exactly once; closing runs every finalizer in reverse registration order.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::effect::Effect;
use crate::error::{Defect, DefectResult};
use crate::exit::{Cause, Exit, ExitStatus};
use crate::internal::{Finalizer, FinalizerStack};
use crate::Never;
use super::Fiber;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique scope identifier, used in defects and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub(crate) fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A lifetime that owns cleanup actions.
///
/// Cloning a `Scope` clones a handle: every clone refers to the same
/// finalizer list. Resources whose finalizers land on the same scope are
/// released together, in reverse acquisition order.
///
/// # Examples
///
/// Manual use, outside of any effect:
///
/// ```
/// use ferrous_effect::{Defect, Effect, ExitStatus, Scope};
/// use std::sync::{Arc, Mutex};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let scope = Scope::make();
///
/// for name in ["Finalizer 1", "Finalizer 2"] {
///     let log = log.clone();
///     scope
///         .add_finalizer(move |_| {
///             let log = log.clone();
///             Effect::sync(move || log.lock().unwrap().push(name))
///         })
///         .unwrap();
/// }
///
/// scope.close(ExitStatus::Success).unwrap();
/// assert_eq!(*log.lock().unwrap(), vec!["Finalizer 2", "Finalizer 1"]);
///
/// // Closed scopes reject new finalizers
/// let err = scope.add_finalizer(|_| Effect::unit()).unwrap_err();
/// assert_eq!(err, Defect::ScopeClosed(scope.id()));
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    id: ScopeId,
    state: Mutex<ScopeState>,
}

enum ScopeState {
    Open(FinalizerStack),
    Closed(ExitStatus),
}

impl Scope {
    /// Creates a new open scope with no finalizers.
    pub fn make() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::next(),
                state: Mutex::new(ScopeState::Open(FinalizerStack::default())),
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.inner.state.lock(), ScopeState::Closed(_))
    }

    /// The status the scope was closed with, if it has closed.
    pub fn closed_with(&self) -> Option<ExitStatus> {
        match *self.inner.state.lock() {
            ScopeState::Closed(status) => Some(status),
            ScopeState::Open(_) => None,
        }
    }

    /// Number of finalizers waiting for close.
    pub fn finalizer_count(&self) -> usize {
        match &*self.inner.state.lock() {
            ScopeState::Open(stack) => stack.len(),
            ScopeState::Closed(_) => 0,
        }
    }

    /// Registers a finalizer.
    ///
    /// `finalizer` receives the status the scope closes with and returns the
    /// cleanup effect. It runs on the fiber that closes the scope.
    ///
    /// # Errors
    ///
    /// [`Defect::ScopeClosed`] if the scope has already closed; the finalizer
    /// is dropped without running.
    pub fn add_finalizer<F>(&self, finalizer: F) -> DefectResult<()>
    where
        F: FnOnce(ExitStatus) -> Effect<(), Never> + Send + 'static,
    {
        self.push(Finalizer { run: Box::new(finalizer), env: None })
    }

    pub(crate) fn push(&self, finalizer: Finalizer) -> DefectResult<()> {
        match &mut *self.inner.state.lock() {
            ScopeState::Open(stack) => {
                stack.push(finalizer);
                Ok(())
            }
            ScopeState::Closed(_) => {
                tracing::debug!(scope = %self.id(), "rejecting finalizer on closed scope");
                Err(Defect::ScopeClosed(self.id()))
            }
        }
    }

    /// Closes the scope, running its finalizers on a detached fiber.
    ///
    /// See [`Scope::close_on`].
    pub fn close(&self, status: ExitStatus) -> DefectResult<()> {
        self.close_on(&Fiber::detached(), status)
    }

    /// Closes the scope and runs every finalizer exactly once, most recently
    /// registered first.
    ///
    /// Each finalizer receives `status`. A failing finalizer never stops the
    /// ones after it; all failures are returned together once every
    /// finalizer has run. Closing an already closed scope does nothing and
    /// returns `Ok`.
    pub fn close_on(&self, fiber: &Fiber, status: ExitStatus) -> DefectResult<()> {
        let mut stack = {
            let mut state = self.inner.state.lock();
            match std::mem::replace(&mut *state, ScopeState::Closed(status)) {
                ScopeState::Open(stack) => stack,
                closed @ ScopeState::Closed(_) => {
                    *state = closed;
                    tracing::debug!(scope = %self.id(), "scope already closed");
                    return Ok(());
                }
            }
        };

        // The lock is released: finalizers that touch this scope see it closed.
        let fallback = fiber.for_finalizers();
        let observers = fiber.observers();
        let mut failures = Vec::new();
        let mut ran = 0;

        for finalizer in stack.drain_lifo() {
            ran += 1;
            let env = finalizer.env.as_ref().unwrap_or(&fallback);
            if let Err(defect) = run_finalizer(finalizer.run, env, status) {
                tracing::warn!(scope = %self.id(), error = %defect, "finalizer failed");
                observers.finalizer_failed(self.id(), &defect);
                failures.push(defect);
            }
        }

        observers.scope_closed(self.id(), status, ran);
        Defect::aggregate(failures)
    }
}

fn run_finalizer(
    run: Box<dyn FnOnce(ExitStatus) -> Effect<(), Never> + Send>,
    env: &Fiber,
    status: ExitStatus,
) -> DefectResult<()> {
    // Panics are caught here whatever the runtime's setting, so one
    // finalizer can not skip the rest of the drain.
    let exit = std::panic::catch_unwind(AssertUnwindSafe(move || env.exit(&run(status))))
        .map_err(Defect::from_panic)?;
    match exit {
        Exit::Success(()) => Ok(()),
        Exit::Failure(cause) => Err(cause_to_defect(cause)),
    }
}

/// A finalizer can not fail with an expected error, so its cause is all defects.
fn cause_to_defect(cause: Cause<Never>) -> Defect {
    match cause {
        Cause::Fail(never) => match never {},
        Cause::Die(defect) => defect,
        Cause::Interrupt => Defect::message("finalizer interrupted itself"),
        Cause::Then(a, b) => match (cause_to_defect(*a), cause_to_defect(*b)) {
            (Defect::Finalizers(mut first), Defect::Finalizers(rest)) => {
                first.extend(rest);
                Defect::Finalizers(first)
            }
            (first, second) => Defect::Finalizers(vec![first, second]),
        },
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.lock() {
            ScopeState::Open(stack) => format!("open ({} finalizers)", stack.len()),
            ScopeState::Closed(status) => format!("closed ({})", status),
        };
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("state", &state)
            .finish()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if let ScopeState::Open(stack) = self.state.get_mut() {
            if !stack.is_empty() {
                tracing::warn!(
                    scope = %self.id,
                    finalizers = stack.len(),
                    "scope dropped without being closed; finalizers will not run"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CancellationToken, Runtime, RuntimeConfig};

    #[test]
    fn scope_ids_are_unique() {
        let a = Scope::make();
        let b = Scope::make();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn second_close_is_a_no_op() {
        let scope = Scope::make();
        scope.add_finalizer(|_| Effect::die(Defect::message("once"))).unwrap();

        assert_eq!(scope.close(ExitStatus::Failure), Err(Defect::message("once")));
        assert_eq!(scope.close(ExitStatus::Success), Ok(()));
        assert_eq!(scope.closed_with(), Some(ExitStatus::Failure));
    }

    #[test]
    fn panicking_finalizer_does_not_stop_the_rest() {
        let scope = Scope::make();
        let ran = Arc::new(AtomicU64::new(0));

        let counter = ran.clone();
        scope
            .add_finalizer(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Effect::unit()
            })
            .unwrap();
        scope.add_finalizer(|_| panic!("release exploded")).unwrap();

        let err = scope.close(ExitStatus::Success).unwrap_err();
        assert_eq!(err, Defect::Panic("release exploded".to_string()));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finalizer_panicking_at_run_time_is_contained() {
        let runtime = Runtime::with_config(RuntimeConfig::default().with_catch_panics(false));
        let fiber = runtime.fiber(CancellationToken::new());
        let scope = Scope::make();
        let ran = Arc::new(AtomicU64::new(0));

        let counter = ran.clone();
        fiber
            .add_finalizer(&scope, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Effect::unit()
            })
            .unwrap();
        fiber
            .add_finalizer(&scope, |_| Effect::sync(|| panic!("close exploded")))
            .unwrap();

        let err = fiber.close_scope(&scope, ExitStatus::Success).unwrap_err();
        assert_eq!(err, Defect::Panic("close exploded".to_string()));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finalizer_sees_closed_scope() {
        let scope = Scope::make();
        let inner = scope.clone();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        scope
            .add_finalizer(move |_| {
                *slot.lock() = Some(inner.add_finalizer(|_| Effect::unit()));
                Effect::unit()
            })
            .unwrap();

        scope.close(ExitStatus::Success).unwrap();
        assert_eq!(*seen.lock(), Some(Err(Defect::ScopeClosed(scope.id()))));
    }
}
