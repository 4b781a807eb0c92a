//! Explicit execution context.
//!
//! A [`Fiber`] is handed to every thunk while an effect runs. It carries the
//! service snapshot, the ambient scope, the cancellation token and the log
//! sink, so nothing about the current execution lives in thread-local state.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::cancellation::CancellationToken;
use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::effect::Effect;
use crate::error::{Defect, DefectResult};
use crate::exit::{Cause, Exit, ExitStatus};
use crate::internal::Finalizer;
use crate::key::Tag;
use crate::observer::Observers;
use crate::Never;
use super::{RuntimeShared, Scope};

static DETACHED: Lazy<Arc<RuntimeShared>> =
    Lazy::new(|| Arc::new(RuntimeShared::new(RuntimeConfig::default(), Observers::new())));

/// Ordered side-channel log of one run.
#[derive(Clone, Default)]
pub(crate) struct LogSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogSink {
    pub(crate) fn push(&self, line: String) {
        self.lines.lock().push(line);
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

/// Execution context of a running effect.
///
/// Fibers are cheap to clone. Derived fibers (for a `provide`, a `scoped`
/// boundary, or a finalizer) share the runtime, token and log sink of their
/// parent.
///
/// # Examples
///
/// Generator-style sequencing with `?`:
///
/// ```
/// use ferrous_effect::{Effect, Runtime};
///
/// let program = Effect::<i32, String>::gen(|fx| {
///     let a = fx.run(&Effect::succeed(20))?;
///     let b = fx.run(&Effect::succeed(22))?;
///     fx.run(&Effect::log(format!("sum {}", a + b)))?;
///     Ok(a + b)
/// });
///
/// let (exit, logs) = Runtime::new().run_with_logs(&program);
/// assert_eq!(exit.success(), Some(42));
/// assert_eq!(logs, vec!["sum 42"]);
/// ```
#[derive(Clone)]
pub struct Fiber {
    shared: Arc<RuntimeShared>,
    services: Context,
    scope: Option<Scope>,
    token: CancellationToken,
    interruptible: bool,
    logs: LogSink,
}

impl Fiber {
    pub(crate) fn new(
        shared: Arc<RuntimeShared>,
        services: Context,
        token: CancellationToken,
        logs: LogSink,
    ) -> Self {
        Self {
            shared,
            services,
            scope: None,
            token,
            interruptible: true,
            logs,
        }
    }

    /// A fiber with default configuration, no services and its own log.
    pub fn detached() -> Self {
        Self::new(DETACHED.clone(), Context::empty(), CancellationToken::new(), LogSink::default())
    }

    /// Runs `effect` on this fiber, returning its value or cause.
    pub fn run<A: 'static, E: 'static>(&self, effect: &Effect<A, E>) -> Result<A, Cause<E>> {
        self.exit(effect).into_result()
    }

    /// Runs `effect` on this fiber, returning its exit.
    pub fn exit<A: 'static, E: 'static>(&self, effect: &Effect<A, E>) -> Exit<A, E> {
        effect.run_on(self)
    }

    /// The current service snapshot.
    pub fn services(&self) -> &Context {
        &self.services
    }

    /// Resolves a service from the current snapshot.
    pub fn service<S>(&self, tag: Tag<S>) -> DefectResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.get(tag).map_err(|defect| {
            if self.shared.observers.has_observers() {
                self.shared.observers.service_missing(&tag.key());
            }
            defect
        })
    }

    /// The ambient scope, if the fiber runs inside a boundary.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// The ambient scope, or [`Defect::NoScope`].
    pub fn require_scope(&self) -> DefectResult<&Scope> {
        self.scope.as_ref().ok_or(Defect::NoScope)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True when the fiber should stop at its next effect boundary.
    pub fn is_interrupted(&self) -> bool {
        self.interruptible && self.shared.config.check_interrupts && self.token.is_cancelled()
    }

    /// Appends a line to the run's side-channel log.
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        if self.shared.config.echo_logs {
            tracing::info!(runtime = %self.shared.config.label, "{}", line);
        }
        self.logs.push(line);
    }

    /// Lines logged so far in this run.
    pub fn logs(&self) -> Vec<String> {
        self.logs.snapshot()
    }

    /// Registers a finalizer on `scope` that will run with this fiber's
    /// services and log.
    pub fn add_finalizer<F>(&self, scope: &Scope, finalizer: F) -> DefectResult<()>
    where
        F: FnOnce(ExitStatus) -> Effect<(), Never> + Send + 'static,
    {
        scope.push(Finalizer {
            run: Box::new(finalizer),
            env: Some(self.for_finalizers()),
        })?;
        if self.shared.observers.has_observers() {
            self.shared.observers.finalizer_added(scope.id());
        }
        Ok(())
    }

    /// Closes `scope`, running finalizers added outside any fiber on this one.
    pub fn close_scope(&self, scope: &Scope, status: ExitStatus) -> DefectResult<()> {
        scope.close_on(self, status)
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.shared.observers
    }

    pub(crate) fn with_services(&self, services: Context) -> Self {
        Self { services, ..self.clone() }
    }

    pub(crate) fn with_scope(&self, scope: Scope) -> Self {
        Self { scope: Some(scope), ..self.clone() }
    }

    /// Same fiber with interruption disabled, for resource acquisition.
    pub(crate) fn uninterruptible(&self) -> Self {
        Self { interruptible: false, ..self.clone() }
    }

    /// Fiber that finalizers run on: no ambient scope, not interruptible.
    pub(crate) fn for_finalizers(&self) -> Self {
        Self {
            scope: None,
            interruptible: false,
            ..self.clone()
        }
    }

    /// Runs user code, converting a panic into a defect when configured to.
    pub(crate) fn guard<T>(&self, f: impl FnOnce() -> T) -> Result<T, Defect> {
        if self.shared.config.catch_panics {
            std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(Defect::from_panic)
        } else {
            Ok(f())
        }
    }
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber")
            .field("runtime", &self.shared.config.label)
            .field("services", &self.services)
            .field("scope", &self.scope.as_ref().map(Scope::id))
            .field("interruptible", &self.interruptible)
            .finish()
    }
}
