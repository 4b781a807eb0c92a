//! Effect runtime.
//!
//! This module contains the [`Runtime`] that executes effects, the
//! [`Fiber`] execution context threaded through them and the [`Scope`]
//! finalizer registry.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::config::RuntimeConfig;
use crate::context::{Context, ContextBuilder};
use crate::effect::Effect;
use crate::exit::{Cause, Exit};
use crate::key::Tag;
use crate::observer::{Observers, RuntimeObserver, TracingObserver};

pub mod fiber;
pub mod scope;
pub use fiber::Fiber;
pub(crate) use fiber::LogSink;
pub use scope::{Scope, ScopeId};

/// State shared by every fiber of one runtime.
pub(crate) struct RuntimeShared {
    pub(crate) config: RuntimeConfig,
    pub(crate) observers: Observers,
}

impl RuntimeShared {
    pub(crate) fn new(config: RuntimeConfig, observers: Observers) -> Self {
        Self { config, observers }
    }
}

/// Executes effects.
///
/// A runtime owns the configuration, the observers and a base service
/// context. It is cheap to clone and can be shared across threads; every
/// `run*` call starts a fresh root fiber with its own log.
///
/// # Examples
///
/// ```
/// use ferrous_effect::{Cause, Effect, Runtime};
///
/// let runtime = Runtime::new();
///
/// let ok = Effect::<i32, String>::succeed(5);
/// assert_eq!(runtime.run(&ok).success(), Some(5));
///
/// let failed = Effect::<i32, String>::fail("boom".to_string());
/// assert_eq!(runtime.execute(&failed), Err(Cause::Fail("boom".to_string())));
/// ```
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<RuntimeShared>,
    services: Context,
}

impl Runtime {
    /// Runtime with default configuration, no observers and no services.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            shared: Arc::new(RuntimeShared::new(config, Observers::new())),
            services: Context::empty(),
        }
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Services every run starts with.
    pub fn services(&self) -> &Context {
        &self.services
    }

    /// Creates a root fiber for one run.
    pub fn fiber(&self, token: CancellationToken) -> Fiber {
        Fiber::new(self.shared.clone(), self.services.clone(), token, LogSink::default())
    }

    /// Runs `effect` to completion and returns its exit.
    pub fn run<A: 'static, E: 'static>(&self, effect: &Effect<A, E>) -> Exit<A, E> {
        self.fiber(CancellationToken::new()).exit(effect)
    }

    /// Runs `effect` with `context` provided over the runtime's services.
    pub fn run_with<A: 'static, E: 'static>(&self, effect: &Effect<A, E>, context: &Context) -> Exit<A, E> {
        let fiber = self.fiber(CancellationToken::new());
        fiber.with_services(fiber.services().merge(context)).exit(effect)
    }

    /// Runs `effect` and returns its exit with the ordered side-channel log.
    pub fn run_with_logs<A: 'static, E: 'static>(&self, effect: &Effect<A, E>) -> (Exit<A, E>, Vec<String>) {
        let fiber = self.fiber(CancellationToken::new());
        let exit = fiber.exit(effect);
        (exit, fiber.logs())
    }

    /// Runs `effect`, interrupting it at the next boundary once `token` is cancelled.
    pub fn run_interruptible<A: 'static, E: 'static>(
        &self,
        effect: &Effect<A, E>,
        token: &CancellationToken,
    ) -> Exit<A, E> {
        self.fiber(token.clone()).exit(effect)
    }

    /// Runs `effect` and converts its exit into a `Result`.
    pub fn execute<A: 'static, E: 'static>(&self, effect: &Effect<A, E>) -> Result<A, Cause<E>> {
        self.run(effect).into_result()
    }

    /// Runs `effect` on tokio's blocking pool.
    ///
    /// Cancelling `token` interrupts the effect at its next boundary; open
    /// scopes still close before the exit is delivered.
    #[cfg(feature = "async")]
    pub async fn run_async<A, E>(&self, effect: Effect<A, E>, token: CancellationToken) -> Exit<A, E>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let runtime = self.clone();
        match tokio::task::spawn_blocking(move || runtime.run_interruptible(&effect, &token)).await {
            Ok(exit) => exit,
            Err(join) if join.is_panic() => Exit::die(crate::Defect::from_panic(join.into_panic())),
            Err(_) => Exit::interrupt(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.shared.config)
            .field("observers", &self.shared.observers.len())
            .field("services", &self.services)
            .finish()
    }
}

/// Builder for a [`Runtime`].
///
/// # Examples
///
/// ```
/// use ferrous_effect::{Effect, Runtime, RuntimeConfig, Tag};
///
/// const PORT: Tag<u16> = Tag::new("Port");
///
/// let runtime = Runtime::builder()
///     .config(RuntimeConfig::default().with_label("api"))
///     .service_value(PORT, 8080)
///     .with_tracing()
///     .build();
///
/// let port = Effect::<u16>::service_with(PORT, |p| *p);
/// assert_eq!(runtime.run(&port).success(), Some(8080));
/// ```
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    observers: Observers,
    services: ContextBuilder,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RuntimeObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Adds a [`TracingObserver`] labelled with the configured runtime label.
    pub fn with_tracing(mut self) -> Self {
        let label = self.config.label.clone();
        self.observers.add(Arc::new(TracingObserver::with_label(label)));
        self
    }

    pub fn service<S>(mut self, tag: Tag<S>, service: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.add(tag, service);
        self
    }

    pub fn service_value<S>(mut self, tag: Tag<S>, service: S) -> Self
    where
        S: Send + Sync + 'static,
    {
        self.services.add_value(tag, service);
        self
    }

    pub fn services(mut self, context: &Context) -> Self {
        self.services.extend(context);
        self
    }

    pub fn build(self) -> Runtime {
        Runtime {
            shared: Arc::new(RuntimeShared::new(self.config, self.observers)),
            services: self.services.build(),
        }
    }
}
