//! Diagnostic observers for runtime events.
//!
//! Observers are notified about scope lifecycles, finalizer failures, retries
//! and missing services. They are registered on a [`Runtime`](crate::Runtime)
//! and shared by every fiber it starts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Defect;
use crate::exit::ExitStatus;
use crate::key::ServiceKey;
use crate::runtime::ScopeId;

/// Observer trait for runtime events.
///
/// Calls are made synchronously on the executing fiber. Keep implementations
/// lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_effect::{ExitStatus, Runtime, RuntimeObserver, ScopeId};
/// use std::sync::Arc;
///
/// struct PrintObserver;
///
/// impl RuntimeObserver for PrintObserver {
///     fn scope_opened(&self, scope: ScopeId) {
///         println!("open {}", scope);
///     }
///
///     fn scope_closed(&self, scope: ScopeId, status: ExitStatus, finalizers: usize) {
///         println!("close {} ({}) ran {} finalizers", scope, status, finalizers);
///     }
/// }
///
/// let runtime = Runtime::builder().observer(Arc::new(PrintObserver)).build();
/// ```
pub trait RuntimeObserver: Send + Sync {
    /// A `scoped` boundary created a fresh scope.
    fn scope_opened(&self, _scope: ScopeId) {}

    /// A finalizer was registered on a scope.
    fn finalizer_added(&self, _scope: ScopeId) {}

    /// A scope finished closing after running `finalizers` finalizers.
    fn scope_closed(&self, _scope: ScopeId, _status: ExitStatus, _finalizers: usize) {}

    /// A finalizer failed during close. Later finalizers still run.
    fn finalizer_failed(&self, _scope: ScopeId, _defect: &Defect) {}

    /// A retrying combinator is about to start attempt number `attempt` (1-based).
    fn retrying(&self, _attempt: u64) {}

    /// A service lookup failed.
    fn service_missing(&self, _key: &ServiceKey) {}
}

/// Collection of observers for efficient notification.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn RuntimeObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn RuntimeObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn scope_opened(&self, scope: ScopeId) {
        for observer in &self.observers {
            observer.scope_opened(scope);
        }
    }

    #[inline]
    pub(crate) fn finalizer_added(&self, scope: ScopeId) {
        for observer in &self.observers {
            observer.finalizer_added(scope);
        }
    }

    #[inline]
    pub(crate) fn scope_closed(&self, scope: ScopeId, status: ExitStatus, finalizers: usize) {
        for observer in &self.observers {
            observer.scope_closed(scope, status, finalizers);
        }
    }

    #[inline]
    pub(crate) fn finalizer_failed(&self, scope: ScopeId, defect: &Defect) {
        for observer in &self.observers {
            observer.finalizer_failed(scope, defect);
        }
    }

    #[inline]
    pub(crate) fn retrying(&self, attempt: u64) {
        for observer in &self.observers {
            observer.retrying(attempt);
        }
    }

    #[inline]
    pub(crate) fn service_missing(&self, key: &ServiceKey) {
        for observer in &self.observers {
            observer.service_missing(key);
        }
    }
}

/// Built-in observer that emits every event through `tracing`.
///
/// Scope lifecycle events are logged at `debug`, retries at `trace` and
/// failures at `warn`.
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::with_label("ferrous-effect")
    }

    /// Creates a tracing observer whose events carry `label`.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeObserver for TracingObserver {
    fn scope_opened(&self, scope: ScopeId) {
        tracing::debug!(runtime = %self.label, %scope, "scope opened");
    }

    fn finalizer_added(&self, scope: ScopeId) {
        tracing::trace!(runtime = %self.label, %scope, "finalizer added");
    }

    fn scope_closed(&self, scope: ScopeId, status: ExitStatus, finalizers: usize) {
        tracing::debug!(runtime = %self.label, %scope, %status, finalizers, "scope closed");
    }

    fn finalizer_failed(&self, scope: ScopeId, defect: &Defect) {
        tracing::warn!(runtime = %self.label, %scope, error = %defect, "finalizer failed");
    }

    fn retrying(&self, attempt: u64) {
        tracing::trace!(runtime = %self.label, attempt, "retrying");
    }

    fn service_missing(&self, key: &ServiceKey) {
        tracing::warn!(runtime = %self.label, service = %key, "service not found");
    }
}

/// Counting observer for tests and lightweight metrics.
///
/// # Examples
///
/// ```
/// use ferrous_effect::{Effect, MetricsObserver, Runtime};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let runtime = Runtime::builder().observer(metrics.clone()).build();
///
/// let program = Effect::<(), String>::add_finalizer(|_| Effect::unit()).scoped();
/// assert!(runtime.run(&program).is_success());
///
/// assert_eq!(metrics.scopes_opened(), 1);
/// assert_eq!(metrics.finalizers_run(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MetricsObserver {
    scopes_opened: AtomicU64,
    scopes_closed: AtomicU64,
    finalizers_added: AtomicU64,
    finalizers_run: AtomicU64,
    finalizer_failures: AtomicU64,
    retries: AtomicU64,
    missing_services: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes_opened(&self) -> u64 {
        self.scopes_opened.load(Ordering::Relaxed)
    }

    pub fn scopes_closed(&self) -> u64 {
        self.scopes_closed.load(Ordering::Relaxed)
    }

    pub fn finalizers_added(&self) -> u64 {
        self.finalizers_added.load(Ordering::Relaxed)
    }

    pub fn finalizers_run(&self) -> u64 {
        self.finalizers_run.load(Ordering::Relaxed)
    }

    pub fn finalizer_failures(&self) -> u64 {
        self.finalizer_failures.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn missing_services(&self) -> u64 {
        self.missing_services.load(Ordering::Relaxed)
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.scopes_opened,
            &self.scopes_closed,
            &self.finalizers_added,
            &self.finalizers_run,
            &self.finalizer_failures,
            &self.retries,
            &self.missing_services,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl RuntimeObserver for MetricsObserver {
    fn scope_opened(&self, _scope: ScopeId) {
        self.scopes_opened.fetch_add(1, Ordering::Relaxed);
    }

    fn finalizer_added(&self, _scope: ScopeId) {
        self.finalizers_added.fetch_add(1, Ordering::Relaxed);
    }

    fn scope_closed(&self, _scope: ScopeId, _status: ExitStatus, finalizers: usize) {
        self.scopes_closed.fetch_add(1, Ordering::Relaxed);
        self.finalizers_run.fetch_add(finalizers as u64, Ordering::Relaxed);
    }

    fn finalizer_failed(&self, _scope: ScopeId, _defect: &Defect) {
        self.finalizer_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn retrying(&self, _attempt: u64) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn service_missing(&self, _key: &ServiceKey) {
        self.missing_services.fetch_add(1, Ordering::Relaxed);
    }
}
