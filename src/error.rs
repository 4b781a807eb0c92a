//! Error types for the effect runtime.
//!
//! Expected failures travel through an effect's typed `E` channel. Everything
//! in this module belongs to the other channel: defects, which are programming
//! errors that no retry or aggregation combinator ever recovers from.

use thiserror::Error;

use crate::runtime::ScopeId;

/// Non-recoverable runtime failures.
///
/// A defect aborts the computation that raised it. `eventually` does not
/// retry it and `all_validate` does not aggregate it; the only code that
/// observes a defect is a finalizer (through its [`ExitStatus`](crate::ExitStatus))
/// and the caller of the runtime.
///
/// # Examples
///
/// ```rust
/// use ferrous_effect::Defect;
///
/// let missing = Defect::ServiceNotFound { service: "dyn Random", name: "Random" };
/// assert_eq!(missing.to_string(), "Service not found: Random (dyn Random)");
///
/// let many = Defect::Finalizers(vec![
///     Defect::Message("disk gone".to_string()),
///     Defect::Message("socket gone".to_string()),
/// ]);
/// assert_eq!(many.to_string(), "2 finalizer(s) failed: disk gone; socket gone");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Defect {
    /// A required service is absent from the context snapshot
    #[error("Service not found: {name} ({service})")]
    ServiceNotFound {
        /// Type name of the service interface
        service: &'static str,
        /// Name the service was declared with
        name: &'static str,
    },
    /// A finalizer was added to a scope that already closed
    #[error("Scope {0} is closed")]
    ScopeClosed(ScopeId),
    /// A scoped operation ran with no ambient scope
    #[error("No scope available; wrap the effect with `scoped`")]
    NoScope,
    /// A stored service did not downcast to its declared interface
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A resource was used after the scope owning it closed
    #[error("Resource used after its scope closed: {0}")]
    UseAfterClose(String),
    /// A thunk panicked while executing
    #[error("Panic during execution: {0}")]
    Panic(String),
    /// An explicit `Effect::die`
    #[error("{0}")]
    Message(String),
    /// Several finalizers of one scope failed during close
    #[error("{} finalizer(s) failed: {}", .0.len(), join(.0))]
    Finalizers(Vec<Defect>),
}

fn join(defects: &[Defect]) -> String {
    defects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Defect {
    /// Builds a [`Defect::Message`] from anything displayable.
    pub fn message(msg: impl Into<String>) -> Self {
        Defect::Message(msg.into())
    }

    /// Folds the failures collected while closing a scope into one result.
    ///
    /// No failures is `Ok`, a single failure is reported as itself and more
    /// than one is wrapped into [`Defect::Finalizers`] in execution order.
    pub(crate) fn aggregate(mut defects: Vec<Defect>) -> DefectResult<()> {
        match defects.len() {
            0 => Ok(()),
            1 => Err(defects.remove(0)),
            _ => Err(Defect::Finalizers(defects)),
        }
    }

    /// Converts a panic payload into a defect.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Defect::Panic(msg)
    }
}

/// Result type for operations that can only fail with a defect.
///
/// # Examples
///
/// ```rust
/// use ferrous_effect::{Defect, DefectResult, Scope};
///
/// fn register(scope: &Scope) -> DefectResult<()> {
///     scope.add_finalizer(|_| ferrous_effect::Effect::unit())
/// }
///
/// let scope = Scope::make();
/// assert!(register(&scope).is_ok());
/// ```
pub type DefectResult<T> = Result<T, Defect>;
