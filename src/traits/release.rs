//! Release trait for resource cleanup.

use crate::effect::Effect;
use crate::exit::ExitStatus;
use crate::Never;

/// Trait for resources that know how to release themselves.
///
/// Values acquired with [`Effect::acquire`] register `release` on the ambient
/// scope; it runs once, in LIFO order with the scope's other finalizers, and
/// receives the status the scope closed with.
///
/// # Examples
///
/// ```
/// use ferrous_effect::{Effect, ExitStatus, Never, Release, Runtime};
/// use std::sync::Arc;
///
/// struct Connection {
///     id: u32,
/// }
///
/// impl Release for Connection {
///     fn release(&self, status: ExitStatus) -> Effect<(), Never> {
///         Effect::log(format!("closing connection {} after {}", self.id, status))
///     }
/// }
///
/// let program = Effect::<Arc<Connection>, String>::acquire(Effect::sync(|| Arc::new(Connection { id: 7 })))
///     .map(|conn| conn.id)
///     .scoped();
///
/// let (exit, logs) = Runtime::new().run_with_logs(&program);
/// assert_eq!(exit.success(), Some(7));
/// assert_eq!(logs, vec!["closing connection 7 after success"]);
/// ```
pub trait Release: Send + Sync + 'static {
    /// The cleanup effect to run when the owning scope closes.
    fn release(&self, status: ExitStatus) -> Effect<(), Never>;
}
