//! # ferrous-effect
//!
//! A small structured-effect runtime: lazy, replayable computations with a
//! typed error channel, services resolved from an immutable context, and
//! scoped resources released in deterministic LIFO order.
//!
//! ## Features
//!
//! - **Deferred computations**: an [`Effect`] is a description; nothing runs
//!   until a [`Runtime`] executes it, and it can be executed again
//! - **Two error channels**: expected failures of type `E` are retried and
//!   aggregated; [`Defect`]s are not
//! - **Service context**: [`Tag`]-declared services, innermost `provide` wins
//! - **Scopes**: finalizers run exactly once, most recent first, whatever the
//!   exit
//! - **Explicit execution context**: every thunk receives its [`Fiber`]; no
//!   thread-local state
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_effect::{Effect, Runtime, Scope};
//!
//! fn file(fd: u32) -> Effect<u32, String> {
//!     Effect::acquire_release(
//!         Effect::log(format!("open {}", fd)).map(move |_| fd),
//!         |fd| Effect::log(format!("close {}", fd)),
//!     )
//! }
//!
//! // file 1 is bound to the inner boundary, file 2 to the outer one
//! let program = Effect::<Scope, String>::scope()
//!     .flat_map(|outer| {
//!         file(1)
//!             .and_then(file(2).in_scope(&outer))
//!             .scoped()
//!             .and_then(Effect::log("hi!"))
//!     })
//!     .scoped();
//!
//! let (exit, logs) = Runtime::new().run_with_logs(&program);
//! assert!(exit.is_success());
//! assert_eq!(logs, vec!["open 1", "open 2", "close 1", "hi!", "close 2"]);
//! ```
//!
//! ## Error Channels
//!
//! ```rust
//! use ferrous_effect::{all_validate, Effect, Runtime};
//!
//! let entries = (0..10).map(|i| {
//!     if i % 2 == 1 {
//!         Effect::<i32, String>::fail(format!("odd {}", i))
//!     } else {
//!         Effect::succeed(i)
//!     }
//! });
//!
//! let errors = Runtime::new().run(&all_validate(entries)).failure().unwrap();
//! assert_eq!(errors, ["odd 1", "odd 3", "odd 5", "odd 7", "odd 9"]);
//! ```
//!
//! ## Cargo Features
//!
//! - `async`: [`Runtime::run_async`] and async cancellation helpers (tokio)
//! - `config`: JSON runtime configuration (serde)
//! - `ahash`: faster hashing for service maps

/// The error type of effects that can not fail.
pub type Never = std::convert::Infallible;

// Module declarations
pub mod cancellation;
pub mod config;
pub mod context;
pub mod effect;
pub mod error;
pub mod exit;
pub mod host;
pub mod key;
pub mod members;
pub mod observer;
pub mod runtime;
pub mod testing;
pub mod traits;

// Internal modules
mod internal;

// Re-export core types
pub use cancellation::CancellationToken;
pub use config::{ConfigError, ConfigSource, ConfigValue, EnvironmentConfigSource, MapConfigSource, RuntimeConfig};
pub use context::{resolve, Context, ContextBuilder};
pub use effect::{all_partitioned, all_validate, eventually, Effect};
pub use error::{Defect, DefectResult};
pub use exit::{Cause, Exit, ExitStatus};
pub use key::{ServiceKey, Tag};
pub use members::ServiceMembers;
pub use observer::{MetricsObserver, RuntimeObserver, TracingObserver};
pub use runtime::{Fiber, Runtime, RuntimeBuilder, Scope, ScopeId};
pub use testing::{execute, execute_expecting_log};
pub use traits::Release;
