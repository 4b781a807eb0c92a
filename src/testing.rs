//! Helpers for running effects in tests.
//!
//! [`execute`] and [`execute_expecting_log`] run an effect on a default
//! [`Runtime`]; [`TestRun`] bundles the exit and the side-channel log with
//! assertion methods that panic with a readable message.

use std::fmt::Debug;

use crate::context::Context;
use crate::effect::Effect;
use crate::exit::{Cause, Exit, ExitStatus};
use crate::runtime::Runtime;

/// Runs `effect` with `context` and returns its value or cause.
pub fn execute<A: 'static, E: 'static>(effect: &Effect<A, E>, context: &Context) -> Result<A, Cause<E>> {
    Runtime::new().run_with(effect, context).into_result()
}

/// Runs `effect` and returns its exit together with the ordered log.
pub fn execute_expecting_log<A: 'static, E: 'static>(effect: &Effect<A, E>) -> (Exit<A, E>, Vec<String>) {
    Runtime::new().run_with_logs(effect)
}

/// Outcome of one test run.
///
/// # Examples
///
/// ```
/// use ferrous_effect::testing::TestRun;
/// use ferrous_effect::Effect;
///
/// let program = Effect::<(), String>::log("computing").map(|_| 3);
///
/// TestRun::run(&program)
///     .assert_success(&3)
///     .assert_logs(&["computing"]);
/// ```
#[derive(Debug)]
pub struct TestRun<A, E> {
    exit: Exit<A, E>,
    logs: Vec<String>,
}

impl<A: 'static, E: 'static> TestRun<A, E> {
    pub fn run(effect: &Effect<A, E>) -> Self {
        let (exit, logs) = execute_expecting_log(effect);
        Self { exit, logs }
    }

    /// Runs `effect` with `context` provided.
    pub fn run_with(effect: &Effect<A, E>, context: &Context) -> Self {
        Self::run(&effect.clone().provide(context.clone()))
    }

    /// Runs `effect` on `runtime`.
    pub fn run_on(runtime: &Runtime, effect: &Effect<A, E>) -> Self {
        let (exit, logs) = runtime.run_with_logs(effect);
        Self { exit, logs }
    }
}

impl<A, E> TestRun<A, E> {
    pub fn exit(&self) -> &Exit<A, E> {
        &self.exit
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn into_exit(self) -> Exit<A, E> {
        self.exit
    }

    pub fn status(&self) -> ExitStatus {
        self.exit.status()
    }

    #[track_caller]
    pub fn assert_logs<S: AsRef<str>>(&self, expected: &[S]) -> &Self {
        let expected: Vec<&str> = expected.iter().map(AsRef::as_ref).collect();
        let actual: Vec<&str> = self.logs.iter().map(String::as_str).collect();
        assert_eq!(actual, expected, "unexpected log lines");
        self
    }

    #[track_caller]
    pub fn assert_status(&self, expected: ExitStatus) -> &Self {
        assert_eq!(self.status(), expected, "unexpected exit status");
        self
    }
}

impl<A: PartialEq + Debug, E: Debug> TestRun<A, E> {
    #[track_caller]
    pub fn assert_success(&self, expected: &A) -> &Self {
        match &self.exit {
            Exit::Success(value) => assert_eq!(value, expected, "unexpected success value"),
            Exit::Failure(cause) => panic!("expected success, got {:?}", cause),
        }
        self
    }
}

impl<A: Debug, E: PartialEq + Debug> TestRun<A, E> {
    #[track_caller]
    pub fn assert_failure(&self, expected: &E) -> &Self {
        match &self.exit {
            Exit::Failure(Cause::Fail(error)) => assert_eq!(error, expected, "unexpected failure"),
            other => panic!("expected failure {:?}, got {:?}", expected, other),
        }
        self
    }
}
