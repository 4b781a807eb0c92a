//! Retry and aggregation combinators.
//!
//! All of them treat the two error channels differently: expected failures
//! are retried or collected, while defects and interruptions stop the
//! combinator immediately and propagate unchanged.

use crate::exit::{Cause, Exit};
use crate::Never;
use super::Effect;

impl<A: 'static, E: 'static> Effect<A, E> {
    /// Re-runs the effect after every expected failure until it succeeds.
    ///
    /// The failure is discarded and there is no bound or backoff; wrap the
    /// effect with [`retry_n`](Effect::retry_n) when a limit is needed.
    /// Each attempt re-executes the whole effect, so a [`suspend`](Effect::suspend)ed
    /// thunk is rebuilt every time.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_effect::{Effect, Runtime};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    ///
    /// let attempts = Arc::new(AtomicU32::new(0));
    /// let counter = attempts.clone();
    /// let flaky = Effect::<&str, String>::suspend(move || {
    ///     if counter.fetch_add(1, Ordering::SeqCst) < 3 {
    ///         Effect::fail("not yet".to_string())
    ///     } else {
    ///         Effect::succeed("done")
    ///     }
    /// });
    ///
    /// assert_eq!(Runtime::new().run(&flaky.eventually()).success(), Some("done"));
    /// assert_eq!(attempts.load(Ordering::SeqCst), 4);
    /// ```
    pub fn eventually(self) -> Effect<A, Never> {
        Effect::from_fiber(move |fx| {
            let mut attempt: u64 = 1;
            loop {
                match self.run_on(fx) {
                    Exit::Success(a) => return Exit::Success(a),
                    Exit::Failure(cause) => match cause.split_failure() {
                        Ok(_) => {
                            attempt += 1;
                            tracing::trace!(attempt, "retrying after expected failure");
                            fx.observers().retrying(attempt);
                        }
                        Err(cause) => return Exit::Failure(cause),
                    },
                }
            }
        })
    }

    /// Retries expected failures at most `retries` times.
    ///
    /// The effect runs up to `retries + 1` times; the last failure is returned
    /// if none succeeds.
    pub fn retry_n(self, retries: u64) -> Effect<A, E> {
        Effect::from_fiber(move |fx| {
            let mut attempt: u64 = 1;
            loop {
                match self.run_on(fx) {
                    Exit::Failure(cause) if cause.is_failure() && attempt <= retries => {
                        attempt += 1;
                        tracing::trace!(attempt, retries, "retrying after expected failure");
                        fx.observers().retrying(attempt);
                    }
                    exit => return exit,
                }
            }
        })
    }
}

/// Free-function form of [`Effect::eventually`].
pub fn eventually<A: 'static, E: 'static>(effect: Effect<A, E>) -> Effect<A, Never> {
    effect.eventually()
}

/// Runs every effect in order and collects either all values or all errors.
///
/// An expected failure never stops the remaining entries. On success the
/// values come back in input order; otherwise the error of each failed entry,
/// in input order, and nothing for the entries that succeeded. A defect or
/// interruption in any entry aborts at once.
///
/// # Examples
///
/// ```
/// use ferrous_effect::{all_validate, Effect, Runtime};
///
/// let checks = (0..4).map(|i| {
///     if i % 2 == 1 {
///         Effect::<i32, String>::fail(format!("odd {}", i))
///     } else {
///         Effect::succeed(i)
///     }
/// });
///
/// let exit = Runtime::new().run(&all_validate(checks));
/// assert_eq!(exit.failure(), Some(vec!["odd 1".to_string(), "odd 3".to_string()]));
/// ```
pub fn all_validate<A, E, I>(effects: I) -> Effect<Vec<A>, Vec<E>>
where
    A: 'static,
    E: 'static,
    I: IntoIterator<Item = Effect<A, E>>,
{
    let effects: Vec<Effect<A, E>> = effects.into_iter().collect();
    Effect::from_fiber(move |fx| {
        let mut successes = Vec::with_capacity(effects.len());
        let mut failures = Vec::new();
        for effect in &effects {
            match effect.run_on(fx) {
                Exit::Success(a) => successes.push(a),
                Exit::Failure(cause) => match cause.split_failure() {
                    Ok(e) => failures.push(e),
                    Err(cause) => return Exit::Failure(cause),
                },
            }
        }
        if failures.is_empty() {
            Exit::Success(successes)
        } else {
            Exit::Failure(Cause::Fail(failures))
        }
    })
}

/// Runs every effect in order and splits the outcomes into values and errors.
///
/// Expected failures never fail the result; both lists keep input order. A
/// defect or interruption in any entry aborts at once.
pub fn all_partitioned<A, E, I>(effects: I) -> Effect<(Vec<A>, Vec<E>), Never>
where
    A: 'static,
    E: 'static,
    I: IntoIterator<Item = Effect<A, E>>,
{
    let effects: Vec<Effect<A, E>> = effects.into_iter().collect();
    Effect::from_fiber(move |fx| {
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for effect in &effects {
            match effect.run_on(fx) {
                Exit::Success(a) => successes.push(a),
                Exit::Failure(cause) => match cause.split_failure() {
                    Ok(e) => failures.push(e),
                    Err(cause) => return Exit::Failure(cause),
                },
            }
        }
        Exit::Success((successes, failures))
    })
}
