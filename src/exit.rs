//! Outcomes of running an effect.

use std::fmt;

use crate::error::Defect;

/// Why an effect did not succeed.
///
/// `Fail` carries the typed, expected error. `Die` and `Interrupt` are the
/// defect channel. `Then` records two causes that happened one after another,
/// typically a failing body followed by a failing finalizer, so neither is
/// lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause<E> {
    /// Expected failure from the `E` channel.
    Fail(E),
    /// Defect.
    Die(Defect),
    /// The fiber was interrupted.
    Interrupt,
    /// Sequential composition: the left cause happened first.
    Then(Box<Cause<E>>, Box<Cause<E>>),
}

impl<E> Cause<E> {
    /// Sequences `next` after `self`.
    pub fn then(self, next: Cause<E>) -> Cause<E> {
        Cause::Then(Box::new(self), Box::new(next))
    }

    /// Transforms the expected error, leaving defects and interruptions intact.
    pub fn map<E2>(self, mut f: impl FnMut(E) -> E2) -> Cause<E2> {
        self.map_with(&mut f)
    }

    fn map_with<E2>(self, f: &mut dyn FnMut(E) -> E2) -> Cause<E2> {
        match self {
            Cause::Fail(e) => Cause::Fail(f(e)),
            Cause::Die(d) => Cause::Die(d),
            Cause::Interrupt => Cause::Interrupt,
            Cause::Then(a, b) => {
                let a = a.map_with(f);
                let b = b.map_with(f);
                Cause::Then(Box::new(a), Box::new(b))
            }
        }
    }

    /// Every expected failure, left to right.
    pub fn failures(&self) -> Vec<&E> {
        let mut out = Vec::new();
        self.walk(&mut |c| {
            if let Cause::Fail(e) = c {
                out.push(e);
            }
        });
        out
    }

    /// Every defect, left to right.
    pub fn defects(&self) -> Vec<&Defect> {
        let mut out = Vec::new();
        self.walk(&mut |c| {
            if let Cause::Die(d) = c {
                out.push(d);
            }
        });
        out
    }

    /// True if an interruption appears anywhere in the cause.
    pub fn is_interrupted(&self) -> bool {
        let mut found = false;
        self.walk(&mut |c| found |= matches!(c, Cause::Interrupt));
        found
    }

    /// True if the cause consists of expected failures only.
    ///
    /// Only such causes are eligible for retry and aggregation.
    pub fn is_failure(&self) -> bool {
        match self {
            Cause::Fail(_) => true,
            Cause::Die(_) | Cause::Interrupt => false,
            Cause::Then(a, b) => a.is_failure() && b.is_failure(),
        }
    }

    /// Returns the expected error if this is a plain `Fail`.
    pub fn into_failure(self) -> Result<E, Cause<E>> {
        match self {
            Cause::Fail(e) => Ok(e),
            other => Err(other),
        }
    }

    /// Splits a cause into its first expected failure or its non-failure part.
    ///
    /// A cause made of failures only yields the leftmost one. Any other cause
    /// drops its `Fail` leaves and keeps the defects and interruptions, which
    /// lets it change error type.
    pub fn split_failure<E2>(self) -> Result<E, Cause<E2>> {
        match self {
            Cause::Fail(e) => Ok(e),
            Cause::Die(d) => Err(Cause::Die(d)),
            Cause::Interrupt => Err(Cause::Interrupt),
            Cause::Then(a, b) => match (a.split_failure(), b.split_failure()) {
                (Ok(e), Ok(_)) => Ok(e),
                (Ok(_), Err(c)) | (Err(c), Ok(_)) => Err(c),
                (Err(a), Err(b)) => Err(Cause::Then(Box::new(a), Box::new(b))),
            },
        }
    }

    /// The payload-free classification handed to finalizers.
    ///
    /// Interruption outranks defects, defects outrank expected failures.
    pub fn status(&self) -> ExitStatus {
        if self.is_interrupted() {
            ExitStatus::Interrupted
        } else if !self.defects().is_empty() {
            ExitStatus::Defect
        } else {
            ExitStatus::Failure
        }
    }

    fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Cause<E>)) {
        match self {
            Cause::Then(a, b) => {
                a.walk(visit);
                b.walk(visit);
            }
            leaf => visit(leaf),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Fail(e) => write!(f, "{}", e),
            Cause::Die(d) => write!(f, "defect: {}", d),
            Cause::Interrupt => write!(f, "interrupted"),
            Cause::Then(a, b) => write!(f, "{}, then {}", a, b),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Cause<E> {}

impl<E> From<Defect> for Cause<E> {
    fn from(defect: Defect) -> Self {
        Cause::Die(defect)
    }
}

/// Final result of running an effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit<A, E> {
    /// The effect produced a value.
    Success(A),
    /// The effect stopped with a cause.
    Failure(Cause<E>),
}

impl<A, E> Exit<A, E> {
    pub fn succeed(value: A) -> Self {
        Exit::Success(value)
    }

    pub fn fail(error: E) -> Self {
        Exit::Failure(Cause::Fail(error))
    }

    pub fn die(defect: Defect) -> Self {
        Exit::Failure(Cause::Die(defect))
    }

    pub fn interrupt() -> Self {
        Exit::Failure(Cause::Interrupt)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Exit::Success(_))
    }

    /// See [`Cause::status`].
    pub fn status(&self) -> ExitStatus {
        match self {
            Exit::Success(_) => ExitStatus::Success,
            Exit::Failure(cause) => cause.status(),
        }
    }

    pub fn into_result(self) -> Result<A, Cause<E>> {
        match self {
            Exit::Success(a) => Ok(a),
            Exit::Failure(c) => Err(c),
        }
    }

    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Exit<B, E> {
        match self {
            Exit::Success(a) => Exit::Success(f(a)),
            Exit::Failure(c) => Exit::Failure(c),
        }
    }

    /// Returns the success value, if any.
    pub fn success(self) -> Option<A> {
        match self {
            Exit::Success(a) => Some(a),
            Exit::Failure(_) => None,
        }
    }

    /// Returns the expected error if the exit is a plain `Fail`.
    pub fn failure(self) -> Option<E> {
        match self {
            Exit::Failure(Cause::Fail(e)) => Some(e),
            _ => None,
        }
    }

    /// Sequences a cleanup result after this exit.
    ///
    /// A failed cleanup turns a success into a defect and is appended to an
    /// existing cause with [`Cause::then`].
    pub(crate) fn then_cleanup(self, cleanup: Result<(), Defect>) -> Self {
        match (self, cleanup) {
            (exit, Ok(())) => exit,
            (Exit::Success(_), Err(d)) => Exit::die(d),
            (Exit::Failure(c), Err(d)) => Exit::Failure(c.then(Cause::Die(d))),
        }
    }
}

impl<A, E> From<Result<A, Cause<E>>> for Exit<A, E> {
    fn from(result: Result<A, Cause<E>>) -> Self {
        match result {
            Ok(a) => Exit::Success(a),
            Err(c) => Exit::Failure(c),
        }
    }
}

/// How a computation ended, without its payload.
///
/// This is what exit-aware finalizers receive when their scope closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    Success,
    Failure,
    Defect,
    Interrupted,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitStatus::Success => "success",
            ExitStatus::Failure => "failure",
            ExitStatus::Defect => "defect",
            ExitStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_cause_keeps_both_sides() {
        let cause: Cause<&str> = Cause::Fail("body").then(Cause::Die(Defect::message("fin")));
        assert_eq!(cause.failures(), vec![&"body"]);
        assert_eq!(cause.defects(), vec![&Defect::message("fin")]);
        assert!(!cause.is_failure());
        assert_eq!(cause.status(), ExitStatus::Defect);
        assert_eq!(cause.to_string(), "body, then defect: fin");
    }

    #[test]
    fn split_failure_keeps_defects() {
        let pure: Cause<&str> = Cause::Fail("a").then(Cause::Fail("b"));
        assert_eq!(pure.split_failure::<()>(), Ok("a"));

        let mixed: Cause<&str> = Cause::Fail("a").then(Cause::Die(Defect::NoScope));
        assert_eq!(mixed.split_failure::<()>(), Err(Cause::Die(Defect::NoScope)));
    }

    #[test]
    fn interruption_outranks_other_causes() {
        let cause: Cause<()> = Cause::Die(Defect::NoScope).then(Cause::Interrupt);
        assert_eq!(cause.status(), ExitStatus::Interrupted);
    }

    #[test]
    fn cleanup_failure_after_success_is_a_defect() {
        let exit: Exit<i32, ()> = Exit::succeed(1).then_cleanup(Err(Defect::NoScope));
        assert_eq!(exit, Exit::die(Defect::NoScope));

        let exit: Exit<i32, &str> = Exit::fail("e").then_cleanup(Err(Defect::NoScope));
        assert_eq!(
            exit,
            Exit::Failure(Cause::Fail("e").then(Cause::Die(Defect::NoScope)))
        );
    }
}
