//! Interruption tokens.
//!
//! A fiber carries a [`CancellationToken`]. Cancelling it interrupts the
//! fiber at its next effect boundary; scopes opened by that fiber still close
//! and run their finalizers, which observe [`ExitStatus::Interrupted`](crate::ExitStatus).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Flag {
    raised: AtomicBool,
    raised_at: Mutex<Option<Instant>>,
}

impl Flag {
    fn raise(&self) {
        let mut raised_at = self.raised_at.lock();
        if !self.raised.swap(true, Ordering::AcqRel) {
            *raised_at = Some(Instant::now());
        }
    }

    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Requests interruption of the fibers holding it.
///
/// A token owns one flag and observes the flags of every token it was
/// derived from, so interrupting a parent reaches all of its children while
/// a child can be interrupted alone.
///
/// # Examples
///
/// ```
/// use ferrous_effect::{CancellationToken, Effect, Runtime};
///
/// let token = CancellationToken::new();
/// token.cancel();
///
/// let exit = Runtime::new().run_interruptible(&Effect::<u8>::succeed(1), &token);
/// assert!(exit.into_result().unwrap_err().is_interrupted());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    // Own flag first, then ancestors from nearest to root.
    flags: Arc<[Arc<Flag>]>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flags: Arc::from(vec![Arc::new(Flag::default())]),
        }
    }

    /// Derives a token that is interrupted with this one, or on its own.
    ///
    /// ```
    /// use ferrous_effect::CancellationToken;
    ///
    /// let request = CancellationToken::new();
    /// let step = request.child_token();
    ///
    /// request.cancel();
    /// assert!(step.is_cancelled());
    /// ```
    pub fn child_token(&self) -> Self {
        let mut flags = Vec::with_capacity(self.flags.len() + 1);
        flags.push(Arc::new(Flag::default()));
        flags.extend(self.flags.iter().cloned());
        Self { flags: Arc::from(flags) }
    }

    /// Interrupts every fiber observing this token. Repeated calls keep the
    /// first cancellation time.
    pub fn cancel(&self) {
        self.own().raise();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| flag.is_raised())
    }

    /// When interruption was first requested on this token or an ancestor.
    pub fn cancelled_at(&self) -> Option<Instant> {
        self.flags
            .iter()
            .filter_map(|flag| *flag.raised_at.lock())
            .min()
    }

    /// Number of tokens this one was derived from.
    pub fn depth(&self) -> usize {
        self.flags.len() - 1
    }

    fn own(&self) -> &Flag {
        &self.flags[0]
    }

    /// Completes once the token is cancelled.
    #[cfg(feature = "async")]
    pub async fn cancelled(&self) {
        let mut tick = tokio::time::interval(Duration::from_millis(1));
        while !self.is_cancelled() {
            tick.tick().await;
        }
    }

    /// Cancels the token once `delay` passes.
    ///
    /// Each call spawns one OS thread that sleeps for `delay`. The thread only
    /// holds a weak reference, so it neither keeps a dropped token alive nor
    /// cancels anything after the last clone is gone. Inside a tokio runtime
    /// prefer `with_timeout` (feature `async`), which uses a task instead.
    pub fn cancel_after(&self, delay: Duration) {
        let flag = Arc::downgrade(&self.flags[0]);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if let Some(flag) = flag.upgrade() {
                flag.raise();
            }
        });
    }

    /// A fresh token that cancels itself after `timeout` on the tokio runtime.
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(feature = "async")]
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        let flag = token.flags[0].clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            flag.raise();
        });
        token
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Effect, ExitStatus, Runtime};

    #[test]
    fn cancelling_a_parent_interrupts_descendants_only() {
        let request = CancellationToken::new();
        let step = request.child_token();
        let sub_step = step.child_token();
        let sibling = request.child_token();

        step.cancel();
        assert!(step.is_cancelled());
        assert!(sub_step.is_cancelled());
        assert!(!request.is_cancelled());
        assert!(!sibling.is_cancelled());

        request.cancel();
        assert!(sibling.is_cancelled());
        assert_eq!(sub_step.depth(), 2);
    }

    #[test]
    fn first_cancellation_time_is_kept() {
        let token = CancellationToken::new();
        assert_eq!(token.cancelled_at(), None);

        token.cancel();
        let first = token.cancelled_at();
        std::thread::sleep(Duration::from_millis(2));
        token.cancel();

        assert!(first.is_some());
        assert_eq!(token.cancelled_at(), first);
        assert_eq!(token.child_token().cancelled_at(), first);
    }

    #[test]
    fn child_token_interrupts_a_run() {
        let request = CancellationToken::new();
        let run = request.child_token();
        request.cancel();

        let exit = Runtime::new().run_interruptible(&Effect::<u8, ()>::succeed(1), &run);
        assert_eq!(exit.status(), ExitStatus::Interrupted);
    }

    #[test]
    fn cancel_after_fires_from_another_thread() {
        let token = CancellationToken::new();
        token.cancel_after(Duration::from_millis(5));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !token.is_cancelled() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_after_reaches_derived_tokens() {
        let request = CancellationToken::new();
        let step = request.child_token();
        request.cancel_after(Duration::from_millis(5));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !step.is_cancelled() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(step.is_cancelled());
        assert!(request.cancelled_at().is_some());
    }

    #[test]
    fn cancel_after_does_not_keep_the_token_alive() {
        let token = CancellationToken::new();
        let weak = Arc::downgrade(&token.flags[0]);
        token.cancel_after(Duration::from_secs(60));

        drop(token);
        assert!(weak.upgrade().is_none());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn timeout_token_cancels_itself() {
        let token = CancellationToken::with_timeout(Duration::from_millis(10));
        assert!(!token.is_cancelled());

        token.cancelled().await;
        assert!(token.cancelled_at().is_some());
    }
}
