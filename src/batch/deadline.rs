//! Deadline context: the cancellable, time-bounded scope shared by one batch.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ItemFailure;

/// Time budget and cancellation signal handed to every item operation of a batch.
///
/// Clones share the same deadline and token. The context is advisory: it never
/// interrupts an operation by itself. Operations observe it through
/// [`check`](Self::check), [`expired`](Self::expired) or [`bound`](Self::bound).
#[derive(Clone, Debug)]
pub struct DeadlineContext {
    deadline: Instant,
    budget: Duration,
    token: CancellationToken,
}

impl DeadlineContext {
    /// Start a context expiring `budget` from now
    pub fn new(budget: Duration) -> Self {
        Self::with_token(budget, CancellationToken::new())
    }

    /// Start a context that is also cancelled when `parent` is
    pub fn with_parent(budget: Duration, parent: &CancellationToken) -> Self {
        Self::with_token(budget, parent.child_token())
    }

    fn with_token(budget: Duration, token: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + budget,
            budget,
            token,
        }
    }

    /// Instant at which the batch times out
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Total budget the context was created with
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before the deadline (zero once passed)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Cancel the batch; every clone observes it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called, here or on the parent token
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the deadline passed or the batch was cancelled
    pub fn is_expired(&self) -> bool {
        self.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Fail with `TimeoutAborted` if the context is already over
    pub fn check(&self) -> Result<(), ItemFailure> {
        if self.is_expired() {
            Err(self.abort_failure())
        } else {
            Ok(())
        }
    }

    /// Resolves once the deadline passes or the batch is cancelled
    pub async fn expired(&self) {
        tokio::select! {
            _ = tokio::time::sleep_until(self.deadline) => {}
            _ = self.token.cancelled() => {}
        }
    }

    /// Run `operation` until it finishes or the context expires, whichever comes first.
    ///
    /// On expiry the operation future is dropped at its current await point and
    /// `TimeoutAborted` is returned.
    pub async fn bound<F, T>(&self, operation: F) -> Result<T, ItemFailure>
    where
        F: Future<Output = Result<T, ItemFailure>>,
    {
        self.check()?;
        tokio::select! {
            result = operation => result,
            _ = self.expired() => Err(self.abort_failure()),
        }
    }

    /// The failure reported by items cut short by this context
    pub fn abort_failure(&self) -> ItemFailure {
        if self.is_cancelled() && Instant::now() < self.deadline {
            ItemFailure::timeout("batch was cancelled")
        } else {
            ItemFailure::timeout(format!(
                "batch deadline of {}s exceeded",
                self.budget.as_secs_f64()
            ))
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemErrorKind;

    #[tokio::test]
    async fn fresh_context_is_live() {
        let ctx = DeadlineContext::new(Duration::from_secs(60));
        assert!(!ctx.is_expired());
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining() > Duration::from_secs(59));
        assert_eq!(ctx.budget(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn bound_returns_operation_result_in_time() {
        let ctx = DeadlineContext::new(Duration::from_secs(5));
        let value = ctx.bound(async { Ok::<_, ItemFailure>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn bound_aborts_slow_operation_at_deadline() {
        let ctx = DeadlineContext::new(Duration::from_millis(30));
        let started = std::time::Instant::now();

        let err = ctx
            .bound(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ItemFailure>(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, ItemErrorKind::TimeoutAborted);
        assert!(err.message.contains("deadline"), "{}", err.message);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn cancel_is_seen_by_clones() {
        let ctx = DeadlineContext::new(Duration::from_secs(60));
        let clone = ctx.clone();

        ctx.cancel();

        assert!(clone.is_cancelled());
        let err = clone.check().unwrap_err();
        assert_eq!(err.kind, ItemErrorKind::TimeoutAborted);
        assert_eq!(err.message, "batch was cancelled");
    }

    #[tokio::test]
    async fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let ctx = DeadlineContext::with_parent(Duration::from_secs(60), &parent);

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.expired().await })
        };
        parent.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("expired() should resolve after parent cancel")
            .unwrap();
        assert!(ctx.is_expired());
    }

    #[tokio::test]
    async fn cancelling_child_leaves_parent_alone() {
        let parent = CancellationToken::new();
        let ctx = DeadlineContext::with_parent(Duration::from_secs(60), &parent);
        ctx.cancel();
        assert!(!parent.is_cancelled());
    }
}
