use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::CallError;

/// Cancellation and deadline shared by every remote call of one pass.
///
/// Cloning is cheap; clones observe the same token and deadline.
#[derive(Clone, Debug, Default)]
pub struct PassContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl PassContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// True once the caller cancelled or the deadline passed
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run one remote call under the pass' cancellation and deadline.
    ///
    /// Calls issued after cancellation return immediately without polling `call`.
    pub async fn call<T, E, F>(&self, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<CallError>,
    {
        if self.cancel.is_cancelled() {
            return Err(CallError::Cancelled.into());
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, call)
                    .await
                    .unwrap_or_else(|_| Err(CallError::DeadlineExceeded.into())),
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CallError::Cancelled.into()),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_context_skips_calls() {
        let token = CancellationToken::new();
        let ctx = PassContext::new(token.clone());
        token.cancel();

        let result: Result<(), CallError> = ctx
            .call(async { Err(CallError::Unavailable("polled".into())) })
            .await;
        assert!(matches!(result, Err(CallError::Cancelled)));
        assert!(ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_slow_calls() {
        let ctx = PassContext::default().with_timeout(Duration::from_secs(5));

        let result: Result<(), CallError> = ctx
            .call(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CallError::DeadlineExceeded)));
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn completed_calls_pass_through() {
        let ctx = PassContext::default();
        let value: Result<u32, CallError> = ctx.call(async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);
        assert!(!ctx.is_done());
    }
}
