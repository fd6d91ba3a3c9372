//! Caller-supplied cancellation and deadline for blocking collaborator calls.

use crate::error::{InvestigatorError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails fast if the caller already gave up, without starting new work.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(InvestigatorError::Cancelled("cancelled by caller".to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(InvestigatorError::DeadlineExceeded(
                    "caller deadline passed".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Run `fut` until it completes, the token is cancelled, or the deadline passes.
    pub async fn run<F: Future>(&self, what: &str, fut: F) -> Result<F::Output> {
        self.check()?;
        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(InvestigatorError::Cancelled(format!("{} cancelled by caller", what)))
            }
            _ = expiry => {
                Err(InvestigatorError::DeadlineExceeded(format!("{} exceeded caller deadline", what)))
            }
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_without_limits() {
        let ctx = CallContext::new();
        assert_eq!(ctx.run("noop", async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::new().with_cancellation(token);
        let err = ctx.run("noop", async { 7 }).await.unwrap_err();
        assert!(matches!(err, InvestigatorError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_future() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(20));
        let err = ctx
            .run("sleep", tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvestigatorError::DeadlineExceeded(_)));
    }
}
