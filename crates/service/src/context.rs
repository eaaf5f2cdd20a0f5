//! Per-operation deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::ServiceError;

/// Caller-supplied limits for a single store operation.
///
/// When the token fires or the deadline passes, the future handed to `run` is
/// dropped. Writers pass only their pre-commit work to `run` and commit
/// outside it, so `Cancelled` never hides a write that already landed.
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl OpContext {
    /// No deadline, fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that can cancel every operation run under this context.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Cancelled` when the token has fired or the deadline has passed.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled("operation cancelled".into()));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ServiceError::Cancelled("deadline exceeded".into()));
        }
        Ok(())
    }

    /// Drive `fut` unless cancellation or the deadline wins first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled("cancelled before start".into()));
        }
        let expired = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled("operation cancelled".into())),
            _ = expired => Err(ServiceError::Cancelled("deadline exceeded".into())),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_results() {
        let ctx = OpContext::new();
        let v = ctx.run(async { Ok::<_, ServiceError>(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let ctx = OpContext::new();
        ctx.token().cancel();
        let res = ctx.run(async { Ok::<_, ServiceError>(()) }).await;
        assert!(matches!(res, Err(ServiceError::Cancelled(_))));
    }

    #[tokio::test]
    async fn deadline_beats_slow_future() {
        let ctx = OpContext::with_timeout(Duration::from_millis(20));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ServiceError>(())
            })
            .await;
        assert!(matches!(res, Err(ServiceError::Cancelled(m)) if m.contains("deadline")));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_mid_flight() {
        let ctx = OpContext::new();
        let token = ctx.token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ServiceError>(())
            })
            .await;
        assert!(matches!(res, Err(ServiceError::Cancelled(_))));
    }

    #[tokio::test]
    async fn check_reports_expiry_and_cancellation() {
        assert!(OpContext::new().check().is_ok());
        let expired = OpContext::new().with_deadline(Instant::now());
        assert!(matches!(expired.check(), Err(ServiceError::Cancelled(m)) if m.contains("deadline")));
        let ctx = OpContext::new();
        ctx.token().cancel();
        assert!(ctx.check().is_err());
    }

    #[tokio::test]
    async fn errors_from_the_operation_are_not_rewritten() {
        let ctx = OpContext::with_timeout(Duration::from_secs(5));
        let res = ctx.run(async { Err::<(), _>(ServiceError::StoreUnavailable("down".into())) }).await;
        assert!(matches!(res, Err(ServiceError::StoreUnavailable(_))));
    }
}
