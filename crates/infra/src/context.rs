//! Cancellation and deadlines for store-touching operations.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an operation stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("operation {0} was cancelled")]
    Cancelled(&'static str),

    #[error("operation {0} exceeded its deadline")]
    DeadlineExceeded(&'static str),
}

/// Caller-supplied cancellation signal plus an optional deadline.
///
/// Cloning shares the token, so cancelling one clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// A context that never expires and is never cancelled by itself.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// Tighten the deadline to at most `timeout` from now.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Bind to an external token, e.g. one cancelled on shutdown.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Drive `fut` until it completes, the token fires, or the deadline passes.
    ///
    /// An interrupted future is dropped, which rolls back any transaction it
    /// holds open. Do not wrap a commit in `run`: once COMMIT reaches the
    /// database, dropping the future cannot undo it.
    pub async fn run<F, T>(&self, operation: &'static str, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled(operation));
        }
        if matches!(self.deadline, Some(d) if d <= Instant::now()) {
            return Err(Interrupted::DeadlineExceeded(operation));
        }

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                tracing::debug!(operation, "operation cancelled");
                Err(Interrupted::Cancelled(operation))
            }
            _ = deadline => {
                tracing::debug!(operation, "operation deadline exceeded");
                Err(Interrupted::DeadlineExceeded(operation))
            }
            out = fut => Ok(out),
        }
    }
}
