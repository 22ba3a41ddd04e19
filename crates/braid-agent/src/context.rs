//! Run context: cancellation and deadline propagation.
//!
//! Every collaborator call made by the engine (LM, tool, memory) takes a
//! [`RunContext`] carrying a cancellation token and an optional deadline.
//! Timeouts are never embedded inside collaborators; the engine derives a
//! child context at its entry point and centralizes enforcement around each
//! suspension point via [`RunContext::guard`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};

/// Cancellation and deadline handle for a single agent run.
///
/// Cheap to clone; clones share the same cancellation token.  Child contexts
/// created with [`RunContext::child_with_timeout`] are cancelled when their
/// parent is.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context that is never cancelled and carries no deadline.
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A cancellable context plus the token that cancels it.
    pub fn cancellable() -> (Self, CancellationToken) {
        let token = CancellationToken::new();
        let ctx = Self {
            cancel: token.clone(),
            deadline: None,
        };
        (ctx, token)
    }

    /// Derive a child context whose deadline is `timeout` from now, or the
    /// parent deadline if that is sooner.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let child_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(child_deadline)),
            None => Some(child_deadline),
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline,
        }
    }

    /// Whether the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The absolute deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(AgentError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Resolve when the context is interrupted, yielding the matching error.
    ///
    /// Never resolves for a background context.
    pub async fn interrupted(&self) -> AgentError {
        let deadline_expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => AgentError::Cancelled,
            _ = deadline_expired => AgentError::DeadlineExceeded,
        }
    }

    /// Await `fut`, racing it against cancellation and the deadline.
    ///
    /// Interruption wins over a simultaneously ready future, so a cancelled
    /// context never yields a late result.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        tokio::pin!(fut);
        tokio::select! {
            biased;
            err = self.interrupted() => Err(err),
            out = &mut fut => Ok(out),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::background()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
