//! Per-call deadline and cancellation handle forwarded into every store operation.

use crate::errors::StoreError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl CallContext {
    /// A context that never expires and is only cancelled explicitly.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline), cancelled: Arc::new(AtomicBool::new(false)) }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns a guard that cancels this context when dropped, unless disarmed first.
    #[must_use]
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop { ctx: Some(self.clone()) }
    }

    /// # Errors
    /// `Cancelled` once `cancel` was called, `DeadlineExceeded` once the deadline passed.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if let Some(dl) = self.deadline
            && Instant::now() > dl
        {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Cancels the wrapped context on drop. Handlers hold one for the lifetime of a request so
/// that a dropped request future stops the blocking store scan it started.
pub struct CancelOnDrop {
    ctx: Option<CallContext>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.ctx = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_context_never_fails() {
        let ctx = CallContext::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn past_deadline_is_reported() {
        let ctx = CallContext::with_deadline(Instant::now() - Duration::from_millis(5));
        assert!(matches!(ctx.check(), Err(StoreError::DeadlineExceeded)));
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let ctx = CallContext::with_timeout(Duration::from_secs(30));
        let worker = ctx.clone();
        ctx.cancel();
        assert!(matches!(worker.check(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn guard_cancels_unless_disarmed() {
        let ctx = CallContext::background();
        {
            let _g = ctx.cancel_on_drop();
        }
        assert!(ctx.is_cancelled());

        let ctx = CallContext::background();
        ctx.cancel_on_drop().disarm();
        assert!(!ctx.is_cancelled());
    }
}
