//! Per-turn cancellation.

use tokio_util::sync::CancellationToken as Inner;

/// Cloneable stop handle for one turn.
///
/// `stop()` flips the flag seen by every render and state transition, and
/// wakes the pending network read so the streaming loop drops the response.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Inner,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        if !self.inner.is_cancelled() {
            tracing::debug!("turn stop requested");
        }
        self.inner.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once `stop()` has been called.
    pub async fn stopped(&self) {
        self.inner.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_is_shared_between_clones() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(!token.is_stopped());

        let waiter = tokio::spawn(async move { handle.stopped().await });
        token.stop();
        waiter.await.unwrap();
        assert!(token.is_stopped());

        // idempotent
        token.stop();
        assert!(token.is_stopped());
    }
}
