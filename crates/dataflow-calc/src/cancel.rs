//! Cooperative cancellation for calculation batches.
//!
//! A [`CancelToken`] wraps a tokio `watch` channel holding a single flag.
//! Clones observe the same flag, so a UI handler can keep one clone and
//! hand another to the batch. Cancelling is idempotent.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        CancelToken {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Raises the flag. Later calls have no further effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of the token, so the wait
        // only ends by cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
