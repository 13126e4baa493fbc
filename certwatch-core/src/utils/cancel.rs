//! Cooperative cancellation signal.
//!
//! Built on `tokio::sync::watch`; cloned tokens share one flag. Used to
//! abort retry-delay sleeps and challenge polling without tearing down
//! the runtime.

use tokio::sync::watch;

/// Clonable cancellation token.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        // Receivers are kept alive by the clones; send can only fail if
        // every receiver is gone, which makes the signal moot anyway.
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
