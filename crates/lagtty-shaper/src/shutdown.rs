//! Shared cancellation token for coordinating shaper shutdown.
//!
//! Each shaper direction runs as its own task and needs an external cancel
//! signal it can observe at every suspension point. [`ShutdownToken`] wraps
//! a `watch` channel: the orchestrator holds the token, each task holds a
//! subscribed receiver and checks it in `tokio::select!` loops.

use tokio::sync::watch;

/// A cancellation token whose subscribers observe a single stop signal.
pub struct ShutdownToken {
    /// Sender side of the watch channel; sending `true` signals shutdown.
    stop_tx: watch::Sender<bool>,
    /// Receiver side, cloned for each subscriber.
    stop_rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Create a new token in the "not stopped" state.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self { stop_tx, stop_rx }
    }

    /// Get a new subscription to the stop signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Check whether the stop signal has been sent.
    pub fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Send the stop signal to all subscribers.
    ///
    /// This is idempotent: calling it multiple times is harmless.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_starts_not_stopped() {
        let token = ShutdownToken::new();
        assert!(!token.is_stopped());
    }

    #[test]
    fn signal_stop_is_visible_to_subscribers() {
        let token = ShutdownToken::new();
        let rx = token.subscribe();

        assert!(!*rx.borrow());
        token.signal_stop();
        assert!(*rx.borrow());
    }

    #[test]
    fn signal_stop_is_idempotent() {
        let token = ShutdownToken::new();
        token.signal_stop();
        token.signal_stop();
        assert!(token.is_stopped());
    }

    #[test]
    fn subscribe_after_stop_sees_true() {
        let token = ShutdownToken::new();
        token.signal_stop();
        let rx = token.subscribe();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn subscribers_wake_on_signal() {
        let token = ShutdownToken::new();
        let mut rx = token.subscribe();

        let waiter = tokio::spawn(async move {
            rx.wait_for(|&stopped| stopped).await.is_ok()
        });

        token.signal_stop();
        assert!(waiter.await.unwrap());
    }
}
