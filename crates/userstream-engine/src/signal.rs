//! Stop signal shared by the reader and dispatch contexts.
//!
//! Level-triggered: once raised it stays raised, so a context that starts
//! waiting after `trigger()` still observes it immediately.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct StopSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Non-blocking check, usable from synchronous code.
    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal has been raised.
    pub async fn stopped(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_waiter() {
        let signal = StopSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.trigger();

        let result = tokio::time::timeout(Duration::from_millis(500), task).await;
        assert!(result.is_ok());
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn late_waiter_sees_raised_signal() {
        let signal = StopSignal::new();
        signal.trigger();
        let result = tokio::time::timeout(Duration::from_millis(100), signal.stopped()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn starts_lowered() {
        assert!(!StopSignal::new().is_stopped());
    }
}
