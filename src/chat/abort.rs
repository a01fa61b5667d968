//! Stream Cancellation
//!
//! An explicit abort handle/signal pair. The handle side is held by whoever
//! may cancel (a UI button, a Ctrl-C task); the signal side is polled by the
//! stream reader on every iteration.

use tokio::sync::watch;

/// Create a connected abort handle and signal
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Requests cancellation of a running stream
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observes cancellation
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // The sender is gone, so the value can never change
        drop(tx);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once an abort was requested.
    ///
    /// Pends forever if every handle is dropped without aborting.
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_abort_wakes_waiter() {
        let (handle, mut signal) = abort_pair();
        assert!(!signal.is_aborted());

        let waiter = tokio::spawn(async move {
            signal.aborted().await;
            signal.is_aborted()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();

        let fired = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(fired);
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn test_abort_before_wait() {
        let (handle, mut signal) = abort_pair();
        handle.abort();
        tokio::time::timeout(Duration::from_millis(100), signal.aborted())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let mut signal = AbortSignal::never();
        let result = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(result.is_err());
    }
}
