//! Cooperative cancellation for the automation loop.
//! A `ShutdownTrigger` (fired from the Ctrl+C handler) flips a `watch` channel; the loop checks
//! `Shutdown` between states and every delay races against it.

use std::time::Duration;
use tokio::sync::watch;

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if the trigger is gone.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|&stop| stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleeps for `duration`; returns `false` if shutdown was requested first.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        loop {
            if self.is_requested() {
                return false;
            }
            tokio::select! {
                _ = &mut deadline => return !self.is_requested(),
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        // Trigger dropped: nobody can cancel any more.
                        deadline.await;
                        return !self.is_requested();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_completes_without_trigger() {
        let (_trigger, mut shutdown) = channel();
        assert!(shutdown.sleep(Duration::from_millis(5)).await);
        assert!(!shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_trigger_interrupts_sleep() {
        let (trigger, mut shutdown) = channel();
        let start = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });
        assert!(!shutdown.sleep(Duration::from_secs(30)).await);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_already_triggered_returns_immediately() {
        let (trigger, mut shutdown) = channel();
        trigger.trigger();
        assert!(!shutdown.sleep(Duration::from_secs(30)).await);
    }

    #[tokio::test]
    async fn test_requested_resolves_on_trigger() {
        let (trigger, mut shutdown) = channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });
        tokio::time::timeout(Duration::from_secs(5), shutdown.requested())
            .await
            .unwrap();
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_requested_pends_without_trigger() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        let waited = tokio::time::timeout(Duration::from_millis(20), shutdown.requested()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_dropped_trigger_still_sleeps() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        assert!(shutdown.sleep(Duration::from_millis(5)).await);
    }
}
