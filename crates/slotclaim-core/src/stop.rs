//! Process-wide stop signal shared by the scheduler, the windowed checker
//! and every job attempt.
//!
//! Backed by a `watch` channel so that sleeping loops can wake up the moment
//! the flag flips instead of waiting for their next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

/// Cloneable handle to a single boolean stop flag.
///
/// Once raised the flag stays raised for the life of the process.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Raise the flag. Returns `true` if this call changed it.
    pub fn set(&self, reason: &str) -> bool {
        let was_set = self.tx.send_replace(true);
        if !was_set {
            info!(%reason, "stop signal raised");
        }
        !was_set
    }

    /// Resolve once the flag is set (immediately if it already is).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration` unless the flag is raised first.
    ///
    /// Returns `true` when the sleep was cut short by a stop.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_set(),
            _ = self.wait() => true,
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

    #[test]
    fn set_is_sticky() {
        let stop = StopSignal::new();
        assert!(!stop.is_set());
        assert!(stop.set("test"));
        assert!(!stop.set("again"));
        assert!(stop.is_set());
    }

    #[test]
    fn clones_share_the_flag() {
        let stop = StopSignal::new();
        let other = stop.clone();
        other.set("from clone");
        assert!(stop.is_set());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_set() {
        let stop = StopSignal::new();
        let setter = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            setter.set("test");
        });

        let started = tokio::time::Instant::now();
        assert!(stop.sleep(Duration::from_secs(600)).await);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_completion_without_stop() {
        let stop = StopSignal::new();
        assert!(!stop.sleep(Duration::from_secs(30)).await);
    }
}
