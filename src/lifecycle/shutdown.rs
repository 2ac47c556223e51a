//! Shutdown coordination.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Holds the sending half of a watch channel; the server holds a
/// [`ShutdownWatcher`] and drains once the flag flips. Integration tests
/// use `trigger()` to stop spawned servers deterministically.
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Obtain a watcher for a task that should stop on shutdown.
    pub fn watcher(&self) -> ShutdownWatcher {
        ShutdownWatcher {
            rx: self.tx.subscribe(),
        }
    }

    /// Signal shutdown to all watchers.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Trigger on Ctrl+C. Consumes the coordinator; intended for a
    /// spawned background task in `main`.
    pub async fn trigger_on_ctrl_c(self) {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("Failed to install Ctrl+C handler");
            return;
        }
        tracing::info!("Shutdown signal received");
        self.trigger();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the shutdown channel.
pub struct ShutdownWatcher {
    rx: watch::Receiver<bool>,
}

impl ShutdownWatcher {
    /// Resolve once shutdown is triggered.
    pub async fn wait(mut self) {
        // An error means the coordinator is gone; treat as shutdown.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_releases_watchers() {
        let shutdown = Shutdown::new();
        let first = shutdown.watcher();
        let second = shutdown.watcher();

        let waiting = tokio::spawn(async move {
            first.wait().await;
            second.wait().await;
        });

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("watchers did not release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_watchers() {
        let shutdown = Shutdown::new();
        let watcher = shutdown.watcher();
        drop(shutdown);

        tokio::time::timeout(Duration::from_secs(1), watcher.wait())
            .await
            .expect("watcher did not release");
    }
}
