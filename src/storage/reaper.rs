//! Background TTL reaper.
//!
//! Lazy expiry in [`Store::get`] only reclaims entries somebody reads.
//! The reaper handles the rest: a background tokio task wakes on a
//! fixed tick (1 s by default), sweeps every bucket under the store
//! mutex, and removes entries whose TTL has lapsed.
//!
//! The returned [`Reaper`] handle stops the task on [`Reaper::stop`] or
//! when dropped, so the task never outlives the store it serves.

use crate::storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Reaper settings.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between sweeps.
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Handle to the running reaper task.
#[derive(Debug)]
pub struct Reaper {
    shutdown_tx: watch::Sender<bool>,
}

impl Reaper {
    /// Spawns the reaper task against `store`.
    pub fn start(store: Arc<Store>, config: ReaperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(reap_loop(store, config, shutdown_rx));
        info!("TTL reaper started");
        Self { shutdown_tx }
    }

    /// Signals the task to exit at its next wakeup. Also happens
    /// automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn reap_loop(store: Arc<Store>, config: ReaperConfig, mut shutdown_rx: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(config.interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; consume it
    // so the first sweep happens one full period after startup.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("TTL reaper shutting down");
                    return;
                }
            }
        }

        let removed = store.evict_expired();
        if removed > 0 {
            debug!(removed, keys = store.len(), "reaped expired entries");
        }
    }
}

/// Starts the reaper with the default 1 s tick.
pub fn start_reaper(store: Arc<Store>) -> Reaper {
    Reaper::start(store, ReaperConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn reaper_removes_expired_entries() {
        let store = Arc::new(Store::new());
        for i in 0..10 {
            store.set(
                Bytes::from(format!("key{}", i)),
                Bytes::from("value"),
                Some(Duration::from_millis(30)),
            );
        }
        store.set(Bytes::from("keeper"), Bytes::from("value"), None);
        assert_eq!(store.len(), 11);

        let _reaper = Reaper::start(
            Arc::clone(&store),
            ReaperConfig {
                interval: Duration::from_millis(20),
            },
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&Bytes::from("keeper")), Some(Bytes::from("value")));
    }

    #[tokio::test]
    async fn stopped_reaper_leaves_entries_to_lazy_expiry() {
        let store = Arc::new(Store::new());
        {
            let _reaper = Reaper::start(
                Arc::clone(&store),
                ReaperConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        store.set(
            Bytes::from("k"),
            Bytes::from("v"),
            Some(Duration::from_millis(10)),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;

        // The background sweep is gone, but the read path still treats
        // the entry as absent.
        assert_eq!(store.get(&Bytes::from("k")), None);
    }
}
