//! Retention sweeper for pruning old readings.

use crate::db::Store;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Manager for deleting readings past the configured retention period.
///
/// Only constructed when a retention period is configured; the default is
/// to keep history forever.
pub struct RetentionManager {
    store: Arc<Store>,
    retention_days: u32,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>, retention_days: u32) -> Self {
        Self {
            store,
            retention_days,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the retention background task.
    pub fn start(&self) {
        let store = self.store.clone();
        let stop = self.stop.clone();
        let days = self.retention_days;

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(Duration::from_secs(3600));

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        prune_expired(&store, days);
                    }
                }
            }
        });
    }

    /// Stop the retention task.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// Delete readings older than the retention period.
fn prune_expired(store: &Store, retention_days: u32) {
    let cutoff = Utc::now() - ChronoDuration::days(retention_days as i64);

    match store.delete_readings_before(cutoff) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "pruned readings past retention"),
        Err(e) => tracing::error!("RetentionManager: failed to prune readings: {}", e),
    }
}
