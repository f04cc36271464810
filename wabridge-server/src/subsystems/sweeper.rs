//! Periodic session expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use wabridge_core::config::SessionConfig;

use super::session_store::SessionStore;

/// Sweep expired sessions every `sweep_interval_seconds` until shutdown fires.
pub async fn run_sweep_loop(
    store: Arc<SessionStore>,
    config: SessionConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let expiry = Duration::from_secs(config.expiry_seconds);
    let interval = Duration::from_secs(config.sweep_interval_seconds.max(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        "Session sweep loop started (interval: {}s, expiry: {}s)",
        interval.as_secs(),
        config.expiry_seconds
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.sweep(expiry);
                if removed > 0 {
                    tracing::info!(removed, remaining = store.len(), "Expired sessions swept");
                } else {
                    tracing::debug!(remaining = store.len(), "Session sweep: nothing expired");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweep loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_loop_sweeps_and_stops_on_shutdown() {
        let store = Arc::new(SessionStore::new());
        store.get_or_create_at("stale", Utc::now() - chrono::Duration::seconds(120));
        store.get_or_create("live");

        let (tx, rx) = broadcast::channel(1);
        let config = SessionConfig {
            expiry_seconds: 60,
            sweep_interval_seconds: 1,
            refresh_on_access: false,
        };
        let handle = tokio::spawn(run_sweep_loop(Arc::clone(&store), config, rx));

        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get("stale").is_none());
        assert!(store.get("live").is_some());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
