use std::sync::Arc;
use std::time::Duration;

use crate::realtime::registry::SessionRegistry;

/// Spawn the liveness loop. Every `interval` the registry pings live
/// sessions and drops the ones that stayed silent since the last ping.
pub fn start_heartbeat(
    registry: Arc<SessionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = registry.sweep().await;
            tracing::debug!(
                sessions = registry.session_count(),
                removed,
                "heartbeat cycle"
            );
        }
    })
}
