//! Heartbeat - liveness probing and eviction, plus the queue sweeper.
//!
//! Each tick walks Presence: the missed-ping counter is incremented
//! *before* the ping is emitted, so a connection over budget is evicted on
//! that tick rather than the next. Eviction cancels the connection, which
//! unwinds through the normal disconnect path (possibly opening a grace
//! window).

use crate::state::Core;
use drift_proto::ServerEvent;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Spawn the heartbeat worker.
pub fn spawn_heartbeat(core: Arc<Core>) -> JoinHandle<()> {
    let interval = core.config.timing.ping_interval();
    let budget = core.config.timing.max_missed_pings;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so a connection
        // accepted just before the worker starts is not pinged instantly.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            for conn_id in core.presence.connection_ids() {
                let Some(missed) = core.presence.increment_missed_pings(conn_id) else {
                    continue;
                };
                if missed > budget {
                    let idle_ms = core
                        .presence
                        .idle_for(conn_id)
                        .map(|d| d.as_millis() as u64);
                    info!(conn = %conn_id, missed, idle_ms, "Evicting unresponsive connection");
                    core.presence.cancel(conn_id);
                } else {
                    core.send_to(conn_id, ServerEvent::Ping);
                }
            }
        }
    })
}

/// Spawn the queue sweeper: discards queue entries whose connection died
/// in a race with matching.
pub fn spawn_queue_sweeper(core: Arc<Core>) -> JoinHandle<()> {
    let interval = core.config.timing.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = core.queues.sweep(&core.presence.live_set());
            if removed > 0 {
                debug!(removed, "Swept stale queue entries");
            }
        }
    })
}

/// Record an inbound pong.
pub fn on_pong(core: &Arc<Core>, conn_id: crate::state::ConnId) {
    core.presence.record_pong(conn_id);
}
