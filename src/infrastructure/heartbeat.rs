use crate::client::{ClientInner, RealtimeClient};
use crate::types::HEARTBEAT_INTERVAL;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Periodic liveness check for one connection.
///
/// Each tick asks the client to send a heartbeat. The client reports a timeout
/// when the previous heartbeat was never acknowledged, closes the connection,
/// and the loop ends.
pub(crate) struct HeartbeatManager {
    interval: Duration,
    client: Weak<ClientInner>,
    conn_id: u64,
}

impl HeartbeatManager {
    pub(crate) fn new(client: Weak<ClientInner>, conn_id: u64) -> Self {
        Self {
            interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            client,
            conn_id,
        }
    }

    pub(crate) fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs until the client is dropped, the connection is replaced, or a
    /// heartbeat times out
    pub(crate) async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(client) = RealtimeClient::upgrade(&self.client) else {
                // Client dropped
                break;
            };
            if !client.send_heartbeat(self.conn_id) {
                break;
            }
        }
        tracing::debug!("Heartbeat task for connection {} finished", self.conn_id);
    }
}
