//! The SSE connection hub.

use crate::event::StreamEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Idle connections older than this are force-closed by the sweeper.
pub const CONNECTION_TTL: Duration = Duration::from_secs(30 * 60);

/// How often the sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Receiving half handed to the SSE response task.
pub type StreamReceiver = mpsc::UnboundedReceiver<StreamEvent>;

struct Connection {
    sender: mpsc::UnboundedSender<StreamEvent>,
    created_at: Instant,
}

/// Owns every streaming connection, keyed by request.
///
/// Per request, connections form an ordered sequence; events reach each
/// connection in publication order. Terminal events close and drop all
/// of a request's sinks. The connection map and its timestamps live
/// under one mutex.
#[derive(Default)]
pub struct StreamHub {
    connections: Mutex<HashMap<Uuid, Vec<Connection>>>,
}

impl StreamHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new connection for a request and returns its receiver.
    ///
    /// The hub keeps the sending half; dropping the receiver (client
    /// disconnect) removes the connection on the next publish without
    /// affecting the orchestration or other connections.
    pub fn attach(&self, request_id: Uuid) -> StreamReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut connections = self.connections.lock();
        connections.entry(request_id).or_default().push(Connection {
            sender: tx,
            created_at: Instant::now(),
        });
        debug!(request_id = %request_id, "Stream connection attached");
        rx
    }

    /// Publishes an event to every connection of a request.
    ///
    /// Completed (disconnected) sinks are removed immediately; when the
    /// sequence empties, the request entry is removed from the hub. A
    /// terminal event closes and drops every sink after delivery.
    pub fn publish(&self, request_id: Uuid, event: StreamEvent) {
        let terminal = event.is_terminal();
        let mut connections = self.connections.lock();
        let Some(sinks) = connections.get_mut(&request_id) else {
            return;
        };

        sinks.retain(|c| c.sender.send(event.clone()).is_ok());

        let delivered = sinks.len();
        if terminal || sinks.is_empty() {
            connections.remove(&request_id);
        }
        debug!(
            request_id = %request_id,
            event = event.name(),
            connections = delivered,
            "Stream event published"
        );
    }

    /// Publishes a terminal error to a request's connections.
    pub fn fail(&self, request_id: Uuid, reason: impl Into<String>) {
        self.publish(request_id, StreamEvent::Error(reason.into()));
    }

    /// Number of live connections for a request.
    pub fn connection_count(&self, request_id: Uuid) -> usize {
        self.connections
            .lock()
            .get(&request_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Total live connections across requests.
    pub fn total_connections(&self) -> usize {
        self.connections.lock().values().map(|s| s.len()).sum()
    }

    /// Force-closes connections older than `ttl`, returning how many
    /// were closed.
    pub fn sweep_older_than(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut closed = 0;
        let mut connections = self.connections.lock();
        connections.retain(|request_id, sinks| {
            let before = sinks.len();
            sinks.retain(|c| now.duration_since(c.created_at) < ttl);
            let dropped = before - sinks.len();
            if dropped > 0 {
                debug!(request_id = %request_id, closed = dropped, "Expired stream connections closed");
            }
            closed += dropped;
            !sinks.is_empty()
        });
        closed
    }

    /// Runs one sweep with the standard TTL.
    pub fn sweep(&self) -> usize {
        self.sweep_older_than(CONNECTION_TTL)
    }

    /// Broadcasts a shutdown error to every connection and drains the hub.
    pub fn shutdown(&self) {
        let mut connections = self.connections.lock();
        let total: usize = connections.values().map(|s| s.len()).sum();
        for sinks in connections.values() {
            for c in sinks {
                let _ = c
                    .sender
                    .send(StreamEvent::Error("Server shutting down".to_string()));
            }
        }
        connections.clear();
        info!(connections = total, "Stream hub shut down");
    }
}

/// Spawns the periodic TTL sweeper for a hub.
pub fn start_sweeper(hub: Arc<StreamHub>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let closed = hub.sweep();
            if closed > 0 {
                info!(closed = closed, "Stream sweeper closed expired connections");
            }
        }
    })
}
