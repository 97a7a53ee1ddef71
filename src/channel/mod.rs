use crate::message::{TrafficAlert, TrafficUpdate, WireMessage};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::{debug, info};


/// Maximum number of alerts retained in the recent-alerts history
pub const ALERT_HISTORY_CAPACITY: usize = 5;

/// Maximum number of locations returned by the congestion ranking
pub const TOP_AREAS_LIMIT: usize = 5;

/// Named connection lifecycle states.
///
/// The channel starts in `Connecting` (a connection is opened on first
/// use) and only ever reaches `Disconnected` through explicit teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Resource whose cached copy is stale after a state change.
///
/// The channel never fetches anything itself; it only raises this
/// signal so the external data-fetching layer knows a refetch is
/// warranted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleResource {
    /// The batch "key indicators" resource served over HTTP
    Indicators,
}

/// Externally visible state of the real-time channel.
///
/// Owned and mutated exclusively by the connection driver task;
/// consumers receive cloned snapshots or watch borrows and never hold
/// a mutable handle.
#[derive(Clone, Debug)]
pub struct ChannelState {
    /// Current lifecycle state of the transport
    pub phase: ConnectionPhase,
    /// Description of the last connection failure, if any
    pub connection_error: Option<String>,
    /// Timestamp of the most recent successful `traffic_update`
    pub last_update: Option<DateTime<Utc>>,
    /// Current full snapshot of monitored locations
    pub updates: Vec<TrafficUpdate>,
    /// Most-recent-first alert history, bounded at [`ALERT_HISTORY_CAPACITY`]
    pub recent_alerts: VecDeque<TrafficAlert>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            connection_error: None,
            last_update: None,
            updates: Vec::new(),
            recent_alerts: VecDeque::new(),
        }
    }

    /// True when the transport is open and usable
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    /// Applies one decoded message to the state.
    ///
    /// Runs to completion before the next message is handled (the
    /// driver task processes frames sequentially), so mutations are
    /// never interleaved. Returns the resource made stale by the
    /// mutation, if any, for the caller to broadcast.
    pub(crate) fn apply(&mut self, msg: WireMessage) -> Option<StaleResource> {
        match msg {
            WireMessage::Connection { message, .. } => {
                info!(message = %message, "server greeting received");
                None
            }
            WireMessage::TrafficUpdate { data, timestamp } => {
                // Full snapshot replace, never a merge
                self.updates = data;
                self.last_update = Some(timestamp);
                Some(StaleResource::Indicators)
            }
            WireMessage::TrafficAlert { data, .. } => {
                self.recent_alerts.push_front(data);
                self.recent_alerts.truncate(ALERT_HISTORY_CAPACITY);
                None
            }
            WireMessage::Unknown => {
                debug!("ignoring unrecognized message type");
                None
            }
        }
    }

    /// The worst-congested locations in the current snapshot,
    /// descending by congestion score, at most [`TOP_AREAS_LIMIT`].
    ///
    /// Recomputed on every call so it always reflects the latest
    /// snapshot. Equal scores keep their snapshot arrival order
    /// (stable sort).
    pub fn top_congestion_areas(&self) -> Vec<TrafficUpdate> {
        let mut ranked = self.updates.clone();
        ranked.sort_by(|a, b| {
            b.congestion_score
                .partial_cmp(&a.congestion_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(TOP_AREAS_LIMIT);
        ranked
    }

    /// Sum of live accident counts across the current snapshot;
    /// 0 when the snapshot is empty.
    pub fn total_live_accidents(&self) -> u64 {
        self.updates.iter().map(|u| u64::from(u.accidents)).sum()
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}
