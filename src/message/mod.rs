use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;


/// One monitored location's current condition reading.
///
/// Carried in batches by `traffic_update` frames. A batch is a full
/// replacement snapshot, never a delta; individual readings are never
/// mutated after decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficUpdate {
    /// Location identifier, unique within a snapshot
    pub location: String,
    /// Current queue length at the location
    pub queue: f64,
    /// Stop density reading
    pub stop_density: f64,
    /// Live accident count
    pub accidents: u32,
    /// Live fatality count
    pub fatalities: u32,
    /// Congestion score, higher is worse
    pub congestion_score: f64,
    /// Severity band label (e.g. "Severe", "Moderate")
    pub congestion_level: String,
    /// Producer time of the reading
    pub timestamp: DateTime<Utc>,
}

/// Incident severity band
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// One incident notification, carried by a `traffic_alert` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficAlert {
    pub location: String,
    /// Free-text description of the incident
    pub alert: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Server → client wire message.
///
/// Every frame is a JSON object with a `type` tag and an ISO-8601
/// `timestamp`. Tags this client does not recognize decode to
/// [`WireMessage::Unknown`] so a newer server never breaks the channel.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Informational greeting sent once per connection; log only
    Connection {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Full snapshot of current conditions across all monitored locations
    TrafficUpdate {
        data: Vec<TrafficUpdate>,
        timestamp: DateTime<Utc>,
    },
    /// Single new incident alert
    TrafficAlert {
        data: TrafficAlert,
        timestamp: DateTime<Utc>,
    },
    /// Unrecognized `type` tag; dropped as a no-op
    #[serde(other)]
    Unknown,
}

/// Decode failures for incoming frames
#[derive(Debug)]
pub enum DecodeError {
    /// Payload was not valid JSON
    Syntax(serde_json::Error),
    /// Valid JSON, but not a recognizable message envelope
    /// (missing `type`, wrong field types, wrong payload shape)
    Envelope(serde_json::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Syntax(e) => write!(f, "frame is not valid JSON: {}", e),
            DecodeError::Envelope(e) => write!(f, "frame is not a recognized message: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Syntax(e) | DecodeError::Envelope(e) => Some(e),
        }
    }
}

/// Decodes a raw text frame into a typed message.
///
/// Never panics on bad input: malformed frames come back as
/// [`DecodeError`] for the caller to log and drop, leaving channel
/// state untouched.
pub fn decode(raw: &str) -> Result<WireMessage, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::Syntax)?;
    serde_json::from_value(value).map_err(DecodeError::Envelope)
}
