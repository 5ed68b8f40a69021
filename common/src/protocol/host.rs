use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use thiserror::Error;

/// Placeholder the backend reports for hosts that were never pinged.
pub const NEVER_CHECKED: &str = "00:00:00";

pub const DEFAULT_DELIVERED_PCT: f64 = 0.0;
pub const DEFAULT_LOSS_PCT: f64 = 100.0;

// Epoch values above this are milliseconds (year 5138 in seconds).
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HostStatus {
    Online,
    Offline,
    Error,
    #[default]
    Unknown,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::Online => "online",
            HostStatus::Offline => "offline",
            HostStatus::Error => "error",
            HostStatus::Unknown => "unknown",
        }
    }

    /// Lenient wire mapping: case-insensitive, anything unrecognised is `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "online" => HostStatus::Online,
            "offline" => HostStatus::Offline,
            "error" => HostStatus::Error,
            _ => HostStatus::Unknown,
        }
    }
}

impl Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for HostStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HostStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&value))
    }
}

/// One monitored endpoint. Every field is always populated; missing wire
/// fields are filled with defaults when the record is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireHost")]
pub struct HostRecord {
    #[serde(rename = "ip")]
    pub address: String,
    pub status: HostStatus,
    #[serde(rename = "rtt")]
    pub round_trip_ms: Option<f64>,
    #[serde(rename = "delivered")]
    pub delivered_pct: f64,
    #[serde(rename = "loss")]
    pub loss_pct: f64,
    #[serde(rename = "last_ping")]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl HostRecord {
    /// A record for `address` with every other field at its default.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            status: HostStatus::Unknown,
            round_trip_ms: None,
            delivered_pct: DEFAULT_DELIVERED_PCT,
            loss_pct: DEFAULT_LOSS_PCT,
            last_checked_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireHost {
    #[serde(alias = "address")]
    ip: String,
    #[serde(default)]
    status: Option<HostStatus>,
    #[serde(default, alias = "roundTripMs")]
    rtt: Option<f64>,
    #[serde(default, alias = "deliveredPct")]
    delivered: Option<f64>,
    #[serde(default, alias = "lossPct")]
    loss: Option<f64>,
    #[serde(default, alias = "lastCheckedAt")]
    last_ping: Option<WireTimestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Text(String),
    Epoch(f64),
    // bools, objects, arrays: read as never checked, the host is kept
    Other(IgnoredAny),
}

impl TryFrom<WireHost> for HostRecord {
    type Error = String;

    fn try_from(wire: WireHost) -> Result<Self, Self::Error> {
        let address = wire.ip.trim();
        if address.is_empty() {
            return Err("host element has an empty address".to_string());
        }

        let last_checked_at = match wire.last_ping {
            Some(WireTimestamp::Text(raw)) => parse_checked_at(&raw),
            Some(WireTimestamp::Epoch(value)) => from_epoch(value),
            Some(WireTimestamp::Other(_)) | None => None,
        };

        Ok(HostRecord {
            address: address.to_string(),
            status: wire.status.unwrap_or_default(),
            round_trip_ms: wire.rtt.filter(|rtt| rtt.is_finite() && *rtt >= 0.0),
            delivered_pct: percentage(wire.delivered, DEFAULT_DELIVERED_PCT),
            loss_pct: percentage(wire.loss, DEFAULT_LOSS_PCT),
            last_checked_at,
        })
    }
}

fn percentage(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(pct) if pct.is_finite() => pct.clamp(0.0, 100.0),
        _ => default,
    }
}

/// Parses the last-check timestamp in any of the shapes the backend has used:
/// RFC 3339, naive `YYYY-MM-DD HH:MM:SS` (taken as UTC) or an epoch number.
/// The never-checked placeholder and unparseable values yield `None`.
pub fn parse_checked_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == NEVER_CHECKED {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    raw.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let millis = if value > EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };

    DateTime::from_timestamp_millis(millis as i64)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("host address is required")]
    Empty,
}

/// A user-entered host that has not been confirmed by the backend yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostCandidate {
    address: String,
}

impl HostCandidate {
    pub fn parse(input: &str) -> Result<Self, CandidateError> {
        let address = input.trim().to_lowercase();
        if address.is_empty() {
            return Err(CandidateError::Empty);
        }
        Ok(Self { address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn to_record(&self) -> HostRecord {
        HostRecord::new(self.address.clone())
    }
}

#[derive(Serialize)]
struct CreateHostBody<'a> {
    ip: &'a str,
    status: HostStatus,
    rtt: Option<f64>,
    delivered: f64,
    loss: f64,
    last_ping: &'static str,
}

impl Serialize for HostCandidate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        CreateHostBody {
            ip: &self.address,
            status: HostStatus::Unknown,
            rtt: None,
            delivered: DEFAULT_DELIVERED_PCT,
            loss: DEFAULT_LOSS_PCT,
            last_ping: NEVER_CHECKED,
        }
        .serialize(serializer)
    }
}
