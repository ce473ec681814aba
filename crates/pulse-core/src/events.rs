use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, ScanId};
use crate::report::Report;

/// Report kind that routes to the scan path. Anything else is a plain log.
pub const KIND_DEVICE_SCAN: &str = "COMPLETE_DEVICE_DATA";

// Kinds the relay emits on its own behalf.
pub const KIND_SCAN_COMPLETE: &str = "DEVICE_SCAN_COMPLETE";
pub const KIND_DEVICE_CONNECTED: &str = "ESP32_CONNECTED";
pub const KIND_DEVICE_DISCONNECTED: &str = "ESP32_DISCONNECTED";

/// A single log record. Immutable once stored; field names on the wire
/// match what devices and the dashboard already speak.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "status")]
    pub message: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "formattedTime")]
    pub formatted_time: String,
}

impl Event {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            kind: kind.into(),
            message: message.into(),
            created_at: now,
            formatted_time: format_local(now),
        }
    }
}

/// A stored full-inventory scan. Keeps the verbatim ingest body in `raw`
/// so a scan fetched by id returns exactly what the device sent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceScan {
    pub id: ScanId,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
    #[serde(rename = "rawData")]
    pub raw: serde_json::Value,
    #[serde(rename = "deviceCount")]
    pub device_count: usize,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "formattedTime")]
    pub formatted_time: String,
}

impl DeviceScan {
    pub fn from_report(report: &Report, raw: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: ScanId::new(),
            kind: KIND_DEVICE_SCAN.to_string(),
            data: report.data_or_default().to_string(),
            raw,
            device_count: report.device_count(),
            created_at: now,
            formatted_time: format_local(now),
        }
    }
}

/// Human-readable local rendering of a creation instant.
pub fn format_local(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
