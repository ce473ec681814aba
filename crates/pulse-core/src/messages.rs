use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::events::{DeviceScan, Event};
use crate::ids::ScanId;

pub const CMD_CONNECTED: &str = "CONNECTED";
pub const CMD_CHECK_NOW: &str = "CHECK_NOW";
pub const DEFAULT_COMMAND_REASON: &str = "Manual trigger from dashboard";

/// A frame pushed down a device command stream.
///
/// The greeting on a fresh connection is `CONNECTED` with no reason;
/// operator-issued commands carry one. Transient, never stored.
#[derive(Clone, Debug, Serialize)]
pub struct Command {
    pub command: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Command {
    pub fn new(command: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            command: command.into(),
            timestamp: Utc::now().timestamp_millis(),
            reason,
        }
    }

    pub fn connected() -> Self {
        Self::new(CMD_CONNECTED, None)
    }
}

/// Frames pushed down a dashboard stream. Untagged: each variant already
/// carries its own `type` discriminator on the wire.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DashboardMessage {
    Hello(DashboardHello),
    Log(Event),
    ScanReady(ScanNotice),
}

/// First frame on a fresh dashboard connection.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardHello {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl DashboardHello {
    pub fn new() -> Self {
        Self {
            kind: CMD_CONNECTED.to_string(),
            status: "Dashboard connected".to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

impl Default for DashboardHello {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight pointer to a freshly stored scan, broadcast after the
/// summary event so dashboards can fetch the full payload on demand.
#[derive(Clone, Debug, Serialize)]
pub struct ScanNotice {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "scanId")]
    pub scan_id: ScanId,
    #[serde(rename = "deviceCount")]
    pub device_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl ScanNotice {
    pub fn for_scan(scan: &DeviceScan) -> Self {
        Self {
            kind: "FULL_DEVICE_DATA".to_string(),
            scan_id: scan.id.clone(),
            device_count: scan.device_count,
            timestamp: scan.created_at,
        }
    }
}
