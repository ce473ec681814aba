use serde_json::Value;

use crate::events::KIND_DEVICE_SCAN;

/// Delimiter separating device records inside a scan payload.
pub const DEVICE_DELIMITER: &str = "|||";

pub const DEFAULT_KIND: &str = "UNKNOWN";
pub const DEFAULT_MESSAGE: &str = "No message";
pub const DEFAULT_DATA: &str = "No data";

/// An inbound device report, extracted leniently from an arbitrary JSON
/// body. Every field is optional; ingestion defaults anything missing or
/// odd-shaped instead of rejecting.
#[derive(Clone, Debug, Default)]
pub struct Report {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub data: Option<String>,
}

impl Report {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            kind: raw.get("type").and_then(Value::as_str).map(str::to_owned),
            status: raw.get("status").and_then(Value::as_str).map(str::to_owned),
            data: raw.get("data").and_then(Value::as_str).map(str::to_owned),
        }
    }

    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_KIND)
    }

    pub fn status_or_default(&self) -> &str {
        self.status.as_deref().unwrap_or(DEFAULT_MESSAGE)
    }

    pub fn data_or_default(&self) -> &str {
        self.data.as_deref().unwrap_or(DEFAULT_DATA)
    }

    pub fn is_scan(&self) -> bool {
        self.kind.as_deref() == Some(KIND_DEVICE_SCAN)
    }

    /// Number of delimiter-separated device records in the payload:
    /// segments minus one, so empty or absent data counts zero.
    pub fn device_count(&self) -> usize {
        self.data
            .as_deref()
            .map(|data| data.matches(DEVICE_DELIMITER).count())
            .unwrap_or(0)
    }
}
