//! HTTP handlers: ingest, command trigger, stream endpoints, and the
//! read-only query surface over the two stores.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use pulse_core::events::{DeviceScan, Event};
use pulse_core::ids::ScanId;
use pulse_core::messages::{Command, DashboardHello, DashboardMessage, CMD_CHECK_NOW};

use crate::relay::{DispatchError, IngestOutcome, Relay};
use crate::sse::{stream_response, Pool};

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

/// POST /api/data — ingest a device report.
pub async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    match state.relay.ingest(body) {
        IngestOutcome::Scan { device_count, .. } => Json(json!({
            "success": true,
            "message": "Complete device data received",
            "deviceCount": device_count,
        })),
        IngestOutcome::Log(_) => Json(json!({
            "success": true,
            "message": "Data received",
        })),
    }
}

/// GET /api/esp32/commands — join the device command stream.
pub async fn device_stream(State(state): State<AppState>) -> impl IntoResponse {
    let (client, rx) = state.relay.attach_device();
    stream_response(state.relay, client, Pool::Device, Command::connected(), rx)
}

/// GET /api/stream — join the dashboard stream.
pub async fn dashboard_stream(State(state): State<AppState>) -> impl IntoResponse {
    let (client, rx) = state.relay.attach_dashboard();
    stream_response(
        state.relay,
        client,
        Pool::Dashboard,
        DashboardMessage::Hello(DashboardHello::new()),
        rx,
    )
}

/// POST /api/check-now — relay a CHECK_NOW command to every device.
pub async fn check_now(
    State(state): State<AppState>,
    body: Option<Json<serde_json::Value>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let reason = body
        .as_ref()
        .and_then(|Json(value)| value.get("reason"))
        .and_then(|value| value.as_str())
        .map(str::to_owned);

    match state.relay.dispatch(CMD_CHECK_NOW, reason) {
        Ok(outcome) => Ok(Json(json!({
            "success": true,
            "message": format!("CHECK_NOW sent to {} ESP32 device(s)", outcome.recipients),
            "deviceCount": outcome.recipients,
        }))),
        Err(DispatchError::NoRecipients) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "No ESP32 devices connected to command stream",
            })),
        )),
    }
}

/// GET /api/device-scans
pub async fn list_scans(State(state): State<AppState>) -> Json<Vec<DeviceScan>> {
    Json(state.relay.scan_store().list())
}

/// GET /api/device-scan/{id}
pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceScan>, (StatusCode, Json<serde_json::Value>)> {
    state
        .relay
        .scan_store()
        .get(&ScanId::from_raw(id))
        .map(Json)
        .map_err(|_| {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Scan not found"})),
            )
        })
}

/// GET /api/device-scans/latest
pub async fn latest_scan(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.relay.scan_store().latest() {
        Some(scan) => Json(json!(scan)),
        None => Json(json!({"message": "No scans available"})),
    }
}

/// DELETE /api/device-scans
pub async fn clear_scans(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.relay.scan_store().clear();
    Json(json!({"success": true, "message": "Device scans cleared"}))
}

/// GET /api/logs
pub async fn list_logs(State(state): State<AppState>) -> Json<Vec<Event>> {
    Json(state.relay.log_store().list())
}

/// DELETE /api/logs
pub async fn clear_logs(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.relay.log_store().clear();
    Json(json!({"success": true, "message": "Logs cleared"}))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let latest_scan = state.relay.scan_store().latest().map(|scan| {
        json!({
            "timestamp": scan.formatted_time,
            "deviceCount": scan.device_count,
        })
    });

    Json(json!({
        "status": "online",
        "totalLogs": state.relay.log_store().len(),
        "totalDeviceScans": state.relay.scan_store().len(),
        "connectedDashboards": state.relay.dashboard_count(),
        "connectedESP32s": state.relay.device_count(),
        "latestScan": latest_scan,
    }))
}

/// GET /api/esp32/status
pub async fn device_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let count = state.relay.device_count();
    Json(json!({
        "connected": count > 0,
        "deviceCount": count,
    }))
}
