use pulse_core::events::{
    DeviceScan, Event, KIND_DEVICE_CONNECTED, KIND_DEVICE_DISCONNECTED, KIND_SCAN_COMPLETE,
};
use pulse_core::ids::ScanId;
use pulse_core::messages::{Command, DashboardMessage, ScanNotice, DEFAULT_COMMAND_REASON};
use pulse_core::report::Report;
use pulse_store::BoundedStore;
use tokio::sync::mpsc;

use crate::streams::{ClientId, StreamRegistry};

/// What [`Relay::ingest`] did with a report.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Routed to the log path.
    Log(Event),
    /// Routed to the scan path.
    Scan { id: ScanId, device_count: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no devices connected to command stream")]
    NoRecipients,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    /// Confirmed writes; per-recipient failures are swallowed.
    pub recipients: usize,
}

/// The shared-state owner: both event stores and both connection pools
/// live here, and every mutation goes through one of its methods. Ingest
/// and dispatch complete their fan-out before returning.
pub struct Relay {
    log_store: BoundedStore<Event>,
    scan_store: BoundedStore<DeviceScan>,
    dashboards: StreamRegistry<DashboardMessage>,
    devices: StreamRegistry<Command>,
}

impl Relay {
    pub fn new(log_capacity: usize, scan_capacity: usize, max_send_queue: usize) -> Self {
        Self {
            log_store: BoundedStore::new(log_capacity),
            scan_store: BoundedStore::new(scan_capacity),
            dashboards: StreamRegistry::new("dashboard", max_send_queue),
            devices: StreamRegistry::new("device", max_send_queue),
        }
    }

    pub fn log_store(&self) -> &BoundedStore<Event> {
        &self.log_store
    }

    pub fn scan_store(&self) -> &BoundedStore<DeviceScan> {
        &self.scan_store
    }

    pub fn dashboard_count(&self) -> usize {
        self.dashboards.count()
    }

    pub fn device_count(&self) -> usize {
        self.devices.count()
    }

    /// Append an event to the log and fan it out to the dashboard pool.
    fn record(&self, event: Event) -> Event {
        self.log_store.append(event.clone());
        self.dashboards.broadcast(&DashboardMessage::Log(event.clone()));
        event
    }

    /// Classify and store an incoming device report, fanning updates out
    /// to connected dashboards. Never fails: missing or odd-shaped fields
    /// are defaulted.
    pub fn ingest(&self, raw: serde_json::Value) -> IngestOutcome {
        let report = Report::from_value(&raw);

        if report.is_scan() {
            let scan = DeviceScan::from_report(&report, raw);
            tracing::info!(
                scan_id = %scan.id,
                devices = scan.device_count,
                "Complete device scan received"
            );

            let id = scan.id.clone();
            let device_count = scan.device_count;
            let notice = ScanNotice::for_scan(&scan);
            self.scan_store.append(scan);

            self.record(Event::new(
                KIND_SCAN_COMPLETE,
                format!("Complete device scan received with {device_count} devices"),
            ));
            self.dashboards.broadcast(&DashboardMessage::ScanReady(notice));

            IngestOutcome::Scan { id, device_count }
        } else {
            let event = Event::new(report.kind_or_default(), report.status_or_default());
            tracing::info!(kind = %event.kind, status = %event.message, "Report received");
            IngestOutcome::Log(self.record(event))
        }
    }

    /// Relay a command to every connected device listener, then record an
    /// audit event. Fails only when the device pool is empty; partial
    /// write failures just lower the recipient count.
    pub fn dispatch(
        &self,
        command: &str,
        reason: Option<String>,
    ) -> Result<DispatchOutcome, DispatchError> {
        if self.devices.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let frame = Command::new(
            command,
            Some(reason.unwrap_or_else(|| DEFAULT_COMMAND_REASON.to_string())),
        );
        let recipients = self.devices.broadcast(&frame);
        tracing::info!(command, recipients, "Command dispatched");

        self.record(Event::new(
            format!("{command}_SENT"),
            format!("{command} command sent to {recipients} ESP32 device(s)"),
        ));

        Ok(DispatchOutcome { recipients })
    }

    /// Join the device pool; announces the connection on the dashboards.
    pub fn attach_device(&self) -> (ClientId, mpsc::Receiver<Command>) {
        let (id, rx) = self.devices.join();
        tracing::info!(
            client_id = %id,
            total = self.devices.count(),
            "ESP32 connected to command stream"
        );
        self.record(Event::new(
            KIND_DEVICE_CONNECTED,
            "ESP32 connected to command stream",
        ));
        (id, rx)
    }

    pub fn detach_device(&self, id: &ClientId) {
        self.devices.leave(id);
        tracing::info!(
            client_id = %id,
            remaining = self.devices.count(),
            "ESP32 disconnected"
        );
        self.record(Event::new(
            KIND_DEVICE_DISCONNECTED,
            "ESP32 disconnected from command stream",
        ));
    }

    pub fn attach_dashboard(&self) -> (ClientId, mpsc::Receiver<DashboardMessage>) {
        let (id, rx) = self.dashboards.join();
        tracing::debug!(client_id = %id, total = self.dashboards.count(), "Dashboard connected");
        (id, rx)
    }

    pub fn detach_dashboard(&self, id: &ClientId) {
        self.dashboards.leave(id);
        tracing::debug!(client_id = %id, "Dashboard disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::messages::CMD_CHECK_NOW;
    use serde_json::json;

    fn relay() -> Relay {
        Relay::new(1000, 100, 32)
    }

    #[test]
    fn log_report_appends_one_event_and_broadcasts_once() {
        let relay = relay();
        let (_id, mut rx) = relay.attach_dashboard();

        let outcome = relay.ingest(json!({"type": "PING", "status": "ok"}));
        let IngestOutcome::Log(event) = outcome else {
            panic!("expected log outcome");
        };
        assert_eq!(event.kind, "PING");
        assert_eq!(event.message, "ok");
        assert_eq!(relay.log_store().len(), 1);

        // Exactly one frame on the dashboard queue.
        let frame = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "PING");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn report_without_kind_defaults_to_unknown() {
        let relay = relay();
        let IngestOutcome::Log(event) = relay.ingest(json!({"status": "hm"})) else {
            panic!("expected log outcome");
        };
        assert_eq!(event.kind, "UNKNOWN");
    }

    #[test]
    fn scan_report_counts_devices() {
        let relay = relay();
        let outcome = relay.ingest(json!({
            "type": "COMPLETE_DEVICE_DATA",
            "data": "A|||B|||C|||",
        }));
        let IngestOutcome::Scan { device_count, .. } = outcome else {
            panic!("expected scan outcome");
        };
        assert_eq!(device_count, 3);
    }

    #[test]
    fn scan_report_without_data_counts_zero() {
        let relay = relay();
        let IngestOutcome::Scan { device_count, .. } =
            relay.ingest(json!({"type": "COMPLETE_DEVICE_DATA"}))
        else {
            panic!("expected scan outcome");
        };
        assert_eq!(device_count, 0);
    }

    #[test]
    fn scan_path_stores_scan_and_summary_event() {
        let relay = relay();
        let raw = json!({"type": "COMPLETE_DEVICE_DATA", "data": "A|||B|||"});
        let IngestOutcome::Scan { id, .. } = relay.ingest(raw.clone()) else {
            panic!("expected scan outcome");
        };

        let scan = relay.scan_store().get(&id).unwrap();
        assert_eq!(scan.raw, raw);

        let summary = relay.log_store().latest().unwrap();
        assert_eq!(summary.kind, "DEVICE_SCAN_COMPLETE");
        assert_eq!(summary.message, "Complete device scan received with 2 devices");
    }

    #[test]
    fn scan_path_broadcasts_summary_then_notice() {
        let relay = relay();
        let (_id, mut rx) = relay.attach_dashboard();

        let IngestOutcome::Scan { id, .. } = relay.ingest(json!({
            "type": "COMPLETE_DEVICE_DATA",
            "data": "A|||",
        })) else {
            panic!("expected scan outcome");
        };

        let first = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["type"], "DEVICE_SCAN_COMPLETE");

        let second = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(second["type"], "FULL_DEVICE_DATA");
        assert_eq!(second["scanId"], id.as_str());
        assert_eq!(second["deviceCount"], 1);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_without_devices_is_no_recipients() {
        let relay = relay();
        let before = relay.log_store().len();

        let result = relay.dispatch(CMD_CHECK_NOW, Some("test".into()));
        assert!(matches!(result, Err(DispatchError::NoRecipients)));

        // No audit event, no broadcast.
        assert_eq!(relay.log_store().len(), before);
    }

    #[test]
    fn dispatch_reaches_all_devices_and_audits() {
        let relay = relay();
        let (_dash, mut dash_rx) = relay.attach_dashboard();
        let (_d1, mut rx1) = relay.attach_device();
        let (_d2, mut rx2) = relay.attach_device();
        // Drain the two connect announcements.
        dash_rx.try_recv().unwrap();
        dash_rx.try_recv().unwrap();

        let outcome = relay.dispatch(CMD_CHECK_NOW, Some("test".into())).unwrap();
        assert_eq!(outcome.recipients, 2);

        let cmd = serde_json::to_value(rx1.try_recv().unwrap()).unwrap();
        assert_eq!(cmd["command"], "CHECK_NOW");
        assert_eq!(cmd["reason"], "test");
        assert!(rx2.try_recv().is_ok());

        let audit = relay.log_store().latest().unwrap();
        assert_eq!(audit.kind, "CHECK_NOW_SENT");
        assert_eq!(audit.message, "CHECK_NOW command sent to 2 ESP32 device(s)");

        // Audit event reached the dashboard too.
        let frame = serde_json::to_value(dash_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "CHECK_NOW_SENT");
    }

    #[test]
    fn dispatch_defaults_reason() {
        let relay = relay();
        let (_d, mut rx) = relay.attach_device();

        relay.dispatch(CMD_CHECK_NOW, None).unwrap();
        let cmd = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(cmd["reason"], "Manual trigger from dashboard");
    }

    #[test]
    fn dispatch_with_failed_write_keeps_handle() {
        let relay = relay();
        let (_d1, rx1) = relay.attach_device();
        let (_d2, mut rx2) = relay.attach_device();
        let (_d3, mut rx3) = relay.attach_device();

        // One device's receive side is gone: its write fails, the other
        // two still get the command, and the pool keeps all three.
        drop(rx1);

        let outcome = relay.dispatch(CMD_CHECK_NOW, Some("test".into())).unwrap();
        assert_eq!(outcome.recipients, 2);
        assert_eq!(relay.device_count(), 3);
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
    }

    #[test]
    fn device_lifecycle_is_announced() {
        let relay = relay();
        let (_dash, mut dash_rx) = relay.attach_dashboard();

        let (device, _rx) = relay.attach_device();
        assert_eq!(relay.device_count(), 1);
        let connected = relay.log_store().latest().unwrap();
        assert_eq!(connected.kind, "ESP32_CONNECTED");
        let frame = serde_json::to_value(dash_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "ESP32_CONNECTED");

        relay.detach_device(&device);
        assert_eq!(relay.device_count(), 0);
        let disconnected = relay.log_store().latest().unwrap();
        assert_eq!(disconnected.kind, "ESP32_DISCONNECTED");
        let frame = serde_json::to_value(dash_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "ESP32_DISCONNECTED");
    }

    #[test]
    fn clearing_scans_leaves_logs_and_pools_alone() {
        let relay = relay();
        let (_dash, _dash_rx) = relay.attach_dashboard();
        let (_dev, _dev_rx) = relay.attach_device();

        relay.ingest(json!({"type": "COMPLETE_DEVICE_DATA", "data": "A|||"}));
        relay.ingest(json!({"type": "PING", "status": "ok"}));
        assert_eq!(relay.scan_store().len(), 1);

        relay.scan_store().clear();
        assert!(relay.scan_store().is_empty());
        assert!(relay.log_store().len() > 0);
        assert_eq!(relay.dashboard_count(), 1);
        assert_eq!(relay.device_count(), 1);
    }
}
