use clap::Parser;
use pulse_server::ServerConfig;
use pulse_telemetry::TelemetryConfig;

/// Telemetry relay for embedded field devices.
#[derive(Debug, Parser)]
#[command(name = "pulse", version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Capacity of the in-memory event log.
    #[arg(long, default_value_t = 1000)]
    log_capacity: usize,

    /// Capacity of the in-memory device-scan store.
    #[arg(long, default_value_t = 100)]
    scan_capacity: usize,

    /// Outbound queue size per streaming connection.
    #[arg(long, default_value_t = 256)]
    max_send_queue: usize,

    /// Default log level. Overridden by RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    pulse_telemetry::init_telemetry(&TelemetryConfig {
        log_level: args.log_level,
        module_levels: Vec::new(),
        json_output: args.json_logs,
    });

    tracing::info!("Starting pulse relay");

    let config = ServerConfig {
        port: args.port,
        max_send_queue: args.max_send_queue,
        log_capacity: args.log_capacity,
        scan_capacity: args.scan_capacity,
    };

    let handle = pulse_server::start(config)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "Pulse relay ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
