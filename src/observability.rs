use std::net::SocketAddr;

use crate::wire::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total protocol commands handled. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "slotwise_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "slotwise_command_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Gauge: number of active tenants (loaded services).
pub const TENANTS_ACTIVE: &str = "slotwise_tenants_active";

/// Counter: bookings persisted.
pub const BOOKINGS_CREATED_TOTAL: &str = "slotwise_bookings_created_total";

/// Counter: booking attempts answered with a conflict.
pub const BOOKING_CONFLICTS_TOTAL: &str = "slotwise_booking_conflicts_total";

/// Counter: pending holds cancelled by the sweep.
pub const HOLDS_EXPIRED_TOTAL: &str = "slotwise_holds_expired_total";

/// Counter: notifications that could not be delivered.
pub const NOTIFY_FAILURES_TOTAL: &str = "slotwise_notify_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::PutFacility { .. } => "put_facility",
        Command::AddBlock { .. } => "add_block",
        Command::Preview { .. } => "preview",
        Command::Book { .. } => "book",
        Command::ChangeStatus { .. } => "change_status",
        Command::Availability { .. } => "availability",
        Command::Sweep => "sweep",
        Command::Price { .. } => "price",
        Command::ValidateTransition { .. } => "validate_transition",
    }
}
