use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::cli::Command;

// ── RED metrics (command-driven) ────────────────────────────────

/// Counter: console commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "fleetlink_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "fleetlink_command_duration_seconds";

// ── Booking domain ──────────────────────────────────────────────

/// Counter: bookings stored. Labels: status (initial status).
pub const BOOKINGS_CREATED_TOTAL: &str = "fleetlink_bookings_created_total";

/// Counter: booking or reschedule attempts rejected for overlapping dates.
pub const BOOKING_CONFLICTS_TOTAL: &str = "fleetlink_booking_conflicts_total";

/// Counter: availability checks. Labels: result (free, taken).
pub const AVAILABILITY_CHECKS_TOTAL: &str = "fleetlink_availability_checks_total";

/// Counter: quotes computed for callers.
pub const QUOTES_TOTAL: &str = "fleetlink_quotes_total";

/// Counter: month grids built.
pub const CALENDAR_BUILDS_TOTAL: &str = "fleetlink_calendar_builds_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of open tenant engines.
pub const TENANTS_ACTIVE: &str = "fleetlink_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "fleetlink_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "fleetlink_wal_flush_batch_size";

/// Counter: WAL compactions completed.
pub const WAL_COMPACTIONS_TOTAL: &str = "fleetlink_wal_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short, fixed label for a command.
pub fn command_label(cmd: &Command) -> &'static str {
    use crate::cli::VehicleCommand;
    match cmd {
        Command::Vehicle { command } => match command {
            VehicleCommand::Add { .. } => "vehicle_add",
            VehicleCommand::List { .. } => "vehicle_list",
            VehicleCommand::Update { .. } => "vehicle_update",
            VehicleCommand::Remove { .. } => "vehicle_remove",
        },
        Command::Book { .. } => "book",
        Command::Status { .. } => "status",
        Command::Payment { .. } => "payment",
        Command::Reschedule { .. } => "reschedule",
        Command::Block { .. } => "block",
        Command::Unblock { .. } => "unblock",
        Command::Available { .. } => "available",
        Command::Quote { .. } => "quote",
        Command::Calendar { .. } => "calendar",
        Command::Bookings { .. } => "bookings",
        Command::Stats { .. } => "stats",
        Command::Upcoming { .. } => "upcoming",
        Command::Search { .. } => "search",
        Command::Tenant => "tenant",
        Command::Compact => "compact",
        Command::Serve => "serve",
    }
}
