use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::service::Request;

// ── Engine metrics ──────────────────────────────────────────────

/// Counter: reserve calls by result. Labels: outcome (reserved, no_availability, contention).
pub const RESERVATIONS_TOTAL: &str = "parkline_reservations_total";

/// Counter: commits that lost a race and were retried.
pub const COMMIT_CONFLICTS_TOTAL: &str = "parkline_commit_conflicts_total";

/// Counter: reservations cancelled, by callers or the reaper.
pub const CANCELLATIONS_TOTAL: &str = "parkline_cancellations_total";

/// Counter: unpaid holds cancelled by the reaper.
pub const HOLDS_REAPED_TOTAL: &str = "parkline_holds_reaped_total";

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests executed. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "parkline_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "parkline_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "parkline_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "parkline_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "parkline_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Request variant to a short label for metrics.
pub fn op_label(request: &Request) -> &'static str {
    match request {
        Request::ProvisionFacility { .. } => "provision_facility",
        Request::ProvisionSlot { .. } => "provision_slot",
        Request::Reserve { .. } => "reserve",
        Request::MarkPaid { .. } => "mark_paid",
        Request::Cancel { .. } => "cancel",
        Request::CheckIn { .. } => "check_in",
        Request::CheckOut { .. } => "check_out",
        Request::Calculate { .. } => "calculate",
        Request::FreeSlots { .. } => "free_slots",
        Request::FreeWindows { .. } => "free_windows",
        Request::GetReservation { .. } => "get_reservation",
        Request::SlotReservations { .. } => "slot_reservations",
        Request::ListSlots { .. } => "list_slots",
        Request::ListFacilities => "list_facilities",
    }
}
