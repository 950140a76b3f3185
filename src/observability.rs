use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations served. Labels: operation, status.
pub const OPERATIONS_TOTAL: &str = "slotbook_operations_total";

/// Histogram: operation latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "slotbook_operation_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: events currently occupying their span (booked or blocked).
pub const EVENTS_ACTIVE: &str = "slotbook_events_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (changes per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "slotbook_wal_compactions_total";

/// Engine operations as exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Book,
    List,
    Block,
    Release,
    Update,
    Delete,
}

impl Operation {
    /// Short label for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Operation::Book => "book",
            Operation::List => "list",
            Operation::Block => "block",
            Operation::Release => "release",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Record one finished operation. `status` is the HTTP status code.
pub fn record(op: Operation, status: u16, elapsed: std::time::Duration) {
    metrics::counter!(
        OPERATIONS_TOTAL,
        "operation" => op.label(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => op.label())
        .record(elapsed.as_secs_f64());
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
