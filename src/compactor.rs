use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::engine::{Engine, EventStore};
use crate::observability;

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor<S: EventStore + 'static>(engine: Arc<Engine<S>>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}

/// Returns true if a compaction ran and succeeded.
pub async fn compact_if_needed<S: EventStore + 'static>(engine: &Engine<S>, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(kept) => {
            info!("compacted WAL: {appends} appends folded into {kept} records");
            metrics::counter!(observability::WAL_COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            true
        }
        Err(e) => {
            error!("WAL compaction failed: {e}");
            metrics::counter!(observability::WAL_COMPACTIONS_TOTAL, "status" => "error")
                .increment(1);
            false
        }
    }
}
