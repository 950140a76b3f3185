use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;
use crate::time;

use super::conflict::{check_no_overlap, require_id, required_fields};
use super::{Engine, EngineError, EventStore, WalCommand};

impl<S: EventStore + 'static> Engine<S> {
    /// Create a new `booked` event if its span is free.
    pub async fn book(&self, input: EventInput) -> Result<Event, EngineError> {
        let fields = required_fields(&input)?;
        let span = time::parse_span(fields.start_time, fields.end_time)?;

        let mut store = self.write_store().await;
        if let Err(e) = check_no_overlap(&*store, &span, None) {
            debug!("book rejected [{}, {}): {e}", span.start, span.end);
            return Err(e);
        }
        if store.len() >= MAX_EVENTS {
            return Err(EngineError::LimitExceeded("too many events"));
        }

        let event = Event {
            id: store.next_id(),
            title: fields.title.to_string(),
            span,
            status: Status::Booked,
        };
        self.persist_and_apply(store, Change::Booked { event: event.clone() })
            .await?;
        info!(
            "booked {} [{}, {})",
            event.id,
            time::format(span.start),
            time::format(span.end)
        );
        Ok(event)
    }

    /// Replace title and span of an existing event, keeping its status.
    /// The event's own current span never counts as a conflict.
    pub async fn update(&self, id: EventId, input: EventInput) -> Result<Event, EngineError> {
        let fields = required_fields(&input)?;
        // Parsed outside the lock; a missing event is reported before a bad format.
        let span = time::parse_span(fields.start_time, fields.end_time);

        let store = self.write_store().await;
        if store.get_by_id(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let span = span?;
        if let Err(e) = check_no_overlap(&*store, &span, Some(id)) {
            debug!("update of {id} rejected [{}, {}): {e}", span.start, span.end);
            return Err(e);
        }

        let change = Change::Rescheduled {
            id,
            title: fields.title.to_string(),
            span,
        };
        let store = self.persist_and_apply(store, change).await?;
        info!(
            "updated {id} [{}, {})",
            time::format(span.start),
            time::format(span.end)
        );
        store
            .get_by_id(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    /// Mark an event `blocked`. The span is unchanged and stays occupied,
    /// so no overlap check is needed.
    pub async fn block(&self, id: Option<EventId>) -> Result<Event, EngineError> {
        self.transition(id, Status::Blocked).await
    }

    /// Mark an event `released`, freeing its span.
    pub async fn release(&self, id: Option<EventId>) -> Result<Event, EngineError> {
        self.transition(id, Status::Released).await
    }

    async fn transition(&self, id: Option<EventId>, to: Status) -> Result<Event, EngineError> {
        let id = require_id(id)?;
        let store = self.write_store().await;
        let current = store
            .get_by_id(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;

        if current.status == to {
            return Ok(current);
        }
        if !current.status.can_become(to) {
            return Err(EngineError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        self.persist_and_apply(store, Change::StatusChanged { id, status: to })
            .await?;
        info!("{id}: {} -> {to}", current.status);
        Ok(Event { status: to, ..current })
    }

    /// Remove an event permanently, whatever its status.
    pub async fn delete(&self, id: EventId) -> Result<Event, EngineError> {
        let store = self.write_store().await;
        let existing = store
            .get_by_id(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        self.persist_and_apply(store, Change::Deleted { id })
            .await?;
        info!("deleted {id} ({})", existing.status);
        Ok(existing)
    }

    /// Rewrite the WAL as one `Booked` record per live event.
    ///
    /// The read lock is held until the swap completes: writers append only
    /// under the write lock, so no change can land between snapshot and swap.
    pub async fn compact_wal(&self) -> Result<usize, EngineError> {
        let store = self.store.read().await;
        let changes: Vec<Change> = store
            .get_all()
            .into_iter()
            .map(|event| Change::Booked { event })
            .collect();
        let count = changes.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { changes, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(store);
        Ok(count)
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
