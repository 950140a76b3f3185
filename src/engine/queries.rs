use crate::model::*;

use super::conflict::has_active_overlap;
use super::{Engine, EventStore};

impl<S: EventStore> Engine<S> {
    /// All events, any status, in insertion order.
    pub async fn list(&self) -> Vec<Event> {
        self.store.read().await.get_all()
    }

    pub async fn get(&self, id: &EventId) -> Option<Event> {
        self.store.read().await.get_by_id(id).cloned()
    }

    /// Whether `span` would collide with an active event other than `exclude`.
    /// Advisory only: the answer can be stale by the time a write arrives.
    pub async fn is_occupied(&self, span: &Span, exclude: Option<EventId>) -> bool {
        has_active_overlap(&*self.store.read().await, span, exclude)
    }

    /// `(total, active)` event counts.
    pub async fn counts(&self) -> (usize, usize) {
        let store = self.store.read().await;
        (store.len(), store.active_count())
    }
}
