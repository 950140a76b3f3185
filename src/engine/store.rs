use std::collections::{BTreeMap, HashMap};

use ulid::{Generator, Ulid};

use crate::model::*;

/// Persistence contract consumed by the engine.
///
/// Implementations are plain data structures: the engine holds its own lock
/// around every call sequence, so nothing here needs interior mutability.
pub trait EventStore: Send + Sync {
    /// Mint a fresh id. Ids are never handed out twice.
    fn next_id(&mut self) -> EventId;

    fn insert(&mut self, event: Event);

    fn get_by_id(&self, id: &EventId) -> Option<&Event>;

    /// All events in insertion order.
    fn get_all(&self) -> Vec<Event>;

    /// Returns false if the id is unknown.
    fn update_fields(&mut self, id: &EventId, title: String, span: Span) -> bool;

    /// Returns false if the id is unknown.
    fn update_status(&mut self, id: &EventId, status: Status) -> bool;

    fn delete(&mut self, id: &EventId) -> Option<Event>;

    /// First active event whose span intersects `span`, ignoring `exclude`.
    fn find_active_overlap(&self, span: &Span, exclude: Option<EventId>) -> Option<&Event>;

    fn len(&self) -> usize;

    fn active_count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a change record. Used for WAL replay and after a successful append.
    fn apply(&mut self, change: &Change) {
        match change {
            Change::Booked { event } => self.insert(event.clone()),
            Change::Rescheduled { id, title, span } => {
                self.update_fields(id, title.clone(), *span);
            }
            Change::StatusChanged { id, status } => {
                self.update_status(id, *status);
            }
            Change::Deleted { id } => {
                self.delete(id);
            }
        }
    }
}

pub struct InMemoryStore {
    /// Insertion sequence → event. Iteration order is insertion order.
    events: BTreeMap<u64, Event>,
    seq_by_id: HashMap<EventId, u64>,
    next_seq: u64,
    /// Active intervals only, sorted by `span.start`.
    active: Vec<Interval>,
    ids: Generator,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            seq_by_id: HashMap::new(),
            next_seq: 0,
            active: Vec::new(),
            ids: Generator::new(),
        }
    }

    // ── Active index ─────────────────────────────────────────

    /// Insert interval maintaining sort order by span.start.
    fn insert_interval(&mut self, interval: Interval) {
        let pos = self
            .active
            .binary_search_by_key(&interval.span.start, |i| i.span.start)
            .unwrap_or_else(|e| e);
        self.active.insert(pos, interval);
    }

    fn remove_interval(&mut self, id: EventId) -> Option<Interval> {
        let pos = self.active.iter().position(|i| i.id == id)?;
        Some(self.active.remove(pos))
    }

    /// Active intervals whose span overlaps the query window.
    /// Uses binary search to skip intervals starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Interval> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self.active.partition_point(|i| i.span.start < query.end);
        self.active[..right_bound]
            .iter()
            .filter(move |i| i.span.end > query.start)
    }

    fn get_mut(&mut self, id: &EventId) -> Option<&mut Event> {
        let seq = self.seq_by_id.get(id)?;
        self.events.get_mut(seq)
    }
}

impl EventStore for InMemoryStore {
    fn next_id(&mut self) -> EventId {
        // The generator only fails once 2^80 ids were minted in one millisecond.
        self.ids.generate().unwrap_or_else(|_| Ulid::new())
    }

    fn insert(&mut self, event: Event) {
        self.delete(&event.id);
        if event.is_active() {
            self.insert_interval(Interval { id: event.id, span: event.span });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_by_id.insert(event.id, seq);
        self.events.insert(seq, event);
    }

    fn get_by_id(&self, id: &EventId) -> Option<&Event> {
        let seq = self.seq_by_id.get(id)?;
        self.events.get(seq)
    }

    fn get_all(&self) -> Vec<Event> {
        self.events.values().cloned().collect()
    }

    fn update_fields(&mut self, id: &EventId, title: String, span: Span) -> bool {
        let Some(event) = self.get_mut(id) else {
            return false;
        };
        event.title = title;
        event.span = span;
        let active = event.is_active();
        if active {
            self.remove_interval(*id);
            self.insert_interval(Interval { id: *id, span });
        }
        true
    }

    fn update_status(&mut self, id: &EventId, status: Status) -> bool {
        let Some(event) = self.get_mut(id) else {
            return false;
        };
        let was_active = event.is_active();
        event.status = status;
        let span = event.span;
        match (was_active, status.is_active()) {
            (true, false) => {
                self.remove_interval(*id);
            }
            (false, true) => self.insert_interval(Interval { id: *id, span }),
            _ => {}
        }
        true
    }

    fn delete(&mut self, id: &EventId) -> Option<Event> {
        let seq = self.seq_by_id.remove(id)?;
        let event = self.events.remove(&seq)?;
        if event.is_active() {
            self.remove_interval(*id);
        }
        Some(event)
    }

    fn find_active_overlap(&self, span: &Span, exclude: Option<EventId>) -> Option<&Event> {
        self.overlapping(span)
            .find(|i| Some(i.id) != exclude)
            .and_then(|i| self.get_by_id(&i.id))
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn active_count(&self) -> usize {
        self.active.len()
    }
}
