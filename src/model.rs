use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix seconds, UTC. The only time type.
pub type Secs = i64;

/// Store-assigned event identifier.
pub type EventId = Ulid;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Secs,
    pub end: Secs,
}

impl Span {
    pub fn new(start: Secs, end: Secs) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_secs(&self) -> Secs {
        self.end - self.start
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Booking status. Only `Booked` and `Blocked` occupy their span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Booked,
    Blocked,
    Released,
}

impl Status {
    pub fn is_active(self) -> bool {
        matches!(self, Status::Booked | Status::Blocked)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Booked => "booked",
            Status::Blocked => "blocked",
            Status::Released => "released",
        }
    }

    /// Transitions reachable through block/release.
    ///
    /// `Booked` is only ever entered on creation and `Released` is terminal.
    /// Staying in the current state is always allowed.
    pub fn can_become(self, next: Status) -> bool {
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Status::Booked, Status::Blocked)
                | (Status::Booked, Status::Released)
                | (Status::Blocked, Status::Released)
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub span: Span,
    pub status: Status,
}

impl Event {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Raw booking/update payload as supplied by a client. Every field is
/// optional here; presence is checked by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl EventInput {
    pub fn new(title: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
        }
    }
}

/// An entry in the active-interval index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub id: EventId,
    pub span: Span,
}

/// The change records: flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    Booked {
        event: Event,
    },
    Rescheduled {
        id: EventId,
        title: String,
        span: Span,
    },
    StatusChanged {
        id: EventId,
        status: Status,
    },
    Deleted {
        id: EventId,
    },
}

impl Change {
    pub fn event_id(&self) -> EventId {
        match self {
            Change::Booked { event } => event.id,
            Change::Rescheduled { id, .. }
            | Change::StatusChanged { id, .. }
            | Change::Deleted { id } => *id,
        }
    }
}
