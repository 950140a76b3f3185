use crate::model::{EventId, Secs, Status};
use crate::time;

#[derive(Debug)]
pub enum EngineError {
    MissingFields,
    MissingId,
    InvalidFormat(String),
    InvalidInterval {
        start: Secs,
        end: Secs,
    },
    Overlap(EventId),
    NotFound(EventId),
    InvalidTransition {
        id: EventId,
        from: Status,
        to: Status,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingFields => write!(f, "missing required fields: title, startTime, endTime"),
            EngineError::MissingId => write!(f, "event id is required"),
            EngineError::InvalidFormat(raw) => write!(f, "invalid date format: {raw:?}"),
            EngineError::InvalidInterval { start, end } => {
                write!(
                    f,
                    "start {} must be before end {}",
                    time::format(*start),
                    time::format(*end)
                )
            }
            EngineError::Overlap(id) => write!(f, "overlaps with active event: {id}"),
            EngineError::NotFound(id) => write!(f, "event not found: {id}"),
            EngineError::InvalidTransition { id, from, to } => {
                write!(f, "event {id} cannot move from {from} to {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
