use crate::limits::*;
use crate::model::*;

use super::store::EventStore;
use super::EngineError;

/// True iff an active event other than `exclude` intersects `span`.
pub fn has_active_overlap<S: EventStore + ?Sized>(
    store: &S,
    span: &Span,
    exclude: Option<EventId>,
) -> bool {
    store.find_active_overlap(span, exclude).is_some()
}

pub(crate) fn check_no_overlap<S: EventStore + ?Sized>(
    store: &S,
    span: &Span,
    exclude: Option<EventId>,
) -> Result<(), EngineError> {
    match store.find_active_overlap(span, exclude) {
        Some(existing) => Err(EngineError::Overlap(existing.id)),
        None => Ok(()),
    }
}

/// Borrowed, presence-checked view of an `EventInput`.
pub(crate) struct RequiredFields<'a> {
    pub title: &'a str,
    pub start_time: &'a str,
    pub end_time: &'a str,
}

/// Absent and empty fields both count as missing.
pub(crate) fn required_fields(input: &EventInput) -> Result<RequiredFields<'_>, EngineError> {
    fn present(field: &Option<String>) -> Option<&str> {
        field.as_deref().filter(|s| !s.is_empty())
    }
    match (
        present(&input.title),
        present(&input.start_time),
        present(&input.end_time),
    ) {
        (Some(title), Some(start_time), Some(end_time)) => {
            if title.len() > MAX_TITLE_LEN {
                return Err(EngineError::LimitExceeded("title too long"));
            }
            Ok(RequiredFields {
                title,
                start_time,
                end_time,
            })
        }
        _ => Err(EngineError::MissingFields),
    }
}

pub(crate) fn require_id(id: Option<EventId>) -> Result<EventId, EngineError> {
    id.ok_or(EngineError::MissingId)
}
