use crate::model::Secs;

/// Max byte length of an event title.
pub const MAX_TITLE_LEN: usize = 1024;

/// Max number of events (any status) held by one engine.
pub const MAX_EVENTS: usize = 1_000_000;

/// Max byte length of a raw timestamp before it is even parsed.
pub const MAX_TIMESTAMP_LEN: usize = 64;

/// 0000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP: Secs = -62_167_219_200;

/// 9999-12-31T23:59:59Z
pub const MAX_VALID_TIMESTAMP: Secs = 253_402_300_799;

/// Max encoded size of one WAL record; longer length prefixes mean corruption.
pub const MAX_WAL_RECORD_LEN: usize = 64 * 1024;
