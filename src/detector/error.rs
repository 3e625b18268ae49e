//! Error taxonomy for the detector engine
//!
//! None of these are fatal. Callers log them and keep processing events.

use thiserror::Error;

/// Failure writing to (or decoding from) a single-slot store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing slot refused the write
    #[error("write to slot '{slot}' was rejected")]
    WriteRejected { slot: &'static str },

    /// A raw record held a value outside its allowed range
    #[error("slot '{slot}' holds out-of-range value {value}")]
    OutOfRange { slot: &'static str, value: i64 },
}

/// Failure handing a note to the notification channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// The producer's ring is full; the record was dropped
    #[error("note ring for producer {producer} is full, record dropped")]
    Full { producer: usize },

    /// No consumer is attached anymore
    #[error("note consumer is gone, record dropped")]
    Disconnected,
}

/// Failure decoding a wire record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("note record too short: {len} bytes")]
    Truncated { len: usize },
}

/// Non-fatal status reported by `handle_event`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// The match state could not be persisted; progress for this event is lost
    #[error("failed to persist match state: {0}")]
    Store(#[from] StoreError),
}
