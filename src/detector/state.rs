//! Persistent records shared by every matcher invocation
//!
//! Both records live in single-slot stores for the lifetime of the loaded
//! detector. Stores hold them in their raw layouts (`int32` progress plus an
//! optional `uint64` timestamp, `int32` count), so every read validates
//! ranges.

use super::error::StoreError;

/// Record kept in a single-slot store in its raw layout
pub trait SlotRecord: Copy + Send + Sync {
    type Raw: Copy + Send + Sync;

    fn to_raw(&self) -> Self::Raw;

    /// Decode a raw record, rejecting out-of-range fields
    fn from_raw(raw: Self::Raw) -> Result<Self, StoreError>;
}

/// Highest progress value; reached after ten matched keys, before the terminal one
pub const MAX_PROGRESS: u8 = 10;

/// Progress through the target sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchState {
    /// Matched keys since the last reset, always in `0..=MAX_PROGRESS`
    pub progress: u8,
    /// Monotonic nanoseconds of the last processed key-down
    pub last_press: Option<u64>,
}

impl MatchState {
    pub const SLOT: &'static str = "match_state";

    /// Fresh state as created at load time
    pub const fn initial() -> Self {
        Self {
            progress: 0,
            last_press: None,
        }
    }

    /// State after a mismatch or activation
    pub fn reset(self, now: Option<u64>) -> Self {
        Self {
            progress: 0,
            last_press: now.or(self.last_press),
        }
    }
}

impl SlotRecord for MatchState {
    /// `(progress, last_press)`; a zero timestamp means "never pressed"
    type Raw = (i32, u64);

    fn to_raw(&self) -> Self::Raw {
        (i32::from(self.progress), self.last_press.unwrap_or(0))
    }

    fn from_raw((progress, last_press): Self::Raw) -> Result<Self, StoreError> {
        let progress = u8::try_from(progress)
            .ok()
            .filter(|p| *p <= MAX_PROGRESS)
            .ok_or(StoreError::OutOfRange {
                slot: Self::SLOT,
                value: i64::from(progress),
            })?;

        Ok(Self {
            progress,
            last_press: (last_press != 0).then_some(last_press),
        })
    }
}

/// Number of completed sequences since load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct ActivationCount {
    pub count: u32,
}

impl ActivationCount {
    pub const SLOT: &'static str = "activation_counter";

    /// Next count; saturates at the largest value the raw `int32` can hold
    pub fn incremented(self) -> Self {
        Self {
            count: self.count.saturating_add(1).min(i32::MAX as u32),
        }
    }
}

impl SlotRecord for ActivationCount {
    type Raw = i32;

    fn to_raw(&self) -> i32 {
        i32::try_from(self.count).unwrap_or(i32::MAX)
    }

    fn from_raw(count: i32) -> Result<Self, StoreError> {
        u32::try_from(count)
            .map(|count| Self { count })
            .map_err(|_| StoreError::OutOfRange {
                slot: Self::SLOT,
                value: i64::from(count),
            })
    }
}
