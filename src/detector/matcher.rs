//! Sequence matcher - the per-event entry point of the detector
//!
//! `handle_event` is called once per input event, possibly from several
//! producers at the same time. Each call is a single bounded pass: one read
//! of the match state, one table lookup, at most two note emissions, one
//! write of the match state (plus one counter write on activation). It never
//! blocks, sleeps or retries.
//!
//! All shared state is reached through an explicitly passed
//! [`DetectorContext`], so every test can build an isolated detector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::emitter::{NoteEmitter, NoteSender};
use super::error::DetectorError;
use super::sequence::{step_note, transition, NoteTable, Transition, ACTIVATION_CHIME, SEQUENCE};
use super::state::{ActivationCount, MatchState};
use super::store::{SingleSlot, SlotStore};
use crate::input::codes::{is_key_down, key_name};
use crate::sound::note::SoundNote;

/// Source of monotonic timestamps for `MatchState::last_press`
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// Nanoseconds since the detector was created
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    /// Never zero; the raw record uses zero for "no timestamp"
    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}

/// Clock that only moves when told to
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ns),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

/// Behavior knobs for the matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherOptions {
    /// Let a mismatch at step 4 or 6 fall through to the next step's check
    pub fallthrough_quirk: bool,
    pub notes: NoteTable,
    pub note_duration_ms: u64,
    /// Progress older than this is treated as zero on the next key-down
    pub sequence_timeout: Option<Duration>,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            fallthrough_quirk: false,
            notes: NoteTable::Chromatic,
            note_duration_ms: 1000,
            sequence_timeout: None,
        }
    }
}

/// What a single event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a key-down; nothing read or written
    Ignored,
    /// The match state slot had no record; the event was skipped
    Uninitialized,
    Advanced {
        progress: u8,
    },
    Reset {
        from: u8,
    },
    /// Sequence completed. `count` is `None` when the counter could not be
    /// read or written, in which case no chime was emitted.
    Activated {
        count: Option<u32>,
    },
}

/// Process-wide detector state, passed explicitly to every invocation
pub struct DetectorContext<S, C, E> {
    pub state: S,
    pub activations: C,
    pub notes: E,
    pub options: MatcherOptions,
    clock: Box<dyn Clock>,
}

/// Detector backed by in-process slots and the note channel
pub type LocalDetector =
    DetectorContext<SingleSlot<MatchState>, SingleSlot<ActivationCount>, NoteEmitter>;

impl LocalDetector {
    /// Detector as created at load time: progress 0, count 0
    pub fn new(notes: NoteEmitter, options: MatcherOptions) -> Self {
        Self::from_parts(
            SingleSlot::new(MatchState::SLOT, MatchState::initial()),
            SingleSlot::new(ActivationCount::SLOT, ActivationCount::default()),
            notes,
            options,
        )
    }
}

impl<S, C, E> DetectorContext<S, C, E>
where
    S: SlotStore<MatchState>,
    C: SlotStore<ActivationCount>,
    E: NoteSender,
{
    pub fn from_parts(state: S, activations: C, notes: E, options: MatcherOptions) -> Self {
        Self {
            state,
            activations,
            notes,
            options,
            clock: Box::new(MonotonicClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn progress(&self) -> Option<u8> {
        self.state.get().map(|s| s.progress)
    }

    pub fn activation_count(&self) -> Option<u32> {
        self.activations.get().map(|a| a.count)
    }

    /// Progress to match against, after applying the inactivity timeout
    fn effective_progress(&self, current: MatchState, now: u64) -> u8 {
        let expired = match (self.options.sequence_timeout, current.last_press) {
            (Some(timeout), Some(last)) => {
                let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
                now.saturating_sub(last) > timeout_ns
            }
            _ => false,
        };

        if expired {
            trace!("Sequence timed out at progress {}", current.progress);
            0
        } else {
            current.progress
        }
    }

    fn emit(&self, producer: usize, note: SoundNote) {
        if let Err(e) = self.notes.emit(producer, note) {
            trace!("Note {} dropped: {}", note, e);
        }
    }

    /// Bump the counter and emit the chime; returns the new count
    fn activate(&self, producer: usize) -> Option<u32> {
        let Some(current) = self.activations.get() else {
            warn!("Activation counter unavailable, activation not recorded");
            return None;
        };

        let next = current.incremented();
        info!("KONAMI CODE entered \\o/ ({} times)", next.count);

        if let Err(e) = self.activations.set(next) {
            warn!("Failed to persist activation count: {}", e);
            return None;
        }

        for note in ACTIVATION_CHIME {
            self.emit(producer, note);
        }

        Some(next.count)
    }
}

/// Entry point for the event interceptor
///
/// Only key-down events (`EV_KEY` with a non-zero value) reach the matcher;
/// everything else returns [`Outcome::Ignored`].
pub fn handle_event<S, C, E>(
    ctx: &DetectorContext<S, C, E>,
    producer: usize,
    event_type: u32,
    code: u32,
    value: i32,
) -> Result<Outcome, DetectorError>
where
    S: SlotStore<MatchState>,
    C: SlotStore<ActivationCount>,
    E: NoteSender,
{
    if !is_key_down(event_type, value) {
        return Ok(Outcome::Ignored);
    }

    on_key_down(ctx, producer, code)
}

/// Feed one key-down code to the matcher
pub fn on_key_down<S, C, E>(
    ctx: &DetectorContext<S, C, E>,
    producer: usize,
    code: u32,
) -> Result<Outcome, DetectorError>
where
    S: SlotStore<MatchState>,
    C: SlotStore<ActivationCount>,
    E: NoteSender,
{
    let Some(current) = ctx.state.get() else {
        trace!("Match state not initialized, skipping key {}", code);
        return Ok(Outcome::Uninitialized);
    };

    let now = ctx.clock.now_ns();
    let progress = ctx.effective_progress(current, now);

    match transition(progress, code, ctx.options.fallthrough_quirk) {
        Transition::Advance {
            step,
            progress: next,
        } => {
            debug!("{} ({}/{})", SEQUENCE[usize::from(step)].label, next, SEQUENCE.len());

            if let Some(note) = step_note(step, ctx.options.notes, ctx.options.note_duration_ms) {
                ctx.emit(producer, note);
            }

            ctx.state.set(MatchState {
                progress: next,
                last_press: Some(now),
            })?;
            Ok(Outcome::Advanced { progress: next })
        }
        Transition::Activate => {
            let count = ctx.activate(producer);
            ctx.state.set(current.reset(Some(now)))?;
            Ok(Outcome::Activated { count })
        }
        Transition::Reset => {
            if progress > 0 {
                let name = u16::try_from(code).ok().and_then(key_name);
                debug!(
                    "Sequence broken at step {} by key {} ({})",
                    progress,
                    code,
                    name.unwrap_or("?")
                );
            }
            ctx.state.set(current.reset(Some(now)))?;
            Ok(Outcome::Reset { from: progress })
        }
    }
}
