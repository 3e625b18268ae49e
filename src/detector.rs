//! Detector engine - Konami code matching over input key-down events
//!
//! This module holds everything that runs on the event path: the target
//! sequence and its transition function, the single-slot stores for the
//! match state and the activation counter, and the notification channel
//! that carries note records to the audio consumer.

pub mod emitter;
pub mod error;
pub mod matcher;
pub mod sequence;
pub mod state;
pub mod store;


pub use emitter::{note_channel, NoteEmitter, NoteReceiver, NoteSender, ReceivedRecord};
pub use error::{DetectorError, EmitError, StoreError, WireError};
pub use matcher::{
    handle_event, on_key_down, Clock, DetectorContext, LocalDetector, ManualClock, MatcherOptions,
    MonotonicClock, Outcome,
};
pub use sequence::{NoteTable, Transition, ACTIVATION_CHIME, SEQUENCE, SEQUENCE_LEN};
pub use state::{ActivationCount, MatchState, SlotRecord, MAX_PROGRESS};
pub use store::{SingleSlot, SlotStore};
