//! Konami code detector
//!
//! Watches keyboard key-down events, matches them against Up, Up, Down,
//! Down, Left, Right, Left, Right, B, A, Enter and, on completion, counts an
//! activation and sends a two-note chime to an audio consumer.
//!
//! The [`detector`] module is the event-path engine. The rest of the crate
//! hosts it: keyboard readers in [`input`], note playback in [`sound`], the
//! activation watcher in [`activation`] and configuration in [`config`].

pub mod activation;
pub mod config;
pub mod detector;
pub mod input;
pub mod paths;
pub mod sound;

pub use detector::{handle_event, DetectorContext, LocalDetector, MatcherOptions, Outcome};
