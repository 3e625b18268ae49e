//! The target sequence and the pure transition function over it
//!
//! `transition` is a bounded, branch-only decision over `(progress, code)`:
//! it performs one table lookup, never loops over input and never touches
//! shared state. The matcher applies its result.

use serde::{Deserialize, Serialize};

use super::state::MAX_PROGRESS;
use crate::input::codes::{KEY_A, KEY_B, KEY_DOWN, KEY_ENTER, KEY_LEFT, KEY_Q, KEY_RIGHT, KEY_UP};
use crate::sound::note::{pitch, SoundNote};

/// Number of keys in the target sequence
pub const SEQUENCE_LEN: usize = MAX_PROGRESS as usize + 1;

/// Steps whose mismatch falls through to the next step's check when the
/// compatibility quirk is enabled
const FALLTHROUGH_STEPS: [u8; 2] = [4, 6];

/// One expected key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub key: u16,
    /// Second physical key accepted for this step (AZERTY places A where QWERTY has Q)
    pub alias: Option<u16>,
    /// Chromatic-scale pitch played when the step matches; `None` on the terminal step
    pub pitch: Option<u64>,
    pub label: &'static str,
}

impl Step {
    const fn new(key: u16, pitch: u64, label: &'static str) -> Self {
        Self {
            key,
            alias: None,
            pitch: Some(pitch),
            label,
        }
    }

    pub fn matches(&self, code: u32) -> bool {
        code == u32::from(self.key) || self.alias.is_some_and(|alias| code == u32::from(alias))
    }
}

/// Up, Up, Down, Down, Left, Right, Left, Right, B, A, Enter
pub const SEQUENCE: [Step; SEQUENCE_LEN] = [
    Step::new(KEY_UP, pitch::C4, "UP"),
    Step::new(KEY_UP, pitch::CS4, "UP"),
    Step::new(KEY_DOWN, pitch::D4, "DOWN"),
    Step::new(KEY_DOWN, pitch::DS4, "DOWN"),
    Step::new(KEY_LEFT, pitch::E4, "LEFT"),
    Step::new(KEY_RIGHT, pitch::F4, "RIGHT"),
    Step::new(KEY_LEFT, pitch::FS4, "LEFT"),
    Step::new(KEY_RIGHT, pitch::G4, "RIGHT"),
    Step::new(KEY_B, pitch::GS4, "B"),
    Step {
        key: KEY_A,
        alias: Some(KEY_Q),
        pitch: Some(pitch::A4),
        label: "A",
    },
    Step {
        key: KEY_ENTER,
        alias: None,
        pitch: None,
        label: "ENTER",
    },
];

/// Two-note chime emitted on activation
pub const ACTIVATION_CHIME: [SoundNote; 2] = [
    SoundNote::new(pitch::AS4, 1000),
    SoundNote::new(pitch::B4, 1000),
];

/// Which notes accompany advancing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteTable {
    /// One ascending chromatic note per step
    #[default]
    Chromatic,
    /// No per-step notes; only the activation chime plays
    Silent,
}

/// Outcome of feeding one key-down to the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Progress moves forward; `step` is the table entry that matched
    Advance { step: u8, progress: u8 },
    /// The terminal key matched at full progress
    Activate,
    /// Mismatch: back to zero
    Reset,
}

/// Decide what a key-down does at the given progress
///
/// With `fallthrough_quirk`, a mismatch at step 4 or 6 that matches the
/// following step's key advances by one using that following step's note,
/// instead of resetting. Without it every step is checked on its own.
pub fn transition(progress: u8, code: u32, fallthrough_quirk: bool) -> Transition {
    let Some(step) = SEQUENCE.get(usize::from(progress)) else {
        return Transition::Reset;
    };

    if step.matches(code) {
        return if progress == MAX_PROGRESS {
            Transition::Activate
        } else {
            Transition::Advance {
                step: progress,
                progress: progress + 1,
            }
        };
    }

    if fallthrough_quirk
        && FALLTHROUGH_STEPS.contains(&progress)
        && SEQUENCE[usize::from(progress) + 1].matches(code)
    {
        return Transition::Advance {
            step: progress + 1,
            progress: progress + 1,
        };
    }

    Transition::Reset
}

/// Note for a matched step, if the table plays one
pub fn step_note(step: u8, table: NoteTable, duration_ms: u64) -> Option<SoundNote> {
    match table {
        NoteTable::Silent => None,
        NoteTable::Chromatic => SEQUENCE
            .get(usize::from(step))
            .and_then(|s| s.pitch)
            .map(|freq| SoundNote::new(freq, duration_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sequence_advances_then_activates() {
        for (progress, step) in SEQUENCE.iter().enumerate() {
            let progress = progress as u8;
            let expected = if progress == MAX_PROGRESS {
                Transition::Activate
            } else {
                Transition::Advance {
                    step: progress,
                    progress: progress + 1,
                }
            };
            assert_eq!(transition(progress, u32::from(step.key), false), expected);
        }
    }

    #[test]
    fn test_azerty_alias_on_a_step() {
        let expected = Transition::Advance {
            step: 9,
            progress: 10,
        };
        assert_eq!(transition(9, u32::from(KEY_A), false), expected);
        assert_eq!(transition(9, u32::from(KEY_Q), false), expected);
        // The alias only applies to its own step
        assert_eq!(transition(8, u32::from(KEY_Q), false), Transition::Reset);
    }

    #[test]
    fn test_fallthrough_quirk_disabled() {
        assert_eq!(transition(4, u32::from(KEY_RIGHT), false), Transition::Reset);
        assert_eq!(transition(6, u32::from(KEY_RIGHT), false), Transition::Reset);
    }

    #[test]
    fn test_fallthrough_quirk_enabled() {
        assert_eq!(
            transition(4, u32::from(KEY_RIGHT), true),
            Transition::Advance {
                step: 5,
                progress: 5
            }
        );
        assert_eq!(
            transition(6, u32::from(KEY_RIGHT), true),
            Transition::Advance {
                step: 7,
                progress: 7
            }
        );
        // Other steps are unaffected
        assert_eq!(transition(2, u32::from(KEY_DOWN), true), Transition::Advance { step: 2, progress: 3 });
        assert_eq!(transition(5, u32::from(KEY_LEFT), true), Transition::Reset);
        assert_eq!(transition(4, u32::from(KEY_B), true), Transition::Reset);
    }

    #[test]
    fn test_out_of_range_progress_resets() {
        assert_eq!(transition(11, u32::from(KEY_UP), false), Transition::Reset);
        assert_eq!(transition(u8::MAX, u32::from(KEY_ENTER), true), Transition::Reset);
    }

    #[test]
    fn test_codes_wider_than_u16_never_match() {
        assert_eq!(
            transition(0, u32::from(KEY_UP) + 0x1_0000, false),
            Transition::Reset
        );
    }

    #[test]
    fn test_step_notes_ascend_chromatically() {
        let notes: Vec<u64> = (0..MAX_PROGRESS)
            .filter_map(|step| step_note(step, NoteTable::Chromatic, 1000))
            .map(|n| n.frequency)
            .collect();

        assert_eq!(notes.len(), 10);
        assert!(notes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(step_note(MAX_PROGRESS, NoteTable::Chromatic, 1000), None);
    }

    #[test]
    fn test_silent_table() {
        assert_eq!(step_note(0, NoteTable::Silent, 1000), None);
        assert_eq!(
            step_note(0, NoteTable::Chromatic, 250),
            Some(SoundNote::new(pitch::C4, 250))
        );
    }
}
