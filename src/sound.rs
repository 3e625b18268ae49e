//! Sound output - note records, tone generation and playback

pub mod note;
pub mod player;
pub mod sine;
pub mod speaker;

pub use note::{pitch, SoundNote, NOTE_RECORD_LEN};
pub use player::{drain_notes, ConsoleSink, NotePlayer, NoteQueue, NoteSink};
pub use sine::SineWave;
pub use speaker::{OutputFormat, SpeakerSink};
