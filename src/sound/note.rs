//! Sound note type and its fixed-size wire record
//!
//! A note travels from the detector to the audio consumer as a 16-byte
//! record: `frequency` then `duration_ms`, both unsigned 64-bit in host
//! byte order, no padding and no version tag.

use std::fmt;

use crate::detector::error::WireError;

/// Size in bytes of one encoded note record
pub const NOTE_RECORD_LEN: usize = 16;

/// Equal-temperament pitches (Hz, rounded) used by the step and chime tables
pub mod pitch {
    pub const C4: u64 = 262;
    pub const CS4: u64 = 277;
    pub const D4: u64 = 294;
    pub const DS4: u64 = 311;
    pub const E4: u64 = 330;
    pub const F4: u64 = 349;
    pub const FS4: u64 = 370;
    pub const G4: u64 = 392;
    pub const GS4: u64 = 415;
    pub const A4: u64 = 440;
    pub const AS4: u64 = 466;
    pub const B4: u64 = 494;
    pub const C5: u64 = 523;
    pub const E5: u64 = 659;
    pub const G5: u64 = 784;
}

/// One audio cue: a frequency held for a duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundNote {
    /// Hz
    pub frequency: u64,
    /// Milliseconds
    pub duration_ms: u64,
}

impl SoundNote {
    pub const fn new(frequency: u64, duration_ms: u64) -> Self {
        Self {
            frequency,
            duration_ms,
        }
    }

    /// Encode into the wire record
    pub fn encode(&self) -> [u8; NOTE_RECORD_LEN] {
        let mut record = [0u8; NOTE_RECORD_LEN];
        record[0..8].copy_from_slice(&self.frequency.to_ne_bytes());
        record[8..16].copy_from_slice(&self.duration_ms.to_ne_bytes());
        record
    }

    /// Decode a wire record
    ///
    /// Trailing bytes past the first record are ignored; shorter input is
    /// rejected.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < NOTE_RECORD_LEN {
            return Err(WireError::Truncated { len: data.len() });
        }

        let mut freq = [0u8; 8];
        let mut duration = [0u8; 8];
        freq.copy_from_slice(&data[0..8]);
        duration.copy_from_slice(&data[8..16]);

        Ok(Self {
            frequency: u64::from_ne_bytes(freq),
            duration_ms: u64::from_ne_bytes(duration),
        })
    }

    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.duration_ms)
    }
}

impl fmt::Display for SoundNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz for {} ms", self.frequency, self.duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let note = SoundNote::new(pitch::A4, 1000);
        let record = note.encode();

        assert_eq!(&record[0..8], &440u64.to_ne_bytes());
        assert_eq!(&record[8..16], &1000u64.to_ne_bytes());
    }

    #[test]
    fn test_decode_extreme_values() {
        let note = SoundNote::new(u64::MAX, 0);
        assert_eq!(SoundNote::decode(&note.encode()).unwrap(), note);
    }

    #[test]
    fn test_decode_truncated() {
        let record = SoundNote::new(pitch::C4, 500).encode();
        let err = SoundNote::decode(&record[..10]).unwrap_err();
        assert_eq!(err, WireError::Truncated { len: 10 });
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut data = SoundNote::new(pitch::G5, 500).encode().to_vec();
        data.extend_from_slice(&[0xFF; 4]);
        assert_eq!(
            SoundNote::decode(&data).unwrap(),
            SoundNote::new(pitch::G5, 500)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(SoundNote::new(262, 1000).to_string(), "262 Hz for 1000 ms");
    }
}
