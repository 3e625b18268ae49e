//! Notification channel carrying note records out of the detector
//!
//! Every producer (one per processor core or input device) owns a bounded
//! ring; a single consumer drains all rings. Sending never blocks: when a
//! ring is full, or the consumer is gone, the record is dropped and counted.
//! Backpressure therefore never reaches the matcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Select, Sender, TrySendError};

use super::error::EmitError;
use crate::sound::note::{SoundNote, NOTE_RECORD_LEN};

/// Fire-and-forget note output used by the matcher
pub trait NoteSender: Send + Sync {
    /// Hand one note to the channel on behalf of `producer`
    fn emit(&self, producer: usize, note: SoundNote) -> Result<(), EmitError>;
}

/// Raw record plus the ring it arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedRecord {
    pub producer: usize,
    pub record: [u8; NOTE_RECORD_LEN],
}

/// Create a channel with `producers` rings of `capacity` records each
///
/// Both values are clamped to at least one.
pub fn note_channel(producers: usize, capacity: usize) -> (NoteEmitter, NoteReceiver) {
    let dropped = Arc::new(AtomicU64::new(0));
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..producers.max(1))
        .map(|_| channel::bounded(capacity.max(1)))
        .unzip();

    (
        NoteEmitter {
            rings: senders.into(),
            dropped: dropped.clone(),
        },
        NoteReceiver {
            rings: receivers,
            dropped,
        },
    )
}

/// Producer side; cheap to clone and shared by every invocation
#[derive(Clone)]
pub struct NoteEmitter {
    rings: Arc<[Sender<[u8; NOTE_RECORD_LEN]>]>,
    dropped: Arc<AtomicU64>,
}

impl NoteEmitter {
    pub fn producers(&self) -> usize {
        self.rings.len()
    }

    /// Records dropped so far (full ring or no consumer)
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl NoteSender for NoteEmitter {
    fn emit(&self, producer: usize, note: SoundNote) -> Result<(), EmitError> {
        let ring = &self.rings[producer % self.rings.len()];

        match ring.try_send(note.encode()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(EmitError::Full { producer })
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(EmitError::Disconnected)
            }
        }
    }
}

/// Consumer side; drains every ring
pub struct NoteReceiver {
    rings: Vec<Receiver<[u8; NOTE_RECORD_LEN]>>,
    dropped: Arc<AtomicU64>,
}

impl NoteReceiver {
    /// Take one pending record from any ring without waiting
    pub fn try_recv(&self) -> Option<ReceivedRecord> {
        self.rings
            .iter()
            .enumerate()
            .find_map(|(producer, ring)| {
                ring.try_recv()
                    .ok()
                    .map(|record| ReceivedRecord { producer, record })
            })
    }

    /// Wait up to `timeout` for a record on any ring
    ///
    /// Returns `Disconnected` once every emitter has been dropped and the
    /// rings are empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ReceivedRecord, RecvTimeoutError> {
        let mut select = Select::new();
        for ring in &self.rings {
            select.recv(ring);
        }

        let operation = select
            .select_timeout(timeout)
            .map_err(|_| RecvTimeoutError::Timeout)?;
        let producer = operation.index();

        match operation.recv(&self.rings[producer]) {
            Ok(record) => Ok(ReceivedRecord { producer, record }),
            // Rings disconnect together; others may still hold records
            Err(_) => self.try_recv().ok_or(RecvTimeoutError::Disconnected),
        }
    }

    /// Everything currently pending, ring by ring
    pub fn drain(&self) -> Vec<ReceivedRecord> {
        let mut records = Vec::new();
        for (producer, ring) in self.rings.iter().enumerate() {
            records.extend(ring.try_iter().map(|record| ReceivedRecord { producer, record }));
        }
        records
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::note::pitch;

    #[test]
    fn test_round_trip_is_bit_exact() {
        let (emitter, receiver) = note_channel(2, 4);
        let note = SoundNote::new(0xDEAD_BEEF_0000_0001, u64::MAX - 7);

        emitter.emit(1, note).unwrap();

        let received = receiver.try_recv().unwrap();
        assert_eq!(received.producer, 1);
        assert_eq!(SoundNote::decode(&received.record).unwrap(), note);
    }

    #[test]
    fn test_full_ring_drops() {
        let (emitter, receiver) = note_channel(1, 2);
        let note = SoundNote::new(pitch::C4, 1000);

        emitter.emit(0, note).unwrap();
        emitter.emit(0, note).unwrap();
        assert_eq!(emitter.emit(0, note), Err(EmitError::Full { producer: 0 }));

        assert_eq!(receiver.dropped(), 1);
        assert_eq!(receiver.drain().len(), 2);
    }

    #[test]
    fn test_full_ring_does_not_affect_other_producers() {
        let (emitter, receiver) = note_channel(2, 1);
        let note = SoundNote::new(pitch::D4, 1000);

        emitter.emit(0, note).unwrap();
        assert!(emitter.emit(0, note).is_err());
        emitter.emit(1, note).unwrap();

        let producers: Vec<usize> = receiver.drain().iter().map(|r| r.producer).collect();
        assert_eq!(producers, vec![0, 1]);
    }

    #[test]
    fn test_producer_index_wraps() {
        let (emitter, receiver) = note_channel(2, 4);
        emitter.emit(5, SoundNote::new(pitch::E4, 1)).unwrap();
        assert_eq!(receiver.try_recv().unwrap().producer, 1);
    }

    #[test]
    fn test_no_consumer_drops() {
        let (emitter, receiver) = note_channel(1, 4);
        drop(receiver);

        assert_eq!(
            emitter.emit(0, SoundNote::new(pitch::F4, 1)),
            Err(EmitError::Disconnected)
        );
        assert_eq!(emitter.dropped(), 1);
    }

    #[test]
    fn test_recv_timeout_and_disconnect() {
        let (emitter, receiver) = note_channel(2, 4);

        assert_eq!(
            receiver.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        );

        emitter.emit(1, SoundNote::new(pitch::G4, 1)).unwrap();
        assert_eq!(
            receiver
                .recv_timeout(Duration::from_millis(10))
                .unwrap()
                .producer,
            1
        );

        drop(emitter);
        assert_eq!(
            receiver.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_pending_records_survive_disconnect() {
        let (emitter, receiver) = note_channel(3, 4);
        emitter.emit(2, SoundNote::new(pitch::B4, 1)).unwrap();
        drop(emitter);

        // Empty disconnected rings are ready too; the pending record still comes out
        let received = receiver.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(received.producer, 2);
        assert_eq!(
            receiver.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let (emitter, _receiver) = note_channel(0, 0);
        assert_eq!(emitter.producers(), 1);
        emitter.emit(0, SoundNote::new(pitch::A4, 1)).unwrap();
    }
}
