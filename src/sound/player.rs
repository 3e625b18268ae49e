//! Note playback - queue and sinks
//!
//! Notes drained from the detector's channel are queued on a [`NotePlayer`],
//! which plays them one after another through a [`NoteSink`]. Queueing never
//! blocks the caller.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use crossbeam::channel::RecvTimeoutError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::note::SoundNote;
use crate::detector::NoteReceiver;

/// Something that can render a note
#[async_trait]
pub trait NoteSink: Send + Sync {
    fn name(&self) -> &str;

    /// Render one note; returns once the note has been handed off
    async fn play(&self, note: SoundNote) -> Result<()>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Logs notes instead of playing them
///
/// Useful on headless machines and when no output device is available.
pub struct ConsoleSink {
    played: AtomicU64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            played: AtomicU64::new(0),
        }
    }

    pub fn played(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn play(&self, note: SoundNote) -> Result<()> {
        let n = self.played.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "♪ [{}] {} [note #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            note,
            n
        );
        tokio::time::sleep(note.duration()).await;
        Ok(())
    }
}

/// Cloneable, non-blocking handle for queueing notes
#[derive(Clone)]
pub struct NoteQueue {
    tx: mpsc::UnboundedSender<SoundNote>,
}

impl NoteQueue {
    /// Queue a note; returns `false` once the player has stopped
    pub fn queue(&self, note: SoundNote) -> bool {
        self.tx.send(note).is_ok()
    }
}

/// Plays queued notes sequentially through a sink
pub struct NotePlayer {
    queue: NoteQueue,
    task: JoinHandle<()>,
}

impl NotePlayer {
    /// Start the playback task on the current runtime
    pub fn spawn(sink: Arc<dyn NoteSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(play_loop(rx, sink));

        Self {
            queue: NoteQueue { tx },
            task,
        }
    }

    pub fn queue(&self) -> NoteQueue {
        self.queue.clone()
    }

    /// Stop accepting notes from this handle and wait for the queue to drain
    ///
    /// Other [`NoteQueue`] clones keep the player alive until they are dropped.
    pub async fn close(self, grace: Duration) {
        drop(self.queue);
        if tokio::time::timeout(grace, self.task).await.is_err() {
            warn!("Note player did not drain within {:?}", grace);
        }
    }
}

async fn play_loop(mut rx: mpsc::UnboundedReceiver<SoundNote>, sink: Arc<dyn NoteSink>) {
    debug!("Note player started with '{}' sink", sink.name());

    while let Some(note) = rx.recv().await {
        if let Err(e) = sink.play(note).await {
            warn!("Failed to play note {} on '{}': {:#}", note, sink.name(), e);
        }
    }

    if let Err(e) = sink.shutdown().await {
        warn!("Failed to shut down '{}' sink: {:#}", sink.name(), e);
    }
    debug!("Note player stopped");
}

/// Move note records from the detector channel into the player queue
///
/// Blocking; run it on a dedicated thread. Returns the number of notes
/// forwarded once `running` is cleared, every emitter is gone or the
/// player has stopped.
pub fn drain_notes(receiver: &NoteReceiver, queue: &NoteQueue, running: &AtomicBool) -> u64 {
    const POLL: Duration = Duration::from_millis(100);
    let mut forwarded = 0;

    while running.load(Ordering::Relaxed) {
        match receiver.recv_timeout(POLL) {
            Ok(received) => match SoundNote::decode(&received.record) {
                Ok(note) => {
                    trace!("Note {} from producer {}", note, received.producer);
                    if !queue.queue(note) {
                        break;
                    }
                    forwarded += 1;
                }
                Err(e) => warn!("Discarding note record: {}", e),
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    forwarded
}
