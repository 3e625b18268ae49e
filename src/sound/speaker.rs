//! Speaker output through cpal
//!
//! The output stream lives on its own thread, since cpal streams cannot move
//! between threads on every host. The stream callback reads the current
//! tone and plays silence when there is none; playing a note swaps the tone
//! in and waits out its duration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::note::SoundNote;
use super::player::NoteSink;
use super::sine::SineWave;

type SharedTone = Arc<Mutex<Option<SineWave>>>;

/// Requested stream format; unset fields use the device default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// What the audio thread actually opened
#[derive(Debug, Clone)]
struct OpenedStream {
    device: String,
    sample_rate: u32,
    channels: u16,
}

/// Plays notes on the default output device
pub struct SpeakerSink {
    device: String,
    sample_rate: u32,
    tone: SharedTone,
    failed: Arc<AtomicBool>,
    stop: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SpeakerSink {
    /// Open the default output device and start a silent stream
    pub fn open(format: OutputFormat) -> Result<Self> {
        let tone: SharedTone = Arc::new(Mutex::new(None));
        let failed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = channel::bounded::<Result<OpenedStream>>(1);
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let thread = {
            let tone = tone.clone();
            let failed = failed.clone();
            std::thread::Builder::new()
                .name("konamicode-audio".to_string())
                .spawn(move || match open_stream(format, tone, failed) {
                    Ok((stream, opened)) => {
                        let _ = ready_tx.send(Ok(opened));
                        // Returns once the sink drops its stop sender
                        let _ = stop_rx.recv();
                        drop(stream);
                        debug!("Audio stream closed");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                })
                .context("Failed to start audio thread")?
        };

        let opened = ready_rx
            .recv()
            .context("Audio thread exited during startup")??;

        info!(
            "Audio output: {} ({} Hz, {} channels)",
            opened.device, opened.sample_rate, opened.channels
        );

        Ok(Self {
            device: opened.device,
            sample_rate: opened.sample_rate,
            tone,
            failed,
            stop: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }
}

#[async_trait]
impl NoteSink for SpeakerSink {
    fn name(&self) -> &str {
        "speaker"
    }

    async fn play(&self, note: SoundNote) -> Result<()> {
        if self.failed.load(Ordering::Relaxed) {
            bail!("Audio stream on {} has failed", self.device);
        }

        *self.tone.lock() = Some(SineWave::new(
            note.frequency,
            note.duration(),
            self.sample_rate,
        ));
        tokio::time::sleep(note.duration()).await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        *self.tone.lock() = None;
        drop(self.stop.lock().take());

        let thread = self.thread.lock().take();
        if let Some(handle) = thread {
            tokio::task::spawn_blocking(move || handle.join())
                .await
                .context("Failed to wait for audio thread")?
                .map_err(|_| anyhow!("Audio thread panicked"))?;
        }
        Ok(())
    }
}

fn open_stream(
    format: OutputFormat,
    tone: SharedTone,
    failed: Arc<AtomicBool>,
) -> Result<(Stream, OpenedStream)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("No audio output device available")?;
    let name = device.name().unwrap_or_else(|_| "unknown device".to_string());

    let default = device
        .default_output_config()
        .with_context(|| format!("Failed to query output config of {}", name))?;

    let config = StreamConfig {
        channels: format.channels.unwrap_or_else(|| default.channels()),
        sample_rate: format
            .sample_rate
            .map(cpal::SampleRate)
            .unwrap_or_else(|| default.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match default.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, tone, failed),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, tone, failed),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, tone, failed),
        other => bail!("Unsupported sample format {:?} on {}", other, name),
    }
    .with_context(|| format!("Failed to open output stream on {}", name))?;

    stream.play().context("Failed to start audio stream")?;

    Ok((
        stream,
        OpenedStream {
            device: name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        },
    ))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    tone: SharedTone,
    failed: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            write_frames(data, channels, &mut tone.lock());
        },
        move |err| {
            warn!("Audio stream error: {}", err);
            failed.store(true, Ordering::Relaxed);
        },
        None,
    )?;

    Ok(stream)
}

/// Fill interleaved frames from the current tone, copying each sample to
/// every channel; silence once the tone has ended
fn write_frames<T>(data: &mut [T], channels: usize, tone: &mut Option<SineWave>)
where
    T: Sample + FromSample<f32>,
{
    for frame in data.chunks_mut(channels.max(1)) {
        let value = tone.as_mut().map_or(0.0, SineWave::next_sample);
        let sample = T::from_sample(value);
        for slot in frame.iter_mut() {
            *slot = sample;
        }
    }

    if tone.as_ref().is_some_and(SineWave::is_finished) {
        *tone = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::note::pitch;
    use std::time::Duration;

    #[test]
    fn test_write_frames_duplicates_channels() {
        let mut tone = Some(SineWave::new(pitch::A4, Duration::from_millis(10), 8000));
        let mut data = [0.0f32; 40];

        write_frames(&mut data, 2, &mut tone);

        for frame in data.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(data.iter().any(|s| *s != 0.0));
        assert_eq!(tone.map(|t| t.remaining()), Some(60));
    }

    #[test]
    fn test_write_frames_clears_finished_tone() {
        let mut tone = Some(SineWave::new(pitch::C5, Duration::from_millis(1), 8000));
        let mut data = [1i16; 32];

        write_frames(&mut data, 1, &mut tone);

        assert!(tone.is_none());
        // 8 frames of tone, then silence
        assert!(data[8..].iter().all(|s| *s == 0));
    }

    #[test]
    fn test_silence_without_tone() {
        let mut tone = None;
        let mut unsigned = [0u16; 8];
        let mut float = [0.5f32; 8];

        write_frames(&mut unsigned, 2, &mut tone);
        write_frames(&mut float, 2, &mut tone);

        assert!(unsigned.iter().all(|s| *s == u16::EQUILIBRIUM));
        assert!(float.iter().all(|s| *s == 0.0));
    }
}
