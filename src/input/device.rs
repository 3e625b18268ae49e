//! Keyboard devices - discovery and event readers
//!
//! Each keyboard gets its own reader task. Readers run concurrently and all
//! call into the same detector, each under its own producer index, so two
//! keyboards typing at once hit the shared match state from two places at
//! the same time.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::*;
use evdev::{Device, EventStream, EventType, InputEvent};
use tracing::{debug, info, warn};

use super::codes::{
    KEY_A, KEY_B, KEY_DOWN, KEY_ENTER, KEY_LEFT, KEY_RIGHT, KEY_UP, VALUE_PRESSED, VALUE_RELEASED,
};
use crate::detector::{handle_event, LocalDetector, Outcome};

/// Stable per-device symlinks maintained by udev
pub const BY_PATH_DIR: &str = "/dev/input/by-path";

/// udev suffix for keyboard event nodes
const KEYBOARD_SUFFIX: &str = "-event-kbd";

/// Keyboard event nodes in `dir`, sorted by path
pub fn keyboards_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list input devices in {}", dir.display()))?;

    let mut keyboards: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(KEYBOARD_SUFFIX))
        })
        .collect();

    keyboards.sort();
    Ok(keyboards)
}

/// Whether a device reports the keys the sequence needs
fn is_keyboard(device: &Device) -> bool {
    device.supported_keys().is_some_and(|keys| {
        keys.contains(evdev::Key::KEY_ENTER) && keys.contains(evdev::Key::KEY_A)
    })
}

/// Keyboards attached to this machine
///
/// Uses the udev by-path links when present, otherwise scans every event
/// node for devices with letter and Enter keys.
pub fn discover_keyboards() -> Result<Vec<PathBuf>> {
    match keyboards_in(Path::new(BY_PATH_DIR)) {
        Ok(keyboards) if !keyboards.is_empty() => Ok(keyboards),
        _ => {
            debug!("No by-path keyboards, scanning event nodes");
            let mut keyboards: Vec<PathBuf> = evdev::enumerate()
                .filter(|(_, device)| is_keyboard(device))
                .map(|(path, _)| path)
                .collect();
            keyboards.sort();
            Ok(keyboards)
        }
    }
}

/// Print discovered keyboards for `--list-devices`
pub fn print_keyboards() {
    println!("\n{}", "=== Keyboard Devices ===".bold().cyan());

    match discover_keyboards() {
        Ok(keyboards) if keyboards.is_empty() => {
            println!("  {}", "No keyboards found".yellow());
        }
        Ok(keyboards) => {
            for (index, path) in keyboards.iter().enumerate() {
                let name = Device::open(path)
                    .ok()
                    .and_then(|device| device.name().map(str::to_string))
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "  [{}] {} {}",
                    index.to_string().green(),
                    path.display(),
                    format!("({})", name).dimmed()
                );
            }
        }
        Err(e) => {
            println!("  {} {:#}", "Failed to list devices:".red(), e);
        }
    }
    println!();
}

/// Hand one event to the detector, logging non-fatal failures
pub fn dispatch(ctx: &LocalDetector, producer: usize, event: InputEvent) -> Option<Outcome> {
    match handle_event(
        ctx,
        producer,
        u32::from(event.event_type().0),
        u32::from(event.code()),
        event.value(),
    ) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("Event from producer {} not recorded: {}", producer, e);
            None
        }
    }
}

/// Anything that yields input events one at a time
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> io::Result<InputEvent>;
}

#[async_trait]
impl EventSource for EventStream {
    async fn next_event(&mut self) -> io::Result<InputEvent> {
        EventStream::next_event(self).await
    }
}

/// Feed every event from `source` to the detector until it ends
///
/// `UnexpectedEof` ends the stream cleanly; any other read error is
/// returned. Returns the number of events processed.
pub async fn pump_events<S>(source: &mut S, producer: usize, ctx: &LocalDetector) -> Result<u64>
where
    S: EventSource + ?Sized,
{
    let mut count = 0u64;

    loop {
        match source.next_event().await {
            Ok(event) => {
                dispatch(ctx, producer, event);
                count += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("Failed to read input event"),
        }
    }

    Ok(count)
}

/// Read a device node until it disappears
pub async fn read_device(path: PathBuf, producer: usize, ctx: &LocalDetector) -> Result<u64> {
    let device = Device::open(&path)
        .with_context(|| format!("Failed to open input device: {}", path.display()))?;
    let name = device.name().unwrap_or("unnamed").to_string();
    let mut events = device
        .into_event_stream()
        .with_context(|| format!("Failed to stream events from {}", path.display()))?;

    info!(
        "Listening on {} [{}] (producer {})",
        path.display(),
        name,
        producer
    );
    let count = pump_events(&mut events, producer, ctx).await?;
    debug!("{} closed after {} events", path.display(), count);
    Ok(count)
}

fn key_event(code: u16, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY, code, value)
}

fn syn_event() -> InputEvent {
    InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
}

/// Type the canonical sequence, one press and release per key
pub async fn simulate(ctx: &LocalDetector, producer: usize, pause: Duration) -> Option<Outcome> {
    const KEYS: [u16; 11] = [
        KEY_UP, KEY_UP, KEY_DOWN, KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_LEFT, KEY_RIGHT, KEY_B,
        KEY_A, KEY_ENTER,
    ];

    let mut last = None;
    for key in KEYS {
        last = dispatch(ctx, producer, key_event(key, VALUE_PRESSED));
        dispatch(ctx, producer, syn_event());
        dispatch(ctx, producer, key_event(key, VALUE_RELEASED));
        tokio::time::sleep(pause).await;
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{note_channel, MatcherOptions};
    use crate::input::codes::KEY_ESC;
    use std::collections::VecDeque;

    fn make_detector() -> LocalDetector {
        let (emitter, _receiver) = note_channel(2, 64);
        LocalDetector::new(emitter, MatcherOptions::default())
    }

    /// Replays queued events, then reports the given error
    struct Replay {
        events: VecDeque<InputEvent>,
        end: io::ErrorKind,
    }

    impl Replay {
        fn new(events: Vec<InputEvent>, end: io::ErrorKind) -> Self {
            Self {
                events: events.into(),
                end,
            }
        }
    }

    #[async_trait]
    impl EventSource for Replay {
        async fn next_event(&mut self) -> io::Result<InputEvent> {
            self.events
                .pop_front()
                .ok_or_else(|| io::Error::from(self.end))
        }
    }

    #[tokio::test]
    async fn test_pump_events_drives_detector() {
        let ctx = make_detector();
        let mut source = Replay::new(
            vec![
                key_event(KEY_UP, VALUE_PRESSED),
                syn_event(),
                key_event(KEY_UP, VALUE_RELEASED),
                key_event(KEY_UP, VALUE_PRESSED),
            ],
            io::ErrorKind::UnexpectedEof,
        );

        let count = pump_events(&mut source, 0, &ctx).await.unwrap();
        assert_eq!(count, 4);
        assert_eq!(ctx.progress(), Some(2));
    }

    #[tokio::test]
    async fn test_read_error_stops_reader() {
        let ctx = make_detector();
        let mut source = Replay::new(
            vec![
                key_event(KEY_UP, VALUE_PRESSED),
                key_event(KEY_ESC, VALUE_PRESSED),
            ],
            io::ErrorKind::Other,
        );

        assert!(pump_events(&mut source, 0, &ctx).await.is_err());
        assert_eq!(ctx.progress(), Some(0));
    }

    #[test]
    fn test_dispatch_ignores_non_key_events() {
        let ctx = make_detector();
        assert_eq!(dispatch(&ctx, 0, syn_event()), Some(Outcome::Ignored));
        assert_eq!(
            dispatch(&ctx, 0, key_event(KEY_UP, VALUE_PRESSED)),
            Some(Outcome::Advanced { progress: 1 })
        );
    }

    #[tokio::test]
    async fn test_simulate_activates() {
        let ctx = make_detector();
        let last = simulate(&ctx, 1, Duration::from_millis(0)).await;

        assert_eq!(last, Some(Outcome::Activated { count: Some(1) }));
        assert_eq!(ctx.activation_count(), Some(1));
    }

    #[tokio::test]
    async fn test_missing_device_is_an_error() {
        let ctx = make_detector();
        let result = read_device(PathBuf::from("/nonexistent/event-kbd"), 0, &ctx).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_keyboards_in_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "platform-i8042-serio-0-event-kbd",
            "pci-0000:00:14.0-usb-0:1:1.0-event-mouse",
            "pci-0000:00:14.0-usb-0:2:1.0-event-kbd",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let found = keyboards_in(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            names,
            vec![
                "pci-0000:00:14.0-usb-0:2:1.0-event-kbd",
                "platform-i8042-serio-0-event-kbd",
            ]
        );
    }

    #[test]
    fn test_keyboards_in_missing_dir() {
        assert!(keyboards_in(Path::new("/nonexistent/by-path")).is_err());
    }
}
