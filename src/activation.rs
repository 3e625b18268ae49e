//! Activation watcher
//!
//! Polls the activation counter and celebrates every increase: a log line,
//! an optional three-note song and optionally opening a URL in the desktop
//! user's browser.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::config::ActivationConfig;
use crate::detector::LocalDetector;
use crate::sound::{pitch, NoteQueue, SoundNote};

/// C major arpeggio played after an activation
pub const CELEBRATION_SONG: [SoundNote; 3] = [
    SoundNote::new(pitch::C5, 500),
    SoundNote::new(pitch::E5, 500),
    SoundNote::new(pitch::G5, 500),
];

/// Compare a fresh counter read with the last seen value
///
/// Returns the new count when it went up. A missing counter is skipped.
pub fn check_activation(count: Option<u32>, last_seen: &mut u32) -> Option<u32> {
    let count = count?;
    if count > *last_seen {
        *last_seen = count;
        Some(count)
    } else {
        None
    }
}

/// User a browser should run as when the detector was started through sudo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopUser {
    pub home: String,
    pub uid: u32,
    pub gid: u32,
}

impl DesktopUser {
    /// Build from `SUDO_USER` / `SUDO_UID` / `SUDO_GID`
    pub fn from_sudo(user: Option<&str>, uid: Option<&str>, gid: Option<&str>) -> Option<Self> {
        let user = user.filter(|u| !u.is_empty())?;
        Some(Self {
            home: format!("/home/{}", user),
            uid: uid?.parse().ok()?,
            gid: gid?.parse().ok()?,
        })
    }

    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok();
        Self::from_sudo(
            var("SUDO_USER").as_deref(),
            var("SUDO_UID").as_deref(),
            var("SUDO_GID").as_deref(),
        )
    }
}

/// Open `url` with `xdg-open`, as the sudo caller when there is one
pub async fn open_url(url: &str) -> Result<()> {
    let mut command = tokio::process::Command::new("xdg-open");
    command.arg(url);

    match DesktopUser::from_env() {
        Some(user) => {
            debug!("Opening URL as uid {} ({})", user.uid, user.home);
            command.env("HOME", &user.home).uid(user.uid).gid(user.gid);
        }
        None => debug!("Not started through sudo, opening URL as current user"),
    }

    let status = command
        .status()
        .await
        .context("Failed to run xdg-open")?;
    if !status.success() {
        bail!("xdg-open exited with {}", status);
    }
    Ok(())
}

async fn celebrate(count: u32, queue: &NoteQueue, config: &ActivationConfig) {
    info!(
        "KONAMI CODE ACTIVATED \\o/ ! ({} times, at {})",
        count,
        chrono::Local::now().format("%H:%M:%S")
    );

    if config.play_song {
        for note in CELEBRATION_SONG {
            queue.queue(note);
        }
    }

    if let Some(url) = &config.open_url {
        if let Err(e) = open_url(url).await {
            warn!("Failed to open {}: {:#}", url, e);
        }
    }
}

/// Poll the counter forever; cancel the task to stop
pub async fn watch_activations(ctx: Arc<LocalDetector>, queue: NoteQueue, config: ActivationConfig) {
    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    let mut last_seen = ctx.activation_count().unwrap_or(0);

    loop {
        ticker.tick().await;
        if let Some(count) = check_activation(ctx.activation_count(), &mut last_seen) {
            celebrate(count, &queue, &config).await;
        }
    }
}
