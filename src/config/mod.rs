//! Configuration management for the Konami code detector
//!
//! Handles loading and validating the YAML configuration file. Every
//! section is optional; a missing file means all defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::detector::{MatcherOptions, NoteTable};
use crate::sound::OutputFormat;

/// Longest note the matcher may emit
pub const MAX_NOTE_DURATION_MS: u64 = 10_000;

/// Page opened on activation unless configured otherwise
pub const DEFAULT_OPEN_URL: &str = "https://en.wikipedia.org/wiki/Konami_Code";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub matcher: MatcherConfig,
    pub channel: ChannelConfig,
    pub input: InputConfig,
    pub audio: AudioConfig,
    pub activation: ActivationConfig,
}

/// Sequence matcher behavior
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Keep the step 4/6 fallthrough for bug-compatibility
    pub fallthrough_quirk: bool,
    pub notes: NoteTable,
    pub note_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_timeout_ms: Option<u64>,
}

/// Note channel sizing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Number of per-producer rings
    pub producers: usize,
    /// Records per ring
    pub capacity: usize,
}

/// Keyboard sources
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// Explicit device paths; empty means auto-discover
    pub devices: Vec<String>,
}

/// Audio sink selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Default output device through cpal
    #[default]
    Speaker,
    /// Log notes only
    Console,
}

/// Audio output configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sink: SinkKind,
    /// Stream sample rate; device default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Stream channel count; device default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
}

/// What happens when an activation is observed
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivationConfig {
    pub poll_interval_ms: u64,
    pub play_song: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_url: Option<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fallthrough_quirk: false,
            notes: NoteTable::Chromatic,
            note_duration_ms: 1000,
            sequence_timeout_ms: None,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            capacity: 64,
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            play_song: true,
            open_url: Some(DEFAULT_OPEN_URL.to_string()),
        }
    }
}

impl MatcherConfig {
    pub fn options(&self) -> MatcherOptions {
        MatcherOptions {
            fallthrough_quirk: self.fallthrough_quirk,
            notes: self.notes,
            note_duration_ms: self.note_duration_ms,
            sequence_timeout: self.sequence_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl AudioConfig {
    pub fn format(&self) -> OutputFormat {
        OutputFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

impl AppConfig {
    /// Load configuration from file, falling back to defaults if it does not exist
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate YAML
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel.producers == 0 {
            bail!("channel.producers must be at least 1");
        }
        if self.channel.capacity == 0 {
            bail!("channel.capacity must be at least 1");
        }
        if self.matcher.note_duration_ms == 0
            || self.matcher.note_duration_ms > MAX_NOTE_DURATION_MS
        {
            bail!(
                "matcher.note_duration_ms must be between 1 and {}",
                MAX_NOTE_DURATION_MS
            );
        }
        if self.audio.sample_rate == Some(0) {
            bail!("audio.sample_rate must be positive");
        }
        if self.audio.channels == Some(0) {
            bail!("audio.channels must be at least 1");
        }
        if self.activation.poll_interval_ms == 0 {
            bail!("activation.poll_interval_ms must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.matcher.options(), MatcherOptions::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_yaml(
            r#"
matcher:
  fallthrough_quirk: true
  notes: silent
  sequence_timeout_ms: 3000
audio:
  sink: console
  sample_rate: 44100
input:
  devices:
    - /dev/input/event3
"#,
        )
        .unwrap();

        let options = config.matcher.options();
        assert!(options.fallthrough_quirk);
        assert_eq!(options.notes, NoteTable::Silent);
        assert_eq!(options.note_duration_ms, 1000);
        assert_eq!(options.sequence_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.audio.sink, SinkKind::Console);
        assert_eq!(
            config.audio.format(),
            OutputFormat {
                sample_rate: Some(44100),
                channels: None,
            }
        );
        assert_eq!(config.input.devices, vec!["/dev/input/event3"]);
        assert_eq!(config.channel.producers, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_yaml("channel:\n  capacity: 0\n").is_err());
        assert!(AppConfig::from_yaml("channel:\n  producers: 0\n").is_err());
        assert!(AppConfig::from_yaml("audio:\n  channels: 0\n").is_err());
        assert!(AppConfig::from_yaml("audio:\n  sample_rate: 0\n").is_err());
        assert!(AppConfig::from_yaml("audio:\n  sink: headphones\n").is_err());
        assert!(AppConfig::from_yaml("matcher:\n  notes: loud\n").is_err());
    }

    #[test]
    fn test_note_duration_is_bounded() {
        assert!(AppConfig::from_yaml("matcher:\n  note_duration_ms: 0\n").is_err());
        assert!(AppConfig::from_yaml("matcher:\n  note_duration_ms: 10000\n").is_ok());
        assert!(AppConfig::from_yaml("matcher:\n  note_duration_ms: 10001\n").is_err());
        assert!(
            AppConfig::from_yaml("matcher:\n  note_duration_ms: 18446744073709551\n").is_err()
        );
    }

    #[test]
    fn test_defaults_play_and_open_wiki_page() {
        let config = AppConfig::default();
        assert_eq!(config.audio.sink, SinkKind::Speaker);
        assert_eq!(config.audio.format(), OutputFormat::default());
        assert_eq!(config.activation.open_url.as_deref(), Some(DEFAULT_OPEN_URL));

        let config = AppConfig::from_yaml("activation:\n  open_url: null\n").unwrap();
        assert_eq!(config.activation.open_url, None);
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("konamicode.yaml");

        std::fs::write(
            &path,
            "activation:\n  open_url: https://www.konami.com/\n  play_song: false\n",
        )?;

        let config = AppConfig::load(&path).await?;
        assert_eq!(
            config.activation.open_url.as_deref(),
            Some("https://www.konami.com/")
        );
        assert!(!config.activation.play_song);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = AppConfig::load(&temp_dir.path().join("absent.yaml")).await?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("broken.yaml");
        std::fs::write(&path, "matcher: [1, 2")?;

        assert!(AppConfig::load(&path).await.is_err());
        Ok(())
    }
}
