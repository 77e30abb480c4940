//! Configuration for the Stewie console

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Default backend base URL (local dev proxy)
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5001";

/// Console configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Backend base URL for ask/tts/status APIs
    pub backend_url: String,

    /// Voice interaction configuration
    pub voice: VoiceConfig,

    /// Local fallback synthesis configuration
    pub synth: SynthConfig,

    /// Ambient status poll interval in seconds
    pub status_interval_secs: u64,
}

/// Voice interaction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceConfig {
    /// Enable voice input (ignored when no recognizer is available)
    pub enabled: bool,

    /// Recognition locale
    pub locale: String,

    /// Phrases that wake the assistant from wake-listening
    pub wake_phrases: Vec<String>,

    /// Phrases that send the assistant back to wake-listening
    pub sleep_phrases: Vec<String>,
}

/// Local fallback synthesis configuration
///
/// Prosody is tuned for a consistent persona timbre across engines.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthConfig {
    /// Voice names preferred for the fallback synthesizer, in order.
    /// Matched as case-sensitive substrings against engine voice names.
    pub preferred_voices: Vec<String>,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Pitch multiplier
    pub pitch: f32,

    /// Volume multiplier
    pub volume: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            voice: VoiceConfig::default(),
            synth: SynthConfig::default(),
            status_interval_secs: 60,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: "en-US".to_string(),
            wake_phrases: vec![
                "hey stewie".to_string(),
                "stewie".to_string(),
                "hey stewart".to_string(),
                "stewart".to_string(),
            ],
            sleep_phrases: vec![
                "quit".to_string(),
                "exit".to_string(),
                "sleep".to_string(),
                "stop listening".to_string(),
            ],
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            preferred_voices: vec![
                "Samantha".to_string(),
                "Ava".to_string(),
                "Victoria".to_string(),
                "Female".to_string(),
            ],
            rate: 1.05,
            pitch: 0.95,
            volume: 0.95,
        }
    }
}

impl Config {
    /// Load configuration from the default location with env overrides
    ///
    /// Reads `~/.config/stewie/console.toml` when present, otherwise uses
    /// defaults. `STEWIE_BACKEND_URL` and `STEWIE_DISABLE_VOICE` override
    /// the file.
    ///
    /// # Errors
    ///
    /// Returns error if an existing config file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from an explicit TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("STEWIE_BACKEND_URL")
            && !url.is_empty()
        {
            self.backend_url = url;
        }
        if std::env::var("STEWIE_DISABLE_VOICE").is_ok_and(|v| v == "1" || v == "true") {
            self.voice.enabled = false;
        }
    }

    /// Validate value ranges
    fn validate(&self) -> Result<()> {
        if self.backend_url.is_empty() {
            return Err(Error::Config("backend_url must not be empty".to_string()));
        }
        if self.status_interval_secs == 0 {
            return Err(Error::Config(
                "status_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config file path (`~/.config/stewie/console.toml` on Linux)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "stewie", "stewie")
        .map(|d| d.config_dir().join("console.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.status_interval_secs, 60);
        assert!(config.voice.enabled);
        assert_eq!(config.voice.locale, "en-US");
        assert_eq!(config.voice.wake_phrases.len(), 4);
        assert_eq!(config.voice.sleep_phrases.len(), 4);
        assert!((config.synth.rate - 1.05).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            backend_url = "http://stewie.local:5001"

            [voice]
            wake_phrases = ["hey stewie"]
            "#,
        )
        .unwrap();
        assert_eq!(config.backend_url, "http://stewie.local:5001");
        assert_eq!(config.voice.wake_phrases, vec!["hey stewie"]);
        // Untouched sections keep defaults
        assert_eq!(config.voice.sleep_phrases.len(), 4);
        assert_eq!(config.synth.preferred_voices[0], "Samantha");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("backend_uri = \"x\"");
        assert!(result.is_err());
    }
}
