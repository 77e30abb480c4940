//! Local fallback speech synthesis
//!
//! Used whenever the premium provider returns no audio or playback
//! fails. Shells out to an on-device engine: `say` on macOS (which has
//! the preferred voice set installed), `espeak-ng`/`espeak` elsewhere.
//! When no engine is present the answer is logged instead of spoken.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::SynthConfig;
use crate::{Error, Result};

/// Baseline speaking rate in words per minute, scaled by the configured
/// rate multiplier
const BASE_RATE_WPM: f32 = 175.0;

/// An enumerable synthesis voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Engine voice name
    pub name: String,
}

/// On-device speech synthesizer
pub trait LocalSynth: Send + Sync {
    /// Enumerate available voices (may be empty)
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Speak text, blocking until done or cancelled
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to run.
    fn speak(&self, text: &str, voice: Option<&str>, cancel: &Arc<AtomicBool>) -> Result<()>;
}

/// Pick the fallback voice from a preference list
///
/// Preferences are matched in order as case-sensitive substrings of the
/// voice name; no match means the engine default is used.
#[must_use]
pub fn pick_voice(preferences: &[String], voices: &[VoiceInfo]) -> Option<String> {
    preferences.iter().find_map(|pref| {
        voices
            .iter()
            .find(|v| v.name.contains(pref.as_str()))
            .map(|v| v.name.clone())
    })
}

/// Which CLI engine backs the synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Say,
    Espeak,
}

/// Synthesizer backed by a CLI engine
pub struct CommandSynth {
    engine: Engine,
    binary: PathBuf,
    config: SynthConfig,
}

impl CommandSynth {
    /// Detect an installed engine
    ///
    /// Prefers `say`, falls back to `espeak-ng` then `espeak`. Returns
    /// `None` when no engine is installed.
    #[must_use]
    pub fn detect(config: SynthConfig) -> Option<Self> {
        if let Ok(binary) = which::which("say") {
            tracing::debug!(binary = %binary.display(), "using say for fallback synthesis");
            return Some(Self {
                engine: Engine::Say,
                binary,
                config,
            });
        }
        for name in ["espeak-ng", "espeak"] {
            if let Ok(binary) = which::which(name) {
                tracing::debug!(binary = %binary.display(), "using espeak for fallback synthesis");
                return Some(Self {
                    engine: Engine::Espeak,
                    binary,
                    config,
                });
            }
        }
        tracing::debug!("no local synthesis engine installed");
        None
    }

    /// Scaled rate in words per minute
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rate_wpm(&self) -> u32 {
        (BASE_RATE_WPM * self.config.rate).round().max(1.0) as u32
    }
}

impl LocalSynth for CommandSynth {
    fn voices(&self) -> Vec<VoiceInfo> {
        match self.engine {
            Engine::Say => {
                // `say -v ?` lists one voice per line: "Name    locale  # blurb"
                let output = Command::new(&self.binary).args(["-v", "?"]).output();
                match output {
                    Ok(out) => String::from_utf8_lossy(&out.stdout)
                        .lines()
                        .filter_map(|line| line.split_whitespace().next())
                        .map(|name| VoiceInfo {
                            name: name.to_string(),
                        })
                        .collect(),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to enumerate voices");
                        Vec::new()
                    }
                }
            }
            Engine::Espeak => Vec::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn speak(&self, text: &str, voice: Option<&str>, cancel: &Arc<AtomicBool>) -> Result<()> {
        let mut command = Command::new(&self.binary);
        match self.engine {
            Engine::Say => {
                command.args(["-r", &self.rate_wpm().to_string()]);
                if let Some(voice) = voice {
                    command.args(["-v", voice]);
                }
            }
            Engine::Espeak => {
                let pitch = (50.0 * self.config.pitch).round() as u32;
                let amplitude = (100.0 * self.config.volume).round() as u32;
                command.args([
                    "-s",
                    &self.rate_wpm().to_string(),
                    "-p",
                    &pitch.min(99).to_string(),
                    "-a",
                    &amplitude.min(200).to_string(),
                ]);
                if let Some(voice) = voice {
                    command.args(["-v", voice]);
                }
            }
        }

        let mut child = command
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Synthesis(format!("failed to run synthesis engine: {e}")))?;

        loop {
            if cancel.load(Ordering::Relaxed) {
                if let Err(e) = child.kill() {
                    tracing::debug!(error = %e, "synthesis process already exited");
                }
                let _ = child.wait();
                tracing::debug!("fallback synthesis cancelled");
                return Ok(());
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        return Err(Error::Synthesis(format!(
                            "synthesis engine exited with {status}"
                        )));
                    }
                    return Ok(());
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => return Err(Error::Synthesis(e.to_string())),
            }
        }
    }
}
