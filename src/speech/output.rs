//! Speech output controller
//!
//! Coordinates the two playback paths: premium synthesized audio from
//! the backend, and the on-device fallback synthesizer. Every `speak`
//! produces exactly one `Started` and exactly one `Finished` event, and
//! `Finished` fires on every path (success, fallback, error, cancel) so
//! the speaking flag can never be left set.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use tokio::sync::mpsc;

use crate::backend::{Backend, SynthesisProvider};
use crate::config::SynthConfig;
use crate::speech::playback::AudioPlayer;
use crate::speech::synth::{LocalSynth, pick_voice};

/// Playback lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audio output began
    Started,
    /// Audio output ended, successfully or not
    Finished,
}

/// Plays answers aloud with premium-to-local fallback
pub struct SpeechOutput {
    backend: Arc<dyn Backend>,
    player: Option<Arc<AudioPlayer>>,
    synth: Option<Arc<dyn LocalSynth>>,
    fallback_voice: Option<String>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    /// Cancellation flag of the playback currently in progress
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl SpeechOutput {
    /// Create a controller
    ///
    /// The fallback voice is picked once from the synthesizer's voice
    /// list against the configured preference order.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        player: Option<AudioPlayer>,
        synth: Option<Arc<dyn LocalSynth>>,
        config: &SynthConfig,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Self {
        let fallback_voice = synth
            .as_ref()
            .and_then(|s| pick_voice(&config.preferred_voices, &s.voices()));
        tracing::debug!(
            premium_playback = player.is_some(),
            local_synth = synth.is_some(),
            voice = ?fallback_voice,
            "speech output initialized"
        );

        Self {
            backend,
            player: player.map(Arc::new),
            synth,
            fallback_voice,
            events,
            current: Mutex::new(None),
        }
    }

    /// Speak text asynchronously
    ///
    /// Requests premium synthesis; when the provider supplies audio it
    /// is decoded and played, any failure or a `none` provider falls
    /// back to the local synthesizer with the exact same text.
    pub fn speak(self: &Arc<Self>, text: String) {
        let cancel = Arc::new(AtomicBool::new(false));
        if let Ok(mut current) = self.current.lock() {
            *current = Some(Arc::clone(&cancel));
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.send(PlaybackEvent::Started);
            this.run_speak(&text, &cancel).await;
            this.send(PlaybackEvent::Finished);
        });
    }

    /// Halt any in-progress playback on both paths
    pub fn stop(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(cancel) = current.take()
        {
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
            tracing::debug!("playback cancel requested");
        }
    }

    async fn run_speak(&self, text: &str, cancel: &Arc<AtomicBool>) {
        match self.try_premium(text, cancel).await {
            Ok(true) => {}
            Ok(false) => self.fallback(text, cancel).await,
            Err(e) => {
                tracing::debug!(error = %e, "premium synthesis failed, using local fallback");
                self.fallback(text, cancel).await;
            }
        }
    }

    /// Attempt the premium path; `Ok(false)` means no premium audio
    async fn try_premium(&self, text: &str, cancel: &Arc<AtomicBool>) -> crate::Result<bool> {
        let Some(player) = self.player.as_ref() else {
            return Ok(false);
        };

        let synthesis = self.backend.synthesize(text).await?;
        if synthesis.provider != SynthesisProvider::Premium {
            return Ok(false);
        }
        let Some(encoded) = synthesis.audio else {
            return Ok(false);
        };

        let mp3 = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| crate::Error::Audio(format!("bad audio payload: {e}")))?;

        let player = Arc::clone(player);
        let cancel = Arc::clone(cancel);
        tokio::task::spawn_blocking(move || player.play_mp3(&mp3, &cancel))
            .await
            .map_err(|e| crate::Error::Audio(e.to_string()))??;
        Ok(true)
    }

    /// Speak through the local synthesizer; errors are logged, never
    /// surfaced to the user
    async fn fallback(&self, text: &str, cancel: &Arc<AtomicBool>) {
        let Some(synth) = self.synth.as_ref() else {
            tracing::debug!("no local synthesizer, answer not spoken");
            return;
        };

        let synth = Arc::clone(synth);
        let voice = self.fallback_voice.clone();
        let text = text.to_string();
        let cancel = Arc::clone(cancel);

        let result =
            tokio::task::spawn_blocking(move || synth.speak(&text, voice.as_deref(), &cancel))
                .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "local synthesis failed"),
            Err(e) => tracing::warn!(error = %e, "local synthesis task failed"),
        }
    }

    fn send(&self, event: PlaybackEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(?event, "playback event receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        Answer, ClusterSummary, HealthReport, PersonalityChange, PersonalityInfo, Synthesis,
    };
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;

    /// Backend that always reports no premium audio
    struct NoAudioBackend;

    #[async_trait]
    impl Backend for NoAudioBackend {
        async fn ask(&self, _question: &str) -> Result<Answer> {
            unimplemented!()
        }

        async fn synthesize(&self, _text: &str) -> Result<Synthesis> {
            Ok(Synthesis {
                provider: SynthesisProvider::None,
                audio: None,
            })
        }

        async fn cluster_summary(&self) -> Result<ClusterSummary> {
            unimplemented!()
        }

        async fn personality(&self) -> Result<PersonalityInfo> {
            unimplemented!()
        }

        async fn set_personality(&self, _mode: &str) -> Result<PersonalityChange> {
            unimplemented!()
        }

        async fn health_report(&self) -> Result<HealthReport> {
            unimplemented!()
        }
    }

    /// Synthesizer that records what it was asked to speak
    struct RecordingSynth {
        spoken: Mutex<Vec<String>>,
        fail: bool,
    }

    impl LocalSynth for RecordingSynth {
        fn voices(&self) -> Vec<crate::speech::synth::VoiceInfo> {
            vec![crate::speech::synth::VoiceInfo {
                name: "Samantha".to_string(),
            }]
        }

        fn speak(
            &self,
            text: &str,
            _voice: Option<&str>,
            _cancel: &Arc<AtomicBool>,
        ) -> Result<()> {
            self.spoken
                .lock()
                .expect("lock poisoned")
                .push(text.to_string());
            if self.fail {
                return Err(Error::Synthesis("engine died".to_string()));
            }
            Ok(())
        }
    }

    fn output_with(
        synth: Option<Arc<dyn LocalSynth>>,
    ) -> (Arc<SpeechOutput>, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let output = SpeechOutput::new(
            Arc::new(NoAudioBackend),
            None,
            synth,
            &SynthConfig::default(),
            tx,
        );
        (Arc::new(output), rx)
    }

    #[tokio::test]
    async fn test_no_premium_audio_uses_fallback_with_exact_text() {
        let synth = Arc::new(RecordingSynth {
            spoken: Mutex::new(Vec::new()),
            fail: false,
        });
        let (output, mut rx) = output_with(Some(Arc::clone(&synth) as Arc<dyn LocalSynth>));

        output.speak("All nodes healthy".to_string());

        assert_eq!(rx.recv().await, Some(PlaybackEvent::Started));
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Finished));
        assert_eq!(
            synth.spoken.lock().expect("lock poisoned").as_slice(),
            ["All nodes healthy"]
        );
    }

    #[tokio::test]
    async fn test_finished_fires_even_when_fallback_fails() {
        let synth = Arc::new(RecordingSynth {
            spoken: Mutex::new(Vec::new()),
            fail: true,
        });
        let (output, mut rx) = output_with(Some(synth as Arc<dyn LocalSynth>));

        output.speak("hello".to_string());

        assert_eq!(rx.recv().await, Some(PlaybackEvent::Started));
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Finished));
    }

    #[tokio::test]
    async fn test_finished_fires_without_any_synthesizer() {
        let (output, mut rx) = output_with(None);

        output.speak("hello".to_string());

        assert_eq!(rx.recv().await, Some(PlaybackEvent::Started));
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Finished));
    }

    #[tokio::test]
    async fn test_stop_flags_current_playback() {
        let (output, _rx) = output_with(None);
        let cancel = Arc::new(AtomicBool::new(false));
        *output.current.lock().expect("lock poisoned") = Some(Arc::clone(&cancel));

        output.stop();
        assert!(cancel.load(Ordering::Relaxed));

        // Idempotent with nothing playing
        output.stop();
    }
}
