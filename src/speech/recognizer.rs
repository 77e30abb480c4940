//! Speech recognition seam
//!
//! The console consumes recognition through a narrow event interface:
//! one result per utterance, error codes, and exactly one end per
//! attempt. Engines do not serialize starts reliably, so `start` must be
//! defensive: starting an already-running attempt is swallowed, and
//! `stop` with nothing running is a no-op.

use std::fmt;

/// Recognition failure code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Nothing was heard before the attempt timed out
    NoSpeech,
    /// The attempt was cancelled
    Aborted,
    /// Anything else (device, permission, engine)
    Other(String),
}

impl RecognitionErrorKind {
    /// Benign errors are expected during normal operation and are
    /// retried silently without logging.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::Aborted)
    }
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSpeech => f.write_str("no-speech"),
            Self::Aborted => f.write_str("aborted"),
            Self::Other(code) => f.write_str(code),
        }
    }
}

/// Event emitted by a recognition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Best hypothesis for one utterance
    Result {
        /// Raw recognized text
        text: String,
        /// Epoch passed to the `start` that produced this result
        epoch: u64,
    },
    /// The attempt failed
    Error(RecognitionErrorKind),
    /// The attempt completed, successfully or not (exactly once)
    End,
}

/// A speech recognition engine
///
/// Implementations deliver [`RecognitionEvent`]s on the channel handed
/// to them at construction. Both methods are idempotent.
pub trait SpeechRecognizer: Send {
    /// Request one recognition attempt, tagging its results with `epoch`
    ///
    /// Must swallow "already started" failures from the engine.
    fn start(&mut self, epoch: u64);

    /// Cancel a pending attempt; safe to call when not running
    fn stop(&mut self);
}

/// Detect an on-device recognition engine for the given locale
///
/// No engine is currently integrated on this platform, so voice input
/// degrades to the text-only path unless a recognizer is injected (tests
/// script one). Reported once at startup by the session.
#[must_use]
pub fn detect_recognizer(
    locale: &str,
    _events: tokio::sync::mpsc::UnboundedSender<RecognitionEvent>,
) -> Option<Box<dyn SpeechRecognizer>> {
    tracing::debug!(locale, "no on-device speech recognition engine available");
    None
}
