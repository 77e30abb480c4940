//! Recognition restart policy
//!
//! Every path that re-arms the recognizer goes through this table, so the
//! backoff constants live in one place. The delays keep the speech engine
//! from busy-looping and give the audio hardware time to release the
//! microphone after speaker playback.

use std::time::Duration;

/// Why a recognition restart was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartTrigger {
    /// Initial arm after mount, lets the speech engine initialize
    Startup,
    /// Recognition attempt ended without a mode change
    KeepListening,
    /// Recognition attempt failed
    RecognitionError,
    /// Speech playback finished
    PlaybackDone,
    /// Question dispatch failed
    AnswerFailed,
    /// User cancelled playback mid-answer
    PlaybackCancelled,
}

impl RestartTrigger {
    /// Delay before the restart fires
    #[must_use]
    pub const fn delay(self) -> Duration {
        match self {
            Self::Startup => Duration::from_millis(1000),
            Self::KeepListening | Self::PlaybackCancelled => Duration::from_millis(300),
            Self::RecognitionError => Duration::from_millis(500),
            Self::PlaybackDone | Self::AnswerFailed => Duration::from_millis(1000),
        }
    }
}
