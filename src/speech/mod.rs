//! Speech input and output
//!
//! Recognition comes in through the [`SpeechRecognizer`] seam; answers
//! go out through [`SpeechOutput`], which prefers premium synthesized
//! audio and falls back to an on-device engine.

mod output;
mod playback;
mod recognizer;
mod synth;

pub use output::{PlaybackEvent, SpeechOutput};
pub use playback::{AudioPlayer, DecodedAudio, decode_mp3};
pub use recognizer::{
    RecognitionErrorKind, RecognitionEvent, SpeechRecognizer, detect_recognizer,
};
pub use synth::{CommandSynth, LocalSynth, VoiceInfo, pick_voice};
