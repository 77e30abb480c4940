//! Stewie console - voice and text front-end for the Stewie cluster assistant
//!
//! The user types or speaks questions; the backend answers; answers are
//! spoken aloud. The core of the crate is the conversation state machine
//! in [`session`], which arbitrates between wake-listening, active
//! listening, thinking, and speaking without ever leaving the session
//! stuck or double-listening.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Input surfaces                   │
//! │      speech recognizer    │    typed prompt      │
//! └─────────────┬────────────────────┬──────────────┘
//!               │                    │
//! ┌─────────────▼────────────────────▼──────────────┐
//! │            Session (state machine)               │
//! │   wake/sleep phrases │ restart policy │ dispatch │
//! └─────────────┬────────────────────┬──────────────┘
//!               │                    │
//! ┌─────────────▼──────────┐ ┌───────▼──────────────┐
//! │   Speech output         │ │   Stewie backend     │
//! │ premium TTS → fallback  │ │  ask / tts / status  │
//! └─────────────────────────┘ └──────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod personality;
pub mod phrase;
pub mod session;
pub mod speech;
pub mod status;
pub mod terminal;

pub use backend::{Backend, HttpBackend};
pub use config::Config;
pub use error::{Error, Result};
pub use personality::PersonalityMode;
pub use phrase::{PhraseMatcher, Transcript};
pub use session::{Command, Driver, ListeningMode, Phase, Session, SessionEvent, UserAction};
pub use speech::{SpeechOutput, SpeechRecognizer};
pub use status::{StatusPoller, StatusSnapshot};
pub use terminal::{LineKind, PendingAnswer, TerminalView};
