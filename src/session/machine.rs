//! Conversation state machine
//!
//! Owns the listening/speaking state and nothing else: events come in,
//! commands go out, and every side effect (recognizer control, playback,
//! rendering, dispatch, timers) is executed by the driver. This keeps the
//! transition table testable without timing.
//!
//! The microphone and speaker are one mutually exclusive resource:
//! recognition is never started while playback is active. Restarts are
//! scheduled as [`Command::ScheduleRestart`] and re-validated when the
//! timer fires (`RestartElapsed`), not when it was scheduled, so a stray
//! timer from a cancelled session is a no-op.

use crate::backend::Answer;
use crate::phrase::{PhraseMatcher, Transcript};
use crate::speech::RecognitionErrorKind;
use crate::terminal::{LineKind, PendingAnswer};
use crate::{Error, Result};

use super::restart::RestartTrigger;

/// High-level listening mode
///
/// Exactly one holds at any time. `Idle` is terminal and only reached
/// when no speech capability exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningMode {
    /// No speech capability; text-only session
    Idle,
    /// Passively listening for a wake phrase
    AwaitingWake,
    /// Active conversation: transcripts are sleep phrases or questions
    Active,
}

/// Derived orchestrator phase, for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Text-only session
    Idle,
    /// Waiting for a wake phrase
    AwaitingWake,
    /// Active and listening for a question
    Listening,
    /// Question dispatched, awaiting the answer
    Thinking,
    /// Speaking an answer
    Speaking,
}

/// Event delivered to the state machine
#[derive(Debug)]
pub enum SessionEvent {
    /// Recognizer produced a transcript
    Transcript(Transcript),
    /// Recognition attempt failed
    RecognitionError(RecognitionErrorKind),
    /// Recognition attempt ended (fires exactly once per attempt)
    RecognitionEnded,
    /// A dispatched question resolved
    AnswerReady {
        /// Placeholder handle from dispatch time
        pending: PendingAnswer,
        /// Answer or failure
        result: Result<Answer>,
    },
    /// Speech playback began
    PlaybackStarted,
    /// Speech playback finished (success or error)
    PlaybackFinished,
    /// User submitted text through the non-voice input path
    TextSubmitted(String),
    /// User pressed the voice toggle
    ToggleVoice,
    /// User requested playback stop
    StopSpeaking,
    /// A scheduled restart timer fired
    RestartElapsed(RestartTrigger),
}

/// Side effect requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a recognition attempt tagged with the given epoch
    StartRecognition {
        /// Epoch transcripts from this attempt must carry
        epoch: u64,
    },
    /// Cancel any pending recognition attempt
    StopRecognition,
    /// Arm a restart timer; delivered back as `RestartElapsed`
    ScheduleRestart(RestartTrigger),
    /// Send a question to the Q&A collaborator
    Dispatch {
        /// Question text, forwarded verbatim
        question: String,
        /// Placeholder handle to resolve with the answer
        pending: PendingAnswer,
    },
    /// Speak an answer (premium synthesis with local fallback)
    Speak(String),
    /// Halt any in-progress playback
    CancelPlayback,
    /// Append a terminal line
    Render {
        /// Line kind
        kind: LineKind,
        /// Line text
        text: String,
    },
    /// Append the thinking placeholder for a pending answer
    RenderPending {
        /// Placeholder handle
        pending: PendingAnswer,
        /// Placeholder text
        text: String,
    },
    /// Remove the placeholder for a pending answer (best-effort)
    ResolvePending(PendingAnswer),
    /// Mirror the personality reported with an answer
    MirrorPersonality(String),
    /// Refresh the ambient status display
    RefreshStatus,
}

/// The conversation orchestrator
pub struct Session {
    matcher: PhraseMatcher,
    mode: ListeningMode,
    speaking: bool,
    thinking: Option<PendingAnswer>,
    epoch: u64,
}

impl Session {
    /// Create a session and its mount-time commands
    ///
    /// With speech available the session arms wake listening after the
    /// startup delay; without it the session is permanently text-only.
    #[must_use]
    pub fn new(matcher: PhraseMatcher, speech_available: bool) -> (Self, Vec<Command>) {
        let mut commands = Vec::new();
        let mode = if speech_available {
            let wake = matcher
                .wake_phrases()
                .first()
                .cloned()
                .unwrap_or_default();
            commands.push(render(
                LineKind::System,
                format!("listening for \"{wake}\" to wake"),
            ));
            commands.push(render(LineKind::Blank, String::new()));
            commands.push(Command::ScheduleRestart(RestartTrigger::Startup));
            ListeningMode::AwaitingWake
        } else {
            commands.push(render(
                LineKind::System,
                "voice recognition not available - text-only session".to_string(),
            ));
            commands.push(render(LineKind::Blank, String::new()));
            ListeningMode::Idle
        };

        tracing::info!(?mode, "session mounted");

        (
            Self {
                matcher,
                mode,
                speaking: false,
                thinking: None,
                epoch: 0,
            },
            commands,
        )
    }

    /// Current listening mode
    #[must_use]
    pub const fn mode(&self) -> ListeningMode {
        self.mode
    }

    /// True while audio output is in progress
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Current recognition epoch
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Derived phase per the transition table
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self.mode {
            ListeningMode::Idle => Phase::Idle,
            ListeningMode::AwaitingWake => Phase::AwaitingWake,
            ListeningMode::Active => {
                if self.speaking {
                    Phase::Speaking
                } else if self.thinking.is_some() {
                    Phase::Thinking
                } else {
                    Phase::Listening
                }
            }
        }
    }

    /// Apply one event, returning the side effects to execute
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        match event {
            SessionEvent::Transcript(t) => self.on_transcript(&t),
            SessionEvent::RecognitionError(kind) => self.on_recognition_error(&kind),
            SessionEvent::RecognitionEnded => self.on_recognition_ended(),
            SessionEvent::AnswerReady { pending, result } => self.on_answer(&pending, result),
            SessionEvent::PlaybackStarted => {
                self.speaking = true;
                Vec::new()
            }
            SessionEvent::PlaybackFinished => self.on_playback_finished(),
            SessionEvent::TextSubmitted(text) => self.on_text(&text),
            SessionEvent::ToggleVoice => self.on_toggle_voice(),
            SessionEvent::StopSpeaking => self.on_stop_speaking(),
            SessionEvent::RestartElapsed(trigger) => self.on_restart_elapsed(trigger),
        }
    }

    /// Restart guard, checked both when scheduling and when firing
    ///
    /// A pending answer blocks active-mode restarts: the mic stays
    /// closed from dispatch until the playback cycle re-arms it.
    const fn may_listen(&self) -> bool {
        if self.speaking {
            return false;
        }
        match self.mode {
            ListeningMode::Idle => false,
            ListeningMode::AwaitingWake => true,
            ListeningMode::Active => self.thinking.is_none(),
        }
    }

    /// Emit a start tagged with the current epoch
    ///
    /// A result and its trailing end can each schedule a restart; the
    /// engine swallows the duplicate start, so every start between two
    /// stops must carry the same epoch or the surviving attempt's
    /// results would read as stale.
    const fn start_recognition(&self) -> Command {
        Command::StartRecognition { epoch: self.epoch }
    }

    /// Bump the epoch so in-flight results are discarded, then stop
    fn stop_recognition(&mut self) -> Command {
        self.epoch += 1;
        Command::StopRecognition
    }

    fn on_transcript(&mut self, transcript: &Transcript) -> Vec<Command> {
        if transcript.epoch() != self.epoch {
            tracing::debug!(
                got = transcript.epoch(),
                current = self.epoch,
                "discarding stale transcript"
            );
            return Vec::new();
        }

        tracing::debug!(text = %transcript.text(), phase = ?self.phase(), "heard");

        match self.mode {
            ListeningMode::Idle => Vec::new(),
            ListeningMode::AwaitingWake => {
                if self.matcher.matches_wake(transcript) {
                    let mut commands = vec![
                        render(LineKind::System, "wake phrase detected".to_string()),
                        render(LineKind::Blank, String::new()),
                    ];
                    commands.extend(self.enter_active());
                    commands
                } else {
                    vec![Command::ScheduleRestart(RestartTrigger::KeepListening)]
                }
            }
            ListeningMode::Active => {
                if self.matcher.matches_sleep(transcript) {
                    self.enter_awaiting_wake(true)
                } else {
                    let mut commands = vec![render(
                        LineKind::Prompt,
                        transcript.text().to_string(),
                    )];
                    commands.extend(self.dispatch(transcript.text()));
                    commands
                }
            }
        }
    }

    fn on_recognition_error(&mut self, kind: &RecognitionErrorKind) -> Vec<Command> {
        if !kind.is_benign() {
            tracing::warn!(error = %kind, "recognition error");
        }
        if self.may_listen() {
            vec![Command::ScheduleRestart(RestartTrigger::RecognitionError)]
        } else {
            Vec::new()
        }
    }

    fn on_recognition_ended(&mut self) -> Vec<Command> {
        if self.may_listen() {
            vec![Command::ScheduleRestart(RestartTrigger::KeepListening)]
        } else {
            Vec::new()
        }
    }

    fn on_answer(&mut self, pending: &PendingAnswer, result: Result<Answer>) -> Vec<Command> {
        if self
            .thinking
            .as_ref()
            .is_some_and(|p| p.id() == pending.id())
        {
            self.thinking = None;
        }

        let mut commands = vec![Command::ResolvePending(pending.clone())];

        match result {
            Ok(answer) => {
                commands.push(render(LineKind::Response, answer.answer.clone()));
                if let Some(personality) = answer.personality {
                    commands.push(Command::MirrorPersonality(personality));
                }
                commands.push(render(LineKind::Blank, String::new()));
                // Flag goes up before synthesis starts so no restart can
                // slip in between answer and audio.
                self.speaking = true;
                commands.push(Command::Speak(answer.answer));
                commands.push(Command::RefreshStatus);
            }
            Err(e) => {
                let message = match &e {
                    Error::Http(_) => "could not connect to server".to_string(),
                    other => format!("error: {other}"),
                };
                commands.push(render(LineKind::Error, message));
                commands.push(render(LineKind::Blank, String::new()));
                self.speaking = false;
                if self.mode == ListeningMode::Active {
                    commands.push(Command::ScheduleRestart(RestartTrigger::AnswerFailed));
                }
            }
        }

        commands
    }

    fn on_playback_finished(&mut self) -> Vec<Command> {
        self.speaking = false;
        if self.mode == ListeningMode::Active {
            vec![Command::ScheduleRestart(RestartTrigger::PlaybackDone)]
        } else {
            Vec::new()
        }
    }

    fn on_text(&mut self, text: &str) -> Vec<Command> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let mut commands = vec![render(LineKind::Prompt, text.to_string())];
        commands.extend(self.dispatch(text));
        commands
    }

    /// Dispatch a question to the Q&A collaborator
    ///
    /// Playback is always interrupted first so a new question is never
    /// answered over a stale one. Recognition is stopped only in active
    /// mode; a typed question while wake-listening leaves the wake
    /// session running (preserved asymmetry of the original design).
    fn dispatch(&mut self, question: &str) -> Vec<Command> {
        let mut commands = Vec::new();

        if self.speaking {
            commands.push(Command::CancelPlayback);
            self.speaking = false;
        }
        if self.mode == ListeningMode::Active {
            commands.push(self.stop_recognition());
        }

        let pending = PendingAnswer::new(question);
        self.thinking = Some(pending.clone());
        commands.push(Command::RenderPending {
            pending: pending.clone(),
            text: "Thinking...".to_string(),
        });
        commands.push(Command::Dispatch {
            question: question.to_string(),
            pending,
        });
        commands
    }

    fn on_toggle_voice(&mut self) -> Vec<Command> {
        match self.mode {
            ListeningMode::Idle => {
                vec![render(
                    LineKind::Error,
                    "voice recognition not available".to_string(),
                )]
            }
            ListeningMode::AwaitingWake => self.enter_active(),
            ListeningMode::Active => {
                let mut commands = Vec::new();
                if self.speaking {
                    commands.push(Command::CancelPlayback);
                    self.speaking = false;
                }
                commands.extend(self.enter_awaiting_wake(false));
                commands
            }
        }
    }

    fn on_stop_speaking(&mut self) -> Vec<Command> {
        let mut commands = vec![Command::CancelPlayback];
        self.speaking = false;
        if self.mode == ListeningMode::Active {
            commands.push(Command::ScheduleRestart(RestartTrigger::PlaybackCancelled));
        }
        commands
    }

    fn on_restart_elapsed(&mut self, trigger: RestartTrigger) -> Vec<Command> {
        // Guard at fire time, not schedule time: the mode may have
        // changed in between. Triggers scheduled from the active
        // speaking/thinking context are void once the mode left Active.
        let mode_ok = match trigger {
            RestartTrigger::Startup
            | RestartTrigger::KeepListening
            | RestartTrigger::RecognitionError => self.may_listen(),
            RestartTrigger::PlaybackDone
            | RestartTrigger::AnswerFailed
            | RestartTrigger::PlaybackCancelled => {
                self.mode == ListeningMode::Active && !self.speaking && self.thinking.is_none()
            }
        };

        if mode_ok {
            vec![self.start_recognition()]
        } else {
            tracing::debug!(?trigger, phase = ?self.phase(), "restart skipped");
            Vec::new()
        }
    }

    /// Transition to active conversation mode
    fn enter_active(&mut self) -> Vec<Command> {
        self.mode = ListeningMode::Active;
        tracing::info!("voice mode active");

        let sleep = self
            .matcher
            .sleep_phrases()
            .first()
            .cloned()
            .unwrap_or_default();
        vec![
            render(
                LineKind::System,
                "voice mode active - listening continuously".to_string(),
            ),
            render(LineKind::System, format!("say \"{sleep}\" to sleep")),
            render(LineKind::Blank, String::new()),
            self.start_recognition(),
        ]
    }

    /// Transition back to wake listening
    fn enter_awaiting_wake(&mut self, announce_sleep: bool) -> Vec<Command> {
        let mut commands = vec![self.stop_recognition()];
        self.mode = ListeningMode::AwaitingWake;
        self.thinking = None;
        tracing::info!("returning to wake listening");

        let wake = self
            .matcher
            .wake_phrases()
            .first()
            .cloned()
            .unwrap_or_default();
        if announce_sleep {
            commands.push(render(
                LineKind::System,
                format!("going to sleep - say \"{wake}\" to wake"),
            ));
            commands.push(render(LineKind::Blank, String::new()));
        }
        commands.push(self.start_recognition());
        commands
    }
}

fn render(kind: LineKind, text: String) -> Command {
    Command::Render { kind, text }
}
