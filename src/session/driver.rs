//! Session event loop
//!
//! Single-consumer, cooperative: every callback (recognition, playback,
//! answers, timers, user actions) lands on one queue and is applied to
//! the state machine in arrival order. The driver executes the commands
//! the machine returns; it owns every side-effecting collaborator.
//!
//! Typed local commands ("set personality …", "analyze cluster") are
//! intercepted here before dispatch. Spoken transcripts are never
//! intercepted; they go to the backend verbatim.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::personality::PersonalityMode;
use crate::phrase::{PhraseMatcher, Transcript};
use crate::speech::{PlaybackEvent, RecognitionEvent, SpeechOutput, SpeechRecognizer};
use crate::status::StatusPoller;
use crate::terminal::{LineKind, PendingAnswer, TerminalView};

use super::machine::{Command, Session, SessionEvent};

/// User-initiated action from the input loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Free text submitted through the prompt
    Submit(String),
    /// Toggle voice mode
    ToggleVoice,
    /// Stop speech playback
    StopSpeaking,
    /// Cycle to the next personality
    CyclePersonality,
    /// Run the cluster health analysis
    AnalyzeCluster,
    /// Exit the console
    Quit,
}

/// Typed command handled locally instead of dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
enum LocalCommand {
    SetPersonality(PersonalityMode),
    AnalyzeCluster,
}

/// Collaborators handed to the driver at startup
pub struct DriverParts<W: Write> {
    /// Q&A / TTS / status backend
    pub backend: Arc<dyn Backend>,
    /// Recognition engine, when the platform has one
    pub recognizer: Option<Box<dyn SpeechRecognizer>>,
    /// Recognition event stream from the engine
    pub recognition_events: mpsc::UnboundedReceiver<RecognitionEvent>,
    /// Speech output controller
    pub output: Arc<SpeechOutput>,
    /// Playback event stream from the controller
    pub playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    /// Terminal view
    pub view: TerminalView<W>,
    /// Ambient status poller
    pub poller: Arc<StatusPoller>,
    /// Poke channel for question-triggered status refreshes
    pub status_poke: mpsc::Sender<()>,
    /// Wake/sleep phrase matcher
    pub matcher: PhraseMatcher,
}

/// Runs a conversation session to completion
pub struct Driver<W: Write> {
    session: Session,
    mount_commands: Vec<Command>,
    backend: Arc<dyn Backend>,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    output: Arc<SpeechOutput>,
    view: TerminalView<W>,
    poller: Arc<StatusPoller>,
    status_poke: mpsc::Sender<()>,
    personality: PersonalityMode,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<W: Write> Driver<W> {
    /// Build a driver and mount the session
    ///
    /// Speech is available when a recognizer exists; without one the
    /// session runs text-only.
    #[must_use]
    pub fn new(parts: DriverParts<W>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        spawn_forwarders(
            &events_tx,
            parts.recognition_events,
            parts.playback_events,
        );

        let speech_available = parts.recognizer.is_some();
        let (session, mount_commands) = Session::new(parts.matcher, speech_available);

        Self {
            session,
            mount_commands,
            backend: parts.backend,
            recognizer: parts.recognizer,
            output: parts.output,
            view: parts.view,
            poller: parts.poller,
            status_poke: parts.status_poke,
            personality: PersonalityMode::Auto,
            events_tx,
            events_rx,
        }
    }

    /// Run until the action channel closes or the user quits
    pub async fn run(mut self, mut actions: mpsc::Receiver<UserAction>) {
        let mount = std::mem::take(&mut self.mount_commands);
        self.execute(mount);

        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    let commands = self.session.handle(event);
                    self.execute(commands);
                }
                action = actions.recv() => match action {
                    None | Some(UserAction::Quit) => break,
                    Some(action) => self.on_action(action).await,
                },
            }
        }

        // Quiesce both halves of the mic/speaker resource on exit.
        self.output.stop();
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
        }
        tracing::info!("session closed");
    }

    async fn on_action(&mut self, action: UserAction) {
        match action {
            UserAction::Submit(text) => {
                if let Some(local) = parse_local(&text) {
                    self.view.push(LineKind::Prompt, text.trim());
                    match local {
                        LocalCommand::SetPersonality(mode) => self.set_personality(mode).await,
                        LocalCommand::AnalyzeCluster => self.analyze_cluster().await,
                    }
                } else {
                    self.feed(SessionEvent::TextSubmitted(text));
                }
            }
            UserAction::ToggleVoice => self.feed(SessionEvent::ToggleVoice),
            UserAction::StopSpeaking => self.feed(SessionEvent::StopSpeaking),
            UserAction::CyclePersonality => self.set_personality(self.personality.next()).await,
            UserAction::AnalyzeCluster => self.analyze_cluster().await,
            UserAction::Quit => {}
        }
    }

    fn feed(&mut self, event: SessionEvent) {
        let commands = self.session.handle(event);
        self.execute(commands);
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            self.execute_one(command);
        }
    }

    fn execute_one(&mut self, command: Command) {
        match command {
            Command::StartRecognition { epoch } => {
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.start(epoch);
                }
            }
            Command::StopRecognition => {
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.stop();
                }
            }
            Command::ScheduleRestart(trigger) => {
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(trigger.delay()).await;
                    let _ = events.send(SessionEvent::RestartElapsed(trigger));
                });
            }
            Command::Dispatch { question, pending } => {
                let backend = Arc::clone(&self.backend);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = backend.ask(&question).await;
                    let _ = events.send(SessionEvent::AnswerReady { pending, result });
                });
            }
            Command::Speak(text) => self.output.speak(text),
            Command::CancelPlayback => self.output.stop(),
            Command::Render { kind, text } => self.view.push(kind, &text),
            Command::RenderPending { pending, text } => self.view.push_pending(&pending, &text),
            Command::ResolvePending(pending) => self.view.resolve_pending(&pending),
            Command::MirrorPersonality(name) => {
                if let Ok(mode) = name.parse::<PersonalityMode>() {
                    self.personality = mode;
                }
                let poller = Arc::clone(&self.poller);
                tokio::spawn(async move { poller.set_personality_mirror(&name).await });
            }
            Command::RefreshStatus => {
                if self.status_poke.try_send(()).is_err() {
                    tracing::debug!("status refresh already queued");
                }
            }
        }
    }

    async fn set_personality(&mut self, mode: PersonalityMode) {
        match self.backend.set_personality(mode.as_str()).await {
            Ok(change) if change.success => {
                self.personality = mode;
                self.poller.set_personality_mirror(mode.as_str()).await;
                self.view.push(
                    LineKind::System,
                    &format!("personality: {mode} - {}", change.description),
                );
                self.view.push(LineKind::Blank, "");
            }
            Ok(_) => {
                self.view
                    .push(LineKind::Error, "personality change rejected");
                self.view.push(LineKind::Blank, "");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to change personality");
                self.view
                    .push(LineKind::Error, "failed to change personality");
                self.view.push(LineKind::Blank, "");
            }
        }
    }

    async fn analyze_cluster(&mut self) {
        let pending = PendingAnswer::new("analyze cluster");
        self.view
            .push_pending(&pending, "analyzing cluster health...");

        match self.backend.health_report().await {
            Ok(report) => {
                self.view.resolve_pending(&pending);
                self.view.push(
                    LineKind::Response,
                    &format!(
                        "Cluster Health: {}/100 {} ({})",
                        report.health_score, report.emoji, report.status
                    ),
                );
                self.view.push(LineKind::Blank, "");

                for (title, items) in [
                    ("warnings:", &report.warnings),
                    ("insights:", &report.insights),
                    ("recommendations:", &report.recommendations),
                ] {
                    if items.is_empty() {
                        continue;
                    }
                    self.view.push(LineKind::Response, title);
                    for item in items {
                        self.view.push(LineKind::Response, &format!("  - {item}"));
                    }
                    self.view.push(LineKind::Blank, "");
                }

                if self.status_poke.try_send(()).is_err() {
                    tracing::debug!("status refresh already queued");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "health analysis failed");
                self.view.resolve_pending(&pending);
                self.view
                    .push(LineKind::Error, "failed to get health analysis");
                self.view.push(LineKind::Blank, "");
            }
        }
    }
}

/// Forward engine and playback events onto the session queue
fn spawn_forwarders(
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
    mut recognition: mpsc::UnboundedReceiver<RecognitionEvent>,
    mut playback: mpsc::UnboundedReceiver<PlaybackEvent>,
) {
    let tx = events_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = recognition.recv().await {
            let mapped = match event {
                RecognitionEvent::Result { text, epoch } => {
                    SessionEvent::Transcript(Transcript::new(&text, epoch))
                }
                RecognitionEvent::Error(kind) => SessionEvent::RecognitionError(kind),
                RecognitionEvent::End => SessionEvent::RecognitionEnded,
            };
            if tx.send(mapped).is_err() {
                break;
            }
        }
    });

    let tx = events_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = playback.recv().await {
            let mapped = match event {
                PlaybackEvent::Started => SessionEvent::PlaybackStarted,
                PlaybackEvent::Finished => SessionEvent::PlaybackFinished,
            };
            if tx.send(mapped).is_err() {
                break;
            }
        }
    });
}

/// Parse a typed local command; anything else is a question
fn parse_local(text: &str) -> Option<LocalCommand> {
    let normalized = text.trim().to_lowercase();
    if normalized == "analyze cluster" {
        return Some(LocalCommand::AnalyzeCluster);
    }
    if let Some(rest) = normalized.strip_prefix("set personality") {
        return rest.trim().parse().ok().map(LocalCommand::SetPersonality);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_commands() {
        assert_eq!(
            parse_local("Analyze Cluster"),
            Some(LocalCommand::AnalyzeCluster)
        );
        assert_eq!(
            parse_local("set personality funny"),
            Some(LocalCommand::SetPersonality(PersonalityMode::Funny))
        );
        // Unknown mode falls through to the backend as a question
        assert_eq!(parse_local("set personality grumpy"), None);
        assert_eq!(parse_local("how many pods are running"), None);
    }
}
