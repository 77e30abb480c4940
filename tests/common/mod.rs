//! Shared test utilities
//!
//! Each integration test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stewie_console::backend::{
    Answer, Backend, ClusterSummary, HealthReport, PersonalityChange, PersonalityInfo, Synthesis,
    SynthesisProvider,
};
use stewie_console::session::{Command, Session, SessionEvent};
use stewie_console::{Error, PhraseMatcher, Result, Transcript};

/// Matcher with the default wake/sleep phrase sets
#[must_use]
pub fn matcher() -> PhraseMatcher {
    PhraseMatcher::new(
        vec![
            "hey stewie".to_string(),
            "stewie".to_string(),
            "hey stewart".to_string(),
            "stewart".to_string(),
        ],
        vec![
            "quit".to_string(),
            "exit".to_string(),
            "sleep".to_string(),
            "stop listening".to_string(),
        ],
    )
    .expect("valid phrase lists")
}

/// New session with speech available, mount commands discarded
#[must_use]
pub fn new_session() -> Session {
    let (session, _mount) = Session::new(matcher(), true);
    session
}

/// Fire the startup restart and return the armed recognition epoch
pub fn arm(session: &mut Session) -> u64 {
    let commands = session.handle(SessionEvent::RestartElapsed(
        stewie_console::session::RestartTrigger::Startup,
    ));
    epoch_of_start(&commands).expect("startup restart arms recognition")
}

/// Extract the epoch from a `StartRecognition` command, if present
#[must_use]
pub fn epoch_of_start(commands: &[Command]) -> Option<u64> {
    commands.iter().find_map(|c| match c {
        Command::StartRecognition { epoch } => Some(*epoch),
        _ => None,
    })
}

/// Transcript event carrying the given epoch
#[must_use]
pub fn heard(text: &str, epoch: u64) -> SessionEvent {
    SessionEvent::Transcript(Transcript::new(text, epoch))
}

/// True if any command matches the predicate
pub fn has(commands: &[Command], pred: impl Fn(&Command) -> bool) -> bool {
    commands.iter().any(pred)
}

/// Backend double with scripted answers and a call log
pub struct MockBackend {
    /// Queued `ask` results, popped in order
    pub answers: Mutex<VecDeque<Result<Answer>>>,
    /// Method call log: "ask:<q>", "set_personality:<m>", ...
    pub calls: Mutex<Vec<String>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn queue_answer(&self, text: &str) {
        self.answers
            .lock()
            .expect("lock poisoned")
            .push_back(Ok(Answer {
                answer: text.to_string(),
                personality: None,
            }));
    }

    pub fn queue_failure(&self, message: &str) {
        self.answers
            .lock()
            .expect("lock poisoned")
            .push_back(Err(Error::Backend(message.to_string())));
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn ask(&self, question: &str) -> Result<Answer> {
        self.log(format!("ask:{question}"));
        self.answers
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Ok(Answer {
                    answer: "ok".to_string(),
                    personality: None,
                })
            })
    }

    async fn synthesize(&self, text: &str) -> Result<Synthesis> {
        self.log(format!("synthesize:{text}"));
        Ok(Synthesis {
            provider: SynthesisProvider::None,
            audio: None,
        })
    }

    async fn cluster_summary(&self) -> Result<ClusterSummary> {
        self.log("cluster_summary".to_string());
        Ok(ClusterSummary::default())
    }

    async fn personality(&self) -> Result<PersonalityInfo> {
        self.log("personality".to_string());
        Ok(PersonalityInfo {
            current: "auto".to_string(),
        })
    }

    async fn set_personality(&self, mode: &str) -> Result<PersonalityChange> {
        self.log(format!("set_personality:{mode}"));
        Ok(PersonalityChange {
            success: true,
            description: "as requested".to_string(),
        })
    }

    async fn health_report(&self) -> Result<HealthReport> {
        self.log("health_report".to_string());
        Ok(HealthReport {
            health_score: 87,
            emoji: "OK".to_string(),
            status: "healthy".to_string(),
            warnings: vec!["node cold is low on disk".to_string()],
            insights: vec![],
            recommendations: vec![],
        })
    }
}
