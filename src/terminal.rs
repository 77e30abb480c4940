//! Terminal line rendering
//!
//! Owns the scrollback model and the placeholder ("thinking") lifecycle.
//! The orchestrator hands out a [`PendingAnswer`] at dispatch time and the
//! view decides how to remove the placeholder when the answer lands — here
//! by popping the model line and rewriting the console line in place.

use std::io::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Kind of a rendered line, controls the prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Echoed user input
    Prompt,
    /// Assistant answer
    Response,
    /// System/status message
    System,
    /// Error message
    Error,
    /// Spacer
    Blank,
}

/// A rendered line in the scrollback model
#[derive(Debug, Clone)]
pub struct Line {
    /// Line kind
    pub kind: LineKind,
    /// Line text
    pub text: String,
    /// Placeholder handle this line belongs to, if any
    pub pending: Option<Uuid>,
}

/// Handle to an in-flight question's placeholder line
///
/// Returned at dispatch time and consumed when the answer (or error)
/// arrives. Resolution is best-effort: resolving a handle whose line is
/// already gone is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    id: Uuid,
    question: String,
    issued_at: DateTime<Utc>,
}

impl PendingAnswer {
    /// Create a handle for a dispatched question
    #[must_use]
    pub fn new(question: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.to_string(),
            issued_at: Utc::now(),
        }
    }

    /// Handle identity
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The dispatched question text
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// When the question was dispatched
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Terminal view: scrollback model plus a write sink
pub struct TerminalView<W: Write> {
    lines: Vec<Line>,
    out: W,
}

impl<W: Write> TerminalView<W> {
    /// Create a view writing to the given sink
    pub const fn new(out: W) -> Self {
        Self {
            lines: Vec::new(),
            out,
        }
    }

    /// Append a line and print it
    pub fn push(&mut self, kind: LineKind, text: &str) {
        self.write_line(kind, text);
        self.lines.push(Line {
            kind,
            text: text.to_string(),
            pending: None,
        });
    }

    /// Append a placeholder line owned by a pending answer
    pub fn push_pending(&mut self, pending: &PendingAnswer, text: &str) {
        self.write_line(LineKind::System, text);
        self.lines.push(Line {
            kind: LineKind::System,
            text: text.to_string(),
            pending: Some(pending.id()),
        });
    }

    /// Remove the placeholder line for a pending answer, if still present
    ///
    /// When the placeholder is the most recent line the console line is
    /// cleared in place; otherwise only the model is updated.
    pub fn resolve_pending(&mut self, pending: &PendingAnswer) {
        let Some(idx) = self
            .lines
            .iter()
            .rposition(|l| l.pending == Some(pending.id()))
        else {
            return;
        };

        if idx == self.lines.len() - 1 {
            // Rewind the console line the placeholder occupies.
            let _ = write!(self.out, "\x1b[1A\x1b[2K");
            let _ = self.out.flush();
        }
        self.lines.remove(idx);
    }

    /// Scrollback model (most recent last)
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    fn write_line(&mut self, kind: LineKind, text: &str) {
        let result = match kind {
            LineKind::Prompt => writeln!(self.out, "you@stewie ~$ {text}"),
            LineKind::Response => writeln!(self.out, "{text}"),
            LineKind::System => writeln!(self.out, ":: {text}"),
            LineKind::Error => writeln!(self.out, "!! {text}"),
            LineKind::Blank => writeln!(self.out),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "terminal write failed");
        }
        let _ = self.out.flush();
    }
}

/// Print the startup banner
pub fn banner<W: Write>(view: &mut TerminalView<W>, wake_phrase: &str, sleep_phrases: &str) {
    view.push(LineKind::System, "Stewie console - cluster assistant");
    view.push(
        LineKind::System,
        "commands: /voice /stop /mode /analyze /quit | \"set personality [mode]\"",
    );
    view.push(
        LineKind::System,
        &format!("voice: say \"{wake_phrase}\" to wake | {sleep_phrases} to sleep"),
    );
    view.push(LineKind::Blank, "");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> TerminalView<Vec<u8>> {
        TerminalView::new(Vec::new())
    }

    #[test]
    fn test_push_and_model() {
        let mut v = view();
        v.push(LineKind::Prompt, "how many pods");
        v.push(LineKind::Response, "12 running");
        assert_eq!(v.lines().len(), 2);
        assert_eq!(v.lines()[0].kind, LineKind::Prompt);
        assert_eq!(v.lines()[1].text, "12 running");
    }

    #[test]
    fn test_resolve_pending_removes_line() {
        let mut v = view();
        let pending = PendingAnswer::new("how many pods");
        v.push(LineKind::Prompt, "how many pods");
        v.push_pending(&pending, "Thinking...");
        assert_eq!(v.lines().len(), 2);

        v.resolve_pending(&pending);
        assert_eq!(v.lines().len(), 1);
        assert_eq!(v.lines()[0].kind, LineKind::Prompt);
    }

    #[test]
    fn test_resolve_missing_pending_is_noop() {
        let mut v = view();
        v.push(LineKind::Response, "done");
        let pending = PendingAnswer::new("q");
        v.resolve_pending(&pending);
        assert_eq!(v.lines().len(), 1);
    }

    #[test]
    fn test_resolve_non_tail_pending_only_updates_model() {
        let mut v = view();
        let pending = PendingAnswer::new("q");
        v.push_pending(&pending, "Thinking...");
        v.push(LineKind::System, "status refreshed");
        v.resolve_pending(&pending);
        assert_eq!(v.lines().len(), 1);
        assert_eq!(v.lines()[0].text, "status refreshed");
    }
}
