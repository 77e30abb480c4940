//! Wake and sleep phrase matching
//!
//! Pure and stateless: the orchestrator decides *when* to check (wake
//! phrases only while awaiting wake, sleep phrases only while active);
//! this module only answers *whether* a phrase is present. Matching is
//! substring containment on normalized text, so a sleep word embedded in
//! a legitimate question ("please exit the pod") does match — that is the
//! intended literal behavior.

use crate::{Error, Result};

/// A recognized utterance, normalized for matching
///
/// Carries the recognition epoch it was produced in so results from a
/// recognition session that has since been stopped can be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    text: String,
    epoch: u64,
}

impl Transcript {
    /// Normalize raw recognizer output (trim + lowercase)
    #[must_use]
    pub fn new(raw: &str, epoch: u64) -> Self {
        Self {
            text: raw.trim().to_lowercase(),
            epoch,
        }
    }

    /// Normalized text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Recognition epoch this transcript belongs to
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True when nothing was actually heard
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Matches wake and sleep phrases against transcripts
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    wake_phrases: Vec<String>,
    sleep_phrases: Vec<String>,
}

impl PhraseMatcher {
    /// Create a matcher from configured phrase lists
    ///
    /// Phrases are normalized to lowercase and trimmed.
    ///
    /// # Errors
    ///
    /// Returns error if either list is empty.
    pub fn new(wake_phrases: Vec<String>, sleep_phrases: Vec<String>) -> Result<Self> {
        if wake_phrases.is_empty() {
            return Err(Error::Config("at least one wake phrase required".to_string()));
        }
        if sleep_phrases.is_empty() {
            return Err(Error::Config("at least one sleep phrase required".to_string()));
        }

        let normalize = |phrases: Vec<String>| -> Vec<String> {
            phrases
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect()
        };

        let wake_phrases = normalize(wake_phrases);
        let sleep_phrases = normalize(sleep_phrases);
        tracing::debug!(?wake_phrases, ?sleep_phrases, "phrase matcher initialized");

        Ok(Self {
            wake_phrases,
            sleep_phrases,
        })
    }

    /// True if any wake phrase occurs in the transcript
    #[must_use]
    pub fn matches_wake(&self, transcript: &Transcript) -> bool {
        self.wake_phrases
            .iter()
            .any(|p| transcript.text().contains(p.as_str()))
    }

    /// True if any sleep phrase occurs in the transcript
    #[must_use]
    pub fn matches_sleep(&self, transcript: &Transcript) -> bool {
        self.sleep_phrases
            .iter()
            .any(|p| transcript.text().contains(p.as_str()))
    }

    /// Configured wake phrases (normalized)
    #[must_use]
    pub fn wake_phrases(&self) -> &[String] {
        &self.wake_phrases
    }

    /// Configured sleep phrases (normalized)
    #[must_use]
    pub fn sleep_phrases(&self) -> &[String] {
        &self.sleep_phrases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> PhraseMatcher {
        PhraseMatcher::new(
            vec!["hey stewie".to_string(), "stewie".to_string()],
            vec!["quit".to_string(), "exit".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_transcript_normalization() {
        let t = Transcript::new("  Hey Stewie, STATUS?  ", 1);
        assert_eq!(t.text(), "hey stewie, status?");
        assert_eq!(t.epoch(), 1);
    }

    #[test]
    fn test_wake_substring_case_insensitive() {
        let m = matcher();
        assert!(m.matches_wake(&Transcript::new("HEY STEWIE wake up", 0)));
        assert!(m.matches_wake(&Transcript::new("oh stewie please", 0)));
        assert!(!m.matches_wake(&Transcript::new("what's the weather", 0)));
    }

    #[test]
    fn test_sleep_embedded_word_matches() {
        // Literal containment: "exit" inside a question still matches.
        let m = matcher();
        assert!(m.matches_sleep(&Transcript::new("please exit the pod", 0)));
        assert!(!m.matches_sleep(&Transcript::new("how many pods", 0)));
    }

    #[test]
    fn test_phrase_normalization() {
        let m = PhraseMatcher::new(
            vec!["  Hey STEWIE  ".to_string()],
            vec!["QUIT".to_string()],
        )
        .unwrap();
        assert_eq!(m.wake_phrases(), &["hey stewie"]);
        assert_eq!(m.sleep_phrases(), &["quit"]);
    }

    #[test]
    fn test_empty_lists_rejected() {
        assert!(PhraseMatcher::new(vec![], vec!["quit".to_string()]).is_err());
        assert!(PhraseMatcher::new(vec!["stewie".to_string()], vec![]).is_err());
    }
}
