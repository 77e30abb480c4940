//! Personality modes mirrored from the backend
//!
//! The backend owns the current personality; the console only displays it
//! and requests changes. The cycle order matches the backend's fixed list.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Personality mode for backend answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersonalityMode {
    /// Backend picks per question
    #[default]
    Auto,
    /// Terse, factual
    Professional,
    /// Verbose, explanatory
    Helpful,
    /// Jokes allowed
    Funny,
}

impl PersonalityMode {
    /// Fixed cycle order
    pub const ALL: [Self; 4] = [
        Self::Auto,
        Self::Professional,
        Self::Helpful,
        Self::Funny,
    ];

    /// Next mode in the cycle, wrapping around
    #[must_use]
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Wire name used by the backend API
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Professional => "professional",
            Self::Helpful => "helpful",
            Self::Funny => "funny",
        }
    }
}

impl fmt::Display for PersonalityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonalityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "professional" => Ok(Self::Professional),
            "helpful" => Ok(Self::Helpful),
            "funny" => Ok(Self::Funny),
            other => Err(Error::Config(format!("unknown personality: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps() {
        let mut mode = PersonalityMode::Auto;
        for expected in [
            PersonalityMode::Professional,
            PersonalityMode::Helpful,
            PersonalityMode::Funny,
            PersonalityMode::Auto,
        ] {
            mode = mode.next();
            assert_eq!(mode, expected);
        }
    }

    #[test]
    fn test_parse_roundtrip() {
        for mode in PersonalityMode::ALL {
            assert_eq!(mode.as_str().parse::<PersonalityMode>().unwrap(), mode);
        }
        assert!("sassy".parse::<PersonalityMode>().is_err());
    }
}
