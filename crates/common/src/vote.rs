//! Prepare-phase votes and protocol phase names

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the prepare phase as decided by the transaction manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    /// All resources voted yes; the transaction may commit
    Commit,
    /// No resource made changes; second phase can be skipped
    ReadOnly,
    /// At least one resource voted no; the transaction must roll back
    Rollback,
}

impl Vote {
    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commit" => Some(Self::Commit),
            "read_only" => Some(Self::ReadOnly),
            "rollback" => Some(Self::Rollback),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::ReadOnly => "read_only",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 2PC phase being driven, used to label delegate failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Vote collection
    Prepare,
    /// Commit decision
    Commit,
    /// Rollback decision
    Rollback,
}

impl Phase {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_string_roundtrip() {
        for vote in [Vote::Commit, Vote::ReadOnly, Vote::Rollback] {
            assert_eq!(Vote::parse(vote.as_str()), Some(vote));
        }
        assert_eq!(Vote::parse("maybe"), None);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Prepare.to_string(), "prepare");
        assert_eq!(Phase::Commit.to_string(), "commit");
        assert_eq!(Phase::Rollback.to_string(), "rollback");
    }
}
