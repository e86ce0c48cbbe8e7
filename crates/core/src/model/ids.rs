use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a story chapter. Catalog ids start at 1 and have no gaps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterId(u32);

impl ChapterId {
    /// The first chapter, which is always unlocked.
    pub const FIRST: ChapterId = ChapterId(1);

    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.0 == 1
    }

    /// The chapter whose completion unlocks this one.
    #[must_use]
    pub fn predecessor(&self) -> Option<ChapterId> {
        if self.0 <= 1 {
            None
        } else {
            Some(Self(self.0 - 1))
        }
    }

    #[must_use]
    pub fn successor(&self) -> ChapterId {
        Self(self.0.saturating_add(1))
    }
}

/// Identifier of a test question within its level's bank.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(u32);

impl QuestionId {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChapterId({})", self.0)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for parsing an id from a string (e.g. a JSON object key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ChapterId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(ChapterId::new)
            .map_err(|_| ParseIdError { kind: "ChapterId" })
    }
}

impl FromStr for QuestionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(QuestionId::new)
            .map_err(|_| ParseIdError { kind: "QuestionId" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_chapter_has_no_predecessor() {
        assert_eq!(ChapterId::FIRST.predecessor(), None);
        assert_eq!(ChapterId::new(0).predecessor(), None);
        assert_eq!(ChapterId::new(4).predecessor(), Some(ChapterId::new(3)));
    }

    #[test]
    fn chapter_id_from_str() {
        let id: ChapterId = "12".parse().unwrap();
        assert_eq!(id, ChapterId::new(12));
        assert!("twelve".parse::<ChapterId>().is_err());
    }

    #[test]
    fn chapter_id_serializes_as_number() {
        let json = serde_json::to_string(&ChapterId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
