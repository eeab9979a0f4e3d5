//! Relation kinds between two tasks.
//!
//! The vocabulary is closed: anything outside [`RelationKind::ALL`] is rejected
//! before a remote call is made.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Subtask,
    Parenttask,
    Related,
    Duplicateof,
    Duplicates,
    Blocking,
    Blocked,
    Precedes,
    Follows,
    Copiedfrom,
    Copiedto,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown relation kind '{0}'")]
pub struct UnknownRelationKind(pub String);

impl RelationKind {
    pub const ALL: [RelationKind; 12] = [
        RelationKind::Subtask,
        RelationKind::Parenttask,
        RelationKind::Related,
        RelationKind::Duplicateof,
        RelationKind::Duplicates,
        RelationKind::Blocking,
        RelationKind::Blocked,
        RelationKind::Precedes,
        RelationKind::Follows,
        RelationKind::Copiedfrom,
        RelationKind::Copiedto,
        RelationKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Subtask => "subtask",
            RelationKind::Parenttask => "parenttask",
            RelationKind::Related => "related",
            RelationKind::Duplicateof => "duplicateof",
            RelationKind::Duplicates => "duplicates",
            RelationKind::Blocking => "blocking",
            RelationKind::Blocked => "blocked",
            RelationKind::Precedes => "precedes",
            RelationKind::Follows => "follows",
            RelationKind::Copiedfrom => "copiedfrom",
            RelationKind::Copiedto => "copiedto",
            RelationKind::Unknown => "unknown",
        }
    }

    /// The kind the remote service records on the target task.
    ///
    /// `a subtask b` is mirrored as `b parenttask a`.
    pub fn inverse(&self) -> RelationKind {
        match self {
            RelationKind::Subtask => RelationKind::Parenttask,
            RelationKind::Parenttask => RelationKind::Subtask,
            RelationKind::Related => RelationKind::Related,
            RelationKind::Duplicateof => RelationKind::Duplicates,
            RelationKind::Duplicates => RelationKind::Duplicateof,
            RelationKind::Blocking => RelationKind::Blocked,
            RelationKind::Blocked => RelationKind::Blocking,
            RelationKind::Precedes => RelationKind::Follows,
            RelationKind::Follows => RelationKind::Precedes,
            RelationKind::Copiedfrom => RelationKind::Copiedto,
            RelationKind::Copiedto => RelationKind::Copiedfrom,
            RelationKind::Unknown => RelationKind::Unknown,
        }
    }

    /// Comma-separated vocabulary, for error messages.
    pub fn vocabulary() -> String {
        Self::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = UnknownRelationKind;

    /// Accepts the canonical names plus separator variants
    /// (`duplicate-of`, `copied_from`, `Parent Task`) and the `parent` alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        if normalized == "parent" {
            return Ok(RelationKind::Parenttask);
        }

        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| UnknownRelationKind(s.to_string()))
    }
}
