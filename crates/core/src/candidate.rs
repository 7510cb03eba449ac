//! Candidate items for context assembly.
//!
//! A candidate is one retrieved piece of context (a memory, a code unit,
//! an experience, a value or a commit) handed to the assembler together
//! with its relevance score. Ranking happens upstream; the assembler only
//! allocates, deduplicates, caps, and truncates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of source a candidate came from.
///
/// Serialized as the singular kind name (`"memory"`); requested by its
/// plural *category* name (`"memories"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Memory,
    Code,
    Experience,
    Value,
    Commit,
}

impl SourceKind {
    /// All kinds in the fixed section order of an assembled document.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Memory,
        SourceKind::Code,
        SourceKind::Experience,
        SourceKind::Value,
        SourceKind::Commit,
    ];

    /// The category name callers use to request this kind.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Memory => "memories",
            Self::Code => "code",
            Self::Experience => "experiences",
            Self::Value => "values",
            Self::Commit => "commits",
        }
    }

    /// Section title in the assembled document.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Memory => "Memories",
            Self::Code => "Code",
            Self::Experience => "Experiences",
            Self::Value => "Values",
            Self::Commit => "Commits",
        }
    }

    /// Parse a category name (`"memories"`, `"code"`, ...).
    pub fn from_category(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.category() == name)
    }

    /// All valid category names, in section order.
    pub fn category_names() -> Vec<String> {
        Self::ALL.iter().map(|k| k.category().to_string()).collect()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Where the full version of a candidate can be found.
///
/// Used in truncation markers and as an identity key for deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Locator {
    Code { file_path: String, start_line: u32 },
    Experience { id: String },
    Memory { id: String },
    Value { id: String },
    Commit { sha: String },
    #[default]
    None,
}

impl Locator {
    /// Identity key: two candidates with the same key are the same item.
    pub fn identity_key(&self) -> Option<String> {
        match self {
            Self::Code { file_path, .. } if !file_path.is_empty() => {
                Some(format!("file:{file_path}"))
            }
            Self::Experience { id } if !id.is_empty() => Some(format!("experience:{id}")),
            Self::Memory { id } if !id.is_empty() => Some(format!("memory:{id}")),
            Self::Value { id } if !id.is_empty() => Some(format!("value:{id}")),
            Self::Commit { sha } if !sha.is_empty() => Some(format!("commit:{sha}")),
            _ => None,
        }
    }
}

/// One retrieved piece of context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Unique ID of the underlying record
    pub id: String,

    /// Which source produced it
    pub kind: SourceKind,

    /// Formatted content to inject
    pub content: String,

    /// Relevance score from the upstream search (higher is better)
    #[serde(default)]
    pub relevance: f32,

    /// Kind-specific location of the full item
    #[serde(default)]
    pub locator: Locator,
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, kind: SourceKind, content: impl Into<String>, relevance: f32) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            relevance,
            locator: Locator::None,
        }
    }

    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }
}

/// Budget weights per source category.
///
/// Richer sources get a larger share of the token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceWeights {
    /// Typically short, concise
    #[serde(default = "default_memories")]
    pub memories: u32,

    /// Code blocks are verbose
    #[serde(default = "default_code")]
    pub code: u32,

    /// Rich, multi-field experience entries
    #[serde(default = "default_experiences")]
    pub experiences: u32,

    /// Single-statement principles
    #[serde(default = "default_values")]
    pub values: u32,

    /// Multi-line messages plus file lists
    #[serde(default = "default_commits")]
    pub commits: u32,
}

fn default_memories() -> u32 {
    1
}
fn default_code() -> u32 {
    2
}
fn default_experiences() -> u32 {
    3
}
fn default_values() -> u32 {
    1
}
fn default_commits() -> u32 {
    2
}

impl SourceWeights {
    pub fn weight(&self, kind: SourceKind) -> u32 {
        match kind {
            SourceKind::Memory => self.memories,
            SourceKind::Code => self.code,
            SourceKind::Experience => self.experiences,
            SourceKind::Value => self.values,
            SourceKind::Commit => self.commits,
        }
    }
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            memories: default_memories(),
            code: default_code(),
            experiences: default_experiences(),
            values: default_values(),
            commits: default_commits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_round_trip() {
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::from_category(kind.category()), Some(kind));
        }
        assert_eq!(SourceKind::from_category("memory"), None);
        assert_eq!(SourceKind::from_category("notes"), None);
    }

    #[test]
    fn kind_serializes_singular() {
        let json = serde_json::to_string(&SourceKind::Experience).unwrap();
        assert_eq!(json, "\"experience\"");
    }

    #[test]
    fn default_weights() {
        let w = SourceWeights::default();
        assert_eq!(w.weight(SourceKind::Memory), 1);
        assert_eq!(w.weight(SourceKind::Code), 2);
        assert_eq!(w.weight(SourceKind::Experience), 3);
        assert_eq!(w.weight(SourceKind::Value), 1);
        assert_eq!(w.weight(SourceKind::Commit), 2);
    }

    #[test]
    fn identity_keys() {
        let code = Locator::Code {
            file_path: "src/lib.rs".into(),
            start_line: 10,
        };
        assert_eq!(code.identity_key().as_deref(), Some("file:src/lib.rs"));
        assert_eq!(Locator::None.identity_key(), None);
        assert_eq!(Locator::Experience { id: String::new() }.identity_key(), None);
    }

    #[test]
    fn candidate_deserializes_with_defaults() {
        let json = r#"{"id":"m1","kind":"memory","content":"prefers tabs"}"#;
        let item: CandidateItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, SourceKind::Memory);
        assert_eq!(item.relevance, 0.0);
        assert_eq!(item.locator, Locator::None);
    }

    #[test]
    fn locator_tagged_serialization() {
        let item = CandidateItem::new("c1", SourceKind::Code, "fn main() {}", 0.9).with_locator(
            Locator::Code {
                file_path: "src/main.rs".into(),
                start_line: 1,
            },
        );
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"code\""));
        assert!(json.contains("src/main.rs"));
    }
}
