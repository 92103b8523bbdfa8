use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::folder::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Classify,
    Tag,
    Delete,
    Batch,
    Load,
    Favorite,
    Rename,
    Move,
    Template,
    Import,
    Other,
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classify => write!(f, "classify"),
            Self::Tag => write!(f, "tag"),
            Self::Delete => write!(f, "delete"),
            Self::Batch => write!(f, "batch"),
            Self::Load => write!(f, "load"),
            Self::Favorite => write!(f, "favorite"),
            Self::Rename => write!(f, "rename"),
            Self::Move => write!(f, "move"),
            Self::Template => write!(f, "template"),
            Self::Import => write!(f, "import"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classify" => Ok(Self::Classify),
            "tag" => Ok(Self::Tag),
            "delete" => Ok(Self::Delete),
            "batch" => Ok(Self::Batch),
            "load" => Ok(Self::Load),
            "favorite" => Ok(Self::Favorite),
            "rename" => Ok(Self::Rename),
            "move" => Ok(Self::Move),
            "template" => Ok(Self::Template),
            "import" => Ok(Self::Import),
            "other" => Ok(Self::Other),
            _ => Err(format!("unknown history kind: {s}")),
        }
    }
}

/// One undoable step. `before` is the tree as it was when the entry was
/// recorded; `after` is sealed once the view-model moves off this position.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryKind,
    pub description: String,
    pub target_id: Option<String>,
    pub before: Tree,
    pub after: Option<Tree>,
}

impl HistoryEntry {
    pub fn new(
        kind: HistoryKind,
        description: &str,
        target_id: Option<&str>,
        before: Tree,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            description: description.to_string(),
            target_id: target_id.map(str::to_string),
            before,
            after: None,
        }
    }

    pub fn summary(&self, index: usize, current: bool) -> HistorySummary {
        HistorySummary {
            index,
            entry_id: self.entry_id.clone(),
            timestamp: self.timestamp,
            kind: self.kind,
            description: self.description.clone(),
            target_id: self.target_id.clone(),
            current,
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub index: usize,
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryKind,
    pub description: String,
    pub target_id: Option<String>,
    pub current: bool,
}
