use async_graphql::{Enum, InputObject, SimpleObject};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEEP_NESTING_THRESHOLD: usize = 6;
pub const DEFAULT_REVIEW_TAG: &str = "needs-review";

pub const DEFAULT_ARTIFACT_PATTERNS: &[&str] = &[
    "node_modules",
    ".next",
    "dist",
    "build",
    "coverage",
    "tmp",
    "temp",
    ".turbo",
    "out",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Select,
    Tag,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub record_ids: Vec<String>,
    pub suggestion: String,
    pub action: Option<AuditAction>,
    pub tag_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject, InputObject)]
#[serde(rename_all = "camelCase")]
#[graphql(input_name = "AuditConfigInput")]
pub struct AuditConfig {
    pub deep_nesting_threshold: usize,
    pub artifact_patterns: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            deep_nesting_threshold: DEFAULT_DEEP_NESTING_THRESHOLD,
            artifact_patterns: DEFAULT_ARTIFACT_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Result of applying a finding: which records were selected or changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct FindingOutcome {
    pub action: Option<AuditAction>,
    pub record_ids: Vec<String>,
    pub changed: usize,
}
