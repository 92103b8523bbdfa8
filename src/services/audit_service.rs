use std::collections::{BTreeMap, HashSet};

use crate::models::audit::{AuditAction, AuditConfig, Finding, Severity, DEFAULT_REVIEW_TAG};
use crate::models::folder::Tree;
use crate::scope_path;
use crate::services::hierarchy_service::parent_path;

/// Runs every heuristic over the tree. Findings without matches are omitted.
pub fn run_audit(tree: &Tree, config: &AuditConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(finding) = duplicates(tree) {
        findings.push(finding);
    }
    if let Some(finding) = untagged(tree) {
        findings.push(finding);
    }
    if let Some(finding) = artifacts(tree, &config.artifact_patterns) {
        findings.push(finding);
    }
    if let Some(finding) = deep_nesting(tree, config.deep_nesting_threshold) {
        findings.push(finding);
    }
    if let Some(finding) = orphans(tree) {
        findings.push(finding);
    }

    tracing::debug!(records = tree.len(), findings = findings.len(), "audit complete");
    findings
}

fn finding(
    id: &str,
    title: &str,
    severity: Severity,
    record_ids: Vec<String>,
    suggestion: &str,
    action: AuditAction,
) -> Option<Finding> {
    if record_ids.is_empty() {
        return None;
    }
    Some(Finding {
        id: id.to_string(),
        title: title.to_string(),
        severity,
        record_ids,
        suggestion: suggestion.to_string(),
        action: Some(action),
        tag_value: None,
    })
}

fn duplicates(tree: &Tree) -> Option<Finding> {
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in tree.records() {
        let name = if record.name.is_empty() {
            format!("(untitled-{})", record.id)
        } else {
            record.name.clone()
        };
        by_name.entry(name).or_default().push(record.id.clone());
    }
    let ids = by_name
        .into_values()
        .filter(|group| group.len() > 1)
        .flatten()
        .collect();
    finding(
        "duplicates",
        "Duplicate folder names",
        Severity::Medium,
        ids,
        "Merge or rename duplicate folders",
        AuditAction::Select,
    )
}

fn untagged(tree: &Tree) -> Option<Finding> {
    let ids = tree
        .records()
        .filter(|record| record.tags.is_empty())
        .map(|record| record.id.clone())
        .collect();
    finding(
        "untagged",
        "Untagged folders",
        Severity::Low,
        ids,
        "Tag folders for faster discovery",
        AuditAction::Tag,
    )
    .map(|f| Finding {
        tag_value: Some(DEFAULT_REVIEW_TAG.to_string()),
        ..f
    })
}

fn artifacts(tree: &Tree, patterns: &[String]) -> Option<Finding> {
    let patterns: Vec<String> = patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    let ids = tree
        .records()
        .filter(|record| {
            let name = record.name.to_lowercase();
            patterns.iter().any(|pattern| *pattern == name)
        })
        .map(|record| record.id.clone())
        .collect();
    finding(
        "artifacts",
        "Build/temporary artifacts",
        Severity::High,
        ids,
        "Prune artifacts to reduce clutter",
        AuditAction::Delete,
    )
}

fn deep_nesting(tree: &Tree, threshold: usize) -> Option<Finding> {
    let ids = tree
        .records()
        .filter(|record| {
            let depth = record.path.as_deref().map_or(0, |p| scope_path::segments(p).len());
            depth > threshold
        })
        .map(|record| record.id.clone())
        .collect();
    finding(
        "deep",
        "Deeply nested folders",
        Severity::Medium,
        ids,
        "Consider flattening deep paths",
        AuditAction::Select,
    )
}

fn orphans(tree: &Tree) -> Option<Finding> {
    let known: HashSet<String> = tree
        .records()
        .filter_map(|record| record.path.as_deref())
        .map(|path| scope_path::segments(path).join("/"))
        .collect();

    let ids = tree
        .records()
        .filter(|record| {
            record
                .path
                .as_deref()
                .and_then(parent_path)
                .is_some_and(|parent| !known.contains(&parent))
        })
        .map(|record| record.id.clone())
        .collect();
    finding(
        "orphans",
        "Orphan folders",
        Severity::Low,
        ids,
        "Parent folder missing; consider relocating",
        AuditAction::Select,
    )
}
