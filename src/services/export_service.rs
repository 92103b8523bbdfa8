use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::audit::{AuditAction, Finding};
use crate::models::export::ExportFormat;
use crate::models::folder::{FolderNode, FolderRecord, Tree};
use crate::models::template::{Template, TemplatePreview};
use crate::services::hierarchy_service;
use crate::shell::safety;

pub fn export(tree: &Tree, format: ExportFormat) -> Result<String, AppError> {
    match format {
        ExportFormat::Json => to_json(tree),
        ExportFormat::Csv => to_csv(tree),
        ExportFormat::Markdown => Ok(to_markdown(tree)),
    }
}

pub fn to_json(tree: &Tree) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

pub fn to_csv(tree: &Tree) -> Result<String, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(["Folder Name", "Path", "Tags", "Modified Date"])?;
    for record in tree.records() {
        let modified = record
            .modified_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        writer.write_record([
            record.name.as_str(),
            record.path.as_deref().unwrap_or(""),
            record.tags.join(";").as_str(),
            modified.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::General(format!("CSV flush failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::General(e.to_string()))
}

/// Bulleted listing nested by the derived hierarchy.
pub fn to_markdown(tree: &Tree) -> String {
    let mut out = String::from("# Folder Structure Export\n\n");
    let _ = writeln!(
        out,
        "Generated: {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    let _ = writeln!(out, "Total Folders: {}\n", tree.len());
    out.push_str("## Folders\n\n");

    for row in hierarchy_service::derive_hierarchy(tree).rows() {
        let Some(record) = tree.get(&row.id) else {
            continue;
        };
        let indent = "  ".repeat(row.depth * 2);
        let tags = if record.tags.is_empty() {
            String::new()
        } else {
            format!(" | **Tags:** {}", record.tags.join(", "))
        };
        let _ = writeln!(out, "{indent}- **{}**", record.name);
        let _ = writeln!(out, "{indent}  - Path: `{}`{tags}", record.tree_path());
    }
    out
}

/// POSIX shell plan for delete/tag findings and missing template folders.
pub fn to_script(
    tree: &Tree,
    findings: &[Finding],
    template: Option<(&Template, &TemplatePreview)>,
) -> String {
    let mut script = String::from("#!/bin/sh\n# FolderTree PRO - Apply Plan Script\n");
    let _ = writeln!(
        script,
        "# Generated: {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    if !findings.is_empty() {
        script.push_str("# === Audit Actions ===\n\n");
        for finding in findings {
            let _ = writeln!(script, "# {} ({})", safety::comment_text(&finding.title), finding.severity);
            let _ = writeln!(script, "# Suggestion: {}", safety::comment_text(&finding.suggestion));
            let _ = writeln!(script, "# Affected folders: {}\n", finding.record_ids.len());

            for id in &finding.record_ids {
                let Some(record) = tree.get(id) else {
                    continue;
                };
                let path = record.tree_path();
                match finding.action {
                    Some(AuditAction::Delete) => {
                        let _ = writeln!(script, "rm -rf -- {}", safety::quote(path));
                    }
                    Some(AuditAction::Tag) => {
                        let _ = writeln!(
                            script,
                            "# Tag folder: {} with \"{}\"",
                            safety::comment_text(path),
                            safety::comment_text(finding.tag_value.as_deref().unwrap_or(""))
                        );
                    }
                    _ => {}
                }
            }
            script.push('\n');
        }
    }

    if let Some((template, preview)) = template.filter(|(_, p)| !p.missing.is_empty()) {
        script.push_str("# === Template Missing Folders ===\n\n");
        let _ = writeln!(script, "# Template: {}\n", safety::comment_text(&template.name));
        for path in &preview.missing {
            let _ = writeln!(script, "mkdir -p -- {}", safety::quote(path));
        }
    }

    script.push_str("\n# End of script\n");
    script
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportedRecord {
    Node(FolderNode),
    Flat(FolderRecord),
}

impl From<ImportedRecord> for FolderRecord {
    fn from(imported: ImportedRecord) -> Self {
        match imported {
            ImportedRecord::Node(node) => node.into(),
            ImportedRecord::Flat(record) => record,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportedTree {
    Items { items: BTreeMap<String, ImportedRecord> },
    List(Vec<ImportedRecord>),
}

/// Parses an exported tree. Accepts `{"items": {...}}` or a bare array, with
/// records either flat or in the `{id, data: {...}}` listing shape.
pub fn import_json(json: &str) -> Result<Tree, AppError> {
    let parsed: ImportedTree = serde_json::from_str(json)
        .map_err(|e| AppError::General(format!("Error importing tree: {e}")))?;
    let records: Vec<FolderRecord> = match parsed {
        ImportedTree::Items { items } => items.into_values().map(Into::into).collect(),
        ImportedTree::List(list) => list.into_iter().map(Into::into).collect(),
    };
    Ok(Tree::from_records(records))
}
