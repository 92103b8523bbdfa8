use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::generate::{GenerateAction, GeneratedFile};
use crate::scope_path;
use crate::services::classify_service::ClassifyClient;
use crate::services::file_service;
use crate::shell::safety::{validate_not_protected, validate_path, validate_relative};

pub const MAX_CREATE_OPERATIONS: usize = 100;

pub fn build_generate_prompt(request: &str) -> String {
    format!(
        "You generate folder structures and files for a developer tool.\n\
         Respond with exactly one JSON object and nothing else. It must have an \"action\" field set to one of:\n\
         - create_structure: {{\"action\": \"create_structure\", \"folders\": [\"relative/dir\", ...], \"files\": [{{\"path\": \"relative/file\", \"content\": \"...\"}}]}}\n\
         - modify_file: {{\"action\": \"modify_file\", \"path\": \"relative/file\", \"content\": \"...\"}}\n\
         - delete_path: {{\"action\": \"delete_path\", \"path\": \"relative/path\"}}\n\
         - move_path: {{\"action\": \"move_path\", \"from\": \"relative/old\", \"to\": \"relative/new\"}}\n\
         All paths are relative to the project root. Never use absolute paths or \"..\".\n\
         At most {MAX_CREATE_OPERATIONS} folders and files in total.\n\n\
         Request: {request}"
    )
}

/// Pulls a JSON object out of a model reply: a ```json block, any fenced
/// block, or the outermost braces.
pub fn extract_json_payload(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        if let Some(newline) = rest.find('\n') {
            let body = &rest[newline + 1..];
            if let Some(end) = body.find("```") {
                return Some(body[..end].trim().to_string());
            }
        }
    }

    let first = trimmed.find('{')?;
    let last = trimmed.rfind('}')?;
    if first <= last {
        return Some(trimmed[first..=last].to_string());
    }

    None
}

pub fn parse_action(reply: &str) -> Result<GenerateAction, AppError> {
    let payload = extract_json_payload(reply).ok_or_else(|| {
        AppError::Generation("model reply did not contain a JSON object".to_string())
    })?;
    serde_json::from_str(&payload)
        .map_err(|e| AppError::Generation(format!("invalid action JSON: {e}")))
}

/// Validates and creates the base directory, returning its normalised form.
pub fn prepare_base(base: &Path) -> Result<String, AppError> {
    let base_str = base.to_string_lossy();
    validate_path(&base_str)?;
    validate_not_protected(&base_str)?;
    fs::create_dir_all(base)?;
    Ok(scope_path::normalize(&base_str))
}

/// Fails if any existing component below `base` is a symlink; the string
/// check alone cannot see where a link points.
fn reject_symlinks(base: &str, relative: &str) -> Result<(), AppError> {
    let mut current = PathBuf::from(base);
    for segment in scope_path::segments(relative) {
        current.push(segment);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(AppError::Generation(format!(
                    "path goes through a symlink: {relative}"
                )));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

/// Resolves a model-supplied relative path under `base`.
pub fn resolve(base: &str, relative: &str) -> Result<PathBuf, AppError> {
    validate_relative(relative)?;
    let joined = scope_path::join(base, relative);
    if joined == scope_path::normalize(base) || !scope_path::is_within_scope(&joined, base) {
        return Err(AppError::Generation(format!(
            "path escapes the base directory: {relative}"
        )));
    }
    reject_symlinks(base, relative)?;
    Ok(PathBuf::from(joined))
}

fn create_structure(
    base: &str,
    folders: &[String],
    files: &[GeneratedFile],
) -> Result<String, AppError> {
    let total = folders.len() + files.len();
    let folder_budget = folders.len().min(MAX_CREATE_OPERATIONS);
    let file_budget = files.len().min(MAX_CREATE_OPERATIONS - folder_budget);

    let dirs = folders[..folder_budget]
        .iter()
        .map(|folder| resolve(base, folder))
        .collect::<Result<Vec<_>, _>>()?;
    let writes = files[..file_budget]
        .iter()
        .map(|file| Ok((resolve(base, &file.path)?, file.content.as_str())))
        .collect::<Result<Vec<_>, AppError>>()?;

    for dir in &dirs {
        file_service::create_dir(dir)?;
    }
    for (path, content) in &writes {
        file_service::write_file(path, content)?;
    }

    let skipped = total - dirs.len() - writes.len();
    let mut message = format!(
        "Created {} folders and {} files in {base}",
        dirs.len(),
        writes.len()
    );
    if skipped > 0 {
        tracing::warn!(skipped, limit = MAX_CREATE_OPERATIONS, "create_structure truncated");
        message.push_str(&format!(" ({skipped} skipped, limit {MAX_CREATE_OPERATIONS})"));
    }
    Ok(message)
}

/// Executes exactly one action below `base`. Every path is validated before
/// anything touches the disk.
pub fn execute_action(
    base: &Path,
    trash: &Path,
    action: &GenerateAction,
) -> Result<String, AppError> {
    let base = prepare_base(base)?;
    tracing::info!(action = action.name(), %base, "executing generated action");

    match action {
        GenerateAction::CreateStructure { folders, files } => {
            create_structure(&base, folders, files)
        }
        GenerateAction::ModifyFile { path, content } => {
            let target = resolve(&base, path)?;
            file_service::write_file(&target, content)?;
            Ok(format!("Updated {path}"))
        }
        GenerateAction::DeletePath { path } => {
            let target = resolve(&base, path)?;
            let result = file_service::soft_delete(&target, trash)?;
            Ok(format!(
                "Moved {path} to trash at {}",
                result.trash_path.display()
            ))
        }
        GenerateAction::MovePath { from, to } => {
            let source = resolve(&base, from)?;
            let destination = resolve(&base, to)?;
            file_service::rename(&source, &destination)?;
            Ok(format!("Moved {from} to {to}"))
        }
    }
}

/// Asks the local model for an action and runs it.
pub async fn generate_files(
    client: &ClassifyClient,
    prompt: &str,
    base: &Path,
    trash: &Path,
) -> Result<String, AppError> {
    if prompt.trim().is_empty() {
        return Err(AppError::Generation("prompt is empty".to_string()));
    }
    let reply = client.complete(&build_generate_prompt(prompt)).await?;
    let action = parse_action(&reply)?;
    execute_action(base, trash, &action)
}
