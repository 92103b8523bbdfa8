use crate::error::AppError;
use std::path::{Component, Path};

const FORBIDDEN_PATTERNS: &[&str] = &[";", "&&", "||", "|", "`", "$(", "${", "\n", "\r"];

/// System trees a generation base may never point into.
const PROTECTED_ROOTS: &[&str] = &[
    "/bin",
    "/boot",
    "/dev",
    "/etc",
    "/proc",
    "/sbin",
    "/sys",
    "/usr",
    "/var/lib",
    "C:\\Windows",
    "C:\\Program Files",
];

pub fn validate_path(path: &str) -> Result<(), AppError> {
    if path.is_empty() {
        return Err(AppError::General("path is empty".to_string()));
    }

    for pattern in FORBIDDEN_PATTERNS {
        if path.contains(pattern) {
            return Err(AppError::General(format!(
                "path contains forbidden pattern: {pattern}"
            )));
        }
    }

    let p = Path::new(path);
    for component in p.components() {
        if matches!(component, Component::ParentDir) {
            return Err(AppError::General(
                "path traversal (.. component) not allowed".to_string(),
            ));
        }
    }

    Ok(())
}

/// Paths produced by the model must be relative and stay below the base directory.
pub fn validate_relative(path: &str) -> Result<(), AppError> {
    validate_path(path)?;
    let normalized = path.replace('\\', "/");
    if normalized.starts_with('/') || is_windows_style_path(&normalized) {
        return Err(AppError::General(format!(
            "absolute paths are not allowed: {path}"
        )));
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(AppError::General(
            "path traversal (.. component) not allowed".to_string(),
        ));
    }
    Ok(())
}

pub fn is_protected_path(path: &str) -> bool {
    let normalized = normalize_path_for_match(path);
    PROTECTED_ROOTS.iter().any(|root| {
        let root_normalized = normalize_path_for_match(root);
        if is_windows_style_path(&root_normalized) {
            let normalized_lower = normalized.to_ascii_lowercase();
            let root_lower = root_normalized.to_ascii_lowercase();
            normalized_lower == root_lower
                || normalized_lower.starts_with(&format!("{root_lower}/"))
        } else {
            normalized == root_normalized || normalized.starts_with(&format!("{root_normalized}/"))
        }
    })
}

fn normalize_path_for_match(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

fn is_windows_style_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

pub fn validate_not_protected(path: &str) -> Result<(), AppError> {
    if is_protected_path(path) {
        return Err(AppError::General(format!(
            "operation on protected path not allowed: {path}"
        )));
    }
    Ok(())
}

/// Single-quotes an argument for a POSIX shell script.
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Makes free text safe to place after `#` on a single script line.
pub fn comment_text(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}
