use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::AppError;
use crate::models::folder::FolderRecord;
use crate::scope_path;
use crate::shell::safety::{validate_not_protected, validate_path};

pub const ERROR_TAG: &str = "error";

#[derive(Debug, Default)]
pub struct FolderListing {
    pub records: Vec<FolderRecord>,
    pub errors: usize,
}

fn error_record(path: &str, message: &str) -> FolderRecord {
    FolderRecord::new(format!("error:{path}"), format!("[Error: {message}]"))
        .with_path(path)
        .with_tags([ERROR_TAG])
}

/// Recursively lists the directories under `root`, sorted by name. Entries
/// that cannot be read become error marker records and the walk continues.
pub fn list_folders(root: &str) -> Result<FolderListing, AppError> {
    validate_path(root)?;
    let root_path = Path::new(root);
    if !root_path.is_dir() {
        return Err(AppError::NotFound(format!("directory {root}")));
    }
    let root_norm = scope_path::normalize(&root_path.to_string_lossy());

    let mut listing = FolderListing::default();
    let walker = WalkDir::new(root_path)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| scope_path::normalize(&p.to_string_lossy()))
                    .unwrap_or_else(|| root_norm.clone());
                tracing::warn!(%path, %err, "failed to read directory entry");
                let message = err
                    .io_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| err.to_string());
                let relative = scope_path::relative_to(&root_norm, &path).unwrap_or(path);
                listing.records.push(error_record(&relative, &message));
                listing.errors += 1;
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let absolute = scope_path::normalize(&entry.path().to_string_lossy());
        let relative = scope_path::relative_to(&root_norm, &absolute)
            .unwrap_or_else(|| absolute.clone());
        let modified_at = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from);

        let mut record = FolderRecord::new(
            absolute,
            entry.file_name().to_string_lossy().into_owned(),
        )
        .with_path(relative);
        record.modified_at = modified_at;
        listing.records.push(record);
    }

    tracing::info!(
        root = %root_norm,
        folders = listing.records.len() - listing.errors,
        errors = listing.errors,
        "folder listing complete"
    );
    Ok(listing)
}

pub fn create_dir(path: &Path) -> Result<(), AppError> {
    validate_not_protected(&path.to_string_lossy())?;
    fs::create_dir_all(path)?;
    Ok(())
}

/// Writes `content`, creating parent directories as needed.
pub fn write_file(path: &Path, content: &str) -> Result<(), AppError> {
    validate_not_protected(&path.to_string_lossy())?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

pub fn rename(source: &Path, destination: &Path) -> Result<(), AppError> {
    validate_not_protected(&source.to_string_lossy())?;

    if !source.exists() {
        return Err(AppError::General(format!(
            "source does not exist: {}",
            source.display()
        )));
    }
    if destination.exists() {
        return Err(AppError::General(format!(
            "destination already exists: {}",
            destination.display()
        )));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::rename(source, destination)?;
    Ok(())
}

pub struct DeleteResult {
    pub trash_path: PathBuf,
    pub original_path: PathBuf,
}

/// Moves `src` into its own folder under `trash` next to a metadata.json
/// describing where it came from.
pub fn soft_delete(src: &Path, trash: &Path) -> Result<DeleteResult, AppError> {
    validate_not_protected(&src.to_string_lossy())?;
    if !src.exists() {
        return Err(AppError::General(format!(
            "path does not exist: {}",
            src.display()
        )));
    }

    let item_trash_dir = trash.join(uuid::Uuid::new_v4().to_string());
    fs::create_dir_all(&item_trash_dir)?;

    let file_name = src
        .file_name()
        .ok_or_else(|| AppError::General(format!("invalid path: {}", src.display())))?;
    let dest = item_trash_dir.join(file_name);

    fs::rename(src, &dest)?;

    let metadata = serde_json::json!({
        "original_path": src.to_string_lossy(),
        "deleted_at": Utc::now().to_rfc3339(),
        "file_name": file_name.to_string_lossy(),
    });
    fs::write(
        item_trash_dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    Ok(DeleteResult {
        trash_path: dest,
        original_path: src.to_path_buf(),
    })
}
