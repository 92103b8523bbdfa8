use std::path::PathBuf;

use async_graphql::{Context, Object, SimpleObject};

use crate::commands::{app_state, record_activity};
use crate::error::AppError;
use crate::models::folder::{FolderNode, FolderRecord};
use crate::services::classify_service;
use crate::services::file_service::{self, FolderListing};
use crate::services::generate_service;
use crate::state::AppState;

#[derive(Debug, Clone, SimpleObject)]
pub struct LoadResult {
    pub loaded: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct ClassifyReport {
    pub processed: usize,
}

async fn list_blocking(dir: String) -> Result<FolderListing, AppError> {
    tokio::task::spawn_blocking(move || file_service::list_folders(&dir))
        .await
        .map_err(|e| AppError::General(format!("listing task failed: {e}")))?
}

#[derive(Default)]
pub struct FolderQuery;

#[Object]
impl FolderQuery {
    async fn hello(&self) -> &'static str {
        "Hello from FolderTree PRO"
    }

    /// Tags from the local model. Failures are logged and yield an empty list.
    async fn classify(&self, ctx: &Context<'_>, content: String) -> async_graphql::Result<Vec<String>> {
        let state = app_state(ctx)?;
        Ok(match state.classifier.classify(&content).await {
            Ok(tags) => tags,
            Err(err) => {
                tracing::warn!(%err, "local classification failed");
                Vec::new()
            }
        })
    }

    #[graphql(name = "classifyOpenAI")]
    async fn classify_openai(&self, ctx: &Context<'_>, content: String) -> async_graphql::Result<Vec<String>> {
        let state = app_state(ctx)?;
        Ok(match state.classifier.classify_remote(&content).await {
            Ok(tags) => tags,
            Err(err) => {
                tracing::warn!(%err, "remote classification failed");
                Vec::new()
            }
        })
    }

    async fn get_folder_tree(&self, dir: String) -> async_graphql::Result<Vec<FolderNode>> {
        let listing = list_blocking(dir).await.map_err(AppError::capture)?;
        Ok(listing.records.iter().map(FolderNode::from).collect())
    }
}

fn record_name(state: &AppState, id: &str) -> Result<String, AppError> {
    state
        .view_model()
        .tree()
        .get(id)
        .map(|record| record.name.clone())
        .ok_or_else(|| AppError::NotFound(format!("folder {id}")))
}

async fn classify_batch(state: &AppState, items: Vec<(String, String)>) -> Result<usize, AppError> {
    let _busy = state.try_begin_classify()?;
    let classifier = &state.classifier;
    let processed = classify_service::classify_sequentially(
        items,
        state.config.classify_delay,
        |content| async move { classifier.classify_or_fallback(&content).await },
        |id, tags| {
            let mut view_model = state.view_model();
            if let Err(err) = view_model.set_tags(id, tags) {
                tracing::warn!(%err, id, "dropping classification for vanished record");
            }
        },
    )
    .await;
    tracing::info!(processed, "batch classification finished");
    Ok(processed)
}

#[derive(Default)]
pub struct FolderMutation;

#[Object]
impl FolderMutation {
    /// Asks the model for one filesystem action and runs it below the base
    /// path. Always answers with a status message.
    async fn generate_files(
        &self,
        ctx: &Context<'_>,
        prompt: String,
        base_path: Option<String>,
    ) -> async_graphql::Result<String> {
        let state = app_state(ctx)?;
        let base = base_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| state.config.generate_base.clone());
        let trash = state.config.trash_dir();

        let message = match generate_service::generate_files(&state.classifier, &prompt, &base, &trash).await {
            Ok(message) => {
                record_activity(state, "generate", None, Some(&message));
                message
            }
            Err(err) => {
                tracing::warn!(%err, "file generation failed");
                format!("Error: {err}")
            }
        };
        Ok(message)
    }

    /// Replaces the tree with a fresh listing of `dir` and clears history.
    /// A failed listing leaves the tree empty.
    async fn load_tree(&self, ctx: &Context<'_>, dir: String) -> async_graphql::Result<LoadResult> {
        let state = app_state(ctx)?;
        let listing = list_blocking(dir.clone()).await;
        let errors = listing.as_ref().map_or(0, |listing| listing.errors);
        let loaded = state
            .view_model()
            .load_from(|| listing.map(|listing| listing.records))
            .map_err(AppError::capture)?;
        record_activity(state, "load", None, Some(&format!("Loaded {loaded} folders from {dir}")));
        Ok(LoadResult { loaded, errors })
    }

    /// Classifies one record and stores the tags, falling back to keyword tags.
    async fn classify_record(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<Vec<String>> {
        let state = app_state(ctx)?;
        let name = record_name(state, &id)?;
        let tags = state.classifier.classify_or_fallback(&name).await;
        state.view_model().set_tags(&id, tags.clone())?;
        record_activity(state, "classify", Some(&id), Some(&tags.join(", ")));
        Ok(tags)
    }

    /// Classifies every untagged record, one request at a time.
    async fn classify_all(&self, ctx: &Context<'_>) -> async_graphql::Result<ClassifyReport> {
        let state = app_state(ctx)?;
        let items: Vec<(String, String)> = state
            .view_model()
            .tree()
            .records()
            .filter(|record| record.tags.is_empty() && !record.name.is_empty())
            .map(|record| (record.id.clone(), record.name.clone()))
            .collect();

        let processed = classify_batch(state, items).await?;
        record_activity(state, "classify", None, Some(&format!("Classified {processed} folders")));
        Ok(ClassifyReport { processed })
    }

    async fn classify_selected(&self, ctx: &Context<'_>, ids: Vec<String>) -> async_graphql::Result<ClassifyReport> {
        let state = app_state(ctx)?;
        let items: Vec<(String, String)> = {
            let view_model = state.view_model();
            ids.iter()
                .filter_map(|id| view_model.tree().get(id))
                .filter(|record| !record.name.is_empty())
                .map(|record: &FolderRecord| (record.id.clone(), record.name.clone()))
                .collect()
        };

        let processed = classify_batch(state, items).await?;
        record_activity(state, "classify", None, Some(&format!("Classified {processed} selected folders")));
        Ok(ClassifyReport { processed })
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::*;
    use std::fs;

    #[tokio::test]
    async fn folder_tree_lists_directories() {
        let (schema, _) = schema();
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("docs/a")).unwrap();
        let dir = tmp.path().to_string_lossy().replace('\\', "/");

        let query = format!(r#"{{ getFolderTree(dir: "{dir}") {{ id data {{ name tags }} }} }}"#);
        let data = run(&schema, &query).await;
        let nodes = data["getFolderTree"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["data"]["name"], "docs");
        assert!(nodes[1]["id"].as_str().unwrap().ends_with("docs/a"));
    }

    #[tokio::test]
    async fn load_tree_replaces_view_model() {
        let (schema, state) = schema();
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("src/lib")).unwrap();
        let dir = tmp.path().to_string_lossy().replace('\\', "/");

        let data = run(&schema, &format!(r#"mutation {{ loadTree(dir: "{dir}") {{ loaded errors }} }}"#)).await;
        assert_eq!(data["loadTree"]["loaded"], 2);
        assert_eq!(state.view_model().tree().len(), 2);
        assert_eq!(state.view_model().history_index(), -1);
    }

    #[tokio::test]
    async fn load_tree_of_missing_dir_errors_and_empties() {
        let (schema, state) = schema();
        state
            .view_model()
            .load_records(vec![crate::models::folder::FolderRecord::new("x", "x")]);
        let message = run_err(&schema, r#"mutation { loadTree(dir: "/definitely/not/here") { loaded } }"#).await;
        assert!(message.contains("not found"));
        assert!(state.view_model().tree().is_empty());
    }

    #[tokio::test]
    async fn classify_unknown_record_is_an_error() {
        let (schema, _) = schema();
        let message = run_err(&schema, r#"mutation { classifyRecord(id: "nope") }"#).await;
        assert!(message.contains("not found"));
    }

    #[tokio::test]
    async fn classify_all_refuses_while_busy() {
        let (schema, state) = schema();
        let _guard = state.try_begin_classify().unwrap();
        let message = run_err(&schema, "mutation { classifyAll { processed } }").await;
        assert!(message.contains("busy"));
    }

    #[tokio::test]
    async fn classify_all_with_nothing_untagged_is_a_no_op() {
        let (schema, state) = schema();
        state.view_model().load_records(vec![
            crate::models::folder::FolderRecord::new("a", "a").with_tags(["done"]),
        ]);
        let data = run(&schema, "mutation { classifyAll { processed } }").await;
        assert_eq!(data["classifyAll"]["processed"], 0);
    }
}
