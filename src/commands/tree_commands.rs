use async_graphql::{Context, Object, SimpleObject};

use crate::commands::{app_state, record_activity};
use crate::error::AppError;
use crate::models::audit::{AuditConfig, Finding, FindingOutcome};
use crate::models::export::ExportFormat;
use crate::models::filter::{FilterInput, FilterSet, RenamePattern};
use crate::models::folder::{FolderRecord, Hierarchy, TreeRow, TreeStats};
use crate::models::history::HistorySummary;
use crate::models::template::{Template, TemplatePreview};
use crate::services::batch_service::OrganizeBy;
use crate::services::{
    audit_service, export_service, hierarchy_service, search_service, settings_service,
    template_service,
};
use crate::state::AppState;

#[derive(Debug, Clone, SimpleObject)]
pub struct HierarchyView {
    pub root_ids: Vec<String>,
    pub rows: Vec<TreeRow>,
}

impl From<Hierarchy> for HierarchyView {
    fn from(hierarchy: Hierarchy) -> Self {
        Self {
            rows: hierarchy.rows(),
            root_ids: hierarchy.root_ids,
        }
    }
}

fn filters_from(filter: Option<FilterInput>) -> FilterSet {
    filter.map(FilterSet::from).unwrap_or_default()
}

fn find_finding(state: &AppState, finding_id: &str) -> Result<Finding, AppError> {
    let config = state.audit_config();
    let view_model = state.view_model();
    audit_service::run_audit(view_model.tree(), &config)
        .into_iter()
        .find(|finding| finding.id == finding_id)
        .ok_or_else(|| AppError::NotFound(format!("audit finding {finding_id}")))
}

/// Logs an activity line only when the mutation changed something.
fn log_change(state: &AppState, changed: usize, action: &str, node_id: Option<&str>, details: String) {
    if changed > 0 {
        record_activity(state, action, node_id, Some(&details));
    }
}

#[derive(Default)]
pub struct TreeQuery;

#[Object]
impl TreeQuery {
    async fn tree(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<FolderRecord>> {
        Ok(app_state(ctx)?.view_model().tree().to_records())
    }

    /// Parent/child layout, optionally over the filtered subset.
    async fn hierarchy(&self, ctx: &Context<'_>, filter: Option<FilterInput>) -> async_graphql::Result<HierarchyView> {
        let state = app_state(ctx)?;
        let view_model = state.view_model();
        let filtered = search_service::filter(view_model.tree(), &filters_from(filter));
        Ok(hierarchy_service::derive_hierarchy(&filtered).into())
    }

    async fn filter_records(&self, ctx: &Context<'_>, filter: FilterInput) -> async_graphql::Result<Vec<FolderRecord>> {
        let state = app_state(ctx)?;
        let view_model = state.view_model();
        Ok(search_service::filter(view_model.tree(), &filter.into()).to_records())
    }

    async fn stats(&self, ctx: &Context<'_>) -> async_graphql::Result<TreeStats> {
        let state = app_state(ctx)?;
        let favorites = settings_service::get_favorites(&state.db())?;
        Ok(search_service::compute_stats(state.view_model().tree(), &favorites))
    }

    async fn history(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<HistorySummary>> {
        Ok(app_state(ctx)?.view_model().history())
    }

    async fn history_index(&self, ctx: &Context<'_>) -> async_graphql::Result<i64> {
        Ok(app_state(ctx)?.view_model().history_index() as i64)
    }

    async fn can_undo(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        Ok(app_state(ctx)?.view_model().can_undo())
    }

    async fn can_redo(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        Ok(app_state(ctx)?.view_model().can_redo())
    }

    async fn audit(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Finding>> {
        let state = app_state(ctx)?;
        let config = state.audit_config();
        Ok(audit_service::run_audit(state.view_model().tree(), &config))
    }

    async fn audit_config(&self, ctx: &Context<'_>) -> async_graphql::Result<AuditConfig> {
        Ok(app_state(ctx)?.audit_config())
    }

    async fn templates(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Template>> {
        Ok(app_state(ctx)?.templates().all().to_vec())
    }

    async fn preview_template(&self, ctx: &Context<'_>, template_id: String) -> async_graphql::Result<TemplatePreview> {
        let state = app_state(ctx)?;
        let templates = state.templates();
        let template = templates.require(&template_id)?;
        Ok(template_service::preview(template, state.view_model().tree()))
    }

    async fn export_tree(&self, ctx: &Context<'_>, format: ExportFormat) -> async_graphql::Result<String> {
        let state = app_state(ctx)?;
        let content = export_service::export(state.view_model().tree(), format)?;
        record_activity(state, "export", None, Some(&format!("Tree exported to {}", format.extension())));
        Ok(content)
    }

    /// Shell plan from the current audit findings and, if given, the gaps of
    /// one template.
    async fn export_script(&self, ctx: &Context<'_>, template_id: Option<String>) -> async_graphql::Result<String> {
        let state = app_state(ctx)?;
        let config = state.audit_config();
        let templates = state.templates();
        let template = template_id
            .as_deref()
            .map(|id| templates.require(id))
            .transpose()?;

        let view_model = state.view_model();
        let tree = view_model.tree();
        let findings = audit_service::run_audit(tree, &config);
        let preview = template.map(|t| (t, template_service::preview(t, tree)));
        Ok(export_service::to_script(
            tree,
            &findings,
            preview.as_ref().map(|(t, p)| (*t, p)),
        ))
    }

    async fn export_templates(&self, ctx: &Context<'_>) -> async_graphql::Result<String> {
        Ok(app_state(ctx)?.templates().export_json()?)
    }
}

#[derive(Default)]
pub struct TreeMutation;

#[Object]
impl TreeMutation {
    async fn undo(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        let state = app_state(ctx)?;
        let undone = state.view_model().undo();
        log_change(state, undone as usize, "undo", None, "Undo".to_string());
        Ok(undone)
    }

    async fn redo(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        let state = app_state(ctx)?;
        let redone = state.view_model().redo();
        log_change(state, redone as usize, "redo", None, "Redo".to_string());
        Ok(redone)
    }

    async fn add_tag(&self, ctx: &Context<'_>, id: String, tag: String) -> async_graphql::Result<bool> {
        let state = app_state(ctx)?;
        let added = state.view_model().add_tag(&id, &tag)?;
        log_change(state, added as usize, "tag", Some(&id), format!("Added tag \"{tag}\""));
        Ok(added)
    }

    /// Removes the tag at `index`; returns the removed tag, if any.
    async fn remove_tag(&self, ctx: &Context<'_>, id: String, index: usize) -> async_graphql::Result<Option<String>> {
        let state = app_state(ctx)?;
        let removed = state.view_model().remove_tag_at(&id, index)?;
        if let Some(tag) = &removed {
            record_activity(state, "tag", Some(&id), Some(&format!("Removed tag \"{tag}\"")));
        }
        Ok(removed)
    }

    async fn delete_records(&self, ctx: &Context<'_>, ids: Vec<String>) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let removed = state.view_model().delete_records(&ids);
        log_change(state, removed, "delete", None, format!("Deleted {removed} folders"));
        Ok(removed)
    }

    async fn clear_tree(&self, ctx: &Context<'_>, #[graphql(default)] confirm: bool) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let removed = state.view_model().clear(confirm)?;
        log_change(state, removed, "delete", None, format!("Cleared {removed} folders"));
        Ok(removed)
    }

    async fn bulk_tag(&self, ctx: &Context<'_>, ids: Vec<String>, tag: String) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let changed = state.view_model().bulk_tag(&ids, &tag);
        log_change(state, changed, "batch", None, format!("Tagged {changed} folders as \"{tag}\""));
        Ok(changed)
    }

    async fn bulk_untag(&self, ctx: &Context<'_>, ids: Vec<String>, tag: String) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let changed = state.view_model().bulk_untag(&ids, &tag);
        log_change(state, changed, "batch", None, format!("Removed \"{tag}\" from {changed} folders"));
        Ok(changed)
    }

    async fn bulk_rename(&self, ctx: &Context<'_>, pattern: RenamePattern) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let renamed = state.view_model().bulk_rename(&pattern);
        log_change(state, renamed, "other", None, format!("Bulk renamed {renamed} folders"));
        Ok(renamed)
    }

    /// Tags records by extension group (`type-<ext>`) or with `size-unknown`.
    async fn auto_organize(
        &self,
        ctx: &Context<'_>,
        group_by: OrganizeBy,
        #[graphql(default = 5)] threshold: usize,
    ) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let changed = state.view_model().auto_organize(group_by, threshold);
        log_change(state, changed, "batch", None, format!("Auto-organized {changed} folders"));
        Ok(changed)
    }

    /// Moves `drag_id` and its subtree under `target_id`. Returns 0 when the
    /// move would nest a folder inside itself.
    async fn move_record(&self, ctx: &Context<'_>, drag_id: String, target_id: String) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let moved = state.view_model().move_record(&drag_id, &target_id)?;
        log_change(state, moved, "other", Some(&drag_id), format!("Moved under {target_id}"));
        Ok(moved)
    }

    async fn apply_template(&self, ctx: &Context<'_>, template_id: String) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let template = state.templates().require(&template_id)?.clone();
        let created = state.view_model().apply_template(&template);
        log_change(state, created, "template", None, format!("Applied {} ({created} added)", template.name));
        Ok(created)
    }

    async fn apply_finding(
        &self,
        ctx: &Context<'_>,
        finding_id: String,
        #[graphql(default)] confirm: bool,
    ) -> async_graphql::Result<FindingOutcome> {
        let state = app_state(ctx)?;
        let finding = find_finding(state, &finding_id)?;
        let outcome = state.view_model().apply_finding(&finding, confirm)?;
        log_change(state, outcome.changed, "audit", None, format!("Applied finding {}", finding.title));
        Ok(outcome)
    }

    async fn set_audit_config(&self, ctx: &Context<'_>, config: AuditConfig) -> async_graphql::Result<AuditConfig> {
        let state = app_state(ctx)?;
        state.set_audit_config(config.clone());
        Ok(config)
    }

    async fn import_tree(&self, ctx: &Context<'_>, json: String) -> async_graphql::Result<usize> {
        let state = app_state(ctx)?;
        let tree = export_service::import_json(&json)?;
        let count = tree.len();
        state.view_model().import_tree(tree);
        record_activity(state, "import", None, Some(&format!("Imported {count} folders")));
        Ok(count)
    }

    /// Session-only; ids that already exist are skipped.
    async fn import_templates(&self, ctx: &Context<'_>, json: String) -> async_graphql::Result<usize> {
        Ok(app_state(ctx)?.templates_mut().import_json(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::*;
    use crate::models::folder::FolderRecord;

    fn seed(state: &crate::state::AppState) {
        state.view_model().load_records(vec![
            FolderRecord::new("a", "src").with_path("src"),
            FolderRecord::new("b", "lib").with_path("src/lib"),
            FolderRecord::new("c", "docs").with_path("docs"),
        ]);
    }

    #[tokio::test]
    async fn hierarchy_query_matches_paths() {
        let (schema, state) = schema();
        seed(&state);
        let data = run(&schema, "{ hierarchy { rootIds rows { id depth childCount } } }").await;
        assert_eq!(data["hierarchy"]["rootIds"], serde_json::json!(["a", "c"]));
        assert_eq!(data["hierarchy"]["rows"][1]["id"], "b");
        assert_eq!(data["hierarchy"]["rows"][1]["depth"], 1);
    }

    #[tokio::test]
    async fn tag_undo_redo_round_trip() {
        let (schema, state) = schema();
        seed(&state);

        let data = run(&schema, r#"mutation { addTag(id: "a", tag: "code") }"#).await;
        assert_eq!(data["addTag"], true);
        let data = run(&schema, "{ canUndo canRedo }").await;
        assert_eq!(data["canUndo"], true);
        assert_eq!(data["canRedo"], false);

        run(&schema, "mutation { undo }").await;
        assert!(state.view_model().tree().get("a").unwrap().tags.is_empty());
        run(&schema, "mutation { redo }").await;
        assert_eq!(state.view_model().tree().get("a").unwrap().tags, vec!["code"]);

        let data = run(&schema, "{ activity { action nodeId } }").await;
        assert_eq!(data["activity"][0]["action"], "redo");
        assert_eq!(data["activity"][2]["nodeId"], "a");
    }

    #[tokio::test]
    async fn clear_requires_confirmation() {
        let (schema, state) = schema();
        seed(&state);
        let message = run_err(&schema, "mutation { clearTree }").await;
        assert!(message.contains("confirmation required"));
        let data = run(&schema, "mutation { clearTree(confirm: true) }").await;
        assert_eq!(data["clearTree"], 3);
    }

    #[tokio::test]
    async fn filter_and_stats() {
        let (schema, state) = schema();
        seed(&state);
        run(&schema, r#"mutation { bulkTag(ids: ["a", "b"], tag: "code") }"#).await;
        run(&schema, r#"mutation { toggleFavorite(id: "a") }"#).await;

        let data = run(&schema, r#"{ filterRecords(filter: { tags: ["code"], text: "li" }) { id } }"#).await;
        assert_eq!(data["filterRecords"], serde_json::json!([{"id": "b"}]));

        let data = run(&schema, "{ stats { totalFolders taggedFolders totalTags favorited tagPercentage } }").await;
        assert_eq!(
            data["stats"],
            serde_json::json!({"totalFolders": 3, "taggedFolders": 2, "totalTags": 2, "favorited": 1, "tagPercentage": 67})
        );
    }

    #[tokio::test]
    async fn audit_finding_application() {
        let (schema, state) = schema();
        state.view_model().load_records(vec![
            FolderRecord::new("nm", "node_modules").with_tags(["x"]),
            FolderRecord::new("s", "src").with_tags(["x"]),
        ]);
        let data = run(&schema, "{ audit { id severity action recordIds } }").await;
        assert_eq!(data["audit"][0]["id"], "artifacts");
        assert_eq!(data["audit"][0]["action"], "DELETE");

        let message = run_err(&schema, r#"mutation { applyFinding(findingId: "artifacts") { changed } }"#).await;
        assert!(message.contains("confirmation required"));
        let data = run(
            &schema,
            r#"mutation { applyFinding(findingId: "artifacts", confirm: true) { changed recordIds } }"#,
        )
        .await;
        assert_eq!(data["applyFinding"]["changed"], 1);
        assert!(!state.view_model().tree().contains("nm"));
    }

    #[tokio::test]
    async fn template_preview_apply_and_script() {
        let (schema, state) = schema();
        let data = run(&schema, r#"{ previewTemplate(templateId: "python-package") { missing total } }"#).await;
        assert_eq!(data["previewTemplate"]["total"], 9);

        let data = run(&schema, r#"mutation { applyTemplate(templateId: "python-package") }"#).await;
        assert_eq!(data["applyTemplate"], 9);
        assert_eq!(state.view_model().tree().len(), 9);

        let data = run(&schema, r#"{ exportScript(templateId: "nextjs-app") }"#).await;
        let script = data["exportScript"].as_str().unwrap();
        assert!(script.contains("mkdir -p -- 'src/app'"));
        assert!(!script.contains("mkdir -p -- 'tests'"));

        let message = run_err(&schema, r#"mutation { applyTemplate(templateId: "nope") }"#).await;
        assert!(message.contains("not found"));
    }

    #[tokio::test]
    async fn export_import_json_round_trip() {
        let (schema, state) = schema();
        seed(&state);
        run(&schema, r#"mutation { addTag(id: "c", tag: "docs") }"#).await;
        let original = state.view_model().tree().clone();

        let data = run(&schema, "{ exportTree(format: JSON) }").await;
        let json = data["exportTree"].as_str().unwrap().to_string();

        run(&schema, "mutation { clearTree(confirm: true) }").await;
        let request = async_graphql::Request::new("mutation($json: String!) { importTree(json: $json) }")
            .variables(async_graphql::Variables::from_json(serde_json::json!({ "json": json })));
        let response = schema.execute(request).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(state.view_model().tree(), &original);
    }

    #[tokio::test]
    async fn auto_organize_by_type() {
        let (schema, state) = schema();
        state.view_model().load_records(vec![
            FolderRecord::new("1", "a.txt"),
            FolderRecord::new("2", "b.txt"),
            FolderRecord::new("3", "src"),
        ]);
        let data = run(&schema, "mutation { autoOrganize(groupBy: TYPE, threshold: 2) }").await;
        assert_eq!(data["autoOrganize"], 2);
        assert_eq!(state.view_model().tree().get("2").unwrap().tags, vec!["type-txt"]);

        let data = run(&schema, "mutation { autoOrganize(groupBy: SIZE) }").await;
        assert_eq!(data["autoOrganize"], 3);
        assert_eq!(run(&schema, "{ canUndo }").await["canUndo"], true);
    }

    #[tokio::test]
    async fn move_and_rename() {
        let (schema, state) = schema();
        seed(&state);
        let data = run(&schema, r#"mutation { moveRecord(dragId: "b", targetId: "c") }"#).await;
        assert_eq!(data["moveRecord"], 1);
        assert_eq!(state.view_model().tree().get("b").unwrap().path.as_deref(), Some("docs/lib"));

        let data = run(&schema, r#"mutation { moveRecord(dragId: "a", targetId: "a") }"#).await;
        assert_eq!(data["moveRecord"], 0);

        let data = run(&schema, r#"mutation { bulkRename(pattern: { find: "s", replace: "S" }) }"#).await;
        assert_eq!(data["bulkRename"], 2);
    }
}
