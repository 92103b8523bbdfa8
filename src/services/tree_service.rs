use crate::error::AppError;
use crate::models::audit::{AuditAction, Finding, FindingOutcome, DEFAULT_REVIEW_TAG};
use crate::models::filter::RenamePattern;
use crate::models::folder::{FolderRecord, Tree};
use crate::models::history::{HistoryEntry, HistoryKind, HistorySummary};
use crate::models::template::Template;
use crate::services::batch_service::{self, OrganizeBy};
use crate::services::template_service;

/// Result of a pure mutation: the next tree, a history description and
/// whatever the caller wants back.
pub struct Edit<T> {
    pub tree: Tree,
    pub description: String,
    pub outcome: T,
}

impl<T> Edit<T> {
    pub fn new(tree: Tree, description: impl Into<String>, outcome: T) -> Self {
        Self {
            tree,
            description: description.into(),
            outcome,
        }
    }
}

/// Owns the authoritative tree and its linear undo history.
///
/// Every entry keeps the tree it replaced (`before`) and, once the
/// view-model moves away from it, the tree it produced (`after`). Undo
/// restores the previous entry's `after`; redo restores the next entry's.
#[derive(Debug)]
pub struct TreeViewModel {
    tree: Tree,
    history: Vec<HistoryEntry>,
    history_index: isize,
}

impl Default for TreeViewModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeViewModel {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            history: Vec::new(),
            history_index: -1,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn history_index(&self) -> isize {
        self.history_index
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Overwrites the tree without touching history.
    pub fn replace_tree(&mut self, tree: Tree) {
        self.tree = tree;
    }

    /// Replaces the tree wholesale and clears history.
    pub fn load_records(&mut self, records: Vec<FolderRecord>) {
        let tree = Tree::from_records(records);
        tracing::info!(records = tree.len(), "tree loaded");
        self.replace_tree(tree);
        self.history.clear();
        self.history_index = -1;
    }

    /// Runs `collect` and loads its records. A failed collection leaves an
    /// empty tree behind and surfaces the error.
    pub fn load_from<F>(&mut self, collect: F) -> Result<usize, AppError>
    where
        F: FnOnce() -> Result<Vec<FolderRecord>, AppError>,
    {
        match collect() {
            Ok(records) => {
                self.load_records(records);
                Ok(self.tree.len())
            }
            Err(err) => {
                self.load_records(Vec::new());
                Err(err)
            }
        }
    }

    fn current_position(&self) -> Option<usize> {
        usize::try_from(self.history_index).ok()
    }

    fn seal_current(&mut self) {
        if let Some(index) = self.current_position() {
            if let Some(entry) = self.history.get_mut(index) {
                entry.after = Some(self.tree.clone());
            }
        }
    }

    /// Snapshots the live tree as the pre-state of a new entry. Must run
    /// before the caller mutates. Entries past the current index are dropped.
    pub fn record_history(&mut self, kind: HistoryKind, description: &str, target_id: Option<&str>) {
        self.seal_current();

        if self.history.is_empty() {
            let mut baseline = HistoryEntry::new(HistoryKind::Load, "Initial state", None, self.tree.clone());
            baseline.after = Some(self.tree.clone());
            self.history.push(baseline);
            self.history_index = 0;
        }

        let keep = self.current_position().map_or(0, |index| index + 1);
        self.history.truncate(keep);
        self.history
            .push(HistoryEntry::new(kind, description, target_id, self.tree.clone()));
        self.history_index = self.history.len() as isize - 1;
        tracing::debug!(%kind, description, index = self.history_index, "history recorded");
    }

    /// Runs a pure mutation against the live tree. History is recorded only
    /// when the produced tree differs.
    pub fn apply<T, F>(&mut self, kind: HistoryKind, target_id: Option<&str>, mutation: F) -> T
    where
        F: FnOnce(&Tree) -> Edit<T>,
    {
        let edit = mutation(&self.tree);
        if edit.tree != self.tree {
            self.record_history(kind, &edit.description, target_id);
            self.tree = edit.tree;
            self.seal_current();
        }
        edit.outcome
    }

    pub fn can_undo(&self) -> bool {
        self.history_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history_index < self.history.len() as isize - 1
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.seal_current();
        self.history_index -= 1;
        let index = self.history_index as usize;
        let restored = self.history[index]
            .after
            .clone()
            .unwrap_or_else(|| self.history[index + 1].before.clone());
        self.tree = restored;
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.seal_current();
        self.history_index += 1;
        let index = self.history_index as usize;
        if let Some(after) = self.history[index].after.clone() {
            self.tree = after;
        }
        true
    }

    pub fn history(&self) -> Vec<HistorySummary> {
        let current = self.current_position();
        self.history
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.summary(i, Some(i) == current))
            .collect()
    }

    pub fn set_tags(&mut self, id: &str, tags: Vec<String>) -> Result<bool, AppError> {
        self.require(id)?;
        let description = format!("Classified {id}: {}", tags.join(", "));
        Ok(self.apply(HistoryKind::Classify, Some(id), |tree| {
            let next = batch_service::set_tags(tree, id, tags);
            let changed = next != *tree;
            Edit::new(next, description, changed)
        }))
    }

    pub fn add_tag(&mut self, id: &str, tag: &str) -> Result<bool, AppError> {
        self.require(id)?;
        let ids = [id.to_string()];
        Ok(self.apply(HistoryKind::Tag, Some(id), |tree| {
            let (next, changed) = batch_service::bulk_tag(tree, &ids, tag);
            Edit::new(next, format!("Added tag \"{}\"", tag.trim()), changed > 0)
        }))
    }

    pub fn remove_tag_at(&mut self, id: &str, index: usize) -> Result<Option<String>, AppError> {
        self.require(id)?;
        Ok(self.apply(HistoryKind::Tag, Some(id), |tree| {
            let (next, removed) = batch_service::remove_tag_at(tree, id, index);
            let description = match &removed {
                Some(tag) => format!("Removed tag \"{tag}\""),
                None => String::new(),
            };
            Edit::new(next, description, removed)
        }))
    }

    pub fn delete_records(&mut self, ids: &[String]) -> usize {
        let target = (ids.len() == 1).then(|| ids[0].as_str());
        self.apply(HistoryKind::Delete, target, |tree| {
            let (next, removed) = batch_service::delete_records(tree, ids);
            Edit::new(next, format!("Deleted {removed} folders"), removed)
        })
    }

    pub fn clear(&mut self, confirm: bool) -> Result<usize, AppError> {
        if !confirm {
            return Err(AppError::ConfirmationRequired(
                "clearing the tree removes every folder".to_string(),
            ));
        }
        Ok(self.apply(HistoryKind::Delete, None, |tree| {
            let removed = tree.len();
            Edit::new(Tree::new(), format!("Cleared {removed} folders"), removed)
        }))
    }

    pub fn bulk_tag(&mut self, ids: &[String], tag: &str) -> usize {
        self.apply(HistoryKind::Batch, None, |tree| {
            let (next, changed) = batch_service::bulk_tag(tree, ids, tag);
            Edit::new(next, format!("Tagged {changed} folders as \"{}\"", tag.trim()), changed)
        })
    }

    pub fn bulk_untag(&mut self, ids: &[String], tag: &str) -> usize {
        self.apply(HistoryKind::Batch, None, |tree| {
            let (next, changed) = batch_service::bulk_untag(tree, ids, tag);
            Edit::new(next, format!("Removed \"{tag}\" from {changed} folders"), changed)
        })
    }

    pub fn bulk_rename(&mut self, pattern: &RenamePattern) -> usize {
        self.apply(HistoryKind::Rename, None, |tree| {
            let (next, renamed) = batch_service::bulk_rename(tree, pattern);
            Edit::new(next, format!("Renamed {renamed} folders"), renamed)
        })
    }

    pub fn auto_organize(&mut self, group_by: OrganizeBy, threshold: usize) -> usize {
        self.apply(HistoryKind::Batch, None, |tree| {
            let (next, changed) = batch_service::auto_organize(tree, group_by, threshold);
            let by = match group_by {
                OrganizeBy::Type => "type",
                OrganizeBy::Size => "size",
            };
            Edit::new(next, format!("Auto-organized {changed} folders by {by}"), changed)
        })
    }

    pub fn move_record(&mut self, drag_id: &str, target_id: &str) -> Result<usize, AppError> {
        self.require(drag_id)?;
        let target_name = self.require(target_id)?.name.clone();
        Ok(self.apply(HistoryKind::Move, Some(drag_id), |tree| {
            let (next, moved) = batch_service::move_record(tree, drag_id, target_id);
            Edit::new(next, format!("Moved under {target_name}"), moved)
        }))
    }

    pub fn apply_template(&mut self, template: &Template) -> usize {
        self.apply(HistoryKind::Template, None, |tree| {
            let (next, created) = template_service::apply(template, tree);
            Edit::new(
                next,
                format!("Applied {} ({created} added)", template.name),
                created,
            )
        })
    }

    /// `select` only reports ids; `tag` applies the finding's tag; `delete`
    /// removes the flagged records and needs `confirm`.
    pub fn apply_finding(&mut self, finding: &Finding, confirm: bool) -> Result<FindingOutcome, AppError> {
        let ids = &finding.record_ids;
        let changed = match finding.action {
            None | Some(AuditAction::Select) => 0,
            Some(AuditAction::Tag) => {
                let tag = finding.tag_value.as_deref().unwrap_or(DEFAULT_REVIEW_TAG);
                self.apply(HistoryKind::Batch, None, |tree| {
                    let (next, changed) = batch_service::bulk_tag(tree, ids, tag);
                    Edit::new(next, format!("Tagged {} folders as {tag}", ids.len()), changed)
                })
            }
            Some(AuditAction::Delete) => {
                if !confirm {
                    return Err(AppError::ConfirmationRequired(format!(
                        "delete {} flagged folders from the tree",
                        ids.len()
                    )));
                }
                self.apply(HistoryKind::Delete, None, |tree| {
                    let (next, removed) = batch_service::delete_records(tree, ids);
                    Edit::new(next, format!("Deleted {} folders", ids.len()), removed)
                })
            }
        };
        Ok(FindingOutcome {
            action: finding.action,
            record_ids: ids.clone(),
            changed,
        })
    }

    /// Replaces the tree with imported records as one undoable step.
    pub fn import_tree(&mut self, tree: Tree) -> usize {
        self.apply(HistoryKind::Import, None, |_| {
            let count = tree.len();
            Edit::new(tree, format!("Imported {count} folders"), count)
        })
    }

    fn require(&self, id: &str) -> Result<&FolderRecord, AppError> {
        self.tree
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("folder {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditConfig;
    use crate::services::{audit_service, export_service, hierarchy_service};

    fn loaded() -> TreeViewModel {
        let mut vm = TreeViewModel::new();
        vm.load_records(vec![
            FolderRecord::new("a", "src").with_path("src"),
            FolderRecord::new("b", "lib").with_path("src/lib"),
            FolderRecord::new("c", "docs").with_path("docs"),
        ]);
        vm
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn load_resets_history() {
        let mut vm = loaded();
        assert_eq!(vm.history_index(), -1);
        assert!(!vm.can_undo());
        assert!(!vm.can_redo());
        vm.add_tag("a", "code").unwrap();
        vm.load_records(Vec::new());
        assert_eq!(vm.history_index(), -1);
        assert_eq!(vm.history_len(), 0);
    }

    #[test]
    fn first_edit_is_undoable() {
        let mut vm = loaded();
        let original = vm.tree().clone();
        vm.add_tag("a", "code").unwrap();
        assert_eq!(vm.history_index(), 1);
        assert!(vm.can_undo());
        assert!(!vm.can_redo());

        assert!(vm.undo());
        assert_eq!(vm.tree(), &original);
        assert!(!vm.can_undo());
        assert!(vm.can_redo());
        assert!(!vm.undo());
    }

    #[test]
    fn undo_then_redo_restores_prior_value() {
        let mut vm = loaded();
        vm.add_tag("a", "code").unwrap();
        vm.bulk_tag(&ids(&["b", "c"]), "x");
        vm.delete_records(&ids(&["c"]));

        let latest = vm.tree().clone();
        vm.undo();
        let middle = vm.tree().clone();
        assert!(middle.contains("c"));
        vm.undo();
        let first = vm.tree().clone();
        assert!(!first.get("b").unwrap().has_tag("x"));

        vm.redo();
        assert_eq!(vm.tree(), &middle);
        vm.redo();
        assert_eq!(vm.tree(), &latest);
        assert!(!vm.redo());

        vm.undo();
        vm.undo();
        vm.undo();
        assert!(vm.tree().get("a").unwrap().tags.is_empty());
        vm.redo();
        assert_eq!(vm.tree(), &first);
    }

    #[test]
    fn recording_after_undo_truncates_redo_tail() {
        let mut vm = loaded();
        vm.add_tag("a", "one").unwrap();
        vm.add_tag("a", "two").unwrap();
        vm.undo();
        assert!(vm.can_redo());

        vm.add_tag("b", "three").unwrap();
        assert!(!vm.can_redo());
        assert_eq!(vm.history_len(), 3);
        assert_eq!(vm.tree().get("a").unwrap().tags, vec!["one"]);

        vm.undo();
        assert_eq!(vm.tree().get("a").unwrap().tags, vec!["one"]);
        assert!(vm.tree().get("b").unwrap().tags.is_empty());
    }

    #[test]
    fn index_stays_in_bounds() {
        let mut vm = loaded();
        for i in 0..4 {
            vm.add_tag("a", &format!("t{i}")).unwrap();
        }
        for _ in 0..10 {
            vm.undo();
            assert!(vm.history_index() >= 0);
        }
        assert!(!vm.can_undo());
        for _ in 0..10 {
            vm.redo();
            assert!(vm.history_index() < vm.history_len() as isize);
        }
        assert!(!vm.can_redo());
        assert_eq!(vm.tree().get("a").unwrap().tags.len(), 4);
    }

    #[test]
    fn no_op_mutations_record_nothing() {
        let mut vm = loaded();
        vm.add_tag("a", "code").unwrap();
        let len = vm.history_len();
        assert!(!vm.add_tag("a", "code").unwrap());
        assert_eq!(vm.bulk_untag(&ids(&["b"]), "missing"), 0);
        assert_eq!(vm.history_len(), len);
    }

    #[test]
    fn unknown_record_is_not_found() {
        let mut vm = loaded();
        assert!(matches!(vm.add_tag("zzz", "t"), Err(AppError::NotFound(_))));
        assert!(matches!(vm.move_record("a", "zzz"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn clear_needs_confirmation() {
        let mut vm = loaded();
        assert!(matches!(vm.clear(false), Err(AppError::ConfirmationRequired(_))));
        assert_eq!(vm.tree().len(), 3);
        assert_eq!(vm.clear(true).unwrap(), 3);
        assert!(vm.tree().is_empty());
        vm.undo();
        assert_eq!(vm.tree().len(), 3);
    }

    #[test]
    fn hierarchy_of_loaded_example() {
        let vm = loaded();
        let hierarchy = hierarchy_service::derive_hierarchy(vm.tree());
        assert_eq!(hierarchy.root_ids, vec!["a", "c"]);
        assert_eq!(hierarchy.children_of("a"), ["b".to_string()]);
    }

    #[test]
    fn artifact_finding_deletes_with_confirmation() {
        let mut vm = TreeViewModel::new();
        vm.load_records(vec![
            FolderRecord::new("nm", "NODE_MODULES").with_tags(["x"]),
            FolderRecord::new("src", "src").with_tags(["x"]),
        ]);
        let findings = audit_service::run_audit(vm.tree(), &AuditConfig::default());
        let artifacts = findings.iter().find(|f| f.id == "artifacts").unwrap();
        assert_eq!(artifacts.record_ids, vec!["nm"]);

        assert!(vm.apply_finding(artifacts, false).is_err());
        let outcome = vm.apply_finding(artifacts, true).unwrap();
        assert_eq!(outcome.changed, 1);
        assert!(!vm.tree().contains("nm"));
    }

    #[test]
    fn tag_finding_applies_review_tag() {
        let mut vm = loaded();
        let findings = audit_service::run_audit(vm.tree(), &AuditConfig::default());
        let untagged = findings.iter().find(|f| f.id == "untagged").unwrap();
        let outcome = vm.apply_finding(untagged, false).unwrap();
        assert_eq!(outcome.changed, 3);
        assert!(vm.tree().records().all(|r| r.has_tag("needs-review")));
    }

    #[test]
    fn rename_round_trip_is_undoable() {
        let mut vm = TreeViewModel::new();
        vm.load_records(vec![FolderRecord::new("1", "A")]);
        vm.bulk_rename(&RenamePattern { find: "A".into(), replace: "B".into(), use_regex: false });
        assert_eq!(vm.tree().get("1").unwrap().name, "B");
        vm.bulk_rename(&RenamePattern { find: "B".into(), replace: "A".into(), use_regex: false });
        assert_eq!(vm.tree().get("1").unwrap().name, "A");
        vm.undo();
        assert_eq!(vm.tree().get("1").unwrap().name, "B");
    }

    #[test]
    fn json_export_import_reproduces_tree() {
        let mut vm = loaded();
        vm.add_tag("b", "code").unwrap();
        let json = export_service::to_json(vm.tree()).unwrap();
        let imported = export_service::import_json(&json).unwrap();
        assert_eq!(&imported, vm.tree());

        let mut other = TreeViewModel::new();
        assert_eq!(other.import_tree(imported), 3);
        assert_eq!(other.tree(), vm.tree());
    }

    #[test]
    fn history_summaries_mark_current_entry() {
        let mut vm = loaded();
        vm.add_tag("a", "code").unwrap();
        vm.move_record("c", "a").unwrap();
        vm.undo();
        let history = vm.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].kind, HistoryKind::Load);
        assert!(history[1].current);
        assert_eq!(history[2].kind, HistoryKind::Move);
        assert_eq!(history[2].target_id.as_deref(), Some("c"));
    }

    #[test]
    fn replace_tree_leaves_history_alone() {
        let mut vm = loaded();
        vm.add_tag("a", "code").unwrap();
        let (index, len) = (vm.history_index(), vm.history_len());
        vm.replace_tree(Tree::new());
        assert!(vm.tree().is_empty());
        assert_eq!((vm.history_index(), vm.history_len()), (index, len));
    }

    #[test]
    fn auto_organize_is_one_undoable_step() {
        let mut vm = TreeViewModel::new();
        vm.load_records(vec![
            FolderRecord::new("1", "a.md"),
            FolderRecord::new("2", "b.md"),
            FolderRecord::new("3", "src"),
        ]);
        assert_eq!(vm.auto_organize(OrganizeBy::Type, 2), 2);
        assert_eq!(vm.tree().get("1").unwrap().tags, vec!["type-md"]);
        assert!(vm.tree().get("3").unwrap().tags.is_empty());

        let history = vm.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].kind, HistoryKind::Batch);
        assert_eq!(history[1].description, "Auto-organized 2 folders by type");

        assert!(vm.undo());
        assert!(vm.tree().records().all(|r| r.tags.is_empty()));
        assert_eq!(vm.auto_organize(OrganizeBy::Type, 5), 0);
        assert!(vm.can_redo());
    }

    #[test]
    fn failed_load_leaves_empty_tree() {
        let mut vm = loaded();
        let result = vm.load_from(|| Err(AppError::General("boom".into())));
        assert!(result.is_err());
        assert!(vm.tree().is_empty());
    }
}
