use std::collections::{BTreeMap, HashSet};

use crate::error::AppError;
use crate::models::folder::{FolderRecord, Tree};
use crate::models::template::{Template, TemplatePreview};
use crate::scope_path;

const DEFAULT_TEMPLATE_TAG: &str = "template";

fn template(
    id: &str,
    name: &str,
    description: &str,
    folders: &[&str],
    tags: &[(&str, &[&str])],
) -> Template {
    Template {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        folders: folders.iter().map(|f| f.to_string()).collect(),
        tags: tags
            .iter()
            .map(|(path, tags)| {
                (
                    path.to_string(),
                    tags.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn builtin_templates() -> Vec<Template> {
    vec![
        template(
            "nextjs-app",
            "Next.js App Router",
            "API routes, app router, components, lib, store, tests",
            &[
                "src/app",
                "src/app/api",
                "src/app/api/auth",
                "src/app/api/stripe",
                "src/components",
                "src/lib",
                "src/store",
                "src/utils",
                "public",
                "tests",
                "scripts",
            ],
            &[
                ("src/app", &["app"]),
                ("src/components", &["ui"]),
                ("src/lib", &["data"]),
                ("src/store", &["state"]),
                ("tests", &["quality"]),
                ("scripts", &["ops"]),
            ],
        ),
        template(
            "python-package",
            "Python Package",
            "src layout with tests, docs, scripts, CI",
            &[
                "src",
                "src/package_name",
                "src/package_name/api",
                "src/package_name/services",
                "src/package_name/models",
                "tests",
                "docs",
                "scripts",
                "examples",
            ],
            &[
                ("src", &["code"]),
                ("tests", &["quality"]),
                ("docs", &["docs"]),
                ("scripts", &["ops"]),
                ("examples", &["samples"]),
            ],
        ),
        template(
            "react-library",
            "React Component Library",
            "Src/lib with components, stories, tests, build, demo app",
            &[
                "src",
                "src/components",
                "src/hooks",
                "src/styles",
                "src/utils",
                "stories",
                "tests",
                "dist",
                "scripts",
                "examples",
            ],
            &[
                ("src/components", &["ui"]),
                ("src/hooks", &["hooks"]),
                ("src/utils", &["utils"]),
                ("stories", &["docs"]),
                ("tests", &["quality"]),
                ("dist", &["artifacts"]),
                ("scripts", &["ops"]),
                ("examples", &["samples"]),
            ],
        ),
        template(
            "data-science",
            "Data Science Workspace",
            "Notebooks, data, models, experiments, reports",
            &[
                "notebooks",
                "data/raw",
                "data/processed",
                "data/external",
                "models",
                "src",
                "src/features",
                "src/pipelines",
                "experiments",
                "reports",
                "scripts",
            ],
            &[
                ("notebooks", &["exploration"]),
                ("data/raw", &["data"]),
                ("data/processed", &["data"]),
                ("models", &["models"]),
                ("experiments", &["experiments"]),
                ("reports", &["docs"]),
                ("scripts", &["ops"]),
            ],
        ),
        template(
            "unity-project",
            "Unity Game Project",
            "Assets, scenes, scripts, prefabs, resources",
            &[
                "Assets",
                "Assets/Scripts",
                "Assets/Prefabs",
                "Assets/Scenes",
                "Assets/Materials",
                "Assets/Textures",
                "Assets/Audio",
                "Assets/Animations",
                "Assets/Resources",
                "ProjectSettings",
                "Packages",
            ],
            &[
                ("Assets/Scripts", &["code"]),
                ("Assets/Prefabs", &["prefabs"]),
                ("Assets/Scenes", &["scenes"]),
                ("Assets/Materials", &["assets"]),
                ("Assets/Audio", &["assets"]),
            ],
        ),
        template(
            "mobile-app",
            "Mobile App (React Native)",
            "Screens, components, navigation, services, assets",
            &[
                "src",
                "src/screens",
                "src/components",
                "src/navigation",
                "src/services",
                "src/store",
                "src/utils",
                "src/assets",
                "src/assets/images",
                "src/assets/fonts",
                "android",
                "ios",
                "tests",
            ],
            &[
                ("src/screens", &["screens"]),
                ("src/components", &["ui"]),
                ("src/navigation", &["navigation"]),
                ("src/services", &["services"]),
                ("src/store", &["state"]),
                ("tests", &["quality"]),
            ],
        ),
    ]
}

/// Built-in templates plus whatever was imported this session.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self {
            templates: builtin_templates(),
        }
    }
}

impl TemplateRegistry {
    pub fn all(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&Template, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("template {id}")))
    }

    pub fn export_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(&self.templates)?)
    }

    /// Adds templates from a JSON array. Entries without an id or whose id is
    /// already registered are skipped. Returns the number added.
    pub fn import_json(&mut self, json: &str) -> Result<usize, AppError> {
        let parsed: Vec<serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| AppError::General(format!("Invalid template JSON: {e}")))?;

        let mut added = 0;
        for value in parsed {
            let template: Template = match serde_json::from_value(value) {
                Ok(template) => template,
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed template");
                    continue;
                }
            };
            if template.id.is_empty() || self.get(&template.id).is_some() {
                continue;
            }
            self.templates.push(template);
            added += 1;
        }
        Ok(added)
    }
}

fn existing_paths(tree: &Tree) -> HashSet<String> {
    tree.records()
        .map(|record| scope_path::normalize(record.tree_path()))
        .collect()
}

fn missing_paths(template: &Template, tree: &Tree) -> Vec<String> {
    let existing = existing_paths(tree);
    template
        .folders
        .iter()
        .filter(|path| !existing.contains(&scope_path::normalize(path)))
        .cloned()
        .collect()
}

pub fn preview(template: &Template, tree: &Tree) -> TemplatePreview {
    TemplatePreview {
        template_id: template.id.clone(),
        missing: missing_paths(template, tree),
        total: template.folders.len(),
    }
}

/// First free id for a template record; later applies after a move get a
/// numeric suffix instead of replacing the moved record.
fn unused_id(tree: &Tree, template_id: &str, path: &str) -> String {
    let base = format!("template-{template_id}-{path}");
    if !tree.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|id| !tree.contains(id))
        .unwrap_or(base)
}

/// Synthesizes a record for every template path not already present.
/// Existing records are never touched.
pub fn apply(template: &Template, tree: &Tree) -> (Tree, usize) {
    let mut next = tree.clone();
    let missing = missing_paths(template, tree);
    for path in &missing {
        let name = scope_path::segments(path)
            .last()
            .map(|s| s.to_string())
            .unwrap_or_else(|| path.clone());
        let tags = template
            .tags
            .get(path)
            .cloned()
            .unwrap_or_else(|| vec![DEFAULT_TEMPLATE_TAG.to_string()]);
        let id = unused_id(&next, &template.id, path);
        next.insert(
            FolderRecord::new(id, name)
                .with_path(path.as_str())
                .with_tags(tags),
        );
    }
    (next, missing.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::batch_service;

    fn five_path_template() -> Template {
        template(
            "tiny",
            "Tiny",
            "",
            &["src", "src/lib", "docs", "tests", "scripts"],
            &[("src", &["code"]), ("tests", &["quality"])],
        )
    }

    #[test]
    fn builtins_have_unique_ids() {
        let templates = builtin_templates();
        let ids: HashSet<_> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 6);
        for template in &templates {
            for path in template.tags.keys() {
                assert!(template.folders.contains(path), "{} lists {path}", template.id);
            }
        }
    }

    #[test]
    fn applying_to_empty_tree_creates_every_path() {
        let (tree, created) = apply(&five_path_template(), &Tree::new());
        assert_eq!(created, 5);
        assert_eq!(tree.len(), 5);

        let src = tree.get("template-tiny-src").unwrap();
        assert_eq!(src.tags, vec!["code"]);
        let lib = tree.get("template-tiny-src/lib").unwrap();
        assert_eq!(lib.name, "lib");
        assert_eq!(lib.path.as_deref(), Some("src/lib"));
        assert_eq!(lib.tags, vec!["template"]);
    }

    #[test]
    fn existing_paths_are_left_alone() {
        let tree = Tree::from_records([
            FolderRecord::new("mine", "src").with_path("src").with_tags(["keep"]),
            FolderRecord::new("named", "docs"),
        ]);
        let template = five_path_template();
        let preview = preview(&template, &tree);
        assert_eq!(preview.missing, vec!["src/lib", "tests", "scripts"]);
        assert_eq!(preview.total, 5);

        let (next, created) = apply(&template, &tree);
        assert_eq!(created, 3);
        assert_eq!(next.get("mine").unwrap().tags, vec!["keep"]);
        assert!(!next.contains("template-tiny-src"));

        let (again, none) = apply(&template, &next);
        assert_eq!(none, 0);
        assert_eq!(again, next);
    }

    #[test]
    fn reapplying_after_a_move_keeps_the_moved_record() {
        let template = template("t", "T", "", &["src"], &[]);
        let (mut tree, _) = apply(&template, &Tree::new());
        tree.insert(FolderRecord::new("d", "docs").with_path("docs"));
        let (tree, _) = batch_service::bulk_tag(&tree, &["template-t-src".to_string()], "mine");
        let (moved, count) = batch_service::move_record(&tree, "template-t-src", "d");
        assert_eq!(count, 1);

        let (next, created) = apply(&template, &moved);
        assert_eq!(created, 1);
        assert_eq!(next.len(), 3);
        let kept = next.get("template-t-src").unwrap();
        assert_eq!(kept.path.as_deref(), Some("docs/src"));
        assert_eq!(kept.tags, vec!["template", "mine"]);
        assert_eq!(next.get("template-t-src-2").unwrap().path.as_deref(), Some("src"));
    }

    #[test]
    fn import_skips_known_ids() {
        let mut registry = TemplateRegistry::default();
        let json = r#"[
            {"id": "nextjs-app", "name": "dup", "folders": []},
            {"id": "go-service", "name": "Go", "folders": ["cmd", "internal"]},
            {"name": "no id", "folders": []}
        ]"#;
        assert_eq!(registry.import_json(json).unwrap(), 1);
        assert_eq!(registry.all().len(), 7);
        assert_eq!(registry.get("nextjs-app").unwrap().name, "Next.js App Router");
        assert!(registry.import_json("{not json").is_err());
    }

    #[test]
    fn export_round_trips_through_import() {
        let registry = TemplateRegistry::default();
        let json = registry.export_json().unwrap();
        let parsed: Vec<Template> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, builtin_templates());
    }
}
