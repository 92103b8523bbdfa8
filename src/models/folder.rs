use std::collections::BTreeMap;
use std::sync::Arc;

use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl FolderRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: None,
            tags: Vec::new(),
            modified_at: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(scope_path::normalize(&path.into()));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Path used for hierarchy placement; falls back to the name.
    pub fn tree_path(&self) -> &str {
        match self.path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => &self.name,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }
}

/// Flat id -> record map. Records sit behind `Arc` so snapshots share
/// every record a mutation did not touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub items: BTreeMap<String, Arc<FolderRecord>>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = FolderRecord>,
    {
        let mut tree = Self::new();
        for record in records {
            tree.insert(record);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&FolderRecord> {
        self.items.get(id).map(|record| record.as_ref())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut FolderRecord> {
        self.items.get_mut(id).map(Arc::make_mut)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn insert(&mut self, record: FolderRecord) {
        self.items.insert(record.id.clone(), Arc::new(record));
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<FolderRecord>> {
        self.items.remove(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &FolderRecord> {
        self.items.values().map(|record| record.as_ref())
    }

    pub fn to_records(&self) -> Vec<FolderRecord> {
        self.records().cloned().collect()
    }
}

/// Listing shape returned by `getFolderTree`: `{id, data: {name, tags}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct FolderNode {
    pub id: String,
    pub data: FolderNodeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct FolderNodeData {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&FolderRecord> for FolderNode {
    fn from(record: &FolderRecord) -> Self {
        Self {
            id: record.id.clone(),
            data: FolderNodeData {
                name: record.name.clone(),
                tags: record.tags.clone(),
                path: record.path.clone(),
            },
        }
    }
}

impl From<FolderNode> for FolderRecord {
    fn from(node: FolderNode) -> Self {
        Self {
            id: node.id,
            name: node.data.name,
            path: node.data.path.map(|p| scope_path::normalize(&p)),
            tags: node.data.tags,
            modified_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub total_folders: usize,
    pub tagged_folders: usize,
    pub total_tags: usize,
    pub favorited: usize,
    pub tag_percentage: u32,
}

/// Parent/child placement derived from record paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    pub root_ids: Vec<String>,
    pub children: BTreeMap<String, Vec<String>>,
}

impl Hierarchy {
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first rows in display order, roots first.
    pub fn rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        let mut stack: Vec<(&String, usize)> =
            self.root_ids.iter().rev().map(|id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            rows.push(TreeRow {
                id: id.clone(),
                depth,
                child_count: self.children_of(id).len(),
            });
            for child in self.children_of(id).iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct TreeRow {
    pub id: String,
    pub depth: usize,
    pub child_count: usize,
}
