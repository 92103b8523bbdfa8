use std::collections::BTreeMap;

use async_graphql::Enum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::filter::RenamePattern;
use crate::models::folder::{FolderRecord, Tree};
use crate::scope_path;

/// Adds `tag` to every listed record that lacks it. Returns the changed count.
pub fn bulk_tag(tree: &Tree, ids: &[String], tag: &str) -> (Tree, usize) {
    let tag = tag.trim();
    let mut next = tree.clone();
    if tag.is_empty() {
        return (next, 0);
    }
    let mut changed = 0;
    for id in ids {
        let needs_tag = next.get(id).is_some_and(|record| !record.has_tag(tag));
        if needs_tag {
            if let Some(record) = next.get_mut(id) {
                record.add_tag(tag);
                changed += 1;
            }
        }
    }
    (next, changed)
}

pub fn bulk_untag(tree: &Tree, ids: &[String], tag: &str) -> (Tree, usize) {
    let mut next = tree.clone();
    let mut changed = 0;
    for id in ids {
        let has_tag = next.get(id).is_some_and(|record| record.has_tag(tag));
        if has_tag {
            if let Some(record) = next.get_mut(id) {
                record.remove_tag(tag);
                changed += 1;
            }
        }
    }
    (next, changed)
}

pub fn set_tags(tree: &Tree, id: &str, tags: Vec<String>) -> Tree {
    let mut next = tree.clone();
    let unchanged = next.get(id).map_or(true, |record| record.tags == tags);
    if !unchanged {
        if let Some(record) = next.get_mut(id) {
            record.tags = tags;
        }
    }
    next
}

pub fn remove_tag_at(tree: &Tree, id: &str, index: usize) -> (Tree, Option<String>) {
    let mut next = tree.clone();
    let in_range = next.get(id).is_some_and(|record| index < record.tags.len());
    if !in_range {
        return (next, None);
    }
    let removed = next.get_mut(id).map(|record| record.tags.remove(index));
    (next, removed)
}

pub fn delete_records(tree: &Tree, ids: &[String]) -> (Tree, usize) {
    let mut next = tree.clone();
    let removed = ids.iter().filter(|id| next.remove(id).is_some()).count();
    (next, removed)
}

/// Rewrites a `$1`/`$&`/`$<name>` replacement string into the regex
/// crate's syntax. Group references are braced so `$2_` stays group 2
/// followed by `_`; a `$` that starts no reference is kept literally.
fn expand_replacement(replace: &str) -> String {
    let mut out = String::with_capacity(replace.len() + 8);
    let mut chars = replace.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{digits}}}"));
            }
            Some('<') => {
                let rest: String = chars.clone().skip(1).collect();
                match rest.find('>') {
                    Some(end) if end > 0 => {
                        let name = &rest[..end];
                        out.push_str(&format!("${{{name}}}"));
                        for _ in 0..name.chars().count() + 2 {
                            chars.next();
                        }
                    }
                    _ => out.push_str("$$"),
                }
            }
            _ => out.push_str("$$"),
        }
    }
    out
}

/// Find/replace over every record name. Empty patterns and invalid regexes
/// rename nothing; records whose name does not change are not counted.
pub fn bulk_rename(tree: &Tree, pattern: &RenamePattern) -> (Tree, usize) {
    let mut next = tree.clone();
    if pattern.find.is_empty() {
        return (next, 0);
    }

    let replacement = expand_replacement(&pattern.replace);
    let regex = if pattern.use_regex {
        match Regex::new(&pattern.find) {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::warn!(pattern = %pattern.find, %err, "invalid rename regex");
                return (next, 0);
            }
        }
    } else {
        None
    };

    let renames: Vec<(String, String)> = tree
        .records()
        .filter_map(|record| {
            let renamed = match &regex {
                Some(regex) => regex
                    .replace_all(&record.name, replacement.as_str())
                    .into_owned(),
                None => record.name.replace(&pattern.find, &pattern.replace),
            };
            (renamed != record.name).then(|| (record.id.clone(), renamed))
        })
        .collect();

    for (id, name) in &renames {
        if let Some(record) = next.get_mut(id) {
            record.name = name.clone();
        }
    }
    (next, renames.len())
}

/// Grouping applied by [`auto_organize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeBy {
    /// `type-<ext>` from the name's extension, `type-folders` without one.
    Type,
    /// `size-unknown` on every record; listings carry no sizes.
    Size,
}

fn type_group(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        Some(_) => "misc".to_string(),
        None => "folders".to_string(),
    }
}

/// Tags records by group. With `Type`, only groups holding at least
/// `threshold` records are tagged. Returns the number of records changed.
pub fn auto_organize(tree: &Tree, group_by: OrganizeBy, threshold: usize) -> (Tree, usize) {
    let mut next = tree.clone();
    let assignments: Vec<(String, String)> = match group_by {
        OrganizeBy::Type => {
            let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for record in tree.records() {
                groups
                    .entry(type_group(&record.name))
                    .or_default()
                    .push(record.id.clone());
            }
            groups
                .into_iter()
                .filter(|(_, ids)| ids.len() >= threshold)
                .flat_map(|(group, ids)| {
                    let tag = format!("type-{group}");
                    ids.into_iter().map(move |id| (id, tag.clone()))
                })
                .collect()
        }
        OrganizeBy::Size => tree
            .records()
            .map(|record| (record.id.clone(), "size-unknown".to_string()))
            .collect(),
    };

    let mut changed = 0;
    for (id, tag) in &assignments {
        let needs_tag = next.get(id).is_some_and(|record| !record.has_tag(tag));
        if needs_tag {
            if let Some(record) = next.get_mut(id) {
                record.add_tag(tag);
                changed += 1;
            }
        }
    }
    (next, changed)
}

fn move_key(record: &FolderRecord) -> String {
    let key = scope_path::normalize(record.tree_path());
    if key.is_empty() {
        record.id.clone()
    } else {
        key
    }
}

/// Re-parents `drag_id` and every record below its path under `target_id`.
/// Returns the number of rewritten records; 0 when the move would create a
/// cycle or either record is missing.
pub fn move_record(tree: &Tree, drag_id: &str, target_id: &str) -> (Tree, usize) {
    let mut next = tree.clone();
    if drag_id == target_id {
        return (next, 0);
    }
    let (Some(drag), Some(target)) = (tree.get(drag_id), tree.get(target_id)) else {
        return (next, 0);
    };

    let drag_path = move_key(drag);
    let target_path = scope_path::normalize(target.tree_path());
    let descendant_prefix = format!("{drag_path}/");
    if target_path == drag_path || target_path.starts_with(&descendant_prefix) {
        return (next, 0);
    }

    let new_base = if target_path.is_empty() {
        drag.name.clone()
    } else {
        format!("{target_path}/{}", drag.name)
    };

    let mut moved = 0;
    for record in tree.records() {
        let path = move_key(record);
        let suffix = if record.id == drag_id || path == drag_path {
            ""
        } else if let Some(rest) = path.strip_prefix(&drag_path) {
            if !rest.starts_with('/') {
                continue;
            }
            rest
        } else {
            continue;
        };

        let updated = format!("{new_base}{suffix}");
        if record.path.as_deref() == Some(updated.as_str()) {
            continue;
        }
        if let Some(entry) = next.get_mut(&record.id) {
            entry.path = Some(updated);
            moved += 1;
        }
    }
    (next, moved)
}
