use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;

use crate::models::filter::FilterSet;
use crate::models::folder::{FolderRecord, Tree, TreeStats};

struct CompiledFilter<'a> {
    text: Option<String>,
    tags: &'a [String],
    regex: Option<Regex>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl<'a> CompiledFilter<'a> {
    fn new(filters: &'a FilterSet) -> Self {
        let regex = filters
            .regex
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .and_then(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    tracing::debug!(%pattern, %err, "ignoring invalid filter regex");
                    None
                }
            });

        Self {
            text: filters
                .text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase),
            tags: &filters.tags,
            regex,
            from: filters.modified_from.map(start_of_day),
            to: filters.modified_to.map(end_of_day),
        }
    }

    fn matches(&self, record: &FolderRecord) -> bool {
        if let Some(term) = &self.text {
            let hit = record.name.to_lowercase().contains(term)
                || record.tags.iter().any(|tag| tag.to_lowercase().contains(term))
                || record
                    .path
                    .as_deref()
                    .is_some_and(|path| path.to_lowercase().contains(term));
            if !hit {
                return false;
            }
        }

        if let Some(regex) = &self.regex {
            let path = record.path.as_deref().unwrap_or("");
            if !regex.is_match(&record.name) && !regex.is_match(path) {
                return false;
            }
        }

        if !self.tags.iter().all(|tag| record.has_tag(tag)) {
            return false;
        }

        if self.from.is_some() || self.to.is_some() {
            let modified = record.modified_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            if self.from.is_some_and(|from| modified < from) {
                return false;
            }
            if self.to.is_some_and(|to| modified > to) {
                return false;
            }
        }

        true
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(end))
}

/// Subset of the tree matching every predicate. An invalid regex is skipped.
pub fn filter(tree: &Tree, filters: &FilterSet) -> Tree {
    if filters.is_empty() {
        return tree.clone();
    }
    let compiled = CompiledFilter::new(filters);
    Tree {
        items: tree
            .items
            .iter()
            .filter(|(_, record)| compiled.matches(record))
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect(),
    }
}

pub fn compute_stats(tree: &Tree, favorites: &BTreeSet<String>) -> TreeStats {
    let total_folders = tree.len();
    let tagged_folders = tree.records().filter(|r| !r.tags.is_empty()).count();
    let total_tags = tree.records().map(|r| r.tags.len()).sum();
    let favorited = favorites.iter().filter(|id| tree.contains(id)).count();
    let tag_percentage = if total_folders > 0 {
        ((tagged_folders as f64 / total_folders as f64) * 100.0).round() as u32
    } else {
        0
    };

    TreeStats {
        total_folders,
        tagged_folders,
        total_tags,
        favorited,
        tag_percentage,
    }
}
