use async_graphql::{InputObject, SimpleObject};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Conjunction of independent predicates; an unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSet {
    pub text: Option<String>,
    pub tags: Vec<String>,
    pub regex: Option<String>,
    pub modified_from: Option<NaiveDate>,
    pub modified_to: Option<NaiveDate>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty)
            && self.tags.is_empty()
            && self.regex.as_deref().map_or(true, str::is_empty)
            && self.modified_from.is_none()
            && self.modified_to.is_none()
    }
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct FilterInput {
    pub text: Option<String>,
    #[graphql(default)]
    pub tags: Vec<String>,
    pub regex: Option<String>,
    pub modified_from: Option<NaiveDate>,
    pub modified_to: Option<NaiveDate>,
}

impl From<FilterInput> for FilterSet {
    fn from(input: FilterInput) -> Self {
        Self {
            text: input.text,
            tags: input.tags,
            regex: input.regex,
            modified_from: input.modified_from,
            modified_to: input.modified_to,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, InputObject)]
#[serde(rename_all = "camelCase")]
pub struct RenamePattern {
    pub find: String,
    #[graphql(default)]
    pub replace: String,
    #[graphql(default)]
    pub use_regex: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_count_as_empty() {
        let filters = FilterSet {
            text: Some(String::new()),
            regex: Some(String::new()),
            ..Default::default()
        };
        assert!(filters.is_empty());
        let tagged = FilterSet {
            tags: vec!["work".to_string()],
            ..Default::default()
        };
        assert!(!tagged.is_empty());
    }
}
