use std::collections::BTreeMap;

use async_graphql::{ComplexObject, SimpleObject};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
#[graphql(complex)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub folders: Vec<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub tags: BTreeMap<String, Vec<String>>,
}

#[ComplexObject]
impl Template {
    /// Default tags per template path, in path order.
    async fn path_tags(&self) -> Vec<PathTags> {
        self.tags
            .iter()
            .map(|(path, tags)| PathTags {
                path: path.clone(),
                tags: tags.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
pub struct PathTags {
    pub path: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePreview {
    pub template_id: String,
    pub missing: Vec<String>,
    pub total: usize,
}
