use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// The single filesystem action a generation reply may request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GenerateAction {
    CreateStructure {
        #[serde(default)]
        folders: Vec<String>,
        #[serde(default)]
        files: Vec<GeneratedFile>,
    },
    ModifyFile {
        path: String,
        content: String,
    },
    DeletePath {
        path: String,
    },
    MovePath {
        from: String,
        to: String,
    },
}

impl GenerateAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateStructure { .. } => "create_structure",
            Self::ModifyFile { .. } => "modify_file",
            Self::DeletePath { .. } => "delete_path",
            Self::MovePath { .. } => "move_path",
        }
    }
}
