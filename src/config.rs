use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

const DEFAULT_PORT: u16 = 4010;
const DEFAULT_CLASSIFY_DELAY_MS: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
    #[error("could not resolve a data directory; set FOLDERTREE_DATA_DIR")]
    NoDataDir,
}

/// Runtime configuration read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub ollama_url: String,
    pub model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub classify_delay: Duration,
    pub generate_base: PathBuf,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        let data_dir = match var("FOLDERTREE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("com", "FolderTree", "foldertree")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or(ConfigError::NoDataDir)?,
        };

        let classify_delay = var("FOLDERTREE_CLASSIFY_DELAY_MS")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_CLASSIFY_DELAY_MS);

        let generate_base = var("FOLDERTREE_GENERATE_BASE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("generated"));

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            ollama_url: var("OLLAMA_URL").unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: var("FOLDERTREE_MODEL").unwrap_or_else(|| "mistral".to_string()),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            classify_delay: Duration::from_millis(classify_delay),
            generate_base,
            data_dir,
            cors_origins,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("foldertree.db")
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.data_dir.join("trash")
    }
}
