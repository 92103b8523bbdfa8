use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

const LOCAL_DELIMITERS: &[char] = &[',', ';', '\n'];
const REMOTE_DELIMITERS: &[char] = &[',', '\n'];
const QUOTE_CHARS: &[char] = &['"', '\'', '`'];

pub fn build_classify_prompt(content: &str) -> String {
    format!("Generate 3 short tags for this folder, comma separated: {content}")
}

/// Splits a model reply into tags: trimmed, unquoted, empties dropped.
pub fn parse_tags(raw: &str, delimiters: &[char]) -> Vec<String> {
    raw.split(delimiters)
        .map(|tag| tag.trim().replace(QUOTE_CHARS, "").trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Keyword tags used when the model cannot be reached.
pub fn fallback_tags(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut tags = vec!["document".to_string(), "file".to_string()];
    if lower.contains("image") {
        tags.push("image".to_string());
    }
    if lower.contains("video") {
        tags.push("video".to_string());
    }
    if lower.contains("music") || lower.contains("audio") {
        tags.push("audio".to_string());
    }
    tags
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn chat_content(response: ChatResponse) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::Classification("empty completion".to_string()))
}

#[derive(Debug, Clone)]
struct RemoteBackend {
    api_key: String,
    base_url: String,
    model: String,
}

/// HTTP client for the local generate endpoint and the optional
/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone)]
pub struct ClassifyClient {
    http: reqwest::Client,
    ollama_url: String,
    model: String,
    remote: Option<RemoteBackend>,
}

impl ClassifyClient {
    pub fn new(config: &AppConfig) -> Self {
        let remote = config.openai_api_key.as_ref().map(|key| RemoteBackend {
            api_key: key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
        });
        Self {
            http: reqwest::Client::new(),
            ollama_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            remote,
        }
    }

    /// Sends a raw prompt to the local model and returns its text reply.
    pub async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.ollama_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let response: GenerateResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(chars = response.response.len(), "local model replied");
        Ok(response.response)
    }

    pub async fn classify(&self, content: &str) -> Result<Vec<String>, AppError> {
        let reply = self.complete(&build_classify_prompt(content)).await?;
        Ok(parse_tags(&reply, LOCAL_DELIMITERS))
    }

    pub async fn classify_remote(&self, content: &str) -> Result<Vec<String>, AppError> {
        let remote = self.remote.as_ref().ok_or_else(|| {
            AppError::Classification("OPENAI_API_KEY is not configured".to_string())
        })?;
        let prompt = build_classify_prompt(content);
        let body = ChatRequest {
            model: &remote.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };
        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", remote.base_url))
            .bearer_auth(&remote.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_tags(&chat_content(response)?, REMOTE_DELIMITERS))
    }

    /// Local classification that degrades to keyword tags on any failure.
    pub async fn classify_or_fallback(&self, content: &str) -> Vec<String> {
        match self.classify(content).await {
            Ok(tags) if !tags.is_empty() => tags,
            Ok(_) => fallback_tags(content),
            Err(err) => {
                tracing::warn!(%err, "classification failed, using fallback tags");
                fallback_tags(content)
            }
        }
    }
}

/// Classifies `(id, content)` pairs one at a time, sleeping `delay` between
/// requests. Returns how many items were processed.
pub async fn classify_sequentially<C, Fut, F>(
    items: Vec<(String, String)>,
    delay: Duration,
    classify: C,
    mut on_result: F,
) -> usize
where
    C: Fn(String) -> Fut,
    Fut: Future<Output = Vec<String>>,
    F: FnMut(&str, Vec<String>),
{
    let total = items.len();
    for (index, (id, content)) in items.into_iter().enumerate() {
        let tags = classify(content).await;
        on_result(&id, tags);
        if index + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    total
}
