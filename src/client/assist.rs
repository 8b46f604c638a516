//! Draft suggestions from an OpenAI-compatible chat completion endpoint.
//!
//! The model is asked for a strict JSON object, but replies routinely wrap
//! it in prose or code fences, so [`extract_json_object`] digs the first
//! balanced object out of the text before parsing. Suggested fields merge
//! into the draft instead of replacing it: an absent or empty field never
//! clobbers what the user already typed.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::categories::CategoryStore;
use crate::config::AssistConfig;
use crate::models::draft::PostDraft;

/// Per-request timeout for completion calls. Generation is slow but the
/// composer must not hang on a stuck provider.
pub const DEFAULT_ASSIST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_INSTRUCTION: &str = "You help write short winter sports posts. \
Reply with a single JSON object and nothing else. Allowed keys, all optional: \
\"title\" (string), \"description\" (string), \"categories\" (array of short \
strings), \"location\" (string). Omit any key you have no suggestion for.";

#[derive(Debug, Error)]
pub enum AssistError {
    #[error("reply contained no JSON object")]
    NoJsonObject,
    #[error("reply JSON did not parse: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("assist backend rejected the request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },
    #[error("assist backend unreachable: {0}")]
    Network(String),
    #[error("assist backend returned no reply")]
    EmptyReply,
}

/// Fields a reply may suggest. Older prompts had the model emit a single
/// `tag` instead of `categories`; parsing folds that in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

/// Slice out the first balanced `{...}` in `text`, skipping braces inside
/// JSON strings. Returns `None` when no complete object is present.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a raw model reply into suggestion fields.
pub fn parse_suggestion(reply: &str) -> Result<SuggestionFields, AssistError> {
    let json = extract_json_object(reply).ok_or(AssistError::NoJsonObject)?;
    let raw: RawSuggestion = serde_json::from_str(json)?;

    let mut fields = SuggestionFields {
        title: raw.title,
        description: raw.description,
        categories: raw.categories.unwrap_or_default(),
        location: raw.location,
    };
    if let Some(tag) = raw.tag {
        let tag = tag.trim();
        if !tag.is_empty() && !fields.categories.iter().any(|c| c.eq_ignore_ascii_case(tag)) {
            fields.categories.push(tag.to_string());
        }
    }
    Ok(fields)
}

/// Merge a suggestion into the draft. Only non-empty fields land; suggested
/// categories are routed through the store so they exist server-side (or at
/// least pending) before they join the selection.
pub async fn apply_suggestion(
    draft: &mut PostDraft,
    store: &mut CategoryStore,
    fields: SuggestionFields,
) {
    if let Some(title) = non_empty(fields.title) {
        draft.title = title;
    }
    if let Some(description) = non_empty(fields.description) {
        draft.content = description;
    }
    if let Some(location) = non_empty(fields.location) {
        draft.location = location;
    }
    for name in fields.categories {
        let canonical = store.ensure(&name).await;
        if !canonical.is_empty() {
            draft.categories.add(canonical);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AssistError>;
}

/// Chat-completions client for GLM and other OpenAI-compatible providers.
#[derive(Debug, Clone)]
pub struct OpenAiCompat {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

impl OpenAiCompat {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_ASSIST_TIMEOUT,
        }
    }

    pub fn from_config(config: &AssistConfig) -> Self {
        Self::new(&config.api_url, &config.api_key, &config.model)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AssistError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        };

        let response = self
            .http
            .post(format!(
                "{}/chat/completions",
                self.api_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| AssistError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(AssistError::UpstreamRejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| AssistError::Network(err.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(AssistError::EmptyReply)
    }
}

/// One-shot suggestion generator over a pluggable completion backend.
pub struct AiAssist {
    backend: Box<dyn CompletionBackend>,
}

impl AiAssist {
    pub fn new(backend: Box<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Ask the backend for suggestions given the user's brief and the
    /// current draft state.
    pub async fn generate(
        &self,
        brief: &str,
        draft: &PostDraft,
    ) -> Result<SuggestionFields, AssistError> {
        let user = draft_context(brief, draft);
        let reply = self.backend.complete(SYSTEM_INSTRUCTION, &user).await?;
        parse_suggestion(&reply)
    }
}

fn draft_context(brief: &str, draft: &PostDraft) -> String {
    let categories = draft.categories.names().join(", ");
    format!(
        "Request: {brief}\n\nCurrent draft:\ntitle: {}\ndescription: {}\ncategories: {}\nlocation: {}",
        field_or_marker(&draft.title),
        field_or_marker(&draft.content),
        if categories.is_empty() {
            "(none)"
        } else {
            categories.as_str()
        },
        field_or_marker(&draft.location),
    )
}

fn field_or_marker(value: &str) -> &str {
    if value.trim().is_empty() {
        "(empty)"
    } else {
        value
    }
}
