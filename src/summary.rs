use crate::core::settings::SummarySettings;
use crate::todo::types::ExportAll;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const SUMMARY_INSTRUCTION: &str = r#"You are a personal planning assistant. Below is a JSON export of my to-do lists, grouped into today, this week and this month.

Rules:
1. Summarize what is still open in each bucket and what has been finished
2. Point out anything overdue or worth doing first
3. Keep it short and use plain language
4. Output ONLY the summary, no preamble

To-do lists:
"#;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("No API key: environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("Failed to encode todos: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Summary request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Summary service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed summary response: {0}")]
    Malformed(String),
    #[error("Summary service returned an empty response")]
    Empty,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
///
/// Built once at startup and handed to whoever needs a summary.
pub struct Summarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

impl Summarizer {
    pub fn new(settings: &SummarySettings, api_key: Option<String>) -> Result<Self, SummaryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key_env: settings.api_key_env.clone(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    /// Reads the API key from the environment variable named in `settings`.
    pub fn from_env(settings: &SummarySettings) -> Result<Self, SummaryError> {
        let api_key = std::env::var(&settings.api_key_env).ok();
        if api_key.is_none() {
            tracing::info!(
                target: "summary",
                "{} is not set, summaries are unavailable",
                settings.api_key_env
            );
        }
        Self::new(settings, api_key)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Summarizes the exported to-do lists.
    pub async fn summarize(&self, export: &ExportAll) -> Result<String, SummaryError> {
        let json = serde_json::to_string_pretty(export)?;
        self.summarize_text(&json).await
    }

    /// Sends `text` with the summary instruction and returns the reply text.
    pub async fn summarize_text(&self, text: &str) -> Result<String, SummaryError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SummaryError::MissingApiKey(self.api_key_env.clone()))?;

        let url = endpoint(&self.base_url);
        tracing::info!(target: "summary", url = %url, model = %self.model, "Requesting summary");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&build_request(&self.model, text))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "summary", "Summary request failed: {}", e);
                SummaryError::Request(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(target: "summary", status = status.as_u16(), "Summary service returned an error");
            return Err(SummaryError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let summary = extract_content(&body)?;
        tracing::info!(target: "summary", chars = summary.chars().count(), "Summary received");
        Ok(summary)
    }
}

fn endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn build_request<'a>(model: &'a str, text: &str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: Some(format!("{}{}", SUMMARY_INSTRUCTION, text)),
        }],
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions response body.
fn extract_content(body: &str) -> Result<String, SummaryError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| SummaryError::Malformed(e.to_string()))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SummaryError::Malformed("response has no choices".to_string()))?;

    let content = choice.message.content.unwrap_or_default();
    let content = content.trim();
    if content.is_empty() {
        return Err(SummaryError::Empty);
    }

    Ok(content.to_string())
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        let truncated: String = value.chars().take(max_chars).collect();
        format!("{}...[truncated]", truncated)
    } else {
        value.to_string()
    }
}
