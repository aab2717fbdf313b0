//! Model provider abstraction: builds HTTP requests and normalizes replies
//! for Gemini, Anthropic and OpenAI-compatible APIs.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::AppError;
use crate::prompt::{AudioClip, PromptPayload};
use crate::settings::{LlmProvider, LlmProviderConfig};

const MAX_OUTPUT_TOKENS: u32 = 4096;
/// How much of a failing provider body is echoed into the error.
const ERROR_BODY_LIMIT: usize = 300;

/// One request in, one textual reply out. No streaming.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, payload: &PromptPayload) -> Result<String, AppError>;
}

/// Resolved provider details ready for making an API call.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub provider: LlmProvider,
}

impl ResolvedProvider {
    /// Resolve a provider config into concrete URL / key / model values.
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Config {
                message: format!(
                    "No API key configured. Set {} or write it to the credentials file.",
                    crate::settings::API_KEY_ENV
                ),
            })?
            .to_string();
        let model = config.model_or_default().to_string();
        let base = config.base_url.as_deref().map(|b| b.trim_end_matches('/'));

        let url = match config.provider {
            LlmProvider::Gemini => format!(
                "{}/models/{model}:generateContent",
                base.unwrap_or("https://generativelanguage.googleapis.com/v1beta")
            ),
            LlmProvider::Anthropic => format!(
                "{}/messages",
                base.unwrap_or("https://api.anthropic.com/v1")
            ),
            LlmProvider::OpenAiCompatible => format!(
                "{}/chat/completions",
                base.unwrap_or("https://api.openai.com/v1")
            ),
        };

        Ok(Self {
            url,
            api_key,
            model,
            provider: config.provider,
        })
    }
}

/// Build an HTTP request for the resolved provider.
pub fn build_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    payload: &PromptPayload,
) -> Result<reqwest::RequestBuilder, AppError> {
    if payload.audio.is_some() && !provider.provider.supports_audio() {
        return Err(AppError::Unsupported {
            message: format!("the {:?} provider does not accept audio input", provider.provider),
        });
    }
    match provider.provider {
        LlmProvider::Gemini => Ok(build_gemini_request(client, provider, payload)),
        LlmProvider::Anthropic => Ok(build_anthropic_request(client, provider, payload)),
        LlmProvider::OpenAiCompatible => build_openai_request(client, provider, payload),
    }
}

/// Extract the reply text from the provider's response JSON.
pub fn parse_response(provider: LlmProvider, json: &Value) -> Result<String, AppError> {
    match provider {
        LlmProvider::Gemini => parse_gemini_response(json),
        LlmProvider::Anthropic => parse_anthropic_response(json),
        LlmProvider::OpenAiCompatible => parse_openai_response(json),
    }
}

fn encode_audio(clip: &AudioClip) -> String {
    base64::engine::general_purpose::STANDARD.encode(&clip.bytes)
}

// ── Gemini ───────────────────────────────────────────────────────

fn build_gemini_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    payload: &PromptPayload,
) -> reqwest::RequestBuilder {
    let mut parts = vec![serde_json::json!({ "text": payload.instruction })];
    if let Some(clip) = &payload.audio {
        parts.push(serde_json::json!({
            "inlineData": {
                "mimeType": clip.mime_type,
                "data": encode_audio(clip),
            }
        }));
    }

    let body = serde_json::json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "maxOutputTokens": MAX_OUTPUT_TOKENS,
            "responseMimeType": "application/json",
        },
    });

    client
        .post(&provider.url)
        .header("x-goog-api-key", &provider.api_key)
        .header("content-type", "application/json")
        .json(&body)
}

fn parse_gemini_response(json: &Value) -> Result<String, AppError> {
    let candidate = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first());

    let Some(candidate) = candidate else {
        let reason = json
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        return Err(AppError::transport(format!("Gemini returned no reply ({reason})")));
    };

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    Ok(text)
}

// ── Anthropic ────────────────────────────────────────────────────

fn build_anthropic_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    payload: &PromptPayload,
) -> reqwest::RequestBuilder {
    let body = serde_json::json!({
        "model": provider.model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "messages": [{ "role": "user", "content": payload.instruction }],
    });

    client
        .post(&provider.url)
        .header("x-api-key", &provider.api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&body)
}

fn parse_anthropic_response(json: &Value) -> Result<String, AppError> {
    let blocks = json
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::transport("No content in Anthropic response"))?;
    Ok(blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect())
}

// ── OpenAI-compatible ────────────────────────────────────────────

/// `input_audio` only takes wav and mp3.
fn openai_audio_format(mime_type: &str) -> Option<&'static str> {
    match mime_type.split(';').next().unwrap_or("").trim() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        _ => None,
    }
}

fn build_openai_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    payload: &PromptPayload,
) -> Result<reqwest::RequestBuilder, AppError> {
    let content = match &payload.audio {
        None => Value::String(payload.instruction.clone()),
        Some(clip) => {
            let format = openai_audio_format(&clip.mime_type).ok_or_else(|| {
                AppError::Unsupported {
                    message: format!(
                        "the OpenAI-compatible provider accepts wav or mp3 audio, not {}",
                        clip.mime_type
                    ),
                }
            })?;
            serde_json::json!([
                { "type": "text", "text": payload.instruction },
                { "type": "input_audio", "input_audio": { "data": encode_audio(clip), "format": format } },
            ])
        }
    };

    let body = serde_json::json!({
        "model": provider.model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "messages": [{ "role": "user", "content": content }],
    });

    Ok(client
        .post(&provider.url)
        .header("Authorization", format!("Bearer {}", provider.api_key))
        .header("content-type", "application/json")
        .json(&body))
}

fn parse_openai_response(json: &Value) -> Result<String, AppError> {
    let choice = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or_else(|| AppError::transport("No choices in OpenAI response"))?;
    let message = choice
        .get("message")
        .ok_or_else(|| AppError::transport("No message in OpenAI choice"))?;
    Ok(message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string())
}

// ── HTTP client ──────────────────────────────────────────────────

/// [`ModelClient`] backed by a provider's HTTP API.
pub struct HttpModelClient {
    client: reqwest::Client,
    provider: ResolvedProvider,
}

impl HttpModelClient {
    pub fn new(config: &LlmProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        let provider = ResolvedProvider::from_config(config)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, provider })
    }

}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(&self, payload: &PromptPayload) -> Result<String, AppError> {
        let response = build_request(&self.client, &self.provider, payload)?
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            tracing::warn!(provider = ?self.provider.provider, %status, "model request failed");
            return Err(AppError::transport(format!("API error {status}: {snippet}")));
        }

        let json: Value = response.json().await?;
        let text = parse_response(self.provider.provider, &json)?;
        tracing::info!(
            provider = ?self.provider.provider,
            model = %self.provider.model,
            reply_len = text.len(),
            "model reply received"
        );
        Ok(text)
    }
}

// ── Scripted double ──────────────────────────────────────────────

/// Replays canned replies in order and records every payload it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, AppError>>>,
    seen: Mutex<Vec<PromptPayload>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, error: AppError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Every payload received so far, oldest first.
    pub fn payloads(&self) -> Vec<PromptPayload> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, payload: &PromptPayload) -> Result<String, AppError> {
        self.seen.lock().push(payload.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::transport("no scripted reply left")))
    }
}
