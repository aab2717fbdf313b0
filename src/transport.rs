//! Where a submitted command gets translated: in-process or on a command
//! server reached over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::document::DocumentContext;
use crate::error::AppError;
use crate::parser::{parse_value, ParseWarning, ParsedBatch};
use crate::prompt::UserInput;
use crate::translate::Translator;

#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn submit(&self, ctx: &DocumentContext, input: &UserInput) -> Result<ParsedBatch, AppError>;
}

#[async_trait]
impl CommandTransport for Translator {
    async fn submit(&self, ctx: &DocumentContext, input: &UserInput) -> Result<ParsedBatch, AppError> {
        self.translate(ctx, input).await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    context: &'a DocumentContext,
}

/// Client for the `/api/chat` and `/api/voice` endpoints.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Re-validate a server reply locally. Server-side warnings are kept ahead of
/// any produced here.
fn read_reply(body: &Value) -> Result<ParsedBatch, AppError> {
    let mut parsed = parse_value(body).map_err(|message| AppError::MalformedResponse {
        message,
        raw: body.to_string(),
    })?;
    let server_warnings: Vec<ParseWarning> = body
        .get("warnings")
        .cloned()
        .and_then(|w| serde_json::from_value(w).ok())
        .unwrap_or_default();
    if !server_warnings.is_empty() {
        let local = std::mem::take(&mut parsed.warnings);
        parsed.warnings = server_warnings.into_iter().chain(local).collect();
    }
    Ok(parsed)
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn submit(&self, ctx: &DocumentContext, input: &UserInput) -> Result<ParsedBatch, AppError> {
        let request = match input {
            UserInput::Text(message) => self.client.post(self.url("/api/chat")).json(&ChatRequest {
                message,
                context: ctx,
            }),
            UserInput::Audio(clip) => {
                let mut query: Vec<(&str, &str)> = Vec::new();
                if let Some(sheet) = ctx.active_sheet.as_deref() {
                    query.push(("activeSheet", sheet));
                }
                if let Some(selection) = ctx.selection.as_deref() {
                    query.push(("selection", selection));
                }
                self.client
                    .post(self.url("/api/voice"))
                    .query(&query)
                    .header(reqwest::header::CONTENT_TYPE, clip.mime_type.as_str())
                    .body(clip.bytes.clone())
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(|b| b.get("error"))
                .and_then(Value::as_str)
                .map_or_else(|| format!("Server Error: {status}"), str::to_string);
            tracing::warn!(%status, "command server rejected request: {message}");
            return Err(AppError::Transport { message });
        }

        let body = body.ok_or_else(|| AppError::MalformedResponse {
            message: "server reply is not JSON".to_string(),
            raw: text.clone(),
        })?;
        read_reply(&body)
    }
}
