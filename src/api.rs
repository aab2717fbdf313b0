//! HTTP endpoints for the task pane. Stateless between requests: every call
//! runs one translation cycle and returns the validated batch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Extension, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::audit::{self, CycleRecord};
use crate::document::DocumentContext;
use crate::error::AppError;
use crate::parser::{ParseWarning, ParsedBatch};
use crate::prompt::{AudioClip, UserInput};
use crate::schema::{catalog, ActionBatch};
use crate::translate::Translator;

pub const LIVENESS_TEXT: &str = "SheetSense Backend is running";

pub struct ApiState {
    translator: Translator,
    audit_dir: Option<PathBuf>,
    max_audio_bytes: usize,
}

impl ApiState {
    /// `audit_dir` is the app config directory; `None` disables the audit log.
    pub fn new(translator: Translator, audit_dir: Option<PathBuf>, max_audio_bytes: usize) -> Self {
        Self {
            translator,
            audit_dir,
            max_audio_bytes,
        }
    }
}

// ── Response types ───────────────────────────────────────────────

#[derive(Serialize)]
struct ApiOk<'a> {
    ok: bool,
    actions: &'a ActionBatch,
    warnings: &'a [ParseWarning],
}

#[derive(Serialize)]
struct ApiErr {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

fn ok_json(parsed: &ParsedBatch) -> Response {
    Json(ApiOk {
        ok: true,
        actions: &parsed.batch,
        warnings: &parsed.warnings,
    })
    .into_response()
}

fn err_json(err: &AppError) -> Response {
    let body = ApiErr {
        ok: false,
        error: err.to_string(),
        raw: err.raw_reply().map(str::to_string),
    };
    (status_for(err), Json(body)).into_response()
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::MalformedResponse { .. }
        | AppError::Transport { .. }
        | AppError::Unsupported { .. } => StatusCode::BAD_GATEWAY,
        AppError::Busy => StatusCode::TOO_MANY_REQUESTS,
        AppError::ActionExecution { .. } | AppError::Config { .. } | AppError::Io { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ── Cycle ────────────────────────────────────────────────────────

async fn run_cycle(state: &ApiState, ctx: &DocumentContext, input: &UserInput) -> Response {
    let started = Instant::now();
    let result = state.translator.translate(ctx, input).await;

    if let Some(dir) = &state.audit_dir {
        let error_text = result.as_ref().err().map(ToString::to_string);
        let request = input.summary();
        audit::log_cycle(
            dir,
            &CycleRecord {
                channel: input.channel(),
                request: &request,
                result: match &result {
                    Ok(parsed) => Ok((parsed.batch.len(), parsed.warnings.len())),
                    Err(_) => Err(error_text.as_deref().unwrap_or_default()),
                },
                duration: started.elapsed(),
            },
        );
    }

    match result {
        Ok(parsed) => {
            tracing::info!(
                channel = input.channel(),
                actions = parsed.batch.len(),
                warnings = parsed.warnings.len(),
                "cycle served"
            );
            ok_json(&parsed)
        }
        Err(e) => {
            tracing::warn!(channel = input.channel(), "cycle failed: {e}");
            err_json(&e)
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    context: DocumentContext,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceQuery {
    active_sheet: Option<String>,
    selection: Option<String>,
}

async fn get_root() -> &'static str {
    LIVENESS_TEXT
}

async fn get_schema() -> impl IntoResponse {
    Json(catalog::to_json_schema())
}

async fn post_chat(
    Extension(state): Extension<Arc<ApiState>>,
    Json(body): Json<ChatBody>,
) -> Response {
    run_cycle(&state, &body.context, &UserInput::Text(body.message)).await
}

async fn post_voice(
    Extension(state): Extension<Arc<ApiState>>,
    Query(query): Query<VoiceQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if !mime.starts_with("audio/") {
        return err_json(&AppError::validation(format!(
            "Expected an audio/* content type, got '{mime}'"
        )));
    }

    let ctx = DocumentContext {
        active_sheet: query.active_sheet.filter(|s| !s.is_empty()),
        selection: query.selection.filter(|s| !s.is_empty()),
    };
    let input = UserInput::Audio(AudioClip::new(body.to_vec(), Some(mime)));
    run_cycle(&state, &ctx, &input).await
}

// ── Server startup ───────────────────────────────────────────────

pub fn router(state: Arc<ApiState>) -> Router {
    let limit = state.max_audio_bytes;
    Router::new()
        .route("/", get(get_root))
        .route("/api/schema", get(get_schema))
        .route("/api/chat", post(post_chat))
        .route(
            "/api/voice",
            post(post_voice).layer(DefaultBodyLimit::max(limit)),
        )
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

/// Bind `host:port`. `host` may be a name such as `localhost`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, AppError> {
    TcpListener::bind((host, port)).await.map_err(|e| AppError::Config {
        message: format!("cannot bind {host}:{port}: {e}"),
    })
}

/// Serve on `listener` until the process exits.
pub async fn serve(state: Arc<ApiState>, listener: TcpListener) -> Result<(), AppError> {
    let local = listener.local_addr()?;
    tracing::info!("API server listening on http://{local}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(model: Arc<ScriptedModel>, audit_dir: Option<PathBuf>) -> Router {
        router(Arc::new(ApiState::new(Translator::new(model), audit_dir, 64)))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn chat(body: &Value) -> Request<Body> {
        Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn bind_resolves_host_names() {
        let listener = bind("localhost", 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
        assert!(matches!(
            bind("no such host", 0).await,
            Err(AppError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let resp = app(Arc::new(ScriptedModel::default()), None)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], LIVENESS_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn schema_lists_every_kind() {
        let (status, body) = send(
            app(Arc::new(ScriptedModel::default()), None),
            Request::get("/api/schema").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, catalog::to_json_schema());
    }

    #[tokio::test]
    async fn chat_returns_actions_and_warnings() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"actions":[{"type":"addWorksheet","name":"Q3"},{"type":"teleport"}]}"#,
        ]));
        let (status, body) = send(
            app(model.clone(), None),
            chat(&json!({
                "message": "add a sheet",
                "context": { "activeSheet": "Sheet1", "selection": "Sheet1!B2" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["actions"][0]["type"], "addWorksheet");
        assert_eq!(body["warnings"][0]["rawType"], "teleport");
        assert!(model.payloads()[0]
            .instruction
            .contains("Selected Range: \"Sheet1!B2\""));
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        let model = Arc::new(ScriptedModel::default());
        let (status, body) = send(app(model.clone(), None), chat(&json!({ "message": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Message is required");
        assert!(model.payloads().is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_is_bad_gateway_with_raw() {
        let model = Arc::new(ScriptedModel::new(["{not valid json"]));
        let (status, body) = send(app(model, None), chat(&json!({ "message": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["raw"], "{not valid json");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to parse AI response"));
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let model = Arc::new(ScriptedModel::default());
        model.push_error(AppError::transport("API error 500: boom"));
        let (status, body) = send(app(model, None), chat(&json!({ "message": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.get("raw").is_none());
    }

    #[tokio::test]
    async fn voice_reads_context_from_query() {
        let model = Arc::new(ScriptedModel::new([r#"{"actions":[]}"#]));
        let req = Request::post("/api/voice?activeSheet=Data&selection=Data!A1:B2")
            .header(header::CONTENT_TYPE, "audio/ogg")
            .body(Body::from(vec![1u8, 2, 3]))
            .unwrap();
        let (status, body) = send(app(model.clone(), None), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["actions"], json!([]));
        let sent = &model.payloads()[0];
        assert!(sent.instruction.contains("Current Sheet: \"Data\""));
        let clip = sent.audio.as_ref().unwrap();
        assert_eq!(clip.mime_type, "audio/ogg");
        assert_eq!(clip.bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn voice_rejects_non_audio_and_empty_bodies() {
        let model = Arc::new(ScriptedModel::default());
        let wrong_type = Request::post("/api/voice")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let (status, _) = send(app(model.clone(), None), wrong_type).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let empty = Request::post("/api/voice")
            .header(header::CONTENT_TYPE, "audio/webm")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(model.clone(), None), empty).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No audio provided");
        assert!(model.payloads().is_empty());
    }

    #[tokio::test]
    async fn oversized_audio_is_rejected() {
        let model = Arc::new(ScriptedModel::default());
        let req = Request::post("/api/voice")
            .header(header::CONTENT_TYPE, "audio/webm")
            .body(Body::from(vec![0u8; 65]))
            .unwrap();
        let resp = app(model, None).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn served_cycles_are_audited() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new([r#"{"actions":[]}"#]));
        let (status, _) = send(
            app(model, Some(dir.path().to_path_buf())),
            chat(&json!({ "message": "nothing" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let logs = crate::paths::logs_dir(dir.path());
        let files: Vec<_> = std::fs::read_dir(logs).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let text = std::fs::read_to_string(path).unwrap();
        let line: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(line["request"], "nothing");
        assert_eq!(line["ok"], true);
    }
}
