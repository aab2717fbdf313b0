use serde::Serialize;
use thiserror::Error;

/// Structured error type for the application. Serialized with a `code` tag so
/// the task pane can match on error kinds instead of parsing strings.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "code", content = "detail")]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub enum AppError {
    /// A request or a single action had the wrong shape or an illegal value.
    #[error("{message}")]
    Validation { message: String },

    /// The model reply could not be read as `{ "actions": [...] }` at all.
    #[error("Failed to parse AI response: {message}")]
    MalformedResponse { message: String, raw: String },

    /// One or more actions failed against the live document.
    #[error("Errors during execution: {message}")]
    ActionExecution { message: String },

    /// The model provider or the command server could not be reached, or
    /// answered with a failure status.
    #[error("Request failed: {message}")]
    Transport { message: String },

    /// A translation cycle is already in flight for this session.
    #[error("A command is already being processed")]
    Busy,

    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        AppError::Transport {
            message: message.into(),
        }
    }

    /// The raw model reply, when this error carries one.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            AppError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Single line shown to the user. Never includes the raw reply.
    pub fn user_message(&self) -> String {
        format!("Error: {self}")
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io {
            message: e.to_string(),
        }
    }
}

impl From<crate::storage::StorageError> for AppError {
    fn from(e: crate::storage::StorageError) -> Self {
        match e {
            crate::storage::StorageError::Io(io_err) => AppError::Io {
                message: io_err.to_string(),
            },
            crate::storage::StorageError::Json(json_err) => AppError::Config {
                message: json_err.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            format!("timed out: {e}")
        } else {
            e.to_string()
        };
        AppError::Transport { message }
    }
}

/// Allow converting AppError to String for the CLI and HTTP error bodies.
impl From<AppError> for String {
    fn from(e: AppError) -> String {
        e.to_string()
    }
}
