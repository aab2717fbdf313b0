//! Builds the single instruction sent to the model.

use serde::{Deserialize, Serialize};

use crate::document::DocumentContext;
use crate::schema::catalog::ActionCatalog;

/// Media type assumed for audio that arrives without one.
pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// A recorded voice command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_AUDIO_MIME)
            .to_string();
        Self { bytes, mime_type }
    }
}

/// What the user asked for: typed text or a voice recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Text(String),
    Audio(AudioClip),
}

impl UserInput {
    pub fn channel(&self) -> &'static str {
        match self {
            UserInput::Text(_) => "text",
            UserInput::Audio(_) => "audio",
        }
    }

    /// Short description for logs and the audit trail.
    pub fn summary(&self) -> String {
        match self {
            UserInput::Text(t) => t.clone(),
            UserInput::Audio(clip) => format!("<{} bytes of {}>", clip.bytes.len(), clip.mime_type),
        }
    }

    /// Blank text or empty audio cannot be translated.
    pub fn is_empty(&self) -> bool {
        match self {
            UserInput::Text(t) => t.trim().is_empty(),
            UserInput::Audio(clip) => clip.bytes.is_empty(),
        }
    }
}

/// Instruction text plus the optional audio attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub instruction: String,
    pub audio: Option<AudioClip>,
}

/// Deterministically compose the model instruction. Pure.
pub fn compose(catalog: &ActionCatalog, ctx: &DocumentContext, input: &UserInput) -> PromptPayload {
    let mut lines = vec![
        "You are an Excel assistant. Translate the user's request into spreadsheet actions."
            .to_string(),
        "Return ONLY a single JSON object of the form {\"actions\": [ ... ]}.".to_string(),
        "Do not wrap the JSON in markdown code fences and do not add any commentary.".to_string(),
        "Use only the action types listed below. Each action object carries its kind in \"type\"."
            .to_string(),
        "If an action should apply to the current selection, omit its address.".to_string(),
        "If the request cannot be expressed with these actions, return {\"actions\": []}."
            .to_string(),
        String::new(),
        catalog.render(),
        format!("Context: {}", ctx.describe()),
        String::new(),
    ];

    let audio = match input {
        UserInput::Text(text) => {
            lines.push(format!("User Request: \"{}\"", text.trim()));
            None
        }
        UserInput::Audio(clip) => {
            lines.push("User Voice Command (Audio Provided)".to_string());
            Some(clip.clone())
        }
    };

    lines.push(String::new());
    lines.push("JSON Response:".to_string());

    let instruction = lines.join("\n");
    tracing::debug!(
        channel = input.channel(),
        bytes = instruction.len(),
        "prompt composed"
    );
    PromptPayload { instruction, audio }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn ctx() -> DocumentContext {
        DocumentContext::new("Sheet1", "Sheet1!A1:B2")
    }

    #[test]
    fn text_prompt_layout() {
        let payload = compose(
            &ActionCatalog::builtin(),
            &ctx(),
            &UserInput::Text("make the header bold".into()),
        );
        let text = &payload.instruction;
        assert!(payload.audio.is_none());
        assert!(text.contains("{\"actions\": [ ... ]}"));
        assert!(text.contains("markdown"));
        assert!(text.contains("editCell"));
        assert!(text.contains("Context: Current Sheet: \"Sheet1\". Selected Range: \"Sheet1!A1:B2\""));
        assert!(text.ends_with("User Request: \"make the header bold\"\n\nJSON Response:"));
    }

    #[test]
    fn audio_prompt_carries_attachment() {
        let clip = AudioClip::new(vec![1, 2, 3], None);
        let payload = compose(&ActionCatalog::builtin(), &ctx(), &UserInput::Audio(clip));
        assert!(payload.instruction.contains("User Voice Command (Audio Provided)"));
        let audio = payload.audio.unwrap();
        assert_eq!(audio.mime_type, DEFAULT_AUDIO_MIME);
        assert_eq!(audio.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn compose_is_deterministic() {
        let input = UserInput::Text("sum column B".into());
        let a = compose(&ActionCatalog::builtin(), &ctx(), &input);
        let b = compose(&ActionCatalog::builtin(), &ctx(), &input);
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_context_is_stated() {
        let payload = compose(
            &ActionCatalog::builtin(),
            &DocumentContext::default(),
            &UserInput::Text("x".into()),
        );
        assert!(payload.instruction.contains("Context: No context provided"));
    }

    #[test]
    fn empty_inputs_are_detected() {
        assert!(UserInput::Text("   ".into()).is_empty());
        assert!(UserInput::Audio(AudioClip::new(Vec::new(), Some("audio/wav"))).is_empty());
        assert!(!UserInput::Text("hi".into()).is_empty());
    }
}
