//! Turns the model's raw reply into an [`ActionBatch`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::schema::validation::{validate, ValidationError};
use crate::schema::{ActionBatch, ActionKind};

/// A raw action that failed validation and was dropped from the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    /// Position in the reply's `actions` array.
    pub index: usize,
    /// The `type` string, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_type: Option<String>,
    pub message: String,
}

impl ParseWarning {
    fn from_validation(index: usize, raw: &Value, err: &ValidationError) -> Self {
        let raw_type = err
            .kind()
            .map(|k: ActionKind| k.name().to_string())
            .or_else(|| raw.get("type").and_then(Value::as_str).map(str::to_string));
        Self {
            index,
            raw_type,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedBatch {
    pub batch: ActionBatch,
    pub warnings: Vec<ParseWarning>,
}

const FENCE: &str = "```";

/// Remove a markdown code fence around the reply: an opening ```` ``` ````
/// with an optional language tag, and a closing ```` ``` ````, whether or not
/// they sit on their own lines.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        text = rest.get(tag_len..).unwrap_or_default().trim_start();
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest.trim_end();
    }
    text.to_string()
}

/// Parse a reply into a batch, dropping invalid actions as warnings.
///
/// Fails with `MalformedResponse` (raw text attached) when the reply is not
/// JSON or has no `actions` array. An empty `actions` array is a valid,
/// empty batch.
pub fn parse_response(raw: &str) -> Result<ParsedBatch, AppError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| AppError::MalformedResponse {
        message: e.to_string(),
        raw: raw.to_string(),
    })?;
    let parsed = parse_value(&value).map_err(|message| AppError::MalformedResponse {
        message,
        raw: raw.to_string(),
    })?;
    tracing::debug!(raw, "model reply");
    Ok(parsed)
}

/// Validate an already-decoded `{ "actions": [...] }` object.
pub fn parse_value(value: &Value) -> Result<ParsedBatch, String> {
    let Some(obj) = value.as_object() else {
        return Err("reply is not a JSON object".to_string());
    };
    let Some(actions) = obj.get("actions") else {
        return Err("reply has no \"actions\" field".to_string());
    };
    let Some(items) = actions.as_array() else {
        return Err("\"actions\" is not an array".to_string());
    };
    Ok(validate_all(items))
}

/// Validate each element independently, keeping order.
pub fn validate_all(items: &[Value]) -> ParsedBatch {
    let mut actions = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match validate(item) {
            Ok(action) => actions.push(action),
            Err(err) => {
                let warning = ParseWarning::from_validation(index, item, &err);
                tracing::warn!(index, "dropping invalid action: {}", warning.message);
                warnings.push(warning);
            }
        }
    }
    ParsedBatch {
        batch: ActionBatch::new(actions),
        warnings,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::schema::params::FreezeAxis;
    use crate::schema::Action;

    #[test]
    fn fenced_reply_with_language_tag() {
        let raw = "```json\n{\"actions\":[{\"type\":\"addWorksheet\",\"name\":\"Q3\"}]}\n```";
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.batch.len(), 1);
        match parsed.batch.get(0).unwrap() {
            Action::AddWorksheet(p) => assert_eq!(p.name, "Q3"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn fenced_and_bare_replies_parse_identically() {
        let bare = r#"{"actions":[{"type":"freezePanes","axis":"Row","count":2},{"type":"editCell","address":"A1","values":[["x"]]}]}"#;
        let plain_fence = format!("```\n{bare}\n```");
        let tagged_fence = format!("```json\n{bare}\n```");
        assert_eq!(strip_code_fences(&plain_fence), bare);
        assert_eq!(strip_code_fences(&tagged_fence), bare);
        let a = parse_response(bare).unwrap();
        assert_eq!(parse_response(&plain_fence).unwrap(), a);
        assert_eq!(parse_response(&tagged_fence).unwrap(), a);
    }

    #[test]
    fn fence_on_the_json_line_is_stripped() {
        let bare = r#"{"actions":[{"type":"addWorksheet","name":"Q3"}]}"#;
        let closing_inline = format!("```json\n{bare}```");
        let single_line = format!("```json{bare}```");
        let spaced = format!("```json {bare} ```");
        for reply in [&closing_inline, &single_line, &spaced] {
            assert_eq!(strip_code_fences(reply), bare, "reply: {reply}");
            assert_eq!(parse_response(reply).unwrap().batch.len(), 1);
        }
    }

    #[test]
    fn chart_type_null_and_lowercase_color_survive_parsing() {
        let raw = r##"{"actions":[
            {"type":"createChart","dataRange":"A1:B5","chartType":null},
            {"type":"formatRange","address":"A1","format":{"fill":"#ff0000"}}
        ]}"##;
        let parsed = parse_response(raw).unwrap();
        assert!(parsed.warnings.is_empty());
        let back = serde_json::to_value(&parsed.batch).unwrap();
        assert_eq!(back[0]["chartType"], "ColumnClustered");
        assert_eq!(back[1]["format"]["fill"], "#ff0000");
    }

    #[test]
    fn malformed_json_keeps_raw() {
        let err = parse_response("{not valid json").unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse { .. }));
        assert_eq!(err.raw_reply(), Some("{not valid json"));
    }

    #[test]
    fn missing_or_non_array_actions_is_malformed() {
        assert!(matches!(
            parse_response(r#"{"result": []}"#),
            Err(AppError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_response(r#"{"actions": {"type": "editCell"}}"#),
            Err(AppError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_response("[]"),
            Err(AppError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn empty_actions_is_a_valid_empty_batch() {
        let parsed = parse_response(r#"{"actions": []}"#).unwrap();
        assert!(parsed.batch.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn invalid_actions_are_dropped_with_warnings() {
        let raw = r##"{"actions":[
            {"type":"freezePanes","axis":"Row","count":1},
            {"type":"formatRange","address":"A1:A1","format":{"fill":"not-a-color"}},
            {"type":"teleport"}
        ]}"##;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.batch.len(), 1);
        match parsed.batch.get(0).unwrap() {
            Action::FreezePanes(p) => {
                assert_eq!(p.axis, FreezeAxis::Row);
                assert_eq!(p.count, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(parsed.warnings.len(), 2);
        assert_eq!(parsed.warnings[0].index, 1);
        assert_eq!(parsed.warnings[0].raw_type.as_deref(), Some("formatRange"));
        assert_eq!(parsed.warnings[1].raw_type.as_deref(), Some("teleport"));
    }

    #[test]
    fn preserves_length_and_fields_for_valid_replies() {
        let raw = r##"{"actions":[
            {"type":"editCell","address":"B2","values":[[1,"a",true,null]],"isFormula":false},
            {"type":"formatRange","address":"B2:E2","format":{"bold":true,"fill":"#00FF00","columnWidth":"AutoFit"}},
            {"type":"createChart","dataRange":"A1:B5","chartType":"Pie","title":"Share"}
        ]}"##;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.batch.len(), 3);
        let back = serde_json::to_value(&parsed.batch).unwrap();
        assert_eq!(back[0]["values"][0][1], "a");
        assert_eq!(back[1]["format"]["fill"], "#00FF00");
        assert_eq!(back[1]["format"]["columnWidth"], "AutoFit");
        assert_eq!(back[2]["chartType"], "Pie");
        assert_eq!(back[2]["title"], "Share");
    }
}
