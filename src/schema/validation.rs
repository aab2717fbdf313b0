//! Per-action validation of untrusted model output.
//!
//! Each raw JSON object is checked for a known `type` tag, decoded into its
//! typed params, then run through the domain checks serde cannot express
//! (rectangular grids, positive sizes, non-blank names). Unknown extra fields
//! are ignored.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::params::{CellValue, FormatSpec};
use super::{Action, ActionKind};

/// Why a single raw action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "detail")]
pub enum ValidationError {
    #[error("action is not a JSON object")]
    NotAnObject,
    #[error("action has no \"type\" string")]
    MissingType,
    #[error("unknown action type '{0}'")]
    UnknownType(String),
    #[error("{kind}: {message}")]
    InvalidField { kind: ActionKind, message: String },
}

impl ValidationError {
    /// The action kind, when the tag was recognized.
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            ValidationError::InvalidField { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Validate one raw action object.
pub fn validate(raw: &Value) -> Result<Action, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;
    let tag = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingType)?;
    let kind =
        ActionKind::from_name(tag).ok_or_else(|| ValidationError::UnknownType(tag.to_string()))?;

    let action: Action =
        serde_json::from_value(raw.clone()).map_err(|e| ValidationError::InvalidField {
            kind,
            message: e.to_string(),
        })?;

    check_action(&action).map_err(|message| ValidationError::InvalidField { kind, message })?;
    Ok(action)
}

fn check_action(action: &Action) -> Result<(), String> {
    match action {
        Action::EditCell(p) => {
            validate_optional_text(p.address.as_deref(), "address")?;
            validate_grid(&p.values)
        }
        Action::FormatRange(p) => {
            validate_optional_text(p.address.as_deref(), "address")?;
            validate_format(&p.format)
        }
        Action::CreateTable(p) => {
            validate_optional_text(p.address.as_deref(), "address")?;
            validate_optional_text(p.name.as_deref(), "name")
        }
        Action::CreateChart(p) => validate_optional_text(p.data_range.as_deref(), "dataRange"),
        Action::AddWorksheet(p) => validate_text(&p.name, "name"),
        Action::FreezePanes(p) => {
            if p.count == 0 {
                Err("count must be at least 1".to_string())
            } else {
                Ok(())
            }
        }
    }
}

/// A present string field must contain something besides whitespace.
pub fn validate_text(value: &str, name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{name} must not be blank"))
    } else {
        Ok(())
    }
}

fn validate_optional_text(value: Option<&str>, name: &str) -> Result<(), String> {
    value.map_or(Ok(()), |v| validate_text(v, name))
}

/// Validate that a value is finite and positive.
pub fn validate_positive_finite(value: f64, name: &str) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{name} must be finite"));
    }
    if value <= 0.0 {
        return Err(format!("{name} must be positive"));
    }
    Ok(())
}

/// Grids must be non-empty and rectangular.
pub fn validate_grid(values: &[Vec<CellValue>]) -> Result<(), String> {
    let Some(first) = values.first() else {
        return Err("values must contain at least one row".to_string());
    };
    let width = first.len();
    if width == 0 {
        return Err("values rows must not be empty".to_string());
    }
    if let Some((i, row)) = values.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(format!(
            "values must be rectangular: row {i} has {} cells, expected {width}",
            row.len()
        ));
    }
    Ok(())
}

fn validate_format(format: &FormatSpec) -> Result<(), String> {
    if let Some(size) = format.font_size {
        validate_positive_finite(size, "fontSize")?;
    }
    if let Some(pattern) = &format.number_format {
        validate_text(pattern, "numberFormat")?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::schema::params::{ChartKind, SeriesBy};
    use serde_json::json;

    #[test]
    fn accepts_minimal_edit_cell() {
        let action = validate(&json!({ "type": "editCell", "values": [[1, 2], [3, 4]] })).unwrap();
        assert_eq!(action.kind(), ActionKind::EditCell);
    }

    #[test]
    fn ignores_unknown_fields() {
        let action = validate(&json!({
            "type": "addWorksheet",
            "name": "Summary",
            "confidence": 0.9
        }))
        .unwrap();
        assert_eq!(action.kind(), ActionKind::AddWorksheet);
    }

    #[test]
    fn rejects_non_object_and_missing_tag() {
        assert_eq!(validate(&json!("editCell")), Err(ValidationError::NotAnObject));
        assert_eq!(validate(&json!({ "values": [[1]] })), Err(ValidationError::MissingType));
        assert_eq!(validate(&json!({ "type": 7 })), Err(ValidationError::MissingType));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = validate(&json!({ "type": "deleteSheet", "name": "X" })).unwrap_err();
        assert_eq!(err, ValidationError::UnknownType("deleteSheet".into()));
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn rejects_ragged_grid() {
        let err = validate(&json!({ "type": "editCell", "values": [[1, 2], [3]] })).unwrap_err();
        assert_eq!(err.kind(), Some(ActionKind::EditCell));
        assert!(err.to_string().contains("rectangular"));
    }

    #[test]
    fn rejects_empty_grid() {
        assert!(validate(&json!({ "type": "editCell", "values": [] })).is_err());
        assert!(validate(&json!({ "type": "editCell", "values": [[]] })).is_err());
    }

    #[test]
    fn rejects_bad_color() {
        let err = validate(&json!({
            "type": "formatRange",
            "address": "A1:D1",
            "format": { "fill": "not-a-color" }
        }))
        .unwrap_err();
        assert_eq!(err.kind(), Some(ActionKind::FormatRange));
    }

    #[test]
    fn rejects_non_positive_font_size() {
        let err = validate(&json!({
            "type": "formatRange",
            "format": { "fontSize": 0 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("fontSize must be positive"));
    }

    #[test]
    fn rejects_zero_freeze_count() {
        assert!(validate(&json!({ "type": "freezePanes", "axis": "Row", "count": 0 })).is_err());
        let ok = validate(&json!({ "type": "freezePanes", "axis": "Column" })).unwrap();
        let Action::FreezePanes(p) = ok else {
            panic!("wrong variant")
        };
        assert_eq!(p.count, 1);
    }

    #[test]
    fn rejects_blank_worksheet_name() {
        assert!(validate(&json!({ "type": "addWorksheet", "name": "   " })).is_err());
        assert!(validate(&json!({ "type": "addWorksheet" })).is_err());
    }

    #[test]
    fn unknown_chart_type_is_not_an_error() {
        let action = validate(&json!({
            "type": "createChart",
            "dataRange": "A1:B5",
            "chartType": "Scatter"
        }))
        .unwrap();
        let Action::CreateChart(p) = action else {
            panic!("wrong variant")
        };
        assert_eq!(p.chart_type, ChartKind::ColumnClustered);
        assert_eq!(p.series_by, SeriesBy::Auto);
    }
}
