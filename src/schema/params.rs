use schemars::gen::SchemaGenerator;
use schemars::schema::{
    InstanceType, Metadata, NumberValidation, Schema, SchemaObject, StringValidation,
    SubschemaValidation,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_freeze_count() -> u32 {
    1
}

// ── Scalar domains ──────────────────────────────────────────────

/// One cell's literal content in an `editCell` grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Text as the host would display it; used for auto-fit sizing.
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(t) => t.clone(),
        }
    }
}

/// `#RGB` or `#RRGGBB`, stored exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

pub const HEX_COLOR_PATTERN: &str = "^#([0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$";

impl HexColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let digits = value.strip_prefix('#').unwrap_or("");
        let ok = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
        if ok {
            Ok(Self(value))
        } else {
            Err(format!("'{value}' is not a hex color (expected #RGB or #RRGGBB)"))
        }
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> String {
        c.0
    }
}

impl JsonSchema for HexColor {
    fn schema_name() -> String {
        "HexColor".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            string: Some(Box::new(StringValidation {
                pattern: Some(HEX_COLOR_PATTERN.to_string()),
                ..Default::default()
            })),
            metadata: Some(Box::new(Metadata {
                description: Some("Hex color, e.g. \"#FF0000\"".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

/// Either a literal width in points or the auto-fit sentinel.
///
/// On the wire: a positive number, or the string `"AutoFit"` (`"auto-fit"`
/// and other casings are accepted on input).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawColumnWidth", into = "RawColumnWidth")]
pub enum ColumnWidth {
    AutoFit,
    Points(f64),
}

pub const AUTO_FIT: &str = "AutoFit";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawColumnWidth {
    Number(f64),
    Text(String),
}

impl TryFrom<RawColumnWidth> for ColumnWidth {
    type Error = String;

    fn try_from(raw: RawColumnWidth) -> Result<Self, Self::Error> {
        match raw {
            RawColumnWidth::Number(n) if n.is_finite() && n > 0.0 => Ok(ColumnWidth::Points(n)),
            RawColumnWidth::Number(n) => Err(format!("column width {n} must be a positive number")),
            RawColumnWidth::Text(t) => {
                let normalized: String = t
                    .chars()
                    .filter(|c| !matches!(c, '-' | '_' | ' '))
                    .collect::<String>()
                    .to_ascii_lowercase();
                if normalized == "autofit" {
                    Ok(ColumnWidth::AutoFit)
                } else {
                    Err(format!("column width '{t}' must be a number or \"{AUTO_FIT}\""))
                }
            }
        }
    }
}

impl From<ColumnWidth> for RawColumnWidth {
    fn from(w: ColumnWidth) -> Self {
        match w {
            ColumnWidth::AutoFit => RawColumnWidth::Text(AUTO_FIT.to_string()),
            ColumnWidth::Points(n) => RawColumnWidth::Number(n),
        }
    }
}

impl JsonSchema for ColumnWidth {
    fn schema_name() -> String {
        "ColumnWidth".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let auto_fit = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(vec![serde_json::Value::String(AUTO_FIT.to_string())]),
            ..Default::default()
        };
        let points = SchemaObject {
            instance_type: Some(InstanceType::Number.into()),
            number: Some(Box::new(NumberValidation {
                exclusive_minimum: Some(0.0),
                ..Default::default()
            })),
            ..Default::default()
        };
        SchemaObject {
            subschemas: Some(Box::new(SubschemaValidation {
                one_of: Some(vec![auto_fit.into(), points.into()]),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

/// The four chart kinds the executor can materialize.
///
/// Deserialization is lenient: `ColumnClustered`/`Column`, `Line`, `Pie` and
/// `BarClustered`/`Bar` map case-sensitively; any other value, including
/// `null` and non-strings, becomes `ColumnClustered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(from = "Option<serde_json::Value>")]
pub enum ChartKind {
    #[default]
    ColumnClustered,
    Line,
    Pie,
    BarClustered,
}

impl ChartKind {
    pub fn all() -> &'static [ChartKind] {
        &[
            ChartKind::ColumnClustered,
            ChartKind::Line,
            ChartKind::Pie,
            ChartKind::BarClustered,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            ChartKind::ColumnClustered => "ColumnClustered",
            ChartKind::Line => "Line",
            ChartKind::Pie => "Pie",
            ChartKind::BarClustered => "BarClustered",
        }
    }

    /// Map a model-supplied chart type string, falling back to clustered
    /// column for anything unrecognized.
    pub fn from_lenient(s: &str) -> Self {
        match s {
            "ColumnClustered" | "Column" => ChartKind::ColumnClustered,
            "Line" => ChartKind::Line,
            "Pie" => ChartKind::Pie,
            "BarClustered" | "Bar" => ChartKind::BarClustered,
            other => {
                tracing::debug!(chart_type = other, "unrecognized chart type, using ColumnClustered");
                ChartKind::ColumnClustered
            }
        }
    }
}

impl From<Option<serde_json::Value>> for ChartKind {
    fn from(raw: Option<serde_json::Value>) -> Self {
        match raw {
            Some(serde_json::Value::String(s)) => ChartKind::from_lenient(&s),
            Some(serde_json::Value::Null) | None => ChartKind::ColumnClustered,
            Some(other) => {
                tracing::debug!(chart_type = %other, "non-string chart type, using ColumnClustered");
                ChartKind::ColumnClustered
            }
        }
    }
}

impl JsonSchema for ChartKind {
    fn schema_name() -> String {
        "ChartKind".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(
                ChartKind::all()
                    .iter()
                    .map(|k| serde_json::Value::String(k.name().to_string()))
                    .collect(),
            ),
            metadata: Some(Box::new(Metadata {
                description: Some(
                    "Chart type. Unrecognized values fall back to ColumnClustered.".to_string(),
                ),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub enum SeriesBy {
    #[default]
    Auto,
    Rows,
    Columns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub enum FreezeAxis {
    Row,
    Column,
}

// ── Format spec ─────────────────────────────────────────────────

/// Visual formatting patch. Absent fields leave the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FormatSpec {
    /// Background fill color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts-bindings", ts(type = "string | null"))]
    pub fill: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts-bindings", ts(type = "string | null"))]
    pub font_color: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    /// Font size in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Number display pattern, e.g. "$#,##0.00" or "0.00%".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_alignment: Option<HorizontalAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts-bindings", ts(type = "\"AutoFit\" | number | null"))]
    pub column_width: Option<ColumnWidth>,
}

impl FormatSpec {
    pub fn is_empty(&self) -> bool {
        *self == FormatSpec::default()
    }
}

// ── Action params ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct EditCellParams {
    /// Target range, e.g. "A1" or "B2:C5". Omit to use the current selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Row-major grid of values.
    pub values: Vec<Vec<CellValue>>,
    /// True when the values are formulas (start with "=").
    #[serde(default)]
    pub is_formula: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FormatRangeParams {
    /// Target range. Omit to use the current selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub format: FormatSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CreateTableParams {
    /// Range to turn into a table. Omit to use the current selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub has_headers: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CreateChartParams {
    /// Source data range. Omit to use the current selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_range: Option<String>,
    #[serde(default)]
    pub chart_type: ChartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub series_by: SeriesBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub struct AddWorksheetParams {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub struct FreezePanesParams {
    pub axis: FreezeAxis,
    /// Number of leading rows or columns to pin (>= 1).
    #[serde(default = "default_freeze_count")]
    pub count: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hex_color_accepts_short_and_long_forms() {
        let c: HexColor = serde_json::from_value(json!("#ff0000")).unwrap();
        assert_eq!(c.as_str(), "#ff0000");
        let short: HexColor = serde_json::from_value(json!("#0F0")).unwrap();
        assert_eq!(short.as_str(), "#0F0");
        assert_eq!(serde_json::to_value(&c).unwrap(), json!("#ff0000"));
    }

    #[test]
    fn hex_color_rejects_names_and_bad_digits() {
        assert!(serde_json::from_value::<HexColor>(json!("red")).is_err());
        assert!(serde_json::from_value::<HexColor>(json!("#GG0000")).is_err());
        assert!(serde_json::from_value::<HexColor>(json!("FF0000")).is_err());
        assert!(serde_json::from_value::<HexColor>(json!("not-a-color")).is_err());
    }

    #[test]
    fn column_width_sentinel_and_number() {
        let auto: ColumnWidth = serde_json::from_value(json!("AutoFit")).unwrap();
        assert_eq!(auto, ColumnWidth::AutoFit);
        let dashed: ColumnWidth = serde_json::from_value(json!("auto-fit")).unwrap();
        assert_eq!(dashed, ColumnWidth::AutoFit);
        let lit: ColumnWidth = serde_json::from_value(json!(12.5)).unwrap();
        assert_eq!(lit, ColumnWidth::Points(12.5));
        assert_eq!(serde_json::to_value(ColumnWidth::AutoFit).unwrap(), json!("AutoFit"));
    }

    #[test]
    fn column_width_rejects_nonsense() {
        assert!(serde_json::from_value::<ColumnWidth>(json!("wide")).is_err());
        assert!(serde_json::from_value::<ColumnWidth>(json!(0)).is_err());
        assert!(serde_json::from_value::<ColumnWidth>(json!(-3.0)).is_err());
    }

    #[test]
    fn chart_kind_is_lenient() {
        let scatter: ChartKind = serde_json::from_value(json!("Scatter")).unwrap();
        assert_eq!(scatter, ChartKind::ColumnClustered);
        let bar: ChartKind = serde_json::from_value(json!("Bar")).unwrap();
        assert_eq!(bar, ChartKind::BarClustered);
        // Case-sensitive: lowercase is not recognized.
        let line: ChartKind = serde_json::from_value(json!("line")).unwrap();
        assert_eq!(line, ChartKind::ColumnClustered);
        assert_eq!(serde_json::to_value(ChartKind::Pie).unwrap(), json!("Pie"));
    }

    #[test]
    fn chart_kind_null_or_non_string_falls_back() {
        let null: ChartKind = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(null, ChartKind::ColumnClustered);
        let number: ChartKind = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(number, ChartKind::ColumnClustered);
        let params: CreateChartParams = serde_json::from_value(
            json!({ "dataRange": "A1:B5", "chartType": null, "title": "Sales" }),
        )
        .unwrap();
        assert_eq!(params.chart_type, ChartKind::ColumnClustered);
        assert_eq!(params.title.as_deref(), Some("Sales"));
    }

    #[test]
    fn cell_values_from_mixed_grid() {
        let grid: Vec<Vec<CellValue>> =
            serde_json::from_value(json!([["Name", 1, true, null]])).unwrap();
        assert_eq!(
            grid[0],
            vec![
                CellValue::Text("Name".into()),
                CellValue::Number(1.0),
                CellValue::Bool(true),
                CellValue::Empty,
            ]
        );
    }

    #[test]
    fn format_spec_absent_fields_stay_none() {
        let spec: FormatSpec = serde_json::from_value(json!({ "bold": true })).unwrap();
        assert_eq!(spec.bold, Some(true));
        assert!(spec.fill.is_none());
        assert!(spec.column_width.is_none());
        assert!(FormatSpec::default().is_empty());
    }
}
