//! The spreadsheet host, seen only through a capability interface.
//!
//! The executor never touches a concrete host. It drives a [`DocumentModel`]
//! which a live add-in bridge or the in-memory [`workbook::Workbook`] provides.

pub mod workbook;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::{AddressError, RangeRef};
use crate::error::AppError;
use crate::schema::params::{CellValue, ChartKind, FormatSpec, FreezeAxis, SeriesBy};

/// Host-side rejection of a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("worksheet '{0}' not found")]
    SheetNotFound(String),
    #[error("a worksheet named '{0}' already exists")]
    DuplicateSheet(String),
    #[error("invalid worksheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: String },
    #[error("a table named '{0}' already exists")]
    DuplicateTable(String),
    #[error("invalid table name '{0}'")]
    InvalidTableName(String),
    #[error("range {range} overlaps table '{table}'")]
    TableOverlap { range: String, table: String },
    #[error("values are {rows}x{cols} but range {range} is {range_rows}x{range_cols}")]
    DimensionMismatch {
        range: String,
        rows: u32,
        cols: u32,
        range_rows: u32,
        range_cols: u32,
    },
    #[error("cannot freeze {count} {axis} on a sheet of {limit}")]
    FreezeOutOfRange {
        axis: &'static str,
        count: u32,
        limit: u32,
    },
    #[error("{0}")]
    Host(String),
}

impl From<DocumentError> for AppError {
    fn from(e: DocumentError) -> Self {
        AppError::ActionExecution {
            message: e.to_string(),
        }
    }
}

/// A chart to materialize, with every default already applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub data_range: RangeRef,
    pub series_by: SeriesBy,
    pub title: Option<String>,
}

/// Operations the executor needs from a spreadsheet host.
///
/// Addresses passed in are already parsed; a `RangeRef` without a sheet
/// refers to the active sheet. Mutations may be buffered until [`commit`].
///
/// [`commit`]: DocumentModel::commit
pub trait DocumentModel {
    fn active_sheet_name(&self) -> Result<String, DocumentError>;

    /// Current selection, qualified with its sheet.
    fn selection(&self) -> Result<RangeRef, DocumentError>;

    /// Write a grid. A single-cell range anchors the grid at that cell; any
    /// other range must match the grid's dimensions. Returns the written range.
    fn set_values(
        &mut self,
        range: &RangeRef,
        values: &[Vec<CellValue>],
        as_formulas: bool,
    ) -> Result<RangeRef, DocumentError>;

    fn values(&self, range: &RangeRef) -> Result<Vec<Vec<CellValue>>, DocumentError>;

    /// Apply every present attribute of `format` except `column_width`.
    fn apply_format(&mut self, range: &RangeRef, format: &FormatSpec) -> Result<(), DocumentError>;

    fn set_column_width(&mut self, range: &RangeRef, width: f64) -> Result<(), DocumentError>;

    /// Auto-size every column spanned by `range`, entire column height.
    fn autofit_columns(&mut self, range: &RangeRef) -> Result<(), DocumentError>;

    /// Returns the table's final name.
    fn add_table(
        &mut self,
        range: &RangeRef,
        has_headers: bool,
        name: Option<&str>,
    ) -> Result<String, DocumentError>;

    /// Returns the new chart's id.
    fn add_chart(&mut self, spec: &ChartSpec) -> Result<String, DocumentError>;

    fn add_worksheet(&mut self, name: &str) -> Result<(), DocumentError>;

    fn freeze_panes(&mut self, axis: FreezeAxis, count: u32) -> Result<(), DocumentError>;

    /// Flush every buffered mutation to the host in one round trip.
    fn commit(&mut self) -> Result<(), DocumentError>;
}

/// Active sheet and selection, snapshotted once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
}

impl DocumentContext {
    pub fn new(active_sheet: impl Into<String>, selection: impl Into<String>) -> Self {
        Self {
            active_sheet: Some(active_sheet.into()),
            selection: Some(selection.into()),
        }
    }

    /// Read the host's current state. A host that cannot answer yields an
    /// unknown context rather than an error.
    pub fn capture(doc: &dyn DocumentModel) -> Self {
        let active_sheet = doc
            .active_sheet_name()
            .map_err(|e| tracing::warn!("could not read active sheet: {e}"))
            .ok();
        let selection = doc
            .selection()
            .map_err(|e| tracing::warn!("could not read selection: {e}"))
            .ok()
            .map(|r| r.to_string());
        Self {
            active_sheet,
            selection,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.active_sheet.is_none() && self.selection.is_none()
    }

    /// The single context line embedded in prompts.
    pub fn describe(&self) -> String {
        if self.is_unknown() {
            return "No context provided".to_string();
        }
        format!(
            "Current Sheet: \"{}\". Selected Range: \"{}\"",
            self.active_sheet.as_deref().unwrap_or("unknown"),
            self.selection.as_deref().unwrap_or("unknown"),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::workbook::Workbook;
    use super::*;

    #[test]
    fn capture_reads_sheet_and_qualified_selection() {
        let wb = Workbook::new();
        let ctx = DocumentContext::capture(&wb);
        assert_eq!(ctx.active_sheet.as_deref(), Some("Sheet1"));
        assert_eq!(ctx.selection.as_deref(), Some("Sheet1!A1"));
    }

    #[test]
    fn describe_formats_context_line() {
        let ctx = DocumentContext::new("Sales", "Sales!A1:B5");
        assert_eq!(
            ctx.describe(),
            "Current Sheet: \"Sales\". Selected Range: \"Sales!A1:B5\""
        );
        assert_eq!(DocumentContext::default().describe(), "No context provided");
    }

    #[test]
    fn document_error_becomes_execution_error() {
        let err: AppError = DocumentError::DuplicateSheet("Q3".into()).into();
        assert!(matches!(err, AppError::ActionExecution { .. }));
        assert!(err.to_string().contains("Q3"));
    }
}
