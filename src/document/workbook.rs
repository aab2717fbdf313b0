//! In-memory spreadsheet host.
//!
//! Mirrors the parts of an Excel workbook the executor can touch: sheet
//! order, active sheet and selection, cell values and formulas, layered
//! formats, column widths, tables, charts and freeze panes. Persisted as JSON
//! by the CLI.

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{ChartSpec, DocumentError, DocumentModel};
use crate::address::{CellRef, RangeRef, MAX_COLS, MAX_ROWS};
use crate::error::AppError;
use crate::schema::params::{CellValue, ChartKind, FormatSpec, FreezeAxis, SeriesBy};

/// Excel's default column width in characters.
pub const DEFAULT_COLUMN_WIDTH: f64 = 8.43;
const AUTOFIT_PADDING: f64 = 1.0;
const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_SHEET_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
/// Reads larger than this are refused to keep whole-column reads bounded.
const MAX_READ_CELLS: u64 = 1_000_000;

// ── Stored types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl StoredCell {
    fn display_text(&self) -> String {
        match &self.formula {
            Some(f) => f.clone(),
            None => self.value.display_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatLayer {
    pub range: RangeRef,
    pub format: FormatSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeState {
    pub axis: FreezeAxis,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    #[serde(default, with = "cell_map")]
    cells: BTreeMap<CellRef, StoredCell>,
    #[serde(default)]
    formats: Vec<FormatLayer>,
    #[serde(default)]
    column_widths: BTreeMap<u32, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frozen: Option<FreezeState>,
}

impl Sheet {
    pub fn cell(&self, at: CellRef) -> Option<&StoredCell> {
        self.cells.get(&at)
    }

    /// Effective format of one cell: later layers win per attribute.
    pub fn format_at(&self, at: CellRef) -> FormatSpec {
        let mut out = FormatSpec::default();
        for layer in self.formats.iter().filter(|l| l.range.contains(at)) {
            merge_format(&mut out, &layer.format);
        }
        out
    }

    pub fn column_width(&self, col: u32) -> f64 {
        self.column_widths.get(&col).copied().unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    pub fn frozen(&self) -> Option<FreezeState> {
        self.frozen
    }
}

fn merge_format(into: &mut FormatSpec, patch: &FormatSpec) {
    if patch.fill.is_some() {
        into.fill.clone_from(&patch.fill);
    }
    if patch.font_color.is_some() {
        into.font_color.clone_from(&patch.font_color);
    }
    if patch.bold.is_some() {
        into.bold = patch.bold;
    }
    if patch.italic.is_some() {
        into.italic = patch.italic;
    }
    if patch.font_size.is_some() {
        into.font_size = patch.font_size;
    }
    if patch.number_format.is_some() {
        into.number_format.clone_from(&patch.number_format);
    }
    if patch.horizontal_alignment.is_some() {
        into.horizontal_alignment = patch.horizontal_alignment;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub sheet: String,
    pub range: RangeRef,
    pub has_headers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub id: String,
    pub sheet: String,
    pub kind: ChartKind,
    pub data_range: RangeRef,
    /// Resolved orientation, never `Auto`.
    pub series_by: SeriesBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

// ── Workbook ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    sheets: IndexMap<String, Sheet>,
    active: String,
    selection: RangeRef,
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default)]
    charts: Vec<Chart>,
    #[serde(default)]
    next_table: u32,
    #[serde(default)]
    next_chart: u32,
    #[serde(skip)]
    pending: u32,
    #[serde(skip)]
    flushes: u32,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// One empty sheet named `Sheet1`, with `A1` selected.
    pub fn new() -> Self {
        let mut sheets = IndexMap::new();
        sheets.insert("Sheet1".to_string(), Sheet::default());
        Self {
            sheets,
            active: "Sheet1".to_string(),
            selection: RangeRef::single(CellRef::new(0, 0)).with_sheet("Sheet1"),
            tables: Vec::new(),
            charts: Vec::new(),
            next_table: 0,
            next_chart: 0,
            pending: 0,
            flushes: 0,
        }
    }

    /// Load from JSON, or start a fresh workbook when the file does not exist.
    pub fn load_or_new(path: &Path) -> Result<Self, AppError> {
        if path.exists() {
            Ok(crate::storage::read_json(path)?)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        crate::storage::write_json(path, self)?;
        Ok(())
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// Number of `commit()` calls so far.
    pub fn flush_count(&self) -> u32 {
        self.flushes
    }

    /// Mutations applied since the last `commit()`.
    pub fn pending_mutations(&self) -> u32 {
        self.pending
    }

    /// Select a range. An unqualified address refers to the active sheet; a
    /// qualified one also activates its sheet.
    pub fn select(&mut self, address: &str) -> Result<(), DocumentError> {
        let range = RangeRef::parse(address)?;
        let sheet = self.resolve_sheet(&range)?;
        self.active.clone_from(&sheet);
        self.selection = range.with_sheet(sheet);
        Ok(())
    }

    /// Stored cell at an A1 address.
    pub fn cell(&self, address: &str) -> Option<&StoredCell> {
        let range = RangeRef::parse(address).ok()?;
        let sheet = self.resolve_sheet(&range).ok()?;
        self.sheets.get(&sheet)?.cell(range.start)
    }

    pub fn value(&self, address: &str) -> CellValue {
        self.cell(address).map(|c| c.value.clone()).unwrap_or_default()
    }

    pub fn format_at(&self, address: &str) -> FormatSpec {
        RangeRef::parse(address)
            .ok()
            .and_then(|r| {
                let sheet = self.resolve_sheet(&r).ok()?;
                Some(self.sheets.get(&sheet)?.format_at(r.start))
            })
            .unwrap_or_default()
    }

    fn sheet_key(&self, name: &str) -> Result<String, DocumentError> {
        self.sheets
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| DocumentError::SheetNotFound(name.to_string()))
    }

    fn resolve_sheet(&self, range: &RangeRef) -> Result<String, DocumentError> {
        match &range.sheet {
            Some(name) => self.sheet_key(name),
            None => Ok(self.active.clone()),
        }
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet, DocumentError> {
        self.sheets
            .get_mut(name)
            .ok_or_else(|| DocumentError::SheetNotFound(name.to_string()))
    }

    fn touch(&mut self) {
        self.pending += 1;
    }
}

fn grid_dims(values: &[Vec<CellValue>]) -> Result<(u32, u32), DocumentError> {
    let width = values.first().map_or(0, Vec::len);
    if width == 0 || values.iter().any(|r| r.len() != width) {
        return Err(DocumentError::Host(
            "values must be a non-empty rectangular grid".to_string(),
        ));
    }
    let too_large = || DocumentError::Host("values grid is too large".to_string());
    let rows = u32::try_from(values.len()).map_err(|_| too_large())?;
    let cols = u32::try_from(width).map_err(|_| too_large())?;
    Ok((rows, cols))
}

fn store_cell(value: &CellValue, as_formula: bool) -> StoredCell {
    match value {
        CellValue::Text(t) if t.starts_with('=') => StoredCell {
            value: CellValue::Empty,
            formula: Some(t.clone()),
        },
        CellValue::Text(t) if as_formula && !t.is_empty() => StoredCell {
            value: CellValue::Empty,
            formula: Some(format!("={t}")),
        },
        other => StoredCell {
            value: other.clone(),
            formula: None,
        },
    }
}

fn check_sheet_name(name: &str) -> Result<(), DocumentError> {
    let invalid = |reason: &str| DocumentError::InvalidSheetName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let len = name.chars().count();
    if len == 0 || len > MAX_SHEET_NAME_LEN {
        return Err(invalid("must be 1 to 31 characters"));
    }
    if name.contains(FORBIDDEN_SHEET_CHARS) {
        return Err(invalid("must not contain : \\ / ? * [ ]"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid("must not begin or end with an apostrophe"));
    }
    Ok(())
}

fn check_table_name(name: &str) -> Result<(), DocumentError> {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '\\');
    let rest_ok = chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    let looks_like_cell = RangeRef::parse(name).is_ok_and(|r| r.sheet.is_none());
    if first_ok && rest_ok && !looks_like_cell {
        Ok(())
    } else {
        Err(DocumentError::InvalidTableName(name.to_string()))
    }
}

impl DocumentModel for Workbook {
    fn active_sheet_name(&self) -> Result<String, DocumentError> {
        Ok(self.active.clone())
    }

    fn selection(&self) -> Result<RangeRef, DocumentError> {
        Ok(self.selection.clone())
    }

    fn set_values(
        &mut self,
        range: &RangeRef,
        values: &[Vec<CellValue>],
        as_formulas: bool,
    ) -> Result<RangeRef, DocumentError> {
        let (rows, cols) = grid_dims(values)?;
        let target = if range.is_single_cell() {
            range.anchored(rows, cols)?
        } else if range.row_count() == rows && range.col_count() == cols {
            range.clone()
        } else {
            return Err(DocumentError::DimensionMismatch {
                range: range.to_string(),
                rows,
                cols,
                range_rows: range.row_count(),
                range_cols: range.col_count(),
            });
        };

        let sheet_name = self.resolve_sheet(&target)?;
        let sheet = self.sheet_mut(&sheet_name)?;
        for (at, value) in target.cells().zip(values.iter().flatten()) {
            let cell = store_cell(value, as_formulas);
            if cell == StoredCell::default() {
                sheet.cells.remove(&at);
            } else {
                sheet.cells.insert(at, cell);
            }
        }
        self.touch();
        Ok(target.with_sheet(sheet_name))
    }

    fn values(&self, range: &RangeRef) -> Result<Vec<Vec<CellValue>>, DocumentError> {
        if range.cell_count() > MAX_READ_CELLS {
            return Err(DocumentError::Host(format!(
                "range {range} is too large to read"
            )));
        }
        let sheet_name = self.resolve_sheet(range)?;
        let sheet = self
            .sheets
            .get(&sheet_name)
            .ok_or_else(|| DocumentError::SheetNotFound(sheet_name.clone()))?;
        let grid = (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| match sheet.cell(CellRef::new(row, col)) {
                        Some(StoredCell {
                            formula: Some(f), ..
                        }) => CellValue::Text(f.clone()),
                        Some(c) => c.value.clone(),
                        None => CellValue::Empty,
                    })
                    .collect()
            })
            .collect();
        Ok(grid)
    }

    fn apply_format(&mut self, range: &RangeRef, format: &FormatSpec) -> Result<(), DocumentError> {
        let sheet_name = self.resolve_sheet(range)?;
        let mut layer = format.clone();
        layer.column_width = None;
        if layer.is_empty() {
            return Ok(());
        }
        let sheet = self.sheet_mut(&sheet_name)?;
        sheet.formats.push(FormatLayer {
            range: RangeRef::new(range.start, range.end),
            format: layer,
        });
        self.touch();
        Ok(())
    }

    fn set_column_width(&mut self, range: &RangeRef, width: f64) -> Result<(), DocumentError> {
        let sheet_name = self.resolve_sheet(range)?;
        let sheet = self.sheet_mut(&sheet_name)?;
        for col in range.columns() {
            sheet.column_widths.insert(col, width);
        }
        self.touch();
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn autofit_columns(&mut self, range: &RangeRef) -> Result<(), DocumentError> {
        let sheet_name = self.resolve_sheet(range)?;
        let sheet = self.sheet_mut(&sheet_name)?;
        for col in range.columns() {
            let longest = sheet
                .cells
                .iter()
                .filter(|(at, _)| at.col == col)
                .map(|(_, c)| c.display_text().chars().count())
                .max();
            match longest {
                Some(len) if len > 0 => {
                    sheet.column_widths.insert(col, len as f64 + AUTOFIT_PADDING);
                }
                _ => {
                    sheet.column_widths.remove(&col);
                }
            }
        }
        self.touch();
        Ok(())
    }

    fn add_table(
        &mut self,
        range: &RangeRef,
        has_headers: bool,
        name: Option<&str>,
    ) -> Result<String, DocumentError> {
        let sheet_name = self.resolve_sheet(range)?;
        let area = RangeRef::new(range.start, range.end);

        if let Some(existing) = self
            .tables
            .iter()
            .find(|t| t.sheet == sheet_name && t.range.overlaps(&area))
        {
            return Err(DocumentError::TableOverlap {
                range: range.to_string(),
                table: existing.name.clone(),
            });
        }

        let taken = |candidate: &str| {
            self.tables
                .iter()
                .any(|t| t.name.eq_ignore_ascii_case(candidate))
        };
        let table_name = match name {
            Some(n) => {
                let n = n.trim();
                check_table_name(n)?;
                if taken(n) {
                    return Err(DocumentError::DuplicateTable(n.to_string()));
                }
                n.to_string()
            }
            None => {
                let mut n = self.next_table + 1;
                while taken(&format!("Table{n}")) {
                    n += 1;
                }
                format!("Table{n}")
            }
        };

        self.next_table += 1;
        self.tables.push(Table {
            name: table_name.clone(),
            sheet: sheet_name.clone(),
            range: area.clone(),
            has_headers,
        });
        if sheet_name == self.active {
            self.selection = area.with_sheet(sheet_name);
        }
        self.touch();
        Ok(table_name)
    }

    fn add_chart(&mut self, spec: &ChartSpec) -> Result<String, DocumentError> {
        let sheet_name = self.resolve_sheet(&spec.data_range)?;
        let data = &spec.data_range;
        let series_by = match spec.series_by {
            SeriesBy::Auto if data.row_count() >= data.col_count() => SeriesBy::Columns,
            SeriesBy::Auto => SeriesBy::Rows,
            explicit => explicit,
        };
        self.next_chart += 1;
        let id = format!("Chart{}", self.next_chart);
        self.charts.push(Chart {
            id: id.clone(),
            sheet: sheet_name,
            kind: spec.kind,
            data_range: RangeRef::new(data.start, data.end),
            series_by,
            title: spec.title.clone(),
        });
        self.touch();
        Ok(id)
    }

    fn add_worksheet(&mut self, name: &str) -> Result<(), DocumentError> {
        let name = name.trim();
        check_sheet_name(name)?;
        if self.sheet_key(name).is_ok() {
            return Err(DocumentError::DuplicateSheet(name.to_string()));
        }
        self.sheets.insert(name.to_string(), Sheet::default());
        self.touch();
        Ok(())
    }

    fn freeze_panes(&mut self, axis: FreezeAxis, count: u32) -> Result<(), DocumentError> {
        let (label, limit) = match axis {
            FreezeAxis::Row => ("rows", MAX_ROWS),
            FreezeAxis::Column => ("columns", MAX_COLS),
        };
        if count == 0 || count >= limit {
            return Err(DocumentError::FreezeOutOfRange {
                axis: label,
                count,
                limit,
            });
        }
        let active = self.active.clone();
        self.sheet_mut(&active)?.frozen = Some(FreezeState { axis, count });
        self.touch();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DocumentError> {
        self.pending = 0;
        self.flushes += 1;
        Ok(())
    }
}

/// Cells serialize as a map keyed by A1 address.
mod cell_map {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::StoredCell;
    use crate::address::{CellRef, RangeRef};

    pub fn serialize<S: Serializer>(
        cells: &BTreeMap<CellRef, StoredCell>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.collect_map(cells.iter().map(|(at, cell)| (at.to_string(), cell)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<CellRef, StoredCell>, D::Error> {
        let raw = BTreeMap::<String, StoredCell>::deserialize(d)?;
        raw.into_iter()
            .map(|(key, cell)| {
                let r = RangeRef::parse(&key).map_err(D::Error::custom)?;
                if r.sheet.is_some() || !r.is_single_cell() {
                    return Err(D::Error::custom(format!("'{key}' is not a cell address")));
                }
                Ok((r.start, cell))
            })
            .collect()
    }
}
