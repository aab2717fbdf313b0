//! Applies a validated batch to a document, one action at a time.
//!
//! Every action is attempted even when an earlier one failed; failures are
//! recorded by index and the whole batch is flushed with a single `commit()`.
//! There is no rollback: a partially failed batch leaves the successful
//! actions applied.

use serde::Serialize;

use crate::address::RangeRef;
use crate::document::{ChartSpec, DocumentContext, DocumentError, DocumentModel};
use crate::error::AppError;
use crate::schema::params::{ColumnWidth, FreezeAxis};
use crate::schema::{Action, ActionBatch, ActionKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub struct ActionOutcome {
    pub index: usize,
    pub kind: ActionKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
pub struct ActionFailure {
    pub index: usize,
    pub kind: ActionKind,
    pub message: String,
}

/// What happened to each action of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub attempted: usize,
    pub executed: Vec<ActionOutcome>,
    pub failures: Vec<ActionFailure>,
    /// Set when the final flush to the host failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_error: Option<String>,
    pub success: bool,
}

impl ExecutionReport {
    /// `kind: message` for every failure, comma separated.
    pub fn failure_summary(&self) -> String {
        let mut parts: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.kind, f.message))
            .collect();
        if let Some(e) = &self.commit_error {
            parts.push(format!("commit: {e}"));
        }
        parts.join(", ")
    }

    /// The aggregate error for a batch with failures.
    pub fn into_result(self) -> Result<ExecutionReport, AppError> {
        if self.success {
            Ok(self)
        } else {
            Err(AppError::ActionExecution {
                message: self.failure_summary(),
            })
        }
    }
}

/// Apply `batch` in order against `doc`.
///
/// Actions without an address use `ctx.selection`, the selection captured
/// before the batch started, even if an earlier action moved it. An
/// unqualified address refers to `ctx.active_sheet`.
pub fn execute(
    doc: &mut dyn DocumentModel,
    ctx: &DocumentContext,
    batch: &ActionBatch,
) -> ExecutionReport {
    let mut report = ExecutionReport {
        attempted: batch.len(),
        ..ExecutionReport::default()
    };

    for (index, action) in batch.iter().enumerate() {
        let kind = action.kind();
        match apply(doc, ctx, action) {
            Ok(detail) => {
                tracing::debug!(index, %kind, "{detail}");
                report.executed.push(ActionOutcome {
                    index,
                    kind,
                    detail,
                });
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(index, %kind, "action failed: {message}");
                report.failures.push(ActionFailure {
                    index,
                    kind,
                    message,
                });
            }
        }
    }

    if let Err(e) = doc.commit() {
        tracing::warn!("commit failed: {e}");
        report.commit_error = Some(e.to_string());
    }

    report.success = report.failures.is_empty() && report.commit_error.is_none();
    tracing::info!(
        attempted = report.attempted,
        executed = report.executed.len(),
        failed = report.failures.len(),
        "batch executed"
    );
    report
}

fn resolve(explicit: Option<&str>, ctx: &DocumentContext) -> Result<RangeRef, DocumentError> {
    let address = match explicit {
        Some(a) => a,
        None => ctx.selection.as_deref().ok_or_else(|| {
            DocumentError::Host("no address given and no selection was captured".to_string())
        })?,
    };
    let range = RangeRef::parse(address)?;
    Ok(match (&range.sheet, &ctx.active_sheet) {
        (None, Some(sheet)) => range.with_sheet(sheet.clone()),
        _ => range,
    })
}

fn apply(
    doc: &mut dyn DocumentModel,
    ctx: &DocumentContext,
    action: &Action,
) -> Result<String, DocumentError> {
    match action {
        Action::EditCell(p) => {
            let target = resolve(p.address.as_deref(), ctx)?;
            let written = doc.set_values(&target, &p.values, p.is_formula)?;
            Ok(format!("wrote {written}"))
        }
        Action::FormatRange(p) => {
            let target = resolve(p.address.as_deref(), ctx)?;
            doc.apply_format(&target, &p.format)?;
            match p.format.column_width {
                Some(ColumnWidth::AutoFit) => doc.autofit_columns(&target)?,
                Some(ColumnWidth::Points(width)) => doc.set_column_width(&target, width)?,
                None => {}
            }
            Ok(format!("formatted {target}"))
        }
        Action::CreateTable(p) => {
            let target = resolve(p.address.as_deref(), ctx)?;
            let name = doc.add_table(&target, p.has_headers, p.name.as_deref())?;
            Ok(format!("created table {name} at {target}"))
        }
        Action::CreateChart(p) => {
            let data_range = resolve(p.data_range.as_deref(), ctx)?;
            let spec = ChartSpec {
                kind: p.chart_type,
                data_range,
                series_by: p.series_by,
                title: p.title.clone(),
            };
            let id = doc.add_chart(&spec)?;
            Ok(format!("created {} chart {id} from {}", spec.kind.name(), spec.data_range))
        }
        Action::AddWorksheet(p) => {
            doc.add_worksheet(&p.name)?;
            Ok(format!("added worksheet {}", p.name.trim()))
        }
        Action::FreezePanes(p) => {
            doc.freeze_panes(p.axis, p.count)?;
            let unit = match p.axis {
                FreezeAxis::Row => "row(s)",
                FreezeAxis::Column => "column(s)",
            };
            Ok(format!("froze {} {unit}", p.count))
        }
    }
}
