//! The user-facing cycle: capture context, translate, execute, summarize.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::document::{DocumentContext, DocumentModel};
use crate::error::AppError;
use crate::executor::{execute, ExecutionReport};
use crate::parser::ParseWarning;
use crate::prompt::{AudioClip, UserInput};
use crate::transport::CommandTransport;

pub const NO_ACTIONS_MESSAGE: &str = "No actions were generated for that request.";

/// Result of one submitted command, ready to show in the task pane.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub summary: String,
    /// `None` when nothing reached the executor.
    pub report: Option<ExecutionReport>,
    pub warnings: Vec<ParseWarning>,
    pub error: Option<AppError>,
}

impl CycleOutcome {
    fn failed(error: AppError) -> Self {
        Self {
            summary: error.user_message(),
            report: None,
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs at most one cycle at a time.
pub struct Assistant {
    transport: Arc<dyn CommandTransport>,
    busy: AtomicBool,
}

impl Assistant {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            transport,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Translate `input` and apply the result to `doc`.
    ///
    /// Fails only with [`AppError::Busy`] when another cycle is in flight;
    /// every other failure is reported through the outcome.
    pub async fn submit(
        &self,
        doc: &mut dyn DocumentModel,
        input: UserInput,
    ) -> Result<CycleOutcome, AppError> {
        let Some(_guard) = InFlight::acquire(&self.busy) else {
            return Err(AppError::Busy);
        };

        let ctx = DocumentContext::capture(doc);
        tracing::info!(channel = input.channel(), context = %ctx.describe(), "submitting command");

        let parsed = match self.transport.submit(&ctx, &input).await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("command failed: {e}");
                return Ok(CycleOutcome::failed(e));
            }
        };

        if parsed.batch.is_empty() {
            let summary = match parsed.warnings.len() {
                0 => NO_ACTIONS_MESSAGE.to_string(),
                dropped => format!(
                    "No valid actions were generated; {dropped} invalid action(s) were dropped."
                ),
            };
            return Ok(CycleOutcome {
                summary,
                report: None,
                warnings: parsed.warnings,
                error: None,
            });
        }

        let report = execute(doc, &ctx, &parsed.batch);
        let (summary, error) = summarize(&report);
        Ok(CycleOutcome {
            summary,
            report: Some(report),
            warnings: parsed.warnings,
            error,
        })
    }
}

fn summarize(report: &ExecutionReport) -> (String, Option<AppError>) {
    let executed = report.executed.len();
    if report.success {
        return (format!("Done! Executed {executed} action(s)."), None);
    }
    let error = AppError::ActionExecution {
        message: report.failure_summary(),
    };
    let summary = if executed == 0 {
        error.user_message()
    } else {
        format!(
            "Executed {executed} of {} action(s). {}",
            report.attempted,
            error.user_message()
        )
    };
    (summary, Some(error))
}

/// Buffers recorded audio until the user stops or cancels.
#[derive(Debug, Default)]
pub struct AudioCapture {
    buffer: Vec<u8>,
}

impl AudioCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything recorded so far.
    pub fn cancel(&mut self) {
        self.buffer.clear();
    }

    /// Hand the recording over as a voice command and reset the buffer.
    pub fn finish(&mut self, mime_type: Option<&str>) -> Result<UserInput, AppError> {
        if self.buffer.is_empty() {
            return Err(AppError::validation("No audio recorded"));
        }
        let bytes = std::mem::take(&mut self.buffer);
        Ok(UserInput::Audio(AudioClip::new(bytes, mime_type)))
    }
}
