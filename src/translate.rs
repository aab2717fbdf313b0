//! One translation cycle: compose, invoke the model, parse.

use std::sync::Arc;

use crate::document::DocumentContext;
use crate::error::AppError;
use crate::llm::ModelClient;
use crate::parser::{parse_response, ParsedBatch};
use crate::prompt::{compose, UserInput};
use crate::schema::catalog::ActionCatalog;

/// Stateless: every call composes, invokes and parses independently.
#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn ModelClient>,
    catalog: Arc<ActionCatalog>,
}

impl Translator {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            catalog: Arc::new(ActionCatalog::builtin()),
        }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub async fn translate(
        &self,
        ctx: &DocumentContext,
        input: &UserInput,
    ) -> Result<ParsedBatch, AppError> {
        if input.is_empty() {
            return Err(AppError::validation(match input {
                UserInput::Text(_) => "Message is required",
                UserInput::Audio(_) => "No audio provided",
            }));
        }

        let payload = compose(&self.catalog, ctx, input);
        let raw = self.model.generate(&payload).await?;
        let parsed = parse_response(&raw)?;
        if !parsed.warnings.is_empty() {
            tracing::warn!(
                dropped = parsed.warnings.len(),
                kept = parsed.batch.len(),
                "reply contained invalid actions"
            );
        }
        Ok(parsed)
    }
}
