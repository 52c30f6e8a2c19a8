// laneforge — Prompt-and-parse: free text to a workflow document

use super::{WorkflowDocument, WorkflowError};
use crate::provider::{LLMProvider, Message};
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

const SCHEMA_EXAMPLE: &str = r#"{
  "actors": ["Actor1", "Actor2"],
  "steps": [
    {"actor": "Actor1", "action": "Start Event", "type": "start"},
    {"actor": "Actor1", "action": "Task Name", "type": "task"},
    {"actor": "Actor2", "action": "Gateway Condition?", "type": "gateway"},
    {"actor": "Actor2", "action": "End Event", "type": "end"}
  ]
}"#;

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?[ \t]*\r?\n?").unwrap());
static TRAILING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n?```$").unwrap());

/// Build the instruction sent to the model.
pub fn build_prompt(workflow_text: &str) -> String {
    format!(
        "Convert the following workflow into structured JSON for BPMN diagramming.\n\
         Use format:\n\
         {}\n\
         \n\
         Workflow:\n\
         {}\n",
        SCHEMA_EXAMPLE, workflow_text
    )
}

/// Remove a surrounding Markdown code fence (with optional `json` tag).
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let start = LEADING_FENCE.find(text).map(|m| m.end()).unwrap_or(0);
    let rest = &text[start..];
    let end = TRAILING_FENCE
        .find(rest)
        .map(|m| m.start())
        .unwrap_or(rest.len());
    rest[..end].trim()
}

/// Turns free text into a [`WorkflowDocument`] with one completion call.
pub struct Extractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f64,
    strip_fences: bool,
}

impl Extractor {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f64, strip_fences: bool) -> Self {
        Self {
            provider,
            temperature,
            strip_fences,
        }
    }

    /// Extract a document. Malformed output is returned as a
    /// [`WorkflowError`] inside the `anyhow::Error`; transport faults are
    /// passed through untouched.
    pub async fn extract(&self, workflow_text: &str) -> anyhow::Result<WorkflowDocument> {
        if workflow_text.trim().is_empty() {
            return Err(WorkflowError::EmptyInput.into());
        }

        let messages = [Message::user(build_prompt(workflow_text))];
        let options: HashMap<String, serde_json::Value> = [
            ("temperature".to_string(), json!(self.temperature)),
            ("n".to_string(), json!(1)),
        ]
        .into_iter()
        .collect();

        tracing::info!(
            model = %self.provider.default_model(),
            input_len = workflow_text.len(),
            "Parsing workflow into structured JSON"
        );

        let response = self.provider.chat(&messages, "", &options).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        let text = response.content.trim();
        let text = if self.strip_fences {
            strip_code_fence(text)
        } else {
            text
        };

        let document = WorkflowDocument::from_json(text).inspect_err(|e| {
            tracing::warn!(error = %e, "Completion is not a usable workflow document");
        })?;

        tracing::info!(
            actors = document.actors.len(),
            steps = document.steps.len(),
            "Workflow extracted"
        );
        Ok(document)
    }
}
