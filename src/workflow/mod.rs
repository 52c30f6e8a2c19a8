// laneforge — Workflow document model

pub mod extract;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("workflow text is empty")]
    EmptyInput,
    #[error("failed to parse AI response as JSON: {source}")]
    MalformedJson {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("AI response is not a workflow document: {source}")]
    InvalidDocument {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

impl WorkflowError {
    /// The offending completion text, if any.
    pub fn raw(&self) -> Option<&str> {
        match self {
            WorkflowError::EmptyInput => None,
            WorkflowError::MalformedJson { raw, .. } | WorkflowError::InvalidDocument { raw, .. } => {
                Some(raw)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Actors and steps extracted from a free-text workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub actor: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub action: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: StepKind,
}

impl Step {
    pub fn new(actor: impl Into<String>, action: impl Into<String>, kind: StepKind) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Start,
    #[default]
    Task,
    Gateway,
    End,
}

impl StepKind {
    /// Case-insensitive lookup; anything unrecognized is a task.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "start" => StepKind::Start,
            "gateway" => StepKind::Gateway,
            "end" => StepKind::End,
            _ => StepKind::Task,
        }
    }
}

fn lenient_kind<'de, D>(deserializer: D) -> Result<StepKind, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => StepKind::from_label(&s),
        _ => StepKind::Task,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

impl WorkflowDocument {
    /// Strictly parse a JSON completion into a document.
    ///
    /// Syntax errors become `MalformedJson`; well-formed JSON of the wrong
    /// shape becomes `InvalidDocument`. Both keep the raw text.
    pub fn from_json(raw: &str) -> Result<Self, WorkflowError> {
        serde_json::from_str(raw).map_err(|source| {
            let raw = raw.to_string();
            match source.classify() {
                serde_json::error::Category::Data => WorkflowError::InvalidDocument { raw, source },
                _ => WorkflowError::MalformedJson { raw, source },
            }
        })
    }

    pub fn has_actor(&self, name: &str) -> bool {
        self.actors.iter().any(|a| a == name)
    }

    /// Append every step actor missing from the actor list, in step order.
    /// Returns the appended names.
    pub fn repair_actors(&mut self) -> Vec<String> {
        let mut added = Vec::new();
        for step in &self.steps {
            if !self.actors.contains(&step.actor) {
                self.actors.push(step.actor.clone());
                added.push(step.actor.clone());
            }
        }
        added
    }

    /// Indices of steps whose actor has no lane.
    pub fn orphan_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, s)| !self.has_actor(&s.actor))
            .map(|(i, _)| i)
            .collect()
    }
}
