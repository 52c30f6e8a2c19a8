// laneforge — Workflow document to PlantUML BPMN swim-lane markup

pub mod encode;

use crate::workflow::{StepKind, WorkflowDocument};
use encode::Encoding;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

/// The two generator flavours.
///
/// `Classic` emits markup exactly from the document and percent-encodes it.
/// `Compact` repairs the actor list, makes node ids whitespace-free and uses
/// the deflate encoding the rendering server expects.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Classic,
    #[default]
    Compact,
}

impl Variant {
    pub fn encoding(self) -> Encoding {
        match self {
            Variant::Classic => Encoding::Percent,
            Variant::Compact => Encoding::Deflate,
        }
    }

    /// Whether completions are unwrapped from Markdown code fences.
    pub fn strips_code_fences(self) -> bool {
        matches!(self, Variant::Compact)
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(Variant::Classic),
            "compact" => Ok(Variant::Compact),
            other => Err(format!("unknown variant '{}' (expected classic or compact)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStyle {
    /// `{actor}_{index}` with the actor name as-is.
    Verbatim,
    /// Whitespace runs in the actor name become `_`.
    Underscored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub repair_actors: bool,
    pub id_style: IdStyle,
}

impl RenderOptions {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Classic => Self {
                repair_actors: false,
                id_style: IdStyle::Verbatim,
            },
            Variant::Compact => Self {
                repair_actors: true,
                id_style: IdStyle::Underscored,
            },
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::for_variant(Variant::default())
    }
}

/// Identifier of the step at `index` owned by `actor`.
pub fn node_id(actor: &str, index: usize, style: IdStyle) -> String {
    let actor: Cow<'_, str> = match style {
        IdStyle::Verbatim => Cow::Borrowed(actor),
        IdStyle::Underscored => Cow::Owned(actor.split_whitespace().collect::<Vec<_>>().join("_")),
    };
    format!("{}_{}", actor, index)
}

/// Markup plus the actors the repair pass appended to the lane list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub markup: String,
    pub added_actors: Vec<String>,
}

/// Render a document as PlantUML BPMN markup.
///
/// One pool, one lane per actor (in actor order), each lane listing its
/// steps in document order. Edges always chain consecutive steps linearly,
/// whatever their kind: gateways do not branch.
pub fn to_plantuml(document: &WorkflowDocument, options: &RenderOptions) -> String {
    render_markup(document, options).markup
}

/// Same as [`to_plantuml`], also reporting which actors were appended.
/// The input document is never modified.
pub fn render_markup(document: &WorkflowDocument, options: &RenderOptions) -> Rendered {
    let mut added_actors = Vec::new();
    let document: Cow<'_, WorkflowDocument> = if options.repair_actors {
        let mut repaired = document.clone();
        added_actors = repaired.repair_actors();
        if !added_actors.is_empty() {
            tracing::debug!(actors = ?added_actors, "Added actors referenced only by steps");
        }
        Cow::Owned(repaired)
    } else {
        let orphans = document.orphan_steps();
        if !orphans.is_empty() {
            tracing::warn!(
                steps = ?orphans,
                "Steps reference actors without a lane and will be left out of the pool"
            );
        }
        Cow::Borrowed(document)
    };

    let mut lines: Vec<String> = vec!["@startuml".into(), "!include <bpmn>".into(), String::new()];

    lines.push("pool Process {".into());
    for actor in &document.actors {
        lines.push(format!("  lane {} {{", actor));
        for (i, step) in document.steps.iter().enumerate() {
            if &step.actor != actor {
                continue;
            }
            let id = node_id(&step.actor, i, options.id_style);
            let keyword = match step.kind {
                StepKind::Start => "start event",
                StepKind::End => "end event",
                StepKind::Gateway => "gateway",
                StepKind::Task => "task",
            };
            lines.push(format!("    {} {} : {}", keyword, id, step.action));
        }
        lines.push("  }".into());
    }
    lines.push("}".into());

    let ids: Vec<String> = document
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| node_id(&s.actor, i, options.id_style))
        .collect();
    for pair in ids.windows(2) {
        lines.push(format!("{} --> {}", pair[0], pair[1]));
    }

    lines.push("@enduml".into());
    Rendered {
        markup: lines.join("\n"),
        added_actors,
    }
}
