// laneforge — One single-shot run: text → document → markup → diagram URL

use crate::config::Config;
use crate::plantuml::encode::{self, DiagramFormat, EncodeError, Encoding};
use crate::plantuml::{self as puml, RenderOptions};
use crate::provider::LLMProvider;
use crate::workflow::extract::Extractor;
use crate::workflow::WorkflowDocument;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default name of the downloadable markup artifact.
pub const ARTIFACT_FILE_NAME: &str = "workflow_bpmn_swimlanes.puml";
/// Content type of the markup artifact.
pub const ARTIFACT_CONTENT_TYPE: &str = "text/plain";

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct Generation {
    pub document: WorkflowDocument,
    pub markup: String,
    pub encoded: String,
    pub image_url: String,
    /// Actors added to the lane list because only steps named them.
    pub repaired_actors: Vec<String>,
}

impl Generation {
    /// Write the markup artifact. A directory target gets the default
    /// file name. Returns the path written.
    pub fn write_markup(&self, target: &Path) -> std::io::Result<PathBuf> {
        let path = if target.is_dir() {
            target.join(ARTIFACT_FILE_NAME)
        } else {
            target.to_path_buf()
        };
        std::fs::write(&path, &self.markup)?;
        tracing::info!(path = %path.display(), content_type = ARTIFACT_CONTENT_TYPE, "Markup written");
        Ok(path)
    }
}

/// The deterministic half of a run: document to markup and URL.
#[derive(Debug, Clone)]
pub struct Renderer {
    pub options: RenderOptions,
    pub encoding: Encoding,
    pub server: String,
    pub format: DiagramFormat,
}

impl Renderer {
    pub fn from_config(cfg: &Config) -> Self {
        let mut options = RenderOptions::for_variant(cfg.render.variant);
        if let Some(repair) = cfg.render.repair_actors {
            options.repair_actors = repair;
        }
        Self {
            options,
            encoding: cfg.encoding(),
            server: cfg.render.server.clone(),
            format: cfg.render.format,
        }
    }

    pub fn render(&self, document: WorkflowDocument) -> Result<Generation, EncodeError> {
        let puml::Rendered {
            markup,
            added_actors: repaired_actors,
        } = puml::render_markup(&document, &self.options);
        let encoded = encode::encode(&markup, self.encoding)?;
        let image_url = encode::diagram_url(&self.server, self.format, &encoded);

        tracing::debug!(
            lines = markup.lines().count(),
            encoding = ?self.encoding,
            url_len = image_url.len(),
            "Markup rendered"
        );

        Ok(Generation {
            document,
            markup,
            encoded,
            image_url,
            repaired_actors,
        })
    }
}

/// Extraction followed by rendering.
pub struct Generator {
    extractor: Extractor,
    renderer: Renderer,
}

impl Generator {
    pub fn new(extractor: Extractor, renderer: Renderer) -> Self {
        Self {
            extractor,
            renderer,
        }
    }

    pub fn from_config(cfg: &Config, provider: Arc<dyn LLMProvider>) -> Self {
        let extractor = Extractor::new(
            provider,
            cfg.llm.temperature,
            cfg.render.variant.strips_code_fences(),
        );
        Self::new(extractor, Renderer::from_config(cfg))
    }

    pub async fn generate(&self, workflow_text: &str) -> anyhow::Result<Generation> {
        let document = self.extractor.extract(workflow_text).await?;
        Ok(self.renderer.render(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plantuml::Variant;
    use crate::workflow::{Step, StepKind};

    fn sample() -> WorkflowDocument {
        WorkflowDocument {
            actors: vec!["A".into()],
            steps: vec![
                Step::new("A", "Start", StepKind::Start),
                Step::new("B", "Ship", StepKind::End),
            ],
        }
    }

    #[test]
    fn test_render_compact_reports_repaired_actors() {
        let renderer = Renderer::from_config(&Config::default());
        let generation = renderer.render(sample()).unwrap();
        assert_eq!(generation.repaired_actors, vec!["B"]);
        assert!(generation.markup.contains("lane B {"));
        assert!(generation
            .image_url
            .starts_with("http://www.plantuml.com/plantuml/svg/"));
        assert_eq!(
            encode::decode(&generation.encoded, Encoding::Deflate).unwrap(),
            generation.markup
        );
        // the reported document is the one that was parsed
        assert_eq!(generation.document.actors, vec!["A"]);
    }

    #[test]
    fn test_render_classic_percent_encodes() {
        let mut cfg = Config::default();
        cfg.render.variant = Variant::Classic;
        let generation = Renderer::from_config(&cfg).render(sample()).unwrap();
        assert!(generation.repaired_actors.is_empty());
        assert!(generation.encoded.starts_with("%40startuml%0A"));
        assert!(!generation.markup.contains("lane B"));
    }

    #[test]
    fn test_repair_override_beats_variant() {
        let mut cfg = Config::default();
        cfg.render.repair_actors = Some(false);
        let generation = Renderer::from_config(&cfg).render(sample()).unwrap();
        assert!(generation.repaired_actors.is_empty());
        assert!(!generation.markup.contains("lane B"));
        // ids stay underscored under the compact variant
        assert!(generation.markup.contains("A_0 --> B_1"));
    }

    #[test]
    fn test_write_markup_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let generation = Renderer::from_config(&Config::default())
            .render(sample())
            .unwrap();

        let written = generation.write_markup(dir.path()).unwrap();
        assert_eq!(written, dir.path().join(ARTIFACT_FILE_NAME));
        assert_eq!(std::fs::read_to_string(&written).unwrap(), generation.markup);

        let custom = dir.path().join("custom.puml");
        assert_eq!(generation.write_markup(&custom).unwrap(), custom);
    }
}
