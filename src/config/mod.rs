// laneforge — Free-text workflows to PlantUML BPMN swim-lane diagrams
// License: Apache-2.0

use crate::plantuml::encode::{DiagramFormat, Encoding};
use crate::plantuml::Variant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("home directory not found")]
    NoHomeDir,
    #[error("no API key found. Set OPENAI_API_KEY or providers.openai.api_key in the config file")]
    MissingApiKey,
    #[error("render server is not a valid URL: {0}")]
    InvalidServer(String),
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_timeout_secs() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderEntry {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: String,
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default)]
    pub format: DiagramFormat,
    #[serde(default)]
    pub variant: Variant,
    /// Overrides the encoding implied by `variant`.
    #[serde(default)]
    pub encoding: Option<Encoding>,
    /// Overrides the actor repair implied by `variant`.
    #[serde(default)]
    pub repair_actors: Option<bool>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            format: DiagramFormat::default(),
            variant: Variant::default(),
            encoding: None,
            repair_actors: None,
        }
    }
}

fn default_server() -> String {
    "http://www.plantuml.com/plantuml".to_string()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
        }
    }
}

fn default_file_name() -> String {
    crate::pipeline::ARTIFACT_FILE_NAME.to_string()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a JSON file, falling back to defaults.
    ///
    /// Environment overrides apply in both cases.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults with environment overrides applied. Used when the config
    /// file cannot be read or parsed.
    pub fn from_env() -> Self {
        Self::with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        config.apply_overrides(var);
        config
    }

    /// Apply environment variable overrides (prefix: LANEFORGE_).
    ///
    /// `OPENAI_API_KEY` is the deployment-provided secret and only fills an
    /// empty key. `LANEFORGE_PROVIDERS_OPENAI_API_KEY` always wins.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.providers.openai.api_key.is_empty() {
            if let Some(v) = var("OPENAI_API_KEY") {
                self.providers.openai.api_key = v;
            }
        }
        if let Some(v) = var("LANEFORGE_PROVIDERS_OPENAI_API_KEY") {
            self.providers.openai.api_key = v;
        }
        if let Some(v) = var("LANEFORGE_PROVIDERS_OPENAI_API_BASE") {
            self.providers.openai.api_base = v;
        }
        if let Some(v) = var("LANEFORGE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = var("LANEFORGE_LLM_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Some(v) = var("LANEFORGE_LLM_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.llm.timeout_secs = n;
            }
        }
        if let Some(v) = var("LANEFORGE_RENDER_SERVER") {
            self.render.server = v;
        }
        if let Some(v) = var("LANEFORGE_RENDER_VARIANT") {
            match v.parse() {
                Ok(variant) => self.render.variant = variant,
                Err(e) => tracing::warn!("Ignoring LANEFORGE_RENDER_VARIANT: {}", e),
            }
        }
    }

    /// Get the default config file path: ~/.laneforge/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".laneforge").join("config.json"))
    }

    /// Encoding in effect: the explicit override, else the variant's own.
    pub fn encoding(&self) -> Encoding {
        self.render
            .encoding
            .unwrap_or_else(|| self.render.variant.encoding())
    }

    /// Validate what a full `generate` run needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.openai.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.validate_render()
    }

    /// Validate only the rendering side (no API key needed).
    pub fn validate_render(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.render.server)
            .map_err(|e| ConfigError::InvalidServer(format!("{} ({})", self.render.server, e)))?;
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Other(format!(
                "temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.temperature, 0.2);
        assert_eq!(cfg.render.server, "http://www.plantuml.com/plantuml");
        assert_eq!(cfg.render.variant, Variant::Compact);
        assert_eq!(cfg.encoding(), Encoding::Deflate);
        assert_eq!(cfg.output.file_name, "workflow_bpmn_swimlanes.puml");
    }

    #[test]
    fn test_parse_minimal_json() {
        let json = r#"{"llm": {"model": "gpt-4o"}}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.llm.temperature, 0.2);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "llm": {"model": "gpt-4o", "temperature": 0.0, "timeout_secs": 30},
            "providers": {"openai": {"api_key": "sk-test", "api_base": "http://localhost:8080/v1"}},
            "render": {"server": "https://kroki.example/plantuml", "format": "png", "variant": "classic", "encoding": "deflate"},
            "output": {"file_name": "out.puml"}
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.providers.openai.api_key, "sk-test");
        assert_eq!(cfg.render.format, DiagramFormat::Png);
        assert_eq!(cfg.render.variant, Variant::Classic);
        // explicit encoding beats the classic variant's percent encoding
        assert_eq!(cfg.encoding(), Encoding::Deflate);
        assert_eq!(cfg.output.file_name, "out.puml");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-secret"),
            ("LANEFORGE_LLM_MODEL", "gpt-4.1"),
            ("LANEFORGE_LLM_TEMPERATURE", "not-a-number"),
            ("LANEFORGE_RENDER_VARIANT", "classic"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.providers.openai.api_key, "sk-secret");
        assert_eq!(cfg.llm.model, "gpt-4.1");
        assert_eq!(cfg.llm.temperature, 0.2);
        assert_eq!(cfg.render.variant, Variant::Classic);
        assert_eq!(cfg.encoding(), Encoding::Percent);
    }

    #[test]
    fn test_fallback_config_keeps_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-secret"),
            ("LANEFORGE_RENDER_VARIANT", "classic"),
        ]
        .into_iter()
        .collect();

        let cfg = Config::with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.providers.openai.api_key, "sk-secret");
        assert_eq!(cfg.render.variant, Variant::Classic);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unreadable_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_key_beats_deployment_secret() {
        let mut cfg = Config::default();
        cfg.providers.openai.api_key = "sk-file".into();
        cfg.apply_overrides(|k| (k == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(cfg.providers.openai.api_key, "sk-file");
    }

    #[test]
    fn test_validate() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingApiKey)));
        assert!(cfg.validate_render().is_ok());

        cfg.providers.openai.api_key = "sk-test".into();
        assert!(cfg.validate().is_ok());

        cfg.render.server = "not a url".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidServer(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = Config::load(Path::new("/definitely/not/here/config.json")).unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }
}
