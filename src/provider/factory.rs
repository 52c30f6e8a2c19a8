// laneforge — Provider factory

use super::{http::HTTPProvider, LLMProvider};
use crate::config::Config;
use std::time::Duration;

/// Create an LLM provider from the loaded config.
pub fn create_provider(cfg: &Config) -> anyhow::Result<Box<dyn LLMProvider>> {
    let entry = &cfg.providers.openai;
    if entry.api_key.is_empty() {
        anyhow::bail!(
            "No API key configured. Set one in ~/.laneforge/config.json or via environment variables.\n\
             Example: OPENAI_API_KEY=sk-..."
        );
    }

    let provider = HTTPProvider::new(
        entry.api_key.clone(),
        entry.api_base.clone(),
        cfg.llm.model.clone(),
        Duration::from_secs(cfg.llm.timeout_secs),
    )?;

    tracing::info!(
        model = %cfg.llm.model,
        api_base = %provider.api_base(),
        "Creating LLM provider"
    );

    Ok(Box::new(provider))
}
