// laneforge — Fetch rendered diagrams from a PlantUML server

use reqwest::Client;
use std::path::Path;
use std::time::Duration;

/// A rendered diagram as returned by the server.
#[derive(Debug, Clone)]
pub struct DiagramImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DiagramImage {
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

/// Thin GET client for the rendering server.
pub struct DiagramFetcher {
    client: Client,
}

impl DiagramFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("laneforge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> anyhow::Result<DiagramImage> {
        tracing::debug!(url_len = url.len(), "Fetching rendered diagram");

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Rendering server error ({})", status);
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();

        tracing::info!(content_type = %content_type, bytes = bytes.len(), "Diagram received");
        Ok(DiagramImage {
            content_type,
            bytes,
        })
    }
}
