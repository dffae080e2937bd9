// src/stt.rs
//! Speech-to-text collaborator. Treated as a black-box text producer: any failure
//! becomes degraded input text, never a pipeline error.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;

use crate::config::SttConfig;

#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Text that flows through the pipeline when transcription fails.
pub fn degraded_text(err: &anyhow::Error) -> String {
    format!("Error during transcription: {err}")
}

/// Posts raw audio bytes to a transcription endpoint. Accepts either a JSON body
/// with a `text` field or a plain-text body.
pub struct HttpTranscriber {
    endpoint: String,
    client: Client,
}

impl HttpTranscriber {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("symptom-storyteller/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .context("stt post")?
            .error_for_status()
            .context("stt non-2xx")?;
        let body = resp.text().await.context("stt body")?;
        let text = text_from_body(&body);
        if text.is_empty() {
            return Err(anyhow!("empty transcription"));
        }
        Ok(text)
    }
    fn name(&self) -> &'static str {
        "http"
    }
}

fn text_from_body(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct Out {
        text: String,
    }
    match serde_json::from_str::<Out>(body) {
        Ok(o) => o.text.trim().to_string(),
        Err(_) => body.trim().to_string(),
    }
}

pub struct DisabledTranscriber;

#[async_trait::async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Err(anyhow!("speech-to-text disabled"))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns a fixed transcript; for tests and local runs.
pub struct FixedTranscriber(pub String);

#[async_trait::async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

pub fn build_transcriber(cfg: &SttConfig) -> Box<dyn Transcriber> {
    let endpoint = cfg.endpoint.as_deref().map(str::trim).unwrap_or_default();
    if !cfg.enabled || endpoint.is_empty() {
        return Box::new(DisabledTranscriber);
    }
    match HttpTranscriber::new(endpoint, Duration::from_millis(cfg.timeout_ms)) {
        Ok(t) => Box::new(t),
        Err(e) => {
            tracing::error!(target: "startup", error = ?e, "stt client could not be built, disabling");
            Box::new(DisabledTranscriber)
        }
    }
}
