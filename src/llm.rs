//! Generative-model adapter: provider abstraction shared by the secondary predictor
//! and the summarizer.
//!
//! Prompt in, raw text out. Every failure mode
//! (disabled, missing key, transport, non-2xx, empty body, timeout) is a value of
//! `LlmError` so callers can fall through to their deterministic fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("generative model disabled")]
    Disabled,
    #[error("missing API key for provider {0}")]
    MissingApiKey(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("non-success status {0}")]
    Status(u16),
    #[error("empty response")]
    EmptyResponse,
}

impl LlmError {
    /// Short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Disabled => "disabled",
            LlmError::MissingApiKey(_) => "missing_key",
            LlmError::Timeout(_) => "timeout",
            LlmError::Transport(_) => "transport",
            LlmError::Status(_) => "status",
            LlmError::EmptyResponse => "empty",
        }
    }
}

pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

pub trait LlmClient: Send + Sync {
    /// Single attempt: send `prompt`, return the model's raw text.
    fn complete<'a>(&'a self, prompt: &'a str) -> LlmFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLlmClient = Arc<dyn LlmClient>;

/// Bound any client call by `timeout`; elapsing counts as an ordinary failure.
pub async fn complete_within(
    client: &dyn LlmClient,
    prompt: &str,
    timeout: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(timeout, client.complete(prompt)).await {
        Ok(res) => res,
        Err(_) => Err(LlmError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `config.enabled==false`, returns a disabled client.
/// * Else builds the OpenAI-compatible chat-completions client (Groq or OpenAI).
pub fn build_client_from_config(config: &LlmConfig) -> DynLlmClient {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(mock_mode_client());
    }

    if !config.enabled {
        return Arc::new(DisabledClient);
    }

    match ChatCompletionsClient::new(config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(target: "startup", error = ?e, "LLM client could not be built, disabling");
            Arc::new(DisabledClient)
        }
    }
}

/// Mock-mode client: JSON for prediction prompts, a plain narrative otherwise.
fn mock_mode_client() -> MockClient {
    MockClient::always(
        "Your symptoms most closely match a common cold. Rest, drink fluids and \
         please consult a healthcare provider for a proper diagnosis.",
    )
    .answering(
        crate::predict::secondary::JSON_ONLY_MARKER,
        r#"{"predictions": [{"disease": "Common Cold", "probability": "70%", "description": "Mock diagnosis."}]}"#,
    )
}

// ------------------------------------------------------------
// Chat completions (OpenAI-compatible: Groq, OpenAI)
// ------------------------------------------------------------

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_ms: u64,
    provider: &'static str,
}

impl ChatCompletionsClient {
    pub fn new(cfg: &LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("symptom-storyteller/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        let provider = match cfg.provider.as_str() {
            "openai" => "openai",
            _ => "groq",
        };
        Ok(Self {
            http,
            endpoint: cfg.endpoint(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            timeout_ms: cfg.timeout_ms,
            provider,
        })
    }

    async fn complete_impl(&self, prompt: &str) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey(self.provider.to_string()));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_ms)
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(LlmError::Status(resp.status().as_u16()));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            Err(LlmError::EmptyResponse)
        } else {
            Ok(content)
        }
    }
}

impl LlmClient for ChatCompletionsClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        self.provider
    }
}

/// Always fails with `Disabled`.
pub struct DisabledClient;

impl LlmClient for DisabledClient {
    fn complete<'a>(&'a self, _prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(async { Err(LlmError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Scripted client for tests/local runs: replays queued responses in order, then
/// answers by prompt content, then repeats the fallback. Records every prompt.
pub struct MockClient {
    queue: Mutex<Vec<Result<String, LlmError>>>,
    routes: Vec<(String, String)>,
    fallback: Result<String, LlmError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn always(text: impl Into<String>) -> Self {
        Self::with_fallback(Ok(text.into()))
    }

    pub fn failing(err: LlmError) -> Self {
        Self::with_fallback(Err(err))
    }

    fn with_fallback(fallback: Result<String, LlmError>) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            routes: Vec::new(),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Builder: queue one response ahead of the fallback.
    pub fn then(self, next: Result<String, LlmError>) -> Self {
        if let Ok(mut q) = self.queue.lock() {
            q.insert(0, next);
        }
        self
    }

    /// Builder: answer `text` whenever the prompt contains `needle`.
    pub fn answering(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.routes.push((needle.into(), text.into()));
        self
    }

    /// Builder: sleep before answering (exercises caller timeouts).
    pub fn delayed(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_answer(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut q) = self.queue.lock() {
            if let Some(next) = q.pop() {
                return next;
            }
        }
        self.routes
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, text)| Ok(text.clone()))
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl LlmClient for MockClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut p) = self.prompts.lock() {
                p.push(prompt.to_string());
            }
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.next_answer(prompt)
        })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
