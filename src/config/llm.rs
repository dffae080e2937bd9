// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "groq".to_string()
}
fn default_model() -> String {
    "llama3-8b-8192".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_ms() -> u64 {
    15_000
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    500
}
fn default_attempts() -> u32 {
    1
}

/// Generative-model settings shared by the secondary predictor and the summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "groq" | "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from GROQ_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Overrides the provider's chat-completions URL (self-hosted gateways, tests).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Attempts per request for the secondary predictor. One means no retry.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            base_url: None,
            timeout_ms: default_timeout_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            attempts: default_attempts(),
        }
    }
}

/// Providers with an OpenAI-compatible chat-completions API.
pub const SUPPORTED_PROVIDERS: [&str; 2] = ["groq", "openai"];

impl LlmConfig {
    /// Normalize provider, resolve the "ENV" key indirection and sanitize numbers.
    ///
    /// An unsupported provider disables the generative model instead of failing the
    /// whole config. A missing key env var is not an error either: the client
    /// reports `MissingApiKey` on every call and the pipeline falls through.
    pub fn resolve(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();

        if !SUPPORTED_PROVIDERS.contains(&self.provider.as_str()) {
            tracing::error!(
                target: "startup",
                provider = %self.provider,
                "unsupported LLM provider, generative model disabled"
            );
            self.enabled = false;
            self.api_key.clear();
        } else if self.api_key.trim().eq_ignore_ascii_case("env") {
            let var = match self.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                _ => "GROQ_API_KEY",
            };
            self.api_key = env::var(var).unwrap_or_default();
        }

        if self.timeout_ms == 0 {
            self.timeout_ms = default_timeout_ms();
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
        self.attempts = self.attempts.max(1);

        self
    }

    /// Chat-completions endpoint for the configured provider.
    pub fn endpoint(&self) -> String {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.trim().to_string();
        }
        match self.provider.as_str() {
            "openai" => "https://api.openai.com/v1/chat/completions".to_string(),
            _ => "https://api.groq.com/openai/v1/chat/completions".to_string(),
        }
    }
}
