//! # Inference pipeline
//! raw text → symptoms → {features → classifier} → arbitration →
//! (generative model → rules) → enrichment → summary → record → persistence.
//!
//! All process-wide state lives in an explicitly constructed `InferenceContext`
//! that is shared read-only between concurrent requests.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::enrich::enrich;
use crate::llm::{build_client_from_config, DynLlmClient};
use crate::normalize::extract_symptoms;
use crate::predict::{resolve, Arbiter, Predictors, PrimaryPredictor, SecondarySettings};
use crate::record::{InferenceRecord, PredictorTier};
use crate::stt::{build_transcriber, degraded_text, Transcriber};
use crate::store::{JsonlStore, MemoryStore, RecordStore};
use crate::tables::LookupTables;

/// The only caller-visible pipeline error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("either text or audio must be supplied")]
    MissingInput,
}

/// One request. Audio wins over text when both are present.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub user_id: String,
    pub text: Option<String>,
    pub audio: Option<Vec<u8>>,
}

impl AnalysisInput {
    pub fn text(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: Some(text.into()),
            audio: None,
        }
    }

    pub fn audio(user_id: impl Into<String>, audio: Vec<u8>) -> Self {
        Self {
            user_id: user_id.into(),
            text: None,
            audio: Some(audio),
        }
    }
}

/// Pipeline result returned to the caller.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub record: InferenceRecord,
    /// False when the record store rejected the append.
    pub persisted: bool,
}

pub struct InferenceContext {
    pub tables: Arc<LookupTables>,
    pub primary: Arc<PrimaryPredictor>,
    pub arbiter: Arbiter,
    pub llm: DynLlmClient,
    pub secondary: SecondarySettings,
    pub summary_timeout: Duration,
    pub transcriber: Box<dyn Transcriber>,
    pub store: Box<dyn RecordStore>,
}

impl InferenceContext {
    /// Build everything from config. Load failures degrade, they do not abort.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let tables = match LookupTables::load_from_dir(&cfg.paths.data_dir) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(target: "startup", error = ?e, "lookup tables unavailable, enrichment will use defaults");
                LookupTables::empty()
            }
        };
        let primary = PrimaryPredictor::load_or_disable(
            &cfg.paths.models_dir,
            cfg.prediction.top_n,
            cfg.prediction.min_probability,
        );
        let store: Box<dyn RecordStore> = match &cfg.paths.records_path {
            Some(p) if !p.as_os_str().is_empty() => Box::new(JsonlStore::new(p.clone())),
            _ => Box::new(MemoryStore::with_capacity(2000)),
        };

        let (sev, desc, prec) = tables.sizes();
        info!(
            target: "startup",
            severity_rows = sev,
            description_rows = desc,
            precaution_rows = prec,
            primary_available = primary.is_available(),
            llm_provider = %cfg.llm.provider,
            llm_enabled = cfg.llm.enabled,
            key_len = cfg.llm.api_key.len(),
            "inference context ready"
        );

        Self {
            tables: Arc::new(tables),
            primary: Arc::new(primary),
            arbiter: Arbiter::from_config(&cfg.arbitration),
            llm: build_client_from_config(&cfg.llm),
            secondary: SecondarySettings {
                top_n: cfg.prediction.top_n,
                min_probability: cfg.prediction.min_probability,
                timeout: Duration::from_millis(cfg.llm.timeout_ms),
                attempts: cfg.llm.attempts,
            },
            summary_timeout: Duration::from_millis(cfg.llm.timeout_ms),
            transcriber: build_transcriber(&cfg.stt),
            store,
        }
    }

    /// Builder: swap the record store.
    pub fn with_store(mut self, store: Box<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    /// Builder: swap the transcriber.
    pub fn with_transcriber(mut self, t: Box<dyn Transcriber>) -> Self {
        self.transcriber = t;
        self
    }

    pub async fn analyze(&self, input: AnalysisInput) -> Result<Analysis, InputError> {
        let raw_text = self.raw_text(&input).await?;
        counter!("inference_requests_total").increment(1);

        let symptoms = extract_symptoms(&raw_text);
        info!(
            target: "pipeline",
            text_id = %anon_hash(&raw_text),
            symptoms = ?symptoms.as_slice(),
            "symptoms extracted"
        );

        let finalized = resolve(
            Predictors {
                primary: &self.primary,
                arbiter: &self.arbiter,
                llm: self.llm.as_ref(),
                secondary: &self.secondary,
                tables: &self.tables,
            },
            &symptoms,
        )
        .await;

        let predictions = enrich(finalized.set, &self.tables);
        let summary = crate::summary::summarize(
            self.llm.as_ref(),
            self.summary_timeout,
            &raw_text,
            &symptoms,
            &predictions,
        )
        .await;

        let record = InferenceRecord {
            user_id: input.user_id,
            raw_text,
            symptoms,
            predictions,
            predictor: finalized.tier,
            fallback_trail: finalized.trail,
            summary,
            created_at: chrono::Utc::now(),
        };
        log_outcome(&record);

        let persisted = match self.store.append(&record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "persist", error = ?e, user = %record.user_id, "inference record not persisted");
                counter!("records_persist_failed_total").increment(1);
                false
            }
        };

        Ok(Analysis { record, persisted })
    }

    async fn raw_text(&self, input: &AnalysisInput) -> Result<String, InputError> {
        if let Some(audio) = input.audio.as_deref().filter(|a| !a.is_empty()) {
            return Ok(match self.transcriber.transcribe(audio).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(target: "pipeline", transcriber = self.transcriber.name(), error = %e, "transcription failed");
                    degraded_text(&e)
                }
            });
        }
        match input.text.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => Ok(t.to_string()),
            _ => Err(InputError::MissingInput),
        }
    }
}

fn log_outcome(r: &InferenceRecord) {
    let top = r.predictions.top().map(|p| p.disease.as_str()).unwrap_or("-");
    if r.predictor == PredictorTier::Primary {
        info!(target: "pipeline", tier = r.predictor.as_str(), top, "prediction finalized");
    } else {
        info!(target: "pipeline", tier = r.predictor.as_str(), top, trail = ?r.fallback_trail, "prediction finalized after fallback");
    }
}

/// Short SHA-256 fingerprint; raw narratives are never logged.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
