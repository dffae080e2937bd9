// tests/pipeline_e2e.rs
//
// End-to-end pipeline runs with in-process fakes for the classifier, the
// generative model, the transcriber and the record store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use symptom_storyteller::config::ArbitrationConfig;
use symptom_storyteller::features::SymptomSchema;
use symptom_storyteller::llm::{DisabledClient, DynLlmClient, LlmError, MockClient};
use symptom_storyteller::pipeline::{AnalysisInput, InferenceContext, InputError};
use symptom_storyteller::predict::{
    Arbiter, Classifier, LabelEncoder, ModelArtifacts, PrimaryPredictor, SecondarySettings,
};
use symptom_storyteller::record::{InferenceRecord, Precautions, PredictorTier};
use symptom_storyteller::stt::{DisabledTranscriber, FixedTranscriber};
use symptom_storyteller::store::{MemoryStore, RecordStore};
use symptom_storyteller::tables::LookupTables;

const LABELS: [&str; 4] = ["GERD", "Malaria", "Common Cold", "Migraine"];
const COLUMNS: [&str; 5] = ["cough", "runnynose", "headache", "fatigue", "highfever"];

/// Returns the same distribution for every input.
struct StubClassifier(Vec<f32>);

impl Classifier for StubClassifier {
    fn n_features(&self) -> usize {
        COLUMNS.len()
    }
    fn n_classes(&self) -> usize {
        LABELS.len()
    }
    fn predict_proba(&self, _x: &[f32]) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

struct FailingStore;

#[async_trait::async_trait]
impl RecordStore for FailingStore {
    async fn append(&self, _record: &InferenceRecord) -> Result<()> {
        anyhow::bail!("disk full")
    }
    async fn for_user(&self, _user_id: &str) -> Result<Vec<InferenceRecord>> {
        Ok(Vec::new())
    }
}

fn tables() -> LookupTables {
    LookupTables::new(
        HashMap::from([("cough".to_string(), 4.0), ("runnynose".to_string(), 5.0)]),
        HashMap::from([
            ("Malaria".to_string(), "Mosquito-borne disease.".to_string()),
            ("Common Cold".to_string(), "Viral infection of the nose and throat.".to_string()),
        ]),
        HashMap::from([(
            "Malaria".to_string(),
            vec!["consult nearest hospital".to_string(), "keep mosquitos out".to_string()],
        )]),
    )
}

fn primary(dist: Option<Vec<f32>>) -> PrimaryPredictor {
    match dist {
        None => PrimaryPredictor::unavailable(),
        Some(d) => {
            let a = ModelArtifacts::new(
                Box::new(StubClassifier(d)),
                LabelEncoder::new(LABELS.iter().map(|s| s.to_string()).collect()),
                SymptomSchema::new(COLUMNS.iter().map(|s| s.to_string()).collect()),
            )
            .expect("stub artifacts agree");
            PrimaryPredictor::new(a, 3, 0.05)
        }
    }
}

fn context(dist: Option<Vec<f32>>, llm: DynLlmClient) -> InferenceContext {
    InferenceContext {
        tables: Arc::new(tables()),
        primary: Arc::new(primary(dist)),
        arbiter: Arbiter::from_config(&ArbitrationConfig::default()),
        llm,
        secondary: SecondarySettings {
            top_n: 3,
            min_probability: 0.05,
            timeout: Duration::from_millis(200),
            attempts: 1,
        },
        summary_timeout: Duration::from_millis(200),
        transcriber: Box::new(DisabledTranscriber),
        store: Box::new(MemoryStore::with_capacity(100)),
    }
}

#[tokio::test]
async fn runny_nose_and_cough_hits_common_cold_rule_when_remote_tiers_are_off() {
    let ctx = context(None, Arc::new(DisabledClient));
    let a = ctx
        .analyze(AnalysisInput::text("u1", "I have a runny nose and cough"))
        .await
        .unwrap();

    let r = &a.record;
    assert!(r.symptoms.contains("runnynose") && r.symptoms.contains("cough"));
    assert_eq!(r.predictor, PredictorTier::Tertiary);
    assert_eq!(r.predictions.len(), 1);
    let top = r.predictions.top().unwrap();
    assert_eq!(top.disease, "Common Cold");
    assert!((top.probability - 0.75).abs() < 1e-6);
    // Known label → table description wins over the rule's own text.
    assert_eq!(top.description, "Viral infection of the nose and throat.");
    assert!(r.summary.contains("75.00% probability of Common Cold"));
    assert_eq!(r.fallback_trail.len(), 2);
    assert!(a.persisted);
}

#[tokio::test]
async fn unrecognized_text_uses_default_symptoms_and_still_answers() {
    let ctx = context(None, Arc::new(DisabledClient));
    let a = ctx
        .analyze(AnalysisInput::text("u1", "I feel off today"))
        .await
        .unwrap();

    let r = &a.record;
    assert_eq!(r.symptoms.as_slice(), ["headache", "fatigue"]);
    assert_eq!(r.predictions.top().unwrap().disease, "Tension Headache");
    assert_eq!(
        r.predictions.top().unwrap().precautions,
        Precautions::Unavailable
    );
    assert!(r.summary.starts_with("Based on your symptoms"));
    assert!(r.summary.ends_with("Please consult a healthcare provider for proper diagnosis."));
}

#[tokio::test]
async fn denylisted_top_label_escalates_to_secondary_despite_high_confidence() {
    let llm = Arc::new(
        MockClient::always("Rest well and see a clinician.").then(Ok(
            r#"Here: {"predictions": [
                {"disease": "Malaria", "probability": "55%", "description": "LLM text"},
                {"disease": "Dengue", "probability": "30%", "description": "Fever and aches."}
            ]}"#
                .to_string(),
        )),
    );
    let ctx = context(Some(vec![0.90, 0.04, 0.03, 0.03]), llm.clone());
    let a = ctx
        .analyze(AnalysisInput::text("u1", "cough and fever"))
        .await
        .unwrap();

    let r = &a.record;
    assert_eq!(r.predictor, PredictorTier::Secondary);
    assert!(r.fallback_trail[0].contains("\"GERD\" is denylisted"));
    let labels: Vec<_> = r.predictions.iter().map(|p| p.disease.as_str()).collect();
    assert_eq!(labels, vec!["Malaria", "Dengue"]);
    // Enrichment is source-independent for known labels.
    assert_eq!(r.predictions.top().unwrap().description, "Mosquito-borne disease.");
    assert_eq!(r.predictions.iter().nth(1).unwrap().description, "Fever and aches.");
    assert_eq!(r.summary, "Rest well and see a clinician.");
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn denylisted_top_with_failing_secondary_lands_on_rules() {
    let llm = Arc::new(MockClient::failing(LlmError::Status(500)));
    let ctx = context(Some(vec![0.90, 0.04, 0.03, 0.03]), llm);
    let a = ctx
        .analyze(AnalysisInput::text("u1", "headache and cough"))
        .await
        .unwrap();

    let r = &a.record;
    assert_eq!(r.predictor, PredictorTier::Tertiary);
    assert_eq!(r.predictions.top().unwrap().disease, "Upper Respiratory Infection");
    assert!(r.fallback_trail[1].starts_with("secondary failed"));
    assert!(r.summary.contains("Upper Respiratory Infection"));
}

#[tokio::test]
async fn trusted_primary_is_returned_enriched() {
    let llm = Arc::new(MockClient::failing(LlmError::Disabled));
    let ctx = context(Some(vec![0.10, 0.70, 0.15, 0.05]), llm.clone());
    let a = ctx
        .analyze(AnalysisInput::text("u1", "fever with chills"))
        .await
        .unwrap();

    let r = &a.record;
    assert_eq!(r.predictor, PredictorTier::Primary);
    assert!(r.fallback_trail.is_empty());
    let labels: Vec<_> = r.predictions.iter().map(|p| p.disease.as_str()).collect();
    assert_eq!(labels, vec!["Malaria", "Common Cold", "GERD"]);
    let top = r.predictions.top().unwrap();
    assert_eq!(top.probability_pct, "70.00%");
    assert_eq!(
        top.precautions,
        Precautions::Listed(vec![
            "consult nearest hospital".into(),
            "keep mosquitos out".into()
        ])
    );
    // Only the summarizer talked to the model.
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn slow_model_times_out_into_fallbacks() {
    let llm = Arc::new(
        MockClient::always(r#"{"predictions": [{"disease": "Flu", "probability": 0.9}]}"#)
            .delayed(Duration::from_secs(5)),
    );
    let ctx = context(None, llm);
    let started = std::time::Instant::now();
    let a = ctx
        .analyze(AnalysisInput::text("u1", "runny nose, cough"))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(a.record.predictor, PredictorTier::Tertiary);
    assert!(a.record.fallback_trail[1].contains("timed out"));
    assert!(a.record.summary.starts_with("Based on your symptoms"));
}

#[tokio::test]
async fn missing_input_is_the_only_caller_error() {
    let ctx = context(None, Arc::new(DisabledClient));
    let err = ctx
        .analyze(AnalysisInput {
            user_id: "u1".into(),
            text: Some("   ".into()),
            audio: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err, InputError::MissingInput);
    assert!(ctx.analyze(AnalysisInput::default()).await.is_err());
}

#[tokio::test]
async fn audio_is_transcribed_and_failures_degrade_to_text() {
    let ctx = context(None, Arc::new(DisabledClient))
        .with_transcriber(Box::new(FixedTranscriber("I keep sneezing".into())));
    let a = ctx
        .analyze(AnalysisInput::audio("u1", vec![1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(a.record.raw_text, "I keep sneezing");
    assert_eq!(a.record.symptoms.as_slice(), ["continuoussneezing"]);

    let ctx = context(None, Arc::new(DisabledClient));
    let a = ctx
        .analyze(AnalysisInput::audio("u1", vec![1, 2, 3]))
        .await
        .unwrap();
    assert!(a.record.raw_text.starts_with("Error during transcription"));
    assert_eq!(a.record.predictions.len(), 1);
}

#[tokio::test]
async fn persistence_failure_does_not_fail_the_response() {
    let ctx = context(None, Arc::new(DisabledClient)).with_store(Box::new(FailingStore));
    let a = ctx
        .analyze(AnalysisInput::text("u1", "cough"))
        .await
        .unwrap();
    assert!(!a.persisted);
    assert_eq!(a.record.predictions.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_requests_share_the_context() {
    let ctx = Arc::new(context(
        Some(vec![0.10, 0.70, 0.15, 0.05]),
        Arc::new(DisabledClient),
    ));
    let mut handles = Vec::new();
    for i in 0..16 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            ctx.analyze(AnalysisInput::text(format!("user{i}"), "fever"))
                .await
                .map(|a| a.record.predictor)
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), Ok(PredictorTier::Primary));
    }
    assert_eq!(ctx.store.for_user("user3").await.unwrap().len(), 1);
}
