//! Secondary predictor: asks the generative model for a strict-JSON top-N list.
//!
//! Expected payload (embedded anywhere in the model's text):
//! { "predictions": [ { "disease": "...", "probability": "70%", "description": "..." } ] }
//!
//! The first well-formed JSON object in the text is used. Missing JSON, malformed
//! JSON, remote failure or timeout all end up as `SecondaryFailure`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{complete_within, LlmClient, LlmError};
use crate::predict::SecondaryOutcome;
use crate::record::{DiseasePrediction, PredictionSet, SymptomObservation};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SecondaryFailure {
    #[error("remote call failed: {0}")]
    Remote(LlmError),
    #[error("no JSON object in response")]
    NoJson,
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("no usable predictions")]
    NoPredictions,
}

impl SecondaryFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            SecondaryFailure::Remote(e) => e.kind(),
            SecondaryFailure::NoJson => "no_json",
            SecondaryFailure::Malformed(_) => "malformed",
            SecondaryFailure::NoPredictions => "no_predictions",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecondarySettings {
    pub top_n: usize,
    pub min_probability: f32,
    pub timeout: Duration,
    pub attempts: u32,
}

/// Instruction line present in every prediction prompt.
pub const JSON_ONLY_MARKER: &str = "Return ONLY valid JSON:";

pub fn build_prompt(obs: &SymptomObservation, top_n: usize) -> String {
    format!(
        r#"Patient symptoms: {symptoms}

Predict the top {top_n} most likely diseases. {marker}
{{
  "predictions": [
    {{"disease": "Disease Name", "probability": "XX%", "description": "Brief description"}}
  ]
}}"#,
        symptoms = obs.joined(),
        marker = JSON_ONLY_MARKER,
    )
}

pub async fn predict(
    client: &dyn LlmClient,
    obs: &SymptomObservation,
    settings: &SecondarySettings,
) -> SecondaryOutcome {
    let prompt = build_prompt(obs, settings.top_n);
    let mut last = SecondaryFailure::NoPredictions;

    for attempt in 1..=settings.attempts.max(1) {
        let res = complete_within(client, &prompt, settings.timeout)
            .await
            .map_err(SecondaryFailure::Remote)
            .and_then(|raw| parse_response(&raw, settings.top_n, settings.min_probability));
        match res {
            Ok(set) => return SecondaryOutcome::Predicted(set),
            Err(e) => {
                warn!(target: "secondary", attempt, provider = client.provider_name(), error = %e, "secondary attempt failed");
                last = e;
            }
        }
    }
    SecondaryOutcome::Failed(last)
}

/// Parse the model's raw text into a ranked prediction set.
pub fn parse_response(
    raw: &str,
    top_n: usize,
    min_probability: f32,
) -> Result<PredictionSet, SecondaryFailure> {
    let obj = first_json_object(raw).ok_or(SecondaryFailure::NoJson)?;

    #[derive(Deserialize)]
    struct Payload {
        predictions: Vec<Entry>,
    }
    #[derive(Deserialize)]
    struct Entry {
        disease: String,
        probability: Value,
        #[serde(default)]
        description: Option<String>,
    }

    let payload: Payload =
        serde_json::from_value(obj).map_err(|e| SecondaryFailure::Malformed(e.to_string()))?;

    let items = payload
        .predictions
        .into_iter()
        .filter_map(|e| {
            let disease = e.disease.trim().to_string();
            if disease.is_empty() {
                return None;
            }
            let Some(p) = parse_probability(&e.probability) else {
                debug!(target: "secondary", %disease, "dropping entry with unusable probability");
                return None;
            };
            Some(DiseasePrediction::new(disease, p).described(e.description.unwrap_or_default()))
        })
        .collect();

    let set = PredictionSet::ranked(items, top_n, min_probability);
    if set.is_empty() {
        return Err(SecondaryFailure::NoPredictions);
    }
    Ok(set)
}

/// First `{` from which a complete JSON object parses.
pub fn first_json_object(raw: &str) -> Option<Value> {
    raw.char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(i, _)| {
            let mut stream = serde_json::Deserializer::from_str(&raw[i..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(v @ Value::Object(_))) => Some(v),
                _ => None,
            }
        })
}

/// Accepts 0.7, 70, "70%", "0.7", " 70 % ". Values above 1 are percentages.
pub fn parse_probability(v: &Value) -> Option<f32> {
    let (n, had_pct) = match v {
        Value::Number(n) => (n.as_f64()?, false),
        Value::String(s) => {
            let t = s.trim();
            let (num, pct) = match t.strip_suffix('%') {
                Some(rest) => (rest.trim(), true),
                None => (t, false),
            };
            (num.parse::<f64>().ok()?, pct)
        }
        _ => return None,
    };
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    let p = if had_pct || n > 1.0 { n / 100.0 } else { n };
    if p > 1.0 {
        return None;
    }
    Some(p as f32)
}
