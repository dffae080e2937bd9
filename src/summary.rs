//! Summarizer: a short narrative explanation of the finalized predictions.
//! Remote generative model first; templated text when that fails, times out
//! or returns nothing usable.

use std::time::Duration;

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::llm::{complete_within, LlmClient};
use crate::record::{PredictionSet, SymptomObservation};

/// Cap for the model's narrative (chars).
const MAX_SUMMARY_CHARS: usize = 1200;
/// How much of the description goes into the templated summary (chars).
const TEMPLATE_DESCRIPTION_CHARS: usize = 200;

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

pub fn build_prompt(raw_text: &str, obs: &SymptomObservation, set: &PredictionSet) -> String {
    let top = match set.top() {
        Some(p) => format!("{} ({})", p.disease, p.probability_pct),
        None => "no clear match".to_string(),
    };
    let others = set
        .iter()
        .skip(1)
        .map(|p| format!("{} ({})", p.disease, p.probability_pct))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "A patient described their symptoms as: \"{raw}\"\n\
         Extracted symptoms: {symptoms}\n\
         Most likely condition: {top}\n\
         Other possibilities: {others}\n\n\
         Write a short, empathetic explanation (3-4 sentences) for the patient. \
         Mention the most likely condition in plain language and end with a reminder \
         to consult a healthcare provider for a proper diagnosis. Plain text only.",
        raw = raw_text.trim(),
        symptoms = obs.joined(),
        others = if others.is_empty() { "none" } else { others.as_str() },
    )
}

/// Deterministic summary; never empty.
pub fn templated_summary(obs: &SymptomObservation, set: &PredictionSet) -> String {
    match set.top() {
        Some(top) => {
            let description: String = top
                .description
                .chars()
                .take(TEMPLATE_DESCRIPTION_CHARS)
                .collect();
            format!(
                "Based on your symptoms, our analysis suggests a {} probability of {}. {}... \
                 Please consult a healthcare provider for proper diagnosis.",
                top.probability_pct, top.disease, description
            )
        }
        None => format!(
            "Analysis completed for symptoms: {}. Please consult a healthcare provider.",
            obs.joined()
        ),
    }
}

/// Collapse whitespace, trim, cap length on a char boundary.
pub fn sanitize_summary(input: &str) -> String {
    let collapsed = RE_WS.replace_all(input.trim(), " ");
    collapsed.chars().take(MAX_SUMMARY_CHARS).collect::<String>().trim().to_string()
}

pub async fn summarize(
    client: &dyn LlmClient,
    timeout: Duration,
    raw_text: &str,
    obs: &SymptomObservation,
    set: &PredictionSet,
) -> String {
    let prompt = build_prompt(raw_text, obs, set);
    match complete_within(client, &prompt, timeout).await {
        Ok(text) => {
            let cleaned = sanitize_summary(&text);
            if !cleaned.is_empty() {
                return cleaned;
            }
            warn!(target: "summary", "empty narrative, using template");
        }
        Err(e) => {
            warn!(target: "summary", provider = client.provider_name(), error = %e, "narrative failed, using template");
        }
    }
    counter!("summary_fallback_total").increment(1);
    templated_summary(obs, set)
}
