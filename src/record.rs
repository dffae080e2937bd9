//! Shapes shared by every tier of the pipeline: symptom observations,
//! disease predictions, prediction sets and the persisted inference record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered, de-duplicated canonical symptoms extracted from one narrative.
/// Order is first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomObservation(Vec<String>);

impl SymptomObservation {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends `symptom` unless already present. Returns whether it was added.
    pub fn push(&mut self, symptom: impl Into<String>) -> bool {
        let s = symptom.into();
        if self.0.iter().any(|x| *x == s) {
            return false;
        }
        self.0.push(s);
        true
    }

    pub fn contains(&self, symptom: &str) -> bool {
        self.0.iter().any(|x| x == symptom)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Natural-language join used in prompts and templated summaries.
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

impl<S: Into<String>> FromIterator<S> for SymptomObservation {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut obs = Self::new();
        for s in iter {
            obs.push(s);
        }
        obs
    }
}

/// Precaution list attached by the enricher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precautions {
    /// Up to four items, in table order.
    Listed(Vec<String>),
    /// Lookup miss.
    Unavailable,
}

impl Precautions {
    pub const UNAVAILABLE_TEXT: &'static str = "No precautions available";

    pub fn items(&self) -> Vec<&str> {
        match self {
            Precautions::Listed(v) => v.iter().map(String::as_str).collect(),
            Precautions::Unavailable => vec![Self::UNAVAILABLE_TEXT],
        }
    }
}

/// One ranked disease candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub disease: String,
    /// In <0.0, 1.0>.
    pub probability: f32,
    /// Same value rendered as `"{:.2}%"` for UI consumers.
    pub probability_pct: String,
    pub description: String,
    pub precautions: Precautions,
}

impl DiseasePrediction {
    /// Un-enriched prediction; description/precautions are filled by the enricher.
    pub fn new(disease: impl Into<String>, probability: f32) -> Self {
        let p = clamp01(probability);
        Self {
            disease: disease.into(),
            probability: p,
            probability_pct: format_pct(p),
            description: String::new(),
            precautions: Precautions::Unavailable,
        }
    }

    /// Builder: a description supplied by the predictor itself.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// 0..=top_n predictions sorted by descending probability, floor applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionSet(Vec<DiseasePrediction>);

impl PredictionSet {
    /// Sort (stable, descending), drop entries below `min_probability`, keep `top_n`.
    pub fn ranked(mut items: Vec<DiseasePrediction>, top_n: usize, min_probability: f32) -> Self {
        items.retain(|p| p.probability.is_finite() && p.probability >= min_probability);
        items.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        items.truncate(top_n);
        Self(items)
    }

    /// A set holding exactly one entry, no floor applied.
    pub fn single(p: DiseasePrediction) -> Self {
        Self(vec![p])
    }

    pub fn top(&self) -> Option<&DiseasePrediction> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiseasePrediction> {
        self.0.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, DiseasePrediction> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which predictor produced the finalized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorTier {
    Primary,
    Secondary,
    Tertiary,
}

impl PredictorTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictorTier::Primary => "primary",
            PredictorTier::Secondary => "secondary",
            PredictorTier::Tertiary => "tertiary",
        }
    }
}

/// Durable result of one request. Built once after the pipeline completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub user_id: String,
    pub raw_text: String,
    pub symptoms: SymptomObservation,
    pub predictions: PredictionSet,
    pub predictor: PredictorTier,
    /// Why each earlier tier was skipped, in evaluation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_trail: Vec<String>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn format_pct(p: f32) -> String {
    format!("{:.2}%", p * 100.0)
}

fn clamp01(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_keeps_first_seen_order_without_duplicates() {
        let obs: SymptomObservation = ["cough", "runnynose", "cough", "headache"]
            .into_iter()
            .collect();
        assert_eq!(obs.as_slice(), ["cough", "runnynose", "headache"]);
        assert_eq!(obs.joined(), "cough, runnynose, headache");
    }

    #[test]
    fn ranked_sorts_filters_and_truncates() {
        let set = PredictionSet::ranked(
            vec![
                DiseasePrediction::new("A", 0.10),
                DiseasePrediction::new("B", 0.50),
                DiseasePrediction::new("C", 0.04),
                DiseasePrediction::new("D", 0.30),
                DiseasePrediction::new("E", 0.20),
            ],
            3,
            0.05,
        );
        let labels: Vec<_> = set.iter().map(|p| p.disease.as_str()).collect();
        assert_eq!(labels, vec!["B", "D", "E"]);
    }

    #[test]
    fn probability_is_clamped_and_formatted() {
        let p = DiseasePrediction::new("Flu", 0.7512);
        assert_eq!(p.probability_pct, "75.12%");
        assert_eq!(DiseasePrediction::new("X", 3.0).probability, 1.0);
        assert_eq!(DiseasePrediction::new("X", f32::NAN).probability, 0.0);
    }

    #[test]
    fn serialize_prediction_shape() {
        let p = DiseasePrediction::new("Common Cold", 0.75).described("Viral infection.");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["disease"], serde_json::json!("Common Cold"));
        assert_eq!(v["probability_pct"], serde_json::json!("75.00%"));
        assert_eq!(v["precautions"], serde_json::json!("unavailable"));
    }
}
