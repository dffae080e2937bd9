//! Tertiary predictor: ordered symptom-combination rules, fully offline.
//! First matching rule wins; the last rule matches everything, so this tier
//! always yields exactly one prediction.

use crate::record::{DiseasePrediction, PredictionSet, SymptomObservation};

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// All of these must be present. Empty matches any observation.
    pub requires: &'static [&'static str],
    pub disease: &'static str,
    pub confidence: f32,
    pub description: &'static str,
}

pub const RULES: &[Rule] = &[
    Rule {
        requires: &["cough", "runnynose"],
        disease: "Common Cold",
        confidence: 0.75,
        description: "Viral infection of the upper respiratory tract causing runny nose, cough, and congestion.",
    },
    Rule {
        requires: &["headache", "cough"],
        disease: "Upper Respiratory Infection",
        confidence: 0.70,
        description: "Infection affecting the throat, sinuses, and airways.",
    },
    Rule {
        requires: &["headache"],
        disease: "Tension Headache",
        confidence: 0.65,
        description: "Common type of headache caused by muscle tension or stress.",
    },
    Rule {
        requires: &[],
        disease: "General Malaise",
        confidence: 0.60,
        description: "General feeling of discomfort. Consult a doctor for proper evaluation.",
    },
];

impl Rule {
    pub fn matches(&self, obs: &SymptomObservation) -> bool {
        self.requires.iter().all(|s| obs.contains(s))
    }
}

/// Pure and total.
pub fn predict(obs: &SymptomObservation) -> PredictionSet {
    let rule = RULES
        .iter()
        .find(|r| r.matches(obs))
        .unwrap_or(&RULES[RULES.len() - 1]);
    PredictionSet::single(
        DiseasePrediction::new(rule.disease, rule.confidence).described(rule.description),
    )
}
