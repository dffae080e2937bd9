//! Symptom normalizer: narrative text → ordered, de-duplicated canonical symptoms.
//!
//! Plain case-insensitive substring matching over a fixed, ordered trigger table.
//! Triggers overlap on purpose ("pain" → jointpain, "cold" → chills); the table is
//! kept exactly as the classifier's vocabulary expects it, not medically "fixed".

use crate::record::SymptomObservation;

/// Returned when no trigger matches, so downstream stages always get input.
pub const DEFAULT_SYMPTOMS: [&str; 2] = ["headache", "fatigue"];

/// (trigger substring, canonical symptom), scanned in this order.
pub const TRIGGERS: &[(&str, &str)] = &[
    ("headache", "headache"),
    ("head pain", "headache"),
    ("head", "headache"),
    ("fever", "highfever"),
    ("temperature", "highfever"),
    ("high fever", "highfever"),
    ("cough", "cough"),
    ("coughing", "cough"),
    ("sneez", "continuoussneezing"),
    ("burn", "burningmicturition"),
    ("burning", "burningmicturition"),
    ("runny", "runnynose"),
    ("running nose", "runnynose"),
    ("nose", "runnynose"),
    ("joint", "jointpain"),
    ("pain", "jointpain"),
    ("weak", "muscleweakness"),
    ("muscle pain", "musclepain"),
    ("body ache", "musclepain"),
    ("ache", "musclepain"),
    ("tired", "fatigue"),
    ("fatigue", "fatigue"),
    ("nausea", "nausea"),
    ("vomit", "vomiting"),
    ("stomach", "stomachpain"),
    ("belly", "stomachpain"),
    ("dizzy", "dizziness"),
    ("skin", "skinrash"),
    ("rash", "skinrash"),
    ("itch", "itching"),
    ("breathe", "breathlessness"),
    ("breath", "breathlessness"),
    ("chest", "chestpain"),
    ("sweat", "sweating"),
    ("appetite", "lossofappetite"),
    ("chill", "chills"),
    ("shiver", "shivering"),
    ("cold", "chills"),
];

/// Extract canonical symptoms from `raw_text`. Never returns an empty observation.
pub fn extract_symptoms(raw_text: &str) -> SymptomObservation {
    let text = raw_text.to_lowercase();

    let mut obs = SymptomObservation::new();
    for (trigger, symptom) in TRIGGERS {
        if text.contains(trigger) {
            obs.push(*symptom);
        }
    }

    if obs.is_empty() {
        tracing::debug!(target: "normalizer", "no trigger matched, using default symptoms");
        return DEFAULT_SYMPTOMS.into_iter().collect();
    }
    obs
}
