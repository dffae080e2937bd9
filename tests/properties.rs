//! Randomized invariants for the offline stages (normalizer, features, ranking, rules).
//! Seeds are fixed so failures reproduce.

use std::collections::HashMap;

use rand::{rngs::StdRng, Rng, SeedableRng};

use symptom_storyteller::features::{build_feature_vector, SymptomSchema};
use symptom_storyteller::normalize::{extract_symptoms, DEFAULT_SYMPTOMS, TRIGGERS};
use symptom_storyteller::predict::tertiary;
use symptom_storyteller::record::{DiseasePrediction, PredictionSet};
use symptom_storyteller::tables::LookupTables;

const WORDS: &[&str] = &[
    "i", "feel", "really", "bad", "today", "my", "and", "also", "since", "yesterday",
    "headache", "cough", "Fever", "NOSE", "tired", "itchy", "rash", "chills", "sweating",
    "back", "pain", "vomit", "dizzy", "breathless", "chest", "stomach", "joint", "weak",
    "😷", "—", "...", "ümlaut", "",
];

fn random_sentence(rng: &mut StdRng) -> String {
    let n = rng.random_range(0..12);
    (0..n)
        .map(|_| WORDS[rng.random_range(0..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

fn schema() -> SymptomSchema {
    let mut cols: Vec<String> = TRIGGERS.iter().map(|(_, s)| s.to_string()).collect();
    cols.sort();
    cols.dedup();
    SymptomSchema::new(cols)
}

fn tables() -> LookupTables {
    let severity: HashMap<String, f32> = [("headache", 3.0), ("cough", 4.0), ("high fever", 7.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    LookupTables::new(severity, HashMap::new(), HashMap::new())
}

#[test]
fn normalizer_never_returns_empty_and_never_repeats() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let text = random_sentence(&mut rng);
        let obs = extract_symptoms(&text);
        assert!(!obs.is_empty(), "empty observation for {text:?}");

        let mut seen = obs.as_slice().to_vec();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), obs.len(), "duplicates for {text:?}");

        // deterministic
        assert_eq!(extract_symptoms(&text), obs);
    }
}

#[test]
fn normalizer_defaults_only_without_any_trigger() {
    let obs = extract_symptoms("");
    assert_eq!(obs.as_slice(), DEFAULT_SYMPTOMS);
    let obs = extract_symptoms("   ");
    assert_eq!(obs.as_slice(), DEFAULT_SYMPTOMS);
}

#[test]
fn feature_vector_matches_schema_width_and_is_non_negative() {
    let schema = schema();
    let tables = tables();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..300 {
        let obs = extract_symptoms(&random_sentence(&mut rng));
        let built = build_feature_vector(&obs, &schema, &tables);
        assert_eq!(built.vector.len(), schema.len());
        assert!(built.vector.as_slice().iter().all(|w| *w >= 0.0));

        let lit = built.vector.as_slice().iter().filter(|w| **w > 0.0).count();
        assert_eq!(lit + built.skipped.len(), obs.len());
    }
}

#[test]
fn ranked_sets_are_sorted_bounded_and_floored() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..300 {
        let n = rng.random_range(0..10);
        let items: Vec<DiseasePrediction> = (0..n)
            .map(|i| DiseasePrediction::new(format!("d{i}"), rng.random_range(0.0..1.0)))
            .collect();
        let top_n = rng.random_range(1..5);
        let set = PredictionSet::ranked(items, top_n, 0.05);

        assert!(set.len() <= top_n);
        let probs: Vec<f32> = set.iter().map(|p| p.probability).collect();
        assert!(probs.windows(2).all(|w| w[0] >= w[1]), "not sorted: {probs:?}");
        assert!(probs.iter().all(|p| *p >= 0.05));
    }
}

#[test]
fn tertiary_is_total_and_deterministic() {
    let mut rng = StdRng::seed_from_u64(31);
    for _ in 0..500 {
        let obs = extract_symptoms(&random_sentence(&mut rng));
        let a = tertiary::predict(&obs);
        let b = tertiary::predict(&obs);
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);

        let top = a.top().unwrap();
        assert!((0.0..=1.0).contains(&top.probability));
        assert!(!top.description.is_empty());
    }
}
