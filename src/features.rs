//! Feature vector builder: canonical symptoms → severity-weighted vector in the
//! classifier's column order.

use std::collections::HashMap;

use crate::record::SymptomObservation;
use crate::tables::{clean_key, LookupTables};

/// Weight used when a present symptom has no severity row.
pub const DEFAULT_WEIGHT: f32 = 1.0;

/// Ordered symptom columns the classifier was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct SymptomSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl SymptomSchema {
    /// Duplicate columns keep their first position.
    pub fn new(columns: Vec<String>) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| clean_key(c)).collect();
        let mut index = HashMap::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            index.entry(c.clone()).or_insert(i);
        }
        Self { columns, index }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, symptom: &str) -> Option<usize> {
        self.index.get(symptom).copied()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Fixed-length, non-negative, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of a build: the vector plus the symptoms that had no schema column.
#[derive(Debug, Clone)]
pub struct BuiltFeatures {
    pub vector: FeatureVector,
    pub skipped: Vec<String>,
}

pub fn build_feature_vector(
    obs: &SymptomObservation,
    schema: &SymptomSchema,
    tables: &LookupTables,
) -> BuiltFeatures {
    let mut v = vec![0.0f32; schema.len()];
    let mut skipped = Vec::new();

    for raw in obs.as_slice() {
        let symptom = clean_key(raw);
        match schema.position(&symptom) {
            Some(i) => v[i] = tables.severity(&symptom).unwrap_or(DEFAULT_WEIGHT),
            None => {
                tracing::warn!(target: "features", %symptom, "symptom not in schema columns, skipped");
                skipped.push(symptom);
            }
        }
    }

    BuiltFeatures {
        vector: FeatureVector(v),
        skipped,
    }
}
