//! Primary predictor: the pre-trained classifier behind the feature vector builder.

use std::path::Path;

use tracing::{error, info, warn};

use crate::features::{build_feature_vector, FeatureVector, SymptomSchema};
use crate::predict::classifier::ModelArtifacts;
use crate::predict::PrimaryOutcome;
use crate::record::{DiseasePrediction, PredictionSet, SymptomObservation};
use crate::tables::LookupTables;

#[derive(Debug)]
pub struct PrimaryPredictor {
    artifacts: Option<ModelArtifacts>,
    top_n: usize,
    min_probability: f32,
}

impl PrimaryPredictor {
    pub fn new(artifacts: ModelArtifacts, top_n: usize, min_probability: f32) -> Self {
        Self {
            artifacts: Some(artifacts),
            top_n,
            min_probability,
        }
    }

    /// Always answers `Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            artifacts: None,
            top_n: 0,
            min_probability: 1.0,
        }
    }

    /// Load artifacts from `dir`; any failure disables the predictor for the
    /// process lifetime instead of aborting startup.
    pub fn load_or_disable(dir: &Path, top_n: usize, min_probability: f32) -> Self {
        match ModelArtifacts::load_from_dir(dir) {
            Ok(a) => {
                info!(target: "startup", artifacts = ?a, "primary predictor loaded");
                Self::new(a, top_n, min_probability)
            }
            Err(e) => {
                error!(target: "startup", error = ?e, dir = %dir.display(), "primary predictor disabled");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.artifacts.is_some()
    }

    pub fn schema(&self) -> Option<&SymptomSchema> {
        self.artifacts.as_ref().map(|a| &a.schema)
    }

    pub fn predict(&self, obs: &SymptomObservation, tables: &LookupTables) -> PrimaryOutcome {
        let Some(a) = &self.artifacts else {
            return PrimaryOutcome::Unavailable;
        };
        let built = build_feature_vector(obs, &a.schema, tables);
        self.predict_vector(a, &built.vector)
    }

    fn predict_vector(&self, a: &ModelArtifacts, x: &FeatureVector) -> PrimaryOutcome {
        let proba = match a.classifier.predict_proba(x.as_slice()) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "primary", error = ?e, "classifier failed");
                return PrimaryOutcome::Unavailable;
            }
        };

        // Built in class-index order; the stable ranking sort keeps the lower
        // index first on ties.
        let candidates = proba
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| match a.labels.inverse_transform(idx) {
                Some(label) => Some(DiseasePrediction::new(label, *p)),
                None => {
                    warn!(target: "primary", idx, "class index without label");
                    None
                }
            })
            .collect();

        let set = PredictionSet::ranked(candidates, self.top_n, self.min_probability);
        PrimaryOutcome::Predicted(set)
    }
}
