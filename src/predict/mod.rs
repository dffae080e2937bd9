// src/predict/mod.rs
//! Three-tier prediction: classifier → generative model → rules.
//!
//! Each tier reports a closed outcome type; `resolve` walks the tiers in order and
//! records why every skipped tier was skipped.

pub mod arbiter;
pub mod classifier;
pub mod primary;
pub mod secondary;
pub mod tertiary;

use metrics::counter;
use tracing::info;

use crate::llm::LlmClient;
use crate::record::{PredictionSet, PredictorTier, SymptomObservation};
use crate::tables::LookupTables;

pub use arbiter::Arbiter;
pub use classifier::{Classifier, ForestClassifier, LabelEncoder, ModelArtifacts};
pub use primary::PrimaryPredictor;
pub use secondary::{SecondaryFailure, SecondarySettings};

#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryOutcome {
    /// Artifacts failed to load at startup, or the classifier errored.
    Unavailable,
    Predicted(PredictionSet),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Unavailable,
    Empty,
    Denylisted { label: String },
    BelowFloor { probability: f32 },
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Unavailable => "unavailable",
            Rejection::Empty => "empty",
            Rejection::Denylisted { .. } => "denylisted",
            Rejection::BelowFloor { .. } => "below_floor",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Unavailable => write!(f, "classifier unavailable"),
            Rejection::Empty => write!(f, "no prediction above the probability floor"),
            Rejection::Denylisted { label } => write!(f, "top label \"{label}\" is denylisted"),
            Rejection::BelowFloor { probability } => {
                write!(f, "top probability {:.2}% below floor", probability * 100.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SecondaryOutcome {
    Predicted(PredictionSet),
    Failed(SecondaryFailure),
}

/// The prediction set that will be enriched and returned, plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalized {
    pub tier: PredictorTier,
    pub set: PredictionSet,
    pub trail: Vec<String>,
}

pub struct Predictors<'a> {
    pub primary: &'a PrimaryPredictor,
    pub arbiter: &'a Arbiter,
    pub llm: &'a dyn LlmClient,
    pub secondary: &'a SecondarySettings,
    pub tables: &'a LookupTables,
}

/// Walk the tiers. Never fails: the tertiary tier is the terminal state.
pub async fn resolve(p: Predictors<'_>, obs: &SymptomObservation) -> Finalized {
    let mut trail = Vec::new();

    let primary = p.primary.predict(obs, p.tables);
    match p.arbiter.judge(&primary) {
        Verdict::Accept => {
            if let PrimaryOutcome::Predicted(set) = primary {
                return finalized(PredictorTier::Primary, set, trail);
            }
        }
        Verdict::Reject(r) => {
            info!(target: "arbiter", reason = %r, "primary rejected");
            counter!("arbiter_rejections_total", "reason" => r.kind()).increment(1);
            trail.push(format!("primary rejected: {r}"));
        }
    }

    match secondary::predict(p.llm, obs, p.secondary).await {
        SecondaryOutcome::Predicted(set) => {
            return finalized(PredictorTier::Secondary, set, trail);
        }
        SecondaryOutcome::Failed(e) => {
            counter!("secondary_failures_total", "reason" => e.kind()).increment(1);
            trail.push(format!("secondary failed: {e}"));
        }
    }

    finalized(PredictorTier::Tertiary, tertiary::predict(obs), trail)
}

fn finalized(tier: PredictorTier, set: PredictionSet, trail: Vec<String>) -> Finalized {
    counter!("inference_tier_total", "tier" => tier.as_str()).increment(1);
    Finalized { tier, set, trail }
}
