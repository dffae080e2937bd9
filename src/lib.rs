// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod enrich;
pub mod features;
pub mod llm;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod predict;
pub mod record;
pub mod stt;
pub mod store;
pub mod summary;
pub mod tables;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router as router;
pub use crate::pipeline::{Analysis, AnalysisInput, InferenceContext, InputError};
pub use crate::record::{
    DiseasePrediction, InferenceRecord, PredictionSet, PredictorTier, SymptomObservation,
};
