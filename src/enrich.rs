//! Enricher: attaches lookup-table description and precautions to whichever
//! predictor's output was finalized. Never fails; misses degrade to defaults.

use crate::record::{DiseasePrediction, PredictionSet, Precautions};
use crate::tables::LookupTables;

pub const NO_DESCRIPTION: &str = "No description available";

/// Table text wins for known labels. On a miss, a description the predictor
/// supplied itself is kept; otherwise the default marker is used.
pub fn enrich_prediction(p: &mut DiseasePrediction, tables: &LookupTables) {
    match tables.description(&p.disease) {
        Some(d) => p.description = d.to_string(),
        None if p.description.trim().is_empty() => p.description = NO_DESCRIPTION.to_string(),
        None => {}
    }

    p.precautions = match tables.precautions(&p.disease) {
        Some(items) => Precautions::Listed(items.to_vec()),
        None => Precautions::Unavailable,
    };
}

pub fn enrich(mut set: PredictionSet, tables: &LookupTables) -> PredictionSet {
    for p in set.iter_mut() {
        enrich_prediction(p, tables);
    }
    set
}
