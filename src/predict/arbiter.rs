//! Fallback arbitration: decides whether the primary predictor's output can be trusted.
//!
//! Reject when the predictor was unavailable, returned nothing, its top-1 label is on
//! the denylist of known degenerate outputs, or the top-1 probability is below the
//! configured floor. A denylisted label is rejected no matter how confident it is.

use std::collections::HashSet;

use crate::config::ArbitrationConfig;
use crate::predict::{PrimaryOutcome, Rejection, Verdict};

#[derive(Debug, Clone)]
pub struct Arbiter {
    denylist: HashSet<String>,
    min_top_probability: f32,
}

impl Arbiter {
    pub fn new<I, S>(denylist: I, min_top_probability: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denylist: denylist
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            min_top_probability,
        }
    }

    pub fn from_config(cfg: &ArbitrationConfig) -> Self {
        Self::new(&cfg.denylist, cfg.min_top_probability)
    }

    pub fn is_denylisted(&self, label: &str) -> bool {
        self.denylist.contains(label.trim())
    }

    pub fn judge(&self, outcome: &PrimaryOutcome) -> Verdict {
        let set = match outcome {
            PrimaryOutcome::Unavailable => return Verdict::Reject(Rejection::Unavailable),
            PrimaryOutcome::Predicted(set) => set,
        };
        let Some(top) = set.top() else {
            return Verdict::Reject(Rejection::Empty);
        };
        if self.is_denylisted(&top.disease) {
            return Verdict::Reject(Rejection::Denylisted {
                label: top.disease.clone(),
            });
        }
        if top.probability < self.min_top_probability {
            return Verdict::Reject(Rejection::BelowFloor {
                probability: top.probability,
            });
        }
        Verdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DiseasePrediction, PredictionSet};

    fn arbiter() -> Arbiter {
        Arbiter::from_config(&ArbitrationConfig::default())
    }

    fn outcome(pairs: &[(&str, f32)]) -> PrimaryOutcome {
        let items = pairs
            .iter()
            .map(|(d, p)| DiseasePrediction::new(*d, *p))
            .collect();
        PrimaryOutcome::Predicted(PredictionSet::ranked(items, 3, 0.0))
    }

    #[test]
    fn denylisted_top_is_rejected_even_at_high_confidence() {
        let v = arbiter().judge(&outcome(&[("GERD", 0.90), ("Malaria", 0.05)]));
        assert_eq!(
            v,
            Verdict::Reject(Rejection::Denylisted {
                label: "GERD".into()
            })
        );
    }

    #[test]
    fn denylisted_label_below_top_does_not_matter() {
        let v = arbiter().judge(&outcome(&[("Malaria", 0.60), ("GERD", 0.30)]));
        assert_eq!(v, Verdict::Accept);
    }

    #[test]
    fn unavailable_and_empty_are_rejected() {
        assert_eq!(
            arbiter().judge(&PrimaryOutcome::Unavailable),
            Verdict::Reject(Rejection::Unavailable)
        );
        assert_eq!(
            arbiter().judge(&outcome(&[])),
            Verdict::Reject(Rejection::Empty)
        );
    }

    #[test]
    fn floor_applies_to_top_probability() {
        let a = Arbiter::new(["Unknown"], 0.40);
        assert!(matches!(
            a.judge(&outcome(&[("Malaria", 0.30)])),
            Verdict::Reject(Rejection::BelowFloor { .. })
        ));
        assert_eq!(a.judge(&outcome(&[("Malaria", 0.45)])), Verdict::Accept);
    }

    #[test]
    fn denylist_is_extensible() {
        let a = Arbiter::new(["Unknown", " Migraine "], 0.05);
        assert!(a.is_denylisted("Migraine"));
        assert!(!a.is_denylisted("GERD"));
    }
}
