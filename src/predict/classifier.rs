//! Pre-trained classifier artifacts: an extremely-randomized-trees forest serialized
//! as JSON, the label encoder (class index → disease) and the symptom column schema.
//!
//! JSON shape of `classifier.json`:
//! {
//!   "n_features": 132,
//!   "n_classes": 41,
//!   "trees": [ { "nodes": [ {"feature": 3, "threshold": 0.5, "left": 1, "right": 2},
//!                           {"value": [0.0, 12.0, ...]}, ... ] } ]
//! }

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::Path;

use crate::features::SymptomSchema;
use crate::tables::read_json;

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const LABELS_FILE: &str = "labels.json";
pub const COLUMNS_FILE: &str = "symptom_columns.json";

/// Anything that maps a feature vector to a per-class probability distribution.
pub trait Classifier: Send + Sync {
    fn n_features(&self) -> usize;
    fn n_classes(&self) -> usize;
    /// Probabilities indexed by class id; must be deterministic.
    fn predict_proba(&self, x: &[f32]) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForestClassifier {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<Tree>,
}

impl ForestClassifier {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let forest: ForestClassifier = serde_json::from_str(s)?;
        forest.validate()?;
        Ok(forest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let forest: ForestClassifier = read_json(path)?;
        forest.validate()?;
        Ok(forest)
    }

    /// Every split must point at valid nodes/features and every leaf must
    /// carry `n_classes` non-negative counts.
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            bail!("forest has no trees");
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                bail!("tree {t} has no nodes");
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        left,
                        right,
                        threshold,
                    } => {
                        if *feature >= self.n_features {
                            bail!("tree {t} node {i}: feature {feature} out of range");
                        }
                        // Children must come after the parent; rules out cycles.
                        if *left <= i || *right <= i {
                            bail!("tree {t} node {i}: child index must follow parent");
                        }
                        if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                            bail!("tree {t} node {i}: child index out of range");
                        }
                        if !threshold.is_finite() {
                            bail!("tree {t} node {i}: non-finite threshold");
                        }
                    }
                    Node::Leaf { value } => {
                        if value.len() != self.n_classes {
                            bail!(
                                "tree {t} node {i}: leaf has {} classes, expected {}",
                                value.len(),
                                self.n_classes
                            );
                        }
                        if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                            bail!("tree {t} node {i}: invalid leaf value");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_for<'a>(&self, tree: &'a Tree, x: &[f32]) -> &'a [f32] {
        let mut i = 0;
        loop {
            match &tree.nodes[i] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return value,
            }
        }
    }
}

impl Classifier for ForestClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: &[f32]) -> Result<Vec<f32>> {
        if x.len() != self.n_features {
            bail!(
                "feature vector has {} entries, classifier expects {}",
                x.len(),
                self.n_features
            );
        }
        let mut acc = vec![0.0f32; self.n_classes];
        for tree in &self.trees {
            let leaf = self.leaf_for(tree, x);
            let total: f32 = leaf.iter().sum();
            if total > 0.0 {
                for (a, v) in acc.iter_mut().zip(leaf) {
                    *a += v / total;
                }
            }
        }
        let n = self.trees.len() as f32;
        for a in acc.iter_mut() {
            *a /= n;
        }
        Ok(acc)
    }
}

/// Class index → disease label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self {
            classes: classes.into_iter().map(|c| c.trim().to_string()).collect(),
        }
    }

    pub fn inverse_transform(&self, idx: usize) -> Option<&str> {
        self.classes.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Everything the primary predictor needs, loaded and cross-checked together.
pub struct ModelArtifacts {
    pub classifier: Box<dyn Classifier>,
    pub labels: LabelEncoder,
    pub schema: SymptomSchema,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("n_features", &self.classifier.n_features())
            .field("n_classes", &self.classifier.n_classes())
            .field("labels", &self.labels.len())
            .finish()
    }
}

impl ModelArtifacts {
    pub fn new(
        classifier: Box<dyn Classifier>,
        labels: LabelEncoder,
        schema: SymptomSchema,
    ) -> Result<Self> {
        if classifier.n_features() != schema.len() {
            return Err(anyhow!(
                "classifier expects {} features but schema has {} columns",
                classifier.n_features(),
                schema.len()
            ));
        }
        if classifier.n_classes() != labels.len() {
            return Err(anyhow!(
                "classifier has {} classes but label encoder has {}",
                classifier.n_classes(),
                labels.len()
            ));
        }
        Ok(Self {
            classifier,
            labels,
            schema,
        })
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let forest = ForestClassifier::load(&dir.join(CLASSIFIER_FILE))?;
        let labels: Vec<String> = read_json(&dir.join(LABELS_FILE))?;
        let columns: Vec<String> = read_json(&dir.join(COLUMNS_FILE))?;
        Self::new(
            Box::new(forest),
            LabelEncoder::new(labels),
            SymptomSchema::new(columns),
        )
    }
}
