//! Static lookup tables loaded once at startup: symptom severity weights,
//! disease descriptions and disease precautions. Read-only afterwards.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const SEVERITY_FILE: &str = "symptom_severity.json";
pub const DESCRIPTION_FILE: &str = "symptom_description.json";
pub const PRECAUTION_FILE: &str = "symptom_precaution.json";

/// Max precautions kept per disease.
pub const MAX_PRECAUTIONS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    severity: HashMap<String, f32>,
    descriptions: HashMap<String, String>,
    precautions: HashMap<String, Vec<String>>,
}

impl LookupTables {
    /// Empty tables: every lookup misses and degrades to defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        severity: HashMap<String, f32>,
        descriptions: HashMap<String, String>,
        precautions: HashMap<String, Vec<String>>,
    ) -> Self {
        let severity = severity
            .into_iter()
            .map(|(k, v)| (clean_key(&k), v))
            .filter(|(_, v)| v.is_finite() && *v >= 0.0)
            .collect();
        let descriptions = descriptions
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let precautions = precautions
            .into_iter()
            .map(|(k, v)| {
                let items = v
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .take(MAX_PRECAUTIONS)
                    .collect();
                (k.trim().to_string(), items)
            })
            .collect();
        Self {
            severity,
            descriptions,
            precautions,
        }
    }

    /// Load the three tables from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let severity: HashMap<String, f32> = read_json(&dir.join(SEVERITY_FILE))?;
        let descriptions: HashMap<String, String> = read_json(&dir.join(DESCRIPTION_FILE))?;
        let precautions: HashMap<String, Vec<String>> = read_json(&dir.join(PRECAUTION_FILE))?;
        Ok(Self::new(severity, descriptions, precautions))
    }

    pub fn severity(&self, symptom: &str) -> Option<f32> {
        self.severity.get(symptom).copied()
    }

    pub fn description(&self, disease: &str) -> Option<&str> {
        self.descriptions.get(disease.trim()).map(String::as_str)
    }

    /// `None` on miss; an empty row counts as a miss too.
    pub fn precautions(&self, disease: &str) -> Option<&[String]> {
        self.precautions
            .get(disease.trim())
            .filter(|v| !v.is_empty())
            .map(Vec::as_slice)
    }

    /// (severity, descriptions, precautions) row counts, for startup logs.
    pub fn sizes(&self) -> (usize, usize, usize) {
        (
            self.severity.len(),
            self.descriptions.len(),
            self.precautions.len(),
        )
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// "high fever " → "high_fever".
pub(crate) fn clean_key(raw: &str) -> String {
    raw.trim().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_normalizes_rows() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join(SEVERITY_FILE),
            r#"{" cough ": 4, "high fever": 7, "bogus": -1}"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join(DESCRIPTION_FILE),
            r#"{"Malaria": " Mosquito-borne disease. "}"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join(PRECAUTION_FILE),
            r#"{"Malaria": ["Consult nearest hospital", "", "avoid oily food", "keep mosquitos out", "a", "b"]}"#,
        )
        .unwrap();

        let t = LookupTables::load_from_dir(tmp.path()).unwrap();
        assert_eq!(t.severity("cough"), Some(4.0));
        assert_eq!(t.severity("high_fever"), Some(7.0));
        assert_eq!(t.severity("bogus"), None);
        assert_eq!(t.description("Malaria"), Some("Mosquito-borne disease."));
        let prec = t.precautions("Malaria").unwrap();
        assert_eq!(prec.len(), 4);
        assert_eq!(prec[1], "avoid oily food");
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(LookupTables::load_from_dir(tmp.path()).is_err());
    }
}
