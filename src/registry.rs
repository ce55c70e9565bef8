use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PredictionError;
use crate::models::FEATURE_NAMES;
use crate::scoring::{ArtifactSpec, ScoringArtifact};

pub const SUPPORTED_SEMESTERS: RangeInclusive<u32> = 2..=8;

/// Threshold used for a semester the configuration bundle does not list.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

// Layout: <dir>/config.json and <dir>/models/model_scenario_<semester>.json
const CONFIG_FILE: &str = "config.json";
const MODELS_DIR: &str = "models";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub optimal_thresholds: BTreeMap<u32, f64>,
    #[serde(default)]
    pub final_models_info: BTreeMap<u32, ModelMetadata>,
}

pub struct ModelEntry {
    pub semester: u32,
    pub artifact: Box<dyn ScoringArtifact>,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub semester: u32,
    pub model_name: Option<String>,
    pub kind: Option<&'static str>,
    pub threshold: f64,
    pub class_order: Option<Vec<String>>,
}

pub struct ModelRegistry {
    thresholds: BTreeMap<u32, f64>,
    entries: BTreeMap<u32, ModelEntry>,
}

impl ModelRegistry {
    /// Loads the configuration bundle and every artifact present under `dir`.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config: RegistryConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let mut entries = Vec::new();
        for semester in SUPPORTED_SEMESTERS {
            let path = artifact_path(dir, semester);
            if !path.exists() {
                warn!(semester, path = %path.display(), "no scoring artifact for semester");
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let spec: ArtifactSpec = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            entries.push(ModelEntry {
                semester,
                artifact: spec.into_artifact(),
                metadata: config.final_models_info.remove(&semester).unwrap_or_default(),
            });
        }

        let registry = Self::from_parts(config.optimal_thresholds, entries)
            .with_context(|| format!("invalid model bundle in {}", dir.display()))?;
        info!(
            dir = %dir.display(),
            models = registry.entries.len(),
            thresholds = registry.thresholds.len(),
            "model registry loaded"
        );
        Ok(registry)
    }

    pub fn from_parts(
        thresholds: BTreeMap<u32, f64>,
        entries: Vec<ModelEntry>,
    ) -> anyhow::Result<Self> {
        for (semester, threshold) in &thresholds {
            if !SUPPORTED_SEMESTERS.contains(semester) {
                bail!("threshold given for unsupported semester {semester}");
            }
            if !(0.0..=1.0).contains(threshold) {
                bail!("threshold {threshold} for semester {semester} is outside 0-1");
            }
        }

        let mut by_semester = BTreeMap::new();
        for entry in entries {
            if !SUPPORTED_SEMESTERS.contains(&entry.semester) {
                bail!("model registered for unsupported semester {}", entry.semester);
            }
            for name in entry.artifact.feature_names() {
                if !FEATURE_NAMES.contains(&name) {
                    bail!(
                        "model for semester {} expects unknown feature '{name}'",
                        entry.semester
                    );
                }
            }
            if by_semester.insert(entry.semester, entry).is_some() {
                bail!("duplicate model for a semester");
            }
        }

        Ok(Self {
            thresholds,
            entries: by_semester,
        })
    }

    pub fn threshold(&self, semester: u32) -> f64 {
        self.thresholds
            .get(&semester)
            .copied()
            .unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn resolve(&self, semester: u32) -> Result<(&dyn ScoringArtifact, f64), PredictionError> {
        let entry = self
            .entries
            .get(&semester)
            .ok_or(PredictionError::ArtifactNotFound { semester })?;
        Ok((entry.artifact.as_ref(), self.threshold(semester)))
    }

    pub fn summaries(&self) -> Vec<ModelSummary> {
        SUPPORTED_SEMESTERS
            .map(|semester| {
                let entry = self.entries.get(&semester);
                ModelSummary {
                    semester,
                    model_name: entry.and_then(|e| e.metadata.model_name.clone()),
                    kind: entry.map(|e| e.artifact.kind()),
                    threshold: self.threshold(semester),
                    class_order: entry.and_then(|e| e.artifact.class_order().map(<[String]>::to_vec)),
                }
            })
            .collect()
    }
}

fn artifact_path(dir: &Path, semester: u32) -> std::path::PathBuf {
    dir.join(MODELS_DIR)
        .join(format!("model_scenario_{semester}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::tests::FixedArtifact;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn fixed_entry(semester: u32, probability: f64) -> ModelEntry {
        ModelEntry {
            semester,
            artifact: Box::new(FixedArtifact::delayed(probability)),
            metadata: ModelMetadata::default(),
        }
    }

    #[test]
    fn missing_threshold_defaults_to_half() {
        let registry =
            ModelRegistry::from_parts(BTreeMap::from([(3, 0.42)]), vec![fixed_entry(4, 0.1)])
                .unwrap();
        assert_eq!(registry.threshold(3), 0.42);
        let (_, threshold) = registry.resolve(4).unwrap();
        assert_eq!(threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn unregistered_semester_is_not_found() {
        let registry = ModelRegistry::from_parts(BTreeMap::new(), vec![fixed_entry(2, 0.1)]).unwrap();
        assert!(matches!(
            registry.resolve(5),
            Err(PredictionError::ArtifactNotFound { semester: 5 })
        ));
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        assert!(ModelRegistry::from_parts(BTreeMap::from([(2, 1.2)]), Vec::new()).is_err());
        assert!(ModelRegistry::from_parts(BTreeMap::from([(9, 0.5)]), Vec::new()).is_err());
    }

    #[test]
    fn loads_bundle_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join(CONFIG_FILE),
            r#"{
                "optimal_thresholds": {"2": 0.38, "3": 0.44},
                "final_models_info": {"2": {"model_name": "LogisticRegression", "f1_score": 0.81}}
            }"#,
        );
        write(
            &artifact_path(dir.path(), 2),
            r#"{
                "kind": "logistic",
                "intercept": 0.3,
                "coefficients": {"mean_gpa": -1.1, "credit_gap": 0.09},
                "classes": ["on time", "delayed"]
            }"#,
        );
        write(
            &artifact_path(dir.path(), 3),
            r#"{
                "kind": "stump_ensemble",
                "stumps": [{"feature": "pass_rate", "threshold": 85.0, "left": 0.9, "right": -0.7}]
            }"#,
        );

        let registry = ModelRegistry::load(dir.path()).unwrap();
        assert!(registry.resolve(2).is_ok());
        assert!(registry.resolve(3).is_ok());
        assert!(matches!(
            registry.resolve(4),
            Err(PredictionError::ArtifactNotFound { semester: 4 })
        ));

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 7);
        assert_eq!(summaries[0].model_name.as_deref(), Some("LogisticRegression"));
        assert_eq!(summaries[0].kind, Some("logistic"));
        assert_eq!(summaries[0].threshold, 0.38);
        assert_eq!(summaries[1].kind, Some("stump_ensemble"));
        assert_eq!(summaries[1].class_order, None);
        assert_eq!(summaries[2].kind, None);
        assert_eq!(summaries[2].threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn artifact_with_unknown_feature_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(CONFIG_FILE), "{}");
        write(
            &artifact_path(dir.path(), 2),
            r#"{"kind": "logistic", "intercept": 0.0, "coefficients": {"ips_1": 1.0}}"#,
        );
        let err = ModelRegistry::load(dir.path()).err().unwrap();
        assert!(format!("{err:#}").contains("ips_1"));
    }

    #[test]
    fn shipped_bundle_covers_every_semester() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("model_bundle");
        let registry = ModelRegistry::load(&dir).unwrap();
        for semester in SUPPORTED_SEMESTERS {
            let (artifact, threshold) = registry.resolve(semester).unwrap();
            assert!((0.0..=1.0).contains(&threshold));
            assert!(!artifact.feature_names().is_empty());
        }
    }

    #[test]
    fn missing_config_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelRegistry::load(dir.path()).is_err());
    }
}
