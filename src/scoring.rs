use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{PredictionError, ScoringFailure};
use crate::models::{FeatureRecord, OutcomeLabel};

/// Index of the delayed class when an artifact exposes no class order.
const DEFAULT_DELAYED_INDEX: usize = 1;

pub trait ScoringArtifact: Send + Sync {
    /// Per-class probabilities for a single student.
    fn score(&self, features: &FeatureRecord) -> Result<Vec<f64>, ScoringFailure>;

    /// Labels in the order `score` reports them, if the artifact knows them.
    fn class_order(&self) -> Option<&[String]> {
        None
    }

    fn kind(&self) -> &'static str;

    /// Feature names the artifact reads.
    fn feature_names(&self) -> Vec<&str>;
}

/// On-disk description of a scoring artifact.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSpec {
    Logistic(LogisticModel),
    StumpEnsemble(StumpEnsemble),
}

impl ArtifactSpec {
    pub fn into_artifact(self) -> Box<dyn ScoringArtifact> {
        match self {
            ArtifactSpec::Logistic(model) => Box::new(model),
            ArtifactSpec::StumpEnsemble(model) => Box::new(model),
        }
    }
}

/// Binary logistic regression. `score` returns `[1 - p, p]` where `p` is the
/// probability of the second class.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
    #[serde(default)]
    pub classes: Option<Vec<String>>,
}

impl ScoringArtifact for LogisticModel {
    fn score(&self, features: &FeatureRecord) -> Result<Vec<f64>, ScoringFailure> {
        if self.coefficients.is_empty() {
            return Err(ScoringFailure::Unfitted);
        }
        let mut margin = self.intercept;
        for (name, weight) in &self.coefficients {
            margin += weight * feature_value(features, name)?;
        }
        let p = sigmoid(margin);
        Ok(vec![1.0 - p, p])
    }

    fn class_order(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    fn kind(&self) -> &'static str {
        "logistic"
    }

    fn feature_names(&self) -> Vec<&str> {
        self.coefficients.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stump {
    pub feature: String,
    pub threshold: f64,
    pub left: f64,
    pub right: f64,
}

/// Additive ensemble of decision stumps over a logistic link. Values below
/// a stump's threshold take `left`, everything else `right`.
#[derive(Debug, Clone, Deserialize)]
pub struct StumpEnsemble {
    #[serde(default)]
    pub base_score: f64,
    pub stumps: Vec<Stump>,
}

impl ScoringArtifact for StumpEnsemble {
    fn score(&self, features: &FeatureRecord) -> Result<Vec<f64>, ScoringFailure> {
        if self.stumps.is_empty() {
            return Err(ScoringFailure::Unfitted);
        }
        let mut margin = self.base_score;
        for stump in &self.stumps {
            let value = feature_value(features, &stump.feature)?;
            margin += if value < stump.threshold {
                stump.left
            } else {
                stump.right
            };
        }
        let p = sigmoid(margin);
        Ok(vec![1.0 - p, p])
    }

    fn kind(&self) -> &'static str {
        "stump_ensemble"
    }

    fn feature_names(&self) -> Vec<&str> {
        self.stumps.iter().map(|s| s.feature.as_str()).collect()
    }
}

fn feature_value(features: &FeatureRecord, name: &str) -> Result<f64, ScoringFailure> {
    features
        .get(name)
        .ok_or_else(|| ScoringFailure::UnknownFeature(name.to_string()))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Position of the delayed class in an artifact's probability vector.
pub fn delayed_class_index(class_order: Option<&[String]>) -> usize {
    class_order
        .and_then(|classes| {
            classes
                .iter()
                .position(|label| label == OutcomeLabel::Delayed.as_str())
        })
        .unwrap_or(DEFAULT_DELAYED_INDEX)
}

pub fn extract_delayed_probability(
    artifact: &dyn ScoringArtifact,
    features: &FeatureRecord,
) -> Result<f64, PredictionError> {
    let probabilities = artifact.score(features)?;
    let index = delayed_class_index(artifact.class_order());
    let probability = *probabilities
        .get(index)
        .ok_or(ScoringFailure::ClassIndexOutOfRange {
            index,
            len: probabilities.len(),
        })?;

    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(ScoringFailure::InvalidProbability(probability).into());
    }
    Ok(probability)
}
