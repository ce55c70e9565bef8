use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::RecordError;

/// Number of per-semester GPA slots in the feature schema.
pub const GPA_SLOTS: usize = 7;

/// Feature names in schema order, as referenced by scoring artifacts.
pub const FEATURE_NAMES: [&str; GPA_SLOTS + 11] = [
    "gpa_1",
    "gpa_2",
    "gpa_3",
    "gpa_4",
    "gpa_5",
    "gpa_6",
    "gpa_7",
    "mean_gpa",
    "gpa_trend",
    "gpa_std",
    "min_gpa",
    "max_gpa_drop",
    "total_credits_passed",
    "credit_gap",
    "on_track",
    "pass_rate",
    "avg_credits_passed",
    "gender_encoded",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemesterRecord {
    pub grade_point_average: f64,
    pub credits_attempted: u32,
    pub credits_passed: u32,
}

impl SemesterRecord {
    pub fn new(
        grade_point_average: f64,
        credits_attempted: u32,
        credits_passed: u32,
    ) -> Result<Self, RecordError> {
        if !(0.0..=4.0).contains(&grade_point_average) {
            return Err(RecordError::GpaOutOfRange(grade_point_average));
        }
        if credits_passed > credits_attempted {
            return Err(RecordError::PassedExceedsAttempted {
                passed: credits_passed,
                attempted: credits_attempted,
            });
        }
        Ok(Self {
            grade_point_average,
            credits_attempted,
            credits_passed,
        })
    }
}

/// Model inputs derived from a student's academic history.
///
/// The schema is fixed: semesters the student has not completed keep a
/// zero GPA slot instead of being left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRecord {
    pub gpa: [f64; GPA_SLOTS],
    pub mean_gpa: f64,
    pub gpa_trend: f64,
    pub gpa_std: f64,
    pub min_gpa: f64,
    pub max_gpa_drop: f64,
    pub total_credits_passed: u64,
    pub credit_gap: i64,
    pub on_track: bool,
    pub pass_rate: f64,
    pub avg_credits_passed: f64,
    pub gender_encoded: u8,
}

impl FeatureRecord {
    /// Looks up a feature by its schema name.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "mean_gpa" => self.mean_gpa,
            "gpa_trend" => self.gpa_trend,
            "gpa_std" => self.gpa_std,
            "min_gpa" => self.min_gpa,
            "max_gpa_drop" => self.max_gpa_drop,
            "total_credits_passed" => self.total_credits_passed as f64,
            "credit_gap" => self.credit_gap as f64,
            "on_track" => {
                if self.on_track {
                    1.0
                } else {
                    0.0
                }
            }
            "pass_rate" => self.pass_rate,
            "avg_credits_passed" => self.avg_credits_passed,
            "gender_encoded" => self.gender_encoded as f64,
            other => {
                let slot: usize = other.strip_prefix("gpa_")?.parse().ok()?;
                if !(1..=GPA_SLOTS).contains(&slot) {
                    return None;
                }
                self.gpa[slot - 1]
            }
        };
        Some(value)
    }

    /// Yields every feature as `(name, value)` in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES
            .into_iter()
            .filter_map(move |name| self.get(name).map(|value| (name, value)))
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_NAMES.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeLabel {
    #[serde(rename = "on time")]
    OnTime,
    #[serde(rename = "delayed")]
    Delayed,
}

impl OutcomeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeLabel::OnTime => "on time",
            OutcomeLabel::Delayed => "delayed",
        }
    }
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }

    /// Guidance shown to the advisor alongside the tier.
    pub fn advice(self) -> &'static str {
        match self {
            RiskLevel::High => "High risk. The student should meet their academic advisor right away.",
            RiskLevel::Medium => {
                "Needs attention. Improve performance and keep passed credits on pace."
            }
            RiskLevel::Low => "On track. Keep up the academic performance.",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "prediction")]
    pub outcome_label: OutcomeLabel,
    pub probability: f64,
    pub risk_level: RiskLevel,
    #[serde(rename = "threshold")]
    pub threshold_used: f64,
}

/// What the prediction entry point hands back: a prediction or a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResult {
    Prediction(Prediction),
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl PredictionResult {
    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            PredictionResult::Prediction(prediction) => Some(prediction),
            PredictionResult::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PredictionResult::Prediction(_) => None,
            PredictionResult::Error { message } => Some(message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudentHistory {
    pub student_id: String,
    pub current_semester: u32,
    pub records: Vec<SemesterRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditStanding {
    pub total_passed: u64,
    pub gap: i64,
}

#[derive(Debug, Clone)]
pub struct StudentOutcome {
    pub student_id: String,
    pub current_semester: u32,
    /// Only filled in for students whose prediction succeeded.
    pub credits: Option<CreditStanding>,
    pub result: PredictionResult,
}

#[derive(Debug, Clone)]
pub struct RiskSummary {
    pub risk_level: RiskLevel,
    pub count: usize,
    pub avg_probability: f64,
}
