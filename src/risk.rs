use crate::models::{OutcomeLabel, RiskLevel};

/// Probability at which a student is high risk whatever the semester threshold.
pub const HIGH_RISK_CUTOFF: f64 = 0.70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub outcome_label: OutcomeLabel,
    pub risk_level: RiskLevel,
}

pub fn classify(probability: f64, threshold: f64) -> Classification {
    Classification {
        outcome_label: outcome_label(probability, threshold),
        risk_level: risk_level(probability, threshold),
    }
}

// The high-risk cutoff is checked first, so a threshold above it never
// yields MEDIUM for probabilities between the two.
pub fn risk_level(probability: f64, threshold: f64) -> RiskLevel {
    if probability >= HIGH_RISK_CUTOFF {
        RiskLevel::High
    } else if probability >= threshold {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn outcome_label(probability: f64, threshold: f64) -> OutcomeLabel {
    if probability >= threshold {
        OutcomeLabel::Delayed
    } else {
        OutcomeLabel::OnTime
    }
}
