use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::PredictionError;
use crate::features::build_features;
use crate::models::{
    CreditStanding, Prediction, PredictionResult, SemesterRecord, StudentHistory, StudentOutcome,
};
use crate::registry::{ModelRegistry, SUPPORTED_SEMESTERS};
use crate::risk::classify;
use crate::scoring::extract_delayed_probability;

pub fn validate_input(semester: u32, history: &[SemesterRecord]) -> Result<(), PredictionError> {
    if !SUPPORTED_SEMESTERS.contains(&semester) {
        return Err(PredictionError::InvalidSemester { semester });
    }
    let expected = (semester - 1) as usize;
    if history.len() != expected {
        return Err(PredictionError::HistoryLengthMismatch {
            semester,
            expected,
            actual: history.len(),
        });
    }
    Ok(())
}

pub fn predict(
    registry: &ModelRegistry,
    semester: u32,
    history: &[SemesterRecord],
) -> Result<Prediction, PredictionError> {
    validate_input(semester, history)?;

    let features = build_features(semester, history);
    let (artifact, threshold) = registry.resolve(semester)?;
    let probability = extract_delayed_probability(artifact, &features)?;
    let classification = classify(probability, threshold);

    debug!(
        semester,
        probability,
        threshold,
        risk_level = %classification.risk_level,
        "prediction scored"
    );

    Ok(Prediction {
        outcome_label: classification.outcome_label,
        probability,
        risk_level: classification.risk_level,
        threshold_used: threshold,
    })
}

/// Entry point for the presentation layer. Never fails: every problem,
/// including a panicking model, comes back as an error-shaped result.
pub fn predict_graduation(
    registry: &ModelRegistry,
    semester: u32,
    history: &[SemesterRecord],
) -> PredictionResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| predict(registry, semester, history)))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(PredictionError::Aborted(message))
        });

    match outcome {
        Ok(prediction) => PredictionResult::Prediction(prediction),
        Err(err) => {
            warn!(semester, error = %err, "prediction failed");
            PredictionResult::Error {
                message: err.to_string(),
            }
        }
    }
}

/// Predicts one roster student. Credit standing is only derived once the
/// prediction has validated the semester and history.
pub fn predict_student(registry: &ModelRegistry, student: StudentHistory) -> StudentOutcome {
    let result = predict_graduation(registry, student.current_semester, &student.records);
    let credits = result.prediction().map(|_| {
        let features = build_features(student.current_semester, &student.records);
        CreditStanding {
            total_passed: features.total_credits_passed,
            gap: features.credit_gap,
        }
    });

    StudentOutcome {
        student_id: student.student_id,
        current_semester: student.current_semester,
        credits,
        result,
    }
}
