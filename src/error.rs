use thiserror::Error;

/// Request-level failures. Each one ends a single prediction and nothing else.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Semester must be 2-8 (got {semester})")]
    InvalidSemester { semester: u32 },

    #[error("Need history for {expected} semesters (got {actual})")]
    HistoryLengthMismatch {
        semester: u32,
        expected: usize,
        actual: usize,
    },

    #[error("No scoring model registered for semester {semester}")]
    ArtifactNotFound { semester: u32 },

    #[error("Scoring failed: {0}")]
    ScoringError(#[from] ScoringFailure),

    #[error("Prediction aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringFailure {
    #[error("model expects unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("model has no fitted parameters")]
    Unfitted,

    #[error("class index {index} is out of range for {len} class probabilities")]
    ClassIndexOutOfRange { index: usize, len: usize },

    #[error("model returned invalid probability {0}")]
    InvalidProbability(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("GPA {0} is outside 0.0-4.0")]
    GpaOutOfRange(f64),

    #[error("credits passed ({passed}) exceed credits attempted ({attempted})")]
    PassedExceedsAttempted { passed: u32, attempted: u32 },

    #[error("expected GPA,CREDITS,PASSED but got '{0}'")]
    Malformed(String),
}
