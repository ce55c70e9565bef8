use crate::models::{FeatureRecord, SemesterRecord, GPA_SLOTS};

/// Credits a student is expected to pass each semester.
pub const CREDITS_PER_SEMESTER: u32 = 18;

/// Constant auxiliary input the trained models still expect.
const GENDER_ENCODED: u8 = 1;

/// Minimum cumulative passed credits expected before `current_semester`.
pub fn target_credits(current_semester: u32) -> u64 {
    CREDITS_PER_SEMESTER as u64 * current_semester.saturating_sub(1) as u64
}

pub fn build_features(current_semester: u32, history: &[SemesterRecord]) -> FeatureRecord {
    let completed = current_semester.saturating_sub(1) as usize;
    let records = &history[..completed.min(history.len())];

    let mut features = FeatureRecord::default();
    let gpa_series: Vec<f64> = records.iter().map(|r| r.grade_point_average).collect();
    for (slot, gpa) in features.gpa.iter_mut().zip(gpa_series.iter()).take(GPA_SLOTS) {
        *slot = *gpa;
    }

    if gpa_series.is_empty() {
        return features;
    }

    features.mean_gpa = mean(&gpa_series);
    features.gpa_trend = linear_regression_slope(&gpa_series);
    features.gpa_std = sample_std_dev(&gpa_series);
    features.min_gpa = gpa_series.iter().copied().fold(f64::INFINITY, f64::min);
    features.max_gpa_drop = max_drop(&gpa_series);

    let total_passed: u64 = records.iter().map(|r| r.credits_passed as u64).sum();
    let total_attempted: u64 = records.iter().map(|r| r.credits_attempted as u64).sum();
    let target = target_credits(current_semester);

    features.total_credits_passed = total_passed;
    features.credit_gap = target as i64 - total_passed as i64;
    features.on_track = total_passed >= target;
    features.pass_rate = if total_attempted > 0 {
        total_passed as f64 / total_attempted as f64 * 100.0
    } else {
        0.0
    };
    features.avg_credits_passed = total_passed as f64 / completed as f64;
    features.gender_encoded = GENDER_ENCODED;

    features
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Ordinary least-squares slope of `values` against positions `0..n`.
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Sample standard deviation (divisor n - 1); zero below two points.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Largest decrease between consecutive semesters. Increases never count.
fn max_drop(values: &[f64]) -> f64 {
    values
        .windows(2)
        .map(|pair| pair[0] - pair[1])
        .filter(|drop| *drop > 0.0)
        .fold(0.0, f64::max)
}
