use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{RiskLevel, RiskSummary, StudentOutcome};

pub fn summarize_by_level(outcomes: &[StudentOutcome]) -> Vec<RiskSummary> {
    let mut map: BTreeMap<RiskLevel, (usize, f64)> = BTreeMap::new();

    for prediction in outcomes.iter().filter_map(|o| o.result.prediction()) {
        let entry = map.entry(prediction.risk_level).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += prediction.probability;
    }

    // Highest tier first.
    map.into_iter()
        .rev()
        .map(|(risk_level, (count, total_probability))| RiskSummary {
            risk_level,
            count,
            avg_probability: if count == 0 {
                0.0
            } else {
                total_probability / count as f64
            },
        })
        .collect()
}

pub fn build_report(source: &str, generated_on: NaiveDate, outcomes: &[StudentOutcome]) -> String {
    let summaries = summarize_by_level(outcomes);

    let mut output = String::new();

    let _ = writeln!(output, "# Graduation Early Warning Report");
    let _ = writeln!(
        output,
        "Generated on {} for {} students from {}",
        generated_on,
        outcomes.len(),
        source
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No students could be scored.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students (avg probability {:.1}%)",
                summary.risk_level,
                summary.count,
                summary.avg_probability * 100.0
            );
        }
    }

    let mut at_risk: Vec<&StudentOutcome> = outcomes
        .iter()
        .filter(|o| {
            o.result
                .prediction()
                .is_some_and(|p| p.risk_level != RiskLevel::Low)
        })
        .collect();
    at_risk.sort_by(|a, b| {
        let pa = a.result.prediction().map_or(0.0, |p| p.probability);
        let pb = b.result.prediction().map_or(0.0, |p| p.probability);
        pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students At Risk");

    if at_risk.is_empty() {
        let _ = writeln!(output, "No students above their semester threshold.");
    } else {
        for outcome in at_risk.iter().take(10) {
            if let Some(prediction) = outcome.result.prediction() {
                let credits = outcome
                    .credits
                    .map(|c| format!(", {} credits passed, gap {}", c.total_passed, c.gap))
                    .unwrap_or_default();
                let _ = writeln!(
                    output,
                    "- {} (semester {}) {} risk, probability {:.1}%{}",
                    outcome.student_id,
                    outcome.current_semester,
                    prediction.risk_level,
                    prediction.probability * 100.0,
                    credits
                );
            }
        }
    }

    let failures: Vec<(&StudentOutcome, &str)> = outcomes
        .iter()
        .filter_map(|o| o.result.error().map(|message| (o, message)))
        .collect();

    if !failures.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Not Scored");
        for (outcome, message) in failures {
            let _ = writeln!(output, "- {}: {}", outcome.student_id, message);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreditStanding, OutcomeLabel, Prediction, PredictionResult};

    fn outcome(student_id: &str, risk_level: RiskLevel, probability: f64) -> StudentOutcome {
        StudentOutcome {
            student_id: student_id.to_string(),
            current_semester: 4,
            credits: Some(CreditStanding {
                total_passed: 50,
                gap: 4,
            }),
            result: PredictionResult::Prediction(Prediction {
                outcome_label: if risk_level == RiskLevel::Low {
                    OutcomeLabel::OnTime
                } else {
                    OutcomeLabel::Delayed
                },
                probability,
                risk_level,
                threshold_used: 0.4,
            }),
        }
    }

    fn failed(student_id: &str, message: &str) -> StudentOutcome {
        StudentOutcome {
            student_id: student_id.to_string(),
            current_semester: 9,
            credits: None,
            result: PredictionResult::Error {
                message: message.to_string(),
            },
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn summaries_order_highest_tier_first() {
        let outcomes = vec![
            outcome("a", RiskLevel::Low, 0.1),
            outcome("b", RiskLevel::High, 0.8),
            outcome("c", RiskLevel::High, 0.9),
            failed("d", "Semester must be 2-8 (got 9)"),
        ];
        let summaries = summarize_by_level(&outcomes);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].risk_level, RiskLevel::High);
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_probability - 0.85).abs() < 1e-9);
        assert_eq!(summaries[1].risk_level, RiskLevel::Low);
    }

    #[test]
    fn report_lists_at_risk_students_by_probability() {
        let outcomes = vec![
            outcome("S-1", RiskLevel::Medium, 0.5),
            outcome("S-2", RiskLevel::High, 0.92),
            outcome("S-3", RiskLevel::Low, 0.1),
            failed("S-4", "Need history for 3 semesters (got 2)"),
        ];
        let report = build_report("roster.csv", date(), &outcomes);
        assert!(report.contains("Generated on 2026-03-02 for 4 students from roster.csv"));
        let s2 = report.find("- S-2").unwrap();
        let s1 = report.find("- S-1").unwrap();
        assert!(s2 < s1);
        assert!(!report.contains("- S-3"));
        assert!(report.contains("## Not Scored"));
        assert!(report.contains("- S-4: Need history for 3 semesters (got 2)"));
    }

    #[test]
    fn empty_batch_report() {
        let report = build_report("roster.csv", date(), &[]);
        assert!(report.contains("No students could be scored."));
        assert!(report.contains("No students above their semester threshold."));
        assert!(!report.contains("## Not Scored"));
    }
}
