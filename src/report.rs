use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{RiskLevel, RiskResult, RiskTierSummary};

pub fn summarize_by_tier(results: &[RiskResult]) -> Vec<RiskTierSummary> {
    [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low]
        .into_iter()
        .map(|level| {
            let scores: Vec<i64> = results
                .iter()
                .filter(|result| result.risk_level == level)
                .map(|result| result.risk_score)
                .collect();
            RiskTierSummary {
                level,
                count: scores.len(),
                avg_score: if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().sum::<i64>() as f64 / scores.len() as f64
                },
            }
        })
        .collect()
}

pub fn build_report(
    psychologist: &str,
    as_of: NaiveDate,
    results: &[RiskResult],
) -> String {
    let summaries = summarize_by_tier(results);
    let mut output = String::new();

    let _ = writeln!(output, "# Patient Disengagement Report");
    let _ = writeln!(output, "Generated for {} (as of {})", psychologist, as_of);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Tier Mix");

    if results.is_empty() {
        let _ = writeln!(output, "No patients with appointment history.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} patients (avg score {:.1})",
                summary.level.as_str(),
                summary.count,
                summary.avg_score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Patients");

    if results.is_empty() {
        let _ = writeln!(output, "No patients with appointment history.");
    } else {
        for result in results.iter().take(10) {
            let last_seen = result
                .last_appointment
                .map(|date| date.to_string())
                .unwrap_or_else(|| "never".to_string());
            let _ = writeln!(
                output,
                "- {} score {} ({}): {}; last appointment {}",
                result.patient,
                result.risk_score,
                result.risk_level.as_str(),
                result.reason,
                last_seen
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommended Outreach");

    let high_risk: Vec<&RiskResult> = results
        .iter()
        .filter(|result| result.risk_level == RiskLevel::High)
        .collect();

    if high_risk.is_empty() {
        let _ = writeln!(output, "No patients in the high tier this run.");
    } else {
        for result in high_risk {
            let _ = writeln!(
                output,
                "- Contact {}: {} ({} of {} appointments canceled)",
                result.patient,
                result.reason,
                result.metrics.canceled_appointments,
                result.metrics.total_appointments
            );
        }
    }

    output
}
