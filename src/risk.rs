use chrono::NaiveDate;

use crate::models::{
    AppointmentRecord, AppointmentStatus, PatientMetrics, PatientRecord, RiskLevel, RiskResult,
};

/// Placeholder for the empty-history branch in the metric extractor. Patients
/// without history are filtered out before metrics are computed, so this never
/// reaches an emitted result.
const NO_HISTORY_DAYS: i64 = 999;

/// Score every patient in the cohort and rank the output by risk.
///
/// Patients with no appointment history are skipped: there is nothing to
/// score. The sort is stable, so patients with equal scores keep their input
/// order. Everything here is a pure function of the cohort and `as_of`.
pub fn analyze(
    cohort: &[(PatientRecord, Vec<AppointmentRecord>)],
    as_of: NaiveDate,
) -> Vec<RiskResult> {
    let mut results: Vec<RiskResult> = cohort
        .iter()
        .filter_map(|(patient, history)| assess_patient(patient, history, as_of))
        .collect();

    results.sort_by(|a, b| b.risk_score.cmp(&a.risk_score));
    results
}

/// Returns `None` when the patient has no history to score.
pub fn assess_patient(
    patient: &PatientRecord,
    history: &[AppointmentRecord],
    as_of: NaiveDate,
) -> Option<RiskResult> {
    if history.is_empty() {
        return None;
    }

    let metrics = extract_metrics(history, as_of);
    let score = risk_score(&metrics);

    Some(RiskResult {
        patient_id: patient.id,
        patient: patient.full_name.clone(),
        risk_score: score,
        risk_level: risk_level(score),
        reason: risk_reason(&metrics),
        last_appointment: history.first().map(|appointment| appointment.date),
        metrics,
    })
}

/// Derive attendance metrics from one patient's history, newest-first.
pub fn extract_metrics(history: &[AppointmentRecord], as_of: NaiveDate) -> PatientMetrics {
    let days_ago = |date: NaiveDate| (as_of - date).num_days();

    let completed: Vec<&AppointmentRecord> = history
        .iter()
        .filter(|appointment| appointment.status == AppointmentStatus::Completed)
        .collect();
    let canceled = history
        .iter()
        .filter(|appointment| appointment.status == AppointmentStatus::Canceled)
        .count();
    // Any scheduled record counts as a future booking, even when its date
    // has already passed.
    let scheduled = history
        .iter()
        .filter(|appointment| appointment.status == AppointmentStatus::Scheduled)
        .count();

    let within = |limit: i64| {
        history
            .iter()
            .filter(|appointment| days_ago(appointment.date) <= limit)
            .count()
    };

    let total_appointments = history.len();
    let days_since_last = history
        .first()
        .map(|appointment| days_ago(appointment.date))
        .unwrap_or(NO_HISTORY_DAYS);
    let cancellation_rate = if total_appointments > 0 {
        canceled as f64 / total_appointments as f64
    } else {
        0.0
    };

    // Months active is floored at one so a brand-new patient's frequency does
    // not blow up on a near-zero denominator.
    let frequency_per_month = match history.iter().map(|appointment| appointment.date).min() {
        Some(first_date) => {
            let months_active = (days_ago(first_date) as f64 / 30.0).max(1.0);
            total_appointments as f64 / months_active
        }
        None => 0.0,
    };

    let recent_completed = completed
        .iter()
        .filter(|appointment| days_ago(appointment.date) <= 30)
        .count() as i64;
    let previous_completed = completed
        .iter()
        .filter(|appointment| {
            let days = days_ago(appointment.date);
            days > 30 && days <= 60
        })
        .count() as i64;

    PatientMetrics {
        total_appointments,
        completed_appointments: completed.len(),
        canceled_appointments: canceled,
        cancellation_rate,
        days_since_last,
        frequency_per_month,
        appointments_last_30: within(30),
        appointments_last_60: within(60),
        appointments_last_90: within(90),
        recent_trend: recent_completed - previous_completed,
        has_future_appointments: scheduled > 0,
    }
}

/// Weighted risk score in [0, 100]. Higher means more likely to disengage.
///
/// Five additive factors: recency of the last visit (30), cancellation rate
/// (25), low monthly frequency (20), absence in the trailing 30/60-day
/// windows (15), declining completed-visit trend (10), plus 5 when no future
/// booking exists. The fractional sum is truncated, then clamped.
pub fn risk_score(metrics: &PatientMetrics) -> i64 {
    let mut score = 0.0;

    let recency_factor = (metrics.days_since_last as f64 / 60.0).min(1.0);
    score += recency_factor * 30.0;

    score += metrics.cancellation_rate * 25.0;

    if metrics.frequency_per_month < 1.0 {
        score += 20.0;
    } else if metrics.frequency_per_month < 2.0 {
        score += 10.0;
    }

    if metrics.appointments_last_30 == 0 {
        score += 15.0;
    } else if metrics.appointments_last_60 == 0 {
        score += 10.0;
    }

    if metrics.recent_trend < -1 {
        score += 10.0;
    } else if metrics.recent_trend < 0 {
        score += 5.0;
    }

    if !metrics.has_future_appointments {
        score += 5.0;
    }

    (score as i64).clamp(0, 100)
}

pub fn risk_level(score: i64) -> RiskLevel {
    if score >= 70 {
        RiskLevel::High
    } else if score >= 40 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// The single leading reason, first match wins. The order is fixed and the
/// reasons are never combined.
pub fn risk_reason(metrics: &PatientMetrics) -> &'static str {
    if metrics.days_since_last > 45 {
        return "absent >45 days";
    }
    if metrics.days_since_last > 30 {
        return "absent >30 days";
    }
    if metrics.cancellation_rate > 0.3 {
        return "high cancellation rate";
    }
    if metrics.cancellation_rate > 0.2 {
        return "frequent cancellations";
    }
    if metrics.frequency_per_month < 1.0 {
        return "low visit frequency";
    }
    if metrics.appointments_last_30 == 0 {
        return "no visits in the last month";
    }
    if metrics.recent_trend < -1 {
        return "declining frequency";
    }
    if !metrics.has_future_appointments {
        return "no future appointments scheduled";
    }
    "normal visit pattern"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn patient(name: &str) -> PatientRecord {
        PatientRecord {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
        }
    }

    fn appointment(days_ago: i64, status: AppointmentStatus) -> AppointmentRecord {
        AppointmentRecord {
            patient_id: Uuid::new_v4(),
            psychologist_id: Uuid::new_v4(),
            date: as_of() - Duration::days(days_ago),
            status,
        }
    }

    fn steady_metrics() -> PatientMetrics {
        PatientMetrics {
            total_appointments: 6,
            completed_appointments: 6,
            canceled_appointments: 0,
            cancellation_rate: 0.0,
            days_since_last: 10,
            frequency_per_month: 2.0,
            appointments_last_30: 1,
            appointments_last_60: 2,
            appointments_last_90: 3,
            recent_trend: 0,
            has_future_appointments: true,
        }
    }

    #[test]
    fn score_stays_within_bounds() {
        let worst = PatientMetrics {
            total_appointments: 4,
            completed_appointments: 0,
            canceled_appointments: 4,
            cancellation_rate: 1.0,
            days_since_last: 999,
            frequency_per_month: 0.2,
            appointments_last_30: 0,
            appointments_last_60: 0,
            appointments_last_90: 0,
            recent_trend: -3,
            has_future_appointments: false,
        };
        // Raw sum is 105; the clamp caps it.
        assert_eq!(risk_score(&worst), 100);
        assert_eq!(risk_score(&steady_metrics()), 5);
    }

    #[test]
    fn long_absence_dominates_the_reason() {
        let mut metrics = steady_metrics();
        metrics.days_since_last = 50;
        assert_eq!(risk_score(&metrics), 25);
        assert_eq!(risk_level(25), RiskLevel::Low);
        assert_eq!(risk_reason(&metrics), "absent >45 days");
    }

    #[test]
    fn high_cancellation_rate_reason_fires_when_recently_seen() {
        let mut metrics = steady_metrics();
        metrics.cancellation_rate = 0.35;
        assert_eq!(risk_reason(&metrics), "high cancellation rate");
        // 10/60*30 + 0.35*25 = 13.75, truncated.
        assert_eq!(risk_score(&metrics), 13);
    }

    #[test]
    fn fractional_scores_truncate() {
        let mut metrics = steady_metrics();
        metrics.days_since_last = 11;
        // 11/60*30 = 5.5
        assert_eq!(risk_score(&metrics), 5);
    }

    #[test]
    fn single_visit_today_does_not_count_as_low_frequency() {
        let history = vec![appointment(0, AppointmentStatus::Completed)];
        let metrics = extract_metrics(&history, as_of());

        assert_eq!(metrics.days_since_last, 0);
        assert_eq!(metrics.frequency_per_month, 1.0);
        assert!(!metrics.has_future_appointments);
        // Frequency of exactly 1 misses the <1 branch but still takes the <2
        // penalty: 10 + 5 for no future booking.
        assert_eq!(risk_score(&metrics), 15);
        assert_eq!(risk_reason(&metrics), "no future appointments scheduled");
    }

    #[test]
    fn window_counts_and_trend_from_history() {
        let history = vec![
            appointment(5, AppointmentStatus::Completed),
            appointment(40, AppointmentStatus::Completed),
            appointment(45, AppointmentStatus::Completed),
            appointment(70, AppointmentStatus::Completed),
        ];
        let metrics = extract_metrics(&history, as_of());

        assert_eq!(metrics.appointments_last_30, 1);
        assert_eq!(metrics.appointments_last_60, 3);
        assert_eq!(metrics.appointments_last_90, 4);
        assert_eq!(metrics.recent_trend, 1 - 2);
    }

    #[test]
    fn past_scheduled_record_still_counts_as_future_booking() {
        let history = vec![
            appointment(5, AppointmentStatus::Completed),
            appointment(90, AppointmentStatus::Scheduled),
        ];
        let metrics = extract_metrics(&history, as_of());
        assert!(metrics.has_future_appointments);
    }

    #[test]
    fn lapsed_patient_scores_medium() {
        let history = vec![
            appointment(50, AppointmentStatus::Completed),
            appointment(55, AppointmentStatus::Canceled),
            appointment(80, AppointmentStatus::Completed),
        ];
        let result = assess_patient(&patient("Joana Prado"), &history, as_of()).unwrap();

        // recency 25 + cancellations 8.33 + frequency 10 + absence 15
        // + trend 5 + no future 5 = 68.33
        assert_eq!(result.risk_score, 68);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.reason, "absent >45 days");
        assert_eq!(result.last_appointment, Some(as_of() - Duration::days(50)));
    }

    #[test]
    fn patients_without_history_are_excluded() {
        let cohort = vec![
            (patient("Ana Lima"), vec![]),
            (
                patient("Bruno Reis"),
                vec![appointment(3, AppointmentStatus::Completed)],
            ),
        ];
        let results = analyze(&cohort, as_of());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].patient, "Bruno Reis");
    }

    #[test]
    fn results_sort_descending_and_ties_keep_input_order() {
        let quiet = vec![appointment(50, AppointmentStatus::Canceled)];
        let steady = vec![
            appointment(3, AppointmentStatus::Completed),
            appointment(20, AppointmentStatus::Completed),
            appointment(40, AppointmentStatus::Completed),
        ];
        let cohort = vec![
            (patient("Ana Lima"), steady.clone()),
            (patient("Bruno Reis"), quiet),
            (patient("Clara Souza"), steady),
        ];
        let results = analyze(&cohort, as_of());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].patient, "Bruno Reis");
        assert!(results[0].risk_score >= results[1].risk_score);
        // Ana and Clara share identical histories, so the tie preserves
        // their input order.
        assert_eq!(results[1].patient, "Ana Lima");
        assert_eq!(results[2].patient, "Clara Souza");
        assert_eq!(results[1].risk_score, results[2].risk_score);
    }

    #[test]
    fn result_serializes_with_contract_field_names() {
        let history = vec![appointment(3, AppointmentStatus::Completed)];
        let result = assess_patient(&patient("Ana Lima"), &history, as_of()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert!(json.get("id").is_some());
        assert_eq!(json["patient"], "Ana Lima");
        assert_eq!(json["risk_level"], "low");
        assert_eq!(json["last_appointment"], "2026-05-29");
        assert!(json["metrics"]["cancellation_rate"].is_number());
    }

    #[test]
    fn analyze_is_deterministic_for_a_fixed_as_of_date() {
        let cohort = vec![(
            patient("Ana Lima"),
            vec![
                appointment(10, AppointmentStatus::Completed),
                appointment(35, AppointmentStatus::Canceled),
                appointment(65, AppointmentStatus::Completed),
            ],
        )];
        assert_eq!(analyze(&cohort, as_of()), analyze(&cohort, as_of()));
    }
}
