use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PsychologistRecord {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "canceled" => Ok(AppointmentStatus::Canceled),
            other => Err(anyhow::anyhow!("unknown appointment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentRecord {
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub date: NaiveDate,
    pub status: AppointmentStatus,
}

/// Derived attendance metrics for one patient, computed fresh per analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientMetrics {
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub canceled_appointments: usize,
    pub cancellation_rate: f64,
    pub days_since_last: i64,
    pub frequency_per_month: f64,
    pub appointments_last_30: usize,
    pub appointments_last_60: usize,
    pub appointments_last_90: usize,
    pub recent_trend: i64,
    pub has_future_appointments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskResult {
    #[serde(rename = "id")]
    pub patient_id: Uuid,
    pub patient: String,
    pub risk_score: i64,
    pub risk_level: RiskLevel,
    pub reason: &'static str,
    pub last_appointment: Option<NaiveDate>,
    pub metrics: PatientMetrics,
}

#[derive(Debug, Clone)]
pub struct RiskTierSummary {
    pub level: RiskLevel,
    pub count: usize,
    pub avg_score: f64,
}
