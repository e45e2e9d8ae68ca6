use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod db;
mod models;
mod report;
mod risk;

use models::{AppointmentRecord, PatientRecord, PsychologistRecord};

#[derive(Parser)]
#[command(name = "patient-risk")]
#[command(about = "Patient disengagement risk tracker for Mindwell clinics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import appointment history from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rank a psychologist's patients by disengagement risk
    #[command(group(
        ArgGroup::new("scope")
            .args(["psychologist_id", "email"])
            .required(true)
            .multiple(false)
    ))]
    Analyze {
        #[arg(long)]
        psychologist_id: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        /// Reference date for all day-delta metrics (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Emit the full result sequence as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    #[command(group(
        ArgGroup::new("scope")
            .args(["psychologist_id", "email"])
            .required(true)
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        psychologist_id: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} appointments from {}.", csv.display());
        }
        Commands::Analyze {
            psychologist_id,
            email,
            as_of,
            limit,
            json,
        } => {
            let Some(psychologist) =
                db::find_psychologist(&pool, psychologist_id, email.as_deref()).await?
            else {
                println!("No matching psychologist.");
                return Ok(());
            };

            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let cohort = fetch_cohort(&pool, &psychologist).await?;
            let results = risk::analyze(&cohort, as_of);

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }

            if results.is_empty() {
                println!("No patients with appointment history.");
                return Ok(());
            }

            println!("Patients by disengagement risk (as of {as_of}):");
            for result in results.iter().take(limit) {
                let last_seen = result
                    .last_appointment
                    .map(|date| date.to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "- {} score {} ({}): {}; last appointment {}",
                    result.patient,
                    result.risk_score,
                    result.risk_level.as_str(),
                    result.reason,
                    last_seen
                );
            }
        }
        Commands::Report {
            psychologist_id,
            email,
            as_of,
            out,
        } => {
            let Some(psychologist) =
                db::find_psychologist(&pool, psychologist_id, email.as_deref()).await?
            else {
                println!("No matching psychologist.");
                return Ok(());
            };

            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let cohort = fetch_cohort(&pool, &psychologist).await?;
            let results = risk::analyze(&cohort, as_of);
            let report = report::build_report(&psychologist.full_name, as_of, &results);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Every patient of the psychologist paired with their scoped appointment
/// history, newest-first.
async fn fetch_cohort(
    pool: &PgPool,
    psychologist: &PsychologistRecord,
) -> anyhow::Result<Vec<(PatientRecord, Vec<AppointmentRecord>)>> {
    let patients = db::fetch_patients(pool, psychologist.id).await?;
    let mut cohort = Vec::with_capacity(patients.len());

    for patient in patients {
        let history = db::fetch_appointments(pool, patient.id, psychologist.id).await?;
        cohort.push((patient, history));
    }

    Ok(cohort)
}
