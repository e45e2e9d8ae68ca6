use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{AppointmentRecord, AppointmentStatus, PatientRecord, PsychologistRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn find_psychologist(
    pool: &PgPool,
    id: Option<Uuid>,
    email: Option<&str>,
) -> anyhow::Result<Option<PsychologistRecord>> {
    let row = if let Some(id) = id {
        sqlx::query("SELECT id, full_name FROM patient_risk.psychologists WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
    } else if let Some(email) = email {
        sqlx::query("SELECT id, full_name FROM patient_risk.psychologists WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?
    } else {
        None
    };

    Ok(row.map(|row| PsychologistRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
    }))
}

pub async fn fetch_patients(
    pool: &PgPool,
    psychologist_id: Uuid,
) -> anyhow::Result<Vec<PatientRecord>> {
    let rows = sqlx::query(
        "SELECT id, full_name FROM patient_risk.patients \
         WHERE psychologist_id = $1 ORDER BY full_name",
    )
    .bind(psychologist_id)
    .fetch_all(pool)
    .await?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(PatientRecord {
            id: row.get("id"),
            full_name: row.get("full_name"),
        });
    }

    Ok(patients)
}

/// One patient's history with the given psychologist, newest appointment
/// first. The analyzer relies on this ordering.
pub async fn fetch_appointments(
    pool: &PgPool,
    patient_id: Uuid,
    psychologist_id: Uuid,
) -> anyhow::Result<Vec<AppointmentRecord>> {
    let rows = sqlx::query(
        "SELECT patient_id, psychologist_id, appointment_date, status \
         FROM patient_risk.appointments \
         WHERE patient_id = $1 AND psychologist_id = $2 \
         ORDER BY appointment_date DESC",
    )
    .bind(patient_id)
    .bind(psychologist_id)
    .fetch_all(pool)
    .await?;

    let mut appointments = Vec::new();
    for row in rows {
        let status: String = row.get("status");
        appointments.push(AppointmentRecord {
            patient_id: row.get("patient_id"),
            psychologist_id: row.get("psychologist_id"),
            date: row.get("appointment_date"),
            status: status.parse()?,
        });
    }

    Ok(appointments)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let psychologist_id = Uuid::parse_str("8f6c1a52-7f0d-4f4e-9a2e-0b0f6d2f3c1a")?;
    sqlx::query(
        r#"
        INSERT INTO patient_risk.psychologists (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
        "#,
    )
    .bind(psychologist_id)
    .bind("Helena Costa")
    .bind("helena.costa@mindwell.com")
    .execute(pool)
    .await?;

    let patients = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Marina Duarte",
            "marina.duarte@example.com",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Pedro Alencar",
            "pedro.alencar@example.com",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Sofia Nunes",
            "sofia.nunes@example.com",
        ),
    ];

    for (id, name, email) in patients.iter().copied() {
        sqlx::query(
            r#"
            INSERT INTO patient_risk.patients (id, psychologist_id, full_name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(id)
        .bind(psychologist_id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;
    }

    // Marina attends weekly, Pedro has lapsed, Sofia cancels often.
    let appointments = vec![
        ("seed-001", patients[0].0, "2026-08-25", "completed"),
        ("seed-002", patients[0].0, "2026-08-18", "completed"),
        ("seed-003", patients[0].0, "2026-08-11", "completed"),
        ("seed-004", patients[0].0, "2026-09-01", "scheduled"),
        ("seed-005", patients[1].0, "2026-07-02", "completed"),
        ("seed-006", patients[1].0, "2026-06-18", "completed"),
        ("seed-007", patients[1].0, "2026-06-04", "canceled"),
        ("seed-008", patients[2].0, "2026-08-20", "canceled"),
        ("seed-009", patients[2].0, "2026-08-06", "completed"),
        ("seed-010", patients[2].0, "2026-07-23", "canceled"),
        ("seed-011", patients[2].0, "2026-07-09", "completed"),
    ];

    for (source_key, patient_id, date, status) in appointments {
        let date: NaiveDate = date.parse().context("invalid seed date")?;
        sqlx::query(
            r#"
            INSERT INTO patient_risk.appointments
            (id, patient_id, psychologist_id, appointment_date, status, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(psychologist_id)
        .bind(date)
        .bind(status)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        psychologist_name: String,
        psychologist_email: String,
        patient_name: String,
        patient_email: String,
        appointment_date: NaiveDate,
        status: AppointmentStatus,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        let psychologist_id: Uuid = sqlx::query(
            r#"
            INSERT INTO patient_risk.psychologists (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.psychologist_name)
        .bind(&row.psychologist_email)
        .fetch_one(pool)
        .await?
        .get("id");

        let patient_id: Uuid = sqlx::query(
            r#"
            INSERT INTO patient_risk.patients (id, psychologist_id, full_name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, psychologist_id = EXCLUDED.psychologist_id
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(psychologist_id)
        .bind(&row.patient_name)
        .bind(&row.patient_email)
        .fetch_one(pool)
        .await?
        .get("id");

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO patient_risk.appointments
            (id, patient_id, psychologist_id, appointment_date, status, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(psychologist_id)
        .bind(row.appointment_date)
        .bind(row.status.as_str())
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
