use crate::errors::{AppError, ResultExt};
use crate::models::QualificationResponse;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// A persisted qualification outcome.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QualificationRecord {
    pub request_id: String,
    pub zip_code: String,
    pub electric_bill: f64,
    pub credit_band: String,
    pub roof_size: f64,
    pub status: String,
    pub monthly_payment: f64,
    pub payback_years: f64,
    pub system_size_kw: f64,
    pub total_savings: f64,
    pub created_at: DateTime<Utc>,
}

impl QualificationRecord {
    pub fn from_response(zip_code: &str, roof_size: f64, response: &QualificationResponse) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            zip_code: zip_code.to_string(),
            electric_bill: response.current_bill,
            credit_band: response.credit_band.clone(),
            roof_size,
            status: response.status.as_str().to_string(),
            monthly_payment: response.monthly_payment,
            payback_years: response.payback_years,
            system_size_kw: response.system_size_kw,
            total_savings: response.total_savings,
            created_at: response.timestamp,
        }
    }
}

/// SQLite-backed store for qualification outcomes.
///
/// Persistence is a side concern: callers record outcomes fire-and-forget
/// and a failed insert never affects the response.
#[derive(Clone)]
pub struct QualificationStore {
    pool: SqlitePool,
}

impl QualificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the qualification log table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qualification_logs (
                request_id TEXT PRIMARY KEY,
                zip_code TEXT NOT NULL,
                electric_bill REAL NOT NULL,
                credit_band TEXT NOT NULL,
                roof_size REAL NOT NULL,
                status TEXT NOT NULL,
                monthly_payment REAL NOT NULL,
                payback_years REAL NOT NULL,
                system_size_kw REAL NOT NULL,
                total_savings REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create qualification_logs table")?;

        Ok(())
    }

    pub async fn record(&self, record: &QualificationRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO qualification_logs (
                request_id, zip_code, electric_bill, credit_band, roof_size,
                status, monthly_payment, payback_years, system_size_kw,
                total_savings, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.request_id)
        .bind(&record.zip_code)
        .bind(record.electric_bill)
        .bind(&record.credit_band)
        .bind(record.roof_size)
        .bind(&record.status)
        .bind(record.monthly_payment)
        .bind(record.payback_years)
        .bind(record.system_size_kw)
        .bind(record.total_savings)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert qualification record")?;

        Ok(())
    }

    #[allow(dead_code)]
    pub async fn count(&self) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM qualification_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Spawns a background insert; errors are logged and discarded.
    pub fn record_detached(&self, record: QualificationRecord) {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record(&record).await {
                tracing::warn!("Failed to persist qualification record: {}", e);
            }
        });
    }
}
