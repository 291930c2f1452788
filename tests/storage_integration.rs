/// Integration tests for the SQLite-backed qualification log, using an
/// in-memory database.
use solar_loan_api::db::Database;
use solar_loan_api::engine::QualificationStatus;
use solar_loan_api::models::{
    CostBreakdown, LoanTerms, LocationInfo, QualificationResponse, SystemCalculations,
};
use solar_loan_api::storage::{QualificationRecord, QualificationStore};

fn sample_response() -> QualificationResponse {
    QualificationResponse {
        status: QualificationStatus::Approved,
        monthly_payment: 70.87,
        payback_years: 0.0,
        system_size_kw: 6.0,
        total_savings: 42000.0,
        system_cost: CostBreakdown {
            gross_cost: 16500.0,
            federal_credit: 4950.0,
            state_credit: 1650.0,
            net_cost: 9900.0,
        },
        current_bill: 150.0,
        credit_band: "Good".to_string(),
        loan_terms: LoanTerms {
            apr: 5.99,
            term: 20,
            down_payment: 0.0,
        },
        calculations: SystemCalculations {
            monthly_kwh_usage: 1000.0,
            system_annual_production: 7822.0,
            panels_needed: 16,
        },
        explanation: "Great news!".to_string(),
        location: LocationInfo {
            city: "New York".to_string(),
            state: "NY".to_string(),
            zip_code: "10001".to_string(),
        },
        timestamp: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn schema_create_and_insert_round_trip() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let store = QualificationStore::new(db.pool.clone());
    store.ensure_schema().await.unwrap();

    let record = QualificationRecord::from_response("10001", 1500.0, &sample_response());
    store.record(&record).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let store = QualificationStore::new(db.pool.clone());

    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn records_carry_request_inputs_and_verdict() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let store = QualificationStore::new(db.pool.clone());
    store.ensure_schema().await.unwrap();

    let record = QualificationRecord::from_response("10001", 1500.0, &sample_response());
    assert_eq!(record.zip_code, "10001");
    assert_eq!(record.roof_size, 1500.0);
    assert_eq!(record.status, "approved");
    assert_eq!(record.credit_band, "Good");
    assert!(!record.request_id.is_empty());

    store.record(&record).await.unwrap();

    // Distinct requests get distinct ids
    let second = QualificationRecord::from_response("10001", 1500.0, &sample_response());
    assert_ne!(second.request_id, record.request_id);
    store.record(&second).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 2);
}
