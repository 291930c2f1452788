use crate::audit::{AuditSink, VALID_LOG_TYPES};
use crate::cache_validator::ValidatedCacheEntry;
use crate::config::Config;
use crate::credit::VantageStore;
use crate::demographics::{diversity_score, DemographicsProvider};
use crate::engine::{CreditBand, QualificationEngine};
use crate::errors::AppError;
use crate::location::{is_valid_zip, LocationResolver};
use crate::models::*;
use crate::narrative::{self, ExplainContext, GeminiNarrator};
use crate::providers::UtilityDataChain;
use crate::storage::{QualificationRecord, QualificationStore};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: SqlitePool,
    /// Application configuration.
    pub config: Config,
    /// Append-only JSONL audit sink.
    pub audit: AuditSink,
    /// Vantage-score-by-ZIP dataset, loaded once and frozen.
    pub vantage: VantageStore,
    /// Per-ZIP electricity profile cache (1h TTL), checksum-validated entries.
    pub electricity_cache: Cache<String, String>,
    /// Per-ZIP demographics cache (24h TTL), checksum-validated entries.
    pub demographics_cache: Cache<String, String>,
}

/// Query string carrying a ZIP code.
#[derive(Debug, Deserialize)]
pub struct ZipQuery {
    #[serde(default)]
    pub zip: String,
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("Unknown")
        .to_string()
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "solar-loan-api",
            "version": "0.1.0"
        })),
    )
}

/// GET /electricity-data?zip=NNNNN
///
/// Resolves the ZIP to a location and walks the utility provider chain for
/// electricity economics. Exhaustion of the chain is a 404, not an error.
pub async fn electricity_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ZipQuery>,
) -> Result<Json<ElectricityDataResponse>, AppError> {
    let zip_code = params.zip.trim().to_string();

    if !is_valid_zip(&zip_code) {
        state
            .audit
            .record_error("electricity-data", &zip_code, "Invalid ZIP code", None);
        return Err(AppError::BadRequest("Invalid ZIP code".to_string()));
    }

    let resolver = LocationResolver::new(
        state.config.zippopotam_url.clone(),
        state.config.fcc_lookup_url.clone(),
    );
    let location = match resolver.resolve(&zip_code).await {
        Ok(location) => location,
        Err(e) => {
            state
                .audit
                .record_error("electricity-data", &zip_code, &e.to_string(), None);
            return Err(e);
        }
    };

    let cache_key = format!("zip:{}", zip_code);
    let profile = match state
        .electricity_cache
        .get(&cache_key)
        .await
        .and_then(|sealed| ValidatedCacheEntry::open::<ElectricityProfile>(&sealed))
    {
        Some(cached) => {
            tracing::debug!("Electricity cache HIT (validated) for {}", zip_code);
            cached
        }
        None => {
            let chain = UtilityDataChain::new(
                state.config.eia_url.clone(),
                state.config.eia_api_key.clone(),
            );
            let profile = match chain.resolve(&location).await {
                Some(profile) => profile,
                None => {
                    state.audit.record_error(
                        "electricity-data",
                        &zip_code,
                        "No data available",
                        Some(json!({ "location_data": location })),
                    );
                    return Err(AppError::NotFound("No data available".to_string()));
                }
            };

            if let Some(sealed) = ValidatedCacheEntry::seal(&profile) {
                state.electricity_cache.insert(cache_key, sealed).await;
            }
            profile
        }
    };

    let response = ElectricityDataResponse {
        zip_code: zip_code.clone(),
        city: location.city.clone(),
        state: location.state_code.clone(),
        data_source: profile.source.clone(),
        average_monthly_bill: profile.average_monthly_bill,
        average_monthly_usage_kwh: profile.average_monthly_usage_kwh,
        utility_rate_per_kwh: profile.utility_rate_per_kwh,
    };

    let response_json = serde_json::to_value(&response).unwrap_or_default();
    state.audit.record_request(
        "electricity-data",
        &zip_code,
        response_json.clone(),
        Some(json!({
            "location_details": location,
            "data_source_used": profile.source,
            "user_agent": user_agent(&headers),
        })),
    );
    state.audit.record_data_source(
        &zip_code,
        &profile.source,
        json!({ "processed": profile }),
        response_json,
    );

    Ok(Json(response))
}

/// GET /demographic-data?zip=NNNNN
///
/// Census demographics for the ZIP's tabulation area. The provider fails
/// soft internally; an empty result surfaces as 404.
pub async fn demographic_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ZipQuery>,
) -> Result<Json<DemographicDataResponse>, AppError> {
    let zip_code = params.zip.trim().to_string();

    if !is_valid_zip(&zip_code) {
        state
            .audit
            .record_error("demographic-data", &zip_code, "Invalid ZIP code", None);
        return Err(AppError::BadRequest("Invalid ZIP code".to_string()));
    }

    let cache_key = format!("zip:{}", zip_code);
    let demographics = match state
        .demographics_cache
        .get(&cache_key)
        .await
        .and_then(|sealed| ValidatedCacheEntry::open::<DemographicProfile>(&sealed))
    {
        Some(cached) => {
            tracing::debug!("Demographics cache HIT (validated) for {}", zip_code);
            cached
        }
        None => {
            let provider = DemographicsProvider::new(
                state.config.census_api_url.clone(),
                state.config.census_api_key.clone(),
            );
            let demographics = match provider.fetch(&zip_code).await {
                Some(demographics) => demographics,
                None => {
                    state.audit.record_error(
                        "demographic-data",
                        &zip_code,
                        "No demographic data available",
                        None,
                    );
                    return Err(AppError::NotFound(
                        "No demographic data available".to_string(),
                    ));
                }
            };

            if let Some(sealed) = ValidatedCacheEntry::seal(&demographics) {
                state.demographics_cache.insert(cache_key, sealed).await;
            }
            demographics
        }
    };

    // City/state lookup only dresses up the response
    let resolver = LocationResolver::new(
        state.config.zippopotam_url.clone(),
        state.config.fcc_lookup_url.clone(),
    );
    let location = resolver.resolve(&zip_code).await?;

    let response = DemographicDataResponse {
        zip_code: zip_code.clone(),
        city: location.city,
        state: location.state_code,
        data_source: "U.S. Census Bureau ACS 5-year estimates".to_string(),
        demographics: demographics.clone(),
    };

    let diversity = demographics
        .race_percentages
        .as_ref()
        .map(diversity_score)
        .unwrap_or(0.0);

    let response_json = serde_json::to_value(&response).unwrap_or_default();
    state.audit.record_request(
        "demographic-data",
        &zip_code,
        response_json.clone(),
        Some(json!({
            "census_api_used": true,
            "total_population": demographics.total_population,
            "median_income": demographics.median_household_income,
            "race_diversity_score": diversity,
            "user_agent": user_agent(&headers),
        })),
    );
    state.audit.record_data_source(
        &zip_code,
        "U.S. Census Bureau",
        serde_json::to_value(&demographics).unwrap_or_default(),
        response_json,
    );

    Ok(Json(response))
}

/// GET /vantage-score?zip=NNNNN
///
/// Average Vantage score for the ZIP from the offline dataset. Dataset
/// load failures degrade to "no data" rather than surfacing an error.
pub async fn vantage_score(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ZipQuery>,
) -> Result<Json<VantageScoreResponse>, AppError> {
    let zip_code = params.zip.trim().to_string();

    if !is_valid_zip(&zip_code) {
        state
            .audit
            .record_error("vantage-score", &zip_code, "Invalid ZIP code", None);
        return Err(AppError::BadRequest("Invalid ZIP code".to_string()));
    }

    let record = match state.vantage.lookup(&zip_code).await {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Vantage Score lookup error: {}", e);
            None
        }
    };

    let record = match record {
        Some(record) => record,
        None => {
            state.audit.record_error(
                "vantage-score",
                &zip_code,
                "No Vantage Score data available for this ZIP code",
                None,
            );
            return Err(AppError::NotFound(
                "No Vantage Score data available for this ZIP code".to_string(),
            ));
        }
    };

    let response = VantageScoreResponse {
        zip_code: zip_code.clone(),
        vantage_score: record.vantage_score,
        source: "Local CSV dataset".to_string(),
        city: record.city,
        state: record.state,
    };

    state.audit.record_request(
        "vantage-score",
        &zip_code,
        serde_json::to_value(&response).unwrap_or_default(),
        Some(json!({
            "local_dataset_used": true,
            "user_agent": user_agent(&headers),
        })),
    );

    Ok(Json(response))
}

/// POST /api/check-qualification
///
/// Full solar loan qualification. Input is validated before any I/O; the
/// deterministic decision table is canonical for the returned status, with
/// the AI narrator (when configured) contributing only the explanation
/// text. The narrator's own band-only status is recorded in the audit log
/// beside the canonical one, never merged into it.
pub async fn check_qualification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<QualificationRequest>,
) -> Result<Json<QualificationResponse>, AppError> {
    let zip_code = request.zip_code.trim().to_string();

    if !is_valid_zip(&zip_code) {
        return Err(AppError::BadRequest("Invalid ZIP code format".to_string()));
    }
    if request.electric_bill < 50.0 || request.electric_bill > 500.0 {
        return Err(AppError::BadRequest(
            "Electric bill must be between $50 and $500".to_string(),
        ));
    }
    if request.roof_size <= 0.0 || request.roof_size > 50_000.0 {
        return Err(AppError::BadRequest("Invalid roof size".to_string()));
    }
    let credit_band = CreditBand::parse(&request.credit_band)
        .ok_or_else(|| AppError::BadRequest("Invalid credit band".to_string()))?;

    let engine = QualificationEngine::new(&state.config);
    let mut response = engine.evaluate(&request).await;

    // Optional narrative pass; failures fall back to the template text the
    // engine already produced.
    if let Some(narrator) = GeminiNarrator::from_config(&state.config) {
        let ctx = ExplainContext {
            status: response.status,
            monthly_payment: response.monthly_payment,
            current_bill: response.current_bill,
            payback_years: response.payback_years,
            system_size_kw: response.system_size_kw,
            credit_band,
            total_savings: response.total_savings,
        };

        let ai_result = match narrator.qualify(&request, &ctx).await {
            Ok(ai) => ai,
            Err(e) => {
                tracing::warn!("Gemini calculation failed: {}", e);
                narrative::fallback_qualification(&request)
            }
        };

        if !ai_result.explanation.is_empty() {
            response.explanation = ai_result.explanation.clone();
        }

        state.audit.record_ai(
            &zip_code,
            json!({
                "zip_code": zip_code,
                "electric_bill": request.electric_bill,
                "credit_band": request.credit_band,
                "roof_size": request.roof_size,
            }),
            json!({
                "ai_result": ai_result,
                "canonical_status": response.status,
            }),
        );
    }

    // Fire-and-forget persistence and audit; neither can fail the request
    let store = QualificationStore::new(state.db.clone());
    store.record_detached(QualificationRecord::from_response(
        &zip_code,
        request.roof_size,
        &response,
    ));

    state.audit.record_request(
        "check-qualification",
        &zip_code,
        serde_json::to_value(&response).unwrap_or_default(),
        Some(json!({
            "input_data": {
                "zipCode": zip_code,
                "electricBill": request.electric_bill,
                "creditBand": request.credit_band,
                "roofSize": request.roof_size,
            },
            "ai_powered": state.config.gemini_api_key.is_some(),
            "user_agent": user_agent(&headers),
        })),
    );

    Ok(Json(response))
}

/// GET /logs/summary
pub async fn logs_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(state.audit.summary().await))
}

/// GET /logs/:log_type
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Path(log_type): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !VALID_LOG_TYPES.contains(&log_type.as_str()) {
        return Err(AppError::BadRequest("Invalid log type".to_string()));
    }

    let (logs, total_entries) = state.audit.read_log(&log_type).await;
    Ok(Json(json!({
        "logs": logs,
        "total_entries": total_entries,
    })))
}
