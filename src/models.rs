use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ============ Location ============

/// Resolved location for a ZIP code.
///
/// Derived once per request and never persisted. The `county` field carries
/// the normalized slug (lowercase, hyphen-joined, `" County"` suffix
/// stripped) that the scrape providers splice into their URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// The 5-digit ZIP code the lookup started from.
    pub zip_code: String,
    /// Normalized county slug, e.g. "new-york".
    pub county: String,
    /// Two-letter state code, e.g. "NY".
    pub state_code: String,
    /// Lowercased state slug used in scrape URLs, e.g. "ny".
    pub state_slug: String,
    /// Place name reported by the geocoder.
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

// ============ Electricity ============

/// Electricity economics for a location, supplied by exactly one provider
/// in the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectricityProfile {
    pub average_monthly_bill: f64,
    pub average_monthly_usage_kwh: f64,
    /// Rate in $/kWh (scrapers report cents; extraction divides by 100).
    pub utility_rate_per_kwh: f64,
    /// Tag identifying which provider supplied the data.
    pub source: String,
}

/// Best-effort extraction result over free-form page text. Any subset of the
/// fields may be present; an empty result is treated as extraction failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialElectricityProfile {
    pub average_monthly_bill: Option<f64>,
    pub average_monthly_usage_kwh: Option<f64>,
    pub utility_rate_per_kwh: Option<f64>,
}

impl PartialElectricityProfile {
    pub fn is_empty(&self) -> bool {
        self.average_monthly_bill.is_none()
            && self.average_monthly_usage_kwh.is_none()
            && self.utility_rate_per_kwh.is_none()
    }
}

// ============ Demographics ============

/// Census-derived demographic profile for a ZCTA.
///
/// `race_percentages` is present only when `total_population > 0`; there is
/// no divide-by-zero fallback value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemographicProfile {
    pub total_population: i64,
    pub median_household_income: i64,
    /// Counts by race category; counts sum to at most `total_population`.
    pub race_breakdown: BTreeMap<String, i64>,
    /// Derived percentages rounded to 0.1, omitted for zero population.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_percentages: Option<BTreeMap<String, f64>>,
}

// ============ Vantage score ============

/// One row of the offline Vantage-score-by-ZIP dataset.
#[derive(Debug, Clone, Serialize)]
pub struct VantageRecord {
    pub vantage_score: f64,
    pub city: String,
    pub state: String,
}

// ============ Qualification request/response ============

/// Input payload for `/api/check-qualification`.
///
/// The web client historically sent numbers as strings, so the numeric
/// fields accept either representation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationRequest {
    pub zip_code: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub electric_bill: f64,
    pub credit_band: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub roof_size: f64,
}

/// Cost breakdown for an installed system. Invariant: `net_cost >= 0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostBreakdown {
    pub gross_cost: f64,
    /// 30% federal tax credit.
    pub federal_credit: f64,
    /// State-specific capped incentive; 0 for states without one.
    pub state_credit: f64,
    pub net_cost: f64,
}

/// Loan terms for a credit band; looked up from a fixed table, never mutated.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct LoanTerms {
    pub apr: f64,
    pub term: u32,
    #[serde(rename = "downPayment")]
    pub down_payment: f64,
}

/// Location summary echoed back with qualification results.
#[derive(Debug, Clone, Serialize)]
pub struct LocationInfo {
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// Derived sizing/production figures included with a verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemCalculations {
    pub monthly_kwh_usage: f64,
    pub system_annual_production: f64,
    pub panels_needed: u32,
}

/// Full qualification verdict returned by `/api/check-qualification`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationResponse {
    pub status: crate::engine::QualificationStatus,
    pub monthly_payment: f64,
    pub payback_years: f64,
    #[serde(rename = "systemSizeKW")]
    pub system_size_kw: f64,
    pub total_savings: f64,
    pub system_cost: CostBreakdown,
    pub current_bill: f64,
    pub credit_band: String,
    pub loan_terms: LoanTerms,
    pub calculations: SystemCalculations,
    pub explanation: String,
    pub location: LocationInfo,
    pub timestamp: DateTime<Utc>,
}

// ============ Read-only endpoint responses ============

/// Response body for `/electricity-data`.
#[derive(Debug, Clone, Serialize)]
pub struct ElectricityDataResponse {
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub data_source: String,
    pub average_monthly_bill: f64,
    pub average_monthly_usage_kwh: f64,
    pub utility_rate_per_kwh: f64,
}

/// Response body for `/demographic-data`.
#[derive(Debug, Clone, Serialize)]
pub struct DemographicDataResponse {
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub data_source: String,
    #[serde(flatten)]
    pub demographics: DemographicProfile,
}

/// Response body for `/vantage-score`.
#[derive(Debug, Clone, Serialize)]
pub struct VantageScoreResponse {
    pub zip_code: String,
    pub vantage_score: f64,
    pub source: String,
    pub city: String,
    pub state: String,
}

/// Accepts a JSON number or a numeric string ("150" and 150 both parse).
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("number out of range")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("invalid number: {:?}", s))),
        other => Err(D::Error::custom(format!(
            "expected number or numeric string, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualification_request_accepts_string_numbers() {
        let req: QualificationRequest = serde_json::from_str(
            r#"{"zipCode":"10001","electricBill":"150","creditBand":"Good","roofSize":"1500"}"#,
        )
        .unwrap();
        assert_eq!(req.electric_bill, 150.0);
        assert_eq!(req.roof_size, 1500.0);
    }

    #[test]
    fn qualification_request_accepts_plain_numbers() {
        let req: QualificationRequest = serde_json::from_str(
            r#"{"zipCode":"10001","electricBill":150.5,"creditBand":"Good","roofSize":1500}"#,
        )
        .unwrap();
        assert_eq!(req.electric_bill, 150.5);
    }

    #[test]
    fn qualification_request_rejects_non_numeric_bill() {
        let result: Result<QualificationRequest, _> = serde_json::from_str(
            r#"{"zipCode":"10001","electricBill":"lots","creditBand":"Good","roofSize":1500}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn partial_profile_empty_detection() {
        assert!(PartialElectricityProfile::default().is_empty());

        let partial = PartialElectricityProfile {
            utility_rate_per_kwh: Some(0.15),
            ..Default::default()
        };
        assert!(!partial.is_empty());
    }
}
