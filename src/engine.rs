use crate::calculator;
use crate::config::Config;
use crate::location::LocationResolver;
use crate::models::{
    LocationInfo, QualificationRequest, QualificationResponse, SystemCalculations,
};
use crate::providers::UtilityDataChain;
use serde::{Deserialize, Serialize};

/// Rate assumed when no provider supplied one, in cents per kWh.
pub const DEFAULT_RATE_CENTS: f64 = 15.0;
/// Sun hours assumed for states not in the table.
pub const DEFAULT_SUN_HOURS: f64 = 4.5;

/// Discrete credit tier mapping to fixed loan terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CreditBand {
    pub const ALL: [CreditBand; 4] = [
        CreditBand::Excellent,
        CreditBand::Good,
        CreditBand::Fair,
        CreditBand::Poor,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Excellent" => Some(CreditBand::Excellent),
            "Good" => Some(CreditBand::Good),
            "Fair" => Some(CreditBand::Fair),
            "Poor" => Some(CreditBand::Poor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreditBand::Excellent => "Excellent",
            CreditBand::Good => "Good",
            CreditBand::Fair => "Fair",
            CreditBand::Poor => "Poor",
        }
    }

    /// Fixed loan terms per band; never mutated at runtime.
    pub fn loan_terms(&self) -> crate::models::LoanTerms {
        use crate::models::LoanTerms;
        match self {
            CreditBand::Excellent => LoanTerms {
                apr: 3.99,
                term: 25,
                down_payment: 0.0,
            },
            CreditBand::Good => LoanTerms {
                apr: 5.99,
                term: 20,
                down_payment: 0.0,
            },
            CreditBand::Fair => LoanTerms {
                apr: 8.99,
                term: 15,
                down_payment: 10.0,
            },
            CreditBand::Poor => LoanTerms {
                apr: 12.99,
                term: 10,
                down_payment: 20.0,
            },
        }
    }
}

/// Tri-state qualification verdict. Single-shot evaluation; there are no
/// intermediate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationStatus {
    Approved,
    Borderline,
    NotQualified,
}

impl QualificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualificationStatus::Approved => "approved",
            QualificationStatus::Borderline => "borderline",
            QualificationStatus::NotQualified => "not_qualified",
        }
    }
}

/// Payment-to-bill ratio. A zero bill maps to +infinity by convention,
/// which guarantees `not_qualified` without a divide-by-zero fault.
pub fn payment_ratio(monthly_payment: f64, monthly_bill: f64) -> f64 {
    if monthly_bill > 0.0 {
        monthly_payment / monthly_bill
    } else {
        f64::INFINITY
    }
}

/// The canonical decision table over `{credit band, payment ratio, payback}`.
///
/// Pure function of its inputs; evaluating twice with identical arguments
/// always yields the same verdict.
pub fn decide(
    credit_band: CreditBand,
    payment_ratio: f64,
    payback_years: f64,
) -> QualificationStatus {
    match credit_band {
        CreditBand::Excellent => {
            if payment_ratio <= 1.2 && payback_years <= 10.0 {
                QualificationStatus::Approved
            } else if payment_ratio <= 1.5 && payback_years <= 15.0 {
                QualificationStatus::Borderline
            } else {
                QualificationStatus::NotQualified
            }
        }
        CreditBand::Good => {
            if payment_ratio <= 1.0 && payback_years <= 8.0 {
                QualificationStatus::Approved
            } else if payment_ratio <= 1.3 && payback_years <= 12.0 {
                QualificationStatus::Borderline
            } else {
                QualificationStatus::NotQualified
            }
        }
        CreditBand::Fair => {
            if payment_ratio <= 0.9 && payback_years <= 7.0 {
                QualificationStatus::Approved
            } else if payment_ratio <= 1.1 && payback_years <= 10.0 {
                QualificationStatus::Borderline
            } else {
                QualificationStatus::NotQualified
            }
        }
        // Poor credit is never approved outright
        CreditBand::Poor => {
            if payment_ratio <= 0.8 && payback_years <= 5.0 {
                QualificationStatus::Borderline
            } else {
                QualificationStatus::NotQualified
            }
        }
    }
}

/// The simplified band-only decision used on the AI narration path:
/// qualification is a function of the credit band alone, ignoring ratio and
/// payback. This path intentionally diverges from [`decide`] and the two are
/// never merged; `/api/check-qualification` treats [`decide`] as canonical
/// and surfaces this one only through the narration fallback and its audit
/// records.
pub fn decide_by_band(credit_band: CreditBand) -> QualificationStatus {
    match credit_band {
        CreditBand::Excellent | CreditBand::Good => QualificationStatus::Approved,
        CreditBand::Fair => QualificationStatus::Borderline,
        CreditBand::Poor => QualificationStatus::NotQualified,
    }
}

/// Daily sun hours by state, from the installation dataset; anything not
/// listed gets the national default.
pub fn sun_hours_for_state(state_code: &str) -> f64 {
    match state_code {
        "CA" => 5.8,
        "TX" => 5.3,
        "FL" => 5.2,
        "NY" => 4.2,
        "IL" => 4.0,
        _ => DEFAULT_SUN_HOURS,
    }
}

/// Orchestrates a full qualification: location, utility data, sizing, cost,
/// loan math and the decision table.
pub struct QualificationEngine {
    resolver: LocationResolver,
    chain: UtilityDataChain,
}

impl QualificationEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            resolver: LocationResolver::new(
                config.zippopotam_url.clone(),
                config.fcc_lookup_url.clone(),
            ),
            chain: UtilityDataChain::new(config.eia_url.clone(), config.eia_api_key.clone()),
        }
    }

    /// Builds an engine over explicit collaborators (used by tests).
    #[allow(dead_code)]
    pub fn with_parts(resolver: LocationResolver, chain: UtilityDataChain) -> Self {
        Self { resolver, chain }
    }

    /// Evaluates a qualification request into a full verdict.
    ///
    /// Location or utility-data failures degrade to the documented defaults
    /// (15¢/kWh, 4.5 sun hours, no state incentive) rather than failing the
    /// request; input validation is the caller's job and happens before any
    /// I/O.
    pub async fn evaluate(&self, request: &QualificationRequest) -> QualificationResponse {
        let credit_band =
            CreditBand::parse(&request.credit_band).unwrap_or(CreditBand::Fair);
        let monthly_bill = request.electric_bill;

        let location = match self.resolver.resolve(&request.zip_code).await {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!(
                    "Could not resolve location for {}: {}",
                    request.zip_code,
                    e
                );
                None
            }
        };

        let profile = match &location {
            Some(location) => self.chain.resolve(location).await,
            None => None,
        };

        let state_code = location
            .as_ref()
            .map(|l| l.state_code.clone())
            .unwrap_or_else(|| "US".to_string());
        let rate_cents = profile
            .as_ref()
            .map(|p| p.utility_rate_per_kwh * 100.0)
            .unwrap_or(DEFAULT_RATE_CENTS);
        let sun_hours = sun_hours_for_state(&state_code);

        // Size from usage, bounded above by roof capacity and below by the
        // minimum viable system. The roof clamp rounds down so the result
        // stays on the 0.5 kW grid without exceeding the roof.
        let usage_based_size = calculator::system_size(monthly_bill, rate_cents, sun_hours);
        let max_roof_capacity = request.roof_size / calculator::ROOF_SQFT_PER_KW;
        let mut system_size_kw = usage_based_size;
        if system_size_kw > max_roof_capacity {
            system_size_kw = calculator::floor_half(max_roof_capacity);
        }
        system_size_kw = system_size_kw.max(calculator::MIN_SYSTEM_KW);

        let costs = calculator::system_cost(system_size_kw, &state_code);
        let loan_terms = credit_band.loan_terms();
        let monthly_payment =
            calculator::monthly_payment(costs.net_cost, loan_terms.apr, loan_terms.term);
        let payback_years =
            calculator::payback_years(costs.net_cost, monthly_bill, monthly_payment);
        let total_savings =
            calculator::lifetime_savings(system_size_kw, rate_cents, sun_hours, 25);

        let ratio = payment_ratio(monthly_payment, monthly_bill);
        let status = decide(credit_band, ratio, payback_years);

        let calculations = SystemCalculations {
            monthly_kwh_usage: (monthly_bill / (rate_cents / 100.0)).round(),
            system_annual_production: (system_size_kw
                * 365.0
                * sun_hours
                * calculator::SYSTEM_EFFICIENCY)
                .round(),
            panels_needed: calculator::panels_needed(system_size_kw),
        };

        let explanation = crate::narrative::template_explanation(&crate::narrative::ExplainContext {
            status,
            monthly_payment,
            current_bill: monthly_bill,
            payback_years,
            system_size_kw,
            credit_band,
            total_savings,
        });

        let location_info = match &location {
            Some(l) => LocationInfo {
                city: l.city.clone(),
                state: l.state_code.clone(),
                zip_code: l.zip_code.clone(),
            },
            None => LocationInfo {
                city: "Unknown".to_string(),
                state: "Unknown".to_string(),
                zip_code: request.zip_code.clone(),
            },
        };

        QualificationResponse {
            status,
            monthly_payment,
            payback_years,
            system_size_kw,
            total_savings,
            system_cost: costs,
            current_bill: monthly_bill,
            credit_band: credit_band.as_str().to_string(),
            loan_terms,
            calculations,
            explanation,
            location: location_info,
            timestamp: chrono::Utc::now(),
        }
    }
}
