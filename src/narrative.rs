use crate::calculator;
use crate::config::Config;
use crate::engine::{decide_by_band, CreditBand, QualificationStatus};
use crate::errors::AppError;
use crate::models::QualificationRequest;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// Inputs for rendering an explanation, whether by template or by the
/// generative model.
#[derive(Debug, Clone)]
pub struct ExplainContext {
    pub status: QualificationStatus,
    pub monthly_payment: f64,
    pub current_bill: f64,
    pub payback_years: f64,
    pub system_size_kw: f64,
    pub credit_band: CreditBand,
    pub total_savings: f64,
}

/// Structured result of the AI narration path.
///
/// The `status` here comes from the simplified band-only rule and may
/// disagree with the canonical decision table; callers log it alongside the
/// canonical verdict instead of merging the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiQualification {
    pub status: String,
    #[serde(default)]
    pub system_size_kw: f64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub net_cost_after_incentives: f64,
    #[serde(default)]
    pub lifetime_savings: f64,
    pub explanation: String,
    #[serde(default)]
    pub loan_terms: AiLoanTerms,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiLoanTerms {
    #[serde(default)]
    pub apr: f64,
    #[serde(default)]
    pub term_years: u32,
    #[serde(default)]
    pub down_payment_percent: f64,
}

/// Client for the Gemini `generateContent` endpoint.
///
/// Best-effort: callers must always pair this with the template fallback.
pub struct GeminiNarrator {
    client: Client,
    api_key: String,
    url: String,
}

impl GeminiNarrator {
    /// Returns a narrator only when an API key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.gemini_api_key.as_ref().map(|key| Self {
            client: Client::new(),
            api_key: key.clone(),
            url: config
                .gemini_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
        })
    }

    /// Asks the model for a qualification narrative as structured JSON.
    pub async fn qualify(
        &self,
        request: &QualificationRequest,
        ctx: &ExplainContext,
    ) -> Result<AiQualification, AppError> {
        let prompt = build_prompt(request, ctx);

        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .client
            .post(format!("{}?key={}", self.url, self.api_key))
            .timeout(Duration::from_secs(15))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "Gemini returned status {}",
                response.status()
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.pointer("/content/parts/0/text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                AppError::UpstreamUnavailable("Gemini response missing candidate text".to_string())
            })?;

        let cleaned = strip_code_fences(text);
        serde_json::from_str::<AiQualification>(cleaned).map_err(|e| {
            AppError::UpstreamUnavailable(format!("Gemini returned non-JSON payload: {}", e))
        })
    }
}

/// Models wrap JSON replies in Markdown code fences more often than not.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_prefix = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_prefix
        .strip_suffix("```")
        .unwrap_or(without_prefix)
        .trim()
}

fn build_prompt(request: &QualificationRequest, ctx: &ExplainContext) -> String {
    let max_capacity = request.roof_size / calculator::ROOF_SQFT_PER_KW;

    let band_rules = CreditBand::ALL
        .iter()
        .map(|band| format!("- {} Credit: \"{}\"", band.as_str(), decide_by_band(*band).as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert solar loan qualification analyst. Based on the following data, produce a solar loan qualification narrative.

USER PROFILE:
- ZIP Code: {zip}
- Monthly Electric Bill: ${bill:.0}
- Credit Band: {band}
- Available Roof Size: {roof} sq ft
- Maximum System Capacity: {cap:.1} kW (based on roof size constraint)

COMPUTED ESTIMATE:
- Recommended system size: {size:.1} kW
- Estimated monthly payment: ${payment:.2}
- Payback period: {payback:.1} years
- 25-year savings: ${savings:.0}

SOLAR INDUSTRY STANDARDS:
- Solar panels: ~400W each, ~25 sq ft per panel (including spacing)
- System cost: ~$2.75/watt installed
- Federal tax credit: 30%
- System efficiency: ~85% (including inverter losses)
- Panel degradation: 0.5% per year
- Roof space requirement: ~250 sq ft per kW (realistic spacing)

IMPORTANT: System size CANNOT exceed {cap:.1} kW due to roof space limitations.

QUALIFICATION RULES (credit band only):
{band_rules}

Respond in this exact JSON format:
{{
    "status": "approved|borderline|not_qualified",
    "system_size_kw": 0.0,
    "total_cost": 0.0,
    "net_cost_after_incentives": 0.0,
    "lifetime_savings": 0.0,
    "explanation": "Brief explanation here",
    "loan_terms": {{
        "apr": 0.0,
        "term_years": 0,
        "down_payment_percent": 0
    }}
}}"#,
        zip = request.zip_code,
        bill = ctx.current_bill,
        band = ctx.credit_band.as_str(),
        roof = request.roof_size,
        cap = max_capacity,
        size = ctx.system_size_kw,
        payment = ctx.monthly_payment,
        payback = ctx.payback_years,
        savings = ctx.total_savings,
        band_rules = band_rules,
    )
}

/// Non-AI qualification identical in shape to the model's output, used when
/// the generative call fails. Status follows the band-only rule.
pub fn fallback_qualification(request: &QualificationRequest) -> AiQualification {
    let credit_band = CreditBand::parse(&request.credit_band).unwrap_or(CreditBand::Fair);
    let monthly_bill = request.electric_bill;

    // Assume the default rate and 5 sun hours when no data accompanies the
    // request; this path never performs I/O.
    let estimated_usage = monthly_bill / 0.15;
    let usage_based_size =
        (estimated_usage * 12.0) / (365.0 * 5.0 * calculator::SYSTEM_EFFICIENCY);
    let max_roof_capacity = request.roof_size / calculator::ROOF_SQFT_PER_KW;
    let system_size_kw = f64::min(usage_based_size, max_roof_capacity).max(calculator::MIN_SYSTEM_KW);

    let gross_cost = system_size_kw * 1000.0 * calculator::COST_PER_WATT;
    let net_cost = gross_cost * 0.7; // 30% federal credit
    let terms = credit_band.loan_terms();

    AiQualification {
        status: decide_by_band(credit_band).as_str().to_string(),
        system_size_kw: round2(system_size_kw),
        total_cost: round2(gross_cost),
        net_cost_after_incentives: round2(net_cost),
        lifetime_savings: round2(monthly_bill * 12.0 * 25.0 - net_cost),
        explanation: format!(
            "Based on your ${:.0} monthly bill and {} credit, this {:.1}kW system is recommended.",
            monthly_bill,
            credit_band.as_str(),
            system_size_kw
        ),
        loan_terms: AiLoanTerms {
            apr: terms.apr,
            term_years: terms.term,
            down_payment_percent: terms.down_payment,
        },
    }
}

/// Renders a friendly explanation from fixed templates keyed by status,
/// savings and credit band. This is the deterministic twin of the AI
/// narrator and backs every verdict when no model is configured.
pub fn template_explanation(ctx: &ExplainContext) -> String {
    let monthly_savings = ctx.current_bill - ctx.monthly_payment;
    let payment = ctx.monthly_payment;
    let bill = ctx.current_bill;

    match ctx.status {
        QualificationStatus::Approved => {
            if monthly_savings > 50.0 {
                format!(
                    "Fantastic! You're pre-approved and your solar savings are impressive. \
                     You'll actually save ${:.0} per month from day one, while building \
                     equity in your home. This is a no-brainer!",
                    monthly_savings.abs()
                )
            } else if monthly_savings > 0.0 {
                format!(
                    "Great news! You're pre-approved for solar financing. With an estimated \
                     monthly payment of ${:.0}, you'll save ${:.0} per month compared to your \
                     current electric bill. Your solar system will pay for itself in just \
                     {:.1} years!",
                    payment,
                    monthly_savings.abs(),
                    ctx.payback_years
                )
            } else {
                format!(
                    "Good news! You're pre-approved for solar financing. Your monthly payment \
                     of ${:.0} is close to your current bill, but you'll be protected from \
                     rising electricity costs and own your power.",
                    payment
                )
            }
        }
        QualificationStatus::Borderline => {
            if matches!(ctx.credit_band, CreditBand::Fair | CreditBand::Poor) {
                format!(
                    "You're close! Your energy savings look great, but boosting your credit \
                     score just a bit could unlock better rates and lower your payment from \
                     ${:.0} to under ${:.0}.",
                    payment,
                    bill * 0.9
                )
            } else {
                format!(
                    "You're on the edge of approval! With a monthly payment of ${:.0}, solar \
                     could work for you. Consider a smaller system or improving your credit \
                     score by a few points to get better terms.",
                    payment
                )
            }
        }
        QualificationStatus::NotQualified => {
            if bill < 75.0 {
                format!(
                    "Your electric bill of ${:.0} might be too low to justify a solar system \
                     right now. Solar typically makes sense for bills over $100/month. \
                     Consider energy efficiency improvements first.",
                    bill
                )
            } else if ctx.credit_band == CreditBand::Poor {
                format!(
                    "Solar will be a great option once you improve your credit score. Focus \
                     on paying down debts and making on-time payments. Even moving from \
                     '{}' to 'Fair' credit could make solar affordable for you.",
                    ctx.credit_band.as_str()
                )
            } else {
                format!(
                    "Not quite ready for solar financing today, but don't give up! Your \
                     estimated payment of ${:.0} is too high compared to your ${:.0} electric \
                     bill. Here's what could help...",
                    payment, bill
                )
            }
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(status: QualificationStatus, band: CreditBand, payment: f64, bill: f64) -> ExplainContext {
        ExplainContext {
            status,
            monthly_payment: payment,
            current_bill: bill,
            payback_years: 8.0,
            system_size_kw: 7.5,
            credit_band: band,
            total_savings: 30000.0,
        }
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn approved_templates_track_savings() {
        let high = template_explanation(&ctx(
            QualificationStatus::Approved,
            CreditBand::Excellent,
            80.0,
            150.0,
        ));
        assert!(high.contains("no-brainer"));

        let modest = template_explanation(&ctx(
            QualificationStatus::Approved,
            CreditBand::Excellent,
            140.0,
            150.0,
        ));
        assert!(modest.contains("pay for itself"));

        let neutral = template_explanation(&ctx(
            QualificationStatus::Approved,
            CreditBand::Excellent,
            160.0,
            150.0,
        ));
        assert!(neutral.contains("rising electricity costs"));
    }

    #[test]
    fn not_qualified_templates_give_a_tip() {
        let low_bill = template_explanation(&ctx(
            QualificationStatus::NotQualified,
            CreditBand::Good,
            120.0,
            60.0,
        ));
        assert!(low_bill.contains("too low to justify"));

        let poor_credit = template_explanation(&ctx(
            QualificationStatus::NotQualified,
            CreditBand::Poor,
            120.0,
            150.0,
        ));
        assert!(poor_credit.contains("improve your credit score"));
    }

    #[test]
    fn fallback_uses_band_only_rule() {
        let request = QualificationRequest {
            zip_code: "10001".to_string(),
            electric_bill: 150.0,
            credit_band: "Poor".to_string(),
            roof_size: 1500.0,
        };
        let result = fallback_qualification(&request);
        assert_eq!(result.status, "not_qualified");
        assert!(result.system_size_kw >= calculator::MIN_SYSTEM_KW);
        assert_eq!(result.loan_terms.apr, 12.99);
    }

    #[test]
    fn fallback_respects_roof_cap() {
        let request = QualificationRequest {
            zip_code: "10001".to_string(),
            electric_bill: 400.0,
            credit_band: "Good".to_string(),
            roof_size: 800.0,
        };
        let result = fallback_qualification(&request);
        // 800 sq ft caps the system at 3.2 kW
        assert!(result.system_size_kw <= 3.2 + 1e-9);
        assert_eq!(result.status, "approved");
    }
}
