use crate::extractor::RateExtractor;
use crate::models::{ElectricityProfile, Location};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Browser User-Agent sent to the scrape targets, which reject the default
/// client string.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Hard-coded fallback when a scrape target publishes a rate but no usage.
const DEFAULT_MONTHLY_USAGE_KWH: f64 = 900.0;

const FINDENERGY_BASE_URL: &str = "https://findenergy.com";
const ELECTRICITYRATES_BASE_URL: &str = "https://www.electricityrates.com";
const SAVEONENERGY_BASE_URL: &str = "https://www.saveonenergy.com";

/// A single source of electricity economics for a location.
///
/// Implementations swallow their own transport and parse failures: the chain
/// only ever sees "no data" (`None`) or a populated profile, never an error.
#[async_trait]
pub trait UtilityDataSource: Send + Sync {
    /// Tag recorded as `ElectricityProfile::source` and in audit logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, location: &Location) -> Option<ElectricityProfile>;
}

/// Ordered fallback chain over heterogeneous providers.
///
/// Order is fixed by design: the county-level scraper first (fresher,
/// hyper-local), the EIA statistical API as a numerically trustworthy
/// fallback, then the lower-confidence state-level scrapers last. The chain
/// short-circuits at the first provider that yields data and never retries a
/// failed provider.
pub struct UtilityDataChain {
    sources: Vec<Box<dyn UtilityDataSource>>,
}

impl UtilityDataChain {
    /// Builds the default four-provider chain.
    pub fn new(eia_url: String, eia_api_key: String) -> Self {
        Self {
            sources: vec![
                Box::new(FindEnergyProvider::new(FINDENERGY_BASE_URL.to_string())),
                Box::new(EiaProvider::new(eia_url, eia_api_key)),
                Box::new(ElectricityRatesProvider::new(
                    ELECTRICITYRATES_BASE_URL.to_string(),
                )),
                Box::new(SaveOnEnergyProvider::new(SAVEONENERGY_BASE_URL.to_string())),
            ],
        }
    }

    /// Builds a chain with an explicit provider list (used by tests).
    #[allow(dead_code)]
    pub fn with_sources(sources: Vec<Box<dyn UtilityDataSource>>) -> Self {
        Self { sources }
    }

    /// Queries providers in priority order, stopping at the first hit.
    /// Exhaustion yields `None`, never an error.
    pub async fn resolve(&self, location: &Location) -> Option<ElectricityProfile> {
        for source in &self.sources {
            tracing::info!("Trying {}...", source.name());
            if let Some(profile) = source.fetch(location).await {
                tracing::info!("{} data: {:?}", source.name(), profile);
                return Some(profile);
            }
        }

        tracing::warn!(
            "No electricity data available for ZIP {} after {} providers",
            location.zip_code,
            self.sources.len()
        );
        None
    }
}

// ============ Provider 1: findenergy.com ============

/// County-level scrape provider. Accepts the result only when the extractor
/// produced at least one field.
pub struct FindEnergyProvider {
    client: Client,
    base_url: String,
    extractor: RateExtractor,
}

impl FindEnergyProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            extractor: RateExtractor::new(),
        }
    }
}

#[async_trait]
impl UtilityDataSource for FindEnergyProvider {
    fn name(&self) -> &'static str {
        "findenergy.com"
    }

    async fn fetch(&self, location: &Location) -> Option<ElectricityProfile> {
        let url = format!(
            "{}/{}/{}-electricity/",
            self.base_url, location.state_slug, location.county
        );

        let response = match self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("FindEnergy failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("FindEnergy returned status {}", response.status());
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("FindEnergy body read failed: {}", e);
                return None;
            }
        };

        let text = self.extractor.strip_tags(&body);
        let partial = self.extractor.extract(&text);
        if partial.is_empty() {
            return None;
        }

        Some(complete_profile(partial, self.name()))
    }
}

/// Completes a partial extraction into a full profile.
///
/// The page averages are internally consistent (`bill = rate × usage`), so a
/// missing member is derived from the other two. When only one figure was
/// published, the gaps fill in from the 15¢/kWh national-average rate and
/// the 900 kWh default usage, in that order.
fn complete_profile(
    partial: crate::models::PartialElectricityProfile,
    source: &str,
) -> ElectricityProfile {
    let rate = partial.utility_rate_per_kwh.unwrap_or_else(|| {
        match (partial.average_monthly_bill, partial.average_monthly_usage_kwh) {
            (Some(bill), Some(usage)) if usage > 0.0 => round4(bill / usage),
            _ => 0.15,
        }
    });
    let usage = partial
        .average_monthly_usage_kwh
        .or_else(|| {
            partial
                .average_monthly_bill
                .filter(|_| rate > 0.0)
                .map(|bill| (bill / rate).round())
        })
        .unwrap_or(DEFAULT_MONTHLY_USAGE_KWH);
    let bill = partial
        .average_monthly_bill
        .unwrap_or_else(|| round2(rate * usage));

    ElectricityProfile {
        average_monthly_bill: bill,
        average_monthly_usage_kwh: usage,
        utility_rate_per_kwh: rate,
        source: source.to_string(),
    }
}

// ============ Provider 2: EIA statistical API ============

/// Official statistical-API provider keyed by state code.
///
/// Fetches the most recent monthly residential aggregate and derives exact
/// figures: `usage = sales/customers`, `rate = revenue/sales`,
/// `bill = revenue/customers`. Sales and revenue are reported in millions.
pub struct EiaProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EiaProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    async fn fetch_latest_aggregate(&self, state_code: &str) -> Option<Value> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("api_key", self.api_key.as_str()),
                ("frequency", "monthly"),
                ("data[0]", "sales"),
                ("data[1]", "revenue"),
                ("data[2]", "customers"),
                ("facets[stateid][]", state_code),
                ("facets[sectorid][]", "RES"),
                ("sort[0][column]", "period"),
                ("sort[0][direction]", "desc"),
                ("offset", "0"),
                ("length", "1"),
            ],
        )
        .ok()?;

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            tracing::warn!("EIA returned status {}", response.status());
            return None;
        }

        let body: Value = response.json().await.ok()?;
        body.get("response")?.get("data")?.as_array()?.first().cloned()
    }
}

#[async_trait]
impl UtilityDataSource for EiaProvider {
    fn name(&self) -> &'static str {
        "EIA"
    }

    async fn fetch(&self, location: &Location) -> Option<ElectricityProfile> {
        tracing::info!("Getting EIA data for {}...", location.state_code);

        let row = match self.fetch_latest_aggregate(&location.state_code).await {
            Some(row) => row,
            None => {
                tracing::warn!("EIA failed for {}", location.state_code);
                return None;
            }
        };

        let sales = lenient_f64(row.get("sales"))?;
        let revenue = lenient_f64(row.get("revenue"))?;
        let customers = lenient_f64(row.get("customers"))?;
        if sales <= 0.0 || customers <= 0.0 {
            tracing::warn!("EIA aggregate for {} is degenerate", location.state_code);
            return None;
        }

        let total_kwh = sales * 1_000_000.0; // million kWh to kWh
        let total_revenue = revenue * 1_000_000.0; // million $ to $
        let period = row
            .get("period")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        Some(ElectricityProfile {
            average_monthly_usage_kwh: (total_kwh / customers).round(),
            utility_rate_per_kwh: round4(total_revenue / total_kwh),
            average_monthly_bill: round2(total_revenue / customers),
            source: format!("EIA (period: {})", period),
        })
    }
}

// ============ Provider 3: electricityrates.com ============

/// State-level scraper with a single rate pattern and a loose usage pattern;
/// usage defaults to 900 kWh when the page publishes none.
pub struct ElectricityRatesProvider {
    client: Client,
    base_url: String,
    extractor: RateExtractor,
}

impl ElectricityRatesProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            extractor: RateExtractor::new(),
        }
    }
}

#[async_trait]
impl UtilityDataSource for ElectricityRatesProvider {
    fn name(&self) -> &'static str {
        "electricityrates.com"
    }

    async fn fetch(&self, location: &Location) -> Option<ElectricityProfile> {
        let url = format!(
            "{}/electricity-rates/{}/",
            self.base_url, location.state_slug
        );

        let text = fetch_page_text(&self.client, &url, &self.extractor).await?;

        let rate = self.extractor.extract_rate(&text)?;
        let usage = self
            .extractor
            .extract_average_usage(&text)
            .unwrap_or(DEFAULT_MONTHLY_USAGE_KWH);

        Some(ElectricityProfile {
            utility_rate_per_kwh: rate,
            average_monthly_usage_kwh: usage,
            average_monthly_bill: round2(rate * usage),
            source: self.name().to_string(),
        })
    }
}

// ============ Provider 4: saveonenergy.com ============

/// Lowest-confidence scraper: rate pattern only, fixed default usage.
pub struct SaveOnEnergyProvider {
    client: Client,
    base_url: String,
    extractor: RateExtractor,
}

impl SaveOnEnergyProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            extractor: RateExtractor::new(),
        }
    }
}

#[async_trait]
impl UtilityDataSource for SaveOnEnergyProvider {
    fn name(&self) -> &'static str {
        "saveonenergy.com"
    }

    async fn fetch(&self, location: &Location) -> Option<ElectricityProfile> {
        let url = format!(
            "{}/electricity-rates/{}/",
            self.base_url, location.state_slug
        );

        let text = fetch_page_text(&self.client, &url, &self.extractor).await?;
        let rate = self.extractor.extract_rate(&text)?;

        Some(ElectricityProfile {
            utility_rate_per_kwh: rate,
            average_monthly_usage_kwh: DEFAULT_MONTHLY_USAGE_KWH,
            average_monthly_bill: round2(rate * DEFAULT_MONTHLY_USAGE_KWH),
            source: self.name().to_string(),
        })
    }
}

/// GET a scrape target and collapse the response to plain text. All failures
/// are logged and turned into `None`.
async fn fetch_page_text(client: &Client, url: &str, extractor: &RateExtractor) -> Option<String> {
    let response = match client
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .timeout(Duration::from_secs(10))
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("Request to {} failed: {}", url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!("{} returned status {}", url, response.status());
        return None;
    }

    match response.text().await {
        Ok(body) => Some(extractor.strip_tags(&body)),
        Err(e) => {
            tracing::warn!("Body read from {} failed: {}", url, e);
            None
        }
    }
}

/// EIA reports numeric fields inconsistently as numbers or strings.
fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_f64_accepts_numbers_and_strings() {
        assert_eq!(lenient_f64(Some(&json!(12.5))), Some(12.5));
        assert_eq!(lenient_f64(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(lenient_f64(Some(&json!(null))), None);
        assert_eq!(lenient_f64(None), None);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round2(135.456), 135.46);
        assert_eq!(round4(0.15678), 0.1568);
    }

    #[test]
    fn profile_completion_derives_missing_members() {
        use crate::models::PartialElectricityProfile;

        // bill + usage -> rate
        let p = complete_profile(
            PartialElectricityProfile {
                average_monthly_bill: Some(150.0),
                average_monthly_usage_kwh: Some(1000.0),
                utility_rate_per_kwh: None,
            },
            "test",
        );
        assert_eq!(p.utility_rate_per_kwh, 0.15);

        // rate + usage -> bill
        let p = complete_profile(
            PartialElectricityProfile {
                average_monthly_bill: None,
                average_monthly_usage_kwh: Some(900.0),
                utility_rate_per_kwh: Some(0.12),
            },
            "test",
        );
        assert_eq!(p.average_monthly_bill, 108.0);

        // rate alone -> default usage
        let p = complete_profile(
            PartialElectricityProfile {
                average_monthly_bill: None,
                average_monthly_usage_kwh: None,
                utility_rate_per_kwh: Some(0.10),
            },
            "test",
        );
        assert_eq!(p.average_monthly_usage_kwh, 900.0);
        assert_eq!(p.average_monthly_bill, 90.0);
    }
}
