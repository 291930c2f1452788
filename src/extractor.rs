use crate::models::PartialElectricityProfile;
use regex::Regex;

/// Best-effort extraction of billing/usage/rate figures from scraped page
/// text.
///
/// Three independent pattern rules are applied; any subset may match and
/// fields that do not match are omitted rather than defaulted. Nothing here
/// validates or raises: callers treat an empty result as "no data" and move
/// on to the next provider. The patterns are site-specific heuristics and
/// deliberately isolated in this module so they can be swapped without
/// touching the decision engine.
pub struct RateExtractor {
    bill_re: Regex,
    usage_re: Regex,
    rate_re: Regex,
    alt_usage_re: Regex,
    tag_re: Regex,
}

impl RateExtractor {
    pub fn new() -> Self {
        Self {
            bill_re: Regex::new(r"(?i)average.*?bill.*?\$([0-9,]+\.?[0-9]*)").unwrap(),
            usage_re: Regex::new(r"(?i)([0-9,]+)\s*kWh.*?per month").unwrap(),
            rate_re: Regex::new(r"(?i)([0-9]+\.?[0-9]*)\s*cents?\s*per\s*kWh").unwrap(),
            alt_usage_re: Regex::new(r"(?i)average.*?([0-9,]+)\s*kWh").unwrap(),
            tag_re: Regex::new(r"<[^>]+>").unwrap(),
        }
    }

    /// Applies all three rules over free text.
    pub fn extract(&self, raw_text: &str) -> PartialElectricityProfile {
        let mut profile = PartialElectricityProfile::default();

        if let Some(caps) = self.bill_re.captures(raw_text) {
            profile.average_monthly_bill = parse_number(&caps[1]);
        }
        if let Some(caps) = self.usage_re.captures(raw_text) {
            profile.average_monthly_usage_kwh = parse_number(&caps[1]);
        }
        if let Some(caps) = self.rate_re.captures(raw_text) {
            // Scrapers report cents per kWh; downstream wants $/kWh
            profile.utility_rate_per_kwh = parse_number(&caps[1]).map(|cents| cents / 100.0);
        }

        profile
    }

    /// Single-pattern rate extraction used by the lower-confidence scrapers.
    pub fn extract_rate(&self, raw_text: &str) -> Option<f64> {
        self.rate_re
            .captures(raw_text)
            .and_then(|caps| parse_number(&caps[1]))
            .map(|cents| cents / 100.0)
    }

    /// Looser usage pattern ("average ... N kWh") used by the alternate
    /// scrapers, which lack the "per month" phrasing.
    pub fn extract_average_usage(&self, raw_text: &str) -> Option<f64> {
        self.alt_usage_re
            .captures(raw_text)
            .and_then(|caps| parse_number(&caps[1]))
    }

    /// Collapses HTML markup to plain text so the phrase patterns can span
    /// element boundaries.
    pub fn strip_tags(&self, html: &str) -> String {
        self.tag_re.replace_all(html, " ").into_owned()
    }
}

impl Default for RateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Numbers in page text carry thousands separators ("1,234").
fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}
