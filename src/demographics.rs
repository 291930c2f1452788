use crate::models::DemographicProfile;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// The seven ACS race-population variables plus median household income,
/// queried for the ZIP's tabulation area (ZCTA).
const CENSUS_VARIABLES: [(&str, &str); 8] = [
    ("B02001_001E", "total"),
    ("B02001_002E", "white"),
    ("B02001_003E", "black"),
    ("B02001_004E", "native_american"),
    ("B02001_005E", "asian"),
    ("B02001_006E", "pacific_islander"),
    ("B02001_007E", "other"),
    ("B02001_008E", "mixed"),
];
const MEDIAN_INCOME_VARIABLE: &str = "B19013_001E";

/// Fetches population/income/race metrics for a ZCTA from the Census ACS
/// API.
///
/// Fails soft: any transport or parse error is logged and yields `None`,
/// never an error to the caller.
#[derive(Clone)]
pub struct DemographicsProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DemographicsProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    pub async fn fetch(&self, zip_code: &str) -> Option<DemographicProfile> {
        let mut variables: Vec<&str> = vec!["NAME"];
        variables.extend(CENSUS_VARIABLES.iter().map(|(var, _)| *var));
        variables.push(MEDIAN_INCOME_VARIABLE);

        // The Census API's "for" predicate uses literal spaces and colons;
        // keep the raw form it documents rather than letting the URL
        // builder re-encode them.
        let url = format!(
            "{}?get={}&for=zip%20code%20tabulation%20area:{}&key={}",
            self.base_url,
            variables.join(","),
            zip_code,
            self.api_key
        );

        tracing::info!("Fetching Census data for ZIP {}", zip_code);

        let response = match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Failed to get Census data: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Census API returned status {}", response.status());
            return None;
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to parse Census response: {}", e);
                return None;
            }
        };

        let profile = parse_census_rows(&body);
        if profile.is_none() {
            tracing::warn!("Census response for ZIP {} had no usable rows", zip_code);
        } else {
            tracing::info!("Successfully fetched Census data");
        }
        profile
    }
}

/// The Census API returns an array-of-arrays: a header row followed by one
/// value row per geography, all values as strings.
fn parse_census_rows(body: &Value) -> Option<DemographicProfile> {
    let rows = body.as_array()?;
    let headers = rows.first()?.as_array()?;
    let values = rows.get(1)?.as_array()?;

    let mut by_name: BTreeMap<&str, &str> = BTreeMap::new();
    for (header, value) in headers.iter().zip(values.iter()) {
        if let (Some(h), Some(v)) = (header.as_str(), value.as_str()) {
            by_name.insert(h, v);
        }
    }

    let field = |name: &str| -> Option<i64> { by_name.get(name)?.parse::<i64>().ok() };

    let total_population = field("B02001_001E")?;
    let median_household_income = field(MEDIAN_INCOME_VARIABLE)?;

    let mut race_breakdown = BTreeMap::new();
    for (variable, race) in CENSUS_VARIABLES.iter().skip(1) {
        race_breakdown.insert(race.to_string(), field(variable)?);
    }

    // Percentages are derived only for a nonzero population; a zero-pop
    // tract omits them instead of dividing by zero.
    let race_percentages = (total_population > 0).then(|| {
        race_breakdown
            .iter()
            .map(|(race, count)| {
                let pct = (*count as f64 / total_population as f64) * 100.0;
                (race.clone(), (pct * 10.0).round() / 10.0)
            })
            .collect()
    });

    Some(DemographicProfile {
        total_population,
        median_household_income,
        race_breakdown,
        race_percentages,
    })
}

/// Simpson's diversity index over the race percentages: `1 − Σ p²`, rounded
/// to 3 decimals. Empty input scores 0.
pub fn diversity_score(race_percentages: &BTreeMap<String, f64>) -> f64 {
    if race_percentages.is_empty() {
        return 0.0;
    }

    let total: f64 = race_percentages
        .values()
        .map(|pct| {
            let proportion = pct / 100.0;
            proportion * proportion
        })
        .sum();

    ((1.0 - total) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_body() -> Value {
        json!([
            [
                "NAME",
                "B02001_001E",
                "B02001_002E",
                "B02001_003E",
                "B02001_004E",
                "B02001_005E",
                "B02001_006E",
                "B02001_007E",
                "B02001_008E",
                "B19013_001E",
                "zip code tabulation area"
            ],
            [
                "ZCTA5 10001",
                "100",
                "70",
                "20",
                "1",
                "5",
                "0",
                "2",
                "2",
                "85000",
                "10001"
            ]
        ])
    }

    #[test]
    fn parses_rows_and_derives_percentages() {
        let profile = parse_census_rows(&sample_body()).unwrap();
        assert_eq!(profile.total_population, 100);
        assert_eq!(profile.median_household_income, 85000);
        assert_eq!(profile.race_breakdown["white"], 70);

        let percentages = profile.race_percentages.unwrap();
        assert_eq!(percentages["white"], 70.0);
        assert_eq!(percentages["black"], 20.0);

        let sum: f64 = percentages.values().sum();
        assert!((sum - 100.0).abs() <= 0.5);
    }

    #[test]
    fn zero_population_omits_percentages() {
        let mut body = sample_body();
        body[1][1] = json!("0");
        let profile = parse_census_rows(&body).unwrap();
        assert!(profile.race_percentages.is_none());
    }

    #[test]
    fn malformed_body_yields_none() {
        assert!(parse_census_rows(&json!({"error": "bad key"})).is_none());
        assert!(parse_census_rows(&json!([["NAME"]])).is_none());
    }

    #[test]
    fn diversity_index() {
        let mut percentages = BTreeMap::new();
        percentages.insert("white".to_string(), 50.0);
        percentages.insert("black".to_string(), 50.0);
        assert_eq!(diversity_score(&percentages), 0.5);

        let mut single = BTreeMap::new();
        single.insert("white".to_string(), 100.0);
        assert_eq!(diversity_score(&single), 0.0);

        assert_eq!(diversity_score(&BTreeMap::new()), 0.0);
    }
}
