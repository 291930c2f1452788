use crate::errors::AppError;
use crate::models::Location;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Resolves a ZIP code to `{county, state, city, lat/lon}` via two chained
/// lookups: a Zippopotam-style geocoder followed by the FCC area API for the
/// county name.
///
/// Pure query with no side effects. Malformed ZIP codes are rejected before
/// any network call.
#[derive(Clone)]
pub struct LocationResolver {
    client: Client,
    zippopotam_url: String,
    fcc_lookup_url: String,
}

/// True iff the ZIP is exactly five ASCII digits.
pub fn is_valid_zip(zip_code: &str) -> bool {
    zip_code.len() == 5 && zip_code.bytes().all(|b| b.is_ascii_digit())
}

/// County-name normalization the scrape providers depend on for URL
/// construction: strip the word "County", lowercase, hyphen-join.
pub fn normalize_county(name: &str) -> String {
    name.replace(" County", "").to_lowercase().replace(' ', "-")
}

impl LocationResolver {
    pub fn new(zippopotam_url: String, fcc_lookup_url: String) -> Self {
        Self {
            client: Client::new(),
            zippopotam_url,
            fcc_lookup_url,
        }
    }

    /// Resolves a ZIP code to a full `Location`.
    ///
    /// # Errors
    ///
    /// * `BadRequest` for ZIPs that are not exactly 5 digits (no I/O done).
    /// * `NotFound` when the geocoder does not know the ZIP.
    /// * `UpstreamUnavailable` when the county lookup fails or maps to no county.
    pub async fn resolve(&self, zip_code: &str) -> Result<Location, AppError> {
        if !is_valid_zip(zip_code) {
            return Err(AppError::BadRequest("Invalid ZIP code".to_string()));
        }

        let url = self.zippopotam_url.replace("{zip}", zip_code);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Geocoder request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("ZIP code {} not found", zip_code)));
        }
        if !response.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "Geocoder returned status {}",
                response.status()
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse geocoder response: {}", e))
        })?;

        let place = data
            .get("places")
            .and_then(|p| p.as_array())
            .and_then(|p| p.first())
            .ok_or_else(|| AppError::NotFound(format!("ZIP code {} not found", zip_code)))?;

        let latitude = place
            .get("latitude")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| {
                AppError::UpstreamUnavailable("Geocoder response missing latitude".to_string())
            })?;
        let longitude = place
            .get("longitude")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| {
                AppError::UpstreamUnavailable("Geocoder response missing longitude".to_string())
            })?;
        let state_code = place
            .get("state abbreviation")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let city = place
            .get("place name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let county = self.lookup_county(latitude, longitude).await?;
        let state_slug = state_code.to_lowercase();

        tracing::info!(
            "Location: {}, {} -> {} county",
            city,
            state_code,
            county
        );

        Ok(Location {
            zip_code: zip_code.to_string(),
            county,
            state_slug,
            state_code,
            city,
            latitude,
            longitude,
        })
    }

    /// Second hop: FCC area lookup keyed by coordinates.
    async fn lookup_county(&self, latitude: f64, longitude: f64) -> Result<String, AppError> {
        let url = reqwest::Url::parse_with_params(
            &self.fcc_lookup_url,
            &[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("format", "json".to_string()),
            ],
        )
        .map_err(|e| AppError::UpstreamUnavailable(format!("Failed to build FCC URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                AppError::UpstreamUnavailable(format!("County lookup request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "County lookup returned status {}",
                response.status()
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse county response: {}", e))
        })?;

        let county_name = data
            .get("County")
            .and_then(|c| c.get("name"))
            .and_then(|n| n.as_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                AppError::UpstreamUnavailable("No county for coordinates".to_string())
            })?;

        Ok(normalize_county(county_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_validation() {
        assert!(is_valid_zip("10001"));
        assert!(is_valid_zip("00501"));

        assert!(!is_valid_zip("1234"));
        assert!(!is_valid_zip("123456"));
        assert!(!is_valid_zip("1000a"));
        assert!(!is_valid_zip("10001-1234"));
        assert!(!is_valid_zip(""));
    }

    #[test]
    fn county_normalization_contract() {
        assert_eq!(normalize_county("New York County"), "new-york");
        assert_eq!(normalize_county("Los Angeles County"), "los-angeles");
        assert_eq!(normalize_county("Cook County"), "cook");
        // No suffix to strip
        assert_eq!(normalize_county("District of Columbia"), "district-of-columbia");
    }
}
