use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub eia_api_key: String,
    pub eia_url: String,
    /// Geocoding endpoint; must contain a `{zip}` placeholder.
    pub zippopotam_url: String,
    pub fcc_lookup_url: String,
    pub census_api_key: String,
    pub census_api_url: String,
    pub gemini_api_key: Option<String>,
    /// Optional override for the Gemini endpoint (used by tests).
    pub gemini_url: Option<String>,
    pub vantage_csv_path: String,
    pub logs_dir: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5500".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://solar_loan.db".to_string()),
            eia_api_key: required_non_empty("EIA_API_KEY")?,
            eia_url: required_url("EIA_URL")?,
            zippopotam_url: std::env::var("ZIPPOPOTAM_URL")
                .map_err(|_| anyhow::anyhow!("ZIPPOPOTAM_URL environment variable required"))
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("ZIPPOPOTAM_URL must start with http:// or https://");
                    }
                    if !url.contains("{zip}") {
                        anyhow::bail!("ZIPPOPOTAM_URL must contain a {{zip}} placeholder");
                    }
                    Ok(url)
                })?,
            fcc_lookup_url: required_url("FCC_LOOKUP_URL")?,
            census_api_key: required_non_empty("CENSUS_API_KEY")?,
            census_api_url: required_url("CENSUS_API_URL")?,
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            gemini_url: std::env::var("GEMINI_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            vantage_csv_path: std::env::var("VANTAGE_CSV_PATH")
                .unwrap_or_else(|_| "data/vantage_scores.csv".to_string()),
            logs_dir: std::env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
        };

        if !config.database_url.starts_with("sqlite:") {
            anyhow::bail!("DATABASE_URL must start with sqlite:");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("EIA URL: {}", config.eia_url);
        tracing::debug!("Census URL: {}", config.census_api_url);
        tracing::debug!("Server Port: {}", config.port);
        if config.gemini_api_key.is_some() {
            tracing::info!("Gemini narrative generation enabled");
        } else {
            tracing::warn!("GEMINI_API_KEY not set; falling back to template explanations");
        }

        Ok(config)
    }
}

fn required_non_empty(var: &str) -> anyhow::Result<String> {
    std::env::var(var)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", var))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", var);
            }
            Ok(value)
        })
}

fn required_url(var: &str) -> anyhow::Result<String> {
    let value = required_non_empty(var)?;
    Url::parse(&value).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", var, e))?;
    Ok(value)
}
