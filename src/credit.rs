use crate::errors::AppError;
use crate::models::VantageRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Vantage-score-by-ZIP lookup backed by an offline CSV dataset.
///
/// One-time-load contract: the table is read from disk at most once per
/// process and frozen thereafter; concurrent first lookups collapse into a
/// single load. A failed load leaves the cell empty so a later request can
/// retry, mirroring the lazy spreadsheet load this replaces. After a
/// successful load the data is immutable and safe for concurrent readers.
#[derive(Clone)]
pub struct VantageStore {
    path: PathBuf,
    table: Arc<OnceCell<HashMap<String, VantageRecord>>>,
}

impl VantageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: Arc::new(OnceCell::new()),
        }
    }

    /// Looks up the average Vantage score for a ZIP, loading the dataset on
    /// first use. Returns `None` for ZIPs absent from the dataset.
    pub async fn lookup(&self, zip_code: &str) -> Result<Option<VantageRecord>, AppError> {
        let table = self
            .table
            .get_or_try_init(|| {
                let path = self.path.clone();
                async move {
                    tokio::task::spawn_blocking(move || load_table(&path))
                        .await
                        .map_err(|e| {
                            AppError::InternalError(format!("Vantage load task failed: {}", e))
                        })?
                }
            })
            .await?;

        Ok(table.get(zip_code).cloned())
    }
}

/// Reads the CSV into a lookup map.
///
/// Column positions are sniffed from the header row: the ZIP column is any
/// of `zip`/`zip_code`/`zipcode`, the score column is the first header
/// mentioning `vantage` or `score`, and `city`/`state` are optional. ZIP
/// values shorter than five digits are left-padded with zeros (spreadsheet
/// exports drop leading zeros). Rows with unparseable scores are skipped.
fn load_table(path: &Path) -> Result<HashMap<String, VantageRecord>, AppError> {
    tracing::info!("Loading Vantage Score data from: {}", path.display());

    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        AppError::InternalError(format!("Failed to open Vantage dataset: {}", e))
    })?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::InternalError(format!("Failed to read CSV header: {}", e)))?
        .clone();

    let mut zip_idx = None;
    let mut score_idx = None;
    let mut city_idx = None;
    let mut state_idx = None;

    for (i, header) in headers.iter().enumerate() {
        let header = header.trim().to_lowercase();
        match header.as_str() {
            "zip" | "zip_code" | "zipcode" => zip_idx = Some(i),
            "city" => city_idx = Some(i),
            "state" => state_idx = Some(i),
            _ if header.contains("vantage") || header.contains("score") => {
                if score_idx.is_none() {
                    score_idx = Some(i);
                }
            }
            _ => {}
        }
    }

    let (zip_idx, score_idx) = match (zip_idx, score_idx) {
        (Some(z), Some(s)) => (z, s),
        _ => {
            return Err(AppError::InternalError(
                "Could not find ZIP code or Vantage Score columns in dataset".to_string(),
            ))
        }
    };

    let mut table = HashMap::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping malformed CSV row: {}", e);
                continue;
            }
        };

        let zip_raw = match record.get(zip_idx) {
            Some(zip) if !zip.trim().is_empty() => zip.trim(),
            _ => continue,
        };
        let score = match record.get(score_idx).and_then(|s| s.trim().parse::<f64>().ok()) {
            Some(score) => score,
            None => continue,
        };

        let zip_code = format!("{:0>5}", zip_raw);
        let city = record
            .get(city_idx.unwrap_or(usize::MAX))
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("Unknown")
            .to_string();
        let state = record
            .get(state_idx.unwrap_or(usize::MAX))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Unknown")
            .to_string();

        table.insert(
            zip_code,
            VantageRecord {
                vantage_score: score,
                city,
                state,
            },
        );
    }

    tracing::info!("Loaded {} Vantage Score records", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn loads_and_looks_up_records() {
        let file = write_csv(
            "Zip,City,State,Avg Vantage Score\n10001,New York,NY,712.4\n501,Holtsville,NY,690\n",
        );
        let store = VantageStore::new(file.path());

        let record = store.lookup("10001").await.unwrap().unwrap();
        assert_eq!(record.vantage_score, 712.4);
        assert_eq!(record.city, "New York");

        // Leading zeros restored from spreadsheet-mangled ZIPs
        let padded = store.lookup("00501").await.unwrap().unwrap();
        assert_eq!(padded.vantage_score, 690.0);

        assert!(store.lookup("99999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skips_rows_with_bad_scores() {
        let file = write_csv("zip_code,score\n10001,n/a\n10002,705\n");
        let store = VantageStore::new(file.path());

        assert!(store.lookup("10001").await.unwrap().is_none());
        assert!(store.lookup("10002").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_columns_is_an_error() {
        let file = write_csv("a,b\n1,2\n");
        let store = VantageStore::new(file.path());
        assert!(store.lookup("10001").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_first_lookups_load_once() {
        let file = write_csv("zip,vantage\n10001,700\n");
        let store = VantageStore::new(file.path());

        let (a, b, c) = tokio::join!(
            store.lookup("10001"),
            store.lookup("10001"),
            store.lookup("10001"),
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert!(c.unwrap().is_some());
    }
}
