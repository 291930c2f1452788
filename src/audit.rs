use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Log types exposed through `/logs/:log_type`.
pub const VALID_LOG_TYPES: [&str; 7] = [
    "api_requests",
    "electricity_data_data",
    "demographic_data_data",
    "electricity_data_extra_data",
    "demographic_data_extra_data",
    "data_sources",
    "errors",
];

/// Append-only JSONL audit sink.
///
/// Writes are fire-and-forget: they run on the blocking pool and any I/O
/// failure is logged and discarded, never surfaced to the caller. Audit
/// failures must not affect qualification results.
#[derive(Clone)]
pub struct AuditSink {
    logs_dir: PathBuf,
}

impl AuditSink {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        let logs_dir = logs_dir.into();
        if let Err(e) = std::fs::create_dir_all(&logs_dir) {
            tracing::warn!("Could not create logs directory: {}", e);
        }
        Self { logs_dir }
    }

    /// Records an API request/response pair to the main log and the
    /// endpoint-specific log; `extra` lands in a third file when present.
    pub fn record_request(
        &self,
        endpoint: &str,
        zip_code: &str,
        response_data: Value,
        extra_data: Option<Value>,
    ) {
        let timestamp = Utc::now().to_rfc3339();
        let entry = json!({
            "timestamp": timestamp,
            "endpoint": endpoint,
            "zip_code": zip_code,
            "response_data": response_data,
            "extra_data": extra_data.clone().unwrap_or_else(|| json!({})),
        });

        let endpoint_name = endpoint.replace('/', "_").replace('-', "_");

        self.append("api_requests.jsonl", entry.clone());
        self.append(&format!("{}_data.jsonl", endpoint_name), entry);

        if let Some(extra) = extra_data {
            self.append(
                &format!("{}_extra_data.jsonl", endpoint_name),
                json!({
                    "timestamp": timestamp,
                    "zip_code": zip_code,
                    "extra_data": extra,
                }),
            );
        }
    }

    /// Records which provider produced data for a ZIP and what it returned.
    pub fn record_data_source(&self, zip_code: &str, source: &str, raw: Value, processed: Value) {
        self.append(
            "data_sources.jsonl",
            json!({
                "timestamp": Utc::now().to_rfc3339(),
                "zip_code": zip_code,
                "data_source": source,
                "raw_data": raw,
                "processed_data": processed,
            }),
        );
    }

    /// Records an error outcome.
    pub fn record_error(&self, endpoint: &str, zip_code: &str, error: &str, details: Option<Value>) {
        self.append(
            "errors.jsonl",
            json!({
                "timestamp": Utc::now().to_rfc3339(),
                "endpoint": endpoint,
                "zip_code": zip_code,
                "error": error,
                "error_details": details.unwrap_or_else(|| json!({})),
            }),
        );
    }

    /// Records an AI narration call with its input context and result.
    pub fn record_ai(&self, zip_code: &str, input_data: Value, result: Value) {
        self.append(
            "gemini_calculations.jsonl",
            json!({
                "timestamp": Utc::now().to_rfc3339(),
                "zip_code": zip_code,
                "ai_model": "gemini-1.5-flash",
                "input_data": input_data,
                "ai_result": result,
            }),
        );
    }

    fn append(&self, file_name: &str, entry: Value) {
        let path = self.logs_dir.join(file_name);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = append_line(&path, &entry) {
                tracing::warn!("Audit write to {} failed: {}", path.display(), e);
            }
        });
    }

    /// Reads a log file for `/logs/:log_type`, returning the most recent
    /// 100 entries and the total count. Unparseable lines are skipped.
    pub async fn read_log(&self, log_type: &str) -> (Vec<Value>, usize) {
        let path = self.logs_dir.join(format!("{}.jsonl", log_type));
        let entries = read_jsonl(&path).await;
        let total = entries.len();
        let tail = entries
            .into_iter()
            .skip(total.saturating_sub(100))
            .collect();
        (tail, total)
    }

    /// Aggregates the request log into the `/logs/summary` payload.
    pub async fn summary(&self) -> Value {
        let api_logs = read_jsonl(&self.logs_dir.join("api_requests.jsonl")).await;
        let error_count = read_jsonl(&self.logs_dir.join("errors.jsonl")).await.len();

        let mut unique_zip_codes = std::collections::HashSet::new();
        let mut endpoints_used: HashMap<String, u64> = HashMap::new();
        let mut data_sources_used: HashMap<String, u64> = HashMap::new();
        let mut recent_requests = Vec::new();

        for entry in &api_logs {
            if let Some(zip) = entry.get("zip_code").and_then(|z| z.as_str()) {
                unique_zip_codes.insert(zip.to_string());
            }
            if let Some(endpoint) = entry.get("endpoint").and_then(|e| e.as_str()) {
                *endpoints_used.entry(endpoint.to_string()).or_default() += 1;
            }
            if let Some(source) = entry
                .pointer("/response_data/data_source")
                .and_then(|s| s.as_str())
            {
                *data_sources_used.entry(source.to_string()).or_default() += 1;
            }
            if recent_requests.len() < 10 {
                recent_requests.push(json!({
                    "timestamp": entry.get("timestamp"),
                    "endpoint": entry.get("endpoint"),
                    "zip_code": entry.get("zip_code"),
                }));
            }
        }

        json!({
            "total_requests": api_logs.len(),
            "unique_zip_codes": unique_zip_codes.len(),
            "endpoints_used": endpoints_used,
            "data_sources_used": data_sources_used,
            "errors_count": error_count,
            "recent_requests": recent_requests,
        })
    }
}

fn append_line(path: &Path, entry: &Value) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", entry)
}

async fn read_jsonl(path: &Path) -> Vec<Value> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        // Missing file just means nothing has been logged yet
        Err(_) => return Vec::new(),
    };

    contents
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AuditSink::new(dir.path());

        sink.record_request(
            "electricity-data",
            "10001",
            json!({"data_source": "EIA"}),
            Some(json!({"note": "test"})),
        );
        sink.record_error("electricity-data", "99999", "No data available", None);

        // Writes are fire-and-forget on the blocking pool
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;

        let (requests, total) = sink.read_log("api_requests").await;
        assert_eq!(total, 1);
        assert_eq!(requests[0]["zip_code"], "10001");

        let (errors, _) = sink.read_log("errors").await;
        assert_eq!(errors[0]["error"], "No data available");

        let summary = sink.summary().await;
        assert_eq!(summary["total_requests"], 1);
        assert_eq!(summary["errors_count"], 1);
        assert_eq!(summary["unique_zip_codes"], 1);
        assert_eq!(summary["data_sources_used"]["EIA"], 1);
    }

    #[tokio::test]
    async fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AuditSink::new(dir.path());

        let (entries, total) = sink.read_log("data_sources").await;
        assert!(entries.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn endpoint_log_types_are_allowlisted() {
        assert!(VALID_LOG_TYPES.contains(&"api_requests"));
        assert!(!VALID_LOG_TYPES.contains(&"../etc/passwd"));
    }
}
