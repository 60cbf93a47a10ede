use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use url::Url;

use super::RecordStore;
use crate::config::Config;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::record::{parse_timestamp, PredictionRecord, RecordId};
use crate::reliability::circuit::CircuitBreaker;
use crate::reliability::retry::{
    is_retryable_http_error, is_retryable_network_error, retry_async_when, RetryConfig,
};

/// Non-2xx answer from the remote table.
#[derive(Debug)]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote store returned HTTP {}: {}", self.status, self.body)
    }
}

impl std::error::Error for HttpStatusError {}

fn should_retry(err: &anyhow::Error) -> bool {
    if let Some(status) = err.downcast_ref::<HttpStatusError>() {
        return is_retryable_http_error(status.status);
    }
    if let Some(net) = err.downcast_ref::<reqwest::Error>() {
        return is_retryable_network_error(net);
    }
    false
}

/// An insert may be committed before a 5xx or timeout comes back, so only
/// failures to connect (nothing was sent) are retried.
fn should_retry_insert(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .map_or(false, |net| net.is_connect())
}

#[derive(Serialize, Debug)]
struct NewRow<'a> {
    subject_label: &'a str,
    probability: f64,
    recorded_at: String,
    feedback: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct RemoteRow {
    id: i64,
    subject_label: String,
    probability: f64,
    recorded_at: String,
    #[serde(default)]
    feedback: Option<String>,
}

impl RemoteRow {
    fn into_record(self) -> Result<PredictionRecord> {
        let ts = parse_timestamp(&self.recorded_at)?;
        Ok(PredictionRecord::new(self.subject_label, self.probability, ts)
            .with_id(RecordId(self.id))
            .with_feedback(self.feedback))
    }
}

/// PostgREST-style table: `{base}/rest/v1/{table}`.
///
/// Offers no isolation; concurrent operators on one table interleave.
pub struct RemoteStore {
    client: Client,
    table_url: Url,
    api_key: Option<String>,
    retry: RetryConfig,
    circuit: Mutex<CircuitBreaker>,
}

impl RemoteStore {
    pub fn new(base: &str, table: &str, api_key: Option<String>, retry: RetryConfig, circuit_threshold: u32) -> Result<Self> {
        let mut base = Url::parse(base).map_err(|e| anyhow!("bad REMOTE_URL {:?}: {}", base, e))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let table_url = base.join(&format!("rest/v1/{}", table))?;
        Ok(Self {
            client: Client::new(),
            table_url,
            api_key,
            retry,
            circuit: Mutex::new(CircuitBreaker::new(circuit_threshold)),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base = cfg
            .remote_url
            .as_deref()
            .ok_or_else(|| anyhow!("REMOTE_URL not set"))?;
        Self::new(base, &cfg.remote_table, cfg.remote_api_key.clone(), cfg.retry(), cfg.circuit_threshold)
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    fn url_with(&self, query: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header("Prefer", "return=representation");
        if let Some(key) = &self.api_key {
            req = req
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }
        req
    }

    async fn checked(req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(HttpStatusError { status: status.as_u16(), body }.into())
    }

    /// Runs one logical call through the circuit breaker and retry policy.
    async fn call<T, F, Fut>(
        &self,
        operation: &str,
        should_retry: fn(&anyhow::Error) -> bool,
        f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        {
            let mut cb = self
                .circuit
                .lock()
                .map_err(|_| anyhow!("circuit lock poisoned"))?;
            if !cb.allow() {
                log(
                    Level::Error,
                    Domain::Store,
                    "circuit_open",
                    obj(&[("operation", v_str(operation)), ("failures", v_num(cb.failures as f64))]),
                );
                return Err(anyhow!("remote store unavailable (circuit open)"));
            }
        }

        let result = retry_async_when(&self.retry, operation, should_retry, f).await;

        if let Ok(mut cb) = self.circuit.lock() {
            match &result {
                Ok(_) => cb.record_success(),
                Err(_) => cb.record_failure(),
            }
        }
        result
    }

    async fn rows(&self, method: Method, url: Url, body: Option<serde_json::Value>, operation: &str) -> Result<Vec<RemoteRow>> {
        let retry_when: fn(&anyhow::Error) -> bool = if method == Method::POST {
            should_retry_insert
        } else {
            should_retry
        };
        self.call(operation, retry_when, || {
            let mut req = self.request(method.clone(), url.clone());
            if let Some(body) = &body {
                req = req.json(body);
            }
            async move {
                let resp = Self::checked(req).await?;
                let rows: Vec<RemoteRow> = resp.json().await?;
                Ok::<_, anyhow::Error>(rows)
            }
        })
        .await
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn append(&self, record: &PredictionRecord) -> Result<RecordId> {
        let body = serde_json::to_value(NewRow {
            subject_label: &record.subject_label,
            probability: record.probability(),
            recorded_at: record.recorded_at_rfc3339(),
            feedback: record.feedback.as_deref(),
        })?;
        let rows = self
            .rows(Method::POST, self.table_url.clone(), Some(body), "remote_append")
            .await?;
        rows.first()
            .map(|r| RecordId(r.id))
            .ok_or_else(|| anyhow!("remote store returned no row for insert"))
    }

    async fn list_all(&self) -> Result<Vec<PredictionRecord>> {
        let url = self.url_with(&[("select", "*"), ("order", "recorded_at.asc,id.asc")]);
        let rows = self.rows(Method::GET, url, None, "remote_list").await?;
        rows.into_iter().map(RemoteRow::into_record).collect()
    }

    async fn update_feedback(&self, id: RecordId, text: &str) -> Result<bool> {
        let filter = format!("eq.{}", id.0);
        let url = self.url_with(&[("id", filter.as_str())]);
        let body = serde_json::json!({ "feedback": text });
        let rows = self.rows(Method::PATCH, url, Some(body), "remote_feedback").await?;
        Ok(!rows.is_empty())
    }

    async fn clear_all(&self) -> Result<bool> {
        // PostgREST refuses an unfiltered DELETE
        let url = self.url_with(&[("id", "gte.0")]);
        self.rows(Method::DELETE, url, None, "remote_clear").await?;
        Ok(true)
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        let filter = format!("eq.{}", id.0);
        let url = self.url_with(&[("id", filter.as_str())]);
        let rows = self.rows(Method::DELETE, url, None, "remote_delete").await?;
        Ok(!rows.is_empty())
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> RemoteStore {
        RemoteStore::new(base, "predictions", None, RetryConfig::default(), 3).unwrap()
    }

    #[test]
    fn test_table_url_joins_with_and_without_slash() {
        assert_eq!(store("https://db.example.org").table_url().as_str(), "https://db.example.org/rest/v1/predictions");
        assert_eq!(store("https://db.example.org/proj/").table_url().as_str(), "https://db.example.org/proj/rest/v1/predictions");
        assert_eq!(store("https://db.example.org/proj").table_url().as_str(), "https://db.example.org/proj/rest/v1/predictions");
    }

    #[test]
    fn test_query_encoding() {
        let s = store("https://db.example.org");
        let url = s.url_with(&[("order", "recorded_at.asc,id.asc")]);
        assert_eq!(url.query(), Some("order=recorded_at.asc%2Cid.asc"));
    }

    #[test]
    fn test_status_retry_classification() {
        let e: anyhow::Error = HttpStatusError { status: 503, body: String::new() }.into();
        assert!(should_retry(&e));
        let e: anyhow::Error = HttpStatusError { status: 401, body: String::new() }.into();
        assert!(!should_retry(&e));
        assert!(!should_retry(&anyhow!("bad json")));
    }

    #[test]
    fn test_insert_never_retried_on_status() {
        let e: anyhow::Error = HttpStatusError { status: 503, body: String::new() }.into();
        assert!(!should_retry_insert(&e));
        assert!(!should_retry_insert(&anyhow!("timed out")));
    }

    #[test]
    fn test_row_into_record() {
        let row: RemoteRow = serde_json::from_value(serde_json::json!({
            "id": 12,
            "subject_label": "Ana",
            "probability": 0.66,
            "recorded_at": "2024-05-02T08:30:00",
            "feedback": null
        }))
        .unwrap();
        let rec = row.into_record().unwrap();
        assert_eq!(rec.id, Some(RecordId(12)));
        assert_eq!(rec.recorded_at_text(), "2024-05-02 08:30:00");
        assert!(rec.is_positive());
    }
}
