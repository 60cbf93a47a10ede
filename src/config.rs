use anyhow::{anyhow, Result};

use crate::drift_tracker::DEFAULT_WINDOW;
use crate::reliability::retry::RetryConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Session,
    Sqlite,
    Remote,
}

impl StoreBackend {
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_lowercase().as_str() {
            "session" | "memory" => Ok(StoreBackend::Session),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "remote" => Ok(StoreBackend::Remote),
            other => Err(anyhow!("unknown STORE_BACKEND {:?}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub sqlite_path: String,
    pub remote_url: Option<String>,
    pub remote_table: String,
    pub remote_api_key: Option<String>,
    pub classifier_url: String,
    pub model_name: String,
    pub admin_password_hash: Option<String>,
    pub admin_salt: Option<String>,
    pub drift_window: usize,
    pub retry_max: u32,
    pub retry_base_ms: u64,
    pub circuit_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Session,
            sqlite_path: "./spiralscreen.sqlite".to_string(),
            remote_url: None,
            remote_table: "predictions".to_string(),
            remote_api_key: None,
            classifier_url: "http://localhost:8501".to_string(),
            model_name: "spiral".to_string(),
            admin_password_hash: None,
            admin_salt: None,
            drift_window: DEFAULT_WINDOW,
            retry_max: 3,
            retry_base_ms: 100,
            circuit_threshold: 5,
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let store_backend = match non_empty("STORE_BACKEND") {
            Some(v) => StoreBackend::parse(&v)?,
            None => d.store_backend,
        };
        let cfg = Self {
            store_backend,
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or(d.sqlite_path),
            remote_url: non_empty("REMOTE_URL"),
            remote_table: std::env::var("REMOTE_TABLE").unwrap_or(d.remote_table),
            remote_api_key: non_empty("REMOTE_API_KEY"),
            classifier_url: std::env::var("CLASSIFIER_URL").unwrap_or(d.classifier_url),
            model_name: std::env::var("MODEL_NAME").unwrap_or(d.model_name),
            admin_password_hash: non_empty("ADMIN_PASSWORD_HASH"),
            admin_salt: non_empty("ADMIN_SALT"),
            drift_window: std::env::var("DRIFT_WINDOW").ok().and_then(|v| v.parse().ok()).unwrap_or(d.drift_window),
            retry_max: std::env::var("RETRY_MAX").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_max),
            retry_base_ms: std::env::var("RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_base_ms),
            circuit_threshold: std::env::var("CIRCUIT_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(d.circuit_threshold),
        };
        if cfg.store_backend == StoreBackend::Remote && cfg.remote_url.is_none() {
            return Err(anyhow!("STORE_BACKEND=remote requires REMOTE_URL"));
        }
        Ok(cfg)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_max,
            base_delay_ms: self.retry_base_ms,
            ..RetryConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(StoreBackend::parse("SQLite").unwrap(), StoreBackend::Sqlite);
        assert_eq!(StoreBackend::parse("memory").unwrap(), StoreBackend::Session);
        assert!(StoreBackend::parse("redis").is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.drift_window, 3);
        assert_eq!(cfg.retry().max_retries, 3);
        assert!(cfg.admin_password_hash.is_none());
    }
}
