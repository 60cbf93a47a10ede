use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{validate_probability, Classifier, Tensor};
use crate::logging::{log, obj, v_str, Domain, Level, ProfileScope};

/// Model served over the TensorFlow-Serving REST API.
pub struct HttpClassifier {
    client: Client,
    base: String,
    model: String,
}

#[derive(Deserialize, Debug)]
struct PredictResponse {
    #[serde(default)]
    predictions: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ModelStatus {
    #[serde(default)]
    model_version_status: Vec<VersionStatus>,
}

#[derive(Deserialize, Debug)]
struct VersionStatus {
    state: String,
}

impl HttpClassifier {
    pub fn new(base: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn model_url(&self) -> String {
        format!("{}/v1/models/{}", self.base, self.model)
    }
}

/// Pulls the single scalar out of `[[p]]`, `[p]` or `p`.
fn extract_scalar(predictions: &Value) -> Result<f64> {
    let mut cur = predictions;
    loop {
        match cur {
            Value::Number(n) => return n.as_f64().ok_or_else(|| anyhow!("prediction is not a float")),
            Value::Array(items) if items.len() == 1 => cur = &items[0],
            Value::Array(items) => return Err(anyhow!("expected one prediction, got {}", items.len())),
            other => return Err(anyhow!("unexpected prediction payload: {}", other)),
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn health_check(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.model_url())
            .send()
            .await
            .map_err(|e| anyhow!("model server unreachable at {}: {}", self.base, e))?;
        if !resp.status().is_success() {
            return Err(anyhow!("model {:?} not loaded: HTTP {}", self.model, resp.status()));
        }
        let status: ModelStatus = resp.json().await?;
        let available = status
            .model_version_status
            .iter()
            .any(|v| v.state.eq_ignore_ascii_case("AVAILABLE"));
        if !available {
            return Err(anyhow!("model {:?} has no available version", self.model));
        }
        log(
            Level::Info,
            Domain::Classifier,
            "model_ready",
            obj(&[("model", v_str(&self.model)), ("base", v_str(&self.base))]),
        );
        Ok(())
    }

    async fn classify(&self, tensor: &Tensor) -> Result<f64> {
        let _scope = ProfileScope::with_context("classify", &[("model", v_str(&self.model))]);
        let instance = tensor.instance_json(0)?;
        let body = json!({ "instances": [instance] });
        let resp = self
            .client
            .post(format!("{}:predict", self.model_url()))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let parsed: PredictResponse = resp.json().await?;
        if let Some(err) = parsed.error {
            return Err(anyhow!("model server error (HTTP {}): {}", status, err));
        }
        if !status.is_success() {
            return Err(anyhow!("model server returned HTTP {}", status));
        }
        let predictions = parsed
            .predictions
            .ok_or_else(|| anyhow!("response has no predictions"))?;
        validate_probability(extract_scalar(&predictions)?)
    }
}
