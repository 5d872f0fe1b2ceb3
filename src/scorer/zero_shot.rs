//! Hosted zero-shot classification endpoint.
//!
//! Speaks the Hugging Face Inference API shape for the
//! `zero-shot-classification` task:
//!
//! ```text
//! POST {base_url}/models/{model}
//! {"inputs": [...], "parameters": {"candidate_labels": [...], "multi_label": true,
//!  "hypothesis_template": "This paper is about {}."}}
//! ```
//!
//! The response holds one `{sequence, labels, scores}` object per input (a
//! bare object when a single input was sent). Newer deployments answer with
//! `[{label, score}, ...]` lists instead; both are accepted.

use super::{rank, LabelScore, Scorer};
use crate::error::{PubcatError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default inference API base URL
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// CPU-friendly multi-label NLI model
pub const DEFAULT_MODEL: &str = "MoritzLaurer/deberta-v3-base-zeroshot-v1";

/// Request timeout in seconds; model cold starts are slow
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotOutput {
    Many(Vec<ZeroShotItem>),
    One(ZeroShotItem),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotItem {
    Columns { labels: Vec<String>, scores: Vec<f64> },
    Pairs(Vec<LabelScore>),
}

impl ZeroShotItem {
    fn into_scores(self) -> Result<Vec<LabelScore>> {
        match self {
            ZeroShotItem::Columns { labels, scores } => {
                if labels.len() != scores.len() {
                    return Err(PubcatError::Parse(format!(
                        "zero-shot response has {} labels but {} scores",
                        labels.len(),
                        scores.len()
                    )));
                }
                Ok(rank(labels.into_iter().zip(scores).map(|(l, s)| LabelScore::new(l, s)).collect()))
            }
            ZeroShotItem::Pairs(pairs) => Ok(rank(pairs)),
        }
    }
}

/// Client for a zero-shot inference endpoint.
pub struct ZeroShotClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ZeroShotClient {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PubcatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            max_retries: 4,
            retry_backoff: Duration::from_secs(2),
        })
    }

    /// Attempts per batch while the endpoint is rate limited or loading the
    /// model, and the first wait between them
    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_backoff = backoff;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    /// One request, without retry. 429 and 503 map to `RateLimited`.
    async fn request(&self, body: &serde_json::Value) -> Result<Vec<Vec<LabelScore>>> {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if matches!(status.as_u16(), 429 | 503) {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0);
            return Err(PubcatError::RateLimited(retry_after));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), error = %error_text, "Zero-shot API error");
            return Err(PubcatError::Api {
                code: status.as_u16() as i32,
                message: format!("Zero-shot API error: {} - {}", status, error_text),
            });
        }

        let text = response.text().await?;
        parse_response(&text)
    }
}

#[async_trait]
impl Scorer for ZeroShotClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn score(
        &self,
        texts: &[String],
        labels: &[String],
        hypothesis_template: &str,
    ) -> Result<Vec<Vec<LabelScore>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "inputs": texts,
            "parameters": {
                "candidate_labels": labels,
                "multi_label": true,
                "hypothesis_template": hypothesis_template
            },
            "options": {"wait_for_model": true}
        });

        debug!(url = %self.endpoint(), count = texts.len(), "Sending zero-shot request");

        let mut backoff = self.retry_backoff;
        let mut last_wait = 0;
        for attempt in 0..self.max_retries {
            match self.request(&body).await {
                Err(PubcatError::RateLimited(secs)) => {
                    last_wait = secs;
                    if attempt + 1 == self.max_retries {
                        break;
                    }
                    let wait = Duration::from_secs(secs).max(backoff);
                    warn!(
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        "Zero-shot endpoint busy, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }

        Err(PubcatError::RateLimited(last_wait))
    }
}

/// Decode a zero-shot response body into per-input ranked scores.
fn parse_response(body: &str) -> Result<Vec<Vec<LabelScore>>> {
    let output: ZeroShotOutput = serde_json::from_str(body)
        .map_err(|e| PubcatError::Parse(format!("Failed to parse zero-shot response: {}", e)))?;

    match output {
        ZeroShotOutput::Many(items) => items.into_iter().map(ZeroShotItem::into_scores).collect(),
        ZeroShotOutput::One(item) => Ok(vec![item.into_scores()?]),
    }
}
