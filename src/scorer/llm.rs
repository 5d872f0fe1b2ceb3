//! Chat-model scorer.
//!
//! Uses an OpenAI-compatible chat completion API as the zero-shot scorer:
//! one request per text, asking for an independent probability per
//! candidate label. Requests within a batch run concurrently; batches are
//! sequenced by the caller.

use super::{rank, LabelScore, Scorer};
use crate::error::{OptionExt, PubcatError, Result};
use crate::prompts::zero_shot::{build_user_prompt, SYSTEM_PROMPT};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Token usage tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Accumulated token usage with atomic counters
#[derive(Default)]
struct AtomicTokenUsage {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
}

impl AtomicTokenUsage {
    fn add(&self, usage: &TokenUsage) {
        self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(usage.total_tokens, Ordering::Relaxed);
    }

    fn get(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// Chat-completion backed [`Scorer`].
pub struct LlmScorer {
    client: reqwest::Client,
    config: LlmConfig,
    usage: AtomicTokenUsage,
}

impl LlmScorer {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PubcatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            usage: AtomicTokenUsage::default(),
        })
    }

    /// Tokens consumed so far.
    pub fn usage(&self) -> TokenUsage {
        self.usage.get()
    }

    async fn score_one(&self, text: &str, labels: &[String], hypothesis_template: &str) -> Result<Vec<LabelScore>> {
        let user_prompt = build_user_prompt(labels, hypothesis_template, text);

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.0,
            "max_tokens": 2000
        });

        let api_url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(PubcatError::Network)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PubcatError::Api {
                code: status.as_u16() as i32,
                message: format!("LLM API error: {} - {}", status, error_text),
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PubcatError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(u) = &api_response.usage {
            self.usage.add(&TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });
        }

        let content = api_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_parse("LLM response has no choices")?;

        parse_llm_scores(content, labels)
    }
}

#[async_trait]
impl Scorer for LlmScorer {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn score(
        &self,
        texts: &[String],
        labels: &[String],
        hypothesis_template: &str,
    ) -> Result<Vec<Vec<LabelScore>>> {
        debug!(count = texts.len(), model = %self.config.model, "Sending LLM scoring requests");

        let results = try_join_all(
            texts
                .iter()
                .map(|text| self.score_one(text, labels, hypothesis_template)),
        )
        .await?;

        let usage = self.usage.get();
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "LLM batch scored"
        );
        Ok(results)
    }
}

/// Parse `{"scores": {label: p}}` from a model reply.
///
/// Every candidate label gets a score; labels the model left out score 0.
fn parse_llm_scores(content: &str, labels: &[String]) -> Result<Vec<LabelScore>> {
    #[derive(Deserialize)]
    struct LlmOutput {
        scores: HashMap<String, f64>,
    }

    let json_str = extract_json(content);
    let output: LlmOutput = serde_json::from_str(&json_str).map_err(|e| {
        let preview: String = content.chars().take(200).collect();
        PubcatError::Parse(format!("LLM output parse failed: {} (content: {})", e, preview))
    })?;

    let by_label: HashMap<String, f64> = output
        .scores
        .into_iter()
        .map(|(label, score)| (label.trim().to_lowercase(), score))
        .collect();

    Ok(rank(
        labels
            .iter()
            .map(|label| {
                let score = by_label.get(&label.to_lowercase()).copied().unwrap_or(0.0);
                LabelScore::new(label.clone(), score.clamp(0.0, 1.0))
            })
            .collect(),
    ))
}

/// Extract JSON from LLM response (handles markdown code blocks)
fn extract_json(content: &str) -> String {
    let trimmed = content.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() >= 2 {
            let start = if lines[0].starts_with("```") { 1 } else { 0 };
            let end = if lines.last().map(|l| l.trim()) == Some("```") {
                lines.len() - 1
            } else {
                lines.len()
            };
            return lines[start..end].join("\n");
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}
