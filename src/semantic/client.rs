//! Chat-completions adapter producing structured document insights.

use super::SemanticPort;
use super::prompt::build_request;
use super::types::{Insight, SemanticError};
use crate::config::Config;
use crate::retry::RetryPolicy;
use crate::text::truncate_chars;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const API_KEY_HEADER: &str = "api-key";

/// Settings required to construct an [`OpenAiSemanticClient`].
#[derive(Debug, Clone)]
pub struct SemanticSettings {
    /// Service base URL.
    pub endpoint: String,
    /// API key.
    pub api_key: String,
    /// Deployment (model) name.
    pub deployment: String,
    /// API version query parameter.
    pub api_version: String,
    /// Character budget applied before submission.
    pub input_char_limit: usize,
    /// Timeout applied to each HTTP call.
    pub request_timeout: Duration,
    /// Retry budget for transient failures.
    pub retry: RetryPolicy,
}

impl SemanticSettings {
    /// Derive semantic settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.openai_endpoint.clone(),
            api_key: config.openai_key.clone(),
            deployment: config.openai_deployment.clone(),
            api_version: config.openai_api_version.clone(),
            input_char_limit: config.semantic_input_char_limit,
            request_timeout: config.request_timeout(),
            retry: config.retry_policy(),
        }
    }
}

/// Semantic analysis through a deployment-scoped chat-completions endpoint.
pub struct OpenAiSemanticClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) deployment: String,
    pub(crate) api_version: String,
    pub(crate) input_char_limit: usize,
    pub(crate) retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiSemanticClient {
    /// Build a client, failing fast when endpoint, key, or deployment are unusable.
    pub fn new(settings: SemanticSettings) -> Result<Self, SemanticError> {
        if settings.api_key.trim().is_empty() {
            return Err(SemanticError::Configuration("missing API key".into()));
        }
        if settings.deployment.trim().is_empty() {
            return Err(SemanticError::Configuration("missing deployment name".into()));
        }
        reqwest::Url::parse(&settings.endpoint)
            .map_err(|error| SemanticError::Configuration(error.to_string()))?;

        let http = Client::builder()
            .user_agent("docsift/semantic")
            .timeout(settings.request_timeout)
            .build()?;

        tracing::debug!(
            url = %settings.endpoint,
            deployment = %settings.deployment,
            api_version = %settings.api_version,
            "Initialized semantic analysis client"
        );

        Ok(Self {
            http,
            base_url: settings.endpoint,
            api_key: settings.api_key,
            deployment: settings.deployment,
            api_version: settings.api_version,
            input_char_limit: settings.input_char_limit,
            retry: settings.retry,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.base_url.trim_end_matches('/'),
            self.deployment
        )
    }

    async fn complete_once(&self, text: &str) -> Result<Insight, SemanticError> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("api-version", self.api_version.as_str())])
            .header(API_KEY_HEADER, &self.api_key)
            .json(&build_request(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SemanticError::UnexpectedStatus { status, body });
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            SemanticError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(SemanticError::EmptyResponse)?;

        parse_insight(&content)
    }
}

#[async_trait]
impl SemanticPort for OpenAiSemanticClient {
    async fn summarize(&self, text: &str) -> Result<Insight, SemanticError> {
        let bounded = truncate_chars(text, self.input_char_limit);
        tracing::debug!(
            chars = bounded.chars().count(),
            deployment = %self.deployment,
            "Requesting semantic analysis"
        );
        self.retry
            .run("semantic", || self.complete_once(bounded))
            .await
    }
}

/// Parse model output into an [`Insight`], enforcing the four-key contract.
pub(crate) fn parse_insight(content: &str) -> Result<Insight, SemanticError> {
    let mut insight: Insight = serde_json::from_str(content.trim())
        .map_err(|error| SemanticError::InvalidResponse(error.to_string()))?;
    insight.key_entities = dedupe_entities(insight.key_entities);
    Ok(insight)
}

fn dedupe_entities(entities: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|entity| seen.insert(entity.clone()))
        .collect()
}
