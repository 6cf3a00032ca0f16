//! HTTP client for the layout-analysis (document intelligence) service.

use super::ExtractionPort;
use super::mapping::map_analyze_result;
use super::types::{ExtractionError, ExtractionResult};
use crate::config::Config;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// Settings required to construct a [`DocumentIntelligenceClient`].
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    /// Service base URL.
    pub endpoint: String,
    /// Subscription key.
    pub api_key: String,
    /// Analysis model identifier.
    pub model_id: String,
    /// API version query parameter.
    pub api_version: String,
    /// Timeout applied to each HTTP call.
    pub request_timeout: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Total time allowed for one analysis.
    pub max_wait: Duration,
    /// Retry budget for transient failures.
    pub retry: RetryPolicy,
}

impl ExtractionSettings {
    /// Derive extraction settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.di_endpoint.clone(),
            api_key: config.di_key.clone(),
            model_id: config.di_model_id.clone(),
            api_version: config.di_api_version.clone(),
            request_timeout: config.request_timeout(),
            poll_interval: Duration::from_millis(config.extraction_poll_interval_ms),
            max_wait: Duration::from_secs(config.extraction_max_wait_secs),
            retry: config.retry_policy(),
        }
    }
}

/// Layout extraction backed by the document intelligence REST API.
///
/// Submission returns `202 Accepted` with an `Operation-Location` header; the client polls that
/// location until the analysis succeeds, fails, or exceeds `max_wait`. Submission and each poll
/// are retried separately for transient failures; a failed or timed-out analysis is returned
/// without resubmitting.
pub struct DocumentIntelligenceClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model_id: String,
    pub(crate) api_version: String,
    pub(crate) poll_interval: Duration,
    pub(crate) max_wait: Duration,
    pub(crate) retry: RetryPolicy,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<Value>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl DocumentIntelligenceClient {
    /// Build a client, validating the endpoint and credentials up front.
    pub fn new(settings: ExtractionSettings) -> Result<Self, ExtractionError> {
        if settings.api_key.trim().is_empty() {
            return Err(ExtractionError::Configuration(
                "missing document intelligence key".into(),
            ));
        }
        let base_url =
            normalize_base_url(&settings.endpoint).map_err(ExtractionError::Configuration)?;
        let http = Client::builder()
            .user_agent("docsift/extraction")
            .timeout(settings.request_timeout)
            .build()?;

        tracing::debug!(
            url = %base_url,
            model = %settings.model_id,
            api_version = %settings.api_version,
            "Initialized document intelligence client"
        );

        Ok(Self {
            http,
            base_url,
            api_key: settings.api_key,
            model_id: settings.model_id,
            api_version: settings.api_version,
            poll_interval: settings.poll_interval,
            max_wait: settings.max_wait,
            retry: settings.retry,
        })
    }

    fn analyze_endpoint(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze",
            self.base_url.trim_end_matches('/'),
            self.model_id
        )
    }

    /// Poll `operation_url` until the analysis reaches a terminal status or `max_wait` elapses.
    ///
    /// Transient failures of a single poll are retried against the same operation, so an
    /// accepted document is never uploaded twice.
    async fn wait_for_result(&self, operation_url: &str) -> Result<ExtractionResult, ExtractionError> {
        let deadline = Instant::now() + self.max_wait;

        loop {
            if Instant::now() >= deadline {
                return Err(ExtractionError::Timeout(self.max_wait));
            }
            tokio::time::sleep(self.poll_interval).await;

            let operation = self
                .retry
                .run("extraction poll", || self.poll_status(operation_url))
                .await?;

            match operation.status.to_ascii_lowercase().as_str() {
                "succeeded" => {
                    let raw = operation.analyze_result.ok_or_else(|| {
                        ExtractionError::InvalidResponse(
                            "analysis succeeded without an analyzeResult".into(),
                        )
                    })?;
                    return map_analyze_result(raw);
                }
                "failed" | "canceled" => {
                    let error = operation.error.unwrap_or(ServiceError {
                        code: operation.status.clone(),
                        message: String::new(),
                    });
                    return Err(ExtractionError::AnalysisFailed {
                        code: error.code,
                        message: error.message,
                    });
                }
                status => {
                    tracing::trace!(status, "Layout analysis still running");
                }
            }
        }
    }

    async fn poll_status(&self, operation_url: &str) -> Result<AnalyzeOperation, ExtractionError> {
        let response = self
            .http
            .get(operation_url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(|error| {
            ExtractionError::InvalidResponse(format!("failed to decode analysis status: {error}"))
        })
    }

    async fn submit(&self, document: Bytes, content_type: &str) -> Result<String, ExtractionError> {
        let response = self
            .http
            .post(self.analyze_endpoint())
            .query(&[("api-version", self.api_version.as_str())])
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, content_type)
            .body(document)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        operation_location(response.headers())
    }
}

#[async_trait]
impl ExtractionPort for DocumentIntelligenceClient {
    async fn extract(
        &self,
        document: Bytes,
        content_type: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        tracing::debug!(
            bytes = document.len(),
            content_type,
            model = %self.model_id,
            "Submitting document for layout analysis"
        );
        let operation_url = self
            .retry
            .run("extraction submit", || self.submit(document.clone(), content_type))
            .await?;
        self.wait_for_result(&operation_url).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ExtractionError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = ExtractionError::UnexpectedStatus { status, body };
    tracing::error!(error = %error, "Document intelligence request failed");
    Err(error)
}

fn operation_location(headers: &HeaderMap) -> Result<String, ExtractionError> {
    headers
        .get(OPERATION_LOCATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            ExtractionError::InvalidResponse("analysis accepted without Operation-Location".into())
        })
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Transient;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use serde_json::json;

    fn client_for(server: &MockServer, retry: RetryPolicy) -> DocumentIntelligenceClient {
        DocumentIntelligenceClient {
            http: Client::builder()
                .user_agent("docsift-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "secret".into(),
            model_id: "prebuilt-layout".into(),
            api_version: "2024-11-30".into(),
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_secs(5),
            retry,
        }
    }

    #[tokio::test]
    async fn submits_and_polls_until_succeeded() {
        let server = MockServer::start_async().await;
        let operation_url = format!("{}/operations/op-1", server.base_url());

        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze")
                    .query_param("api-version", "2024-11-30")
                    .header("ocp-apim-subscription-key", "secret")
                    .header("content-type", "application/pdf")
                    .body("%PDF-1.7");
                then.status(202)
                    .header("Operation-Location", operation_url.as_str());
            })
            .await;

        let poll = server
            .mock_async(|when, then| {
                when.method(GET).path("/operations/op-1");
                then.status(200).json_body(json!({
                    "status": "succeeded",
                    "analyzeResult": {
                        "pages": [{ "pageNumber": 1 }],
                        "paragraphs": [{ "content": "Hello" }, { "content": "World" }]
                    }
                }));
            })
            .await;

        let client = client_for(&server, RetryPolicy::none());
        let result = client
            .extract(Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .expect("extraction");

        submit.assert_async().await;
        poll.assert_async().await;
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.paragraphs[1].content, "World");
        assert_eq!(result.raw["paragraphs"][0]["content"], "Hello");
    }

    #[tokio::test]
    async fn failed_analysis_is_permanent() {
        let server = MockServer::start_async().await;
        let operation_url = format!("{}/operations/op-2", server.base_url());

        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze");
                then.status(202)
                    .header("Operation-Location", operation_url.as_str());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/operations/op-2");
                then.status(200).json_body(json!({
                    "status": "failed",
                    "error": { "code": "InvalidContent", "message": "The file is corrupted." }
                }));
            })
            .await;

        let client = client_for(&server, RetryPolicy::new(3, Duration::ZERO));
        let error = client
            .extract(Bytes::from_static(b"junk"), "application/octet-stream")
            .await
            .expect_err("analysis failure");

        assert!(
            matches!(&error, ExtractionError::AnalysisFailed { code, .. } if code == "InvalidContent")
        );
        assert!(!error.is_transient());
        submit.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surfaced() {
        let server = MockServer::start_async().await;
        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze");
                then.status(503).body("busy");
            })
            .await;

        let client = client_for(&server, RetryPolicy::new(3, Duration::ZERO));
        let error = client
            .extract(Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .expect_err("exhausted retries");

        submit.assert_hits_async(3).await;
        assert!(error.is_transient());
        assert!(error.to_string().contains("503"));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze");
                then.status(415).body("unsupported");
            })
            .await;

        let client = client_for(&server, RetryPolicy::new(3, Duration::ZERO));
        let error = client
            .extract(Bytes::from_static(b"??"), "application/octet-stream")
            .await
            .expect_err("unsupported media");

        submit.assert_hits_async(1).await;
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn missing_operation_location_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze");
                then.status(202);
            })
            .await;

        let client = client_for(&server, RetryPolicy::none());
        let error = client
            .extract(Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .expect_err("no operation");
        assert!(matches!(error, ExtractionError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn polling_is_bounded_by_max_wait() {
        let server = MockServer::start_async().await;
        let operation_url = format!("{}/operations/op-3", server.base_url());
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze");
                then.status(202)
                    .header("Operation-Location", operation_url.as_str());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/operations/op-3");
                then.status(200).json_body(json!({ "status": "running" }));
            })
            .await;

        let mut client = client_for(&server, RetryPolicy::none());
        client.max_wait = Duration::from_millis(20);
        client.poll_interval = Duration::from_millis(5);

        let error = client
            .extract(Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .expect_err("timeout");
        assert!(matches!(error, ExtractionError::Timeout(_)));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn transient_poll_failure_retries_same_operation() {
        let server = MockServer::start_async().await;
        let operation_url = format!("{}/operations/op-4", server.base_url());
        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze");
                then.status(202)
                    .header("Operation-Location", operation_url.as_str());
            })
            .await;
        let mut busy_poll = server
            .mock_async(|when, then| {
                when.method(GET).path("/operations/op-4");
                then.status(503).body("busy");
            })
            .await;

        let client = client_for(&server, RetryPolicy::new(3, Duration::from_millis(200)));
        let extraction = client.extract(Bytes::from_static(b"%PDF-1.7"), "application/pdf");
        let recover = async {
            while busy_poll.hits_async().await == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            busy_poll.delete_async().await;
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/operations/op-4");
                    then.status(200).json_body(json!({
                        "status": "succeeded",
                        "analyzeResult": { "paragraphs": [{ "content": "Recovered" }] }
                    }));
                })
                .await
        };
        let (result, ready_poll) = tokio::join!(extraction, recover);

        let result = result.expect("poll retry recovers");
        assert_eq!(result.paragraphs[0].content, "Recovered");
        submit.assert_hits_async(1).await;
        ready_poll.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn exhausted_poll_retries_do_not_resubmit() {
        let server = MockServer::start_async().await;
        let operation_url = format!("{}/operations/op-5", server.base_url());
        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/documentintelligence/documentModels/prebuilt-layout:analyze");
                then.status(202)
                    .header("Operation-Location", operation_url.as_str());
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET).path("/operations/op-5");
                then.status(503).body("busy");
            })
            .await;

        let client = client_for(&server, RetryPolicy::new(3, Duration::ZERO));
        let error = client
            .extract(Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .expect_err("poll budget exhausted");

        assert!(error.is_transient());
        submit.assert_hits_async(1).await;
        poll.assert_hits_async(3).await;
    }

    #[test]
    fn construction_rejects_bad_endpoint() {
        let settings = ExtractionSettings {
            endpoint: "not a url".into(),
            api_key: "key".into(),
            model_id: "prebuilt-layout".into(),
            api_version: "2024-11-30".into(),
            request_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_secs(1),
            retry: RetryPolicy::none(),
        };
        assert!(matches!(
            DocumentIntelligenceClient::new(settings),
            Err(ExtractionError::Configuration(_))
        ));
    }
}
