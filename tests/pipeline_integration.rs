use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docsift::{
    extraction::{DocumentIntelligenceClient, ExtractionSettings},
    pipeline::{IngestionEvent, IngestionPipeline, PipelineSettings, Stage},
    retry::RetryPolicy,
    semantic::{Insight, OpenAiSemanticClient, SEMANTIC_FAILURE, SemanticSettings},
    storage::{DocumentStore, NewDocument, PersistenceError},
};
use httpmock::{
    Method::{GET, POST},
    Mock, MockServer,
};
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

const ANALYZE_PATH: &str = "/documentintelligence/documentModels/prebuilt-layout:analyze";
const CHAT_PATH: &str = "/openai/deployments/gpt-4o/chat/completions";

/// Store keyed by `(filename, source_url)` that keeps the first id, like the Postgres upsert.
#[derive(Clone, Default)]
struct InMemoryStore {
    rows: Arc<Mutex<Vec<(Uuid, NewDocument)>>>,
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn save(&self, document: &NewDocument) -> Result<Uuid, PersistenceError> {
        let mut rows = self.rows.lock().await;
        if let Some((id, existing)) = rows.iter_mut().find(|(_, row)| {
            row.filename == document.filename && row.source_url == document.source_url
        }) {
            *existing = document.clone();
            return Ok(*id);
        }
        let id = Uuid::new_v4();
        rows.push((id, document.clone()));
        Ok(id)
    }
}

fn extraction_settings(server: &MockServer) -> ExtractionSettings {
    ExtractionSettings {
        endpoint: server.base_url(),
        api_key: "di-secret".into(),
        model_id: "prebuilt-layout".into(),
        api_version: "2024-11-30".into(),
        request_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(1),
        max_wait: Duration::from_secs(5),
        retry: RetryPolicy::new(2, Duration::from_millis(1)),
    }
}

fn semantic_settings(server: &MockServer) -> SemanticSettings {
    SemanticSettings {
        endpoint: server.base_url(),
        api_key: "openai-secret".into(),
        deployment: "gpt-4o".into(),
        api_version: "2024-02-01".into(),
        input_char_limit: 20_000,
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(2, Duration::from_millis(1)),
    }
}

fn build_pipeline(server: &MockServer, store: &InMemoryStore) -> IngestionPipeline {
    IngestionPipeline::new(
        Box::new(DocumentIntelligenceClient::new(extraction_settings(server)).expect("extractor")),
        Box::new(OpenAiSemanticClient::new(semantic_settings(server)).expect("analyzer")),
        Box::new(store.clone()),
        PipelineSettings {
            source_base_url: "https://acct.blob.core.windows.net".into(),
            semantic_input_char_limit: 20_000,
            max_document_bytes: 1024 * 1024,
            persistence_retry: RetryPolicy::none(),
        },
    )
}

async fn mock_layout<'a>(server: &'a MockServer, paragraphs: &[&str]) -> (Mock<'a>, Mock<'a>) {
    let operation_url = format!("{}/operations/layout-1", server.base_url());
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(ANALYZE_PATH)
                .header("ocp-apim-subscription-key", "di-secret")
                .header("content-type", "application/pdf");
            then.status(202)
                .header("Operation-Location", operation_url.as_str());
        })
        .await;
    let paragraphs: Vec<_> = paragraphs
        .iter()
        .map(|content| json!({ "content": content }))
        .collect();
    let poll = server
        .mock_async(|when, then| {
            when.method(GET).path("/operations/layout-1");
            then.status(200).json_body(json!({
                "status": "succeeded",
                "analyzeResult": {
                    "apiVersion": "2024-11-30",
                    "pages": [{ "pageNumber": 1, "lines": [], "words": [] }],
                    "paragraphs": paragraphs
                }
            }));
        })
        .await;
    (submit, poll)
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn document_flows_from_layout_to_store() {
    let server = MockServer::start_async().await;
    let (submit, poll) = mock_layout(&server, &["A.", "B.", "C."]).await;
    let chat = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(CHAT_PATH)
                .header("api-key", "openai-secret")
                .body_contains("A.\\nB.\\nC.");
            then.status(200).json_body(completion(
                r#"{"summary":"Three letters.","documentType":"Memo","keyEntities":["Acme"],"actionItems":[]}"#,
            ));
        })
        .await;

    let store = InMemoryStore::default();
    let pipeline = build_pipeline(&server, &store);
    let id = pipeline
        .process(IngestionEvent::new("input-pdfs/memo.pdf", b"%PDF-1.7".to_vec()))
        .await
        .expect("pipeline succeeds");

    submit.assert_async().await;
    poll.assert_async().await;
    chat.assert_async().await;

    let rows = store.rows.lock().await;
    assert_eq!(rows.len(), 1);
    let (stored_id, document) = &rows[0];
    assert_eq!(*stored_id, id);
    assert_eq!(
        document.source_url,
        "https://acct.blob.core.windows.net/input-pdfs/memo.pdf"
    );
    assert_eq!(document.extraction["paragraphs"][2]["content"], "C.");
    let insight: Insight = serde_json::from_value(document.insight.clone()).expect("insight");
    assert_eq!(insight.document_type, "Memo");
    assert_eq!(insight.key_entities, vec!["Acme".to_string()]);
}

#[tokio::test]
async fn malformed_model_output_is_stored_as_degraded_insight() {
    let server = MockServer::start_async().await;
    let _layout = mock_layout(&server, &["Hello."]).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200)
                .json_body(completion("```json\n{\"summary\": \"x\"}\n```"));
        })
        .await;

    let store = InMemoryStore::default();
    let outcome = build_pipeline(&server, &store)
        .ingest_document(IngestionEvent::new("notes.pdf", b"%PDF-1.7".to_vec()))
        .await
        .expect("degraded runs still persist");

    assert!(outcome.insight_degraded);
    let rows = store.rows.lock().await;
    assert_eq!(rows[0].1.insight["error"], SEMANTIC_FAILURE);
    assert!(rows[0].1.insight.get("summary").is_none());
}

#[tokio::test]
async fn failed_layout_analysis_never_reaches_the_store() {
    let server = MockServer::start_async().await;
    let operation_url = format!("{}/operations/layout-9", server.base_url());
    server
        .mock_async(|when, then| {
            when.method(POST).path(ANALYZE_PATH);
            then.status(202)
                .header("Operation-Location", operation_url.as_str());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/operations/layout-9");
            then.status(200).json_body(json!({
                "status": "failed",
                "error": { "code": "InvalidContent", "message": "The file is corrupted." }
            }));
        })
        .await;
    let chat = server
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200).json_body(completion("{}"));
        })
        .await;

    let store = InMemoryStore::default();
    let error = build_pipeline(&server, &store)
        .process(IngestionEvent::new("broken.pdf", b"%PDF-broken".to_vec()))
        .await
        .expect_err("extraction failure is fatal");

    assert_eq!(error.stage(), Stage::Extraction);
    assert_eq!(chat.hits_async().await, 0);
    assert!(store.rows.lock().await.is_empty());
}

#[tokio::test]
async fn redelivery_keeps_the_original_record_id() {
    let server = MockServer::start_async().await;
    let _layout = mock_layout(&server, &["Invoice total 42."]).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200).json_body(completion(
                r#"{"summary":"An invoice.","document_type":"Invoice","key_entities":[],"action_items":["Pay"]}"#,
            ));
        })
        .await;

    let store = InMemoryStore::default();
    let pipeline = build_pipeline(&server, &store);
    let event = IngestionEvent::new("invoices/42.pdf", b"%PDF-1.7".to_vec());
    let first = pipeline.process(event.clone()).await.expect("first delivery");
    let second = pipeline.process(event).await.expect("second delivery");

    assert_eq!(first, second);
    assert_eq!(store.rows.lock().await.len(), 1);
    assert_eq!(pipeline.metrics_snapshot().documents_persisted, 2);
}
