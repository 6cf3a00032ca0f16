use anyhow::Context;
use docsift::{
    api, config, logging,
    extraction::{DocumentIntelligenceClient, ExtractionSettings},
    pipeline::{IngestionPipeline, PipelineSettings},
    semantic::{OpenAiSemanticClient, SemanticSettings},
    storage::{PostgresDocumentStore, StoreSettings},
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();

    let extractor = DocumentIntelligenceClient::new(ExtractionSettings::from_config(config))
        .context("Failed to build extraction client")?;
    let analyzer = OpenAiSemanticClient::new(SemanticSettings::from_config(config))
        .context("Failed to build semantic client")?;
    let store = PostgresDocumentStore::connect(StoreSettings::from_config(config))
        .await
        .context("Failed to connect document store")?;
    let pipeline = IngestionPipeline::new(
        Box::new(extractor),
        Box::new(analyzer),
        Box::new(store),
        PipelineSettings::from_config(config),
    );
    let app = api::create_router(Arc::new(pipeline), config.max_document_bytes);

    let (listener, port) = bind_listener().await.context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = config::get_config().server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
