//! Postgres-backed document store.

use super::DocumentStore;
use super::types::{DocumentRecord, NewDocument, PersistenceError};
use crate::config::Config;
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use std::future::Future;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS documents (
    id UUID PRIMARY KEY,
    filename TEXT NOT NULL,
    source_url TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    extraction JSONB NOT NULL,
    insight JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (filename, source_url)
)";

// Re-delivery of the same (filename, source_url) refreshes the payloads and keeps the first id.
const UPSERT_SQL: &str = "INSERT INTO documents
    (id, filename, source_url, content_hash, extraction, insight)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (filename, source_url) DO UPDATE SET
        content_hash = EXCLUDED.content_hash,
        extraction = EXCLUDED.extraction,
        insight = EXCLUDED.insight
    RETURNING id";

const SELECT_BY_ID_SQL: &str = "SELECT id, filename, source_url, content_hash, extraction, insight, created_at
    FROM documents WHERE id = $1";

/// Settings required to connect a [`PostgresDocumentStore`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Postgres connection string.
    pub database_url: String,
    /// Maximum number of pooled connections.
    pub pool_size: usize,
    /// Timeout applied to checking out a connection and to each statement.
    pub timeout: Duration,
}

impl StoreSettings {
    /// Derive store settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            database_url: config.database_url.clone(),
            pool_size: config.database_pool_size,
            timeout: config.request_timeout(),
        }
    }
}

/// Document store writing one row per document into the `documents` table.
///
/// Connections come from a `deadpool-postgres` pool shared by every pipeline run. A connection
/// whose driver has exited is discarded on checkout and replaced, so a dropped socket only
/// fails the statements that were in flight on it.
pub struct PostgresDocumentStore {
    pool: Pool,
    timeout: Duration,
}

impl PostgresDocumentStore {
    /// Build the pool and ensure the schema exists, which also proves connectivity.
    pub async fn connect(settings: StoreSettings) -> Result<Self, PersistenceError> {
        let store = Self {
            pool: build_pool(&settings)?,
            timeout: settings.timeout,
        };
        store.ensure_schema().await?;
        tracing::info!(pool_size = settings.pool_size, "Document store ready");
        Ok(store)
    }

    async fn client(&self) -> Result<Object, PersistenceError> {
        Ok(self.pool.get().await?)
    }

    async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        let client = self.client().await?;
        with_timeout(self.timeout, client.batch_execute(CREATE_TABLE_SQL))
            .await?
            .map_err(classify)?;
        tracing::debug!("Documents table ensured");
        Ok(())
    }

    /// Load a stored document by identifier.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentRecord>, PersistenceError> {
        let client = self.client().await?;
        let row = with_timeout(self.timeout, client.query_opt(SELECT_BY_ID_SQL, &[&id]))
            .await?
            .map_err(classify)?;
        row.map(|row| map_row(&row)).transpose()
    }
}

fn build_pool(settings: &StoreSettings) -> Result<Pool, PersistenceError> {
    let pg_config: tokio_postgres::Config = settings
        .database_url
        .parse()
        .map_err(|error: tokio_postgres::Error| PersistenceError::Configuration(error.to_string()))?;
    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(settings.pool_size.max(1))
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(settings.timeout))
        .create_timeout(Some(settings.timeout))
        .recycle_timeout(Some(settings.timeout))
        .build()
        .map_err(|error| PersistenceError::Configuration(error.to_string()))
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn save(&self, document: &NewDocument) -> Result<Uuid, PersistenceError> {
        let candidate = Uuid::new_v4();
        let client = self.client().await?;
        let row = with_timeout(
            self.timeout,
            client.query_one(
                UPSERT_SQL,
                &[
                    &candidate,
                    &document.filename,
                    &document.source_url,
                    &document.content_hash,
                    &document.extraction,
                    &document.insight,
                ],
            ),
        )
        .await?
        .map_err(classify)?;

        let id: Uuid = row.try_get("id").map_err(classify)?;
        tracing::debug!(
            %id,
            filename = %document.filename,
            inserted = id == candidate,
            "Document row written"
        );
        Ok(id)
    }
}

async fn with_timeout<F, T>(limit: Duration, future: F) -> Result<T, PersistenceError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| PersistenceError::Timeout(limit))
}

fn classify(error: tokio_postgres::Error) -> PersistenceError {
    let integrity_violation = error
        .code()
        .is_some_and(|state| state.code().starts_with("23"));
    if integrity_violation {
        PersistenceError::Constraint(error.to_string())
    } else {
        PersistenceError::Query(error)
    }
}

fn map_row(row: &Row) -> Result<DocumentRecord, PersistenceError> {
    Ok(DocumentRecord {
        id: row.try_get("id").map_err(classify)?,
        filename: row.try_get("filename").map_err(classify)?,
        source_url: row.try_get("source_url").map_err(classify)?,
        content_hash: row.try_get("content_hash").map_err(classify)?,
        extraction: row.try_get("extraction").map_err(classify)?,
        insight: row.try_get("insight").map_err(classify)?,
        created_at: row.try_get("created_at").map_err(classify)?,
    })
}
