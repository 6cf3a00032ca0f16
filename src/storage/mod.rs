//! Persistence port and its Postgres adapter.

pub mod postgres;
pub mod types;

use async_trait::async_trait;
use uuid::Uuid;

pub use postgres::{PostgresDocumentStore, StoreSettings};
pub use types::{DocumentRecord, NewDocument, PersistenceError};

/// Interface implemented by document stores.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Atomically write one document and return its identifier.
    ///
    /// Writing the same `(filename, source_url)` again must return the original identifier
    /// rather than creating a second logical document. Implementations do not retry.
    async fn save(&self, document: &NewDocument) -> Result<Uuid, PersistenceError>;
}
