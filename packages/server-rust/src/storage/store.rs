//! Persistence collaborator trait.

use async_trait::async_trait;
use campus_core::{Document, Filter, ObjectId, SortSpec};

/// Document-oriented persistence backend.
///
/// Every operation is a single independent call; no transactions span calls.
/// Implementations: in-memory ([`MemoryStore`](super::MemoryStore)).
/// Used as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document and returns its identity.
    ///
    /// A document without an `_id` key is assigned a freshly generated one.
    async fn insert_one(&self, collection: &str, doc: Document) -> anyhow::Result<ObjectId>;

    /// Returns every document matching `filter`, ordered by `sort`.
    ///
    /// An empty `sort` leaves the order up to the store.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &SortSpec,
    ) -> anyhow::Result<Vec<Document>>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, collection: &str, filter: &Filter) -> anyhow::Result<Option<Document>> {
        Ok(self
            .find(collection, filter, &SortSpec::new())
            .await?
            .into_iter()
            .next())
    }

    /// Sets the fields of `set` on the first document matching `filter`.
    ///
    /// Returns the number of documents matched (0 or 1).
    async fn update_one(&self, collection: &str, filter: &Filter, set: Document)
        -> anyhow::Result<u64>;

    /// Sets the fields of `set` on every document matching `filter`.
    ///
    /// Returns the number of documents matched.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> anyhow::Result<u64>;

    /// Deletes every document matching `filter`. Returns the number deleted.
    async fn delete_many(&self, collection: &str, filter: &Filter) -> anyhow::Result<u64>;

    /// Counts the documents matching `filter`.
    async fn count_documents(&self, collection: &str, filter: &Filter) -> anyhow::Result<u64>;
}
