//! In-memory [`DocumentStore`] backed by [`DashMap`].
//!
//! Each collection is a `Vec` of documents in insertion order, held in its own
//! `DashMap` shard entry, so writers to different collections do not contend.
//! Suitable for development and tests.

use async_trait::async_trait;
use campus_core::{Document, FieldValue, Filter, ObjectId, SortSpec};
use dashmap::DashMap;

use super::store::DocumentStore;

const ID_KEY: &str = "_id";

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, Vec<Document>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |docs| docs.len())
    }

    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn apply_set(&self, collection: &str, filter: &Filter, set: &Document, limit: usize) -> u64 {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return 0;
        };
        let mut matched = 0;
        for doc in docs.iter_mut().filter(|doc| filter.matches(doc)).take(limit) {
            for (key, value) in set {
                if key != ID_KEY {
                    doc.insert(key.clone(), value.clone());
                }
            }
            matched += 1;
        }
        matched
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, mut doc: Document) -> anyhow::Result<ObjectId> {
        let id = match doc.get(ID_KEY) {
            Some(FieldValue::ObjectId(id)) => *id,
            Some(other) => anyhow::bail!("document identity must be an object id, got {other:?}"),
            None => {
                let id = ObjectId::new();
                doc.insert(ID_KEY.to_string(), id.into());
                id
            }
        };

        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let duplicate = docs
            .iter()
            .any(|existing| existing.get(ID_KEY).and_then(FieldValue::as_object_id) == Some(id));
        if duplicate {
            anyhow::bail!("duplicate key {id} in collection {collection}");
        }
        docs.push(doc);
        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &SortSpec,
    ) -> anyhow::Result<Vec<Document>> {
        let mut found: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default();
        if !sort.is_empty() {
            found.sort_by(|a, b| sort.compare(a, b));
        }
        Ok(found)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> anyhow::Result<u64> {
        Ok(self.apply_set(collection, filter, &set, 1))
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> anyhow::Result<u64> {
        Ok(self.apply_set(collection, filter, &set, usize::MAX))
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> anyhow::Result<u64> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> anyhow::Result<u64> {
        Ok(self
            .collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|doc| filter.matches(doc)).count()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use campus_core::SortDirection;

    use super::*;

    fn doc(first: &str, class: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("first_name".to_string(), first.into());
        doc.insert("class".to_string(), class.into());
        doc
    }

    #[tokio::test]
    async fn insert_assigns_identity_and_preserves_order() {
        let store = MemoryStore::new();
        let a = store.insert_one("students", doc("Ada", "9A")).await.unwrap();
        let b = store.insert_one("students", doc("Bob", "9B")).await.unwrap();
        assert_ne!(a, b);

        let all = store
            .find("students", &Filter::new(), &SortSpec::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].get("_id"), Some(&FieldValue::ObjectId(a)));
        assert_eq!(all[1].get("first_name"), Some(&FieldValue::from("Bob")));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_identity() {
        let store = MemoryStore::new();
        let id = ObjectId::new();
        let mut first = doc("Ada", "9A");
        first.insert("_id".to_string(), id.into());
        store.insert_one("students", first.clone()).await.unwrap();
        assert!(store.insert_one("students", first).await.is_err());
        assert_eq!(store.len("students"), 1);
    }

    #[tokio::test]
    async fn find_filters_and_sorts() {
        let store = MemoryStore::new();
        store.insert_one("students", doc("Cy", "9A")).await.unwrap();
        store.insert_one("students", doc("Ada", "9A")).await.unwrap();
        store.insert_one("students", doc("Bob", "9B")).await.unwrap();

        let mut sort = SortSpec::new();
        sort.push("first_name", SortDirection::Descending);
        let found = store
            .find("students", &Filter::new().and_eq("class", "9A"), &sort)
            .await
            .unwrap();
        let names: Vec<_> = found
            .iter()
            .filter_map(|d| d.get("first_name").and_then(FieldValue::as_str))
            .collect();
        assert_eq!(names, ["Cy", "Ada"]);
    }

    #[tokio::test]
    async fn update_one_touches_first_match_only() {
        let store = MemoryStore::new();
        store.insert_one("students", doc("Ada", "9A")).await.unwrap();
        store.insert_one("students", doc("Bob", "9A")).await.unwrap();

        let mut set = Document::new();
        set.insert("class".to_string(), "10A".into());
        let matched = store
            .update_one("students", &Filter::new().and_eq("class", "9A"), set)
            .await
            .unwrap();
        assert_eq!(matched, 1);
        let moved = store
            .count_documents("students", &Filter::new().and_eq("class", "10A"))
            .await
            .unwrap();
        assert_eq!(moved, 1);
    }

    #[tokio::test]
    async fn update_never_rewrites_identity() {
        let store = MemoryStore::new();
        let id = store.insert_one("students", doc("Ada", "9A")).await.unwrap();

        let mut set = Document::new();
        set.insert("_id".to_string(), ObjectId::new().into());
        set.insert("first_name".to_string(), "Grace".into());
        store
            .update_many("students", &Filter::by_id(id), set)
            .await
            .unwrap();

        let found = store
            .find_one("students", &Filter::by_id(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get("first_name"), Some(&FieldValue::from("Grace")));
    }

    #[tokio::test]
    async fn delete_many_by_ids() {
        let store = MemoryStore::new();
        let a = store.insert_one("students", doc("Ada", "9A")).await.unwrap();
        let b = store.insert_one("students", doc("Bob", "9A")).await.unwrap();
        store.insert_one("students", doc("Cy", "9A")).await.unwrap();

        let deleted = store
            .delete_many("students", &Filter::by_ids([a, b]))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len("students"), 1);

        let deleted = store
            .delete_many("missing", &Filter::by_ids([a]))
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }
}
