//! Generic record operations shared by every entity service.
//!
//! Batches are applied one record at a time in input order. A failure part way
//! through aborts the batch and returns that error; records already written
//! stay written (there is no rollback).

use std::marker::PhantomData;
use std::sync::Arc;

use campus_core::{
    build_filter, build_sort, Document, Filter, ObjectId, SortField, SortSpec, StorageModel,
};

use crate::service::deadline::bounded;
use crate::service::operation::{CallContext, RpcError};
use crate::storage::DocumentStore;

/// Parses one caller-supplied identity.
///
/// # Errors
///
/// Returns [`RpcError::InvalidArgument`] for a blank or malformed id.
pub fn parse_id(id: &str) -> Result<ObjectId, RpcError> {
    if id.trim().is_empty() {
        return Err(RpcError::invalid_argument("id cannot be blank"));
    }
    ObjectId::parse_str(id).map_err(RpcError::from)
}

/// Parses every id, failing on the first blank or malformed one.
///
/// # Errors
///
/// Returns [`RpcError::InvalidArgument`] for a blank or malformed id.
pub fn parse_ids(ids: &[String]) -> Result<Vec<ObjectId>, RpcError> {
    ids.iter().map(|id| parse_id(id)).collect()
}

/// Maps incoming wire records to models for insertion.
///
/// Every record is checked before anything is persisted: a record that already
/// carries an id, or leaves a required field blank, rejects the whole batch.
///
/// # Errors
///
/// Returns [`RpcError::InvalidArgument`] for the first offending record.
pub fn new_models<M: StorageModel>(records: &[M::Wire]) -> Result<Vec<M>, RpcError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let model = M::from_wire(record);
            if !model.id().is_empty() {
                return Err(RpcError::invalid_argument(format!(
                    "record {index}: non-empty id is not allowed, ids are assigned on insert"
                )));
            }
            if let Some(field) = model.missing_required() {
                return Err(RpcError::invalid_argument(format!(
                    "record {index}: {field} is required"
                )));
            }
            Ok(model)
        })
        .collect()
}

/// Typed access to one collection of `M` records.
pub struct Records<M> {
    store: Arc<dyn DocumentStore>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Records<M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: StorageModel> Records<M> {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _model: PhantomData,
        }
    }

    /// Inserts each model in order and returns them with their assigned ids.
    ///
    /// # Errors
    ///
    /// Returns the first insert failure; earlier inserts are kept.
    pub async fn insert(&self, ctx: &CallContext, models: Vec<M>) -> Result<Vec<M>, RpcError> {
        let mut inserted = Vec::with_capacity(models.len());
        for mut model in models {
            let doc = model.to_document()?;
            let id = bounded(ctx, "insert_one", self.store.insert_one(M::COLLECTION, doc)).await?;
            model.set_id(id.to_hex());
            inserted.push(model);
        }
        tracing::debug!(collection = M::COLLECTION, count = inserted.len(), "records inserted");
        Ok(inserted)
    }

    /// Lists records matching the non-zero fields of `example`, in `sort_by` order.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] if `example` carries a malformed id.
    pub async fn query(
        &self,
        ctx: &CallContext,
        example: Option<&M::Wire>,
        sort_by: &[SortField],
    ) -> Result<Vec<M>, RpcError> {
        let filter = build_filter::<M>(example)?;
        let sort = build_sort(sort_by);
        self.find(ctx, &filter, &sort).await
    }

    /// # Errors
    ///
    /// Returns [`RpcError::Internal`] if the store fails.
    pub async fn find(
        &self,
        ctx: &CallContext,
        filter: &Filter,
        sort: &SortSpec,
    ) -> Result<Vec<M>, RpcError> {
        let docs = bounded(ctx, "find", self.store.find(M::COLLECTION, filter, sort)).await?;
        Ok(docs.iter().map(M::from_document).collect())
    }

    /// # Errors
    ///
    /// Returns [`RpcError::Internal`] if the store fails.
    pub async fn find_one(&self, ctx: &CallContext, filter: &Filter) -> Result<Option<M>, RpcError> {
        let doc = bounded(ctx, "find_one", self.store.find_one(M::COLLECTION, filter)).await?;
        Ok(doc.as_ref().map(M::from_document))
    }

    /// # Errors
    ///
    /// Returns [`RpcError::Internal`] if the store fails.
    pub async fn count(&self, ctx: &CallContext, filter: &Filter) -> Result<u64, RpcError> {
        bounded(
            ctx,
            "count_documents",
            self.store.count_documents(M::COLLECTION, filter),
        )
        .await
    }

    /// Applies each model's non-zero fields to the stored record with its id.
    ///
    /// Records are processed in input order. The first record with a blank or
    /// malformed id stops the batch; earlier updates stay applied and later
    /// records are never attempted. An id that matches no stored record is
    /// skipped and the batch carries on.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a bad id, or
    /// [`RpcError::Internal`] if the store fails.
    pub async fn update(&self, ctx: &CallContext, models: Vec<M>) -> Result<Vec<M>, RpcError> {
        let mut updated = Vec::with_capacity(models.len());
        for model in models {
            updated.push(self.update_one(ctx, model).await?);
        }
        tracing::debug!(collection = M::COLLECTION, count = updated.len(), "records updated");
        Ok(updated)
    }

    /// Applies one model's non-zero fields to the stored record with its id.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a blank or malformed id, or
    /// [`RpcError::Internal`] if the store fails.
    pub async fn update_one(&self, ctx: &CallContext, model: M) -> Result<M, RpcError> {
        let id = parse_id(model.id())?;
        let mut set = model.to_document()?;
        set.remove(M::ID_KEY);

        let matched = bounded(
            ctx,
            "update_one",
            self.store.update_one(M::COLLECTION, &Filter::by_id(id), set),
        )
        .await?;
        if matched == 0 {
            tracing::debug!(collection = M::COLLECTION, %id, "update matched no record");
        }
        Ok(model)
    }

    /// Sets `set` on every record whose id is in `ids`. Returns the number matched.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Internal`] if the store fails.
    pub async fn set_many(
        &self,
        ctx: &CallContext,
        ids: Vec<ObjectId>,
        set: Document,
    ) -> Result<u64, RpcError> {
        bounded(
            ctx,
            "update_many",
            self.store.update_many(M::COLLECTION, &Filter::by_ids(ids), set),
        )
        .await
    }

    /// Deletes the records with the given ids and echoes the ids back.
    ///
    /// All ids are validated before anything is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a blank or malformed id, and
    /// [`RpcError::Internal`] if nothing was deleted or the store fails.
    pub async fn delete(&self, ctx: &CallContext, ids: &[String]) -> Result<Vec<String>, RpcError> {
        let object_ids = parse_ids(ids)?;
        let filter = Filter::by_ids(object_ids.iter().copied());
        let deleted =
            bounded(ctx, "delete_many", self.store.delete_many(M::COLLECTION, &filter)).await?;
        if deleted == 0 {
            return Err(RpcError::internal(format!(
                "no {} were deleted",
                M::COLLECTION
            )));
        }
        tracing::debug!(collection = M::COLLECTION, deleted, "records deleted");
        Ok(object_ids.iter().map(ObjectId::to_hex).collect())
    }
}

#[cfg(test)]
mod tests {
    use campus_core::{Student, StudentModel};

    use super::*;
    use crate::service::operation::Code;
    use crate::storage::MemoryStore;

    fn student(first: &str, class: &str) -> Student {
        Student {
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            email: format!("{}@example.com", first.to_lowercase()),
            class: class.to_string(),
            ..Student::default()
        }
    }

    fn records() -> (Arc<MemoryStore>, Records<StudentModel>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Records::new(store))
    }

    #[test]
    fn new_models_rejects_preset_id() {
        let mut with_id = student("Ada", "9A");
        with_id.id = ObjectId::new().to_hex();
        let err = new_models::<StudentModel>(&[student("Bob", "9A"), with_id]).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn new_models_rejects_blank_required_field() {
        let mut blank = student("Ada", "9A");
        blank.email.clear();
        let err = new_models::<StudentModel>(&[blank]).unwrap_err();
        assert!(err.to_string().contains("email is required"));
    }

    #[test]
    fn parse_id_classifies_failures() {
        assert_eq!(parse_id("").unwrap_err().code(), Code::InvalidArgument);
        assert_eq!(parse_id("xyz").unwrap_err().code(), Code::InvalidArgument);
        assert!(parse_id(&ObjectId::new().to_hex()).is_ok());
    }

    #[tokio::test]
    async fn insert_then_query() {
        let (_, records) = records();
        let ctx = CallContext::new(1);
        let models =
            new_models::<StudentModel>(&[student("Cy", "9A"), student("Ada", "9A"), student("Bob", "9B")])
                .unwrap();
        let inserted = records.insert(&ctx, models).await.unwrap();
        assert!(inserted.iter().all(|m| !m.id.is_empty()));

        let example = Student {
            class: "9A".to_string(),
            ..Student::default()
        };
        let found = records
            .query(&ctx, Some(&example), &[SortField::asc("first_name")])
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|m| m.first_name.as_str()).collect();
        assert_eq!(names, ["Ada", "Cy"]);
    }

    #[tokio::test]
    async fn query_with_malformed_id_is_invalid_argument() {
        let (_, records) = records();
        let example = Student {
            id: "bogus".to_string(),
            ..Student::default()
        };
        let err = records
            .query(&CallContext::new(1), Some(&example), &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn update_applies_only_set_fields() {
        let (_, records) = records();
        let ctx = CallContext::new(1);
        let inserted = records
            .insert(&ctx, new_models(&[student("Ada", "9A")]).unwrap())
            .await
            .unwrap();

        let patch = StudentModel {
            id: inserted[0].id.clone(),
            class: "10A".to_string(),
            ..StudentModel::default()
        };
        records.update(&ctx, vec![patch]).await.unwrap();

        let id = parse_id(&inserted[0].id).unwrap();
        let stored = records
            .find_one(&ctx, &Filter::by_id(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.class, "10A");
        assert_eq!(stored.first_name, "Ada");
    }

    #[tokio::test]
    async fn update_skips_unknown_id_and_continues() {
        let (store, records) = records();
        let ctx = CallContext::new(1);
        let inserted = records
            .insert(&ctx, new_models(&[student("Ada", "9A")]).unwrap())
            .await
            .unwrap();

        let missing = StudentModel {
            id: ObjectId::new().to_hex(),
            class: "10A".to_string(),
            ..StudentModel::default()
        };
        let known = StudentModel {
            id: inserted[0].id.clone(),
            class: "10B".to_string(),
            ..StudentModel::default()
        };
        let updated = records.update(&ctx, vec![missing, known]).await.unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(store.len(StudentModel::COLLECTION), 1);

        let id = parse_id(&inserted[0].id).unwrap();
        let stored = records
            .find_one(&ctx, &Filter::by_id(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.class, "10B");
    }

    #[tokio::test]
    async fn delete_validates_all_ids_first() {
        let (store, records) = records();
        let ctx = CallContext::new(1);
        let inserted = records
            .insert(&ctx, new_models(&[student("Ada", "9A")]).unwrap())
            .await
            .unwrap();

        let err = records
            .delete(&ctx, &[inserted[0].id.clone(), "bad".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(store.len(StudentModel::COLLECTION), 1);

        let deleted = records.delete(&ctx, &[inserted[0].id.clone()]).await.unwrap();
        assert_eq!(deleted, [inserted[0].id.clone()]);
        assert!(store.is_empty(StudentModel::COLLECTION));
    }

    #[tokio::test]
    async fn deleting_nothing_is_internal() {
        let (_, records) = records();
        let err = records
            .delete(&CallContext::new(1), &[ObjectId::new().to_hex()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.to_string().contains("no students were deleted"));
    }
}
