//! Students service.

use std::sync::Arc;
use std::task::{Context, Poll};

use campus_core::{DeleteConfirmation, SortField, StorageModel, Student, StudentModel};
use tower::Service;

use super::crud::{new_models, Records};
use crate::service::operation::{
    CallContext, Request, Response, RpcError, RpcFuture, RpcRequest, RpcResponse,
};
use crate::storage::DocumentStore;

/// Handles the students methods.
pub struct StudentsService {
    students: Records<StudentModel>,
}

impl StudentsService {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            students: Records::new(store),
        }
    }

    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] before any insert if a record is
    /// malformed, or the first insert failure.
    pub async fn add(&self, ctx: &CallContext, students: &[Student]) -> Result<Vec<Student>, RpcError> {
        let models = new_models::<StudentModel>(students)?;
        let added = self.students.insert(ctx, models).await?;
        Ok(added.iter().map(StorageModel::to_wire).collect())
    }

    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] if the example carries a malformed id.
    pub async fn get(
        &self,
        ctx: &CallContext,
        example: Option<&Student>,
        sort_by: &[SortField],
    ) -> Result<Vec<Student>, RpcError> {
        let found = self.students.query(ctx, example, sort_by).await?;
        Ok(found.iter().map(StorageModel::to_wire).collect())
    }

    /// Updates students in order; stops at the first failure without rollback.
    ///
    /// # Errors
    ///
    /// Returns the first per-record failure.
    pub async fn update(&self, ctx: &CallContext, students: &[Student]) -> Result<Vec<Student>, RpcError> {
        let models = students.iter().map(StudentModel::from_wire).collect();
        let updated = self.students.update(ctx, models).await?;
        Ok(updated.iter().map(StorageModel::to_wire).collect())
    }

    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a bad id, or
    /// [`RpcError::Internal`] if nothing was deleted.
    pub async fn delete(&self, ctx: &CallContext, ids: &[String]) -> Result<DeleteConfirmation, RpcError> {
        let deleted_ids = self.students.delete(ctx, ids).await?;
        Ok(DeleteConfirmation {
            status: "Students successfully deleted".to_string(),
            deleted_ids,
        })
    }

    async fn handle(&self, req: RpcRequest) -> Result<Response, RpcError> {
        let ctx = &req.ctx;
        match &req.payload {
            Request::AddStudents(students) => self.add(ctx, students).await.map(Response::Students),
            Request::GetStudents(get) => self
                .get(ctx, get.student.as_ref(), &get.sort_by)
                .await
                .map(Response::Students),
            Request::UpdateStudents(students) => {
                self.update(ctx, students).await.map(Response::Students)
            }
            Request::DeleteStudents(ids) => self.delete(ctx, ids).await.map(Response::Deleted),
            other => Err(RpcError::internal(format!(
                "{} is not a students method",
                other.method()
            ))),
        }
    }
}

impl Service<RpcRequest> for Arc<StudentsService> {
    type Response = RpcResponse;
    type Error = RpcError;
    type Future = RpcFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let svc = Arc::clone(self);
        Box::pin(async move { svc.handle(req).await.map(RpcResponse::new) })
    }
}
