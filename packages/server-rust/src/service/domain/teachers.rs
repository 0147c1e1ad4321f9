//! Teachers service, including the per-teacher student lookups.

use std::sync::Arc;
use std::task::{Context, Poll};

use campus_core::{
    DeleteConfirmation, Filter, SortField, SortSpec, StorageModel, Student, StudentModel,
    Teacher, TeacherModel,
};
use tower::Service;

use super::crud::{new_models, parse_id, Records};
use crate::service::operation::{
    CallContext, Request, Response, RpcError, RpcFuture, RpcRequest, RpcResponse,
};
use crate::storage::DocumentStore;

/// Handles the teachers methods.
pub struct TeachersService {
    teachers: Records<TeacherModel>,
    students: Records<StudentModel>,
}

impl TeachersService {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            teachers: Records::new(store.clone()),
            students: Records::new(store),
        }
    }

    /// Adds teachers; none may carry an id.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] before any insert if a record is
    /// malformed, or the first insert failure.
    pub async fn add(&self, ctx: &CallContext, teachers: &[Teacher]) -> Result<Vec<Teacher>, RpcError> {
        let models = new_models::<TeacherModel>(teachers)?;
        let added = self.teachers.insert(ctx, models).await?;
        Ok(added.iter().map(StorageModel::to_wire).collect())
    }

    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] if the example carries a malformed id.
    pub async fn get(
        &self,
        ctx: &CallContext,
        example: Option<&Teacher>,
        sort_by: &[SortField],
    ) -> Result<Vec<Teacher>, RpcError> {
        let found = self.teachers.query(ctx, example, sort_by).await?;
        Ok(found.iter().map(StorageModel::to_wire).collect())
    }

    /// Updates teachers in order; stops at the first failure without rollback.
    ///
    /// # Errors
    ///
    /// Returns the first per-record failure.
    pub async fn update(&self, ctx: &CallContext, teachers: &[Teacher]) -> Result<Vec<Teacher>, RpcError> {
        let models = teachers.iter().map(TeacherModel::from_wire).collect();
        let updated = self.teachers.update(ctx, models).await?;
        Ok(updated.iter().map(StorageModel::to_wire).collect())
    }

    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a bad id, or
    /// [`RpcError::Internal`] if nothing was deleted.
    pub async fn delete(&self, ctx: &CallContext, ids: &[String]) -> Result<DeleteConfirmation, RpcError> {
        let deleted_ids = self.teachers.delete(ctx, ids).await?;
        Ok(DeleteConfirmation {
            status: "Teachers successfully deleted".to_string(),
            deleted_ids,
        })
    }

    /// Students in the class the teacher teaches.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a bad or unknown teacher id.
    pub async fn students_of(&self, ctx: &CallContext, teacher_id: &str) -> Result<Vec<Student>, RpcError> {
        let class_filter = self.class_filter(ctx, teacher_id).await?;
        let students = self.students.find(ctx, &class_filter, &SortSpec::new()).await?;
        Ok(students.iter().map(StorageModel::to_wire).collect())
    }

    /// Number of students in the class the teacher teaches.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a bad or unknown teacher id.
    pub async fn student_count_of(&self, ctx: &CallContext, teacher_id: &str) -> Result<u64, RpcError> {
        let class_filter = self.class_filter(ctx, teacher_id).await?;
        self.students.count(ctx, &class_filter).await
    }

    async fn class_filter(&self, ctx: &CallContext, teacher_id: &str) -> Result<Filter, RpcError> {
        let id = parse_id(teacher_id)?;
        let teacher = self
            .teachers
            .find_one(ctx, &Filter::by_id(id))
            .await?
            .ok_or_else(|| RpcError::invalid_argument(format!("teacher {id} not found")))?;
        Ok(Filter::new().and_eq("class", teacher.class))
    }

    async fn handle(&self, req: RpcRequest) -> Result<Response, RpcError> {
        let ctx = &req.ctx;
        match &req.payload {
            Request::AddTeachers(teachers) => self.add(ctx, teachers).await.map(Response::Teachers),
            Request::GetTeachers(get) => self
                .get(ctx, get.teacher.as_ref(), &get.sort_by)
                .await
                .map(Response::Teachers),
            Request::UpdateTeachers(teachers) => {
                self.update(ctx, teachers).await.map(Response::Teachers)
            }
            Request::DeleteTeachers(ids) => self.delete(ctx, ids).await.map(Response::Deleted),
            Request::GetStudentsByTeacherId(id) => {
                self.students_of(ctx, id).await.map(Response::Students)
            }
            Request::GetStudentCountByTeacherId(id) => self
                .student_count_of(ctx, id)
                .await
                .map(Response::StudentCount),
            other => Err(RpcError::internal(format!(
                "{} is not a teachers method",
                other.method()
            ))),
        }
    }
}

impl Service<RpcRequest> for Arc<TeachersService> {
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
