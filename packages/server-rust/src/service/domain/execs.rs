//! Execs (administrator accounts) service: account records plus the session
//! methods (login, password change, deactivation, logout).
//!
//! Passwords are stored only as hashes and never returned to callers.

use std::sync::Arc;
use std::task::{Context, Poll};

use campus_core::{
    DeleteConfirmation, Document, Exec, ExecLoginRequest, ExecLoginResponse, ExecModel, Filter,
    SortField, StorageModel, UpdatePasswordRequest, UpdatePasswordResponse,
};
use chrono::{SecondsFormat, Utc};
use tower::Service;

use super::crud::{new_models, parse_id, parse_ids, Records};
use crate::auth::{PasswordHasher, RevocationStore, TokenSigner};
use crate::service::operation::{
    CallContext, Request, Response, RpcError, RpcFuture, RpcRequest, RpcResponse,
};
use crate::storage::DocumentStore;

const BAD_CREDENTIALS: &str = "incorrect username or password";

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Wire form of a stored exec with the password hash removed.
fn redacted(model: &ExecModel) -> Exec {
    let mut exec = model.to_wire();
    exec.password.clear();
    exec
}

/// Handles the execs methods.
pub struct ExecsService {
    execs: Records<ExecModel>,
    hasher: Arc<dyn PasswordHasher>,
    signer: Arc<TokenSigner>,
    revocations: Arc<RevocationStore>,
}

impl ExecsService {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        hasher: Arc<dyn PasswordHasher>,
        signer: Arc<TokenSigner>,
        revocations: Arc<RevocationStore>,
    ) -> Self {
        Self {
            execs: Records::new(store),
            hasher,
            signer,
            revocations,
        }
    }

    /// Hashes on the blocking pool; argon2 is deliberately slow.
    async fn hash(&self, plaintext: String) -> Result<String, RpcError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&plaintext))
            .await
            .map_err(|e| RpcError::internal(format!("password hashing task failed: {e}")))?
            .map_err(RpcError::Internal)
    }

    async fn verify(&self, plaintext: String, hash: String) -> Result<bool, RpcError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_password(&plaintext, &hash))
            .await
            .map_err(|e| RpcError::internal(format!("password verification task failed: {e}")))?
            .map_err(RpcError::Internal)
    }

    fn sign(&self, exec: &ExecModel) -> Result<String, RpcError> {
        self.signer
            .sign(&exec.id, &exec.username, &exec.role)
            .map_err(RpcError::Internal)
    }

    /// Adds execs, storing password hashes and stamping the creation time.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] before any insert if a record is
    /// malformed, or the first hashing or insert failure.
    pub async fn add(&self, ctx: &CallContext, execs: &[Exec]) -> Result<Vec<Exec>, RpcError> {
        let mut models = new_models::<ExecModel>(execs)?;
        for model in &mut models {
            model.password = self.hash(std::mem::take(&mut model.password)).await?;
            if model.user_created_at.is_empty() {
                model.user_created_at = now_rfc3339();
            }
        }
        let added = self.execs.insert(ctx, models).await?;
        Ok(added.iter().map(redacted).collect())
    }

    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] if the example carries a malformed id.
    pub async fn get(
        &self,
        ctx: &CallContext,
        example: Option<&Exec>,
        sort_by: &[SortField],
    ) -> Result<Vec<Exec>, RpcError> {
        // A password in the example would be compared against hashes and never match.
        let example = example.map(|exec| Exec {
            password: String::new(),
            ..exec.clone()
        });
        let found = self.execs.query(ctx, example.as_ref(), sort_by).await?;
        Ok(found.iter().map(redacted).collect())
    }

    /// Updates execs in order, hashing any new password; stops at the first
    /// failure without rollback.
    ///
    /// Each record's id is checked before its password is hashed.
    ///
    /// # Errors
    ///
    /// Returns the first per-record failure.
    pub async fn update(&self, ctx: &CallContext, execs: &[Exec]) -> Result<Vec<Exec>, RpcError> {
        let mut updated = Vec::with_capacity(execs.len());
        for exec in execs {
            parse_id(&exec.id)?;
            let mut model = ExecModel::from_wire(exec);
            if !model.password.is_empty() {
                model.password = self.hash(std::mem::take(&mut model.password)).await?;
            }
            updated.push(redacted(&self.execs.update_one(ctx, model).await?));
        }
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a bad id, or
    /// [`RpcError::Internal`] if nothing was deleted.
    pub async fn delete(&self, ctx: &CallContext, ids: &[String]) -> Result<DeleteConfirmation, RpcError> {
        let deleted_ids = self.execs.delete(ctx, ids).await?;
        Ok(DeleteConfirmation {
            status: "Execs successfully deleted".to_string(),
            deleted_ids,
        })
    }

    /// Checks credentials and issues a session token.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Unauthenticated`] for an unknown user, a wrong
    /// password or an inactive account.
    pub async fn login(&self, ctx: &CallContext, req: &ExecLoginRequest) -> Result<ExecLoginResponse, RpcError> {
        if req.username.is_empty() || req.password.is_empty() {
            return Err(RpcError::unauthenticated(BAD_CREDENTIALS));
        }

        let filter = Filter::new().and_eq("username", req.username.as_str());
        let Some(exec) = self.execs.find_one(ctx, &filter).await? else {
            tracing::info!(username = %req.username, "login for unknown user");
            return Err(RpcError::unauthenticated(BAD_CREDENTIALS));
        };

        if exec.inactive_status {
            tracing::info!(username = %req.username, "login for inactive account");
            return Err(RpcError::unauthenticated("account is inactive"));
        }

        if !self.verify(req.password.clone(), exec.password.clone()).await? {
            tracing::info!(username = %req.username, "login with wrong password");
            return Err(RpcError::unauthenticated(BAD_CREDENTIALS));
        }

        let token = self.sign(&exec)?;
        tracing::info!(username = %exec.username, "login succeeded");
        Ok(ExecLoginResponse {
            status: true,
            token,
        })
    }

    /// Replaces an exec's password after checking the current one, and issues
    /// a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a bad id, blank new password or
    /// unknown account, and [`RpcError::Unauthenticated`] if the current
    /// password does not match.
    pub async fn update_password(
        &self,
        ctx: &CallContext,
        req: &UpdatePasswordRequest,
    ) -> Result<UpdatePasswordResponse, RpcError> {
        let id = parse_id(&req.id)?;
        if req.new_password.is_empty() {
            return Err(RpcError::invalid_argument("new password cannot be blank"));
        }

        let exec = self
            .execs
            .find_one(ctx, &Filter::by_id(id))
            .await?
            .ok_or_else(|| RpcError::invalid_argument(format!("exec {id} not found")))?;

        if !self.verify(req.current_password.clone(), exec.password.clone()).await? {
            return Err(RpcError::unauthenticated(BAD_CREDENTIALS));
        }

        let mut set = Document::new();
        set.insert("password".to_string(), self.hash(req.new_password.clone()).await?.into());
        set.insert("password_changed_at".to_string(), now_rfc3339().into());
        self.execs.set_many(ctx, vec![id], set).await?;

        let token = self.sign(&exec)?;
        tracing::info!(username = %exec.username, "password updated");
        Ok(UpdatePasswordResponse {
            password_updated: true,
            token,
        })
    }

    /// Marks the given accounts inactive.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`] for a blank or malformed id.
    pub async fn deactivate(&self, ctx: &CallContext, ids: &[String]) -> Result<bool, RpcError> {
        let ids = parse_ids(ids)?;
        let mut set = Document::new();
        set.insert("inactive_status".to_string(), true.into());
        let matched = self.execs.set_many(ctx, ids, set).await?;
        tracing::info!(matched, "accounts deactivated");
        Ok(true)
    }

    /// Revokes the caller's token until it would have expired anyway.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Unauthenticated`] if the call carries no principal.
    pub fn logout(&self, ctx: &CallContext) -> Result<(), RpcError> {
        let principal = ctx
            .principal
            .as_ref()
            .ok_or_else(|| RpcError::unauthenticated("unauthorized access"))?;
        self.revocations
            .add(principal.token.clone(), principal.expires_at);
        tracing::info!(username = %principal.username, "logged out");
        Ok(())
    }

    async fn handle(&self, req: RpcRequest) -> Result<Response, RpcError> {
        let ctx = &req.ctx;
        match &req.payload {
            Request::AddExecs(execs) => self.add(ctx, execs).await.map(Response::Execs),
            Request::GetExecs(get) => self
                .get(ctx, get.exec.as_ref(), &get.sort_by)
                .await
                .map(Response::Execs),
            Request::UpdateExecs(execs) => self.update(ctx, execs).await.map(Response::Execs),
            Request::DeleteExecs(ids) => self.delete(ctx, ids).await.map(Response::Deleted),
            Request::Login(login) => self.login(ctx, login).await.map(Response::Login),
            Request::UpdatePassword(update) => self
                .update_password(ctx, update)
                .await
                .map(Response::PasswordUpdated),
            Request::DeactivateUser(ids) => {
                self.deactivate(ctx, ids).await.map(Response::Confirmation)
            }
            Request::Logout => self.logout(ctx).map(|()| Response::LoggedOut),
            other => Err(RpcError::internal(format!(
                "{} is not an execs method",
                other.method()
            ))),
        }
    }
}

impl Service<RpcRequest> for Arc<ExecsService> {
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
