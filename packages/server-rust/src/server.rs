//! Server assembly: wires shared state, background workers, domain services
//! and the interceptor pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use tower::{Service, ServiceExt};

use crate::auth::{Argon2Hasher, PasswordHasher, RevocationStore, RevocationSweep, TokenSigner};
use crate::config::ServerConfig;
use crate::service::domain::{ExecsService, StudentsService, TeachersService};
use crate::service::limiter::{RateLimitReset, RateLimiter};
use crate::service::middleware::{build_rpc_pipeline, Interceptors, RpcPipeline};
use crate::service::operation::{
    service_names, CallContext, Request, RpcError, RpcRequest, RpcResponse,
};
use crate::service::router::RpcRouter;
use crate::service::worker::BackgroundWorker;
use crate::storage::DocumentStore;

/// A running server: the composed pipeline plus the state it shares with the
/// background workers.
///
/// The transport feeds calls in through [`RpcServer::call`]. Workers run until
/// [`RpcServer::shutdown`] or until the server is dropped.
pub struct RpcServer {
    config: ServerConfig,
    pipeline: tokio::sync::Mutex<RpcPipeline>,
    limiter: Arc<RateLimiter>,
    revocations: Arc<RevocationStore>,
    signer: Arc<TokenSigner>,
    workers: parking_lot::Mutex<Vec<BackgroundWorker>>,
    next_call_id: AtomicU64,
}

impl RpcServer {
    /// Starts a server with the default Argon2 password hasher.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the token signer cannot be built from the config.
    pub fn start(config: ServerConfig, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        Self::start_with_hasher(config, store, Arc::new(Argon2Hasher::new()))
    }

    /// Starts a server with an explicit password hasher.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker interval is zero or the token signer
    /// cannot be built from the config.
    pub fn start_with_hasher(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> anyhow::Result<Self> {
        if config.rate_limit_reset_secs == 0 || config.revocation_sweep_secs == 0 {
            bail!("worker intervals must be at least one second");
        }
        let signer = Arc::new(
            TokenSigner::new(&config.jwt_secret, config.jwt_ttl())
                .context("failed to build token signer")?,
        );
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit,
            config.rate_limit_reset_interval(),
        ));
        let revocations = Arc::new(RevocationStore::new());

        let workers = vec![
            BackgroundWorker::start(
                RateLimitReset::new(limiter.clone()),
                config.rate_limit_reset_interval(),
            ),
            BackgroundWorker::start(
                RevocationSweep::new(revocations.clone()),
                config.revocation_sweep_interval(),
            ),
        ];

        let mut router = RpcRouter::new();
        router.register(
            service_names::TEACHERS,
            Arc::new(TeachersService::new(store.clone())),
        );
        router.register(
            service_names::STUDENTS,
            Arc::new(StudentsService::new(store.clone())),
        );
        router.register(
            service_names::EXECS,
            Arc::new(ExecsService::new(
                store,
                hasher,
                signer.clone(),
                revocations.clone(),
            )),
        );

        let interceptors = Interceptors {
            limiter: limiter.clone(),
            verifier: signer.clone(),
            revocations: revocations.clone(),
        };
        let pipeline = build_rpc_pipeline(router, &interceptors);

        tracing::info!(
            port = config.port,
            database = %config.database_name,
            rate_limit = config.rate_limit,
            "campus server started"
        );

        Ok(Self {
            config,
            pipeline: tokio::sync::Mutex::new(pipeline),
            limiter,
            revocations,
            signer,
            workers: parking_lot::Mutex::new(workers),
            next_call_id: AtomicU64::new(1),
        })
    }

    /// A fresh context with the next call id.
    #[must_use]
    pub fn context(&self) -> CallContext {
        CallContext::new(self.next_call_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Drives one call through the pipeline.
    ///
    /// A context without a deadline gets the configured default call timeout.
    ///
    /// # Errors
    ///
    /// Returns whatever error the first failing stage produced.
    pub async fn call(&self, ctx: CallContext, request: Request) -> Result<RpcResponse, RpcError> {
        let ctx = if ctx.deadline.is_none() {
            ctx.with_timeout(self.config.call_timeout())
        } else {
            ctx
        };

        // Only readiness and dispatch hold the lock; the call itself runs unlocked.
        let fut = {
            let mut pipeline = self.pipeline.lock().await;
            pipeline.ready().await?;
            pipeline.call(RpcRequest::new(ctx, request))
        };
        fut.await
    }

    /// Stops the background workers. Calls still go through afterwards, but
    /// rate-limit counters and revoked tokens are no longer cleaned up.
    pub async fn shutdown(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for mut worker in workers {
            worker.stop().await;
        }
        tracing::info!("campus server stopped");
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    #[must_use]
    pub fn revocations(&self) -> &Arc<RevocationStore> {
        &self.revocations
    }

    #[must_use]
    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }
}
