//! Pipeline composition: combines the interceptor layers into a single service stack.

use std::sync::Arc;

use tower::util::BoxService;
use tower::ServiceBuilder;

use super::auth::AuthLayer;
use super::rate_limit::RateLimitLayer;
use super::timing::TimingLayer;
use crate::auth::{CredentialVerifier, RevocationStore};
use crate::service::limiter::RateLimiter;
use crate::service::operation::{RpcError, RpcRequest, RpcResponse};
use crate::service::router::RpcRouter;

/// The fully composed, type-erased pipeline.
pub type RpcPipeline = BoxService<RpcRequest, RpcResponse, RpcError>;

/// Shared state the interceptor stages consult.
#[derive(Clone)]
pub struct Interceptors {
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub revocations: Arc<RevocationStore>,
}

/// Build the call pipeline by wrapping the `RpcRouter` with the interceptor layers.
///
/// Layer order (outermost to innermost):
/// 1. `RateLimitLayer` -- reject callers over the ceiling before any other work
/// 2. `TimingLayer` -- time the call, authentication failures included
/// 3. `AuthLayer` -- verify the bearer token and attach the principal
///
/// Any stage may short-circuit with an error; errors pass outward unchanged.
#[must_use]
pub fn build_rpc_pipeline(router: RpcRouter, interceptors: &Interceptors) -> RpcPipeline {
    let svc = ServiceBuilder::new()
        .layer(RateLimitLayer::new(interceptors.limiter.clone()))
        .layer(TimingLayer)
        .layer(AuthLayer::new(
            interceptors.verifier.clone(),
            interceptors.revocations.clone(),
        ))
        .service(router);
    BoxService::new(svc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tower::{Service, ServiceExt};

    use super::*;
    use crate::auth::TokenSigner;
    use crate::service::middleware::timing::RESPONSE_TIME_HEADER;
    use crate::service::operation::{
        service_names, CallContext, Code, Request, Response, RpcFuture,
    };

    struct StubService;

    impl Service<RpcRequest> for StubService {
        type Response = RpcResponse;
        type Error = RpcError;
        type Future = RpcFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: RpcRequest) -> Self::Future {
            Box::pin(async { Ok(RpcResponse::new(Response::LoggedOut)) })
        }
    }

    fn interceptors(limit: u32) -> (Arc<TokenSigner>, Interceptors) {
        let signer = Arc::new(TokenSigner::new("secret", Duration::from_secs(600)).unwrap());
        let interceptors = Interceptors {
            limiter: Arc::new(RateLimiter::new(limit, Duration::from_secs(60))),
            verifier: signer.clone(),
            revocations: Arc::new(RevocationStore::new()),
        };
        (signer, interceptors)
    }

    fn pipeline(interceptors: &Interceptors) -> RpcPipeline {
        let mut router = RpcRouter::new();
        router.register(service_names::EXECS, StubService);
        build_rpc_pipeline(router, interceptors)
    }

    fn ctx() -> CallContext {
        CallContext::new(7).with_peer("127.0.0.1:9000".parse().unwrap())
    }

    #[tokio::test]
    async fn authenticated_call_passes_through_all_layers() {
        let (signer, interceptors) = interceptors(5);
        let token = signer.sign("id", "root", "admin").unwrap();

        let req = RpcRequest::new(ctx().with_bearer(&token), Request::Logout);
        let resp = pipeline(&interceptors).oneshot(req).await.unwrap();
        assert_eq!(resp.payload, Response::LoggedOut);
        assert!(resp.headers.get(RESPONSE_TIME_HEADER).is_some());
    }

    #[tokio::test]
    async fn over_limit_caller_gets_resource_exhausted_not_unauthenticated() {
        let (_, interceptors) = interceptors(1);

        let first = pipeline(&interceptors)
            .oneshot(RpcRequest::new(ctx(), Request::Logout))
            .await
            .unwrap_err();
        assert_eq!(first.code(), Code::Unauthenticated);

        let second = pipeline(&interceptors)
            .oneshot(RpcRequest::new(ctx(), Request::Logout))
            .await
            .unwrap_err();
        assert_eq!(second.code(), Code::ResourceExhausted);
    }
}
