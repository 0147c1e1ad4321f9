//! Authentication middleware.
//!
//! Every method except the public ones must present `authorization: Bearer
//! <token>`. The token must verify and must not be revoked; on success the
//! caller's [`Principal`] is attached to the call context. All failures are
//! `RpcError::Unauthenticated`.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::auth::{CredentialVerifier, RevocationStore};
use crate::service::operation::{
    CallContext, Principal, RpcError, RpcFuture, RpcRequest, RpcResponse,
};

/// Methods callable without a session token.
pub const PUBLIC_METHODS: &[&str] = &["/campus.ExecsService/Login"];

const BEARER_PREFIX: &str = "Bearer ";

// ---------------------------------------------------------------------------
// AuthLayer
// ---------------------------------------------------------------------------

/// Tower layer that authenticates callers before they reach a handler.
#[derive(Clone)]
pub struct AuthLayer {
    verifier: Arc<dyn CredentialVerifier>,
    revocations: Arc<RevocationStore>,
}

impl AuthLayer {
    #[must_use]
    pub fn new(verifier: Arc<dyn CredentialVerifier>, revocations: Arc<RevocationStore>) -> Self {
        Self {
            verifier,
            revocations,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            verifier: self.verifier.clone(),
            revocations: self.revocations.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    verifier: Arc<dyn CredentialVerifier>,
    revocations: Arc<RevocationStore>,
}

impl<S> AuthService<S> {
    fn authenticate(&self, ctx: &CallContext) -> Result<Principal, RpcError> {
        let header = ctx
            .metadata
            .get("authorization")
            .ok_or_else(|| RpcError::unauthenticated("authorization token is required"))?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RpcError::unauthenticated("authorization must be a bearer token"))?;

        if self.revocations.is_revoked(token) {
            return Err(RpcError::unauthenticated("token has been revoked"));
        }

        let claims = self.verifier.verify(token).map_err(|e| {
            tracing::debug!(call_id = ctx.call_id, error = %e, "token rejected");
            RpcError::unauthenticated("invalid or expired token")
        })?;

        Ok(Principal {
            expires_at: claims.expires_at(),
            id: claims.uid,
            username: claims.user,
            role: claims.role,
            token: token.to_string(),
        })
    }
}

impl<S> Service<RpcRequest> for AuthService<S>
where
    S: Service<RpcRequest, Response = RpcResponse, Error = RpcError> + Send,
    S::Future: Send + 'static,
{
    type Response = RpcResponse;
    type Error = RpcError;
    type Future = RpcFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: RpcRequest) -> Self::Future {
        if PUBLIC_METHODS.contains(&req.method()) {
            return Box::pin(self.inner.call(req));
        }

        match self.authenticate(&req.ctx) {
            Ok(principal) => {
                req.ctx.principal = Some(principal);
                Box::pin(self.inner.call(req))
            }
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use campus_core::ExecLoginRequest;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::TokenSigner;
    use crate::service::operation::{Code, Request, Response};

    /// Echoes the authenticated username back as a confirmation.
    #[derive(Clone)]
    struct WhoAmI;

    impl Service<RpcRequest> for WhoAmI {
        type Response = RpcResponse;
        type Error = RpcError;
        type Future = RpcFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: RpcRequest) -> Self::Future {
            let authenticated = req
                .ctx
                .principal
                .as_ref()
                .is_some_and(|p| p.username == "root");
            Box::pin(async move { Ok(RpcResponse::new(Response::Confirmation(authenticated))) })
        }
    }

    fn setup() -> (Arc<TokenSigner>, Arc<RevocationStore>, AuthService<WhoAmI>) {
        let signer = Arc::new(TokenSigner::new("secret", Duration::from_secs(600)).unwrap());
        let revocations = Arc::new(RevocationStore::new());
        let svc = AuthLayer::new(signer.clone(), revocations.clone()).layer(WhoAmI);
        (signer, revocations, svc)
    }

    fn logout(ctx: CallContext) -> RpcRequest {
        RpcRequest::new(ctx, Request::Logout)
    }

    #[tokio::test]
    async fn valid_token_attaches_principal() {
        let (signer, _, svc) = setup();
        let token = signer.sign("id-1", "root", "admin").unwrap();

        let resp = svc
            .oneshot(logout(CallContext::new(1).with_bearer(&token)))
            .await
            .unwrap();
        assert_eq!(resp.payload, Response::Confirmation(true));
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_rejected() {
        let (_, _, svc) = setup();
        let err = svc
            .clone()
            .oneshot(logout(CallContext::new(1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let ctx = CallContext::new(1).with_metadata("authorization", "Basic abc");
        let err = svc.oneshot(logout(ctx)).await.unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let (signer, revocations, svc) = setup();
        let token = signer.sign("id-1", "root", "admin").unwrap();
        revocations.add(token.clone(), SystemTime::now() + Duration::from_secs(600));

        let err = svc
            .oneshot(logout(CallContext::new(1).with_bearer(&token)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unauthenticated: token has been revoked");
    }

    #[tokio::test]
    async fn forged_token_is_rejected_without_leaking_it() {
        let (_, _, svc) = setup();
        let err = svc
            .oneshot(logout(CallContext::new(1).with_bearer("forged.token.value")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
        assert!(!err.to_string().contains("forged"));
    }

    #[tokio::test]
    async fn login_is_public() {
        let (_, _, svc) = setup();
        let req = RpcRequest::new(
            CallContext::new(1),
            Request::Login(ExecLoginRequest::default()),
        );
        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.payload, Response::Confirmation(false));
    }
}
