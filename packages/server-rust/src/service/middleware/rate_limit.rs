//! Rate-limit middleware.
//!
//! Counts every call against the caller's network address and rejects callers
//! over the ceiling with `RpcError::ResourceExhausted` before any inner stage runs.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::service::limiter::RateLimiter;
use crate::service::operation::{RpcError, RpcFuture, RpcRequest, RpcResponse};

// ---------------------------------------------------------------------------
// RateLimitLayer
// ---------------------------------------------------------------------------

/// Tower layer that applies a shared [`RateLimiter`] to every call.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// RateLimitService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> Service<RpcRequest> for RateLimitService<S>
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

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let Some(peer) = req.ctx.peer_addr else {
            tracing::warn!(call_id = req.ctx.call_id, "rejecting call without peer address");
            return Box::pin(async {
                Err(RpcError::unauthenticated("unable to determine client address"))
            });
        };

        let caller = peer.to_string();
        if self.limiter.check(&caller) {
            tracing::warn!(caller = %caller, method = req.method(), "rate limit exceeded");
            return Box::pin(async { Err(RpcError::ResourceExhausted("too many requests".into())) });
        }

        Box::pin(self.inner.call(req))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
