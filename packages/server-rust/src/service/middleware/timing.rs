//! Response-time middleware.
//!
//! Measures each call from the moment it enters this stage, so failures raised
//! by inner stages (authentication included) are timed too. Successful
//! responses carry the elapsed time in the `x-response-time` header. A failed
//! call returns its [`RpcError`] untouched, with no header; its timing is only
//! logged.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{Code, RpcError, RpcFuture, RpcRequest, RpcResponse};

/// Response header carrying the measured duration.
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

// ---------------------------------------------------------------------------
// TimingLayer
// ---------------------------------------------------------------------------

/// Tower layer that times calls and records the outcome in a `tracing` span.
#[derive(Debug, Clone)]
pub struct TimingLayer;

impl<S> Layer<S> for TimingLayer {
    type Service = TimingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimingService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimingService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimingService<S> {
    inner: S,
}

impl<S> Service<RpcRequest> for TimingService<S>
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
        let method = req.method();
        let call_id = req.ctx.call_id;

        let span = info_span!(
            "rpc",
            method = method,
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            code = tracing::field::Empty,
        );

        let start = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let result = fut.await;
                let elapsed = start.elapsed();

                let code = match &result {
                    Ok(_) => Code::Ok,
                    Err(e) => e.code(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("code", code.as_str());

                tracing::info!(
                    method = method,
                    code = code.as_str(),
                    duration_ms = duration_ms,
                    "call complete"
                );

                result.map(|mut resp| {
                    resp.headers
                        .insert(RESPONSE_TIME_HEADER, format!("{elapsed:?}"));
                    resp
                })
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
