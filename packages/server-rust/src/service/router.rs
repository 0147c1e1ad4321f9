//! Call routing: dispatches `RpcRequest` to domain services by service name.

use std::collections::HashMap;
use std::task::{Context, Poll};

use tower::Service;

use super::operation::{RpcError, RpcFuture, RpcRequest, RpcResponse};

/// A boxed Tower service that handles calls for a single domain.
type BoxedService =
    Box<dyn Service<RpcRequest, Response = RpcResponse, Error = RpcError, Future = RpcFuture> + Send>;

// ---------------------------------------------------------------------------
// RpcRouter
// ---------------------------------------------------------------------------

/// Routes `RpcRequest` values to the domain service that owns the method.
///
/// Each registered service is a `tower::Service<RpcRequest>` keyed by its
/// service name (e.g. `"teachers"`). Calls for an unregistered service
/// return `RpcError::Internal`.
pub struct RpcRouter {
    services: HashMap<&'static str, BoxedService>,
}

impl RpcRouter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Registers a domain service under the given name.
    pub fn register<S>(&mut self, name: &'static str, service: S)
    where
        S: Service<RpcRequest, Response = RpcResponse, Error = RpcError> + Send + 'static,
        S::Future: Send + 'static,
    {
        self.services.insert(name, Box::new(ServiceWrapper(service)));
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

impl Default for RpcRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<RpcRequest> for RpcRouter {
    type Response = RpcResponse;
    type Error = RpcError;
    type Future = RpcFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The target is unknown until `call`, so every service must be ready.
        for svc in self.services.values_mut() {
            std::task::ready!(svc.poll_ready(cx))?;
        }
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let service_name = req.payload.service_name();
        match self.services.get_mut(service_name) {
            Some(svc) => svc.call(req),
            None => Box::pin(async move {
                Err(RpcError::internal(format!("no service registered for {service_name}")))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceWrapper
// ---------------------------------------------------------------------------

/// Boxes the future of a concrete domain service so it fits [`BoxedService`].
struct ServiceWrapper<S>(S);

impl<S> Service<RpcRequest> for ServiceWrapper<S>
where
    S: Service<RpcRequest, Response = RpcResponse, Error = RpcError> + Send,
    S::Future: Send + 'static,
{
    type Response = RpcResponse;
    type Error = RpcError;
    type Future = RpcFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        Box::pin(self.0.call(req))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::service::operation::{service_names, CallContext, Code, Request, Response};

    /// Answers every call with the number of the service that received it.
    #[derive(Clone)]
    struct StubService {
        id: u64,
    }

    impl Service<RpcRequest> for StubService {
        type Response = RpcResponse;
        type Error = RpcError;
        type Future = RpcFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: RpcRequest) -> Self::Future {
            let id = self.id;
            Box::pin(async move { Ok(RpcResponse::new(Response::StudentCount(id))) })
        }
    }

    fn req(payload: Request) -> RpcRequest {
        RpcRequest::new(CallContext::new(1), payload)
    }

    #[tokio::test]
    async fn routes_to_owning_service() {
        let mut router = RpcRouter::new();
        router.register(service_names::TEACHERS, StubService { id: 1 });
        router.register(service_names::STUDENTS, StubService { id: 2 });
        router.register(service_names::EXECS, StubService { id: 3 });

        let resp = ServiceExt::ready(&mut router)
            .await
            .unwrap()
            .call(req(Request::DeleteStudents(Vec::new())))
            .await
            .unwrap();
        assert_eq!(resp.payload, Response::StudentCount(2));

        let resp = ServiceExt::ready(&mut router)
            .await
            .unwrap()
            .call(req(Request::Logout))
            .await
            .unwrap();
        assert_eq!(resp.payload, Response::StudentCount(3));
    }

    #[tokio::test]
    async fn unregistered_service_is_internal() {
        let mut router = RpcRouter::new();
        router.register(service_names::TEACHERS, StubService { id: 1 });
        assert!(!router.is_registered(service_names::EXECS));

        let err = router.oneshot(req(Request::Logout)).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.to_string().contains("execs"));
    }
}
