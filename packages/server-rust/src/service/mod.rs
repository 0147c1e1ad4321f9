//! Call handling framework.
//!
//! 1. **Envelope** (`operation`): `RpcRequest` / `RpcResponse` and the error taxonomy
//! 2. **Middleware** (`middleware`): rate limiting, timing, authentication
//! 3. **Routing** (`router`): dispatch to domain services by service name
//! 4. **Domain services** (`domain`): teachers, students, execs
//! 5. **Background workers** (`worker`): periodic upkeep (rate-limit reset, revocation sweep)

pub mod deadline;
pub mod domain;
pub mod limiter;
pub mod middleware;
pub mod operation;
pub mod router;
pub mod worker;

pub use limiter::{RateLimitReset, RateLimiter};
pub use operation::{
    service_names, CallContext, Code, Principal, Request, Response, RpcError, RpcRequest,
    RpcResponse,
};
pub use router::RpcRouter;
pub use worker::{BackgroundRunnable, BackgroundWorker};
