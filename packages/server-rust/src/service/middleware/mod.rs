//! Tower middleware layers for the call pipeline.
//!
//! - [`rate_limit`]: Per-caller request ceiling
//! - [`timing`]: Call duration logging and the response-time header
//! - [`auth`]: Bearer-token authentication and revocation checks
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod auth;
pub mod pipeline;
pub mod rate_limit;
pub mod timing;

pub use auth::AuthLayer;
pub use pipeline::{build_rpc_pipeline, Interceptors, RpcPipeline};
pub use rate_limit::RateLimitLayer;
pub use timing::TimingLayer;
