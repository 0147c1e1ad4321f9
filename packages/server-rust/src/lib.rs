//! Campus server: call pipeline, rate limiting, token revocation and the
//! teachers, students and execs record services.

pub mod auth;
pub mod config;
pub mod server;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use config::{LogFormat, ServerConfig};
pub use server::RpcServer;
pub use storage::{open_store, DocumentStore, MemoryStore};

