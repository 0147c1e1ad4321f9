//! Domain services, one per RPC service.
//!
//! Each service implements `tower::Service<RpcRequest>` on `Arc<Self>` and is
//! registered with the [`RpcRouter`](crate::service::router::RpcRouter) under
//! its service name. Shared persistence helpers live in [`crud`].

pub mod crud;
pub mod execs;
pub mod students;
pub mod teachers;

pub use crud::Records;
pub use execs::ExecsService;
pub use students::StudentsService;
pub use teachers::TeachersService;
