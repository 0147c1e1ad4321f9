//! Persistence layer.
//!
//! - [`DocumentStore`]: async document-store collaborator used by the handlers
//! - [`MemoryStore`]: in-process engine for development and tests
//! - [`open_store`]: picks the engine for a configured URL

pub mod factory;
pub mod memory;
pub mod store;

pub use factory::open_store;
pub use memory::MemoryStore;
pub use store::DocumentStore;
