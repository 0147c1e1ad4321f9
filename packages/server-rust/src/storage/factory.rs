//! Factory for opening the configured [`DocumentStore`].

use std::sync::Arc;

use anyhow::bail;

use super::memory::MemoryStore;
use super::store::DocumentStore;

/// URL scheme served by [`MemoryStore`].
pub const MEMORY_SCHEME: &str = "memory://";

/// Opens the store named by `database_url`.
///
/// Only `memory://` is served in-process; any other scheme belongs to an
/// external driver and is rejected.
///
/// # Errors
///
/// Returns an error if the URL scheme has no in-process backend.
pub fn open_store(database_url: &str) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if database_url.starts_with(MEMORY_SCHEME) {
        tracing::info!(url = database_url, "opened in-memory document store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let scheme = database_url
        .split_once("://")
        .map_or(database_url, |(scheme, _)| scheme);
    bail!("no document store backend for scheme {scheme:?}")
}
