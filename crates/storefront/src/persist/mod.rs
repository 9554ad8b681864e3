//! Durable key-value storage for shopper state.
//!
//! The cart survives restarts by writing its JSON form into a
//! [`KeyValueStore`]. Storage is best-effort: callers log failures and keep
//! their in-memory state as the source of truth.
//!
//! Writes are coalesced with a [`Debouncer`] so a burst of cart mutations
//! results in a single write of the final state. Store calls may block, so
//! inside a Tokio runtime they run on the blocking pool (see [`offload`]).

mod debounce;
mod file;
mod memory;

pub use debounce::Debouncer;
pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Run a blocking storage call off the async worker threads.
///
/// Inside a Tokio runtime `action` runs on the blocking pool and its handle is
/// returned. Outside one it runs inline and `None` is returned.
pub fn offload<F>(action: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    match Handle::try_current() {
        Ok(runtime) => Some(runtime.spawn_blocking(action)),
        Err(_) => {
            action();
            None
        }
    }
}

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The key cannot be mapped onto the backing medium.
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    /// The store is unusable (e.g. a poisoned lock).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous, fallible string storage keyed by path-like names
/// (`shopper/{id}/cart`).
pub trait KeyValueStore: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
