//! The reactive RPC seam over the DAW.
//!
//! The core never talks to a wire directly; it drives remote objects through
//! this trait. An implementation wraps whatever transport the deployment
//! uses (an injected scripting bridge, a socket, an in-memory fake in tests)
//! and is expected to serialize its own writes.
//!
//! `get`/`set`/`call` are plain request/response primitives. `listen`
//! registers a property listener and returns a [`ListenerHandle`] whose
//! teardown is itself asynchronous; handles are stored by key in the core's
//! subscription groups and invoked exactly once.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::value::RemoteValue;

/// Callback invoked with the new value whenever a listened property changes.
///
/// Callbacks must be cheap and non-blocking: they run inside the transport's
/// notification path. The core's callbacks only enqueue onto its worker.
pub type ListenerCallback = Arc<dyn Fn(RemoteValue) + Send + Sync>;

/// A remote object exposed by the DAW (song, track, mixer device, parameter,
/// clip, ...).
#[async_trait]
pub trait RemoteObject: Send + Sync {
    /// Opaque stable identifier. Two handles to the same remote entity
    /// return the same id for the lifetime of the session.
    fn id(&self) -> &str;

    /// Read a property.
    async fn get(&self, prop: &str) -> Result<RemoteValue>;

    /// Write a property. Fire-and-forget from the core's point of view; the
    /// confirming listener notification is the sole source of cache truth.
    async fn set(&self, prop: &str, value: RemoteValue) -> Result<()>;

    /// Invoke a method on the object.
    async fn call(&self, method: &str, args: Vec<RemoteValue>) -> Result<RemoteValue>;

    /// Register a property listener. Registration is asynchronous on real
    /// transports; the returned handle unregisters it.
    async fn listen(&self, prop: &str, callback: ListenerCallback) -> Result<ListenerHandle>;
}

/// One-shot asynchronous unsubscribe thunk returned by
/// [`RemoteObject::listen`].
pub struct ListenerHandle {
    unlisten: Option<Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send + Sync>>,
}

impl ListenerHandle {
    pub fn new<F>(unlisten: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self {
            unlisten: Some(Box::new(unlisten)),
        }
    }

    /// Handle that tears nothing down. Useful for transports whose listener
    /// registration is implicit.
    pub fn noop() -> Self {
        Self { unlisten: None }
    }

    /// Unregister the listener. Consumes the handle; calling it is
    /// idempotent by construction.
    pub async fn unlisten(mut self) -> Result<()> {
        match self.unlisten.take() {
            Some(f) => f().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("armed", &self.unlisten.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_unlisten_runs_thunk() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = ListenerHandle::new(move || {
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
        handle.unlisten().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_noop_handle() {
        assert!(ListenerHandle::noop().unlisten().await.is_ok());
    }
}
