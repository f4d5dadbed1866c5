//! Per-request event handed to middleware alongside the request.
//!
//! Lets middleware schedule background work that must not delay the
//! response (`wait_until`). Tasks start immediately on the tokio runtime;
//! `drain` awaits whatever was scheduled and logs failures.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct FetchEvent {
    source_page: Arc<str>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl FetchEvent {
    pub fn new(source_page: impl Into<String>) -> Self {
        Self {
            source_page: Arc::from(source_page.into()),
            pending: Arc::default(),
        }
    }

    /// Path the event was raised for.
    pub fn source_page(&self) -> &str {
        &self.source_page
    }

    /// Run `task` in the background, outside the middleware chain.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Number of background tasks scheduled and not yet drained.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Await every scheduled background task.
    pub async fn drain(&self) {
        let handles = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(source_page = %self.source_page, error = %e, "Background task failed");
            }
        }
    }
}

impl Default for FetchEvent {
    fn default() -> Self {
        Self::new("/")
    }
}
