//! Handles for background loops.

use tokio::task::JoinHandle;

/// A spawned background loop.
///
/// The loop is aborted when [`stop`](Self::stop) is called or the handle is
/// dropped, so a loop never outlives whoever started it.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            handle: Some(tokio::spawn(future)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Abort the loop and wait for it to wind down.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // Cancellation is the expected outcome here.
            let _ = handle.await;
            tracing::debug!(task = self.name, "Background task stopped");
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
