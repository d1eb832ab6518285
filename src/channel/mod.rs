// Single-value-or-error delivery for backend operations
use futures::stream::{self, Stream};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};

/// The eventual outcome of one backend operation.
///
/// Resolves exactly once: either the value or the backend's error. Awaiting
/// it yields `Result<T, BackendError>`. Dropping it, or calling [`cancel`],
/// only detaches the listener; the backend call keeps running.
///
/// [`cancel`]: ResultChannel::cancel
#[must_use = "a ResultChannel does nothing unless awaited"]
pub struct ResultChannel<T> {
    receiver: oneshot::Receiver<BackendResult<T>>,
}

impl<T: Send + 'static> ResultChannel<T> {
    /// Run `operation` on the runtime and deliver its outcome.
    ///
    /// Failures are logged with `name` first. An invalid-session failure
    /// also signs the backend out before the error is delivered, whether or
    /// not anyone is still listening.
    pub fn spawn<F>(name: &'static str, backend: Arc<dyn Backend>, operation: F) -> Self
    where
        F: Future<Output = BackendResult<T>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        tokio::spawn(async move {
            let result = operation.await;
            if let Err(err) = &result {
                report_failure(name, backend.as_ref(), err);
            }
            // Receiver dropped means the caller detached
            let _ = sender.send(result);
        });
        Self { receiver }
    }

    /// Channel that has already resolved
    pub fn ready(result: BackendResult<T>) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(result);
        Self { receiver }
    }

    /// Stop listening. The operation is not aborted.
    pub fn cancel(self) {}

    /// One-item stream view: the value, or the error, then the end
    pub fn into_stream(self) -> impl Stream<Item = BackendResult<T>> {
        stream::once(self)
    }
}

impl<T> Future for ResultChannel<T> {
    type Output = BackendResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(BackendError::other("Backend task ended without a result")))
        })
    }
}

fn report_failure(name: &str, backend: &dyn Backend, err: &BackendError) {
    tracing::error!(operation = name, code = err.code, "{} failed: {}", name, err.message);
    if err.is_invalid_session() {
        tracing::warn!("Session is no longer valid, signing out");
        backend.log_out();
    }
}
