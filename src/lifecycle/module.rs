//! Capabilities the shutdown coordinator consumes.
//!
//! The coordinator never owns the resources behind these traits. It only
//! calls into them during the shutdown sequence.

use std::future::Future;
use std::sync::Arc;
use async_trait::async_trait;

use crate::error::{BoxError, ShutdownError};
use crate::lifecycle::wait::Deadline;

/// A subsystem that can be asked to stop, bounded by a deadline.
///
/// Used both for registered modules and for the server handle, which is
/// always shut down last.
#[async_trait]
pub trait ShutdownModule: Send + Sync {
    /// Attempt a graceful stop. Implementations should finish by
    /// `deadline.instant()` and may watch [`Deadline::cancelled`] to stop early.
    async fn shutdown(&self, deadline: Deadline) -> Result<(), BoxError>;
}

#[async_trait]
impl<T: ShutdownModule + ?Sized> ShutdownModule for Arc<T> {
    async fn shutdown(&self, deadline: Deadline) -> Result<(), BoxError> {
        (**self).shutdown(deadline).await
    }
}

/// Stops the service from advertising itself as ready.
///
/// Called once, synchronously, at the start of shutdown. Must be fast.
pub trait ReadinessRevoker: Send + Sync {
    fn revoke(&self);
}

/// Sink for messages produced by the coordinator.
///
/// Both methods default to dropping the message.
pub trait ShutdownLogger: Send + Sync {
    fn info(&self, _message: &str) {}

    fn error(&self, _err: &ShutdownError) {}
}

/// [`ShutdownModule`] backed by a closure.
pub struct FnModule<F> {
    f: F,
}

/// Adapt a closure returning a future into a [`ShutdownModule`].
///
/// ```ignore
/// let flusher = module_fn(|_deadline| async { cache.flush().await.map_err(Into::into) });
/// ```
pub fn module_fn<F, Fut>(f: F) -> FnModule<F>
where
    F: Fn(Deadline) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    FnModule { f }
}

#[async_trait]
impl<F, Fut> ShutdownModule for FnModule<F>
where
    F: Fn(Deadline) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn shutdown(&self, deadline: Deadline) -> Result<(), BoxError> {
        (self.f)(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn closure_module_runs_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let module = module_fn(move |_deadline| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        module.shutdown(Deadline::after(Duration::from_secs(1))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closure_module_propagates_error() {
        let module = module_fn(|_deadline| async { Err::<(), BoxError>("disk full".into()) });
        let err = module
            .shutdown(Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn arc_wrapped_module_delegates() {
        let module: Arc<dyn ShutdownModule> = Arc::new(module_fn(|_deadline| async { Ok(()) }));
        let wrapped = Arc::new(module);
        assert!(wrapped.shutdown(Deadline::after(Duration::from_secs(1))).await.is_ok());
    }
}
