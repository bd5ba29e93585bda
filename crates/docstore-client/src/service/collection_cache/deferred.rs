use std::future::Future;

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tokio::task::JoinError;

/// A computation that runs at most once and reports its outcome to every
/// observer.
///
/// The computation is spawned onto the tokio runtime when the computation is
/// first observed. Dropping observers never cancels it: the spawned task runs
/// to completion and its result stays available to later observers.
pub struct DeferredComputation<T, E> {
    inner: Shared<BoxFuture<'static, Result<T, E>>>,
}

impl<T, E> DeferredComputation<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new<Fut>(computation: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = async move {
            tokio::spawn(computation)
                .await
                .unwrap_or_else(|e| Err(E::from(e)))
        }
        .boxed()
        .shared();
        Self { inner }
    }

    /// An already completed computation holding `value`.
    pub fn resolved(value: T) -> Self {
        let inner = futures::future::ready(Ok(value)).boxed().shared();
        // Drive the shared future once so the outcome is visible to `peek`.
        let _ = inner.clone().now_or_never();
        Self { inner }
    }

    /// Waits for the outcome, starting the computation if necessary.
    pub async fn get(&self) -> Result<T, E> {
        self.inner.clone().await
    }
}

impl<T, E> DeferredComputation<T, E>
where
    T: Clone,
    E: Clone,
{
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.peek().is_none()
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self.inner.peek(), Some(Ok(_)))
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.inner.peek(), Some(Err(_)))
    }

    /// Whether both handles observe the same computation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T, E> Clone for DeferredComputation<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for DeferredComputation<T, E>
where
    T: Clone,
    E: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_pending() {
            "pending"
        } else if self.is_succeeded() {
            "succeeded"
        } else {
            "failed"
        };
        f.debug_struct("DeferredComputation")
            .field("state", &state)
            .finish()
    }
}
