//! Scoped unit of work.
//!
//! Every HTTP request, bus message and session message gets its own
//! [`Scope`]. [`with_unit_of_work`] begins a unit of work, parks it in the
//! scope for the duration of the wrapped call, and then commits or rolls it
//! back. Code further down reaches the handle through [`Scope::work`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use hearth_domain::error::HubError;

use crate::ports::UnitOfWork;

/// Per-request slot holding at most one live unit of work.
pub struct Scope<W> {
    slot: Arc<Mutex<Option<W>>>,
}

impl<W> Clone for Scope<W> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<W> Default for Scope<W> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<W> std::fmt::Debug for Scope<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").finish_non_exhaustive()
    }
}

impl<W> Scope<W> {
    /// A scope with no unit of work yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the live unit of work.
    ///
    /// The guard is exclusive: hold it for the duration of one repository
    /// call, not across unrelated awaits.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] when called outside
    /// [`with_unit_of_work`].
    pub async fn work(&self) -> Result<MappedMutexGuard<'_, W>, HubError> {
        let guard = self.slot.lock().await;
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| HubError::internal("no unit of work in scope"))
    }

    /// Whether a unit of work is currently installed.
    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    async fn install(&self, work: W) -> Result<(), W> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Err(work);
        }
        *slot = Some(work);
        Ok(())
    }

    async fn take(&self) -> Option<W> {
        self.slot.lock().await.take()
    }
}

/// Run `f` inside a fresh unit of work.
///
/// Exactly one begin and exactly one terminal action happen per call:
/// - `f` panics: roll back, then resume the panic
/// - `f` returns an error: roll back, return that error
/// - `f` succeeds: commit, return the commit error if there is one
///
/// # Errors
///
/// Returns the error of `f`, or a [`HubError`] from begin/commit converted
/// into `E`.
pub async fn with_unit_of_work<U, F, Fut, T, E>(
    uow: &U,
    scope: &Scope<U::Work>,
    f: F,
) -> Result<T, E>
where
    U: UnitOfWork,
    F: FnOnce(Scope<U::Work>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<HubError>,
{
    let work = uow.begin().await?;
    if let Err(work) = scope.install(work).await {
        // The scope already has a unit of work; leave it alone.
        if let Err(err) = uow.rollback(work).await {
            tracing::warn!(error = %err, "failed to roll back unused unit of work");
        }
        return Err(HubError::internal("a unit of work is already active in this scope").into());
    }

    let outcome = AssertUnwindSafe(f(scope.clone())).catch_unwind().await;

    let Some(work) = scope.take().await else {
        return match outcome {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(_) => Err(HubError::internal("unit of work vanished from scope").into()),
        };
    };

    match outcome {
        Err(panic) => {
            if let Err(err) = uow.rollback(work).await {
                tracing::error!(error = %err, "failed to roll back after panic");
            }
            std::panic::resume_unwind(panic)
        }
        Ok(Err(err)) => {
            if let Err(rollback) = uow.rollback(work).await {
                tracing::error!(error = %rollback, "failed to roll back unit of work");
            }
            Err(err)
        }
        Ok(Ok(value)) => {
            uow.commit(work).await?;
            Ok(value)
        }
    }
}
