//! Unit-of-work port: begin, commit and roll back one atomic scope of
//! storage mutations.

use std::future::Future;

use hearth_domain::error::HubError;

/// Source of units of work, typically a database pool handing out
/// transactions.
///
/// Exactly one of [`commit`](Self::commit) or [`rollback`](Self::rollback)
/// is called for every successful [`begin`](Self::begin); both consume the
/// handle.
pub trait UnitOfWork: Send + Sync {
    type Work: Send + 'static;

    fn begin(&self) -> impl Future<Output = Result<Self::Work, HubError>> + Send;

    fn commit(&self, work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send;

    fn rollback(&self, work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: UnitOfWork> UnitOfWork for std::sync::Arc<T> {
    type Work = T::Work;

    fn begin(&self) -> impl Future<Output = Result<Self::Work, HubError>> + Send {
        (**self).begin()
    }

    fn commit(&self, work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).commit(work)
    }

    fn rollback(&self, work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).rollback(work)
    }
}
