//! Session middlewares.

use std::sync::Arc;

use crate::ports::UnitOfWork;
use crate::scope::with_unit_of_work;

use super::{SessionHandler, SessionMiddleware, session_handler, session_middleware};

/// Log the request id and topic of every frame before handling it.
#[must_use]
pub fn session_logger<W: Send + 'static>() -> SessionMiddleware<W> {
    session_middleware(|next: SessionHandler<W>| {
        session_handler(move |session| {
            let next = Arc::clone(&next);
            tracing::info!(
                session = %session.id(),
                request_id = %session.request_id(),
                topic = %session.topic(),
                "session request"
            );
            next(session)
        })
    })
}

/// Run the handler inside a unit of work begun from `uow`, parked in the
/// session's scope.
#[must_use]
pub fn session_unit_of_work<U>(uow: Arc<U>) -> SessionMiddleware<U::Work>
where
    U: UnitOfWork + 'static,
{
    session_middleware(move |next: SessionHandler<U::Work>| {
        let uow = Arc::clone(&uow);
        session_handler(move |session| {
            let uow = Arc::clone(&uow);
            let next = Arc::clone(&next);
            async move {
                let scope = session.scope().clone();
                with_unit_of_work(uow.as_ref(), &scope, |_| next(session)).await
            }
        })
    })
}
