//! Bus middlewares.

use std::sync::Arc;

use crate::ports::UnitOfWork;
use crate::scope::with_unit_of_work;

use super::{Handler, Middleware, handler, middleware};

/// Log handler failures with the topic they happened on.
#[must_use]
pub fn error_logger<W: Send + 'static>() -> Middleware<W> {
    middleware(|next: Handler<W>| {
        handler(move |scope, event, publisher| {
            let next = Arc::clone(&next);
            async move {
                let topic = event.topic.clone();
                let result = next(scope, event, publisher).await;
                if let Err(err) = &result {
                    tracing::error!(topic = %topic, code = %err.code(), error = %err, "bus handler failed");
                }
                result
            }
        })
    })
}

/// Run the handler inside a unit of work begun from `uow`.
#[must_use]
pub fn unit_of_work<U>(uow: Arc<U>) -> Middleware<U::Work>
where
    U: UnitOfWork + 'static,
{
    middleware(move |next: Handler<U::Work>| {
        let uow = Arc::clone(&uow);
        handler(move |scope, event, publisher| {
            let uow = Arc::clone(&uow);
            let next = Arc::clone(&next);
            async move {
                with_unit_of_work(uow.as_ref(), &scope, |scope| next(scope, event, publisher)).await
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use hearth_domain::error::HubError;
    use hearth_domain::event::Event;

    use super::*;
    use crate::bus::Publisher;
    use crate::scope::Scope;
    use crate::scope::testing::CountingUnitOfWork;

    fn noop_publisher() -> Publisher {
        Publisher::from_fn(|_| async { Ok(()) })
    }

    #[tokio::test]
    async fn should_commit_when_handler_succeeds() {
        let uow = Arc::new(CountingUnitOfWork::default());
        let inner: Handler<Vec<&'static str>> = handler(|scope: Scope<Vec<&'static str>>, _, _| async move {
            scope.work().await?.push("write");
            Ok(())
        });
        let wrapped = unit_of_work(Arc::clone(&uow))(inner);

        wrapped(Scope::new(), Event::new("x"), noop_publisher()).await.unwrap();

        assert_eq!(uow.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn should_roll_back_when_handler_fails() {
        let uow = Arc::new(CountingUnitOfWork::default());
        let inner: Handler<Vec<&'static str>> =
            handler(|_, _, _| async { Err(HubError::Conflict("taken".into())) });
        let wrapped = error_logger()(unit_of_work(Arc::clone(&uow))(inner));

        let result = wrapped(Scope::new(), Event::new("x"), noop_publisher()).await;

        assert!(matches!(result, Err(HubError::Conflict(_))));
        assert_eq!(uow.counts(), (1, 0, 1));
    }
}
