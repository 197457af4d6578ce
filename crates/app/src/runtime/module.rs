//! Named actor group that always listens for termination signals.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::{ActorError, ActorRuntime};

/// A process-level [`ActorRuntime`] with lifecycle logging.
pub struct Module {
    name: String,
    runtime: ActorRuntime,
}

impl Module {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runtime: ActorRuntime::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an actor, see [`ActorRuntime::add`].
    pub fn add<E, Fut, I>(&mut self, execute: E, interrupt: I)
    where
        E: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ActorError>> + Send + 'static,
        I: FnOnce(Option<&ActorError>) + Send + 'static,
    {
        self.runtime.add(execute, interrupt);
    }

    /// Run until a signal arrives, `token` is cancelled or an actor stops.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the group unless it was an orderly
    /// shutdown (signal or cancellation).
    pub async fn run(mut self, token: &CancellationToken) -> Result<(), ActorError> {
        self.runtime.add_signal_handler();
        tracing::info!(module = %self.name, status = "starting");
        let result = self.runtime.run(token).await;
        match result {
            Err(err) if err.is_shutdown() => {
                tracing::info!(module = %self.name, status = "exiting", reason = %err);
                Ok(())
            }
            Err(err) => {
                tracing::error!(module = %self.name, status = "exiting", error = %err);
                Err(err)
            }
            Ok(()) => {
                tracing::info!(module = %self.name, status = "exiting");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hearth_domain::error::HubError;

    use super::*;

    #[tokio::test]
    async fn should_surface_actor_failure() {
        let mut module = Module::new("test");
        module.add(
            |_| async { Err(ActorError::Failed(HubError::internal("broken"))) },
            |_| {},
        );
        let result = module.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(ActorError::Failed(_))));
    }

    #[tokio::test]
    async fn should_exit_cleanly_when_token_cancelled() {
        let module = Module::new("test");
        let token = CancellationToken::new();
        token.cancel();
        assert!(module.run(&token).await.is_ok());
    }
}
