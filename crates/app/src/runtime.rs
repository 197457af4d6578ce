//! Actor runtime: runs long-lived subsystems side by side and tears them
//! all down together.
//!
//! An actor is a pair: an `execute` future that runs until it is done or
//! its [`CancellationToken`] fires, and an `interrupt` callback that nudges
//! it to stop. When any actor returns, every other actor is cancelled and
//! interrupted, and [`ActorRuntime::run`] waits for all of them before
//! reporting the first result.

mod module;
mod signal;
mod ticker;

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use hearth_domain::error::HubError;

pub use self::module::Module;
pub use self::signal::wait_for_signal;
pub use self::ticker::Ticker;

/// Why an actor, and therefore the whole group, stopped.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("received signal {0}")]
    Signal(&'static str),

    #[error("actor cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] HubError),

    #[error("actor panicked: {0}")]
    Panicked(String),
}

impl ActorError {
    /// Whether this is an orderly shutdown rather than a failure.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Signal(_) | Self::Cancelled)
    }

    fn from_join(err: JoinError) -> Self {
        if err.is_cancelled() {
            return Self::Cancelled;
        }
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        Self::Panicked(message)
    }
}

type Execute = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), ActorError>> + Send>;
type Interrupt = Box<dyn FnOnce(Option<&ActorError>) + Send>;

struct Actor {
    execute: Execute,
    interrupt: Interrupt,
}

/// A group of actors that live and die together.
#[derive(Default)]
pub struct ActorRuntime {
    actors: Vec<Actor>,
}

impl ActorRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor. Registration is only possible before
    /// [`run`](Self::run), which consumes the runtime.
    pub fn add<E, Fut, I>(&mut self, execute: E, interrupt: I)
    where
        E: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ActorError>> + Send + 'static,
        I: FnOnce(Option<&ActorError>) + Send + 'static,
    {
        self.actors.push(Actor {
            execute: Box::new(move |token| execute(token).boxed()),
            interrupt: Box::new(interrupt),
        });
    }

    /// Register the built-in actor that stops the group on Ctrl-C or
    /// SIGTERM.
    pub fn add_signal_handler(&mut self) {
        self.add(wait_for_signal, |_| {});
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Run every actor until the first one returns, then shut the rest down.
    ///
    /// Every actor gets a child of `parent`, so cancelling `parent` stops
    /// the group too. Only the first result is returned; the others are
    /// discarded once they come in.
    ///
    /// # Errors
    ///
    /// Returns the error of the first actor to finish, if it failed.
    pub async fn run(self, parent: &CancellationToken) -> Result<(), ActorError> {
        if self.actors.is_empty() {
            return Ok(());
        }

        let token = parent.child_token();
        let mut tasks = JoinSet::new();
        let mut interrupts = Vec::with_capacity(self.actors.len());
        for actor in self.actors {
            tasks.spawn((actor.execute)(token.clone()));
            interrupts.push(actor.interrupt);
        }

        let first = match tasks.join_next().await {
            Some(Ok(result)) => result,
            Some(Err(err)) => Err(ActorError::from_join(err)),
            None => Ok(()),
        };

        token.cancel();

        let cause = first.as_ref().err();
        for (index, interrupt) in interrupts.into_iter().enumerate() {
            if std::panic::catch_unwind(AssertUnwindSafe(|| interrupt(cause))).is_err() {
                tracing::error!(actor = index, "actor interrupt panicked");
            }
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Err(err)) if !err.is_shutdown() => {
                    tracing::debug!(error = %err, "actor failed during shutdown");
                }
                Err(err) if err.is_panic() => {
                    tracing::warn!("actor panicked during shutdown");
                }
                _ => {}
            }
        }

        first
    }
}
