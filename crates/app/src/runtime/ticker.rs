//! Periodic actor.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hearth_domain::error::HubError;

use super::ActorError;

/// Calls a function every `period` until cancelled.
///
/// A failing tick is logged and the ticker keeps going.
#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    name: &'static str,
    period: Duration,
}

impl Ticker {
    #[must_use]
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    /// Run `tick` on every period, the first one a full period after start.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Cancelled`] once `token` fires.
    pub async fn run<F, Fut>(self, token: CancellationToken, mut tick: F) -> Result<(), ActorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), HubError>>,
    {
        let start = tokio::time::Instant::now() + self.period;
        let mut interval = tokio::time::interval_at(start, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = token.cancelled() => return Err(ActorError::Cancelled),
                _ = interval.tick() => {
                    if let Err(err) = tick().await {
                        tracing::warn!(ticker = self.name, error = %err, "tick failed");
                    }
                }
            }
        }
    }
}
