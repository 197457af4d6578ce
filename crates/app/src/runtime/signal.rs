//! Actor that ends the group on an OS termination signal.

use tokio_util::sync::CancellationToken;

use hearth_domain::error::HubError;

use super::ActorError;

/// Block until Ctrl-C, SIGTERM (on unix) or cancellation.
///
/// # Errors
///
/// Returns [`ActorError::Signal`] naming the signal that arrived,
/// [`ActorError::Cancelled`] when the group is shutting down for another
/// reason, or [`ActorError::Failed`] if the handlers cannot be installed.
pub async fn wait_for_signal(token: CancellationToken) -> Result<(), ActorError> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|err| HubError::internal_from("failed to install SIGTERM handler", err))?;

    #[cfg(unix)]
    let terminated = terminate.recv();
    #[cfg(not(unix))]
    let terminated = std::future::pending::<Option<()>>();

    tokio::select! {
        () = token.cancelled() => Err(ActorError::Cancelled),
        result = tokio::signal::ctrl_c() => {
            result.map_err(|err| HubError::internal_from("failed to listen for ctrl-c", err))?;
            Err(ActorError::Signal("SIGINT"))
        }
        _ = terminated => Err(ActorError::Signal("SIGTERM")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_return_cancelled_when_token_fires() {
        let token = CancellationToken::new();
        token.cancel();
        let result = wait_for_signal(token).await;
        assert!(matches!(result, Err(ActorError::Cancelled)));
    }
}
