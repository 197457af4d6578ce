//! Broadcaster port: push server-initiated frames to live sessions.

use std::future::Future;

use hearth_domain::error::HubError;
use hearth_domain::id::SessionId;

use crate::session::Response;

/// Fans a frame out to connected sessions.
pub trait Broadcaster: Send + Sync {
    /// Send `frame` to every live session.
    fn broadcast(&self, frame: Response) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Send `frame` to every live session except `origin`.
    fn broadcast_others(
        &self,
        origin: SessionId,
        frame: Response,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: Broadcaster> Broadcaster for std::sync::Arc<T> {
    fn broadcast(&self, frame: Response) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).broadcast(frame)
    }

    fn broadcast_others(
        &self,
        origin: SessionId,
        frame: Response,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).broadcast_others(origin, frame)
    }
}
