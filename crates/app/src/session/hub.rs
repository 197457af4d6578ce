//! Registry of live sessions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use hearth_domain::error::HubError;
use hearth_domain::id::SessionId;

use super::Response;
use crate::ports::Broadcaster;

/// Outbound queues of every connected session, keyed by [`SessionId`].
///
/// Pushing never waits on a slow session: if its queue is full the frame
/// is dropped for that session only.
#[derive(Default)]
pub struct SessionHub {
    sessions: Mutex<HashMap<SessionId, mpsc::Sender<Response>>>,
}

impl SessionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: SessionId, outbound: mpsc::Sender<Response>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, outbound);
    }

    pub fn unregister(&self, id: SessionId) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, except: Option<SessionId>, frame: &Response) {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        for (id, outbound) in sessions.iter() {
            if Some(*id) == except {
                continue;
            }
            if let Err(err) = outbound.try_send(frame.clone()) {
                tracing::warn!(session = %id, topic = %frame.topic, error = %err, "dropping broadcast frame");
            }
        }
    }
}

impl Broadcaster for SessionHub {
    fn broadcast(&self, frame: Response) -> impl Future<Output = Result<(), HubError>> + Send {
        self.push(None, &frame);
        async { Ok(()) }
    }

    fn broadcast_others(
        &self,
        origin: SessionId,
        frame: Response,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        self.push(Some(origin), &frame);
        async { Ok(()) }
    }
}
