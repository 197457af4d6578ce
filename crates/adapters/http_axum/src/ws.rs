//! `/ws` duplex sessions.
//!
//! Each socket becomes one session of the [`SessionRouter`]. Outbound
//! frames go through a bounded queue drained by a writer task, so replies
//! and broadcasts never wait on the socket from inside a handler. Inbound
//! text frames are dispatched one at a time, in arrival order.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use hearth_app::ports::{DeviceRepository, UnitOfWork};
use hearth_app::session::{self, SessionRouter};

use crate::state::AppState;

const OUTBOUND_CAPACITY: usize = 64;

/// `GET /ws`
pub async fn upgrade<R, U>(ws: WebSocketUpgrade, State(state): State<AppState<R, U>>) -> Response
where
    R: DeviceRepository<Work = U::Work> + 'static,
    U: UnitOfWork + 'static,
{
    ws.on_upgrade(move |socket: WebSocket| {
        let (sink, stream) = socket.split();
        serve(state.sessions, sink, stream)
    })
}

async fn serve<W, Si, St>(sessions: Arc<SessionRouter<W>>, sink: Si, mut stream: St)
where
    W: Send + 'static,
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let (outbound, frames) = mpsc::channel::<session::Response>(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(write_frames(sink, frames));

    if let Ok(id) = sessions.connect(outbound.clone()).await {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => sessions.dispatch(id, &outbound, text.as_str()).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(session = %id, error = %err, "websocket read failed");
                    break;
                }
            }
        }
        sessions.disconnect(id, &outbound).await;
    }

    drop(outbound);
    if let Err(err) = writer.await {
        tracing::warn!(error = %err, "websocket writer task failed");
    }
}

async fn write_frames<Si>(mut sink: Si, mut frames: mpsc::Receiver<session::Response>)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(frame) = frames.recv().await {
        let text = match frame.to_text() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(topic = %frame.topic, error = %err, "dropping session frame");
                continue;
            }
        };
        if let Err(err) = sink.send(Message::Text(text.into())).await {
            tracing::debug!(error = %err, "websocket write failed");
            return;
        }
    }
    if let Err(err) = sink.close().await {
        tracing::debug!(error = %err, "websocket close failed");
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc as duplex;
    use futures::stream;
    use serde_json::json;

    use hearth_app::session::{Session, SessionHub, session_handler};
    use hearth_domain::error::HubError;

    use super::*;

    fn router() -> SessionRouter<()> {
        let mut router = SessionRouter::new(Arc::new(SessionHub::new()));
        router.handle(
            "echo",
            session_handler(|session: Session<()>| async move {
                let data: serde_json::Value = session.bind()?;
                session.json(&data).await
            }),
            &[],
        );
        router
    }

    fn text(raw: &'static str) -> Result<Message, axum::Error> {
        Ok(Message::Text(raw.into()))
    }

    async fn replies(rx: duplex::UnboundedReceiver<Message>) -> Vec<session::Response> {
        rx.filter_map(|message| async move {
            match message {
                Message::Text(text) => Some(serde_json::from_str(text.as_str()).unwrap()),
                _ => None,
            }
        })
        .collect()
        .await
    }

    #[tokio::test]
    async fn should_answer_each_text_frame_in_order() {
        let sessions = Arc::new(router());
        let (tx, rx) = duplex::unbounded();
        let inbound = stream::iter(vec![
            text(r#"{"request_id":"a","topic":"echo","data":1}"#),
            Ok(Message::Ping(Vec::new().into())),
            text(r#"{"request_id":"b","topic":"echo","data":2}"#),
        ]);

        serve(Arc::clone(&sessions), tx, inbound).await;

        let replies = replies(rx).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].request_id, "a");
        assert_eq!(replies[0].result, Some(json!(1)));
        assert_eq!(replies[1].request_id, "b");
        assert!(sessions.hub().is_empty());
    }

    #[tokio::test]
    async fn should_stop_reading_when_close_frame_arrives() {
        let sessions = Arc::new(router());
        let (tx, rx) = duplex::unbounded();
        let inbound = stream::iter(vec![
            Ok(Message::Close(None)),
            text(r#"{"request_id":"late","topic":"echo"}"#),
        ]);

        serve(sessions, tx, inbound).await;

        assert!(replies(rx).await.is_empty());
    }

    #[tokio::test]
    async fn should_send_error_and_skip_frames_when_connect_hook_rejects() {
        let mut router = router();
        router.on_connect(session_handler(|_: Session<()>| async {
            Err(HubError::Invalid("not welcome".into()))
        }));
        let sessions = Arc::new(router);
        let (tx, rx) = duplex::unbounded();
        let inbound = stream::iter(vec![text(r#"{"request_id":"a","topic":"echo"}"#)]);

        serve(Arc::clone(&sessions), tx, inbound).await;

        let replies = replies(rx).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].topic, session::CONNECT);
        assert_eq!(replies[0].error.as_ref().unwrap().message, "not welcome");
        assert!(sessions.hub().is_empty());
    }
}
