//! Session router: request/response routing over live duplex sessions.
//!
//! Works like the [`MessageBus`](crate::bus::MessageBus) but the topic comes
//! from each inbound frame, matching is exact and first-match, and every
//! reply echoes the frame's `request_id`. Connect and disconnect hooks run
//! as chains that stop at the first failure and report it to the session.

mod frame;
mod hub;
mod middleware;

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use hearth_domain::error::{ErrorCode, HubError};
use hearth_domain::id::SessionId;

use crate::ports::Broadcaster;
use crate::scope::Scope;

pub use self::frame::{BAD_REQUEST, ErrorBody, Request, Response};
pub use self::hub::SessionHub;
pub use self::middleware::{session_logger, session_unit_of_work};

/// Topic carried by the session passed to connect hooks.
pub const CONNECT: &str = "connect";
/// Topic carried by the session passed to disconnect hooks.
pub const DISCONNECT: &str = "disconnect";

/// One inbound frame in flight, with the means to answer it.
pub struct Session<W> {
    id: SessionId,
    request_id: String,
    topic: String,
    data: serde_json::Value,
    scope: Scope<W>,
    outbound: mpsc::Sender<Response>,
    hub: Arc<SessionHub>,
}

impl<W> Clone for Session<W> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            request_id: self.request_id.clone(),
            topic: self.topic.clone(),
            data: self.data.clone(),
            scope: self.scope.clone(),
            outbound: self.outbound.clone(),
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<W> Session<W> {
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Scope of this frame, holding its unit of work once one is begun.
    #[must_use]
    pub fn scope(&self) -> &Scope<W> {
        &self.scope
    }

    /// Decode the frame's `data`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] if `data` does not decode as `T`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, HubError> {
        serde_json::from_value(self.data.clone())
            .map_err(|err| HubError::Invalid(format!("could not parse request data: {err}")))
    }

    /// Reply with `result`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if `result` cannot be serialized or the
    /// session is gone.
    pub async fn json<T: Serialize + ?Sized>(&self, result: &T) -> Result<(), HubError> {
        let value = serde_json::to_value(result)
            .map_err(|err| HubError::internal_from("failed to encode response", err))?;
        self.send(Response::result(&self.request_id, &self.topic, value)).await
    }

    /// Reply without a result.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if the session is gone.
    pub async fn no_content(&self) -> Result<(), HubError> {
        self.send(Response::empty(&self.request_id, &self.topic)).await
    }

    /// Reply with an error frame.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if the session is gone.
    pub async fn error(&self, err: &HubError) -> Result<(), HubError> {
        self.send(Response::error(&self.request_id, &self.topic, ErrorBody::from(err)))
            .await
    }

    /// Push `data` on `topic` to every other live session.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if `data` cannot be serialized.
    pub async fn broadcast<T: Serialize + ?Sized>(&self, topic: &str, data: &T) -> Result<(), HubError> {
        let value = serde_json::to_value(data)
            .map_err(|err| HubError::internal_from("failed to encode broadcast", err))?;
        self.hub
            .broadcast_others(self.id, Response::broadcast(topic, value))
            .await
    }

    /// Send `err` as an error frame, logging when the session is gone.
    async fn report(&self, err: &HubError) {
        if let Err(send_err) = self.error(err).await {
            tracing::debug!(session = %self.id, topic = %self.topic, error = %send_err, "error frame not delivered");
        }
    }

    async fn send(&self, frame: Response) -> Result<(), HubError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| HubError::internal("session is closed"))
    }
}

/// A session handler.
pub type SessionHandler<W> =
    Arc<dyn Fn(Session<W>) -> BoxFuture<'static, Result<(), HubError>> + Send + Sync>;

/// Wraps a [`SessionHandler`] with cross-cutting behaviour.
pub type SessionMiddleware<W> = Arc<dyn Fn(SessionHandler<W>) -> SessionHandler<W> + Send + Sync>;

/// Turn an async function into a [`SessionHandler`].
pub fn session_handler<W, F, Fut>(f: F) -> SessionHandler<W>
where
    F: Fn(Session<W>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HubError>> + Send + 'static,
{
    Arc::new(move |session| f(session).boxed())
}

/// Turn a handler-wrapping function into a [`SessionMiddleware`].
pub fn session_middleware<W, F>(f: F) -> SessionMiddleware<W>
where
    F: Fn(SessionHandler<W>) -> SessionHandler<W> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Routes inbound session frames to handlers by exact topic.
pub struct SessionRouter<W> {
    hub: Arc<SessionHub>,
    layers: Vec<SessionMiddleware<W>>,
    // Each handler already wrapped in its own middlewares and the layers.
    routes: Vec<(String, SessionHandler<W>)>,
    on_connect: Vec<SessionHandler<W>>,
    on_disconnect: Vec<SessionHandler<W>>,
}

impl<W: Send + 'static> SessionRouter<W> {
    #[must_use]
    pub fn new(hub: Arc<SessionHub>) -> Self {
        Self {
            hub,
            layers: Vec::new(),
            routes: Vec::new(),
            on_connect: Vec::new(),
            on_disconnect: Vec::new(),
        }
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    /// Add a middleware around every route. Router-level middlewares wrap
    /// outside the per-route ones; the last added is outermost.
    pub fn layer(&mut self, middleware: SessionMiddleware<W>) {
        for (_, handler) in &mut self.routes {
            *handler = middleware(Arc::clone(handler));
        }
        self.layers.push(middleware);
    }

    /// Register `handler` for frames whose topic equals `topic`.
    ///
    /// Middlewares wrap in the order given, the last one outermost. When a
    /// topic is registered twice the first registration wins.
    pub fn handle(&mut self, topic: &str, handler: SessionHandler<W>, middlewares: &[SessionMiddleware<W>]) {
        let handler = middlewares
            .iter()
            .chain(&self.layers)
            .fold(handler, |next, middleware| middleware(next));
        self.routes.push((topic.to_owned(), handler));
    }

    pub fn on_connect(&mut self, hook: SessionHandler<W>) {
        self.on_connect.push(hook);
    }

    pub fn on_disconnect(&mut self, hook: SessionHandler<W>) {
        self.on_disconnect.push(hook);
    }

    /// Topics with a registered handler, in registration order.
    #[must_use]
    pub fn topics(&self) -> Vec<&str> {
        self.routes.iter().map(|(topic, _)| topic.as_str()).collect()
    }

    fn session(
        &self,
        id: SessionId,
        outbound: &mpsc::Sender<Response>,
        request: Request,
    ) -> Session<W> {
        Session {
            id,
            request_id: request.request_id,
            topic: request.topic,
            data: request.data,
            scope: Scope::new(),
            outbound: outbound.clone(),
            hub: Arc::clone(&self.hub),
        }
    }

    async fn run_hooks(&self, hooks: &[SessionHandler<W>], session: &Session<W>) -> Result<(), HubError> {
        for hook in hooks {
            hook(session.clone()).await?;
        }
        Ok(())
    }

    /// Register a new session and run the connect hooks.
    ///
    /// # Errors
    ///
    /// When a hook fails, the failure is sent to the session as an error
    /// frame, the session is unregistered, and the error is returned so the
    /// caller can close the connection.
    pub async fn connect(&self, outbound: mpsc::Sender<Response>) -> Result<SessionId, HubError> {
        let id = SessionId::new();
        self.hub.register(id, outbound.clone());
        let session = self.session(id, &outbound, lifecycle(CONNECT));
        if let Err(err) = self.run_hooks(&self.on_connect, &session).await {
            tracing::info!(session = %id, error = %err, "connect hook rejected session");
            session.report(&err).await;
            self.hub.unregister(id);
            return Err(err);
        }
        tracing::debug!(session = %id, "session connected");
        Ok(id)
    }

    /// Run the disconnect hooks and unregister the session.
    pub async fn disconnect(&self, id: SessionId, outbound: &mpsc::Sender<Response>) {
        let session = self.session(id, outbound, lifecycle(DISCONNECT));
        if let Err(err) = self.run_hooks(&self.on_disconnect, &session).await {
            tracing::info!(session = %id, error = %err, "disconnect hook failed");
            session.report(&err).await;
        }
        self.hub.unregister(id);
        tracing::debug!(session = %id, "session disconnected");
    }

    /// Handle one raw inbound frame from session `id`, answering on
    /// `outbound`.
    pub async fn dispatch(&self, id: SessionId, outbound: &mpsc::Sender<Response>, raw: &str) {
        let request: Request = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(err) => {
                let body = ErrorBody {
                    code: BAD_REQUEST.to_owned(),
                    message: format!("failed to parse request: {err}"),
                };
                let request_id = serde_json::from_str::<serde_json::Value>(raw)
                    .ok()
                    .and_then(|value| value.get("request_id")?.as_str().map(ToOwned::to_owned))
                    .unwrap_or_default();
                if outbound.send(Response::error(&request_id, "", body)).await.is_err() {
                    tracing::debug!(session = %id, "session closed before bad request reply");
                }
                return;
            }
        };

        let session = self.session(id, outbound, request);
        let Some(handler) = self
            .routes
            .iter()
            .find(|(topic, _)| topic == session.topic())
            .map(|(_, handler)| Arc::clone(handler))
        else {
            let err = HubError::NotFound(format!("no handler for topic ({})", session.topic()));
            session.report(&err).await;
            return;
        };

        if let Err(err) = handler(session.clone()).await {
            if err.is(ErrorCode::Internal) {
                tracing::error!(session = %id, topic = %session.topic(), error = %err, "session handler failed");
            }
            session.report(&err).await;
        }
    }
}

fn lifecycle(topic: &str) -> Request {
    Request {
        request_id: String::new(),
        topic: topic.to_owned(),
        data: serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn router() -> SessionRouter<()> {
        SessionRouter::new(Arc::new(SessionHub::new()))
    }

    fn echo() -> SessionHandler<()> {
        session_handler(|session: Session<()>| async move {
            let data: serde_json::Value = session.bind()?;
            session.json(&data).await
        })
    }

    fn tagging(trace: &Trace, tag: &'static str) -> SessionMiddleware<()> {
        let trace = Arc::clone(trace);
        session_middleware(move |next: SessionHandler<()>| {
            let trace = Arc::clone(&trace);
            session_handler(move |session| {
                let trace = Arc::clone(&trace);
                let next = Arc::clone(&next);
                async move {
                    trace.lock().unwrap().push(format!("{tag}>"));
                    let result = next(session).await;
                    trace.lock().unwrap().push(format!("<{tag}"));
                    result
                }
            })
        })
    }

    fn failing_hook(trace: &Trace, label: &'static str, fail: bool) -> SessionHandler<()> {
        let trace = Arc::clone(trace);
        session_handler(move |_| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push(label.to_owned());
                if fail {
                    Err(HubError::Invalid(format!("{label} refused")))
                } else {
                    Ok(())
                }
            }
        })
    }

    #[tokio::test]
    async fn should_echo_request_id_in_reply() {
        let mut router = router();
        router.handle("echo", echo(), &[]);
        let (tx, mut rx) = mpsc::channel(4);

        router
            .dispatch(SessionId::new(), &tx, r#"{"request_id":"abc","topic":"echo","data":{"n":1}}"#)
            .await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.request_id, "abc");
        assert_eq!(reply.topic, "echo");
        assert_eq!(reply.result, Some(json!({"n": 1})));
        assert!(reply.error.is_none());
    }

    #[tokio::test]
    async fn should_reply_bad_request_when_frame_is_malformed() {
        let router = router();
        let (tx, mut rx) = mpsc::channel(4);

        router.dispatch(SessionId::new(), &tx, "{not json").await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.error.unwrap().code, BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_keep_request_id_when_frame_lacks_topic() {
        let router = router();
        let (tx, mut rx) = mpsc::channel(4);

        router.dispatch(SessionId::new(), &tx, r#"{"request_id":"r9"}"#).await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.request_id, "r9");
        assert_eq!(reply.error.unwrap().code, BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_reply_not_found_when_topic_unknown() {
        let router = router();
        let (tx, mut rx) = mpsc::channel(4);

        router
            .dispatch(SessionId::new(), &tx, r#"{"request_id":"r1","topic":"nope"}"#)
            .await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.request_id, "r1");
        assert_eq!(reply.error.unwrap().code, "not_found");
    }

    #[tokio::test]
    async fn should_use_first_registered_handler_for_a_topic() {
        let mut router = router();
        router.handle("dup", session_handler(|s: Session<()>| async move { s.json("first").await }), &[]);
        router.handle("dup", session_handler(|s: Session<()>| async move { s.json("second").await }), &[]);
        let (tx, mut rx) = mpsc::channel(4);

        router
            .dispatch(SessionId::new(), &tx, r#"{"request_id":"r","topic":"dup"}"#)
            .await;

        assert_eq!(rx.recv().await.unwrap().result, Some(json!("first")));
    }

    #[tokio::test]
    async fn should_send_error_frame_when_handler_fails() {
        let mut router = router();
        router.handle(
            "fail",
            session_handler(|_: Session<()>| async { Err(HubError::Conflict("identifier taken".into())) }),
            &[],
        );
        let (tx, mut rx) = mpsc::channel(4);

        router
            .dispatch(SessionId::new(), &tx, r#"{"request_id":"r5","topic":"fail"}"#)
            .await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.request_id, "r5");
        assert_eq!(
            reply.error,
            Some(ErrorBody {
                code: "conflict".into(),
                message: "identifier taken".into()
            })
        );
    }

    #[tokio::test]
    async fn should_wrap_route_middlewares_inside_router_layers() {
        let trace = Trace::default();
        let mut router = router();
        router.layer(tagging(&trace, "layer"));
        router.handle("echo", echo(), &[tagging(&trace, "first"), tagging(&trace, "last")]);
        let (tx, _rx) = mpsc::channel(4);

        router
            .dispatch(SessionId::new(), &tx, r#"{"request_id":"r","topic":"echo"}"#)
            .await;

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["layer>", "last>", "first>", "<first", "<last", "<layer"]
        );
    }

    #[tokio::test]
    async fn should_wrap_each_route_once_when_layer_added_after_routes() {
        let wraps = Arc::new(AtomicUsize::new(0));
        let trace = Trace::default();
        let mut router = router();
        router.handle("echo", echo(), &[tagging(&trace, "route")]);
        router.layer({
            let wraps = Arc::clone(&wraps);
            session_middleware(move |next: SessionHandler<()>| {
                wraps.fetch_add(1, Ordering::SeqCst);
                next
            })
        });
        router.layer(tagging(&trace, "layer"));
        let (tx, mut rx) = mpsc::channel(4);

        for _ in 0..3 {
            router
                .dispatch(SessionId::new(), &tx, r#"{"request_id":"r","topic":"echo"}"#)
                .await;
            assert!(rx.recv().await.unwrap().error.is_none());
        }

        assert_eq!(wraps.load(Ordering::SeqCst), 1);
        assert_eq!(
            trace.lock().unwrap()[..4].to_vec(),
            vec!["layer>", "route>", "<route", "<layer"]
        );
    }

    #[tokio::test]
    async fn should_finish_dispatch_when_session_closed_before_error_reply() {
        let router = router();
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        router
            .dispatch(SessionId::new(), &tx, r#"{"request_id":"r1","topic":"nope"}"#)
            .await;

        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn should_stop_connect_chain_at_first_failure() {
        let trace = Trace::default();
        let mut router = router();
        router.on_connect(failing_hook(&trace, "auth", true));
        router.on_connect(failing_hook(&trace, "greet", false));
        let (tx, mut rx) = mpsc::channel(4);

        let result = router.connect(tx).await;

        assert!(matches!(result, Err(HubError::Invalid(_))));
        assert_eq!(*trace.lock().unwrap(), vec!["auth"]);
        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.topic, CONNECT);
        assert_eq!(reply.error.unwrap().code, "invalid");
        assert!(router.hub().is_empty());
    }

    #[tokio::test]
    async fn should_register_session_when_hooks_pass() {
        let trace = Trace::default();
        let mut router = router();
        router.on_connect(failing_hook(&trace, "a", false));
        router.on_disconnect(failing_hook(&trace, "b", false));
        let (tx, _rx) = mpsc::channel(4);

        let id = router.connect(tx.clone()).await.unwrap();
        assert_eq!(router.hub().len(), 1);
        router.disconnect(id, &tx).await;

        assert!(router.hub().is_empty());
        assert_eq!(*trace.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn should_broadcast_to_other_sessions_only() {
        let mut router = router();
        router.handle(
            "shout",
            session_handler(|s: Session<()>| async move {
                s.broadcast("shouted", &json!({"from": s.request_id()})).await?;
                s.no_content().await
            }),
            &[],
        );
        let (a_tx, mut a_rx) = mpsc::channel(4);
        let (b_tx, mut b_rx) = mpsc::channel(4);
        let a = router.connect(a_tx.clone()).await.unwrap();
        router.connect(b_tx).await.unwrap();

        router
            .dispatch(a, &a_tx, r#"{"request_id":"r1","topic":"shout"}"#)
            .await;

        let own = a_rx.recv().await.unwrap();
        assert_eq!(own.topic, "shout");
        assert!(own.result.is_none());
        let other = b_rx.recv().await.unwrap();
        assert_eq!(other.topic, "shouted");
        assert_eq!(other.result, Some(json!({"from": "r1"})));
        assert!(a_rx.try_recv().is_err());
    }
}
