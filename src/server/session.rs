use crate::backend::{Request, RequestCall, RequestHandler, RequestResponse, ResponseContent, Watcher, WatcherArg};
use crate::server::connection::Connection;
use crate::server::protocol::CommunicationProtocol;
use crate::server::server::{RequestHandlerFactory, ServerShared};
use crate::types::{Code, WatchedEvent, WatcherKind};
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Call id carried by watcher notifications, which answer no request.
pub const NOTIFICATION_CALL_ID: u64 = u64::MAX;

/// Server side of one connection. Decodes packets, binds the request handler on `Init` and
/// routes watcher notifications back to the client.
pub struct Session {
    id: u64,
    logger: slog::Logger,
    connection: Arc<dyn Connection>,
    protocol: Arc<dyn CommunicationProtocol>,
    protocol_version: u32,
    handler_factory: RequestHandlerFactory,
    handler: RwLock<Option<Arc<dyn RequestHandler>>>,
    shared: Arc<ServerShared>,
}

impl Session {
    pub(crate) fn new(
        id: u64,
        logger: slog::Logger,
        connection: Arc<dyn Connection>,
        protocol: Arc<dyn CommunicationProtocol>,
        protocol_version: u32,
        handler_factory: RequestHandlerFactory,
        shared: Arc<ServerShared>,
    ) -> Self {
        Session {
            id,
            logger,
            connection,
            protocol,
            protocol_version,
            handler_factory,
            handler: RwLock::new(None),
            shared,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the backend session bound by `Init`, if any.
    pub fn bound_session_id(&self) -> Option<u64> {
        self.handler.read().as_ref().map(|handler| handler.session_id())
    }

    pub fn remote_identity(&self) -> String {
        self.connection.remote_identity()
    }

    pub async fn on_packet_received(self: &Arc<Self>, packet: Bytes) {
        let response = match self.protocol.deserialize_request(&packet, self.protocol_version) {
            Ok(call) => self.process(call).await,
            Err(e) => {
                slog::warn!(self.logger, "Dropping malformed packet: {}", e);
                if let Some(sink) = &self.shared.instrumentation {
                    sink.on_bad_request("Unknown");
                }
                RequestResponse::new(Code::SystemError)
            }
        };
        self.send(&response);
    }

    async fn process(self: &Arc<Self>, call: RequestCall) -> RequestResponse {
        let RequestCall { call_id, mut request } = call;

        if let Some(redirect) = &self.shared.redirect {
            if let Some(primary) = redirect() {
                return RequestResponse {
                    content: ResponseContent::Redirect(primary),
                    ..RequestResponse::new(Code::SessionMoved)
                }
                .with_call_id(call_id);
            }
        }

        let response = match request {
            Request::Init {
                session_id,
                auth,
                is_super,
            } => {
                let handler = (self.handler_factory)(session_id, auth, is_super);
                let bound_id = handler.session_id();
                let previous = self.handler.write().replace(handler);
                if let Some(previous) = previous {
                    if previous.session_id() != bound_id {
                        previous.close().await;
                    }
                }
                slog::debug!(self.logger, "Bound to session {:#x}", bound_id);
                RequestResponse::ok(None, ResponseContent::Session(bound_id))
            }
            _ => {
                let handler = self.handler.read().clone();
                match handler {
                    None => RequestResponse::new(Code::BadArguments),
                    Some(handler) => {
                        self.bind_watcher(&mut request);
                        self.forward(handler, request).await
                    }
                }
            }
        };

        response.with_call_id(call_id)
    }

    /// Replaces a decoded watcher spec with one that notifies this session's client.
    fn bind_watcher(self: &Arc<Self>, request: &mut Request) {
        if let Some(slot) = request.watcher_mut() {
            if let Some(WatcherArg::Spec { id, kind }) = slot {
                let watcher = SessionWatcher {
                    id: *id,
                    kind: *kind,
                    session: Arc::downgrade(self),
                };
                *slot = Some(WatcherArg::Bound(Arc::new(watcher)));
            }
        }
    }

    /// Runs the handler on its own task so a panic becomes a `SystemError` response.
    async fn forward(&self, handler: Arc<dyn RequestHandler>, request: Request) -> RequestResponse {
        let request_type = request.request_type();
        let task = tokio::spawn(async move { handler.request(request).await });

        match task.await {
            Ok(response) => response,
            Err(e) => {
                slog::error!(self.logger, "{} request failed: {}", request_type.name(), e);
                if let Some(sink) = &self.shared.instrumentation {
                    sink.on_exception("session", request_type.name());
                }
                RequestResponse::new(Code::SystemError)
            }
        }
    }

    fn send(&self, response: &RequestResponse) {
        match self.protocol.serialize_response(response, self.protocol_version) {
            Ok(packet) => self.connection.send(packet),
            Err(e) => slog::error!(self.logger, "Can't encode response {}: {}", response.call_id, e),
        }
    }

    fn notify(&self, watcher_id: u64, event: WatchedEvent) {
        let response = RequestResponse {
            path: Some(event.path.clone()),
            content: ResponseContent::Notification { watcher_id, event },
            ..RequestResponse::new(Code::Ok)
        }
        .with_call_id(NOTIFICATION_CALL_ID);
        self.send(&response);
    }

    /// Closes the bound backend session. Called once the connection is gone.
    pub(crate) async fn on_connection_lost(&self) {
        let handler = self.handler.write().take();
        if let Some(handler) = handler {
            handler.close().await;
        }
        slog::debug!(self.logger, "Connection lost");
    }

    pub(crate) fn disconnect(&self) {
        self.connection.disconnect();
    }
}

struct SessionWatcher {
    id: u64,
    kind: WatcherKind,
    session: Weak<Session>,
}

impl Watcher for SessionWatcher {
    fn id(&self) -> u64 {
        self.id
    }

    fn kind(&self) -> WatcherKind {
        self.kind
    }

    fn process(&self, event: WatchedEvent) {
        if let Some(session) = self.session.upgrade() {
            session.notify(self.id, event);
        }
    }
}
