use crate::backend::{Backend, RedirectProvider, RequestHandler};
use crate::instrumentation::InstrumentationHandle;
use crate::server::connection::Connection;
use crate::server::protocol::{BinaryProtocol, CommunicationProtocol, PROTOCOL_VERSION};
use crate::server::session::Session;
use crate::types::Id;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Binds a connection to a request handler on `Init`: `(session_id, auth, is_super)`.
/// A `session_id` of 0 asks for a new session.
pub type RequestHandlerFactory = Arc<dyn Fn(u64, Option<Id>, bool) -> Arc<dyn RequestHandler> + Send + Sync>;

pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1024;

pub struct ServerConfig {
    pub logger: slog::Logger,
    pub handler_factory: RequestHandlerFactory,
    pub protocol: Arc<dyn CommunicationProtocol>,
    pub protocol_version: u32,
    /// When set and returning a primary, every request is answered with a redirect.
    pub redirect: Option<RedirectProvider>,
    pub instrumentation: InstrumentationHandle,
    pub max_concurrent_requests: usize,
}

impl ServerConfig {
    pub fn new(logger: slog::Logger, handler_factory: RequestHandlerFactory) -> Self {
        ServerConfig {
            logger,
            handler_factory,
            protocol: Arc::new(BinaryProtocol),
            protocol_version: PROTOCOL_VERSION,
            redirect: None,
            instrumentation: None,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    /// Serves requests from `backend`, one backend session per `Init`.
    pub fn for_backend(backend: Backend) -> Self {
        let logger = backend.logger().new(slog::o!("component" => "server"));
        let handler_factory: RequestHandlerFactory = Arc::new(move |session_id, auth, is_super| {
            let session: Arc<dyn RequestHandler> = backend.create_session(session_id, auth, is_super);
            session
        });
        ServerConfig::new(logger, handler_factory)
    }
}

pub(crate) struct ServerShared {
    pub(crate) redirect: Option<RedirectProvider>,
    pub(crate) instrumentation: InstrumentationHandle,
}

/// Transport independent front end. Each connection gets a [`Session`]; packets are
/// dispatched with a bound on how many run at once.
pub struct RingMasterServer {
    logger: slog::Logger,
    handler_factory: RequestHandlerFactory,
    protocol: Arc<dyn CommunicationProtocol>,
    protocol_version: u32,
    shared: Arc<ServerShared>,
    next_session_id: AtomicU64,
    sessions: Mutex<HashMap<u64, Arc<Session>>>,
    permits: Arc<Semaphore>,
}

impl RingMasterServer {
    pub fn new(config: ServerConfig) -> Self {
        slog::info!(
            config.logger,
            "Server speaking protocol version {}, at most {} requests in flight",
            config.protocol_version,
            config.max_concurrent_requests
        );
        RingMasterServer {
            logger: config.logger,
            handler_factory: config.handler_factory,
            protocol: config.protocol,
            protocol_version: config.protocol_version,
            shared: Arc::new(ServerShared {
                redirect: config.redirect,
                instrumentation: config.instrumentation,
            }),
            next_session_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
        }
    }

    pub fn on_new_connection(&self, connection: Arc<dyn Connection>) -> Arc<Session> {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let logger = self
            .logger
            .new(slog::o!("connection" => id, "remote" => connection.remote_identity()));
        slog::debug!(logger, "Connection accepted");

        let session = Arc::new(Session::new(
            id,
            logger,
            connection,
            self.protocol.clone(),
            self.protocol_version,
            self.handler_factory.clone(),
            self.shared.clone(),
        ));
        self.sessions.lock().insert(id, session.clone());
        session
    }

    /// Processes one packet once a dispatch slot is free.
    pub async fn dispatch(&self, session: Arc<Session>, packet: Bytes) {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            // Closed only while shutting down.
            Err(_) => return,
        };
        session.on_packet_received(packet).await;
    }

    pub async fn on_connection_lost(&self, session_id: u64) {
        let session = self.sessions.lock().remove(&session_id);
        if let Some(session) = session {
            session.on_connection_lost().await;
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Disconnects every client and refuses further dispatch.
    pub async fn close(&self) {
        self.permits.close();
        let sessions: Vec<Arc<Session>> = self.sessions.lock().drain().map(|(_, session)| session).collect();
        slog::info!(self.logger, "Closing {} sessions", sessions.len());
        for session in sessions {
            session.disconnect();
            session.on_connection_lost().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Request, RequestCall, RequestResponse, ResponseContent, Watcher, WatcherArg};
    use crate::server::session::NOTIFICATION_CALL_ID;
    use crate::types::{Code, WatchedEvent, WatchedEventType, WatcherKind};

    #[derive(Default)]
    struct CapturedConnection {
        packets: Mutex<Vec<Bytes>>,
    }

    impl Connection for CapturedConnection {
        fn remote_identity(&self) -> String {
            "test".to_string()
        }

        fn send(&self, packet: Bytes) {
            self.packets.lock().push(packet);
        }

        fn disconnect(&self) {}
    }

    impl CapturedConnection {
        fn responses(&self) -> Vec<RequestResponse> {
            self.packets
                .lock()
                .iter()
                .map(|packet| BinaryProtocol.deserialize_response(packet, PROTOCOL_VERSION).unwrap())
                .collect()
        }
    }

    struct EchoHandler {
        id: u64,
        closed: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl RequestHandler for EchoHandler {
        fn session_id(&self) -> u64 {
            self.id
        }

        async fn request(&self, mut request: Request) -> RequestResponse {
            match &mut request {
                Request::GetData { path, watcher } => {
                    if let Some(WatcherArg::Bound(watcher)) = watcher.take() {
                        watcher.process(WatchedEvent::new(WatchedEventType::NodeDataChanged, path.clone()));
                    }
                    RequestResponse::ok(None, ResponseContent::Data(None))
                }
                Request::Sync { .. } => panic!("sync is not supported here"),
                _ => RequestResponse::new(Code::Ok),
            }
        }

        async fn close(&self) {
            *self.closed.lock() = true;
        }
    }

    fn test_server(handler: Arc<EchoHandler>, redirect: Option<RedirectProvider>) -> RingMasterServer {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let factory: RequestHandlerFactory = Arc::new(move |_, _, _| {
            let handler: Arc<dyn RequestHandler> = handler.clone();
            handler
        });
        let mut config = ServerConfig::new(logger, factory);
        config.redirect = redirect;
        RingMasterServer::new(config)
    }

    fn packet(call_id: u64, request: Request) -> Bytes {
        BinaryProtocol
            .serialize_request(&RequestCall { call_id, request }, PROTOCOL_VERSION)
            .unwrap()
    }

    fn init() -> Request {
        Request::Init {
            session_id: 0,
            auth: None,
            is_super: false,
        }
    }

    #[tokio::test]
    async fn requests_need_a_bound_session() {
        let handler = Arc::new(EchoHandler {
            id: 42,
            closed: Mutex::new(false),
        });
        let server = test_server(handler.clone(), None);
        let connection = Arc::new(CapturedConnection::default());
        let session = server.on_new_connection(connection.clone());

        server.dispatch(session.clone(), packet(1, Request::Nop)).await;
        server.dispatch(session.clone(), packet(2, init())).await;
        server.dispatch(session.clone(), packet(3, Request::Nop)).await;

        let responses = connection.responses();
        assert_eq!(responses[0].call_id, 1);
        assert_eq!(responses[0].code, Code::BadArguments);
        assert_eq!(responses[1].content, ResponseContent::Session(42));
        assert_eq!(responses[2].code, Code::Ok);
        assert_eq!(session.bound_session_id(), Some(42));
        assert_eq!(server.session_count(), 1);

        server.on_connection_lost(session.id()).await;
        assert_eq!(server.session_count(), 0);
        assert!(*handler.closed.lock());
    }

    #[tokio::test]
    async fn watcher_notifications_reach_the_connection() {
        let handler = Arc::new(EchoHandler {
            id: 7,
            closed: Mutex::new(false),
        });
        let server = test_server(handler, None);
        let connection = Arc::new(CapturedConnection::default());
        let session = server.on_new_connection(connection.clone());

        server.dispatch(session.clone(), packet(1, init())).await;
        let get = Request::GetData {
            path: "/a".to_string(),
            watcher: Some(WatcherArg::Spec {
                id: 99,
                kind: WatcherKind::ONE_USE,
            }),
        };
        server.dispatch(session.clone(), packet(2, get)).await;

        let responses = connection.responses();
        assert_eq!(responses.len(), 3);
        let notification = &responses[1];
        assert_eq!(notification.call_id, NOTIFICATION_CALL_ID);
        match &notification.content {
            ResponseContent::Notification { watcher_id, event } => {
                assert_eq!(*watcher_id, 99);
                assert_eq!(event.event_type, WatchedEventType::NodeDataChanged);
                assert_eq!(event.path, "/a");
            }
            other => panic!("unexpected content {:?}", other),
        }
        assert_eq!(responses[2].call_id, 2);
    }

    #[tokio::test]
    async fn failures_become_system_errors() {
        let handler = Arc::new(EchoHandler {
            id: 7,
            closed: Mutex::new(false),
        });
        let server = test_server(handler, None);
        let connection = Arc::new(CapturedConnection::default());
        let session = server.on_new_connection(connection.clone());

        server.dispatch(session.clone(), Bytes::from_static(&[1, 2, 3])).await;
        server.dispatch(session.clone(), packet(1, init())).await;
        let sync = Request::Sync { path: "/".to_string() };
        server.dispatch(session.clone(), packet(2, sync)).await;
        server.dispatch(session.clone(), packet(3, Request::Nop)).await;

        let responses = connection.responses();
        assert_eq!(responses[0].code, Code::SystemError);
        assert_eq!(responses[2].call_id, 2);
        assert_eq!(responses[2].code, Code::SystemError);
        assert_eq!(responses[3].code, Code::Ok);
    }

    #[tokio::test]
    async fn redirected_sessions_answer_session_moved() {
        let handler = Arc::new(EchoHandler {
            id: 7,
            closed: Mutex::new(false),
        });
        let redirect: RedirectProvider = Arc::new(|| Some("primary:9999".to_string()));
        let server = test_server(handler, Some(redirect));
        let connection = Arc::new(CapturedConnection::default());
        let session = server.on_new_connection(connection.clone());

        server.dispatch(session, packet(5, init())).await;

        let responses = connection.responses();
        assert_eq!(responses[0].call_id, 5);
        assert_eq!(responses[0].code, Code::SessionMoved);
        assert_eq!(responses[0].content, ResponseContent::Redirect("primary:9999".to_string()));
    }
}
