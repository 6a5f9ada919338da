use crate::backend::{Backend, Request, RequestHandler, RequestResponse};
use crate::types::{Code, SessionAuth};
use std::sync::atomic::{AtomicBool, Ordering};

/// A client session bound to a [`Backend`]. Requests run under the identity given at `Init`.
pub struct ClientSession {
    id: u64,
    auth: SessionAuth,
    backend: Backend,
    closed: AtomicBool,
    logger: slog::Logger,
}

impl ClientSession {
    pub(crate) fn new(id: u64, auth: SessionAuth, backend: Backend, logger: slog::Logger) -> Self {
        slog::debug!(logger, "Session opened (super: {})", auth.is_super);
        ClientSession {
            id,
            auth,
            backend,
            closed: AtomicBool::new(false),
            logger,
        }
    }

    pub fn auth(&self) -> &SessionAuth {
        &self.auth
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RequestHandler for ClientSession {
    fn session_id(&self) -> u64 {
        self.id
    }

    async fn request(&self, request: Request) -> RequestResponse {
        if self.is_closed() {
            return RequestResponse::new(Code::SessionMoved);
        }
        self.backend.execute(&self.auth, request).await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        slog::debug!(self.logger, "Session closing");
        self.backend.close_session(self.id).await;
    }
}
