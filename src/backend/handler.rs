use crate::backend::{Request, RequestResponse};

/// Executes the requests of one client session.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    fn session_id(&self) -> u64;

    async fn request(&self, request: Request) -> RequestResponse;

    /// Ends the session. Later requests fail.
    async fn close(&self);
}
