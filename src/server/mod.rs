mod connection;
mod protocol;
mod server;
mod session;
mod shutdown;
mod transport;

pub use connection::Connection;
pub use protocol::BinaryProtocol;
pub use protocol::CommunicationProtocol;
pub use protocol::ProtocolError;
pub use protocol::PROTOCOL_VERSION;
pub use server::RequestHandlerFactory;
pub use server::RingMasterServer;
pub use server::ServerConfig;
pub use server::DEFAULT_MAX_CONCURRENT_REQUESTS;
pub use session::Session;
pub use session::NOTIFICATION_CALL_ID;
pub use shutdown::shutdown_signal;
pub use shutdown::ServerShutdownHandle;
pub use shutdown::ServerShutdownSignal;
pub use transport::packet_codec;
pub use transport::serve_tcp;
pub use transport::MAX_FRAME_LENGTH;
