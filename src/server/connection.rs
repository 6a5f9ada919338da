use bytes::Bytes;

/// One client connection as seen by the server: an ordered outbound packet channel.
pub trait Connection: Send + Sync {
    /// Printable peer identity, for logs.
    fn remote_identity(&self) -> String;

    /// Queues `packet` for delivery. Packets sent after the connection is gone are dropped.
    fn send(&self, packet: Bytes);

    fn disconnect(&self);
}
