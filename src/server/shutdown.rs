use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub fn shutdown_signal() -> (ServerShutdownHandle, ServerShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (ServerShutdownHandle { tx }, ServerShutdownSignal { rx })
}

/// Stops the listener when shut down or dropped.
pub struct ServerShutdownHandle {
    tx: oneshot::Sender<()>,
}

impl ServerShutdownHandle {
    pub fn shutdown(self) {
        let _ = self.tx.send(());
    }
}

pub struct ServerShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for ServerShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // Sent or dropped, either way we stop.
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}
