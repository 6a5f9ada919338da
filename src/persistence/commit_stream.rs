use crate::persistence::ChangeList;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) fn create_commit_stream() -> (CommitStreamPublisher, CommitStream) {
    let (tx, rx) = mpsc::unbounded_channel();

    let publisher = CommitStreamPublisher { sender: tx };
    let stream = CommitStream { receiver: rx };

    (publisher, stream)
}

pub(crate) struct CommitStreamPublisher {
    sender: mpsc::UnboundedSender<Arc<ChangeList>>,
}

impl CommitStreamPublisher {
    pub(crate) fn notify_commit(&self, logger: &slog::Logger, change_list: Arc<ChangeList>) {
        if self.sender.send(change_list).is_err() {
            slog::debug!(logger, "CommitStream has disconnected.");
        }
    }
}

/// Change-lists in the order the owning store applied them.
pub struct CommitStream {
    receiver: mpsc::UnboundedReceiver<Arc<ChangeList>>,
}

impl CommitStream {
    /// Returns `None` once the store's apply loop has exited.
    pub async fn next(&mut self) -> Option<Arc<ChangeList>> {
        self.receiver.recv().await
    }
}
