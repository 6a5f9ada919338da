use crate::backend::WatcherTable;
use crate::instrumentation::InstrumentationHandle;
use crate::persistence::{PendingCommit, PersistedDataFactory};
use crate::tree::{Node, NodeId, NodeTree};
use crate::types::{Code, WatchedEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, OwnedRwLockWriteGuard};
use tokio::time::Instant;

struct TrackedCommit {
    // The tree stays locked until the change-list is published or dropped.
    tree: OwnedRwLockWriteGuard<NodeTree>,
    pending: PendingCommit,
    staged: HashMap<NodeId, Option<Node>>,
    events: Vec<WatchedEvent>,
    submitted: Instant,
    done: oneshot::Sender<Code>,
}

pub(super) fn commit_tracker(
    logger: slog::Logger,
    factory: Arc<dyn PersistedDataFactory>,
    watchers: Arc<WatcherTable>,
    committed: Arc<watch::Sender<i64>>,
    instrumentation: InstrumentationHandle,
) -> (CommitTracker, CommitTrackerLoop) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let tracker_loop = CommitTrackerLoop {
        logger,
        receiver,
        factory,
        watchers,
        committed,
        instrumentation,
    };

    (CommitTracker { sender }, tracker_loop)
}

/// Hands submitted change-lists to the tracker loop in submission order.
pub(super) struct CommitTracker {
    sender: mpsc::UnboundedSender<TrackedCommit>,
}

impl CommitTracker {
    /// Takes over the tree lock of a submitted transaction. The receiver yields the commit's
    /// outcome. It fails if the tracker loop is gone, in which case nothing was published.
    pub(super) fn track(
        &self,
        tree: OwnedRwLockWriteGuard<NodeTree>,
        pending: PendingCommit,
        staged: HashMap<NodeId, Option<Node>>,
        events: Vec<WatchedEvent>,
    ) -> oneshot::Receiver<Code> {
        let (done, rx) = oneshot::channel();
        let _ = self.sender.send(TrackedCommit {
            tree,
            pending,
            staged,
            events,
            submitted: Instant::now(),
            done,
        });
        rx
    }
}

/// Waits for change-lists one at a time, in submission order. A committed change-list is
/// published to the tree and its watchers fire before the tree lock is released, so no reader
/// sees a change before every store applied it.
pub(super) struct CommitTrackerLoop {
    logger: slog::Logger,
    receiver: mpsc::UnboundedReceiver<TrackedCommit>,
    factory: Arc<dyn PersistedDataFactory>,
    watchers: Arc<WatcherTable>,
    committed: Arc<watch::Sender<i64>>,
    instrumentation: InstrumentationHandle,
}

impl CommitTrackerLoop {
    pub(super) async fn run(mut self) {
        while let Some(commit) = self.receiver.recv().await {
            self.complete(commit).await;
        }

        slog::debug!(self.logger, "Commit tracker has exited.");
    }

    async fn complete(&self, commit: TrackedCommit) {
        let TrackedCommit {
            mut tree,
            pending,
            staged,
            events,
            submitted,
            done,
        } = commit;
        let id = pending.id();
        let result = pending.wait().await;
        let elapsed = submitted.elapsed();

        let code = match result {
            Ok(()) => {
                tree.publish(staged, id as i64);
                self.committed.send_modify(|zxid| *zxid = (*zxid).max(id as i64));
                if let Some(sink) = &self.instrumentation {
                    sink.on_change_list_committed(id, elapsed);
                    sink.on_replication_wait(elapsed);
                }
                self.watchers.fire(&events);
                Code::Ok
            }
            Err(e) => {
                slog::error!(self.logger, "Change-list {} failed to commit: {}", id, e);
                if let Some(sink) = &self.instrumentation {
                    sink.on_change_list_commit_failed(id);
                }
                // The tree mirrors the local store. A secondary failing after the local store
                // applied the change-list leaves it in place; the requester still sees a failure.
                if self.factory.core().last_zxid() >= id as i64 {
                    slog::warn!(self.logger, "Change-list {} is in the local store, publishing it", id);
                    tree.publish(staged, id as i64);
                    self.watchers.fire(&events);
                }
                Code::SystemError
            }
        };
        drop(tree);

        // The requester may have timed out and left.
        let _ = done.send(code);
    }
}
