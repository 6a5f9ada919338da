use crate::instrumentation::InstrumentationHandle;
use crate::persistence::commit_stream::CommitStreamPublisher;
use crate::persistence::store::DataStore;
use crate::persistence::{ChangeList, PersistenceError};
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub type ChangeListCommittedCallback = Arc<dyn Fn(&ChangeList) + Send + Sync>;
pub type FatalErrorCallback = Arc<dyn Fn(&str, &PersistenceError) + Send + Sync>;

/// One change-list waiting to be applied by a store.
pub(crate) struct ApplyItem {
    pub(crate) id: u64,
    pub(crate) payload: Bytes,
    pub(crate) done: oneshot::Sender<Result<(), PersistenceError>>,
}

/// Sending half of a store's bounded apply queue.
#[derive(Clone)]
pub(crate) struct ApplyQueue {
    store: String,
    sender: mpsc::Sender<ApplyItem>,
}

impl ApplyQueue {
    pub(crate) fn store(&self) -> &str {
        &self.store
    }

    /// Waits for one slot of queue capacity. Fails once the receiving apply loop is gone.
    pub(crate) async fn reserve(&self) -> Result<mpsc::Permit<'_, ApplyItem>, PersistenceError> {
        self.sender
            .reserve()
            .await
            .map_err(|_| PersistenceError::StoreHalted(self.store.clone()))
    }
}

pub(crate) fn apply_queue(store: String, depth: usize) -> (ApplyQueue, mpsc::Receiver<ApplyItem>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (ApplyQueue { store, sender: tx }, rx)
}

/// Sequential applier of one store. Change-lists are applied strictly in queue order, one at a time.
pub(crate) struct ApplyLoop {
    pub(crate) logger: slog::Logger,
    pub(crate) store_name: String,
    pub(crate) receiver: mpsc::Receiver<ApplyItem>,
    pub(crate) store: Arc<RwLock<DataStore>>,
    pub(crate) on_committed: Option<ChangeListCommittedCallback>,
    pub(crate) report_fatal_error: Option<FatalErrorCallback>,
    pub(crate) publisher: CommitStreamPublisher,
    pub(crate) cancellation: CancellationToken,
    pub(crate) instrumentation: InstrumentationHandle,
}

impl ApplyLoop {
    pub(crate) async fn run(mut self) -> Result<(), PersistenceError> {
        slog::debug!(self.logger, "Apply loop started");

        let result = loop {
            let item = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => break Err(PersistenceError::Cancelled),
                item = self.receiver.recv() => match item {
                    Some(item) => item,
                    None => break Ok(()),
                },
            };

            if let Err(e) = self.process(item) {
                break Err(e);
            }
        };

        match &result {
            Ok(()) => slog::info!(self.logger, "Apply loop exited, queue closed"),
            Err(PersistenceError::Cancelled) => slog::info!(self.logger, "Apply loop cancelled"),
            Err(e) => {
                slog::error!(self.logger, "Apply loop halted: {}", e);
                if let Some(report) = &self.report_fatal_error {
                    report(&format!("store '{}' stopped applying change-lists", self.store_name), e);
                }
                if let Some(instrumentation) = &self.instrumentation {
                    instrumentation.on_exception("ApplyLoop", "fatal");
                }
            }
        }

        // Release everyone still waiting on this store.
        self.receiver.close();
        let pending_error = match &result {
            Err(PersistenceError::Cancelled) => PersistenceError::Cancelled,
            _ => PersistenceError::StoreHalted(self.store_name.clone()),
        };
        while let Ok(item) = self.receiver.try_recv() {
            let _ = item.done.send(Err(pending_error.clone()));
        }

        result
    }

    fn process(&mut self, item: ApplyItem) -> Result<(), PersistenceError> {
        let ApplyItem { id, payload, done } = item;

        let outcome = ChangeList::deserialize(id, &payload)
            .map_err(|e| PersistenceError::Malformed {
                store: self.store_name.clone(),
                id,
                message: e.to_string(),
            })
            .and_then(|list| self.store.write().apply(&list).map(|_| list));

        let list = match outcome {
            Ok(list) => Arc::new(list),
            Err(e) => {
                let _ = done.send(Err(e.clone()));
                return Err(e);
            }
        };

        slog::trace!(self.logger, "Applied change-list {} with {} changes", id, list.changes.len());
        if let Some(instrumentation) = &self.instrumentation {
            instrumentation.on_change_list_applied(&self.store_name, id, list.changes.len());
        }

        // Observers run before the committer is released.
        if let Some(on_committed) = &self.on_committed {
            on_committed(&list);
        }
        self.publisher.notify_commit(&self.logger, list);

        let _ = done.send(Ok(()));
        Ok(())
    }
}
