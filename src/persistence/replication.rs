use crate::persistence::apply_loop::{ApplyItem, ApplyQueue};
use crate::persistence::{Change, ChangeList, PersistedData, PersistenceError};
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// The primary's own apply queue plus every registered secondary's.
pub(crate) struct FanOut {
    primary: ApplyQueue,
    secondaries: RwLock<Vec<ApplyQueue>>,
    // Held while one change-list is handed to every queue, so all queues see the same order.
    ordering: Mutex<()>,
}

impl FanOut {
    pub(crate) fn new(primary: ApplyQueue) -> Self {
        FanOut {
            primary,
            secondaries: RwLock::new(Vec::new()),
            ordering: Mutex::new(()),
        }
    }

    pub(crate) fn primary(&self) -> &ApplyQueue {
        &self.primary
    }

    pub(crate) fn register_secondary(&self, queue: ApplyQueue) {
        self.secondaries.write().push(queue);
    }

    pub(crate) fn participants(&self) -> usize {
        1 + self.secondaries.read().len()
    }
}

/// Accumulates the changes of one change-list until it is committed.
pub struct Replication {
    id: u64,
    changes: Vec<Change>,
    fan_out: Arc<FanOut>,
}

impl Replication {
    pub(crate) fn new(id: u64, fan_out: Arc<FanOut>) -> Self {
        Replication {
            id,
            changes: Vec::new(),
            fan_out,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn add(&mut self, data: PersistedData) {
        self.changes.push(Change::add(data));
    }

    pub fn update(&mut self, data: PersistedData) {
        self.changes.push(Change::update(data));
    }

    pub fn remove(&mut self, data: PersistedData) {
        self.changes.push(Change::remove(data));
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Serializes the buffered changes once and hands the same bytes to every participant's
    /// apply queue. A slot is reserved on every queue before the change-list goes to any of them,
    /// so a halted participant fails the submit without any store seeing the change-list.
    /// Returns when all queues accepted it, which fixes its position in every store's apply order.
    pub async fn submit(self) -> Result<PendingCommit, PersistenceError> {
        let payload = ChangeList::serialize_changes(&self.changes);

        let _ordering = self.fan_out.ordering.lock().await;
        let mut queues = Vec::with_capacity(self.fan_out.participants());
        queues.push(self.fan_out.primary.clone());
        queues.extend(self.fan_out.secondaries.read().iter().cloned());

        let mut permits = Vec::with_capacity(queues.len());
        for queue in &queues {
            permits.push((queue.store(), queue.reserve().await?));
        }

        let mut waiters = Vec::with_capacity(permits.len());
        for (store, permit) in permits {
            let (tx, rx) = oneshot::channel();
            permit.send(ApplyItem {
                id: self.id,
                payload: payload.clone(),
                done: tx,
            });
            waiters.push((store.to_string(), rx));
        }

        Ok(PendingCommit { id: self.id, waiters })
    }

    /// Submits and then waits until every participant applied the change-list.
    pub async fn commit(self) -> Result<(), PersistenceError> {
        self.submit().await?.wait().await
    }
}

/// A change-list accepted by every apply queue but not necessarily applied yet.
pub struct PendingCommit {
    id: u64,
    waiters: Vec<(String, oneshot::Receiver<Result<(), PersistenceError>>)>,
}

impl PendingCommit {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Completes once every participant has applied the change-list. The first failure wins.
    pub async fn wait(self) -> Result<(), PersistenceError> {
        let results = join_all(self.waiters.into_iter().map(|(store, rx)| async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(PersistenceError::StoreHalted(store)),
            }
        }))
        .await;

        results.into_iter().collect()
    }
}
