use crate::instrumentation::InstrumentationHandle;
use crate::persistence::apply_loop::{self, ApplyLoop, ChangeListCommittedCallback, FatalErrorCallback};
use crate::persistence::commit_stream::{self, CommitStream};
use crate::persistence::replication::FanOut;
use crate::persistence::store::{DataStore, StoreStats};
use crate::persistence::{PersistedData, PersistenceError, Replication, SnapshotError};
use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_PENDING_CHANGE_LISTS: usize = 10;

/// Construction parameters shared by every factory.
pub struct FactoryConfig {
    pub name: String,
    pub logger: slog::Logger,
    /// Depth of the apply queue; committers wait once it is full.
    pub max_pending_change_lists: usize,
    /// Runs after each change-list is applied to this store, in apply order.
    pub on_change_list_committed: Option<ChangeListCommittedCallback>,
    /// Runs once when the apply loop halts on an error.
    pub report_fatal_error: Option<FatalErrorCallback>,
    pub instrumentation: InstrumentationHandle,
}

impl FactoryConfig {
    pub fn new(name: &str, logger: slog::Logger) -> Self {
        FactoryConfig {
            name: name.to_string(),
            logger,
            max_pending_change_lists: DEFAULT_MAX_PENDING_CHANGE_LISTS,
            on_change_list_committed: None,
            report_fatal_error: None,
            instrumentation: None,
        }
    }
}

/// State of a store as loaded at activation.
#[derive(Debug, Clone)]
pub struct LoadedState {
    pub records: Vec<PersistedData>,
    pub last_zxid: i64,
    pub max_id: u64,
}

/// Monotonic node id source, seeded from the largest loaded id.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU64,
}

impl IdAllocator {
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn observe(&self, id: u64) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }

    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Bookkeeping common to every persistence backend: the record table, its apply loop, the
/// replication fan-out and the committed change-list stream.
pub struct FactoryCore {
    logger: slog::Logger,
    name: String,
    store: Arc<RwLock<DataStore>>,
    fan_out: Arc<FanOut>,
    ids: IdAllocator,
    cancellation: CancellationToken,
    apply_loop: Mutex<Option<ApplyLoop>>,
    apply_task: Mutex<Option<JoinHandle<Result<(), PersistenceError>>>>,
    commit_stream: Mutex<Option<CommitStream>>,
}

impl FactoryCore {
    pub fn new(config: FactoryConfig) -> Self {
        let logger = config.logger.new(slog::o!("store" => config.name.clone()));
        let store = Arc::new(RwLock::new(DataStore::new(config.name.clone())));
        let (queue, receiver) = apply_loop::apply_queue(config.name.clone(), config.max_pending_change_lists);
        let (publisher, stream) = commit_stream::create_commit_stream();
        let cancellation = CancellationToken::new();

        let apply_loop = ApplyLoop {
            logger: logger.clone(),
            store_name: config.name.clone(),
            receiver,
            store: store.clone(),
            on_committed: config.on_change_list_committed,
            report_fatal_error: config.report_fatal_error,
            publisher,
            cancellation: cancellation.clone(),
            instrumentation: config.instrumentation,
        };

        FactoryCore {
            logger,
            name: config.name,
            store,
            fan_out: Arc::new(FanOut::new(queue)),
            ids: IdAllocator::default(),
            cancellation,
            apply_loop: Mutex::new(Some(apply_loop)),
            apply_task: Mutex::new(None),
            commit_stream: Mutex::new(Some(stream)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn stats(&self) -> StoreStats {
        self.store.read().stats()
    }

    pub fn total_nodes(&self) -> u64 {
        self.stats().total_nodes
    }

    pub fn total_data_size(&self) -> u64 {
        self.stats().total_data_size
    }

    pub fn ephemeral_nodes(&self) -> u64 {
        self.stats().ephemeral_nodes
    }

    pub fn last_zxid(&self) -> i64 {
        self.stats().last_zxid
    }

    pub fn get(&self, id: u64) -> Option<PersistedData> {
        self.store.read().get(id).cloned()
    }

    /// Consistent copy of every record, in id order.
    pub fn records(&self) -> Vec<PersistedData> {
        self.store.read().records()
    }

    /// Writes a snapshot of some committed prefix. The store lock keeps a change-list from being
    /// split across the snapshot.
    pub fn save_to<W: Write>(&self, writer: &mut W) -> Result<(), SnapshotError> {
        self.store.read().save_to(writer)
    }

    /// Replaces the table. Meant for activation, before any change-list is applied.
    pub fn load(&self, records: Vec<PersistedData>, last_zxid: i64) {
        let mut store = self.store.write();
        store.replace(records, last_zxid);
        self.ids.observe(store.stats().max_id);
        slog::info!(
            self.logger,
            "Loaded {} records, last zxid {}",
            store.stats().total_nodes,
            store.stats().last_zxid
        );
    }

    pub fn loaded_state(&self) -> LoadedState {
        let store = self.store.read();
        LoadedState {
            records: store.records(),
            last_zxid: store.stats().last_zxid,
            max_id: store.stats().max_id,
        }
    }

    pub fn start_replication(&self, id: u64) -> Replication {
        Replication::new(id, self.fan_out.clone())
    }

    /// Adds `secondary`'s apply queue to this store's fan-out.
    pub fn register_secondary(&self, secondary: &FactoryCore) {
        slog::info!(self.logger, "Registering secondary '{}'", secondary.name);
        self.fan_out.register_secondary(secondary.fan_out.primary().clone());
    }

    /// The stream of change-lists applied to this store. Can be taken once.
    pub fn take_commit_stream(&self) -> Option<CommitStream> {
        self.commit_stream.lock().take()
    }

    pub fn is_active(&self) -> bool {
        self.apply_task.lock().is_some()
    }

    /// Spawns the apply loop. Must be called from within a tokio runtime.
    pub fn start_apply_loop(&self) {
        if let Some(apply_loop) = self.apply_loop.lock().take() {
            *self.apply_task.lock() = Some(tokio::spawn(apply_loop.run()));
        }
    }

    /// Cancels the apply loop and waits for it to finish its current change-list.
    pub async fn stop_apply_loop(&self) -> Result<(), PersistenceError> {
        self.cancellation.cancel();
        self.apply_loop.lock().take();
        let task = self.apply_task.lock().take();
        match task {
            None => Ok(()),
            Some(task) => match task.await {
                Ok(Ok(())) | Ok(Err(PersistenceError::Cancelled)) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(join_error) => Err(PersistenceError::StoreHalted(format!("{}: {}", self.name, join_error))),
            },
        }
    }
}

/// A persistence and replication backend.
#[async_trait::async_trait]
pub trait PersistedDataFactory: Send + Sync {
    fn core(&self) -> &FactoryCore;

    /// Fresh accumulator for change-list `id`.
    fn start_replication(&self, id: u64) -> Replication;

    /// Fills the store with its initial state.
    async fn start_loading_data(&self) -> Result<(), PersistenceError>;

    /// Backend specific cleanup, before the apply loop stops.
    async fn on_deactivate(&self) {}

    async fn activate(&self) -> Result<(), PersistenceError> {
        if self.core().is_active() {
            return Ok(());
        }
        self.start_loading_data().await?;
        self.core().start_apply_loop();
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), PersistenceError> {
        self.on_deactivate().await;
        self.core().stop_apply_loop().await
    }

    /// Records to build a tree from.
    async fn load_tree(&self) -> Result<LoadedState, PersistenceError> {
        Ok(self.core().loaded_state())
    }

    fn register_secondary(&self, secondary: &dyn PersistedDataFactory) {
        self.core().register_secondary(secondary.core());
    }
}
