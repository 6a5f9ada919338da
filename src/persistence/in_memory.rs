use crate::persistence::store::load_records;
use crate::persistence::{
    FactoryConfig, FactoryCore, PersistedData, PersistedDataFactory, PersistenceError, Replication, SnapshotError,
};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Where an in-memory store takes its initial records from.
pub enum InitialState {
    Empty,
    Records(Vec<PersistedData>),
    /// Snapshot file; a missing file means an empty store.
    SnapshotFile(PathBuf),
}

/// Persistence backend that keeps every record in memory. Durability comes only from snapshots.
pub struct InMemoryFactory {
    core: FactoryCore,
    initial_state: Mutex<Option<InitialState>>,
}

impl InMemoryFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self::with_initial_state(config, InitialState::Empty)
    }

    pub fn with_initial_state(config: FactoryConfig, initial_state: InitialState) -> Self {
        InMemoryFactory {
            core: FactoryCore::new(config),
            initial_state: Mutex::new(Some(initial_state)),
        }
    }

    /// Writes a snapshot to `path` through a temporary file, so an interrupted save never leaves a
    /// truncated snapshot behind.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            self.core.save_to(&mut writer)?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_snapshot(path: &Path) -> Result<Vec<PersistedData>, SnapshotError> {
        let mut reader = BufReader::new(File::open(path)?);
        load_records(&mut reader)
    }
}

#[async_trait::async_trait]
impl PersistedDataFactory for InMemoryFactory {
    fn core(&self) -> &FactoryCore {
        &self.core
    }

    fn start_replication(&self, id: u64) -> Replication {
        self.core.start_replication(id)
    }

    async fn start_loading_data(&self) -> Result<(), PersistenceError> {
        let initial_state = self.initial_state.lock().take();
        let records = match initial_state {
            None | Some(InitialState::Empty) => return Ok(()),
            Some(InitialState::Records(records)) => records,
            Some(InitialState::SnapshotFile(path)) if !path.exists() => {
                slog::info!(self.core.logger(), "No snapshot at {:?}, starting empty", path);
                return Ok(());
            }
            Some(InitialState::SnapshotFile(path)) => tokio::task::spawn_blocking(move || Self::read_snapshot(&path))
                .await
                .map_err(|e| PersistenceError::Load(e.to_string()))??,
        };

        self.core.load(records, 0);
        Ok(())
    }

    async fn on_deactivate(&self) {
        slog::info!(self.core.logger(), "Deactivating in-memory store");
    }
}
