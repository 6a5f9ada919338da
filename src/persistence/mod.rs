mod apply_loop;
mod change_list;
mod codec;
mod commit_stream;
mod errors;
mod factory;
mod in_memory;
mod persisted_data;
mod replication;
mod store;

pub use apply_loop::ChangeListCommittedCallback;
pub use apply_loop::FatalErrorCallback;
pub use change_list::Change;
pub use change_list::ChangeList;
pub use change_list::ChangeType;
pub use codec::invalid_data;
pub use codec::read_list;
pub use codec::read_optional_bytes;
pub use codec::read_optional_list;
pub use codec::write_list;
pub use codec::write_optional_bytes;
pub use codec::write_optional_list;
pub use codec::ReadFrom;
pub use codec::WriteTo;
pub use commit_stream::CommitStream;
pub use errors::PersistenceError;
pub use errors::SnapshotError;
pub use factory::FactoryConfig;
pub use factory::FactoryCore;
pub use factory::IdAllocator;
pub use factory::LoadedState;
pub use factory::PersistedDataFactory;
pub use factory::DEFAULT_MAX_PENDING_CHANGE_LISTS;
pub use in_memory::InMemoryFactory;
pub use in_memory::InitialState;
pub use persisted_data::PersistedData;
pub use persisted_data::NO_PARENT;
pub use replication::PendingCommit;
pub use replication::Replication;
pub use store::load_records;
pub use store::save_records;
pub use store::StoreStats;
