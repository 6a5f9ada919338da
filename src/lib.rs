mod backend;
mod instrumentation;
mod persistence;
mod server;
mod settings;
mod tree;
mod types;

pub use backend::file_time;
pub use backend::mocked_clock;
pub use backend::try_create_backend;
pub use backend::Backend;
pub use backend::BackendConfig;
pub use backend::BackendCreationError;
pub use backend::BackendError;
pub use backend::BackendOptions;
pub use backend::ClientSession;
pub use backend::Clock;
pub use backend::MockClock;
pub use backend::MockClockController;
pub use backend::Op;
pub use backend::OpResult;
pub use backend::OptionsError;
pub use backend::RealClock;
pub use backend::RedirectProvider;
pub use backend::Request;
pub use backend::RequestCall;
pub use backend::RequestHandler;
pub use backend::RequestResponse;
pub use backend::RequestType;
pub use backend::ResponseContent;
pub use backend::Role;
pub use backend::RoleChangeListener;
pub use backend::ScheduledCommandState;
pub use backend::Watcher;
pub use backend::WatcherArg;
pub use backend::WatcherTable;
pub use backend::IN_MEMORY_PERSISTENCE;
pub use backend::MAX_GET_CHILDREN_ENUMERATION_COUNT;
pub use backend::MAX_NODE_DATA_SIZE;
pub use backend::MAX_NODE_NAME_LENGTH;
pub use backend::MAX_NODE_PATH_LENGTH;
pub use backend::MAX_PENDING_CHANGE_LISTS;
pub use backend::MAX_SORTED_CHILDREN_THRESHOLD;
pub use backend::MIN_SORTED_CHILDREN_THRESHOLD;
pub use backend::REQUEST_TIMEOUT_MS;
pub use instrumentation::Instrumentation;
pub use instrumentation::InstrumentationHandle;
pub use persistence::Change;
pub use persistence::ChangeList;
pub use persistence::ChangeListCommittedCallback;
pub use persistence::ChangeType;
pub use persistence::CommitStream;
pub use persistence::FactoryConfig;
pub use persistence::FactoryCore;
pub use persistence::FatalErrorCallback;
pub use persistence::InMemoryFactory;
pub use persistence::InitialState;
pub use persistence::LoadedState;
pub use persistence::PendingCommit;
pub use persistence::PersistedData;
pub use persistence::PersistedDataFactory;
pub use persistence::PersistenceError;
pub use persistence::Replication;
pub use persistence::SnapshotError;
pub use persistence::StoreStats;
pub use persistence::NO_PARENT;
pub use server::packet_codec;
pub use server::serve_tcp;
pub use server::shutdown_signal;
pub use server::BinaryProtocol;
pub use server::CommunicationProtocol;
pub use server::Connection;
pub use server::ProtocolError;
pub use server::RequestHandlerFactory;
pub use server::RingMasterServer;
pub use server::ServerConfig;
pub use server::ServerShutdownHandle;
pub use server::ServerShutdownSignal;
pub use server::Session;
pub use server::NOTIFICATION_CALL_ID;
pub use server::PROTOCOL_VERSION;
pub use settings::SettingsProvider;
pub use tree::ChildThresholds;
pub use tree::NodeTree;
pub use tree::TreeLimits;
pub use tree::TreeLoadError;
pub use types::Acl;
pub use types::Code;
pub use types::CreateMode;
pub use types::DeleteMode;
pub use types::FirstStat;
pub use types::Id;
pub use types::IncarnationId;
pub use types::KeeperState;
pub use types::MoveMode;
pub use types::MutableStat;
pub use types::Perms;
pub use types::ReadOnlyStat;
pub use types::SessionAuth;
pub use types::Stat;
pub use types::WatchedEvent;
pub use types::WatchedEventType;
pub use types::WatcherKind;
pub use types::ROOT_PATH;
