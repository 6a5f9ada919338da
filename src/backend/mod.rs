mod backend;
mod clock;
mod committer;
mod executor;
mod follower;
mod handler;
mod options;
mod requests;
mod role;
mod scheduler;
mod session;
mod watchers;
mod wiring;

pub use backend::Backend;
pub use clock::file_time;
pub use clock::mocked_clock;
pub use clock::Clock;
pub use clock::MockClock;
pub use clock::MockClockController;
pub use clock::RealClock;
pub use handler::RequestHandler;
pub use options::BackendOptions;
pub use options::OptionsError;
pub use options::IN_MEMORY_PERSISTENCE;
pub use options::MAX_GET_CHILDREN_ENUMERATION_COUNT;
pub use options::MAX_NODE_DATA_SIZE;
pub use options::MAX_NODE_NAME_LENGTH;
pub use options::MAX_NODE_PATH_LENGTH;
pub use options::MAX_PENDING_CHANGE_LISTS;
pub use options::MAX_SORTED_CHILDREN_THRESHOLD;
pub use options::MIN_SORTED_CHILDREN_THRESHOLD;
pub use options::REQUEST_TIMEOUT_MS;
pub use requests::Op;
pub use requests::OpResult;
pub use requests::Request;
pub use requests::RequestCall;
pub use requests::RequestResponse;
pub use requests::RequestType;
pub use requests::ResponseContent;
pub use requests::WatcherArg;
pub use role::Role;
pub use role::RoleChangeListener;
pub use scheduler::ScheduledCommandState;
pub use session::ClientSession;
pub use watchers::Watcher;
pub use watchers::WatcherTable;
pub use wiring::try_create_backend;
pub use wiring::BackendConfig;
pub use wiring::BackendCreationError;
pub use wiring::BackendError;
pub use wiring::RedirectProvider;
