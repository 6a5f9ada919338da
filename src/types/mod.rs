mod acl;
mod code;
mod modes;
mod path;
mod stat;
mod watch;

pub use acl::validate_acl;
pub use acl::Acl;
pub use acl::Id;
pub use acl::Perms;
pub use acl::SessionAuth;
pub use code::Code;
pub use modes::CreateMode;
pub use modes::DeleteMode;
pub use modes::MoveMode;
pub use path::is_same_or_descendant;
pub use path::join;
pub use path::segments;
pub use path::split;
pub use path::validate_path;
pub use path::ROOT_PATH;
pub use stat::FirstStat;
pub use stat::IncarnationId;
pub use stat::MutableStat;
pub use stat::ReadOnlyStat;
pub use stat::Stat;
pub use watch::KeeperState;
pub use watch::WatchedEvent;
pub use watch::WatchedEventType;
pub use watch::WatcherKind;
