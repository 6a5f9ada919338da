use crate::types::Stat;
use bytes::Bytes;

/// A change on the tree that a watcher responds to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: WatchedEventType,
    pub keeper_state: KeeperState,
    pub path: String,
    /// Present only for watchers registered with [`WatcherKind::INCLUDE_DATA`].
    pub data: Option<Bytes>,
    pub stat: Option<Stat>,
}

impl WatchedEvent {
    pub fn new(event_type: WatchedEventType, path: String) -> Self {
        WatchedEvent {
            event_type,
            keeper_state: KeeperState::SyncConnected,
            path,
            data: None,
            stat: None,
        }
    }

    pub fn without_data(&self) -> Self {
        WatchedEvent {
            data: None,
            stat: None,
            ..self.clone()
        }
    }
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeeperState {
    Disconnected = 0,
    SyncConnected = 3,
    AuthFailed = 4,
    Expired = -112,
}

impl From<i32> for KeeperState {
    fn from(code: i32) -> Self {
        match code {
            3 => KeeperState::SyncConnected,
            4 => KeeperState::AuthFailed,
            -112 => KeeperState::Expired,
            _ => KeeperState::Disconnected,
        }
    }
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchedEventType {
    None = -1,
    NodeCreated = 1,
    NodeDeleted = 2,
    NodeDataChanged = 3,
    NodeChildrenChanged = 4,
    /// Sent to every persistent watcher of a session when it is removed.
    WatcherRemoved = 5,
}

impl From<i32> for WatchedEventType {
    fn from(code: i32) -> Self {
        match code {
            1 => WatchedEventType::NodeCreated,
            2 => WatchedEventType::NodeDeleted,
            3 => WatchedEventType::NodeDataChanged,
            4 => WatchedEventType::NodeChildrenChanged,
            5 => WatchedEventType::WatcherRemoved,
            _ => WatchedEventType::None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatcherKind(u8);

impl WatcherKind {
    pub const PERSISTENT: WatcherKind = WatcherKind(0);
    pub const ONE_USE: WatcherKind = WatcherKind(0x1);
    pub const INCLUDE_DATA: WatcherKind = WatcherKind(0x2);

    pub fn from_bits(bits: u8) -> Self {
        WatcherKind(bits & 0x3)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_one_use(&self) -> bool {
        self.0 & WatcherKind::ONE_USE.0 != 0
    }

    pub fn includes_data(&self) -> bool {
        self.0 & WatcherKind::INCLUDE_DATA.0 != 0
    }
}

impl std::ops::BitOr for WatcherKind {
    type Output = WatcherKind;

    fn bitor(self, rhs: WatcherKind) -> WatcherKind {
        WatcherKind(self.0 | rhs.0)
    }
}
