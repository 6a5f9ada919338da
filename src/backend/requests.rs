use crate::backend::Watcher;
use crate::types::{Acl, Code, CreateMode, DeleteMode, Id, MoveMode, Stat, WatchedEvent, WatcherKind};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Watcher attached to a read. Decoded requests carry a `Spec`; the session binds it to a
/// notification route before the backend sees it.
#[derive(Clone)]
pub enum WatcherArg {
    Spec { id: u64, kind: WatcherKind },
    Bound(Arc<dyn Watcher>),
}

impl fmt::Debug for WatcherArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherArg::Spec { id, kind } => write!(f, "Spec({}, {:?})", id, kind),
            WatcherArg::Bound(watcher) => write!(f, "Bound({})", watcher.id()),
        }
    }
}

/// One operation of a multi or batch. Single mutations run as a one-op transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Create {
        path: String,
        data: Option<Bytes>,
        acl: Option<Vec<Acl>>,
        mode: CreateMode,
    },
    Delete {
        path: String,
        version: i32,
        mode: DeleteMode,
    },
    SetData {
        path: String,
        data: Option<Bytes>,
        version: i32,
    },
    SetAcl {
        path: String,
        acl: Option<Vec<Acl>>,
        version: i32,
    },
    Check {
        path: String,
        version: i32,
    },
    GetData {
        path: String,
    },
    Move {
        path: String,
        version: i32,
        destination: String,
        mode: MoveMode,
    },
}

impl Op {
    pub fn path(&self) -> &str {
        match self {
            Op::Create { path, .. }
            | Op::Delete { path, .. }
            | Op::SetData { path, .. }
            | Op::SetAcl { path, .. }
            | Op::Check { path, .. }
            | Op::GetData { path }
            | Op::Move { path, .. } => path,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Op::Check { .. } | Op::GetData { .. })
    }

    pub fn request_type(&self) -> RequestType {
        match self {
            Op::Create { .. } => RequestType::Create,
            Op::Delete { .. } => RequestType::Delete,
            Op::SetData { .. } => RequestType::SetData,
            Op::SetAcl { .. } => RequestType::SetAcl,
            Op::Check { .. } => RequestType::Check,
            Op::GetData { .. } => RequestType::GetData,
            Op::Move { .. } => RequestType::Move,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Request {
    Init {
        session_id: u64,
        auth: Option<Id>,
        is_super: bool,
    },
    Create {
        path: String,
        data: Option<Bytes>,
        acl: Option<Vec<Acl>>,
        mode: CreateMode,
    },
    Delete {
        path: String,
        version: i32,
        mode: DeleteMode,
    },
    Move {
        path: String,
        version: i32,
        destination: String,
        mode: MoveMode,
    },
    SetData {
        path: String,
        data: Option<Bytes>,
        version: i32,
    },
    SetAcl {
        path: String,
        acl: Option<Vec<Acl>>,
        version: i32,
    },
    Check {
        path: String,
        version: i32,
    },
    GetData {
        path: String,
        watcher: Option<WatcherArg>,
    },
    Exists {
        path: String,
        watcher: Option<WatcherArg>,
    },
    GetChildren {
        path: String,
        watcher: Option<WatcherArg>,
        max_count: u32,
        start_after: Option<String>,
    },
    GetAcl {
        path: String,
    },
    Sync {
        path: String,
    },
    /// All or nothing. With a `scheduled_name` the ops run later as a named command.
    Multi {
        ops: Vec<Op>,
        complete_synchronously: bool,
        scheduled_name: Option<String>,
    },
    /// Runs ops in order and keeps everything before the first failure.
    Batch {
        ops: Vec<Op>,
        complete_synchronously: bool,
    },
    Nop,
}

impl Request {
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Init { .. } => RequestType::Init,
            Request::Create { .. } => RequestType::Create,
            Request::Delete { .. } => RequestType::Delete,
            Request::Move { .. } => RequestType::Move,
            Request::SetData { .. } => RequestType::SetData,
            Request::SetAcl { .. } => RequestType::SetAcl,
            Request::Check { .. } => RequestType::Check,
            Request::GetData { .. } => RequestType::GetData,
            Request::Exists { .. } => RequestType::Exists,
            Request::GetChildren { .. } => RequestType::GetChildren,
            Request::GetAcl { .. } => RequestType::GetAcl,
            Request::Sync { .. } => RequestType::Sync,
            Request::Multi { .. } => RequestType::Multi,
            Request::Batch { .. } => RequestType::Batch,
            Request::Nop => RequestType::Nop,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Request::Create { path, .. }
            | Request::Delete { path, .. }
            | Request::Move { path, .. }
            | Request::SetData { path, .. }
            | Request::SetAcl { path, .. }
            | Request::Check { path, .. }
            | Request::GetData { path, .. }
            | Request::Exists { path, .. }
            | Request::GetChildren { path, .. }
            | Request::GetAcl { path }
            | Request::Sync { path } => Some(path),
            Request::Init { .. } | Request::Multi { .. } | Request::Batch { .. } | Request::Nop => None,
        }
    }

    /// The single mutation this request stands for, if it is one.
    pub(crate) fn into_op(self) -> Result<Op, Request> {
        match self {
            Request::Create { path, data, acl, mode } => Ok(Op::Create { path, data, acl, mode }),
            Request::Delete { path, version, mode } => Ok(Op::Delete { path, version, mode }),
            Request::Move {
                path,
                version,
                destination,
                mode,
            } => Ok(Op::Move {
                path,
                version,
                destination,
                mode,
            }),
            Request::SetData { path, data, version } => Ok(Op::SetData { path, data, version }),
            Request::SetAcl { path, acl, version } => Ok(Op::SetAcl { path, acl, version }),
            other => Err(other),
        }
    }

    /// Mutable reference to the watcher argument of a read request.
    pub fn watcher_mut(&mut self) -> Option<&mut Option<WatcherArg>> {
        match self {
            Request::GetData { watcher, .. } | Request::Exists { watcher, .. } | Request::GetChildren { watcher, .. } => {
                Some(watcher)
            }
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestType {
    Init = 0,
    Create = 1,
    Delete = 2,
    Move = 3,
    SetData = 4,
    SetAcl = 5,
    Check = 6,
    GetData = 7,
    Exists = 8,
    GetChildren = 9,
    GetAcl = 10,
    Sync = 11,
    Multi = 12,
    Batch = 13,
    Nop = 14,
}

impl RequestType {
    pub fn from_u8(code: u8) -> Option<Self> {
        let request_type = match code {
            0 => RequestType::Init,
            1 => RequestType::Create,
            2 => RequestType::Delete,
            3 => RequestType::Move,
            4 => RequestType::SetData,
            5 => RequestType::SetAcl,
            6 => RequestType::Check,
            7 => RequestType::GetData,
            8 => RequestType::Exists,
            9 => RequestType::GetChildren,
            10 => RequestType::GetAcl,
            11 => RequestType::Sync,
            12 => RequestType::Multi,
            13 => RequestType::Batch,
            14 => RequestType::Nop,
            _ => return None,
        };
        Some(request_type)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestType::Init => "Init",
            RequestType::Create => "Create",
            RequestType::Delete => "Delete",
            RequestType::Move => "Move",
            RequestType::SetData => "SetData",
            RequestType::SetAcl => "SetAcl",
            RequestType::Check => "Check",
            RequestType::GetData => "GetData",
            RequestType::Exists => "Exists",
            RequestType::GetChildren => "GetChildren",
            RequestType::GetAcl => "GetAcl",
            RequestType::Sync => "Sync",
            RequestType::Multi => "Multi",
            RequestType::Batch => "Batch",
            RequestType::Nop => "Nop",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestCall {
    pub call_id: u64,
    pub request: Request,
}

/// Outcome of one op inside a multi or batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpResult {
    Created { path: String, stat: Stat },
    Deleted,
    DataSet(Stat),
    AclSet(Stat),
    Checked(Stat),
    Data { data: Option<Bytes>, stat: Stat },
    Moved(String),
    Error(Code),
}

impl OpResult {
    pub fn code(&self) -> Code {
        match self {
            OpResult::Error(code) => *code,
            _ => Code::Ok,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseContent {
    None,
    Data(Option<Bytes>),
    Children(Vec<String>),
    Acl(Option<Vec<Acl>>),
    Path(String),
    Results(Vec<OpResult>),
    /// Connection string of the suggested primary.
    Redirect(String),
    Session(u64),
    /// Pushed to the client when one of its watchers fires.
    Notification { watcher_id: u64, event: WatchedEvent },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestResponse {
    pub call_id: u64,
    pub code: Code,
    pub path: Option<String>,
    pub stat: Option<Stat>,
    pub content: ResponseContent,
}

impl RequestResponse {
    pub fn new(code: Code) -> Self {
        RequestResponse {
            call_id: 0,
            code,
            path: None,
            stat: None,
            content: ResponseContent::None,
        }
    }

    pub fn ok(stat: Option<Stat>, content: ResponseContent) -> Self {
        RequestResponse {
            stat,
            content,
            ..Self::new(Code::Ok)
        }
    }

    pub fn with_call_id(mut self, call_id: u64) -> Self {
        self.call_id = call_id;
        self
    }

    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }
}

impl From<Code> for RequestResponse {
    fn from(code: Code) -> Self {
        RequestResponse::new(code)
    }
}
