use std::fmt;

/// Result code attached to every response and to every operation inside a multi or batch.
///
/// Values follow the ZooKeeper numbering where an equivalent exists.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    /// Unexpected internal failure.
    SystemError = -1,
    /// The operation would have succeeded but a later operation of the same multi failed.
    RolledBack = -2,
    /// The operation was not attempted because an earlier operation failed.
    Skipped = -3,
    Unimplemented = -6,
    /// The outcome is unknown; the change may still commit.
    OperationTimeout = -7,
    BadArguments = -8,
    /// The primary lost its role while the request was waiting for its commit.
    OperationCancelled = -9,
    NoNode = -101,
    BadVersion = -103,
    NoChildrenForEphemerals = -108,
    NodeExists = -110,
    NotEmpty = -111,
    InvalidAcl = -114,
    AuthFailed = -115,
    SessionMoved = -118,
}

impl Code {
    pub fn is_ok(&self) -> bool {
        *self == Code::Ok
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Code> {
        let code = match code {
            0 => Code::Ok,
            -1 => Code::SystemError,
            -2 => Code::RolledBack,
            -3 => Code::Skipped,
            -6 => Code::Unimplemented,
            -7 => Code::OperationTimeout,
            -8 => Code::BadArguments,
            -9 => Code::OperationCancelled,
            -101 => Code::NoNode,
            -103 => Code::BadVersion,
            -108 => Code::NoChildrenForEphemerals,
            -110 => Code::NodeExists,
            -111 => Code::NotEmpty,
            -114 => Code::InvalidAcl,
            -115 => Code::AuthFailed,
            -118 => Code::SessionMoved,
            _ => return None,
        };

        Some(code)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_survive_i32_conversion() {
        for code in [
            Code::Ok,
            Code::SystemError,
            Code::RolledBack,
            Code::Skipped,
            Code::OperationTimeout,
            Code::OperationCancelled,
            Code::NoNode,
            Code::SessionMoved,
        ] {
            assert_eq!(Code::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(Code::from_i32(12345), None);
    }
}
