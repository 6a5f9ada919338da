use crate::types::Code;
use std::fmt;
use std::ops::BitOr;

/// Permission bits granted by an ACL entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Perms(u32);

impl Perms {
    pub const NONE: Perms = Perms(0);
    pub const READ: Perms = Perms(1);
    pub const WRITE: Perms = Perms(2);
    pub const CREATE: Perms = Perms(4);
    pub const DELETE: Perms = Perms(8);
    pub const ADMIN: Perms = Perms(16);
    pub const ALL: Perms = Perms(31);

    pub fn from_code(code: u32) -> Self {
        Perms(code & Perms::ALL.0)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Perms) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Perms {
    type Output = Perms;

    fn bitor(self, rhs: Perms) -> Perms {
        Perms(self.0 | rhs.0)
    }
}

impl fmt::Debug for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Perms::READ, 'r'),
            (Perms::WRITE, 'w'),
            (Perms::CREATE, 'c'),
            (Perms::DELETE, 'd'),
            (Perms::ADMIN, 'a'),
        ];
        for (perm, c) in names {
            write!(f, "{}", if self.contains(perm) { c } else { '-' })?;
        }
        Ok(())
    }
}

/// Authenticated identity, `scheme:identifier`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Id {
    pub scheme: String,
    pub identifier: String,
}

impl Id {
    pub fn new<S: Into<String>, I: Into<String>>(scheme: S, identifier: I) -> Self {
        Id {
            scheme: scheme.into(),
            identifier: identifier.into(),
        }
    }

    pub fn anyone() -> Self {
        Id::new("world", "anyone")
    }

    pub fn is_anyone(&self) -> bool {
        self.scheme == "world" && self.identifier == "anyone"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Acl {
    pub perms: Perms,
    pub id: Id,
}

impl Acl {
    pub fn new(perms: Perms, id: Id) -> Self {
        Acl { perms, id }
    }

    /// Everyone may do everything.
    pub fn open_unsafe() -> Vec<Acl> {
        vec![Acl::new(Perms::ALL, Id::anyone())]
    }

    /// Everyone may read.
    pub fn read_unsafe() -> Vec<Acl> {
        vec![Acl::new(Perms::READ, Id::anyone())]
    }

    fn is_valid(&self) -> bool {
        !self.id.scheme.is_empty() && !self.id.identifier.is_empty()
    }
}

pub fn validate_acl(acl: Option<&[Acl]>) -> Result<(), Code> {
    match acl {
        Some(entries) if !entries.iter().all(Acl::is_valid) => Err(Code::InvalidAcl),
        _ => Ok(()),
    }
}

/// Identity a request executes under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionAuth {
    pub session_id: u64,
    pub ids: Vec<Id>,
    /// Bypasses ACL checks and limits.
    pub is_super: bool,
}

impl SessionAuth {
    pub fn new(session_id: u64, ids: Vec<Id>) -> Self {
        SessionAuth {
            session_id,
            ids,
            is_super: false,
        }
    }

    pub fn super_user(session_id: u64) -> Self {
        SessionAuth {
            session_id,
            ids: Vec::new(),
            is_super: true,
        }
    }

    /// Checks `needed` against a node's ACL. A node without an ACL is open to everyone.
    pub fn check(&self, acl: Option<&[Acl]>, needed: Perms) -> Result<(), Code> {
        if self.is_super {
            return Ok(());
        }

        let entries = match acl {
            None => return Ok(()),
            Some(entries) => entries,
        };

        let allowed = entries
            .iter()
            .filter(|entry| entry.perms.contains(needed))
            .any(|entry| entry.id.is_anyone() || self.ids.contains(&entry.id));

        if allowed {
            Ok(())
        } else {
            Err(Code::AuthFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_acl_is_open() {
        let auth = SessionAuth::new(1, vec![]);
        assert_eq!(auth.check(None, Perms::ADMIN), Ok(()));
    }

    #[test]
    fn world_entry_matches_everyone() {
        let auth = SessionAuth::new(1, vec![]);
        let acl = Acl::read_unsafe();
        assert_eq!(auth.check(Some(&acl), Perms::READ), Ok(()));
        assert_eq!(auth.check(Some(&acl), Perms::WRITE), Err(Code::AuthFailed));
    }

    #[test]
    fn identity_must_match() {
        let alice = Id::new("digest", "alice");
        let acl = vec![Acl::new(Perms::READ | Perms::WRITE, alice.clone())];

        assert_eq!(SessionAuth::new(1, vec![alice]).check(Some(&acl), Perms::WRITE), Ok(()));
        assert_eq!(
            SessionAuth::new(2, vec![Id::new("digest", "bob")]).check(Some(&acl), Perms::WRITE),
            Err(Code::AuthFailed)
        );
        assert_eq!(SessionAuth::super_user(3).check(Some(&acl), Perms::ADMIN), Ok(()));
    }

    #[test]
    fn empty_scheme_is_invalid() {
        let acl = vec![Acl::new(Perms::ALL, Id::new("", "x"))];
        assert_eq!(validate_acl(Some(&acl)), Err(Code::InvalidAcl));
        assert_eq!(validate_acl(Some(&Acl::open_unsafe())), Ok(()));
        assert_eq!(validate_acl(None), Ok(()));
    }
}
