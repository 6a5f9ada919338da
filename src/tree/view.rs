use crate::tree::{Node, NodeId, TreeLimits};
use crate::types::{segments, validate_path, Acl, Code, Perms, SessionAuth, Stat};
use bytes::Bytes;

/// Read access to a tree, either the committed one or a transaction's staged view of it.
pub trait NodeLookup {
    fn node(&self, id: NodeId) -> Option<&Node>;

    fn root(&self) -> Option<&Node> {
        self.node(NodeId::ROOT)
    }

    fn lookup(&self, path: &str) -> Option<&Node> {
        let mut current = self.root()?;
        for segment in segments(path) {
            current = self.node(current.child(segment)?)?;
        }
        Some(current)
    }

    fn path_of(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent() {
            names.push(current.name());
            current = self.node(parent)?;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }
}

pub(crate) fn check_version(expected: i32, actual: i32) -> Result<(), Code> {
    if expected == -1 || expected == actual {
        Ok(())
    } else {
        Err(Code::BadVersion)
    }
}

fn find<'a, L: NodeLookup + ?Sized>(view: &'a L, path: &str) -> Result<&'a Node, Code> {
    validate_path(path)?;
    view.lookup(path).ok_or(Code::NoNode)
}

pub fn exists<L: NodeLookup + ?Sized>(view: &L, path: &str) -> Result<Stat, Code> {
    Ok(find(view, path)?.stat())
}

pub fn get_data<L: NodeLookup + ?Sized>(
    view: &L,
    path: &str,
    auth: &SessionAuth,
) -> Result<(Option<Bytes>, Stat), Code> {
    let node = find(view, path)?;
    auth.check(node.acl(), Perms::READ)?;
    Ok((node.data().cloned(), node.stat()))
}

pub fn get_acl<L: NodeLookup + ?Sized>(
    view: &L,
    path: &str,
    auth: &SessionAuth,
) -> Result<(Option<Vec<Acl>>, Stat), Code> {
    let node = find(view, path)?;
    auth.check(node.acl(), Perms::READ)?;
    Ok((node.acl().map(|a| a.to_vec()), node.stat()))
}

pub fn get_children<L: NodeLookup + ?Sized>(
    view: &L,
    path: &str,
    auth: &SessionAuth,
    limits: &TreeLimits,
    max_count: u32,
    start_after: Option<&str>,
) -> Result<(Vec<String>, Stat), Code> {
    let node = find(view, path)?;
    auth.check(node.acl(), Perms::READ)?;
    let limit = if auth.is_super && max_count == 0 {
        usize::MAX
    } else if auth.is_super {
        max_count as usize
    } else {
        limits.enumeration_count(max_count)
    };
    Ok((node.children.names_after(start_after, limit), node.stat()))
}

pub fn check<L: NodeLookup + ?Sized>(view: &L, path: &str, version: i32) -> Result<Stat, Code> {
    let node = find(view, path)?;
    check_version(version, node.stat().version())?;
    Ok(node.stat())
}
