use crate::persistence::{PersistedData, NO_PARENT};
use crate::tree::children::ChildMap;
use crate::types::{Acl, Stat};
use bytes::Bytes;
use std::fmt;

/// Stable arena key of a node, equal to the id of its persisted record.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(1);

    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node of the tree. The parent link is a plain id used for path reconstruction; the tree
/// arena owns every node.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: ChildMap,
    pub(crate) data: Option<Bytes>,
    pub(crate) acl: Option<Vec<Acl>>,
    pub(crate) stat: Stat,
    pub(crate) ephemeral_owner: u64,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn acl(&self) -> Option<&[Acl]> {
        self.acl.as_deref()
    }

    pub fn stat(&self) -> Stat {
        self.stat
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner != 0
    }

    pub fn ephemeral_owner(&self) -> u64 {
        self.ephemeral_owner
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name)
    }

    /// Record without children; they are linked separately.
    pub(crate) fn from_persisted(record: &PersistedData) -> Node {
        Node {
            id: NodeId::new(record.id),
            name: record.name.clone(),
            parent: if record.parent_id == NO_PARENT {
                None
            } else {
                Some(NodeId::new(record.parent_id))
            },
            children: ChildMap::default(),
            data: record.data.clone(),
            acl: record.acl.clone(),
            stat: Stat::compact(record.stat),
            ephemeral_owner: record.ephemeral_owner,
        }
    }

    /// Children ids are listed in child-name order so every replica serializes the same bytes.
    pub(crate) fn to_persisted(&self) -> PersistedData {
        PersistedData {
            id: self.id.as_u64(),
            name: self.name.clone(),
            parent_id: self.parent.map(|p| p.as_u64()).unwrap_or(NO_PARENT),
            ephemeral_owner: self.ephemeral_owner,
            data: self.data.clone(),
            acl: self.acl.clone(),
            stat: self.stat.to_mutable(),
            children_ids: self.children.sorted().into_iter().map(|(_, id)| id.as_u64()).collect(),
        }
    }
}
