use crate::persistence::{ChangeList, ChangeType, PersistedData};
use crate::tree::children::ChildMap;
use crate::tree::{Node, NodeId, NodeLookup, TreeLimits};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, thiserror::Error)]
pub enum TreeLoadError {
    #[error("record {parent} lists child {child} which does not exist")]
    DanglingChild { parent: u64, child: u64 },

    #[error("record {parent} lists two children named '{name}'")]
    DuplicateName { parent: u64, name: String },

    #[error("record {0} is not reachable from the root")]
    Unreachable(u64),
}

/// The authoritative in-memory hierarchy: an arena of nodes keyed by id.
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    ephemerals: HashMap<u64, BTreeSet<NodeId>>,
    limits: TreeLimits,
    last_zxid: i64,
}

impl NodeLookup for NodeTree {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }
}

impl NodeTree {
    pub fn new(limits: TreeLimits) -> Self {
        NodeTree {
            nodes: HashMap::new(),
            ephemerals: HashMap::new(),
            limits,
            last_zxid: 0,
        }
    }

    /// Builds a tree from a full set of records, e.g. a snapshot or a store's table.
    pub fn load(records: &[PersistedData], last_zxid: i64, limits: TreeLimits) -> Result<Self, TreeLoadError> {
        let mut tree = NodeTree::new(limits);
        for record in records {
            tree.put(Node::from_persisted(record));
        }
        for record in records {
            tree.link_children(record)?;
        }
        tree.last_zxid = records
            .iter()
            .map(|r| r.stat.mzxid.max(r.stat.pzxid))
            .fold(last_zxid, i64::max);

        if let Some(orphan) = tree.nodes.keys().find(|id| tree.path_of(**id).is_none()) {
            return Err(TreeLoadError::Unreachable(orphan.as_u64()));
        }

        Ok(tree)
    }

    pub fn limits(&self) -> &TreeLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last_zxid(&self) -> i64 {
        self.last_zxid
    }

    pub(crate) fn set_last_zxid(&mut self, zxid: i64) {
        self.last_zxid = self.last_zxid.max(zxid);
    }

    pub fn max_id(&self) -> u64 {
        self.nodes.keys().map(|id| id.as_u64()).max().unwrap_or(0)
    }

    /// Ephemeral nodes owned by `session_id`.
    pub fn ephemerals_of(&self, session_id: u64) -> Vec<NodeId> {
        self.ephemerals
            .get(&session_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn ephemeral_owners(&self) -> Vec<u64> {
        self.ephemerals.keys().copied().collect()
    }

    /// Every node as a record, in id order.
    pub fn records(&self) -> Vec<PersistedData> {
        let mut records: Vec<_> = self.nodes.values().map(Node::to_persisted).collect();
        records.sort_unstable_by_key(|r| r.id);
        records
    }

    /// Makes a transaction's staged nodes authoritative.
    pub(crate) fn publish(&mut self, staged: HashMap<NodeId, Option<Node>>, zxid: i64) {
        for (id, node) in staged {
            match node {
                Some(node) => self.put(node),
                None => self.take(id),
            }
        }
        self.set_last_zxid(zxid);
    }

    /// Applies a change-list committed elsewhere. Records are replaced first, then the children
    /// maps of every added or updated record are rebuilt from its children ids.
    pub fn apply_committed(&mut self, list: &ChangeList) -> Result<(), TreeLoadError> {
        for change in &list.changes {
            match change.change_type {
                ChangeType::Add | ChangeType::Update => self.put(Node::from_persisted(&change.data)),
                ChangeType::Remove => self.take(NodeId::new(change.data.id)),
            }
        }
        for change in &list.changes {
            if change.change_type != ChangeType::Remove && self.nodes.contains_key(&NodeId::new(change.data.id)) {
                self.link_children(&change.data)?;
            }
        }
        self.set_last_zxid(list.id as i64);
        Ok(())
    }

    fn link_children(&mut self, record: &PersistedData) -> Result<(), TreeLoadError> {
        let mut children = ChildMap::default();
        for child_id in &record.children_ids {
            let child = self.nodes.get(&NodeId::new(*child_id)).ok_or(TreeLoadError::DanglingChild {
                parent: record.id,
                child: *child_id,
            })?;
            if !children.insert(child.name.clone(), child.id, self.limits.child_thresholds) {
                return Err(TreeLoadError::DuplicateName {
                    parent: record.id,
                    name: child.name.clone(),
                });
            }
        }
        if let Some(node) = self.nodes.get_mut(&NodeId::new(record.id)) {
            node.children = children;
        }
        Ok(())
    }

    fn put(&mut self, node: Node) {
        if node.is_ephemeral() {
            self.ephemerals.entry(node.ephemeral_owner).or_default().insert(node.id);
        }
        if let Some(previous) = self.nodes.insert(node.id, node) {
            let current_owner = self.nodes.get(&previous.id).map(|n| n.ephemeral_owner);
            if previous.is_ephemeral() && current_owner != Some(previous.ephemeral_owner) {
                self.forget_ephemeral(previous.ephemeral_owner, previous.id);
            }
        }
    }

    fn take(&mut self, id: NodeId) {
        if let Some(previous) = self.nodes.remove(&id) {
            if previous.is_ephemeral() {
                self.forget_ephemeral(previous.ephemeral_owner, id);
            }
        }
    }

    fn forget_ephemeral(&mut self, owner: u64, id: NodeId) {
        if let Some(ids) = self.ephemerals.get_mut(&owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.ephemerals.remove(&owner);
            }
        }
    }
}
