use crate::persistence::{Change, IdAllocator};
use crate::tree::children::ChildMap;
use crate::tree::view::{self, check_version};
use crate::tree::{Node, NodeId, NodeLookup, NodeTree};
use crate::types::{
    is_same_or_descendant, join, segments, split, validate_acl, validate_path, Acl, Code, CreateMode, DeleteMode,
    FirstStat, MoveMode, Perms, SessionAuth, Stat, WatchedEvent, WatchedEventType, ROOT_PATH,
};
use bytes::Bytes;
use std::collections::HashMap;

/// Result of a create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Created {
    /// Final path, including the sequence suffix of sequential nodes.
    pub path: String,
    pub stat: Stat,
    /// False when the node already existed and the mode allowed it.
    pub created: bool,
}

struct StagedEvent {
    event_type: WatchedEventType,
    path: String,
    node: Option<NodeId>,
}

struct PathPlan<'p> {
    existing: NodeId,
    missing: Vec<&'p str>,
}

/// What a finished transaction produced.
pub struct TransactionOutcome {
    pub(crate) staged: HashMap<NodeId, Option<Node>>,
    pub changes: Vec<Change>,
    pub events: Vec<WatchedEvent>,
    pub zxid: i64,
}

impl TransactionOutcome {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Copy-on-write overlay over a [`NodeTree`].
///
/// Every operation validates against the overlay before it touches anything, so a failed
/// operation leaves the overlay exactly as it found it. Nodes are cloned into the overlay on
/// first write; the tree itself is only changed when the outcome is published.
pub struct TreeTransaction<'a> {
    tree: &'a NodeTree,
    ids: &'a IdAllocator,
    auth: &'a SessionAuth,
    zxid: i64,
    time: i64,
    staged: HashMap<NodeId, Option<Node>>,
    touched: Vec<NodeId>,
    events: Vec<StagedEvent>,
}

impl NodeLookup for TreeTransaction<'_> {
    fn node(&self, id: NodeId) -> Option<&Node> {
        match self.staged.get(&id) {
            Some(staged) => staged.as_ref(),
            None => self.tree.node(id),
        }
    }
}

fn data_length(data: &Option<Bytes>) -> i32 {
    data.as_ref().map_or(0, |d| d.len() as i32)
}

fn children_changed(node: &mut Node, zxid: i64, time: i64, delta: i32, ephemeral: bool) {
    node.stat.update(|s| {
        s.cversion += 1;
        s.pzxid = zxid;
        s.mzxid = zxid;
        s.mtime = time;
        s.num_children += delta;
        if ephemeral {
            s.num_ephemeral_children += delta;
        }
    });
}

impl<'a> TreeTransaction<'a> {
    pub fn new(tree: &'a NodeTree, ids: &'a IdAllocator, auth: &'a SessionAuth, zxid: i64, time: i64) -> Self {
        TreeTransaction {
            tree,
            ids,
            auth,
            zxid,
            time,
            staged: HashMap::new(),
            touched: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn zxid(&self) -> i64 {
        self.zxid
    }

    pub fn auth(&self) -> &SessionAuth {
        self.auth
    }

    pub fn has_changes(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Creates the root node when the tree has none.
    pub fn ensure_root(&mut self) -> bool {
        if self.root().is_some() {
            return false;
        }
        self.ids.observe(NodeId::ROOT.as_u64());
        let root = Node {
            id: NodeId::ROOT,
            name: String::new(),
            parent: None,
            children: ChildMap::default(),
            data: None,
            acl: None,
            stat: Stat::First(FirstStat::new(self.zxid, self.time, 0)),
            ephemeral_owner: 0,
        };
        self.put_staged(NodeId::ROOT, Some(root));
        true
    }

    pub fn create(
        &mut self,
        path: &str,
        data: Option<Bytes>,
        acl: Option<Vec<Acl>>,
        mode: CreateMode,
    ) -> Result<Created, Code> {
        validate_path(path)?;
        if !mode.is_valid() {
            return Err(Code::BadArguments);
        }
        validate_acl(acl.as_deref())?;
        if mode.is_ephemeral() && self.auth.session_id == 0 {
            return Err(Code::BadArguments);
        }

        if !mode.is_sequential() {
            if let Some(existing) = self.lookup(path) {
                return if mode.succeeds_if_exists() {
                    Ok(Created {
                        path: path.to_string(),
                        stat: existing.stat(),
                        created: false,
                    })
                } else {
                    Err(Code::NodeExists)
                };
            }
        }
        if path == ROOT_PATH {
            return Err(Code::BadArguments);
        }

        let (parent_path, requested_name) = split(path);
        let plan = self.plan_path(parent_path, mode.allows_path_creation())?;
        let existing = self.node(plan.existing).ok_or(Code::SystemError)?;
        self.auth.check(existing.acl(), Perms::CREATE)?;

        let name = if mode.is_sequential() {
            let cversion = if plan.missing.is_empty() { existing.stat().cversion() } else { 1 };
            format!("{}{:010}", requested_name, cversion)
        } else {
            requested_name.to_string()
        };
        if plan.missing.is_empty() && existing.child(&name).is_some() {
            return Err(Code::NodeExists);
        }

        let full_path = join(parent_path, &name);
        if !self.auth.is_super {
            let limits = self.tree.limits();
            limits.check_path(&full_path)?;
            limits.check_name(&name)?;
            for segment in &plan.missing {
                limits.check_name(segment)?;
            }
            limits.check_data(data_length(&data) as usize)?;
        }

        let mut parent = plan.existing;
        for segment in plan.missing {
            parent = self.attach(parent, segment, None, acl.clone(), 0)?;
        }
        let owner = if mode.is_ephemeral() { self.auth.session_id } else { 0 };
        let id = self.attach(parent, &name, data, acl, owner)?;
        let stat = self.node(id).ok_or(Code::SystemError)?.stat();

        Ok(Created {
            path: full_path,
            stat,
            created: true,
        })
    }

    pub fn set_data(&mut self, path: &str, data: Option<Bytes>, version: i32) -> Result<Stat, Code> {
        let node = self.find(path)?;
        self.auth.check(node.acl(), Perms::WRITE)?;
        check_version(version, node.stat().version())?;
        if !self.auth.is_super {
            self.tree.limits().check_data(data_length(&data) as usize)?;
        }

        let id = node.id();
        let (zxid, time) = (self.zxid, self.time);
        let node = self.stage(id)?;
        let length = data_length(&data);
        node.data = data;
        node.stat.update(|s| {
            s.version += 1;
            s.mzxid = zxid;
            s.mtime = time;
            s.data_length = length;
        });
        let stat = node.stat();
        self.record_event(WatchedEventType::NodeDataChanged, path.to_string(), Some(id));
        Ok(stat)
    }

    pub fn set_acl(&mut self, path: &str, acl: Option<Vec<Acl>>, version: i32) -> Result<Stat, Code> {
        let node = self.find(path)?;
        self.auth.check(node.acl(), Perms::ADMIN)?;
        check_version(version, node.stat().aversion())?;
        validate_acl(acl.as_deref())?;

        let id = node.id();
        let (zxid, time) = (self.zxid, self.time);
        let node = self.stage(id)?;
        node.acl = acl;
        node.stat.update(|s| {
            s.aversion += 1;
            s.mzxid = zxid;
            s.mtime = time;
        });
        let stat = node.stat();
        self.record_event(WatchedEventType::NodeDataChanged, path.to_string(), Some(id));
        Ok(stat)
    }

    /// Returns false when the node was already missing and the mode allowed it.
    pub fn delete(&mut self, path: &str, version: i32, mode: DeleteMode) -> Result<bool, Code> {
        validate_path(path)?;
        if path == ROOT_PATH {
            return Err(Code::BadArguments);
        }
        let node = match self.lookup(path) {
            Some(node) => node,
            None if mode.succeeds_if_missing() => return Ok(false),
            None => return Err(Code::NoNode),
        };
        check_version(version, node.stat().version())?;
        if node.child_count() > 0 && !mode.is_cascade() {
            return Err(Code::NotEmpty);
        }
        let parent = node.parent().and_then(|p| self.node(p)).ok_or(Code::SystemError)?;
        self.auth.check(parent.acl(), Perms::DELETE)?;

        let id = node.id();
        self.remove_subtree(id, path.to_string())?;
        Ok(true)
    }

    /// Re-parents the node at `source` under `destination_parent`, keeping its name. Returns the
    /// node's new path.
    pub fn move_node(
        &mut self,
        source: &str,
        version: i32,
        destination_parent: &str,
        mode: MoveMode,
    ) -> Result<String, Code> {
        validate_path(source)?;
        validate_path(destination_parent)?;
        if source == ROOT_PATH || is_same_or_descendant(destination_parent, source) {
            return Err(Code::BadArguments);
        }

        let node = self.lookup(source).ok_or(Code::NoNode)?;
        check_version(version, node.stat().version())?;
        if mode.requires_empty_source() && node.child_count() > 0 {
            return Err(Code::NotEmpty);
        }
        let old_parent = node.parent().and_then(|p| self.node(p)).ok_or(Code::SystemError)?;
        self.auth.check(old_parent.acl(), Perms::DELETE)?;

        let plan = self.plan_path(destination_parent, mode.allows_path_creation())?;
        let existing = self.node(plan.existing).ok_or(Code::SystemError)?;
        self.auth.check(existing.acl(), Perms::CREATE)?;
        if plan.missing.is_empty() && existing.child(node.name()).is_some() {
            return Err(Code::NodeExists);
        }

        let name = node.name().to_string();
        let new_path = join(destination_parent, &name);
        if !self.auth.is_super {
            let limits = self.tree.limits();
            limits.check_path(&new_path)?;
            for segment in &plan.missing {
                limits.check_name(segment)?;
            }
        }

        let (id, old_parent_id, ephemeral) = (node.id(), old_parent.id(), node.is_ephemeral());
        let inherited_acl = existing.acl.clone();
        let mut new_parent = plan.existing;
        for segment in plan.missing {
            new_parent = self.attach(new_parent, segment, None, inherited_acl.clone(), 0)?;
        }

        let (zxid, time) = (self.zxid, self.time);
        let thresholds = self.tree.limits().child_thresholds;
        let parent = self.stage(old_parent_id)?;
        parent.children.remove(&name, thresholds);
        children_changed(parent, zxid, time, -1, ephemeral);

        let parent = self.stage(new_parent)?;
        if !parent.children.insert(name.clone(), id, thresholds) {
            return Err(Code::SystemError);
        }
        children_changed(parent, zxid, time, 1, ephemeral);
        self.stage(id)?.parent = Some(new_parent);

        let old_parent_path = split(source).0.to_string();
        self.record_event(WatchedEventType::NodeDeleted, source.to_string(), None);
        self.record_event(WatchedEventType::NodeChildrenChanged, old_parent_path, Some(old_parent_id));
        self.record_event(WatchedEventType::NodeCreated, new_path.clone(), Some(id));
        self.record_event(
            WatchedEventType::NodeChildrenChanged,
            destination_parent.to_string(),
            Some(new_parent),
        );
        Ok(new_path)
    }

    pub fn check(&self, path: &str, version: i32) -> Result<Stat, Code> {
        view::check(self, path, version)
    }

    pub fn get_data(&self, path: &str) -> Result<(Option<Bytes>, Stat), Code> {
        view::get_data(self, path, self.auth)
    }

    pub fn ephemeral_owners(&self) -> Vec<u64> {
        self.tree.ephemeral_owners()
    }

    /// Removes every ephemeral node owned by `session_id`. Returns how many were removed.
    pub fn remove_ephemerals(&mut self, session_id: u64) -> Result<usize, Code> {
        let mut removed = 0;
        for id in self.tree.ephemerals_of(session_id) {
            if let Some(path) = self.path_of(id) {
                self.remove_subtree(id, path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Collapses the overlay into one change per touched node, in first-touch order.
    pub fn finish(self) -> TransactionOutcome {
        let mut changes = Vec::with_capacity(self.touched.len());
        for id in &self.touched {
            match (self.tree.node(*id), self.staged.get(id)) {
                (None, Some(Some(after))) => changes.push(Change::add(after.to_persisted())),
                (Some(_), Some(Some(after))) => changes.push(Change::update(after.to_persisted())),
                (Some(before), Some(None)) => changes.push(Change::remove(before.to_persisted())),
                _ => {}
            }
        }

        let events = self
            .events
            .iter()
            .map(|staged| {
                let mut event = WatchedEvent::new(staged.event_type, staged.path.clone());
                if let Some(node) = staged.node.and_then(|id| self.node(id)) {
                    event.data = node.data().cloned();
                    event.stat = Some(node.stat());
                }
                event
            })
            .collect();

        TransactionOutcome {
            staged: self.staged,
            changes,
            events,
            zxid: self.zxid,
        }
    }

    fn find(&self, path: &str) -> Result<&Node, Code> {
        validate_path(path)?;
        self.lookup(path).ok_or(Code::NoNode)
    }

    /// Splits `path` into its deepest existing node and the segments below it that are missing.
    fn plan_path<'p>(&self, path: &'p str, allow_creation: bool) -> Result<PathPlan<'p>, Code> {
        let mut current = self.root().ok_or(Code::NoNode)?;
        let mut rest = segments(path);
        let mut missing = Vec::new();
        for segment in rest.by_ref() {
            match current.child(segment) {
                Some(child) => current = self.node(child).ok_or(Code::SystemError)?,
                None => {
                    missing.push(segment);
                    break;
                }
            }
        }
        missing.extend(rest);

        if !missing.is_empty() && !allow_creation {
            return Err(Code::NoNode);
        }
        if current.is_ephemeral() {
            return Err(Code::NoChildrenForEphemerals);
        }
        Ok(PathPlan {
            existing: current.id(),
            missing,
        })
    }

    fn attach(
        &mut self,
        parent_id: NodeId,
        name: &str,
        data: Option<Bytes>,
        acl: Option<Vec<Acl>>,
        ephemeral_owner: u64,
    ) -> Result<NodeId, Code> {
        let id = NodeId::new(self.ids.next());
        let (zxid, time) = (self.zxid, self.time);
        let thresholds = self.tree.limits().child_thresholds;

        let parent = self.stage(parent_id)?;
        if !parent.children.insert(name.to_string(), id, thresholds) {
            return Err(Code::NodeExists);
        }
        children_changed(parent, zxid, time, 1, ephemeral_owner != 0);

        let node = Node {
            id,
            name: name.to_string(),
            parent: Some(parent_id),
            children: ChildMap::default(),
            stat: Stat::First(FirstStat::new(zxid, time, data_length(&data))),
            data,
            acl,
            ephemeral_owner,
        };
        self.put_staged(id, Some(node));

        let parent_path = self.path_of(parent_id).ok_or(Code::SystemError)?;
        self.record_event(WatchedEventType::NodeCreated, join(&parent_path, name), Some(id));
        self.record_event(WatchedEventType::NodeChildrenChanged, parent_path, Some(parent_id));
        Ok(id)
    }

    fn remove_subtree(&mut self, id: NodeId, path: String) -> Result<(), Code> {
        let node = self.node(id).ok_or(Code::NoNode)?;
        let parent_id = node.parent().ok_or(Code::BadArguments)?;
        let (name, ephemeral) = (node.name.clone(), node.is_ephemeral());

        let mut subtree = self.subtree(id, path.clone());
        subtree.reverse();
        for (descendant, descendant_path) in subtree {
            self.put_staged(descendant, None);
            self.record_event(WatchedEventType::NodeDeleted, descendant_path, None);
        }

        let (zxid, time) = (self.zxid, self.time);
        let thresholds = self.tree.limits().child_thresholds;
        let parent = self.stage(parent_id)?;
        parent.children.remove(&name, thresholds);
        children_changed(parent, zxid, time, -1, ephemeral);
        self.record_event(WatchedEventType::NodeChildrenChanged, split(&path).0.to_string(), Some(parent_id));
        Ok(())
    }

    /// `id` and its descendants with their paths, parents before children.
    fn subtree(&self, id: NodeId, path: String) -> Vec<(NodeId, String)> {
        let mut out = Vec::new();
        let mut stack = vec![(id, path)];
        while let Some((id, path)) = stack.pop() {
            if let Some(node) = self.node(id) {
                for (name, child) in node.children.sorted() {
                    stack.push((child, join(&path, name)));
                }
            }
            out.push((id, path));
        }
        out
    }

    fn stage(&mut self, id: NodeId) -> Result<&mut Node, Code> {
        if !self.staged.contains_key(&id) {
            let node = self.tree.node(id).cloned().ok_or(Code::SystemError)?;
            self.put_staged(id, Some(node));
        }
        self.staged.get_mut(&id).and_then(Option::as_mut).ok_or(Code::SystemError)
    }

    fn put_staged(&mut self, id: NodeId, node: Option<Node>) {
        if self.staged.insert(id, node).is_none() {
            self.touched.push(id);
        }
    }

    fn record_event(&mut self, event_type: WatchedEventType, path: String, node: Option<NodeId>) {
        self.events.push(StagedEvent { event_type, path, node });
    }
}
