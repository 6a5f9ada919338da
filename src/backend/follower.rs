use crate::persistence::{ChangeList, ChangeType};
use crate::tree::{NodeId, NodeLookup, NodeTree, TreeLoadError};
use crate::types::{WatchedEvent, WatchedEventType};

fn event(tree: &NodeTree, event_type: WatchedEventType, path: String, id: NodeId) -> WatchedEvent {
    let mut event = WatchedEvent::new(event_type, path);
    if let Some(node) = tree.node(id) {
        event.data = node.data().cloned();
        event.stat = Some(node.stat());
    }
    event
}

/// Applies a change-list committed by some primary and returns the watcher events it implies.
///
/// Events are derived from the records: removals are reported at their old path, additions at
/// their new one, and updates as data or children changes depending on which versions moved.
pub(crate) fn apply_replicated(tree: &mut NodeTree, list: &ChangeList) -> Result<Vec<WatchedEvent>, TreeLoadError> {
    let mut removed = Vec::new();
    let mut updated = Vec::new();
    for change in &list.changes {
        let id = NodeId::new(change.data.id);
        match change.change_type {
            ChangeType::Add => {}
            ChangeType::Remove => removed.extend(tree.path_of(id)),
            ChangeType::Update => {
                if let Some(old) = tree.node(id).map(|n| n.stat()) {
                    let new = &change.data.stat;
                    let data_changed = old.version() != new.version || old.aversion() != new.aversion;
                    let children_changed = old.cversion() != new.cversion;
                    updated.push((id, data_changed, children_changed));
                }
            }
        }
    }

    tree.apply_committed(list)?;

    let mut events: Vec<WatchedEvent> = removed
        .into_iter()
        .map(|path| WatchedEvent::new(WatchedEventType::NodeDeleted, path))
        .collect();
    for change in list.changes.iter().filter(|c| c.change_type == ChangeType::Add) {
        let id = NodeId::new(change.data.id);
        if let Some(path) = tree.path_of(id) {
            events.push(event(tree, WatchedEventType::NodeCreated, path, id));
        }
    }
    for (id, data_changed, children_changed) in updated {
        let path = match tree.path_of(id) {
            Some(path) => path,
            None => continue,
        };
        if data_changed {
            events.push(event(tree, WatchedEventType::NodeDataChanged, path.clone(), id));
        }
        if children_changed {
            events.push(event(tree, WatchedEventType::NodeChildrenChanged, path, id));
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{Change, IdAllocator, PersistedData, NO_PARENT};
    use crate::tree::{TreeLimits, TreeTransaction};
    use crate::types::{CreateMode, DeleteMode, MutableStat, SessionAuth};
    use bytes::Bytes;

    #[test]
    fn replicated_lists_produce_watch_events() {
        let ids = IdAllocator::default();
        let auth = SessionAuth::super_user(0);
        let mut primary = NodeTree::new(TreeLimits::default());
        let mut secondary = NodeTree::new(TreeLimits::default());

        let mut lists = Vec::new();
        for zxid in 1..=3 {
            let mut txn = TreeTransaction::new(&primary, &ids, &auth, zxid, zxid);
            match zxid {
                1 => {
                    txn.ensure_root();
                    txn.create("/a", None, None, CreateMode::PERSISTENT).unwrap();
                }
                2 => {
                    txn.set_data("/a", Some(Bytes::from_static(b"x")), -1).unwrap();
                }
                _ => {
                    txn.delete("/a", -1, DeleteMode::NONE).unwrap();
                }
            }
            let outcome = txn.finish();
            lists.push(ChangeList::new(zxid as u64, outcome.changes.clone()));
            primary.publish(outcome.staged, outcome.zxid);
        }

        let created = apply_replicated(&mut secondary, &lists[0]).unwrap();
        assert!(created
            .iter()
            .any(|e| e.event_type == WatchedEventType::NodeCreated && e.path == "/a"));

        let changed = apply_replicated(&mut secondary, &lists[1]).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].event_type, WatchedEventType::NodeDataChanged);
        assert_eq!(changed[0].data, Some(Bytes::from_static(b"x")));

        let deleted = apply_replicated(&mut secondary, &lists[2]).unwrap();
        let types: Vec<_> = deleted.iter().map(|e| (e.event_type, e.path.as_str())).collect();
        assert_eq!(
            types,
            vec![
                (WatchedEventType::NodeDeleted, "/a"),
                (WatchedEventType::NodeChildrenChanged, "/"),
            ]
        );
        assert_eq!(secondary.records(), primary.records());
    }

    #[test]
    fn dangling_children_are_rejected() {
        let mut tree = NodeTree::new(TreeLimits::default());
        let root = PersistedData {
            id: 1,
            name: String::new(),
            parent_id: NO_PARENT,
            ephemeral_owner: 0,
            data: None,
            acl: None,
            stat: MutableStat::new_node(1, 1, 0),
            children_ids: vec![99],
        };
        let list = ChangeList::new(1, vec![Change::add(root)]);
        assert!(matches!(
            apply_replicated(&mut tree, &list),
            Err(TreeLoadError::DanglingChild { parent: 1, child: 99 })
        ));
    }
}
