use crate::instrumentation::InstrumentationHandle;
use crate::types::{WatchedEvent, WatchedEventType, WatcherKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Receiver of tree change notifications.
pub trait Watcher: Send + Sync {
    fn id(&self) -> u64;

    fn kind(&self) -> WatcherKind;

    fn process(&self, event: WatchedEvent);
}

#[derive(Clone)]
struct Registration {
    session_id: u64,
    watcher: Arc<dyn Watcher>,
}

#[derive(Default)]
struct Registry {
    data: HashMap<String, Vec<Registration>>,
    children: HashMap<String, Vec<Registration>>,
}

impl Registry {
    fn add(map: &mut HashMap<String, Vec<Registration>>, path: &str, registration: Registration) {
        let entries = map.entry(path.to_string()).or_default();
        let duplicate = entries
            .iter()
            .any(|e| e.session_id == registration.session_id && Arc::ptr_eq(&e.watcher, &registration.watcher));
        if !duplicate {
            entries.push(registration);
        }
    }

    /// Watchers triggered on `path`. One-use registrations are removed.
    fn take(map: &mut HashMap<String, Vec<Registration>>, path: &str, out: &mut Vec<Registration>) {
        let mut emptied = false;
        if let Some(entries) = map.get_mut(path) {
            entries.retain(|e| {
                out.push(e.clone());
                !e.watcher.kind().is_one_use()
            });
            emptied = entries.is_empty();
        }
        if emptied {
            map.remove(path);
        }
    }
}

/// Data and child watchers, keyed by path.
pub struct WatcherTable {
    registry: Mutex<Registry>,
    instrumentation: InstrumentationHandle,
}

impl WatcherTable {
    pub fn new(instrumentation: InstrumentationHandle) -> Self {
        WatcherTable {
            registry: Mutex::new(Registry::default()),
            instrumentation,
        }
    }

    /// Fires on `NodeCreated`, `NodeDataChanged` and `NodeDeleted` at `path`.
    pub fn add_data_watcher(&self, session_id: u64, path: &str, watcher: Arc<dyn Watcher>) {
        Registry::add(&mut self.registry.lock().data, path, Registration { session_id, watcher });
        if let Some(sink) = &self.instrumentation {
            sink.on_watcher_set(path);
        }
    }

    /// Fires on `NodeChildrenChanged` and `NodeDeleted` at `path`.
    pub fn add_child_watcher(&self, session_id: u64, path: &str, watcher: Arc<dyn Watcher>) {
        Registry::add(&mut self.registry.lock().children, path, Registration { session_id, watcher });
        if let Some(sink) = &self.instrumentation {
            sink.on_watcher_set(path);
        }
    }

    pub fn len(&self) -> usize {
        let registry = self.registry.lock();
        registry.data.values().map(Vec::len).sum::<usize>() + registry.children.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `events` to every watcher they trigger. Callbacks run outside the table lock.
    pub fn fire(&self, events: &[WatchedEvent]) {
        let mut deliveries = Vec::new();
        {
            let mut registry = self.registry.lock();
            for event in events {
                let mut triggered = Vec::new();
                match event.event_type {
                    WatchedEventType::NodeCreated | WatchedEventType::NodeDataChanged => {
                        Registry::take(&mut registry.data, &event.path, &mut triggered);
                    }
                    WatchedEventType::NodeChildrenChanged => {
                        Registry::take(&mut registry.children, &event.path, &mut triggered);
                    }
                    WatchedEventType::NodeDeleted => {
                        Registry::take(&mut registry.data, &event.path, &mut triggered);
                        Registry::take(&mut registry.children, &event.path, &mut triggered);
                    }
                    WatchedEventType::None | WatchedEventType::WatcherRemoved => {}
                }

                let mut seen: Vec<Arc<dyn Watcher>> = Vec::with_capacity(triggered.len());
                for registration in triggered {
                    if seen.iter().any(|w| Arc::ptr_eq(w, &registration.watcher)) {
                        continue;
                    }
                    seen.push(registration.watcher.clone());
                    let payload = if registration.watcher.kind().includes_data() {
                        event.clone()
                    } else {
                        event.without_data()
                    };
                    deliveries.push((registration.watcher, payload));
                }
            }
        }

        for (watcher, event) in deliveries {
            if let Some(sink) = &self.instrumentation {
                sink.on_watcher_notified(&event.path);
            }
            watcher.process(event);
        }
    }

    /// Drops every registration of a closing session. Persistent watchers are told they were
    /// removed.
    pub fn remove_session(&self, session_id: u64) {
        let mut removed = Vec::new();
        {
            let mut registry = self.registry.lock();
            let Registry { data, children } = &mut *registry;
            for map in [data, children] {
                map.retain(|path, entries| {
                    entries.retain(|e| {
                        if e.session_id != session_id {
                            return true;
                        }
                        if !e.watcher.kind().is_one_use() {
                            removed.push((path.clone(), e.watcher.clone()));
                        }
                        false
                    });
                    !entries.is_empty()
                });
            }
        }

        let mut notified: Vec<Arc<dyn Watcher>> = Vec::new();
        for (path, watcher) in removed {
            if notified.iter().any(|w| Arc::ptr_eq(w, &watcher)) {
                continue;
            }
            notified.push(watcher.clone());
            watcher.process(WatchedEvent::new(WatchedEventType::WatcherRemoved, path));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Stat;
    use bytes::Bytes;

    /// Records every event it receives.
    pub(crate) struct RecordingWatcher {
        pub(crate) id: u64,
        pub(crate) kind: WatcherKind,
        pub(crate) events: Mutex<Vec<WatchedEvent>>,
    }

    impl RecordingWatcher {
        pub(crate) fn new(id: u64, kind: WatcherKind) -> Arc<Self> {
            Arc::new(RecordingWatcher {
                id,
                kind,
                events: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn types(&self) -> Vec<WatchedEventType> {
            self.events.lock().iter().map(|e| e.event_type).collect()
        }
    }

    impl Watcher for RecordingWatcher {
        fn id(&self) -> u64 {
            self.id
        }

        fn kind(&self) -> WatcherKind {
            self.kind
        }

        fn process(&self, event: WatchedEvent) {
            self.events.lock().push(event);
        }
    }

    fn event(event_type: WatchedEventType, path: &str) -> WatchedEvent {
        let mut event = WatchedEvent::new(event_type, path.to_string());
        event.data = Some(Bytes::from_static(b"payload"));
        event.stat = Some(Stat::from(crate::types::MutableStat::new_node(1, 1, 7)));
        event
    }

    #[test]
    fn one_use_watchers_fire_once() {
        let table = WatcherTable::new(None);
        let watcher = RecordingWatcher::new(1, WatcherKind::ONE_USE);
        table.add_data_watcher(10, "/a", watcher.clone());

        table.fire(&[event(WatchedEventType::NodeDataChanged, "/a")]);
        table.fire(&[event(WatchedEventType::NodeDataChanged, "/a")]);

        assert_eq!(watcher.types(), vec![WatchedEventType::NodeDataChanged]);
        assert!(table.is_empty());
        assert_eq!(watcher.events.lock()[0].data, None);
    }

    #[test]
    fn persistent_watchers_keep_firing_and_may_include_data() {
        let table = WatcherTable::new(None);
        let watcher = RecordingWatcher::new(2, WatcherKind::INCLUDE_DATA);
        table.add_child_watcher(10, "/p", watcher.clone());

        table.fire(&[
            event(WatchedEventType::NodeChildrenChanged, "/p"),
            event(WatchedEventType::NodeDataChanged, "/p"),
            event(WatchedEventType::NodeChildrenChanged, "/p"),
        ]);

        assert_eq!(
            watcher.types(),
            vec![WatchedEventType::NodeChildrenChanged, WatchedEventType::NodeChildrenChanged]
        );
        assert_eq!(watcher.events.lock()[0].data, Some(Bytes::from_static(b"payload")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn delete_notifies_a_watcher_once() {
        let table = WatcherTable::new(None);
        let watcher = RecordingWatcher::new(3, WatcherKind::PERSISTENT);
        table.add_data_watcher(10, "/d", watcher.clone());
        table.add_child_watcher(10, "/d", watcher.clone());

        table.fire(&[event(WatchedEventType::NodeDeleted, "/d")]);
        assert_eq!(watcher.types(), vec![WatchedEventType::NodeDeleted]);
    }

    #[test]
    fn closing_a_session_removes_its_watchers() {
        let table = WatcherTable::new(None);
        let persistent = RecordingWatcher::new(4, WatcherKind::PERSISTENT);
        let one_use = RecordingWatcher::new(5, WatcherKind::ONE_USE);
        let other = RecordingWatcher::new(6, WatcherKind::ONE_USE);
        table.add_data_watcher(10, "/x", persistent.clone());
        table.add_child_watcher(10, "/x", one_use.clone());
        table.add_data_watcher(11, "/x", other.clone());

        table.remove_session(10);
        assert_eq!(table.len(), 1);
        assert_eq!(persistent.types(), vec![WatchedEventType::WatcherRemoved]);
        assert!(one_use.types().is_empty());

        table.fire(&[event(WatchedEventType::NodeCreated, "/x")]);
        assert_eq!(other.types(), vec![WatchedEventType::NodeCreated]);
        assert!(persistent.types().len() == 1);
    }
}
