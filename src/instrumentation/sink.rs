use std::sync::Arc;
use std::time::Duration;

/// Observer of named events. Every method defaults to a no-op so an implementation only
/// overrides the events it cares about.
pub trait Instrumentation: Send + Sync {
    fn on_request_received(&self, _request_type: &str) {}
    fn on_bad_request(&self, _request_type: &str) {}
    fn on_request_completed(&self, _request_type: &str, _code: i32, _elapsed: Duration) {}

    fn on_session_created(&self, _session_id: u64) {}
    fn on_session_closed(&self, _session_id: u64) {}

    fn on_watcher_set(&self, _path: &str) {}
    fn on_watcher_notified(&self, _path: &str) {}

    fn on_change_list_committed(&self, _id: u64, _elapsed: Duration) {}
    fn on_change_list_commit_failed(&self, _id: u64) {}
    fn on_change_list_applied(&self, _store: &str, _id: u64, _changes: usize) {}

    fn on_lock_acquired(&self, _write: bool, _elapsed: Duration) {}
    fn on_replication_wait(&self, _elapsed: Duration) {}

    fn on_exception(&self, _component: &str, _kind: &str) {}

    fn on_scheduled_command_completed(&self, _name: &str) {}
    fn on_scheduled_command_failed(&self, _name: &str) {}
}

/// Optional sink. Correctness never depends on one being present.
pub type InstrumentationHandle = Option<Arc<dyn Instrumentation>>;
