use crate::backend::clock::{Clock, TransactionClock};
use crate::backend::committer::{self, CommitTracker, CommitTrackerLoop};
use crate::backend::executor::{self, Atomicity};
use crate::backend::follower::apply_replicated;
use crate::backend::options::BackendOptionsValidated;
use crate::backend::role::{self, Role, RoleChangeListener, RoleChangeNotifier};
use crate::backend::scheduler::{ScheduledCommandState, Scheduler};
use crate::backend::session::ClientSession;
use crate::backend::wiring::{BackendError, RedirectProvider};
use crate::backend::{Op, OpResult, Request, RequestResponse, ResponseContent, Watcher, WatcherArg, WatcherTable};
use crate::instrumentation::InstrumentationHandle;
use crate::persistence::{ChangeList, CommitStream, PersistedData, PersistedDataFactory};
use crate::tree::{self, NodeTree, TreeTransaction};
use crate::types::{Code, Id, SessionAuth};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Sequences client operations into transactions over one tree and one persistence factory.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<BackendInner>,
}

pub(crate) struct BackendInner {
    logger: slog::Logger,
    factory: Arc<dyn PersistedDataFactory>,
    options: BackendOptionsValidated,
    instrumentation: InstrumentationHandle,
    redirect: Option<RedirectProvider>,
    tree: Arc<RwLock<NodeTree>>,
    times: TransactionClock,
    role: RoleChangeNotifier,
    role_listener: RoleChangeListener,
    // Highest zxid known to be applied by every participant.
    committed: Arc<watch::Sender<i64>>,
    watchers: Arc<WatcherTable>,
    tracker: CommitTracker,
    tracker_loop: Mutex<Option<CommitTrackerLoop>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: tokio::sync::Mutex<()>,
    terminated: AtomicBool,
    sessions: Mutex<HashMap<u64, Weak<ClientSession>>>,
    next_session_id: AtomicU64,
    scheduler: Scheduler,
}

impl BackendInner {
    pub(crate) fn new(
        logger: slog::Logger,
        factory: Arc<dyn PersistedDataFactory>,
        options: BackendOptionsValidated,
        clock: Arc<dyn Clock>,
        instrumentation: InstrumentationHandle,
        redirect: Option<RedirectProvider>,
    ) -> Self {
        let (role, role_listener) = role::new(Role::Stopped);
        let watchers = Arc::new(WatcherTable::new(instrumentation.clone()));
        let committed = Arc::new(watch::channel(0).0);
        let (tracker, tracker_loop) = committer::commit_tracker(
            logger.clone(),
            factory.clone(),
            watchers.clone(),
            committed.clone(),
            instrumentation.clone(),
        );

        BackendInner {
            tree: Arc::new(RwLock::new(NodeTree::new(options.limits))),
            times: TransactionClock::new(clock),
            role,
            role_listener,
            committed,
            watchers,
            tracker,
            tracker_loop: Mutex::new(Some(tracker_loop)),
            tasks: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(()),
            terminated: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(0),
            scheduler: Scheduler::new(instrumentation.clone()),
            logger,
            factory,
            options,
            instrumentation,
            redirect,
        }
    }
}

fn resolve_watcher(watcher: Option<WatcherArg>) -> Result<Option<Arc<dyn Watcher>>, Code> {
    match watcher {
        None => Ok(None),
        Some(WatcherArg::Bound(watcher)) => Ok(Some(watcher)),
        // Only sessions can route notifications.
        Some(WatcherArg::Spec { .. }) => Err(Code::BadArguments),
    }
}

fn op_response(result: OpResult) -> RequestResponse {
    match result {
        OpResult::Created { path, stat } => {
            RequestResponse::ok(Some(stat), ResponseContent::Path(path.clone())).with_path(Some(path))
        }
        OpResult::DataSet(stat) | OpResult::AclSet(stat) | OpResult::Checked(stat) => {
            RequestResponse::ok(Some(stat), ResponseContent::None)
        }
        OpResult::Data { data, stat } => RequestResponse::ok(Some(stat), ResponseContent::Data(data)),
        OpResult::Moved(path) => RequestResponse::ok(None, ResponseContent::Path(path)),
        OpResult::Deleted => RequestResponse::new(Code::Ok),
        OpResult::Error(code) => RequestResponse::new(code),
    }
}

fn keep_if_ok<T>(result: Result<T, Code>) -> (Result<T, Code>, bool) {
    let keep = result.is_ok();
    (result, keep)
}

impl Backend {
    pub(crate) fn from_inner(inner: Arc<BackendInner>) -> Self {
        Backend { inner }
    }

    pub fn role(&self) -> Role {
        self.inner.role.current()
    }

    pub fn role_changes(&self) -> RoleChangeListener {
        self.inner.role_listener.clone()
    }

    pub fn logger(&self) -> &slog::Logger {
        &self.inner.logger
    }

    pub fn total_nodes(&self) -> u64 {
        self.inner.factory.core().total_nodes()
    }

    /// Zxid of the newest transaction visible in the tree.
    pub async fn last_zxid(&self) -> i64 {
        self.inner.tree.read().await.last_zxid()
    }

    /// Zxid of the newest change-list applied by every participant.
    pub fn committed_zxid(&self) -> i64 {
        *self.inner.committed.borrow()
    }

    /// The tree as records, in id order.
    pub async fn records(&self) -> Vec<PersistedData> {
        self.inner.tree.read().await.records()
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.len()
    }

    /// Loads the tree from the factory and starts following its committed change-lists as a
    /// secondary.
    pub async fn start(&self) -> Result<(), BackendError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.inner.terminated.load(Ordering::SeqCst) {
            return Err(BackendError::Terminated);
        }
        let current = self.role();
        if current != Role::Stopped {
            return Err(BackendError::InvalidTransition {
                from: current,
                to: Role::Starting,
            });
        }

        self.inner.role.notify_new_role(Role::Starting);
        if let Err(e) = self.load().await {
            slog::error!(self.inner.logger, "Backend failed to start: {}", e);
            self.inner.role.notify_new_role(Role::Stopped);
            return Err(e);
        }

        let mut tasks = self.inner.tasks.lock();
        if let Some(tracker_loop) = self.inner.tracker_loop.lock().take() {
            tasks.push(tokio::spawn(tracker_loop.run()));
        }
        match self.inner.factory.core().take_commit_stream() {
            Some(stream) => tasks.push(tokio::spawn(follow(Arc::downgrade(&self.inner), stream))),
            None => slog::warn!(self.inner.logger, "Commit stream already taken; not following the store"),
        }
        drop(tasks);

        self.inner.role.notify_new_role(Role::Secondary);
        slog::info!(self.inner.logger, "Backend started as secondary");
        Ok(())
    }

    async fn load(&self) -> Result<(), BackendError> {
        self.inner.factory.activate().await?;
        let state = self.inner.factory.load_tree().await?;
        let tree = NodeTree::load(&state.records, state.last_zxid, self.inner.options.limits)?;

        self.inner.factory.core().ids().observe(tree.max_id().max(state.max_id));
        self.inner.committed.send_replace(tree.last_zxid());
        // Ids of sessions that owned ephemerals under a previous primary are smaller than the
        // clock reading taken here.
        let seed = self.inner.times.raw().max(0) as u64;
        self.inner.next_session_id.fetch_max(seed, Ordering::SeqCst);

        slog::info!(
            self.inner.logger,
            "Loaded tree with {} nodes at zxid {}",
            tree.len(),
            tree.last_zxid()
        );
        *self.inner.tree.write().await = tree;
        Ok(())
    }

    /// Starts accepting mutations once every change-list already in the store is in the tree.
    /// Creates the root if missing and removes ephemerals whose sessions are gone.
    pub async fn on_become_primary(&self) -> Result<(), BackendError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let current = self.role();
        if current != Role::Secondary {
            return Err(BackendError::InvalidTransition {
                from: current,
                to: Role::Primary,
            });
        }

        let target = self.inner.factory.core().last_zxid();
        let mut committed = self.inner.committed.subscribe();
        let caught_up = matches!(
            time::timeout(
                self.inner.options.request_timeout,
                committed.wait_for(|zxid| *zxid >= target),
            )
            .await,
            Ok(Ok(_))
        );
        if !caught_up {
            return Err(BackendError::CatchUpTimeout);
        }

        self.inner.role.notify_new_role(Role::Primary);

        let live: HashSet<u64> = self.live_sessions().into_iter().collect();
        let auth = SessionAuth::super_user(0);
        let result = self
            .transact(&auth, true, |txn| {
                let created_root = txn.ensure_root();
                let mut removed = 0;
                for owner in txn.ephemeral_owners() {
                    if live.contains(&owner) {
                        continue;
                    }
                    match txn.remove_ephemerals(owner) {
                        Ok(count) => removed += count,
                        Err(code) => return (Err(code), false),
                    }
                }
                (Ok((created_root, removed)), true)
            })
            .await;

        match result.and_then(|r| r) {
            Ok((created_root, removed)) => {
                slog::info!(
                    self.inner.logger,
                    "Became primary (root created: {}, stale ephemerals removed: {})",
                    created_root,
                    removed
                );
                Ok(())
            }
            Err(code) => {
                slog::error!(self.inner.logger, "Primary maintenance failed with {}", code);
                self.inner.role.notify_new_role(Role::Secondary);
                Err(BackendError::Commit(code))
            }
        }
    }

    /// Stops accepting mutations. Requests waiting for a commit are answered `OperationCancelled`.
    pub async fn on_primary_status_lost(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.role() == Role::Primary {
            self.inner.role.notify_new_role(Role::Secondary);
            slog::info!(self.inner.logger, "Lost primary status");
        }
    }

    /// Deactivates the factory. A stopped backend can't be started again.
    pub async fn stop(&self) -> Result<(), BackendError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.terminated.store(true, Ordering::SeqCst);
        if self.role() == Role::Stopped {
            return Ok(());
        }

        self.inner.role.notify_new_role(Role::Stopping);
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        let result = self.inner.factory.deactivate().await;
        self.inner.role.notify_new_role(Role::Stopped);
        slog::info!(self.inner.logger, "Backend stopped");

        result.map_err(BackendError::from)
    }

    /// Binds a client session. A nonzero `session_id` that is still live returns that session.
    pub fn create_session(&self, session_id: u64, auth: Option<Id>, is_super: bool) -> Arc<ClientSession> {
        let mut sessions = self.inner.sessions.lock();
        sessions.retain(|_, session| session.strong_count() > 0);
        if let Some(existing) = sessions.get(&session_id).and_then(Weak::upgrade) {
            return existing;
        }

        let id = if session_id == 0 {
            self.inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.inner.next_session_id.fetch_max(session_id, Ordering::SeqCst);
            session_id
        };
        let auth = SessionAuth {
            session_id: id,
            ids: auth.into_iter().collect(),
            is_super,
        };
        let logger = self.inner.logger.new(slog::o!("session" => id));
        let session = Arc::new(ClientSession::new(id, auth, self.clone(), logger));
        sessions.insert(id, Arc::downgrade(&session));

        if let Some(sink) = &self.inner.instrumentation {
            sink.on_session_created(id);
        }
        session
    }

    fn live_sessions(&self) -> Vec<u64> {
        self.inner
            .sessions
            .lock()
            .iter()
            .filter(|(_, session)| session.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) async fn close_session(&self, session_id: u64) {
        self.inner.sessions.lock().remove(&session_id);
        self.inner.watchers.remove_session(session_id);

        if self.role() == Role::Primary {
            let auth = SessionAuth::super_user(session_id);
            let result = self
                .transact(&auth, true, |txn| keep_if_ok(txn.remove_ephemerals(session_id)))
                .await;
            match result.and_then(|r| r) {
                Ok(0) => {}
                Ok(removed) => slog::debug!(self.inner.logger, "Session {} left {} ephemerals", session_id, removed),
                Err(code) => slog::warn!(
                    self.inner.logger,
                    "Couldn't remove ephemerals of session {}: {}",
                    session_id,
                    code
                ),
            }
        }

        if let Some(sink) = &self.inner.instrumentation {
            sink.on_session_closed(session_id);
        }
    }

    /// Queues `ops` to run as a multi under the super identity. Completion is reported through
    /// [`Backend::scheduled_command_result`].
    pub fn schedule_command(&self, name: &str, ops: Vec<Op>) -> Result<(), Code> {
        self.schedule(&SessionAuth::super_user(0), name, ops)
    }

    pub fn scheduled_command_result(&self, name: &str) -> Option<ScheduledCommandState> {
        self.inner.scheduler.state(name)
    }

    fn schedule(&self, auth: &SessionAuth, name: &str, ops: Vec<Op>) -> Result<(), Code> {
        if self.role() != Role::Primary {
            return Err(self.not_primary());
        }
        self.inner.scheduler.begin(name)?;

        let backend = self.clone();
        let auth = auth.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let result = backend
                .transact(&auth, true, move |txn| {
                    let (results, code) = executor::execute_ops(txn, &ops, Atomicity::Multi);
                    ((results, code), code.is_ok())
                })
                .await;
            let (results, code) = match result {
                Ok((results, code)) => (results, code),
                Err(code) => (Vec::new(), code),
            };
            if !code.is_ok() {
                slog::warn!(backend.inner.logger, "Scheduled command '{}' failed with {}", name, code);
            }
            backend.inner.scheduler.finish(&name, code, results);
        });

        Ok(())
    }

    /// Runs one request under `auth`.
    pub(crate) async fn execute(&self, auth: &SessionAuth, request: Request) -> RequestResponse {
        let name = request.request_type().name();
        let path = request.path().map(str::to_string);
        let started = Instant::now();
        if let Some(sink) = &self.inner.instrumentation {
            sink.on_request_received(name);
        }

        let mut response = self.dispatch(auth, request).await;
        if response.path.is_none() {
            response.path = path;
        }

        if let Some(sink) = &self.inner.instrumentation {
            if response.code == Code::BadArguments {
                sink.on_bad_request(name);
            }
            sink.on_request_completed(name, response.code.as_i32(), started.elapsed());
        }
        response
    }

    async fn dispatch(&self, auth: &SessionAuth, request: Request) -> RequestResponse {
        match request {
            // Sessions bind before they send anything else.
            Request::Init { .. } => RequestResponse::new(Code::BadArguments),
            Request::Nop => RequestResponse::new(Code::Ok),
            Request::Sync { .. } => self.sync().await,
            Request::Check { path, version } => {
                self.read(|current| {
                    tree::check(current, &path, version).map(|stat| RequestResponse::ok(Some(stat), ResponseContent::None))
                })
                .await
            }
            Request::GetData { path, watcher } => self.get_data(auth, path, watcher).await,
            Request::Exists { path, watcher } => self.exists(auth, path, watcher).await,
            Request::GetChildren {
                path,
                watcher,
                max_count,
                start_after,
            } => self.get_children(auth, path, watcher, max_count, start_after).await,
            Request::GetAcl { path } => {
                self.read(|current| {
                    tree::get_acl(current, &path, auth)
                        .map(|(acl, stat)| RequestResponse::ok(Some(stat), ResponseContent::Acl(acl)))
                })
                .await
            }
            Request::Multi {
                ops,
                scheduled_name: Some(name),
                ..
            } => match self.schedule(auth, &name, ops) {
                Ok(()) => RequestResponse::new(Code::Ok),
                Err(code) => self.failure(code),
            },
            Request::Multi {
                ops,
                complete_synchronously,
                scheduled_name: None,
            } => self.run_ops(auth, ops, Atomicity::Multi, complete_synchronously).await,
            Request::Batch {
                ops,
                complete_synchronously,
            } => self.run_ops(auth, ops, Atomicity::Batch, complete_synchronously).await,
            mutation => match mutation.into_op() {
                Ok(op) => self.run_op(auth, op).await,
                Err(_) => RequestResponse::new(Code::BadArguments),
            },
        }
    }

    async fn run_op(&self, auth: &SessionAuth, op: Op) -> RequestResponse {
        let result = self
            .transact(auth, true, move |txn| keep_if_ok(executor::execute_op(txn, &op)))
            .await;
        match result.and_then(|r| r) {
            Ok(result) => op_response(result),
            Err(code) => self.failure(code),
        }
    }

    async fn run_ops(&self, auth: &SessionAuth, ops: Vec<Op>, atomicity: Atomicity, synchronous: bool) -> RequestResponse {
        let result = self
            .transact(auth, synchronous, move |txn| {
                let (results, code) = executor::execute_ops(txn, &ops, atomicity);
                let keep = code.is_ok() || atomicity == Atomicity::Batch;
                ((results, code), keep)
            })
            .await;
        match result {
            Ok((results, code)) => RequestResponse {
                content: ResponseContent::Results(results),
                ..RequestResponse::new(code)
            },
            Err(code) => self.failure(code),
        }
    }

    /// Runs `build` against a fresh transaction under the tree write lock and, when it staged
    /// changes it wants kept, submits them as one change-list.
    ///
    /// The write lock passes to the commit tracker, which publishes the staged nodes only once
    /// every store applied the change-list. Readers wait for in-flight commits instead of seeing
    /// them early. With `synchronous` the call returns once the commit completed.
    async fn transact<T, F>(&self, auth: &SessionAuth, synchronous: bool, build: F) -> Result<T, Code>
    where
        T: Send,
        F: FnOnce(&mut TreeTransaction<'_>) -> (T, bool) + Send,
    {
        let started = Instant::now();
        let tree = self.inner.tree.clone().write_owned().await;
        if let Some(sink) = &self.inner.instrumentation {
            sink.on_lock_acquired(true, started.elapsed());
        }
        if self.role() != Role::Primary {
            return Err(self.not_primary());
        }

        let zxid = tree.last_zxid() + 1;
        let time = self.inner.times.next();
        let (value, keep, outcome) = {
            let mut txn = TreeTransaction::new(&*tree, self.inner.factory.core().ids(), auth, zxid, time);
            let (value, keep) = build(&mut txn);
            (value, keep, txn.finish())
        };
        if !keep || outcome.is_empty() {
            return Ok(value);
        }

        let mut replication = self.inner.factory.start_replication(zxid as u64);
        for change in outcome.changes {
            replication.push(change);
        }
        let pending = match replication.submit().await {
            Ok(pending) => pending,
            Err(e) => {
                slog::error!(self.inner.logger, "Couldn't submit change-list {}: {}", zxid, e);
                if let Some(sink) = &self.inner.instrumentation {
                    sink.on_exception("backend", "submit");
                }
                return Err(Code::SystemError);
            }
        };
        let done = self.inner.tracker.track(tree, pending, outcome.staged, outcome.events);

        if synchronous {
            self.await_commit(done).await?;
        }
        Ok(value)
    }

    async fn await_commit(&self, done: oneshot::Receiver<Code>) -> Result<(), Code> {
        let demoted = self.inner.role_listener.clone().left(Role::Primary);
        tokio::select! {
            biased;
            result = done => match result {
                Ok(Code::Ok) => Ok(()),
                Ok(code) => Err(code),
                Err(_) => Err(Code::SystemError),
            },
            _ = demoted => Err(Code::OperationCancelled),
            _ = time::sleep(self.inner.options.request_timeout) => Err(Code::OperationTimeout),
        }
    }

    fn not_primary(&self) -> Code {
        match self.suggested_primary() {
            Some(_) => Code::SessionMoved,
            None => Code::OperationCancelled,
        }
    }

    fn suggested_primary(&self) -> Option<String> {
        self.inner.redirect.as_ref().and_then(|redirect| redirect())
    }

    fn failure(&self, code: Code) -> RequestResponse {
        if code == Code::SessionMoved {
            if let Some(primary) = self.suggested_primary() {
                return RequestResponse {
                    content: ResponseContent::Redirect(primary),
                    ..RequestResponse::new(code)
                };
            }
        }
        RequestResponse::new(code)
    }

    async fn read<F>(&self, read: F) -> RequestResponse
    where
        F: FnOnce(&NodeTree) -> Result<RequestResponse, Code> + Send,
    {
        if !self.role().serves_reads() {
            return self.failure(self.not_primary());
        }

        let started = Instant::now();
        let tree = self.inner.tree.read().await;
        if let Some(sink) = &self.inner.instrumentation {
            sink.on_lock_acquired(false, started.elapsed());
        }
        read(&*tree).unwrap_or_else(RequestResponse::new)
    }

    async fn get_data(&self, auth: &SessionAuth, path: String, watcher: Option<WatcherArg>) -> RequestResponse {
        let watcher = match resolve_watcher(watcher) {
            Ok(watcher) => watcher,
            Err(code) => return code.into(),
        };
        self.read(|current| {
            let (data, stat) = tree::get_data(current, &path, auth)?;
            if let Some(watcher) = watcher {
                self.inner.watchers.add_data_watcher(auth.session_id, &path, watcher);
            }
            Ok(RequestResponse::ok(Some(stat), ResponseContent::Data(data)))
        })
        .await
    }

    async fn exists(&self, auth: &SessionAuth, path: String, watcher: Option<WatcherArg>) -> RequestResponse {
        let watcher = match resolve_watcher(watcher) {
            Ok(watcher) => watcher,
            Err(code) => return code.into(),
        };
        self.read(|current| {
            let result = tree::exists(current, &path);
            // A missing node is watched for its creation.
            if matches!(result, Ok(_) | Err(Code::NoNode)) {
                if let Some(watcher) = watcher {
                    self.inner.watchers.add_data_watcher(auth.session_id, &path, watcher);
                }
            }
            result.map(|stat| RequestResponse::ok(Some(stat), ResponseContent::None))
        })
        .await
    }

    async fn get_children(
        &self,
        auth: &SessionAuth,
        path: String,
        watcher: Option<WatcherArg>,
        max_count: u32,
        start_after: Option<String>,
    ) -> RequestResponse {
        let watcher = match resolve_watcher(watcher) {
            Ok(watcher) => watcher,
            Err(code) => return code.into(),
        };
        self.read(|current| {
            let (children, stat) =
                tree::get_children(current, &path, auth, current.limits(), max_count, start_after.as_deref())?;
            if let Some(watcher) = watcher {
                self.inner.watchers.add_child_watcher(auth.session_id, &path, watcher);
            }
            Ok(RequestResponse::ok(Some(stat), ResponseContent::Children(children)))
        })
        .await
    }

    /// Completes once every change-list visible when it was called has committed.
    async fn sync(&self) -> RequestResponse {
        if !self.role().serves_reads() {
            return self.failure(self.not_primary());
        }

        let target = self.inner.tree.read().await.last_zxid();
        let mut committed = self.inner.committed.subscribe();
        let code = match time::timeout(
            self.inner.options.request_timeout,
            committed.wait_for(|zxid| *zxid >= target),
        )
        .await
        {
            Ok(Ok(_)) => Code::Ok,
            Ok(Err(_)) => Code::SystemError,
            Err(_) => Code::OperationTimeout,
        };
        RequestResponse::new(code)
    }

    /// Applies a change-list from the store's commit stream. Change-lists this backend published
    /// itself are already in the tree and are skipped.
    async fn apply_committed(&self, list: &ChangeList) {
        let mut tree = self.inner.tree.write().await;
        if list.id as i64 <= tree.last_zxid() {
            return;
        }

        match apply_replicated(&mut tree, list) {
            Ok(events) => {
                drop(tree);
                self.inner.committed.send_modify(|zxid| *zxid = (*zxid).max(list.id as i64));
                self.inner.watchers.fire(&events);
            }
            Err(e) => {
                slog::error!(
                    self.inner.logger,
                    "Change-list {} doesn't fit the tree, replica has diverged: {}",
                    list.id,
                    e
                );
                if let Some(sink) = &self.inner.instrumentation {
                    sink.on_exception("follower", "diverged");
                }
            }
        }
    }
}

async fn follow(inner: Weak<BackendInner>, mut stream: CommitStream) {
    while let Some(list) = stream.next().await {
        let inner = match inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };
        Backend { inner }.apply_committed(&list).await;
    }
}
