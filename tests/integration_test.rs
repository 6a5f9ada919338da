use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ringmaster::{
    packet_codec, serve_tcp, shutdown_signal, try_create_backend, Backend, BackendConfig, BackendOptions,
    BinaryProtocol, Code, CommunicationProtocol, CreateMode, DeleteMode, FactoryConfig,
    InMemoryFactory, InitialState, Op, OpResult, PersistedDataFactory, Request, RequestCall, RequestHandler,
    RequestResponse, ResponseContent, RingMasterServer, ServerConfig, WatchedEventType, WatcherArg, WatcherKind,
    NOTIFICATION_CALL_ID, PROTOCOL_VERSION,
};
use std::collections::VecDeque;
use std::error::Error;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration, Instant};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[tokio::test]
async fn random_hierarchy_stays_identical_on_every_replica() -> Result<(), Box<dyn Error>> {
    let primary_store = store("primary");
    let secondary_stores = vec![store("secondary-1"), store("secondary-2")];
    for secondary in &secondary_stores {
        primary_store.register_secondary(secondary.as_ref());
    }

    let primary = backend(primary_store.clone());
    let secondaries: Vec<Backend> = secondary_stores.iter().map(|s| backend(s.clone())).collect();
    primary.start().await?;
    for secondary in &secondaries {
        secondary.start().await?;
    }
    primary.on_become_primary().await?;

    let session = primary.create_session(0, None, false);
    assert_eq!(session.request(create("/TestRoot", CreateMode::PERSISTENT)).await.code, Code::Ok);

    // Breadth first, 1 to 4 children per node, so parents always precede their children.
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut paths = Vec::new();
    let mut frontier = VecDeque::from(vec!["/TestRoot".to_string()]);
    while paths.len() < 1000 {
        let parent = frontier.pop_front().ok_or("frontier ran dry")?;
        for _ in 0..rng.gen_range(1..=4) {
            if paths.len() == 1000 {
                break;
            }
            let path = format!("{}/n{}", parent, paths.len());
            frontier.push_back(path.clone());
            paths.push(path);
        }
    }

    for chunk in paths.chunks(100) {
        let ops = chunk
            .iter()
            .map(|path| {
                let len = rng.gen_range(0..=8);
                let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                Op::Create {
                    path: path.clone(),
                    data: Some(Bytes::from(data)),
                    acl: None,
                    mode: CreateMode::PERSISTENT,
                }
            })
            .collect();
        let response = session
            .request(Request::Batch {
                ops,
                complete_synchronously: true,
            })
            .await;
        assert_eq!(response.code, Code::Ok);

        // A success means every store applied the change-list.
        for secondary in &secondary_stores {
            assert_eq!(secondary.core().total_nodes(), primary_store.core().total_nodes());
        }
    }
    // The root, /TestRoot and the generated nodes.
    assert_eq!(primary.total_nodes(), 1002);

    let victim = paths[rng.gen_range(0..paths.len())].clone();
    let prefix = format!("{}/", victim);
    let removed = paths.iter().filter(|p| **p == victim || p.starts_with(&prefix)).count();
    let response = session
        .request(Request::Delete {
            path: victim.clone(),
            version: -1,
            mode: DeleteMode::CASCADE,
        })
        .await;
    assert_eq!(response.code, Code::Ok);
    assert_eq!(primary.total_nodes() as usize, 1002 - removed);
    assert_eq!(session.request(exists(&victim)).await.code, Code::NoNode);

    let expected = primary.records().await;
    for secondary in &secondaries {
        wait_until_caught_up(secondary, &primary).await;
        assert_eq!(secondary.records().await, expected);
    }

    let response = session
        .request(Request::Delete {
            path: "/TestRoot".to_string(),
            version: -1,
            mode: DeleteMode::CASCADE,
        })
        .await;
    assert_eq!(response.code, Code::Ok);
    assert_eq!(primary.total_nodes(), 1);

    let expected = primary.records().await;
    assert_eq!(expected.len(), 1);
    for (secondary, secondary_store) in secondaries.iter().zip(&secondary_stores) {
        wait_until_caught_up(secondary, &primary).await;
        assert_eq!(secondary.records().await, expected);
        assert_eq!(secondary_store.core().records(), primary_store.core().records());
    }

    Ok(())
}

#[tokio::test]
async fn concurrent_create_delete_exists_stay_consistent() -> Result<(), Box<dyn Error>> {
    let primary = started_primary(store("primary")).await?;
    let names: Vec<String> = (0..4).map(|i| format!("/contended{}", i)).collect();

    let deadline = Instant::now() + Duration::from_secs(1);
    let mut tasks = Vec::new();
    for worker in 0..8u64 {
        let session = primary.create_session(0, None, false);
        let names = names.clone();
        tasks.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(worker);
            let mut operations = 0u64;
            while Instant::now() < deadline {
                operations += 1;
                let path = &names[rng.gen_range(0..names.len())];
                let code = match rng.gen_range(0..3) {
                    0 => session.request(create(path, CreateMode::PERSISTENT)).await.code,
                    1 => {
                        session
                            .request(Request::Delete {
                                path: path.clone(),
                                version: -1,
                                mode: DeleteMode::NONE,
                            })
                            .await
                            .code
                    }
                    _ => session.request(exists(path)).await.code,
                };
                assert!(
                    matches!(code, Code::Ok | Code::NodeExists | Code::NoNode),
                    "unexpected {:?} on {}",
                    code,
                    path
                );
            }
            operations
        }));
    }
    let mut operations = 0;
    for task in tasks {
        operations += task.await?;
    }
    assert!(operations > 0);

    let session = primary.create_session(0, None, false);
    let records = primary.records().await;
    let mut present = 0;
    for path in &names {
        if session.request(exists(path)).await.code == Code::Ok {
            present += 1;
        }
    }
    assert_eq!(records.len(), 1 + present);

    let response = session
        .request(Request::GetChildren {
            path: "/".to_string(),
            watcher: None,
            max_count: 0,
            start_after: None,
        })
        .await;
    let stat = response.stat.ok_or("get children returned no stat")?;
    match response.content {
        ResponseContent::Children(children) => {
            assert_eq!(children.len(), present);
            assert_eq!(stat.num_children() as usize, present);
        }
        other => panic!("expected children, got {:?}", other),
    }
    assert_eq!(primary.total_nodes() as usize, records.len());
    assert_eq!(primary.committed_zxid(), primary.last_zxid().await);

    Ok(())
}

#[tokio::test]
async fn failed_multi_changes_nothing() -> Result<(), Box<dyn Error>> {
    let primary = started_primary(store("primary")).await?;
    let session = primary.create_session(0, None, false);
    assert_eq!(session.request(create("/m", CreateMode::PERSISTENT)).await.code, Code::Ok);
    let before = primary.last_zxid().await;
    let records_before = primary.records().await;

    let ops = vec![
        Op::Create {
            path: "/m/a/b".to_string(),
            data: Some(Bytes::from_static(b"payload")),
            acl: None,
            mode: CreateMode::ALLOW_PATH_CREATION,
        },
        Op::SetData {
            path: "/m".to_string(),
            data: Some(Bytes::from_static(b"x")),
            version: -1,
        },
        Op::Create {
            path: "/m/a".to_string(),
            data: None,
            acl: None,
            mode: CreateMode::PERSISTENT,
        },
        Op::Delete {
            path: "/m".to_string(),
            version: -1,
            mode: DeleteMode::CASCADE,
        },
    ];
    let response = session
        .request(Request::Multi {
            ops,
            complete_synchronously: true,
            scheduled_name: None,
        })
        .await;

    assert_eq!(response.code, Code::NodeExists);
    assert_eq!(
        response.content,
        ResponseContent::Results(vec![
            OpResult::Error(Code::RolledBack),
            OpResult::Error(Code::RolledBack),
            OpResult::Error(Code::NodeExists),
            OpResult::Error(Code::Skipped),
        ])
    );
    assert_eq!(primary.last_zxid().await, before);
    assert_eq!(primary.records().await, records_before);
    assert_eq!(session.request(exists("/m/a")).await.code, Code::NoNode);

    Ok(())
}

#[tokio::test]
async fn versions_and_zxids_only_move_forward() -> Result<(), Box<dyn Error>> {
    let primary = started_primary(store("primary")).await?;
    let session = primary.create_session(0, None, false);
    let created = session.request(create("/counter", CreateMode::PERSISTENT)).await;
    let mut last = created.stat.ok_or("create returned no stat")?;
    assert_eq!(last.version(), 1);

    for i in 0..20 {
        let response = session
            .request(Request::SetData {
                path: "/counter".to_string(),
                data: Some(Bytes::from(format!("{}", i))),
                version: last.version(),
            })
            .await;
        assert_eq!(response.code, Code::Ok);
        let stat = response.stat.ok_or("set returned no stat")?;
        assert_eq!(stat.version(), last.version() + 1);
        assert!(stat.mzxid() > last.mzxid());
        assert!(stat.mtime() > last.mtime());
        assert_eq!(stat.czxid(), last.czxid());
        last = stat;
    }

    let stale = session
        .request(Request::SetData {
            path: "/counter".to_string(),
            data: None,
            version: 1,
        })
        .await;
    assert_eq!(stale.code, Code::BadVersion);

    Ok(())
}

#[tokio::test]
async fn snapshot_restores_the_same_tree() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let snapshot = dir.path().join("ringmaster.snapshot");

    let first_store = store("first");
    let first = started_primary(first_store.clone()).await?;
    let session = first.create_session(0, None, false);
    for path in ["/a", "/a/b", "/a/c", "/d"] {
        let response = session
            .request(Request::Create {
                path: path.to_string(),
                data: Some(Bytes::from(path.to_string())),
                acl: None,
                mode: CreateMode::PERSISTENT,
            })
            .await;
        assert_eq!(response.code, Code::Ok);
    }
    let sequential = session
        .request(create("/a/seq-", CreateMode::PERSISTENT | CreateMode::SEQUENTIAL))
        .await;
    assert_eq!(sequential.content, ResponseContent::Path("/a/seq-0000000003".to_string()));

    first_store.save_snapshot(&snapshot)?;
    let expected = first.records().await;
    first.stop().await?;

    let second_store = Arc::new(InMemoryFactory::with_initial_state(
        FactoryConfig::new("second", logger()),
        InitialState::SnapshotFile(snapshot),
    ));
    let second = started_primary(second_store).await?;
    assert_eq!(second.records().await, expected);

    let session = second.create_session(0, None, false);
    let response = session
        .request(Request::GetData {
            path: "/a/c".to_string(),
            watcher: None,
        })
        .await;
    assert_eq!(response.content, ResponseContent::Data(Some(Bytes::from_static(b"/a/c"))));

    // New ids must not collide with restored ones.
    assert_eq!(session.request(create("/e", CreateMode::PERSISTENT)).await.code, Code::Ok);
    assert_eq!(second.total_nodes() as usize, expected.len() + 1);

    Ok(())
}

#[tokio::test]
async fn tcp_clients_get_responses_and_notifications() -> Result<(), Box<dyn Error>> {
    let primary = started_primary(store("primary")).await?;
    let server = Arc::new(RingMasterServer::new(ServerConfig::for_backend(primary.clone())));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown_handle, shutdown) = shutdown_signal();
    let serving = tokio::spawn(serve_tcp(logger(), listener, server.clone(), shutdown));

    let mut watcher_client = TestClient::connect(addr).await?;
    let mut writer_client = TestClient::connect(addr).await?;
    for client in [&mut watcher_client, &mut writer_client] {
        let response = client.call(init()).await?;
        assert_eq!(response.code, Code::Ok);
        assert!(matches!(response.content, ResponseContent::Session(id) if id != 0));
    }

    let response = writer_client.call(create("/watched", CreateMode::PERSISTENT)).await?;
    assert_eq!(response.content, ResponseContent::Path("/watched".to_string()));

    let response = watcher_client
        .call(Request::GetData {
            path: "/watched".to_string(),
            watcher: Some(WatcherArg::Spec {
                id: 11,
                kind: WatcherKind::ONE_USE,
            }),
        })
        .await?;
    assert_eq!(response.code, Code::Ok);

    let response = writer_client
        .call(Request::SetData {
            path: "/watched".to_string(),
            data: Some(Bytes::from_static(b"new")),
            version: -1,
        })
        .await?;
    assert_eq!(response.code, Code::Ok);

    let notification = watcher_client.next_notification().await?;
    match notification.content {
        ResponseContent::Notification { watcher_id, event } => {
            assert_eq!(watcher_id, 11);
            assert_eq!(event.event_type, WatchedEventType::NodeDataChanged);
            assert_eq!(event.path, "/watched");
        }
        other => panic!("expected a notification, got {:?}", other),
    }

    assert_eq!(server.session_count(), 2);
    drop(watcher_client);
    let deadline = Instant::now() + Duration::from_secs(5);
    while server.session_count() != 1 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.session_count(), 1);

    shutdown_handle.shutdown();
    timeout(Duration::from_secs(5), serving).await??;
    assert_eq!(server.session_count(), 0);

    Ok(())
}

struct TestClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    next_call_id: u64,
    notifications: Vec<RequestResponse>,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Result<Self, Box<dyn Error>> {
        let stream = TcpStream::connect(addr).await?;
        Ok(TestClient {
            framed: Framed::new(stream, packet_codec()),
            next_call_id: 1,
            notifications: Vec::new(),
        })
    }

    async fn call(&mut self, request: Request) -> Result<RequestResponse, Box<dyn Error>> {
        let call_id = self.next_call_id;
        self.next_call_id += 1;
        let packet = BinaryProtocol.serialize_request(&RequestCall { call_id, request }, PROTOCOL_VERSION)?;
        self.framed.send(packet).await?;

        loop {
            let response = self.receive().await?;
            if response.call_id == call_id {
                return Ok(response);
            }
            if response.call_id == NOTIFICATION_CALL_ID {
                self.notifications.push(response);
            }
        }
    }

    async fn next_notification(&mut self) -> Result<RequestResponse, Box<dyn Error>> {
        if !self.notifications.is_empty() {
            return Ok(self.notifications.remove(0));
        }
        loop {
            let response = self.receive().await?;
            if response.call_id == NOTIFICATION_CALL_ID {
                return Ok(response);
            }
        }
    }

    async fn receive(&mut self) -> Result<RequestResponse, Box<dyn Error>> {
        let frame = timeout(Duration::from_secs(5), self.framed.next())
            .await?
            .ok_or("connection closed")??;
        Ok(BinaryProtocol.deserialize_response(&frame, PROTOCOL_VERSION)?)
    }
}

fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn store(name: &str) -> Arc<InMemoryFactory> {
    Arc::new(InMemoryFactory::new(FactoryConfig::new(name, logger())))
}

fn backend(store: Arc<InMemoryFactory>) -> Backend {
    let mut config = BackendConfig::new(logger(), store);
    config.options = BackendOptions {
        request_timeout: Some(Duration::from_secs(10)),
        ..BackendOptions::default()
    };
    try_create_backend(config).expect("default options are valid")
}

async fn started_primary(store: Arc<InMemoryFactory>) -> Result<Backend, Box<dyn Error>> {
    let backend = backend(store);
    backend.start().await?;
    backend.on_become_primary().await?;
    Ok(backend)
}

async fn wait_until_caught_up(secondary: &Backend, primary: &Backend) {
    let target = primary.last_zxid().await;
    let deadline = Instant::now() + Duration::from_secs(10);
    while secondary.last_zxid().await < target {
        assert!(Instant::now() < deadline, "secondary stuck behind {}", target);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn init() -> Request {
    Request::Init {
        session_id: 0,
        auth: None,
        is_super: false,
    }
}

fn create(path: &str, mode: CreateMode) -> Request {
    Request::Create {
        path: path.to_string(),
        data: None,
        acl: None,
        mode,
    }
}

fn exists(path: &str) -> Request {
    Request::Exists {
        path: path.to_string(),
        watcher: None,
    }
}

