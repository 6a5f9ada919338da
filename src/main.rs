use clap::Parser;
use ringmaster::{
    serve_tcp, shutdown_signal, try_create_backend, BackendConfig, BackendOptions, InMemoryFactory, InitialState,
    RingMasterServer, ServerConfig,
};
use slog::Drain;
use std::collections::HashMap;
use std::error::Error;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves a single replicated store over TCP.
#[derive(Parser, Debug)]
#[command(name = "ringmaster")]
struct Args {
    /// Port to accept client connections on.
    #[arg(long, default_value_t = 99)]
    port: u16,

    /// Snapshot loaded at start and written back on shutdown.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Backend setting as NAME=VALUE, e.g. Persistence.MaxPendingChangeLists=32. Repeatable.
    #[arg(long = "setting", value_parser = parse_setting)]
    settings: Vec<(String, String)>,
}

fn parse_setting(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

fn create_root_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("app" => "ringmaster"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let logger = create_root_logger();

    let settings: HashMap<String, String> = args.settings.iter().cloned().collect();
    let options = BackendOptions::from_settings(&settings)?;

    let initial_state = match &args.snapshot {
        Some(path) => InitialState::SnapshotFile(path.clone()),
        None => InitialState::Empty,
    };
    let factory = Arc::new(InMemoryFactory::with_initial_state(
        options.factory_config("primary", logger.new(slog::o!("store" => "primary")))?,
        initial_state,
    ));

    let mut config = BackendConfig::new(logger.new(slog::o!("component" => "backend")), factory.clone());
    config.options = options;
    let backend = try_create_backend(config)?;
    backend.start().await?;
    backend.on_become_primary().await?;

    let server = Arc::new(RingMasterServer::new(ServerConfig::for_backend(backend.clone())));
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port))).await?;
    let (shutdown_handle, shutdown) = shutdown_signal();
    let serving = tokio::spawn(serve_tcp(logger.clone(), listener, server, shutdown));

    tokio::signal::ctrl_c().await?;
    slog::info!(logger, "Interrupted, shutting down");
    shutdown_handle.shutdown();
    if let Err(e) = serving.await {
        slog::error!(logger, "Listener task failed: {}", e);
    }

    if let Some(path) = &args.snapshot {
        factory.save_snapshot(path)?;
        slog::info!(logger, "Saved {} nodes to {:?}", backend.total_nodes(), path);
    }
    backend.stop().await?;

    Ok(())
}
