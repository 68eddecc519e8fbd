use std::sync::Arc;

use galley::GalleyError;
use galley::config::fetch_config;
use galley::console::spawn_console;
use galley::discovery::{Discovery, StaticDiscovery};
use galley::lifecycle::Board;
use galley::notify::TerminalBell;
use galley::persistence::{JsonFileStore, PersistenceBridge};
use galley::runtime::Runtime;
use galley::tls::build_tls_config;
use galley::websocket::ConnectionSupervisor;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), GalleyError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;
    let tls_config = Arc::new(build_tls_config(app_config.server.ca_cert.as_deref())?);

    let discovery: Arc<dyn Discovery> = Arc::new(StaticDiscovery::from_config(
        &app_config.server,
        Arc::clone(&tls_config),
    ));
    let descriptor = discovery.discover().await;
    if descriptor.is_none() {
        warn!("No order server available, use `connect <host:port>` or `tunnel <url>`");
    }

    let store = Arc::new(JsonFileStore::new(&app_config.store_path));
    info!(path = %store.path().display(), "Using order store");
    let persistence = PersistenceBridge::spawn(store);

    let (tx, rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    let supervisor = ConnectionSupervisor::new(
        descriptor,
        Some(tls_config),
        app_config.reconnect,
        tx.clone(),
        cmd_rx,
    );
    tokio::spawn(supervisor.run());

    spawn_console(
        tx.clone(),
        cmd_tx.clone(),
        discovery,
        app_config.server.encrypted,
    );

    let runtime = Runtime::new(
        Board::default(),
        persistence,
        Arc::new(TerminalBell),
        tx,
        cmd_tx,
    );
    runtime.run(rx).await;

    Ok(())
}
