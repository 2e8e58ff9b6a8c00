pub mod cli;
pub mod error;
pub mod logging;
pub mod observer;
pub mod server;

use std::sync::Arc;

use anyhow::Context;
use hub::{JsonFileStore, SessionRegistry, WebSocketTransport};
use tracing::info;

use crate::cli::Cli;

/// Runs the hub until ctrl-c: restores sessions, serves the API, then shuts every session down.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
	let store = JsonFileStore::open(&cli.data_dir)
		.with_context(|| format!("failed to open session store in {}", cli.data_dir.display()))?;
	let transport = WebSocketTransport::new(cli.bridge_url.clone());
	let registry = Arc::new(SessionRegistry::new(
		Arc::new(transport),
		Arc::new(store),
		cli.supervisor_config(),
	));

	let observer = observer::spawn(registry.subscribe(), cli.print_qr);

	let restored = registry.restore().await.context("failed to restore sessions")?;
	info!(target = "hub", count = restored.len(), "sessions restored");

	let addr = cli.listen_addr();
	let listener = tokio::net::TcpListener::bind(addr)
		.await
		.with_context(|| format!("failed to bind to {addr}"))?;
	info!(target = "hub", %addr, bridge = %cli.bridge_url, "listening");

	let served = axum::serve(listener, server::router(Arc::clone(&registry)))
		.with_graceful_shutdown(shutdown_signal())
		.await;

	registry.shutdown().await;
	observer.abort();
	served.context("server error")?;
	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(target = "hub", error = %err, "failed to listen for ctrl-c");
		std::future::pending::<()>().await;
	}
	info!(target = "hub", "shutting down");
}
