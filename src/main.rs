use std::sync::Arc;
use tokio::sync::watch;

mod config;
mod error;
mod handler;
mod http;
mod library;
mod logger;
mod media;
mod server;

use library::MemoryStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    // Tokio runtime sized by `server.workers`, defaulting to one thread per core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let state = Arc::new(config::AppState::new(cfg, Arc::new(MemoryStore::new())));
    state.media.ensure_exists().await.map_err(|e| {
        format!(
            "Failed to create media directory {}: {e}",
            state.media.dir().display()
        )
    })?;

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &state.config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    server::start_signal_handler(shutdown_tx);
    server::start_server_loop(listener, state, shutdown_rx).await;

    Ok(())
}
