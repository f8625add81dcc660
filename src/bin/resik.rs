use clap::Parser;
use resik_todo::api::{self, AppState};
use resik_todo::{AppConfig, Store, StoreTodoRepository, logger};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "resik", version, about = "Todo API server", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). Falls back to $RESIK_CONFIG, then ./resik.toml.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Bind host. Takes precedence over config/env.")]
    host: Option<String>,
    #[arg(long, help = "Bind port. Takes precedence over config/env.")]
    port: Option<u16>,
    #[arg(long, help = "Directory for the store's write-ahead log. In-memory when unset.")]
    store_path: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    if let Some(h) = &cli.host {
        cfg.app.host.clone_from(h);
    }
    if let Some(p) = cli.port {
        cfg.app.port = p;
    }
    if let Some(p) = &cli.store_path {
        cfg.store.path = Some(p.clone());
    }
    Ok(cfg)
}

async fn serve(cfg: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(Store::open(cfg.store_options())?);
    let repo = Arc::new(StoreTodoRepository::with_collection(store, &cfg.store.collection));
    let mut state = AppState::new(repo);
    if let Some(t) = cfg.request_timeout() {
        state = state.with_timeout(t);
    }
    let app = api::router(state);

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("{} listening on {addr} (mode {})", cfg.app.name, cfg.app.mode);
    for (method, path) in api::ROUTES {
        log::info!("route {method:<6} {path}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for shutdown signal: {e}");
            }
            log::info!("shutting down");
        })
        .await?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let cfg = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = logger::init(&cfg.log, cfg.is_debug()) {
        eprintln!("logging setup failed: {e}");
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(n) = cfg.server.workers {
        builder.worker_threads(n.max(1));
    }
    let runtime = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("cannot start runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(serve(cfg)) {
        log::error!("server error: {e}");
        std::process::exit(1);
    }
}
