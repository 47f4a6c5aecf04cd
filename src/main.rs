use std::net::SocketAddr;

use filter_webhook::{config::Config, router, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "server=debug,filter_webhook=debug,tower_http=debug";

/// `RUST_LOG` wins; a missing or unparsable value falls back to
/// [`DEFAULT_LOG_FILTER`].
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|e| {
        eprintln!("[tracing] RUST_LOG unusable ({e}), using {DEFAULT_LOG_FILTER}");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = Config::from_env()?;
    let port = cfg.port;

    let state = AppState::from_config(cfg).await?;

    info!("Domain filter: {}", state.domain_filter);
    info!("Target nets  : {}", state.target_filter);
    info!(
        "Zones        : {}",
        if state.cfg.zones.is_empty() { "(none)" } else { &state.cfg.zones }
    );
    info!("Default TTL  : {}s", state.cfg.default_ttl);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
