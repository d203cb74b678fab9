//! Zeus CI webhook receiver.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeusci_config::load_system_config;
use zeusci_db::{create_pool, PgBuildRepo, PgRepoRepo};
use zeusci_webhook::{routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_system_config(&["/etc/zeus-ci", "."])?;

    info!("connecting to database");
    let pool = create_pool(&config.database.to_url()).await?;

    let state = AppState::new(
        Arc::new(PgRepoRepo::new(pool.clone())),
        Arc::new(PgBuildRepo::new(pool)),
        config.listener.webhook_secret.clone(),
    );

    let app = routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from((
        config.listener.host.parse::<std::net::IpAddr>()?,
        config.listener.port,
    ));
    info!(%addr, "starting webhook receiver");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
