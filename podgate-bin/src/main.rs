use color_eyre::eyre;
use podgate_gateway::{create_app, AppState, Context, Proxy};
use podgate_runtime::RktClient;
use podgate_supervisor::Systemd;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,podgate=debug")),
        )
        .init();

    info!("Starting podgate...");
    let config = Config::from_env()?;

    let runtime = RktClient::connect(&config.api_endpoint).await?;
    let init = Systemd::connect().await?;
    let context = Arc::new(Context::new(
        Arc::new(runtime),
        Arc::new(init),
        config.units.clone(),
    ));

    let routed = context.bootstrap().await?;
    info!("Routing {} running pods", routed);

    let state = Arc::new(AppState {
        context: context.clone(),
        proxy: Proxy::new()?,
        config: config.gateway.clone(),
    });
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        "Serving {} and *.{} on {}",
        config.gateway.domain,
        config.gateway.domain,
        listener.local_addr()?
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    context.shutdown().await?;
    info!("podgate stopped");
    Ok(())
}
