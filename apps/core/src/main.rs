// AI Guru Multibot backend entry point.
// Wires settings, storage and the actor system behind the HTTP surface.

mod actors;
mod brain;
mod config;
mod database;
mod error;
mod http;
mod models;
mod preflight;
mod prompts;
mod rate_limiter;
mod store;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;

use dotenv::dotenv;
use tracing::subscriber::set_global_default;
use tracing::{error, info};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use actors::SupervisorHandle;
use config::Settings;
use http::AppContext;
use store::Store;

/// Json-per-line logs to stdout, filtered by `RUST_LOG` (default `info`).
fn init_telemetry() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let formatting_layer = BunyanFormattingLayer::new("gurubot-core".into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    set_global_default(subscriber).expect("failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_telemetry();

    info!(
        "Starting AI Guru Multibot backend v{}",
        env!("CARGO_PKG_VERSION")
    );

    let settings = Settings::from_env()?;
    settings.ensure_data_dirs()?;

    let report = preflight::run_preflight_checks(&settings).await;

    // A dead database is survivable: sessions fall back to process memory.
    let store = if report.degraded {
        Store::memory_only()
    } else {
        match database::init_db(&settings.database_url).await {
            Ok(pool) => Store::durable(pool),
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                Store::memory_only()
            }
        }
    };
    info!(storage = store.mode().as_str(), "Storage backend selected");

    let bind_addr = format!("0.0.0.0:{}", settings.port);
    let supervisor = SupervisorHandle::new(store.clone(), &settings);
    let context = AppContext::new(settings, store, supervisor);
    let router = http::router(context);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("AI Guru Multibot backend listening on {}", bind_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
        info!("shutting down...");
    })
    .await?;

    Ok(())
}
