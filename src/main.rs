// src/main.rs
use stack_it_now::api;
use stack_it_now::config::AppConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env first so RUST_LOG from the file reaches the filter.
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stack_it_now=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    info!("Placement service starting...");
    if let Err(err) = api::start_api_server(app_config.api, app_config.planning).await {
        error!("Could not start API server: {err}");
        std::process::exit(1);
    }
}
