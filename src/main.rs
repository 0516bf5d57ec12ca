use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config_path = std::env::var("CAMPSITE_CONFIG").unwrap_or_else(|_| "campsite.json".to_string());
    info!(
        target: "campsite",
        "campsite starting: RUST_LOG='{}', config='{}'",
        rust_log, config_path
    );

    campsite::server::run(&config_path).await
}
