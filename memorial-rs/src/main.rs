use memorial_rs::api::ApiServer;
use memorial_rs::config::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting memorial-rs v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {} (missing file uses defaults)", config_path);
    info!("  Listening on: {}", config.server.listen_addr);
    info!("  Profile: {}", config.profile.id);
    info!("  Storage limit: {} bytes", config.quota.storage_limit);
    info!("  Media provider: {:?}", config.media.provider);

    let server = ApiServer::from_config(&config).await?;
    server.run().await?;

    Ok(())
}

/// RUST_LOG wins over the configured level
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("memorial_rs={},tower_http={}", level, level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}
