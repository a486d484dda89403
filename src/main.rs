use redemu::{server, ServerConfig};
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize logging (RUST_LOG, info by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("redemu starting...");

    // Optional JSON configuration file as the only argument
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = match ServerConfig::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Emulating {:?} {} with {} databases",
        config.server_type, config.version, config.databases
    );

    if let Err(e) = server::run(config).await {
        error!("RESP server error: {}", e);
        std::process::exit(1);
    }
}
