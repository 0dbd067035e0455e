use dotenv::dotenv;
use tracing::info;
use wallet_server::config::Config;
use wallet_server::server::WalletServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Wallet server starting...");

    let config = Config::from_env()?;

    info!(
        "Configuration loaded - listening on {}:{}, worker enabled: {}",
        config.server.host, config.server.port, config.engine.worker_enabled
    );

    let server = WalletServer::new(config).await?;

    info!("Wallet server initialized successfully");

    server.start().await?;

    Ok(())
}
