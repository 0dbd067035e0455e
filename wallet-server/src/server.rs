use crate::config::Config;
use crate::handlers;
use actix_web::{middleware, web, App, HttpServer};
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use wallet_core::{PgWalletStore, RedisWalletCache, TransferEngine};
use wallet_events::{
    NatsClient, NatsTransferPublisher, NotificationHandler, PublisherConfig, TransferWorker,
    WorkerConfig,
};

pub struct WalletServer {
    config: Config,
    db_pool: sqlx::PgPool,
}

impl WalletServer {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.database.url)
            .await?;

        info!("Database connection pool established");

        sqlx::migrate!("./migrations").run(&db_pool).await?;
        info!("Database migrations applied");

        Ok(Self { config, db_pool })
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let config = self.config;
        let db_pool = self.db_pool;

        let redis_client = redis::Client::open(config.redis.url.clone())?;
        let redis_conn = ConnectionManager::new(redis_client).await?;
        info!("Redis connected");

        let nats = Arc::new(NatsClient::connect(&config.nats.url).await?);
        nats.ensure_transfer_stream().await?;

        let store = Arc::new(PgWalletStore::new(
            db_pool.clone(),
            Duration::from_millis(config.engine.lock_timeout_ms),
        ));
        let cache = Arc::new(RedisWalletCache::new(redis_conn));
        let publisher = Arc::new(NatsTransferPublisher::new(
            nats.clone(),
            PublisherConfig::default(),
        ));
        let engine = Arc::new(TransferEngine::new(
            store,
            cache,
            publisher,
            Duration::from_secs(config.engine.cache_ttl_seconds),
        ));
        info!("Transfer engine wired");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker_handle = if config.engine.worker_enabled {
            let worker = TransferWorker::new(
                nats.clone(),
                WorkerConfig::default(),
                Arc::new(NotificationHandler),
            );
            Some(tokio::spawn(async move {
                if let Err(e) = worker.run(shutdown_rx).await {
                    error!(error = %e, "transfer worker exited with error");
                }
            }))
        } else {
            info!("Transfer worker disabled by configuration");
            None
        };

        let engine_data = web::Data::new(engine);
        let pool_data = web::Data::new(db_pool);
        let host = config.server.host.clone();
        let port = config.server.port;

        info!("Starting HTTP server on {}:{}", host, port);

        let server = HttpServer::new(move || {
            App::new()
                .app_data(engine_data.clone())
                .app_data(pool_data.clone())
                .wrap(middleware::Logger::default())
                .wrap(middleware::NormalizePath::trim())
                .configure(handlers::configure_routes)
        })
        .bind((host, port))?
        .run();

        let server_handle = server.handle();
        let serve = tokio::spawn(server);

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");

        server_handle.stop(true).await;

        // Let the worker finish its in-flight message before exit.
        let _ = shutdown_tx.send(true);
        if let Some(handle) = worker_handle {
            let _ = handle.await;
        }
        let _ = serve.await;

        info!("Server stopped");
        Ok(())
    }
}
