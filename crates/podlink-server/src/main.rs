mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use podlink_engine::EngineContext;
use podlink_platforms::AdapterRegistry;
use podlink_tokens::{TokenCipher, TokenManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(podlink_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = podlink_db::PoolConfig::from_app_config(&config);
    let pool = podlink_db::connect_pool(&config.database_url, pool_config).await?;
    podlink_db::run_migrations(&pool).await?;

    let cipher = TokenCipher::from_base64_key(&config.encryption_key)?;
    let adapters = Arc::new(AdapterRegistry::from_config(&config)?);
    let tokens = Arc::new(TokenManager::new(
        pool.clone(),
        cipher,
        Arc::clone(&adapters),
    ));

    let ctx = EngineContext {
        pool,
        tokens,
        adapters,
        config: Arc::clone(&config),
    };

    let _scheduler = scheduler::build_scheduler(ctx).await?;
    tracing::info!(env = %config.env, "podlink schedulers started");

    shutdown_signal().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
